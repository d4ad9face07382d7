//! 扇区缓存实现
//!
//! 组合 [`SlotPool`] 与 [`RecencyIndex`]，实现查找、分配、LRU 驱逐、
//! 脏行写回与刷新。设备作为每个操作的显式参数传入，缓存本身不持有设备，
//! 也不做任何同步；加锁由 [`CacheManager`](crate::CacheManager) 负责。
//!
//! # 读写路径
//!
//! ```text
//! read(sector):   hit  -> 拷出, 提升为 MRU
//!                 miss -> 读设备 -> 取空闲槽位或回收 LRU 行(脏则先写回) -> 插入 MRU
//! write(sector):  hit  -> 覆盖, 置脏, 提升为 MRU
//!                 miss -> 取空闲槽位或回收 LRU 行(脏则先写回) -> 拷入(不读设备) -> 置脏 -> 插入 MRU
//! ```

use super::line::{CacheLine, SlotIndex};
use super::recency::RecencyIndex;
use super::slot_pool::SlotPool;
use crate::bitmap;
use crate::block::{BlockDevice, SectorId};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数（读 + 写）
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 驱逐次数（回收 LRU 行）
    pub evictions: u64,
    /// 脏行写回次数（驱逐写回 + 刷新）
    pub writebacks: u64,
    /// 设备读取次数
    pub device_reads: u64,
    /// 当前脏行数量
    pub dirty_lines: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 扇区缓存
pub struct SectorCache {
    /// 扇区缓冲区与空闲位图
    pool: SlotPool,
    /// 扇区 -> 缓存行，以及 MRU -> LRU 顺序
    index: RecencyIndex,
    /// 统计信息
    stats: CacheStats,
}

impl SectorCache {
    /// 创建空缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 槽位数量，必须大于 0
    /// * `sector_size` - 扇区大小（字节），必须大于 0
    pub fn new(capacity: usize, sector_size: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be non-zero"));
        }
        if sector_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "sector size must be non-zero"));
        }
        Ok(Self {
            pool: SlotPool::new(capacity, sector_size),
            index: RecencyIndex::new(),
            stats: CacheStats::default(),
        })
    }

    /// 读取扇区
    ///
    /// 把 `sector` 的当前内容拷入 `buf`。缓存内容优先于设备内容。
    /// 返回后该扇区是最近使用的。出错时驻留集合与访问顺序不变，`buf` 内容未定义。
    pub fn read<D: BlockDevice>(
        &mut self,
        device: &mut D,
        sector: SectorId,
        buf: &mut [u8],
    ) -> Result<()> {
        self.check_request(device, sector, buf.len())?;
        self.stats.total_accesses += 1;

        if let Some(line) = self.index.touch(sector) {
            self.stats.hits += 1;
            log::trace!("[CACHE] read sector={:#x} HIT (dirty={})", sector, line.is_dirty());
            buf.copy_from_slice(self.pool.slot(line.slot));
            return Ok(());
        }

        self.stats.misses += 1;
        log::debug!(
            "[CACHE] read sector={:#x} MISS, cache={}/{}",
            sector,
            self.index.len(),
            self.pool.capacity()
        );

        // 先读设备再占槽位：读失败时驻留集合与访问顺序保持不变
        if let Err(e) = device.read_sector(sector, buf) {
            log::error!("[CACHE] device read of sector {:#x} failed: {}", sector, e);
            return Err(e);
        }
        self.stats.device_reads += 1;

        let line = self.claim_line(device, sector)?;
        self.pool.slot_mut(line.slot).copy_from_slice(buf);
        self.index.insert(line);
        self.debug_check();
        Ok(())
    }

    /// 写入扇区
    ///
    /// 记录 `buf` 为扇区的新内容并置脏，延迟到驱逐或刷新时写回设备。
    /// 未命中时直接用 `buf` 填充槽位，不读设备。
    pub fn write<D: BlockDevice>(
        &mut self,
        device: &mut D,
        sector: SectorId,
        buf: &[u8],
    ) -> Result<()> {
        self.check_request(device, sector, buf.len())?;
        self.stats.total_accesses += 1;

        if let Some(line) = self.index.touch(sector) {
            self.stats.hits += 1;
            log::trace!("[CACHE] write sector={:#x} HIT", sector);
            line.mark_dirty();
            self.pool.slot_mut(line.slot).copy_from_slice(buf);
            return Ok(());
        }

        self.stats.misses += 1;
        log::debug!(
            "[CACHE] write sector={:#x} MISS, cache={}/{}",
            sector,
            self.index.len(),
            self.pool.capacity()
        );

        let mut line = self.claim_line(device, sector)?;
        self.pool.slot_mut(line.slot).copy_from_slice(buf);
        line.mark_dirty();
        self.index.insert(line);
        self.debug_check();
        Ok(())
    }

    /// 为未命中的扇区准备一个干净的缓存行
    ///
    /// 有空闲槽位时取编号最小的一个；否则回收 LRU 行，脏则先写回。
    /// 返回的行尚未插入索引。
    fn claim_line<D: BlockDevice>(&mut self, device: &mut D, sector: SectorId) -> Result<CacheLine> {
        if let Some(slot) = self.pool.alloc() {
            log::trace!("[CACHE] sector={:#x} -> free slot {}", sector, slot);
            return Ok(CacheLine::new(sector, slot));
        }

        let Some(victim) = self.index.peek_lru().copied() else {
            panic!("no free slot but no resident line to evict");
        };

        if victim.is_dirty() {
            // 写回失败时受害行保持驻留、脏、位于 LRU 端
            if let Err(e) = device.write_sector(victim.sector, self.pool.slot(victim.slot)) {
                log::error!("[CACHE] write-back of sector {:#x} failed: {}", victim.sector, e);
                return Err(e);
            }
            self.stats.writebacks += 1;
        }

        let popped = self.index.pop_lru();
        let Some(mut line) = popped.filter(|l| l.sector == victim.sector) else {
            panic!("LRU line changed during eviction");
        };
        self.stats.evictions += 1;
        log::debug!(
            "[CACHE] Evicted sector={:#x} (dirty={}) from slot {} for sector={:#x}",
            victim.sector,
            victim.is_dirty(),
            victim.slot,
            sector
        );

        line.rebind(sector);
        Ok(line)
    }

    /// 刷新所有脏行到设备
    ///
    /// 不驱逐任何行，也不改变最近使用顺序。重复调用时第二次不产生设备写。
    ///
    /// # 返回
    ///
    /// 写回的扇区数量
    pub fn flush<D: BlockDevice>(&mut self, device: &mut D) -> Result<usize> {
        let mut count = 0;

        for line in self.index.iter_mut() {
            if !line.is_dirty() {
                continue;
            }
            if let Err(e) = device.write_sector(line.sector, self.pool.slot(line.slot)) {
                log::error!("[CACHE] flush of sector {:#x} failed: {}", line.sector, e);
                return Err(e);
            }
            line.mark_clean();
            self.stats.writebacks += 1;
            count += 1;
        }

        log::debug!("[CACHE] Flushed {} dirty sectors", count);
        Ok(count)
    }

    /// 刷新单个扇区到设备
    ///
    /// # 返回
    ///
    /// 扇区驻留且为脏、已写回时返回 true
    pub fn flush_sector<D: BlockDevice>(&mut self, device: &mut D, sector: SectorId) -> Result<bool> {
        let Some(line) = self.index.peek_mut(sector) else {
            return Ok(false);
        };
        if !line.is_dirty() {
            return Ok(false);
        }

        log::debug!("[CACHE] flush_sector sector={:#x}", sector);
        device.write_sector(line.sector, self.pool.slot(line.slot))?;
        line.mark_clean();
        self.stats.writebacks += 1;
        Ok(true)
    }

    /// 扇区是否驻留（不改变顺序）
    pub fn contains(&self, sector: SectorId) -> bool {
        self.index.contains(sector)
    }

    /// 扇区是否驻留且为脏（不改变顺序）
    pub fn is_dirty(&self, sector: SectorId) -> bool {
        self.index.peek(sector).is_some_and(|line| line.is_dirty())
    }

    /// 扇区所在槽位（不改变顺序）
    pub fn slot_of(&self, sector: SectorId) -> Option<SlotIndex> {
        self.index.peek(sector).map(|line| line.slot)
    }

    /// 驻留扇区，按 MRU 到 LRU 排列
    pub fn resident_sectors(&self) -> Vec<SectorId> {
        self.index.iter().map(|line| line.sector).collect()
    }

    /// 当前驻留扇区数量
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 缓存容量（槽位数）
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// 空闲槽位数量
    pub fn free_slots(&self) -> usize {
        self.pool.free_count()
    }

    /// 扇区大小
    pub fn sector_size(&self) -> usize {
        self.pool.slot_size()
    }

    /// 脏行数量
    pub fn dirty_count(&self) -> usize {
        self.index.iter().filter(|line| line.is_dirty()).count()
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.dirty_lines = self.dirty_count();
        stats
    }

    /// 检查所有结构不变量，违反时 panic
    ///
    /// - 驻留行数不超过容量
    /// - 每个已占用槽位恰好被一行引用，空闲槽位不被引用
    /// - 已占用数 + 空闲位数 == 容量
    pub fn check_invariants(&self) {
        let capacity = self.pool.capacity();
        assert!(self.index.len() <= capacity, "resident lines exceed capacity");

        let mut seen = vec![0u64; bitmap::words_for(capacity)];
        for line in self.index.iter() {
            assert!(line.slot < capacity, "slot {} out of range", line.slot);
            assert!(!self.pool.is_free(line.slot), "line uses free slot {}", line.slot);
            assert!(
                !bitmap::test_bit(&seen, line.slot),
                "slot {} referenced twice",
                line.slot
            );
            let _ = bitmap::set_bit(&mut seen, line.slot);
        }

        assert_eq!(
            self.index.len() + self.pool.free_count(),
            capacity,
            "occupied + free slot count mismatch"
        );
    }

    #[inline]
    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            self.check_invariants();
        }
    }

    fn check_request<D: BlockDevice>(&self, device: &D, sector: SectorId, len: usize) -> Result<()> {
        if len != self.pool.slot_size() {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer is not one sector"));
        }
        if sector >= device.total_sectors() {
            return Err(Error::new(ErrorKind::InvalidInput, "sector out of range"));
        }
        Ok(())
    }

}

impl core::fmt::Debug for SectorCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SectorCache")
            .field("capacity", &self.pool.capacity())
            .field("len", &self.index.len())
            .field("dirty_count", &self.dirty_count())
            .field("sector_size", &self.pool.slot_size())
            .field("stats", &self.stats)
            .finish()
    }
}
