//! 缓存管理器
//!
//! 文件系统层唯一可见的缓存入口。挂载时创建一次，持有设备与
//! [`SectorCache`]，卸载（或被丢弃）时把所有脏扇区刷回设备。
//!
//! # 并发使用
//!
//! 整个缓存状态（索引、空闲位图、每行脏标志）和设备放在同一把
//! `spin::Mutex` 里，每个操作从查找到设备 I/O 再到顺序更新都在一次加锁内完成。
//! 因此 `CacheManager<D>` 在 `D: Send` 时是 `Sync` 的，可以用 `Arc` 共享：
//!
//! ```rust,ignore
//! use alloc::sync::Arc;
//! use sector_cache::{CacheManager, RamDisk};
//!
//! let cache = Arc::new(CacheManager::new(RamDisk::new(1024), 64)?);
//! let mut buf = [0u8; 512];
//! cache.read(0, &mut buf)?;
//! ```

use crate::block::{BlockDevice, SectorId};
use crate::cache::{CacheStats, SectorCache};
use crate::config::CacheConfig;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

const UNMOUNTED: Error = Error::new(ErrorKind::InvalidState, "cache already unmounted");
const OUT_OF_RANGE: Error = Error::new(ErrorKind::InvalidInput, "byte range beyond device");

struct Inner<D> {
    cache: SectorCache,
    /// 卸载时被取走，之后 Drop 不再刷新
    device: Option<D>,
}

impl<D: BlockDevice> Inner<D> {
    fn parts(&mut self) -> Result<(&mut SectorCache, &mut D)> {
        match self.device.as_mut() {
            Some(device) => Ok((&mut self.cache, device)),
            None => Err(UNMOUNTED),
        }
    }

    /// 两层刷新：先写回缓存中的脏扇区，再刷新设备自身
    fn sync(&mut self) -> Result<usize> {
        let (cache, device) = self.parts()?;
        let count = cache.flush(device)?;
        device.flush()?;
        Ok(count)
    }

    fn check_byte_range(&self, offset: u64, len: usize) -> Result<()> {
        let device = self.device.as_ref().ok_or(UNMOUNTED)?;
        let end = offset.checked_add(len as u64).ok_or(OUT_OF_RANGE)?;
        // 设备字节数超出 u64 时只受扇区号检查约束
        match device.total_sectors().checked_mul(self.cache.sector_size() as u64) {
            Some(limit) if end > limit => Err(OUT_OF_RANGE),
            _ => Ok(()),
        }
    }
}

/// 缓存管理器
pub struct CacheManager<D: BlockDevice> {
    inner: Mutex<Inner<D>>,
}

impl<D: BlockDevice> CacheManager<D> {
    /// 挂载时初始化缓存
    ///
    /// 扇区大小取自设备。
    ///
    /// # 参数
    ///
    /// * `device` - 底层块设备
    /// * `capacity` - 缓存槽位数量
    pub fn new(device: D, capacity: usize) -> Result<Self> {
        let config = CacheConfig::new(capacity, device.sector_size());
        Self::with_config(device, config)
    }

    /// 使用默认配置初始化缓存
    ///
    /// 使用 `DEFAULT_CAPACITY` (64 个扇区)
    pub fn with_default_config(device: D) -> Result<Self> {
        Self::with_config(device, CacheConfig::default())
    }

    /// 按配置初始化缓存
    ///
    /// 配置的扇区大小必须与设备一致。
    pub fn with_config(device: D, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        if device.sector_size() != config.sector_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "device sector size does not match cache config",
            ));
        }

        let cache = SectorCache::new(config.capacity, config.sector_size)?;
        log::info!(
            "[CACHE] mounted: {} slots x {} bytes over {} sectors",
            config.capacity,
            config.sector_size,
            device.total_sectors()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                cache,
                device: Some(device),
            }),
        })
    }

    /// 读取一个扇区到 `buf`
    ///
    /// `buf` 长度必须等于扇区大小。
    pub fn read(&self, sector: SectorId, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let (cache, device) = inner.parts()?;
        cache.read(device, sector, buf)
    }

    /// 把 `buf` 写为扇区的新内容（延迟写回）
    ///
    /// `buf` 长度必须等于扇区大小。
    pub fn write(&self, sector: SectorId, buf: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let (cache, device) = inner.parts()?;
        cache.write(device, sector, buf)
    }

    /// 刷新所有脏扇区，然后刷新设备
    ///
    /// 不驱逐任何扇区。
    ///
    /// # 返回
    ///
    /// 写回的扇区数量
    pub fn flush(&self) -> Result<usize> {
        self.inner.lock().sync()
    }

    /// 刷新单个扇区
    ///
    /// # 返回
    ///
    /// 扇区驻留且为脏、已写回时返回 true
    pub fn flush_sector(&self, sector: SectorId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let (cache, device) = inner.parts()?;
        cache.flush_sector(device, sector)
    }

    /// 从任意字节偏移读取，自动处理跨扇区情况
    ///
    /// 整个请求在一次加锁内完成。
    ///
    /// # 返回
    ///
    /// 成功返回读取的字节数
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.check_byte_range(offset, buf.len())?;
        let (cache, device) = inner.parts()?;

        let sector_size = cache.sector_size();
        let mut temp = vec![0u8; sector_size];
        let mut done = 0;

        while done < buf.len() {
            let pos = offset + done as u64;
            let sector = pos / sector_size as u64;
            let in_sector = (pos % sector_size as u64) as usize;
            let n = (sector_size - in_sector).min(buf.len() - done);

            cache.read(device, sector, &mut temp)?;
            buf[done..done + n].copy_from_slice(&temp[in_sector..in_sector + n]);
            done += n;
        }

        Ok(done)
    }

    /// 向任意字节偏移写入，自动处理跨扇区情况
    ///
    /// 覆盖整个扇区的部分直接写入缓存；只覆盖部分扇区时先经缓存读出再合并。
    ///
    /// 按扇区依次写入，不是原子的：中途出错时，前面已写入的扇区留在缓存中
    /// 且为脏，出错的扇区及其后的扇区不变。
    ///
    /// # 返回
    ///
    /// 成功返回写入的字节数
    pub fn write_bytes(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.check_byte_range(offset, buf.len())?;
        let (cache, device) = inner.parts()?;

        let sector_size = cache.sector_size();
        let mut temp = vec![0u8; sector_size];
        let mut done = 0;

        while done < buf.len() {
            let pos = offset + done as u64;
            let sector = pos / sector_size as u64;
            let in_sector = (pos % sector_size as u64) as usize;
            let n = (sector_size - in_sector).min(buf.len() - done);

            if n == sector_size {
                cache.write(device, sector, &buf[done..done + n])?;
            } else {
                cache.read(device, sector, &mut temp)?;
                temp[in_sector..in_sector + n].copy_from_slice(&buf[done..done + n]);
                cache.write(device, sector, &temp)?;
            }
            done += n;
        }

        Ok(done)
    }

    /// 扇区是否驻留（不改变顺序）
    pub fn contains(&self, sector: SectorId) -> bool {
        self.inner.lock().cache.contains(sector)
    }

    /// 扇区是否驻留且为脏（不改变顺序）
    pub fn is_dirty(&self, sector: SectorId) -> bool {
        self.inner.lock().cache.is_dirty(sector)
    }

    /// 驻留扇区，按 MRU 到 LRU 排列
    pub fn resident_sectors(&self) -> Vec<SectorId> {
        self.inner.lock().cache.resident_sectors()
    }

    /// 当前驻留扇区数量
    pub fn len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().cache.is_empty()
    }

    /// 缓存容量
    pub fn capacity(&self) -> usize {
        self.inner.lock().cache.capacity()
    }

    /// 空闲槽位数量
    pub fn free_slots(&self) -> usize {
        self.inner.lock().cache.free_slots()
    }

    /// 脏扇区数量
    pub fn dirty_count(&self) -> usize {
        self.inner.lock().cache.dirty_count()
    }

    /// 扇区大小
    pub fn sector_size(&self) -> usize {
        self.inner.lock().cache.sector_size()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().cache.stats()
    }

    /// 在缓存锁内只读访问底层设备
    pub fn with_device<R>(&self, f: impl FnOnce(&D) -> R) -> Result<R> {
        let inner = self.inner.lock();
        let device = inner.device.as_ref().ok_or(UNMOUNTED)?;
        Ok(f(device))
    }

    /// 卸载：刷新所有脏扇区和设备，成功后交还设备
    ///
    /// 无论刷新是否成功，之后 Drop 都不会再次刷新；失败时错误返回给调用者，
    /// 设备随之被丢弃。
    pub fn unmount(mut self) -> Result<D> {
        let inner = self.inner.get_mut();
        let result = inner.sync();
        let device = inner.device.take().ok_or(UNMOUNTED)?;
        let count = result?;
        log::info!("[CACHE] unmounted, {} dirty sectors written back", count);
        Ok(device)
    }
}

impl<D: BlockDevice> Drop for CacheManager<D> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.device.is_none() {
            return;
        }
        match inner.sync() {
            Ok(count) => log::debug!("[CACHE] dropped, {} dirty sectors written back", count),
            Err(e) => log::warn!(
                "[CACHE] final flush on drop failed, {} sectors may be lost: {}",
                inner.cache.dirty_count(),
                e
            ),
        }
    }
}

impl<D: BlockDevice> core::fmt::Debug for CacheManager<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheManager")
            .field("cache", &self.inner.lock().cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDisk;
    use alloc::collections::BTreeMap;
    use alloc::sync::Arc;
    use std::thread;

    const SS: usize = 512;

    fn pattern(tag: u8) -> Vec<u8> {
        vec![tag; SS]
    }

    fn read(cache: &CacheManager<impl BlockDevice>, sector: SectorId) -> Vec<u8> {
        let mut buf = vec![0u8; SS];
        cache.read(sector, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_mount_rejects_bad_config() {
        assert!(CacheManager::new(RamDisk::new(8), 0).is_err());

        let err = CacheManager::with_config(RamDisk::new(8), CacheConfig::new(4, 4096)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let cache = CacheManager::with_default_config(RamDisk::new(8)).unwrap();
        assert_eq!(cache.capacity(), 64);
        assert_eq!(cache.sector_size(), 512);
    }

    #[test]
    fn test_two_slot_scenario() {
        let (a, b, c) = (1, 2, 3);
        let cache = CacheManager::new(RamDisk::new(8), 2).unwrap();

        cache.write(a, &pattern(b'a')).unwrap();
        cache.write(b, &pattern(b'b')).unwrap();
        read(&cache, a);
        cache.write(c, &pattern(b'c')).unwrap();

        assert!(cache.contains(a));
        assert!(!cache.contains(b));
        assert!(cache.contains(c));
        assert_eq!(cache.len(), 2);
        cache.with_device(|d| assert_eq!(d.sector(b), &pattern(b'b')[..])).unwrap();

        assert_eq!(read(&cache, a), pattern(b'a'));
        assert_eq!(read(&cache, c), pattern(b'c'));
    }

    #[test]
    fn test_lru_victim_is_least_recent() {
        const N: u64 = 4;
        let cache = CacheManager::new(RamDisk::new(32), N as usize).unwrap();

        for s in 0..N {
            read(&cache, s);
        }
        // 打乱访问顺序：2 最久未使用
        for s in [0, 3, 1] {
            read(&cache, s);
        }
        read(&cache, 20);

        assert!(!cache.contains(2));
        assert_eq!(cache.resident_sectors(), [20, 1, 3, 0]);
    }

    #[test]
    fn test_flush_idempotent() {
        let cache = CacheManager::new(RamDisk::new(16), 8).unwrap();
        for s in 0..5 {
            cache.write(s, &pattern(s as u8)).unwrap();
        }

        assert_eq!(cache.flush().unwrap(), 5);
        assert_eq!(cache.with_device(|d| d.writes()).unwrap(), 5);
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(cache.len(), 5);

        assert_eq!(cache.flush().unwrap(), 0);
        assert_eq!(cache.with_device(|d| d.writes()).unwrap(), 5);
        assert_eq!(cache.with_device(|d| d.flushes()).unwrap(), 2);
    }

    #[test]
    fn test_device_matches_last_write_after_flush() {
        let cache = CacheManager::new(RamDisk::new(32), 3).unwrap();
        let mut expected = BTreeMap::new();
        let mut seed = 12345u32;

        for i in 0..300u32 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let sector = ((seed >> 16) % 32) as SectorId;
            if seed & 1 == 0 {
                let tag = i as u8;
                cache.write(sector, &pattern(tag)).unwrap();
                expected.insert(sector, tag);
            } else {
                read(&cache, sector);
            }
            assert!(cache.len() <= 3);
        }

        cache.flush().unwrap();
        cache.with_device(|d| {
            for (&sector, &tag) in &expected {
                assert_eq!(d.sector(sector), &pattern(tag)[..]);
            }
        })
        .unwrap();
    }

    #[test]
    fn test_unmount_flushes() {
        let cache = CacheManager::new(RamDisk::new(8), 4).unwrap();
        cache.write(6, &pattern(0x66)).unwrap();

        let disk = cache.unmount().unwrap();
        assert_eq!(disk.sector(6), &pattern(0x66)[..]);
        assert_eq!(disk.writes(), 1);
        assert_eq!(disk.flushes(), 1);
    }

    #[test]
    fn test_drop_flushes() {
        let mut disk = RamDisk::new(8);
        {
            let cache = CacheManager::new(&mut disk, 4).unwrap();
            cache.write(2, &pattern(0x22)).unwrap();
        }
        assert_eq!(disk.sector(2), &pattern(0x22)[..]);
    }

    #[test]
    fn test_unmount_error_is_reported_once() {
        let mut disk = RamDisk::new(8);
        {
            let cache = CacheManager::new(&mut disk, 4).unwrap();
            cache.write(1, &pattern(1)).unwrap();
            cache.inner.lock().device.as_mut().unwrap().set_fail_writes(true);

            let err = cache.unmount().unwrap_err();
            assert!(err.is_device_fault());
        }
        assert_eq!(disk.writes(), 0);
    }

    #[test]
    fn test_read_write_bytes() {
        let cache = CacheManager::new(RamDisk::new(8), 4).unwrap();
        cache.write(1, &pattern(0x11)).unwrap();
        cache.write(2, &pattern(0x22)).unwrap();

        // 跨越扇区 1 和 2 的部分写
        let data = [0xffu8; 100];
        assert_eq!(cache.write_bytes(SS as u64 * 2 - 50, &data).unwrap(), 100);

        let s1 = read(&cache, 1);
        assert!(s1[..SS - 50].iter().all(|&b| b == 0x11));
        assert!(s1[SS - 50..].iter().all(|&b| b == 0xff));
        let s2 = read(&cache, 2);
        assert!(s2[..50].iter().all(|&b| b == 0xff));
        assert!(s2[50..].iter().all(|&b| b == 0x22));

        let mut out = [0u8; 100];
        assert_eq!(cache.read_bytes(SS as u64 * 2 - 50, &mut out).unwrap(), 100);
        assert_eq!(out, data);
    }

    #[test]
    fn test_write_bytes_full_sector_skips_device_read() {
        let cache = CacheManager::new(RamDisk::new(8), 4).unwrap();
        let data = vec![0x5au8; SS * 2];
        cache.write_bytes(SS as u64 * 3, &data).unwrap();

        assert_eq!(cache.with_device(|d| d.reads()).unwrap(), 0);
        assert_eq!(read(&cache, 3), pattern(0x5a));
        assert_eq!(read(&cache, 4), pattern(0x5a));
    }

    #[test]
    fn test_byte_range_beyond_device() {
        let cache = CacheManager::new(RamDisk::new(2), 2).unwrap();
        let mut buf = [0u8; 10];
        let err = cache.read_bytes(SS as u64 * 2 - 5, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(cache.write_bytes(u64::MAX - 1, &buf).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unmount_borrowed_device() {
        let mut disk = RamDisk::new(8);
        let cache = CacheManager::new(&mut disk, 4).unwrap();
        cache.write(3, &pattern(0x33)).unwrap();

        let device = cache.unmount().unwrap();
        assert_eq!(device.sector(3), &pattern(0x33)[..]);
        assert_eq!(disk.writes(), 1);
    }

    /// 字节容量超出 u64 的设备，只在低扇区上读写
    struct HugeDevice;

    impl BlockDevice for HugeDevice {
        fn sector_size(&self) -> usize {
            SS
        }

        fn total_sectors(&self) -> u64 {
            u64::MAX / 4
        }

        fn read_sector(&mut self, _sector: SectorId, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }

        fn write_sector(&mut self, _sector: SectorId, _buf: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_byte_range_on_huge_device() {
        let cache = CacheManager::new(HugeDevice, 4).unwrap();

        let mut buf = [0xffu8; 16];
        assert_eq!(cache.read_bytes(1024, &mut buf).unwrap(), 16);
        assert_eq!(buf, [0u8; 16]);

        assert_eq!(cache.write_bytes(u64::MAX - 100, &[1u8; 10]).unwrap(), 10);
        assert!(cache.is_dirty((u64::MAX - 100) / SS as u64));
        assert!(cache.write_bytes(u64::MAX - 5, &[1u8; 10]).is_err());
        assert_eq!(cache.flush().unwrap(), 1);
    }

    #[test]
    fn test_write_bytes_stops_at_failing_sector() {
        let cache = CacheManager::new(RamDisk::new(8), 4).unwrap();
        cache.inner.lock().device.as_mut().unwrap().set_fail_reads(true);

        // 扇区 1 整扇区写入，扇区 2 只写 10 字节，需要先读设备
        let data = vec![0x77u8; SS + 10];
        let err = cache.write_bytes(SS as u64, &data).unwrap_err();
        assert!(err.is_device_fault());

        assert!(cache.contains(1));
        assert!(cache.is_dirty(1));
        assert!(!cache.contains(2));
        assert_eq!(read(&cache, 1), pattern(0x77));
    }

    #[test]
    fn test_concurrent_access() {
        const THREADS: u8 = 4;
        const SECTORS_PER_THREAD: u64 = 6;

        let cache = Arc::new(CacheManager::new(RamDisk::new(64), 5).unwrap());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let base = t as u64 * SECTORS_PER_THREAD;
                    for round in 0..50u8 {
                        for i in 0..SECTORS_PER_THREAD {
                            let tag = t.wrapping_mul(64).wrapping_add(round);
                            cache.write(base + i, &vec![tag; SS]).unwrap();
                            let mut buf = vec![0u8; SS];
                            cache.read(base + i, &mut buf).unwrap();
                            // 其它线程只碰自己的扇区，读到的必然是自己刚写的
                            assert!(buf.iter().all(|&b| b == tag));
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(cache.len() <= 5);
        cache.flush().unwrap();
        cache.with_device(|d| {
            for t in 0..THREADS {
                let tag = t.wrapping_mul(64).wrapping_add(49);
                for i in 0..SECTORS_PER_THREAD {
                    assert_eq!(d.sector(t as u64 * SECTORS_PER_THREAD + i), &vec![tag; SS][..]);
                }
            }
        })
        .unwrap();
    }
}
