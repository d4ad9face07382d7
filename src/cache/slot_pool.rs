//! 槽位池
//!
//! 固定数量、等长的扇区缓冲区，连续存放在一块内存中，
//! 外加一张空闲位图（位为 1 表示槽位空闲）。

use super::line::SlotIndex;
use crate::bitmap;
use alloc::vec;
use alloc::vec::Vec;

/// 槽位池
pub struct SlotPool {
    /// 所有槽位的数据，槽位 i 占 `[i * slot_size, (i + 1) * slot_size)`
    arena: Vec<u8>,
    /// 空闲位图
    free: Vec<u64>,
    /// 槽位数量
    capacity: usize,
    /// 每个槽位的字节数
    slot_size: usize,
}

impl SlotPool {
    /// 创建槽位池，所有槽位初始为空闲
    ///
    /// # 参数
    ///
    /// * `capacity` - 槽位数量
    /// * `slot_size` - 每个槽位的字节数（扇区大小）
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        let mut free = vec![0u64; bitmap::words_for(capacity)];
        bitmap::fill_ones(&mut free, capacity);
        Self {
            arena: vec![0u8; capacity * slot_size],
            free,
            capacity,
            slot_size,
        }
    }

    /// 分配一个空闲槽位
    ///
    /// 总是取编号最小的空闲槽位。
    ///
    /// # 返回
    ///
    /// 有空闲槽位时返回其索引，否则返回 None
    pub fn alloc(&mut self) -> Option<SlotIndex> {
        let slot = bitmap::find_first_one(&self.free, self.capacity)?;
        // find_first_one 只返回 < capacity 的位
        bitmap::clear_bit(&mut self.free, slot).ok()?;
        Some(slot)
    }

    /// 槽位是否空闲
    pub fn is_free(&self, slot: SlotIndex) -> bool {
        bitmap::test_bit(&self.free, slot)
    }

    /// 空闲槽位数量
    pub fn free_count(&self) -> usize {
        bitmap::count_ones(&self.free)
    }

    /// 已占用槽位数量
    pub fn used_count(&self) -> usize {
        self.capacity - self.free_count()
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 每个槽位的字节数
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// 只读访问槽位数据
    pub fn slot(&self, slot: SlotIndex) -> &[u8] {
        let start = slot * self.slot_size;
        &self.arena[start..start + self.slot_size]
    }

    /// 可变访问槽位数据
    pub fn slot_mut(&mut self, slot: SlotIndex) -> &mut [u8] {
        let start = slot * self.slot_size;
        &mut self.arena[start..start + self.slot_size]
    }
}

impl core::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity)
            .field("slot_size", &self.slot_size)
            .field("free", &self.free_count())
            .finish()
    }
}
