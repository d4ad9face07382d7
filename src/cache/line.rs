//! 缓存行结构
//!
//! 一个缓存行把一个驻留扇区绑定到槽位池中的一个槽位。

use crate::block::SectorId;
use bitflags::bitflags;

/// 槽位索引，范围 `0..capacity`
pub type SlotIndex = usize;

bitflags! {
    /// 缓存行状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u8 {
        /// 槽位内容可能比设备上的新
        const DIRTY = 0x01;
    }
}

/// 缓存行
///
/// 只在扇区驻留期间存在。驱逐时不销毁，而是原地改绑到新扇区，
/// 槽位保持不变。行只通过下标引用槽位，从不持有缓冲区本身。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    /// 驻留的扇区号
    pub sector: SectorId,
    /// 数据所在槽位
    pub slot: SlotIndex,
    /// 状态标志
    pub flags: LineFlags,
}

impl CacheLine {
    /// 创建干净的缓存行
    pub fn new(sector: SectorId, slot: SlotIndex) -> Self {
        Self {
            sector,
            slot,
            flags: LineFlags::empty(),
        }
    }

    /// 把缓存行改绑到另一个扇区（保留槽位，清除脏标志）
    pub fn rebind(&mut self, sector: SectorId) {
        self.sector = sector;
        self.flags = LineFlags::empty();
    }

    /// 标记为脏（已修改）
    pub fn mark_dirty(&mut self) {
        self.flags.insert(LineFlags::DIRTY);
    }

    /// 标记为干净（已写入磁盘）
    pub fn mark_clean(&mut self) {
        self.flags.remove(LineFlags::DIRTY);
    }

    /// 检查是否是脏行
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(LineFlags::DIRTY)
    }
}
