//! 最近使用顺序索引
//!
//! 扇区号到缓存行的映射，同时维护驻留行从 MRU 到 LRU 的全序。
//! 底层使用 `lru::LruCache`（HashMap + 双向链表），查找、提升、
//! 取出最旧行都是 O(1)。容量由槽位池控制，这里使用无界模式，
//! 索引自己从不驱逐任何行。

use super::line::CacheLine;
use crate::block::SectorId;
use lru::LruCache;

/// 最近使用顺序索引
pub struct RecencyIndex {
    lines: LruCache<SectorId, CacheLine>,
}

impl RecencyIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self {
            lines: LruCache::unbounded(),
        }
    }

    /// 查找并提升为最近使用
    pub fn touch(&mut self, sector: SectorId) -> Option<&mut CacheLine> {
        self.lines.get_mut(&sector)
    }

    /// 查找但不改变顺序
    pub fn peek(&self, sector: SectorId) -> Option<&CacheLine> {
        self.lines.peek(&sector)
    }

    /// 查找可变引用但不改变顺序
    pub fn peek_mut(&mut self, sector: SectorId) -> Option<&mut CacheLine> {
        self.lines.peek_mut(&sector)
    }

    /// 扇区是否驻留
    pub fn contains(&self, sector: SectorId) -> bool {
        self.lines.contains(&sector)
    }

    /// 作为最近使用插入新行
    ///
    /// 同一扇区重复驻留是实现错误。
    pub fn insert(&mut self, line: CacheLine) {
        let displaced = self.lines.push(line.sector, line);
        assert!(
            displaced.is_none(),
            "sector {:#x} is already resident",
            line.sector
        );
    }

    /// 最久未使用的行
    pub fn peek_lru(&self) -> Option<&CacheLine> {
        self.lines.peek_lru().map(|(_, line)| line)
    }

    /// 取出最久未使用的行
    pub fn pop_lru(&mut self) -> Option<CacheLine> {
        self.lines.pop_lru().map(|(_, line)| line)
    }

    /// 按 MRU 到 LRU 的顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &CacheLine> {
        self.lines.iter().map(|(_, line)| line)
    }

    /// 按 MRU 到 LRU 的顺序可变遍历，不改变顺序
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CacheLine> {
        self.lines.iter_mut().map(|(_, line)| line)
    }

    /// 驻留行数
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for RecencyIndex {
    fn default() -> Self {
        Self::new()
    }
}
