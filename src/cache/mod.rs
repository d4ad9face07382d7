//! 扇区缓存模块
//!
//! 位于文件系统层与同步块设备之间的有界写回缓存。
//!
//! # 主要组件
//!
//! - [`SlotPool`] - 固定数量的扇区缓冲区和空闲位图
//! - [`CacheLine`] - 驻留扇区到槽位的绑定，带脏标志
//! - [`RecencyIndex`] - 扇区查找与 MRU -> LRU 全序，使用 lru crate
//! - [`SectorCache`] - 读、写、驱逐、刷新逻辑
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 1. **槽位**：所有缓冲区放在一块连续内存里，缓存行只保存槽位下标，
//!    行被回收时不会留下悬空引用
//! 2. **分配**：空闲位图按字扫描，取编号最小的空闲槽位
//! 3. **驱逐**：严格 LRU，读和写都算一次访问；满时回收 LRU 行并沿用其槽位
//! 4. **写回**：写操作只置脏，脏行在被驱逐或刷新时才写到设备
//! 5. **写分配不读盘**：写未命中时整个扇区都被覆盖，不需要先读设备
//!
//! # 不变量
//!
//! - 驻留行数 ≤ 容量
//! - 一个扇区最多对应一个缓存行
//! - 每个已占用槽位恰好被一行引用，空闲槽位不被引用
//! - 已占用槽位数 + 空闲位数 == 容量
//!
//! 违反不变量属于实现错误，用断言检查，见 [`SectorCache::check_invariants`]。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use sector_cache::{RamDisk, cache::SectorCache};
//!
//! let mut disk = RamDisk::new(1024);
//! let mut cache = SectorCache::new(64, 512)?;
//!
//! cache.write(&mut disk, 7, &[0xaa; 512])?;
//! let mut buf = [0u8; 512];
//! cache.read(&mut disk, 7, &mut buf)?;
//! cache.flush(&mut disk)?;
//! ```

mod line;
mod recency;
mod sector_cache;
mod slot_pool;

pub use line::{CacheLine, LineFlags, SlotIndex};
pub use recency::RecencyIndex;
pub use sector_cache::{CacheStats, SectorCache};
pub use slot_pool::SlotPool;
