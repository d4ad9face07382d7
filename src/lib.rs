//! sector_cache: 扇区级写回缓存
//!
//! 位于文件系统层与同步块设备之间的有界缓存，提供：
//! - **空闲位图**分配固定数量的扇区槽位
//! - **严格 LRU** 驱逐（读写都算访问）
//! - **脏标志**跟踪的延迟写回，写未命中不读设备
//! - **有序刷新**：刷新不驱逐、不改变访问顺序，可重复调用
//! - **单锁并发**：每个操作在一次加锁内完成
//!
//! # 示例
//!
//! ```rust,ignore
//! use sector_cache::{CacheManager, RamDisk, Result};
//!
//! fn main() -> Result<()> {
//!     // 挂载时创建，64 个 512 字节槽位
//!     let cache = CacheManager::new(RamDisk::new(8192), 64)?;
//!
//!     cache.write(10, &[0x42u8; 512])?;
//!
//!     let mut buf = [0u8; 512];
//!     cache.read(10, &mut buf)?;
//!
//!     // 卸载时写回所有脏扇区，交还设备
//!     let _disk = cache.unmount()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象与内存设备
//! - [`bitmap`] - 位图操作
//! - [`cache`] - 槽位池、访问顺序索引与扇区缓存
//! - [`config`] - 缓存配置
//! - [`manager`] - 加锁的缓存管理器，文件系统层入口

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 位图操作
pub mod bitmap;

/// 扇区缓存
pub mod cache;

/// 缓存配置
pub mod config;

/// 缓存管理器
pub mod manager;

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDevice, RamDisk, SectorId, DEFAULT_SECTOR_SIZE};

// Cache
pub use cache::{CacheStats, SectorCache};

// 配置
pub use config::{CacheConfig, DEFAULT_CAPACITY};

// 管理器
pub use manager::CacheManager;
