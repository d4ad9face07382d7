//! 块设备抽象
//!
//! block/device.rs 定义缓存所消费的同步扇区设备接口。
//! block/ram.rs 提供内存实现，带 I/O 计数与故障注入。

mod device;
mod ram;

pub use device::{BlockDevice, SectorId, DEFAULT_SECTOR_SIZE};
pub use ram::RamDisk;
