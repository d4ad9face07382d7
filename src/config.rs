//! 缓存配置

use crate::block::DEFAULT_SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};

/// 默认缓存槽位数量
pub const DEFAULT_CAPACITY: usize = 64;

/// 缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓存槽位数量（扇区数）
    pub capacity: usize,
    /// 扇区大小（字节），必须与设备一致
    pub sector_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }
}

impl CacheConfig {
    /// 创建配置
    pub const fn new(capacity: usize, sector_size: usize) -> Self {
        Self {
            capacity,
            sector_size,
        }
    }

    /// 设置槽位数量
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// 设置扇区大小
    pub const fn with_sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// 检查配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be non-zero"));
        }
        if self.sector_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "sector size must be non-zero"));
        }
        Ok(())
    }

    /// 缓冲区总字节数
    pub const fn memory_footprint(&self) -> usize {
        self.capacity * self.sector_size
    }
}
