//! 块设备核心类型

use crate::error::Result;

/// 扇区号
///
/// 由文件系统层分配，缓存自身从不复用或改写。
pub type SectorId = u64;

/// 参考系统的扇区大小（字节）
pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// 块设备接口
///
/// 实现此 trait 以提供底层扇区访问。所有调用都是同步阻塞的，
/// 任何错误都视为设备故障，由缓存原样向上传递。
///
/// # 示例
///
/// ```rust,ignore
/// use sector_cache::{BlockDevice, Result, SectorId};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn sector_size(&self) -> usize {
///         512
///     }
///
///     fn total_sectors(&self) -> u64 {
///         8192
///     }
///
///     fn read_sector(&mut self, id: SectorId, buf: &mut [u8]) -> Result<()> {
///         // 读取一个扇区
///         Ok(())
///     }
///
///     fn write_sector(&mut self, id: SectorId, buf: &[u8]) -> Result<()> {
///         // 写入一个扇区
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 扇区大小（字节）
    fn sector_size(&self) -> usize;

    /// 总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取一个扇区
    ///
    /// # 参数
    ///
    /// * `id` - 扇区号
    /// * `buf` - 目标缓冲区，长度恰好为 `sector_size()`
    fn read_sector(&mut self, id: SectorId, buf: &mut [u8]) -> Result<()>;

    /// 写入一个扇区
    ///
    /// # 参数
    ///
    /// * `id` - 扇区号
    /// * `buf` - 源缓冲区，长度恰好为 `sector_size()`
    fn write_sector(&mut self, id: SectorId, buf: &[u8]) -> Result<()>;

    /// 刷新设备自身的写缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    fn total_sectors(&self) -> u64 {
        (**self).total_sectors()
    }

    fn read_sector(&mut self, id: SectorId, buf: &mut [u8]) -> Result<()> {
        (**self).read_sector(id, buf)
    }

    fn write_sector(&mut self, id: SectorId, buf: &[u8]) -> Result<()> {
        (**self).write_sector(id, buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
