//! 内存块设备
//!
//! 用内存模拟的扇区设备，带 I/O 计数和故障注入，
//! 主要用于测试缓存行为以及在宿主机上做镜像工具。

use super::device::{BlockDevice, SectorId, DEFAULT_SECTOR_SIZE};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;

/// 内存块设备
#[derive(Debug, Clone)]
pub struct RamDisk {
    sector_size: usize,
    total_sectors: u64,
    storage: Vec<u8>,
    /// 物理读取次数
    reads: u64,
    /// 物理写入次数
    writes: u64,
    /// 设备 flush 次数
    flushes: u64,
    /// 注入读故障
    fail_reads: bool,
    /// 注入写故障
    fail_writes: bool,
}

impl RamDisk {
    /// 创建使用默认扇区大小（512 字节）的内存设备
    pub fn new(total_sectors: u64) -> Self {
        Self::with_sector_size(total_sectors, DEFAULT_SECTOR_SIZE)
    }

    /// 创建指定扇区大小的内存设备
    pub fn with_sector_size(total_sectors: u64, sector_size: usize) -> Self {
        Self {
            sector_size,
            total_sectors,
            storage: vec![0u8; total_sectors as usize * sector_size],
            reads: 0,
            writes: 0,
            flushes: 0,
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// 物理读取次数
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// 物理写入次数
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// 设备 flush 次数
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// 清零所有计数
    pub fn reset_counters(&mut self) {
        self.reads = 0;
        self.writes = 0;
        self.flushes = 0;
    }

    /// 设置读故障注入
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// 设置写故障注入
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// 直接查看设备上某扇区的内容（绕过计数）
    pub fn sector(&self, id: SectorId) -> &[u8] {
        let range = self.range(id);
        &self.storage[range]
    }

    fn range(&self, id: SectorId) -> core::ops::Range<usize> {
        let start = id as usize * self.sector_size;
        start..start + self.sector_size
    }

    fn check(&self, id: SectorId, len: usize) -> Result<()> {
        if id >= self.total_sectors {
            return Err(Error::new(ErrorKind::InvalidInput, "sector out of range"));
        }
        if len != self.sector_size {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer is not one sector"));
        }
        Ok(())
    }
}

impl BlockDevice for RamDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    fn read_sector(&mut self, id: SectorId, buf: &mut [u8]) -> Result<()> {
        self.check(id, buf.len())?;
        if self.fail_reads {
            log::trace!("[RAMDISK] injected read fault at sector {:#x}", id);
            return Err(Error::device_fault("injected read fault"));
        }
        self.reads += 1;
        let range = self.range(id);
        buf.copy_from_slice(&self.storage[range]);
        Ok(())
    }

    fn write_sector(&mut self, id: SectorId, buf: &[u8]) -> Result<()> {
        self.check(id, buf.len())?;
        if self.fail_writes {
            log::trace!("[RAMDISK] injected write fault at sector {:#x}", id);
            return Err(Error::device_fault("injected write fault"));
        }
        self.writes += 1;
        let range = self.range(id);
        self.storage[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
