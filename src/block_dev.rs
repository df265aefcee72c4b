//! # DMA 接口层
//!
//! SRAM 只能经由外设 DMA 以 16 字节扇区为单位访问；
//! [`PeripheralDma`] 就是对这一搬运能力的抽象，
//! 上层只依赖它，因此既可以接真实硬件（[`crate::PiDma`]），
//! 也可以接内存模拟（[`crate::MemSram`]）。

use core::any::Any;
use core::ops::{Deref, DerefMut};

use crate::{PhysAddr, Result, SECTOR_SZ};

/// Scratch buffer for one sector, aligned the way the DMA engine requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct SectorBuf(pub [u8; SECTOR_SZ]);

impl SectorBuf {
    pub const fn zeroed() -> Self {
        Self([0; SECTOR_SZ])
    }
}

impl Default for SectorBuf {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for SectorBuf {
    type Target = [u8; SECTOR_SZ];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SectorBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Synchronous single-sector transfers between RAM and the SRAM bus.
///
/// Each call is a critical section: it either completes the whole transfer
/// or fails without leaving the bus busy on the caller's behalf.
/// `timeout` is a poll budget; `None` waits forever like the real hardware.
pub trait PeripheralDma: Send + Sync + Any {
    fn read_block(&self, buf: &mut SectorBuf, addr: PhysAddr, timeout: Option<u32>) -> Result<()>;
    fn write_block(&self, buf: &SectorBuf, addr: PhysAddr, timeout: Option<u32>) -> Result<()>;
}
