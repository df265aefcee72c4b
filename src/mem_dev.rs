//! RAM-backed stand-in for the cartridge SRAM.

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::{
    untranslate, PeripheralDma, PhysAddr, Result, SectorBuf, SramError, SECTOR_SZ, SRAM_CAPACITY,
};

/// Simulated battery-backed SRAM reached through the same banked
/// addresses as the real bus.
///
/// It never stalls, so the poll budget passed to it is ignored.
#[derive(Debug)]
pub struct MemSram {
    image: Mutex<Vec<u8>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemSram {
    /// Fresh SRAM with every byte set to `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            image: Mutex::new(vec![byte; SRAM_CAPACITY]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn new() -> Self {
        Self::filled(0)
    }

    /// Power the SRAM back up with contents saved by [`MemSram::image`].
    /// Shorter images are padded with zeros, longer ones truncated.
    pub fn from_image(bytes: &[u8]) -> Self {
        let sram = Self::new();
        {
            let mut image = sram.image.lock();
            let len = bytes.len().min(SRAM_CAPACITY);
            image[..len].copy_from_slice(&bytes[..len]);
        }
        sram
    }

    pub fn image(&self) -> Vec<u8> {
        self.image.lock().clone()
    }

    /// Read raw bytes at a flat offset, bypassing DMA.
    ///
    /// Panics if the range leaves the SRAM.
    pub fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        self.image.lock()[offset..offset + len].to_vec()
    }

    /// Write raw bytes at a flat offset, bypassing DMA.
    ///
    /// Panics if the range leaves the SRAM.
    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.image.lock()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Sector reads performed through DMA so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Sector writes performed through DMA so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    fn sector_offset(addr: PhysAddr) -> Result<usize> {
        let offset = untranslate(addr)?;
        // 扇区不能跨越 bank 边界
        if offset % SECTOR_SZ != 0 {
            return Err(SramError::InvalidAddress(addr.0));
        }
        Ok(offset)
    }
}

impl Default for MemSram {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralDma for MemSram {
    fn read_block(&self, buf: &mut SectorBuf, addr: PhysAddr, _timeout: Option<u32>) -> Result<()> {
        let offset = Self::sector_offset(addr)?;
        buf.copy_from_slice(&self.image.lock()[offset..offset + SECTOR_SZ]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_block(&self, buf: &SectorBuf, addr: PhysAddr, _timeout: Option<u32>) -> Result<()> {
        let offset = Self::sector_offset(addr)?;
        self.image.lock()[offset..offset + SECTOR_SZ].copy_from_slice(&buf[..]);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
