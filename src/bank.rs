//! Flat offsets to banked cartridge addresses.
//!
//! Only the first 32 KiB of SRAM are directly addressable; bytes past that
//! sit in further banks picked by the address bits starting at
//! [`BANK_SHIFT`].

use core::fmt;

use crate::{Result, SramError, BANK_COUNT, BANK_SHIFT, BANK_SZ, SRAM_BASE, SRAM_CAPACITY};

const DOMAIN_MASK: u32 = 0x07FF_FFFF;
const BANK_OFFSET_MASK: u32 = (1 << BANK_SHIFT) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Bank {
    Zero = 0,
    One = 1,
    Two = 2,
}

impl Bank {
    /// The bank holding logical `offset`, or `None` past the last bank.
    pub fn of(offset: usize) -> Option<Self> {
        u32::try_from(offset / BANK_SZ).ok().and_then(Self::from_index)
    }

    fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// First logical offset inside this bank.
    #[inline]
    pub fn start(self) -> usize {
        self.index() * BANK_SZ
    }

    #[inline]
    fn select_bits(self) -> u32 {
        (self as u32) << BANK_SHIFT
    }
}

/// Address on the cartridge bus, as programmed into the DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(pub u32);

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Map a flat SRAM offset to the cartridge address that reaches it.
pub fn translate(offset: usize) -> Result<PhysAddr> {
    let bank = Bank::of(offset).ok_or_else(|| {
        log::error!("offset {offset:#x} is outside the sram window");
        SramError::CapacityExceeded { offset, len: 0 }
    })?;
    // bank 内偏移 + bank 选择位
    let banked = (offset - bank.start()) as u32 | bank.select_bits();
    Ok(PhysAddr(SRAM_BASE + (banked & DOMAIN_MASK)))
}

/// Inverse of [`translate`]: which flat offset a cartridge address hits.
pub fn untranslate(addr: PhysAddr) -> Result<usize> {
    let rel = addr
        .0
        .checked_sub(SRAM_BASE)
        .ok_or(SramError::InvalidAddress(addr.0))?;
    let bank = Bank::from_index(rel >> BANK_SHIFT).ok_or(SramError::InvalidAddress(addr.0))?;
    let within = (rel & BANK_OFFSET_MASK) as usize;
    if within >= BANK_SZ {
        return Err(SramError::InvalidAddress(addr.0));
    }
    let offset = bank.start() + within;
    debug_assert!(offset < SRAM_CAPACITY && bank.index() < BANK_COUNT);
    Ok(offset)
}
