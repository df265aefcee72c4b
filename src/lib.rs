//! Named fixed-size files on banked, battery-backed cartridge SRAM.
//!
//! 自下而上的分层：
//!
//! 1. `block_dev` / `dma`：一次搬运一个 16 字节扇区的 DMA 接口
//! 2. `bank`：逻辑偏移到分 bank 的物理地址
//! 3. `block_cache`：任意偏移、任意长度的对齐读写
//! 4. `table` / `vfs`：静态文件表与文件句柄
//! 5. `mount`：挂载到宿主的文件系统后端表
#![no_std]

extern crate alloc;

mod bank;
mod block_cache;
mod block_dev;
mod dma;
mod error;
mod mem_dev;
mod mount;
mod table;
mod vfs;

pub use self::{
    bank::{translate, untranslate, Bank, PhysAddr},
    block_cache::SectorCache,
    block_dev::{PeripheralDma, SectorBuf},
    dma::{PiDma, PiRegs, Platform, Volatile, PI_REGS_BASE},
    error::{Result, SramError},
    mem_dev::MemSram,
    mount::{initialize, initialize_in, FileSystem, Mounts, MOUNTS, SRAM_SCHEME},
    table::{FileTable, SramFile},
    vfs::{Handle, OpenFlag, SramFs, Stat, StatKind, Whence},
};

/// Hardware transfer granularity; DMA buffers must be aligned to it too.
pub const SECTOR_SZ: usize = 16;
/// One directly addressable SRAM window.
pub const BANK_SZ: usize = 0x8000;
pub const BANK_COUNT: usize = 3;
/// Total battery-backed bytes across all banks (96 KiB).
pub const SRAM_CAPACITY: usize = BANK_SZ * BANK_COUNT;
/// Cartridge domain 2 address of bank 0.
pub const SRAM_BASE: u32 = 0x0800_0000;
/// Bank-select bits start here in the cartridge address.
pub const BANK_SHIFT: u32 = 18;

/// Written at the start of every slot once it has been formatted.
pub const MAGIC: u32 = 0x6464_6464;
/// Bytes reserved at the start of each slot for [`MAGIC`].
pub const HEADER_SZ: usize = core::mem::size_of::<u32>();
