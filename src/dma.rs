//! The cartridge Peripheral Interface (PI) DMA engine.
//!
//! Register writes have to land in program order, so every store is
//! followed by a barrier, and the whole sequence runs with interrupts
//! masked so nothing else can touch the PI in between.

use core::cell::UnsafeCell;
use core::ptr::NonNull;
use core::sync::atomic::{fence, Ordering};

use crate::{PeripheralDma, PhysAddr, Result, SectorBuf, SramError};

/// Uncached KSEG1 address of the PI register block.
pub const PI_REGS_BASE: usize = 0xA460_0000;

const STATUS_DMA_BUSY: u32 = 1 << 0;
const STATUS_IO_BUSY: u32 = 1 << 1;

/// An MMIO register which may be both read and written.
#[repr(transparent)]
pub struct Volatile<T: Copy>(UnsafeCell<T>);

impl<T: Copy> Volatile<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// volatile read
    pub fn read(&self) -> T {
        unsafe { core::ptr::read_volatile(self.0.get()) }
    }

    /// volatile write
    pub fn write(&self, value: T) {
        unsafe { core::ptr::write_volatile(self.0.get(), value) }
    }
}

/// PI register layout.
#[repr(C)]
pub struct PiRegs {
    /// RDRAM side of the transfer
    pub ram_address: Volatile<u32>,
    /// Cartridge side of the transfer
    pub pi_address: Volatile<u32>,
    /// Length - 1 of a RDRAM -> cartridge transfer; writing starts it
    pub read_length: Volatile<u32>,
    /// Length - 1 of a cartridge -> RDRAM transfer; writing starts it
    pub write_length: Volatile<u32>,
    pub status: Volatile<u32>,
}

impl PiRegs {
    pub const fn new() -> Self {
        Self {
            ram_address: Volatile::new(0),
            pi_address: Volatile::new(0),
            read_length: Volatile::new(0),
            write_length: Volatile::new(0),
            status: Volatile::new(0),
        }
    }
}

impl Default for PiRegs {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU-side services the engine needs but cannot provide portably.
pub trait Platform: Send + Sync + 'static {
    fn disable_interrupts(&self);
    fn enable_interrupts(&self);

    fn memory_barrier(&self) {
        fence(Ordering::SeqCst);
    }

    /// Write back dirty lines covering `buf` to RDRAM.
    fn data_cache_writeback(&self, buf: &[u8]);

    /// Write back and drop lines covering `buf` so later loads see RDRAM.
    fn data_cache_writeback_invalidate(&self, buf: &[u8]);

    /// RDRAM address of a CPU pointer.
    fn dram_address(&self, ptr: *const u8) -> u32 {
        (ptr as usize as u32) & 0x1FFF_FFFF
    }
}

/// 中断守卫：构造时屏蔽中断，析构时恢复
struct InterruptGuard<'a, P: Platform>(&'a P);

impl<'a, P: Platform> InterruptGuard<'a, P> {
    fn enter(platform: &'a P) -> Self {
        platform.disable_interrupts();
        Self(platform)
    }
}

impl<P: Platform> Drop for InterruptGuard<'_, P> {
    fn drop(&mut self) {
        self.0.enable_interrupts();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// cartridge -> RDRAM
    ToRam,
    /// RDRAM -> cartridge
    ToCart,
}

pub struct PiDma<P: Platform> {
    regs: NonNull<PiRegs>,
    platform: P,
}

// 寄存器只在屏蔽中断的临界区内访问，且上层保证同一时刻只有一个调用者
unsafe impl<P: Platform> Send for PiDma<P> {}
unsafe impl<P: Platform> Sync for PiDma<P> {}

impl<P: Platform> PiDma<P> {
    /// # Safety
    ///
    /// `regs` must point at the PI register block (or something laid out
    /// like it) for as long as the engine lives, and no other code may
    /// program the PI concurrently.
    pub unsafe fn new(regs: NonNull<PiRegs>, platform: P) -> Self {
        Self { regs, platform }
    }

    /// # Safety
    ///
    /// See [`PiDma::new`]; the caller must be running on the hardware.
    pub unsafe fn at_hardware(platform: P) -> Self {
        Self::new(NonNull::new_unchecked(PI_REGS_BASE as *mut PiRegs), platform)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    fn regs(&self) -> &PiRegs {
        unsafe { self.regs.as_ref() }
    }

    /// Spin until the PI is idle, or until `timeout` polls have been spent.
    fn wait_idle(&self, timeout: Option<u32>) -> Result<()> {
        let mut polls = 0u32;
        while self.regs().status.read() & (STATUS_DMA_BUSY | STATUS_IO_BUSY) != 0 {
            if let Some(limit) = timeout {
                if polls >= limit {
                    log::error!("pi dma still busy after {limit} polls");
                    return Err(SramError::DmaTimeout);
                }
                polls += 1;
            }
            core::hint::spin_loop();
        }
        Ok(())
    }

    fn transfer(
        &self,
        ram: *const u8,
        len: usize,
        addr: PhysAddr,
        dir: Direction,
        timeout: Option<u32>,
    ) -> Result<()> {
        let _guard = InterruptGuard::enter(&self.platform);
        let regs = self.regs();
        self.wait_idle(timeout)?;
        self.platform.memory_barrier();
        regs.ram_address.write(self.platform.dram_address(ram));
        self.platform.memory_barrier();
        regs.pi_address.write(addr.0);
        self.platform.memory_barrier();
        let length = (len - 1) as u32;
        match dir {
            Direction::ToRam => regs.write_length.write(length),
            Direction::ToCart => regs.read_length.write(length),
        }
        self.platform.memory_barrier();
        self.wait_idle(timeout)
    }
}

impl<P: Platform> PeripheralDma for PiDma<P> {
    fn read_block(&self, buf: &mut SectorBuf, addr: PhysAddr, timeout: Option<u32>) -> Result<()> {
        log::trace!("pi dma read {addr}");
        let len = buf.len();
        self.transfer(buf.as_mut_ptr(), len, addr, Direction::ToRam, timeout)?;
        self.platform.data_cache_writeback_invalidate(&buf[..]);
        Ok(())
    }

    fn write_block(&self, buf: &SectorBuf, addr: PhysAddr, timeout: Option<u32>) -> Result<()> {
        log::trace!("pi dma write {addr}");
        self.platform.data_cache_writeback(&buf[..]);
        self.transfer(buf.as_ptr(), buf.len(), addr, Direction::ToCart, timeout)
    }
}
