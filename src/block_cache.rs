use alloc::sync::Arc;
use spin::Mutex;

use crate::{translate, PeripheralDma, Result, SectorBuf, SramError, SECTOR_SZ, SRAM_CAPACITY};

// 硬件只能整扇区搬运：任意偏移、任意长度的读写都要拆成若干个对齐扇区，
// 写入不满一个扇区时先读出旧数据再覆盖，保证同扇区其余字节不被破坏
pub struct SectorCache {
    dev: Arc<dyn PeripheralDma>,
    // 唯一的 DMA 缓冲区；锁住它就等于独占了外设
    scratch: Mutex<SectorBuf>,
    timeout: Option<u32>,
}

impl SectorCache {
    pub fn new(dev: Arc<dyn PeripheralDma>) -> Self {
        Self {
            dev,
            scratch: Mutex::new(SectorBuf::zeroed()),
            timeout: None,
        }
    }

    /// Give up on a DMA transfer after `timeout` status polls.
    pub fn with_timeout(mut self, timeout: Option<u32>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<u32> {
        self.timeout
    }

    pub fn device(&self) -> &Arc<dyn PeripheralDma> {
        &self.dev
    }
}

impl SectorCache {
    fn check_range(offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end < SRAM_CAPACITY => Ok(()),
            _ => {
                log::error!("sram access of {len} bytes at {offset:#x} is out of range");
                Err(SramError::CapacityExceeded { offset, len })
            }
        }
    }

    fn load(&self, scratch: &mut SectorBuf, sector: usize) -> Result<()> {
        self.dev.read_block(scratch, translate(sector)?, self.timeout)
    }

    fn store(&self, scratch: &SectorBuf, sector: usize) -> Result<()> {
        self.dev.write_block(scratch, translate(sector)?, self.timeout)
    }

    /// Walk `[offset, offset + len)` one sector at a time, handing `f` the
    /// position inside the range and the sector slice it covers.
    fn modify(
        &self,
        offset: usize,
        len: usize,
        mut f: impl FnMut(usize, &mut [u8]),
    ) -> Result<()> {
        Self::check_range(offset, len)?;
        let mut scratch = self.scratch.lock();
        let mut done = 0;
        while done < len {
            let pos = offset + done;
            let sector = pos - pos % SECTOR_SZ;
            let within = pos - sector;
            let n = (SECTOR_SZ - within).min(len - done);

            // 整扇区覆盖时可以省掉读
            if within != 0 || n != SECTOR_SZ {
                self.load(&mut scratch, sector)?;
            }
            f(done, &mut scratch[within..within + n]);
            self.store(&scratch, sector)?;
            done += n;
        }
        Ok(())
    }

    /// Fill `dst` from SRAM starting at flat `offset`.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        Self::check_range(offset, dst.len())?;
        let mut scratch = self.scratch.lock();
        let mut done = 0;
        while done < dst.len() {
            let pos = offset + done;
            let sector = pos - pos % SECTOR_SZ;
            let within = pos - sector;
            let n = (SECTOR_SZ - within).min(dst.len() - done);

            self.load(&mut scratch, sector)?;
            dst[done..done + n].copy_from_slice(&scratch[within..within + n]);
            done += n;
        }
        Ok(())
    }

    /// Store `src` into SRAM starting at flat `offset`.
    pub fn write_at(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.modify(offset, src.len(), |done, sector| {
            sector.copy_from_slice(&src[done..done + sector.len()]);
        })
    }

    /// Set `len` bytes starting at `offset` to `byte`.
    pub fn fill(&self, offset: usize, len: usize, byte: u8) -> Result<()> {
        self.modify(offset, len, |_, sector| sector.fill(byte))
    }
}
