// 服务于文件的读写接口
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use enumflags2::{bitflags, BitFlags};
use spin::Mutex;

use crate::{
    FileTable, PeripheralDma, Result, SectorCache, SramError, SramFile, HEADER_SZ, MAGIC,
    SECTOR_SZ,
};

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 只写
    WRONLY = 0b0000_0000_0001,
    /// 读写兼备
    RDWR = 0b0000_0000_0010,
    /// 槽未初始化时初始化它
    CREATE = 0b0010_0000_0000,
}

impl OpenFlag {
    // enumflags2拒绝值为0的标志
    /// 只读
    pub const RDONLY: u32 = 0b0000_0000_0000;

    #[inline]
    pub fn read_only() -> BitFlags<OpenFlag> {
        BitFlags::from_bits_truncate(Self::RDONLY)
    }

    #[inline]
    pub fn read_write() -> BitFlags<OpenFlag> {
        OpenFlag::RDWR.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: StatKind,
    /// Transfer granularity
    pub block_size: usize,
    /// Sectors covered by the slot
    pub blocks: usize,
    /// Whole slot size, header included.
    ///
    /// This is four bytes more than `read` can ever return from offset 0;
    /// callers that size buffers from it should subtract [`HEADER_SZ`].
    pub size: usize,
}

/// 1-based index of a slot in the file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// The SRAM file layer: a fixed table of slots plus one cursor per slot.
///
/// Handles are slot indices, so every open of the same name shares one
/// cursor, and each `open` rewinds it.
pub struct SramFs {
    table: FileTable,
    // 可变的游标和只读的文件表分开存放；下标与句柄一致
    cursors: Mutex<Vec<usize>>,
    cache: SectorCache,
}

impl fmt::Debug for SramFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SramFs")
            .field("table", &self.table)
            .field("timeout", &self.cache.timeout())
            .finish()
    }
}

impl SramFs {
    pub fn new(dev: Arc<dyn PeripheralDma>, files: &[SramFile]) -> Result<Self> {
        let table = FileTable::new(files)?;
        let cursors = vec![0; table.len() + 1];
        Ok(Self {
            table,
            cursors: Mutex::new(cursors),
            cache: SectorCache::new(dev),
        })
    }

    /// Bound every DMA wait to `timeout` status polls.
    pub fn with_timeout(mut self, timeout: Option<u32>) -> Self {
        self.cache = self.cache.with_timeout(timeout);
        self
    }

    pub fn table(&self) -> &FileTable {
        &self.table
    }

    pub fn files(&self) -> impl Iterator<Item = &SramFile> + '_ {
        self.table.iter()
    }

    pub fn handle_of(&self, name: &str) -> Result<Handle> {
        self.table.lookup(name).map(Handle).ok_or(SramError::NotFound)
    }

    fn file(&self, handle: Handle) -> Result<&SramFile> {
        self.table.get(handle.0)
    }

    fn payload_start(&self, handle: Handle) -> Result<usize> {
        Ok(self.table.slot_start(handle.0)? + HEADER_SZ)
    }

    pub fn payload_len(&self, handle: Handle) -> Result<usize> {
        Ok(self.file(handle)?.payload_len())
    }

    /// Whether the slot carries the magic header.
    pub fn is_formatted(&self, handle: Handle) -> Result<bool> {
        let start = self.table.slot_start(handle.0)?;
        let mut magic = [0u8; HEADER_SZ];
        self.cache.read_at(start, &mut magic)?;
        Ok(u32::from_be_bytes(magic) == MAGIC)
    }

    /// Write the magic header and zero the whole payload.
    pub fn format(&self, handle: Handle) -> Result<()> {
        let file = self.file(handle)?;
        let start = self.table.slot_start(handle.0)?;
        log::debug!("formatting sram slot {:?} at {start:#x}", file.name);
        self.cache.write_at(start, &MAGIC.to_be_bytes())?;
        self.cache.fill(start + HEADER_SZ, file.payload_len(), 0)
    }

    pub fn open(&self, name: &str, flags: BitFlags<OpenFlag>) -> Result<Handle> {
        let handle = self.handle_of(name)?;
        if !self.is_formatted(handle)? {
            if flags.bits() == OpenFlag::RDONLY {
                log::warn!("sram file {name:?} has never been written");
                return Err(SramError::ReadOnlyMiss);
            }
            // 首次使用：写入魔数并清零
            self.format(handle)?;
        }
        self.cursors.lock()[handle.0] = 0;
        log::debug!("opened sram file {name:?} as {}", handle.0);
        Ok(handle)
    }

    pub fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let file = self.file(handle)?;
        let start = self.payload_start(handle)?;
        let mut cursors = self.cursors.lock();
        let cursor = cursors[handle.0];
        let len = buf.len().min(file.payload_len().saturating_sub(cursor));
        if len == 0 {
            return Ok(0);
        }
        self.cache.read_at(start + cursor, &mut buf[..len])?;
        cursors[handle.0] = cursor + len;
        Ok(len)
    }

    /// A zero-length write succeeds wherever the cursor is and moves nothing.
    pub fn write(&self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let file = self.file(handle)?;
        let start = self.payload_start(handle)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors[handle.0];
        let capacity = file.payload_len();
        if cursor
            .checked_add(buf.len())
            .map_or(true, |end| end > capacity)
        {
            log::warn!(
                "refusing {} byte write at {cursor} into {:?}",
                buf.len(),
                file.name
            );
            return Err(SramError::SlotOverrun {
                handle: handle.0,
                cursor,
                len: buf.len(),
                capacity,
            });
        }
        self.cache.write_at(start + cursor, buf)?;
        cursors[handle.0] = cursor + buf.len();
        Ok(buf.len())
    }

    /// Move the cursor; the result is clamped to `[0, stat().size]`.
    pub fn seek(&self, handle: Handle, pos: i64, whence: Whence) -> Result<usize> {
        let size = self.file(handle)?.size;
        let mut cursors = self.cursors.lock();
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => cursors[handle.0] as i64,
            Whence::End => size as i64,
        };
        let cursor = base.saturating_add(pos).clamp(0, size as i64) as usize;
        cursors[handle.0] = cursor;
        Ok(cursor)
    }

    pub fn tell(&self, handle: Handle) -> Result<usize> {
        self.file(handle)?;
        Ok(self.cursors.lock()[handle.0])
    }

    pub fn stat(&self, handle: Handle) -> Result<Stat> {
        let size = self.file(handle)?.size;
        Ok(Stat {
            kind: StatKind::Regular,
            block_size: SECTOR_SZ,
            blocks: size.div_ceil(SECTOR_SZ),
            size,
        })
    }

    /// Nothing to release; the cursor stays until the next `open`.
    pub fn close(&self, handle: Handle) -> Result<()> {
        self.file(handle)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemSram;

    fn fs() -> (Arc<MemSram>, SramFs) {
        let sram = Arc::new(MemSram::new());
        let files = [SramFile::new("a", 64), SramFile::new("b", 36)];
        let fs = SramFs::new(sram.clone(), &files).unwrap();
        (sram, fs)
    }

    #[test]
    fn repeated_opens_share_one_cursor() {
        let (_, fs) = fs();
        let first = fs.open("a", OpenFlag::read_write()).unwrap();
        fs.write(first, b"abcd").unwrap();
        let second = fs.open("A", OpenFlag::read_write()).unwrap();
        assert_eq!(first, second);
        // 第二次 open 把共享的游标归零
        assert_eq!(fs.tell(first), Ok(0));

        let mut buf = [0u8; 2];
        fs.read(second, &mut buf).unwrap();
        assert_eq!(fs.tell(first), Ok(2));
    }

    #[test]
    fn close_keeps_cursor() {
        let (_, fs) = fs();
        let h = fs.open("b", OpenFlag::read_write()).unwrap();
        fs.seek(h, 7, Whence::Set).unwrap();
        fs.close(h).unwrap();
        assert_eq!(fs.tell(h), Ok(7));
    }

    #[test]
    fn stat_counts_header() {
        let (_, fs) = fs();
        let h = fs.open("b", OpenFlag::read_write()).unwrap();
        let st = fs.stat(h).unwrap();
        assert_eq!(st.size, 36);
        assert_eq!(st.blocks, 3);
        assert_eq!(fs.payload_len(h), Ok(32));
    }

    #[test]
    fn read_stops_at_end_of_payload() {
        let (_, fs) = fs();
        let h = fs.open("b", OpenFlag::read_write()).unwrap();
        fs.seek(h, 30, Whence::Set).unwrap();
        let mut buf = [0xEEu8; 8];
        assert_eq!(fs.read(h, &mut buf), Ok(2));
        assert_eq!(&buf[..2], &[0, 0]);
        assert_eq!(fs.read(h, &mut buf), Ok(0));

        fs.seek(h, 0, Whence::End).unwrap();
        assert_eq!(fs.read(h, &mut buf), Ok(0));
    }

    #[test]
    fn empty_write_in_header_gap() {
        let (sram, fs) = fs();
        let h = fs.open("b", OpenFlag::read_write()).unwrap();
        // 游标可以停在负载末尾与 stat().size 之间
        assert_eq!(fs.seek(h, 34, Whence::Set), Ok(34));
        sram.reset_counters();
        assert_eq!(fs.write(h, &[]), Ok(0));
        assert_eq!(fs.tell(h), Ok(34));
        assert!(matches!(fs.write(h, &[1]), Err(SramError::SlotOverrun { .. })));
        assert_eq!(sram.reads() + sram.writes(), 0);
    }

    #[test]
    fn overrun_is_reported_and_neighbour_untouched() {
        let (sram, fs) = fs();
        let a = fs.open("a", OpenFlag::read_write()).unwrap();
        let b = fs.open("b", OpenFlag::read_write()).unwrap();
        let before = sram.peek(64, 36);

        fs.seek(a, 58, Whence::Set).unwrap();
        assert_eq!(
            fs.write(a, &[0xFF; 4]),
            Err(SramError::SlotOverrun {
                handle: 1,
                cursor: 58,
                len: 4,
                capacity: 60
            })
        );
        assert_eq!(sram.peek(64, 36), before);
        assert_eq!(fs.tell(a), Ok(58));
        assert_eq!(fs.write(a, &[0xFF; 2]), Ok(2));
        assert!(fs.is_formatted(b).unwrap());
    }

    #[test]
    fn bad_handles() {
        let (_, fs) = fs();
        let mut buf = [0u8; 1];
        assert_eq!(
            fs.read(Handle::from_index(0), &mut buf),
            Err(SramError::BadHandle(0))
        );
        assert_eq!(
            fs.stat(Handle::from_index(3)),
            Err(SramError::BadHandle(3))
        );
    }
}
