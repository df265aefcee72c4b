//! The static file table: which named slot lives where in SRAM.

use alloc::string::ToString;
use alloc::vec::Vec;

use crate::{Result, SramError, HEADER_SZ, SRAM_CAPACITY};

/// One entry of the file table.
///
/// `size` counts the whole slot, the 4-byte header included. Slots are
/// packed back to back in table order, so the position of a slot is the
/// sum of the sizes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramFile {
    pub name: &'static str,
    pub size: usize,
}

impl SramFile {
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }

    /// Bytes a reader or writer can reach.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.size - HEADER_SZ
    }
}

/// Validated copy of the file table, indexed by 1-based handle.
#[derive(Debug, Clone)]
pub struct FileTable {
    // 下标 0 是占位项，句柄从 1 开始
    files: Vec<SramFile>,
}

impl FileTable {
    pub fn new(files: &[SramFile]) -> Result<Self> {
        if files.is_empty() {
            return Err(SramError::EmptyTable);
        }

        let mut total = 0usize;
        for (i, file) in files.iter().enumerate() {
            if file.size < HEADER_SZ {
                return Err(SramError::SlotTooSmall {
                    name: file.name.to_string(),
                    size: file.size,
                });
            }
            if files[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(file.name))
            {
                return Err(SramError::DuplicateName(file.name.to_string()));
            }
            total = total.saturating_add(file.size);
        }
        // 每次传输都要求 offset + len < SRAM_CAPACITY，所以表不能恰好占满
        if total >= SRAM_CAPACITY {
            return Err(SramError::TableTooLarge { total });
        }

        let mut table = Vec::with_capacity(files.len() + 1);
        table.push(SramFile::new("", 0));
        table.extend_from_slice(files);
        Ok(Self { files: table })
    }

    /// Number of real entries.
    pub fn len(&self) -> usize {
        self.files.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: usize) -> Result<&SramFile> {
        match handle {
            0 => Err(SramError::BadHandle(0)),
            _ => self.files.get(handle).ok_or(SramError::BadHandle(handle)),
        }
    }

    /// Case-insensitive name lookup.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, file)| file.name.eq_ignore_ascii_case(name))
            .map(|(handle, _)| handle)
    }

    /// Flat SRAM offset of the first byte (the header) of a slot.
    pub fn slot_start(&self, handle: usize) -> Result<usize> {
        self.get(handle)?;
        Ok(self.files[1..handle].iter().map(|file| file.size).sum())
    }

    pub fn total_size(&self) -> usize {
        self.iter().map(|file| file.size).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SramFile> + '_ {
        self.files.iter().skip(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BANK_SZ;

    const FILES: [SramFile; 3] = [
        SramFile::new("config", 64),
        SramFile::new("SAVE0", BANK_SZ),
        SramFile::new("save1", BANK_SZ),
    ];

    #[test]
    fn slots_are_packed() {
        let table = FileTable::new(&FILES).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.slot_start(1), Ok(0));
        assert_eq!(table.slot_start(2), Ok(64));
        assert_eq!(table.slot_start(3), Ok(64 + BANK_SZ));
        assert_eq!(table.total_size(), 64 + 2 * BANK_SZ);
    }

    #[test]
    fn lookup_ignores_case() {
        let table = FileTable::new(&FILES).unwrap();
        assert_eq!(table.lookup("save0"), Some(2));
        assert_eq!(table.lookup("Save1"), Some(3));
        assert_eq!(table.lookup("CONFIG"), Some(1));
        assert_eq!(table.lookup("missing"), None);
        assert_eq!(table.lookup(""), None);
    }

    #[test]
    fn handle_zero_is_reserved() {
        let table = FileTable::new(&FILES).unwrap();
        assert_eq!(table.get(0), Err(SramError::BadHandle(0)));
        assert_eq!(table.get(4), Err(SramError::BadHandle(4)));
        assert_eq!(table.slot_start(9), Err(SramError::BadHandle(9)));
    }

    #[test]
    fn rejects_bad_tables() {
        assert_eq!(FileTable::new(&[]).unwrap_err(), SramError::EmptyTable);
        assert_eq!(
            FileTable::new(&[SramFile::new("a", 16), SramFile::new("A", 16)]).unwrap_err(),
            SramError::DuplicateName("A".to_string())
        );
        assert_eq!(
            FileTable::new(&[SramFile::new("tiny", 3)]).unwrap_err(),
            SramError::SlotTooSmall {
                name: "tiny".to_string(),
                size: 3
            }
        );
        assert_eq!(
            FileTable::new(&[SramFile::new("all", SRAM_CAPACITY)]).unwrap_err(),
            SramError::TableTooLarge {
                total: SRAM_CAPACITY
            }
        );
        assert!(FileTable::new(&[SramFile::new("most", SRAM_CAPACITY - 16)]).is_ok());
    }
}
