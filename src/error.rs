use alloc::string::String;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, SramError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SramError {
    /// 文件表或挂载表中没有这个名字
    #[error("no such file")]
    NotFound,
    /// 只读打开一个从未初始化过的槽
    #[error("slot has never been written and was opened read-only")]
    ReadOnlyMiss,
    #[error("transfer of {len} bytes at {offset:#x} leaves the sram window")]
    CapacityExceeded { offset: usize, len: usize },
    #[error("write of {len} bytes at cursor {cursor} overruns slot {handle} ({capacity} payload bytes)")]
    SlotOverrun {
        handle: usize,
        cursor: usize,
        len: usize,
        capacity: usize,
    },
    #[error("dma transfer did not complete in time")]
    DmaTimeout,
    #[error("physical address {0:#010x} is not backed by any bank")]
    InvalidAddress(u32),
    #[error("bad file handle {0}")]
    BadHandle(usize),
    #[error("file table is empty")]
    EmptyTable,
    #[error("file {0:?} appears twice in the table")]
    DuplicateName(String),
    #[error("file {name:?} is {size} bytes, too small for its header")]
    SlotTooSmall { name: String, size: usize },
    #[error("file table needs {total} bytes, more than the sram holds")]
    TableTooLarge { total: usize },
    #[error("a filesystem is already mounted at {0:?}")]
    AlreadyMounted(String),
}
