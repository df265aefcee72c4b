//! Hooking [`SramFs`] into the host's table of filesystem backends.
//!
//! The host keeps a list of `(prefix, backend)` pairs and routes a path
//! such as `sram:/save` to the backend registered under `sram:`, passing
//! it the remainder `/save`.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use enumflags2::BitFlags;
use lazy_static::*;
use spin::Mutex;

use crate::{
    Handle, OpenFlag, PeripheralDma, Result, SramError, SramFile, SramFs, Stat, Whence,
};

/// Prefix [`initialize`] mounts the SRAM files under.
pub const SRAM_SCHEME: &str = "sram:";

/// Backend contract of the host filesystem layer.
pub trait FileSystem: Send + Sync {
    fn open(&self, name: &str, flags: BitFlags<OpenFlag>) -> Result<usize>;
    fn fstat(&self, file: usize) -> Result<Stat>;
    fn lseek(&self, file: usize, pos: i64, whence: Whence) -> Result<usize>;
    fn read(&self, file: usize, buf: &mut [u8]) -> Result<usize>;
    fn write(&self, file: usize, buf: &[u8]) -> Result<usize>;
    fn close(&self, file: usize) -> Result<()>;
}

impl FileSystem for SramFs {
    fn open(&self, name: &str, flags: BitFlags<OpenFlag>) -> Result<usize> {
        // 去掉挂载点后剩下的前导 '/'
        let name = name.strip_prefix('/').unwrap_or(name);
        SramFs::open(self, name, flags).map(Handle::index)
    }

    fn fstat(&self, file: usize) -> Result<Stat> {
        self.stat(Handle::from_index(file))
    }

    fn lseek(&self, file: usize, pos: i64, whence: Whence) -> Result<usize> {
        self.seek(Handle::from_index(file), pos, whence)
    }

    fn read(&self, file: usize, buf: &mut [u8]) -> Result<usize> {
        SramFs::read(self, Handle::from_index(file), buf)
    }

    fn write(&self, file: usize, buf: &[u8]) -> Result<usize> {
        SramFs::write(self, Handle::from_index(file), buf)
    }

    fn close(&self, file: usize) -> Result<()> {
        SramFs::close(self, Handle::from_index(file))
    }
}

#[derive(Default)]
pub struct Mounts {
    entries: Vec<(String, Arc<dyn FileSystem>)>,
}

impl Mounts {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn attach(&mut self, prefix: &str, fs: Arc<dyn FileSystem>) -> Result<()> {
        if self.entries.iter().any(|(p, _)| p == prefix) {
            return Err(SramError::AlreadyMounted(prefix.to_string()));
        }
        self.entries.push((prefix.to_string(), fs));
        Ok(())
    }

    pub fn detach(&mut self, prefix: &str) -> Option<Arc<dyn FileSystem>> {
        let index = self.entries.iter().position(|(p, _)| p == prefix)?;
        Some(self.entries.remove(index).1)
    }

    /// Backend owning `path`, and the part of `path` after its prefix.
    pub fn resolve<'p>(&self, path: &'p str) -> Result<(Arc<dyn FileSystem>, &'p str)> {
        self.entries
            .iter()
            .find_map(|(prefix, fs)| {
                path.strip_prefix(prefix.as_str())
                    .map(|rest| (fs.clone(), rest))
            })
            .ok_or(SramError::NotFound)
    }

    pub fn is_mounted(&self, prefix: &str) -> bool {
        self.entries.iter().any(|(p, _)| p == prefix)
    }
}

lazy_static! {
    /// Process-wide backend table used by [`initialize`].
    pub static ref MOUNTS: Mutex<Mounts> = Mutex::new(Mounts::new());
}

/// Build the SRAM filesystem over `dev` and mount it under
/// [`SRAM_SCHEME`] in `mounts`.
pub fn initialize_in(
    mounts: &mut Mounts,
    dev: Arc<dyn PeripheralDma>,
    files: &[SramFile],
) -> Result<Arc<SramFs>> {
    let fs = Arc::new(SramFs::new(dev, files)?);
    mounts.attach(SRAM_SCHEME, fs.clone())?;
    log::info!(
        "mounted {} sram files ({} bytes) at {SRAM_SCHEME}",
        fs.table().len(),
        fs.table().total_size()
    );
    Ok(fs)
}

/// [`initialize_in`] against the global [`MOUNTS`].
pub fn initialize(dev: Arc<dyn PeripheralDma>, files: &[SramFile]) -> Result<Arc<SramFs>> {
    initialize_in(&mut MOUNTS.lock(), dev, files)
}
