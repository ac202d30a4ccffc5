//! Memory-mapped register window.
//!
//! A `RegisterWindow` maps one page-aligned physical address range through
//! the privileged memory device (`/dev/mem`) and exposes it as an array of
//! 32-bit registers. All accesses are volatile. Anonymous windows back the
//! same API with ordinary memory so register encodings can be exercised
//! without hardware.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use log::debug;

use crate::error::{GpioError, Result};

#[derive(Debug)]
pub struct RegisterWindow {
    base: u64,
    len: usize,
    ptr: NonNull<u32>,
    source: Option<PathBuf>,
}

// The mapping is plain device memory owned by this value; the pointer is
// never handed out with a lifetime beyond `&self`.
unsafe impl Send for RegisterWindow {}
unsafe impl Sync for RegisterWindow {}

impl RegisterWindow {
    /// Map `len` bytes of physical memory at `base` from `device`.
    pub fn open(device: impl AsRef<Path>, base: u64, len: usize) -> Result<Self> {
        let device = device.as_ref();
        let map_err = |source: std::io::Error| GpioError::Map {
            path: device.to_path_buf(),
            base,
            source,
        };

        let offset = libc::off_t::try_from(base).map_err(|_| {
            map_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "base address does not fit the platform file offset",
            ))
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(device)
            .map_err(map_err)?;

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(map_err(std::io::Error::last_os_error()));
        }

        // The descriptor is not needed once the mapping exists.
        drop(file);

        debug!("Mapped {} bytes at 0x{:08X} from {}", len, base, device.display());
        Ok(Self {
            base,
            len,
            ptr: non_null(addr, device, base)?,
            source: Some(device.to_path_buf()),
        })
    }

    /// Zero-filled private memory with the layout of a register window.
    pub fn anonymous(len: usize) -> Result<Self> {
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(GpioError::Map {
                path: PathBuf::from("<anonymous>"),
                base: 0,
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(Self {
            base: 0,
            len,
            ptr: non_null(addr, Path::new("<anonymous>"), 0)?,
            source: None,
        })
    }

    /// Physical base address (0 for anonymous windows)
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of addressable 32-bit words
    pub fn words(&self) -> usize {
        self.len / 4
    }

    /// Device the window was mapped from, `None` for anonymous windows
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Raw pointer to register `word`.
    ///
    /// # Panics
    /// If `word` lies outside the window. Register offsets are compile-time
    /// constants of the backends, so this is a programming error.
    pub fn pointer_at(&self, word: usize) -> *mut u32 {
        assert!(
            word < self.words(),
            "register word {word} outside a {}-byte window",
            self.len
        );
        // In bounds per the assertion above.
        unsafe { self.ptr.as_ptr().add(word) }
    }

    pub fn read(&self, word: usize) -> u32 {
        unsafe { ptr::read_volatile(self.pointer_at(word)) }
    }

    pub fn write(&self, word: usize, value: u32) {
        unsafe { ptr::write_volatile(self.pointer_at(word), value) }
    }

    /// Read-modify-write of one register, returns the written value.
    pub fn modify(&self, word: usize, f: impl FnOnce(u32) -> u32) -> u32 {
        let value = f(self.read(word));
        self.write(word, value);
        value
    }
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
        debug!("Unmapped register window at 0x{:08X}", self.base);
    }
}

fn non_null(addr: *mut libc::c_void, path: &Path, base: u64) -> Result<NonNull<u32>> {
    NonNull::new(addr as *mut u32).ok_or_else(|| GpioError::Map {
        path: path.to_path_buf(),
        base,
        source: std::io::Error::new(std::io::ErrorKind::Other, "mmap returned a null mapping"),
    })
}
