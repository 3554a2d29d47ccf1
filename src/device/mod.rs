//! Raw device handles
//!
//! A [`DeviceHandle`] is an open, read-only descriptor on the device under
//! test with the page cache bypassed, so every probe reaches the device
//! instead of being served from memory.
//!
//! # Cursor semantics
//!
//! Reads are issued with `lseek` + `read` rather than `pread`. The sweep
//! engine positions the cursor before a barrier and issues the read after
//! it, so the seek must not be part of the timed window. Each actor opens its
//! own handle so their cursors are independent.
//!
//! # Platform notes
//!
//! - Linux: `O_DIRECT`. Buffer address, length and offset must be aligned to
//!   the logical block size, otherwise the read fails with EINVAL.
//! - macOS: no `O_DIRECT`; `fcntl(F_NOCACHE)` is set after open. Pages that
//!   are already cached may still be served from the cache.
//! - Other unix: caching cannot be bypassed; a warning is logged.

pub mod block;

use crate::error::BenchError;
use crate::util::buffer::AlignedBuffer;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

/// Flags controlling how a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Bypass the page cache (O_DIRECT / F_NOCACHE)
    pub direct: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self { direct: true }
    }
}

/// Read-only handle on the device under test
///
/// Exclusively owned by the actor that opened it.
#[derive(Debug)]
pub struct DeviceHandle {
    file: Option<File>,
    path: PathBuf,
    /// Cursor position as last set by `seek`/`read`, for error reports
    position: u64,
}

impl DeviceHandle {
    /// Open `path` read-only
    pub fn open(path: &Path, flags: OpenFlags) -> Result<Self, BenchError> {
        let file = open_file(path, flags).map_err(|source| BenchError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), direct = flags.direct, "opened device");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor position in bytes
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor to an absolute byte offset
    pub fn seek(&mut self, offset: u64) -> Result<(), BenchError> {
        let fd = self.raw_fd();
        let target = libc::off_t::try_from(offset).map_err(|_| BenchError::Seek {
            offset,
            source: io::Error::from_raw_os_error(libc::EOVERFLOW),
        })?;

        let result = unsafe { libc::lseek(fd, target, libc::SEEK_SET) };
        if result < 0 {
            return Err(BenchError::Seek {
                offset,
                source: io::Error::last_os_error(),
            });
        }

        self.position = offset;
        Ok(())
    }

    /// Issue one `read` of `length` bytes at the cursor into `buffer`
    ///
    /// A short count, including end of device, is an error: a probe that
    /// transferred fewer bytes than requested did not measure the same thing.
    #[inline(always)]
    pub fn read_exact(&mut self, buffer: &mut AlignedBuffer, length: usize) -> Result<(), BenchError> {
        if length > buffer.size() {
            return Err(BenchError::InvalidConfig(format!(
                "read length {} exceeds buffer size {}",
                length,
                buffer.size()
            )));
        }

        let fd = self.raw_fd();
        let offset = self.position;

        // SAFETY: buffer is valid for `buffer.size()` bytes and length <= size.
        let result = unsafe { libc::read(fd, buffer.as_mut_ptr() as *mut libc::c_void, length) };

        if result < 0 {
            return Err(BenchError::Read {
                offset,
                length,
                source: io::Error::last_os_error(),
            });
        }

        let got = result as usize;
        self.position += got as u64;
        if got != length {
            return Err(BenchError::ShortRead {
                offset,
                expected: length,
                got,
            });
        }

        Ok(())
    }

    /// Close the handle, reporting errors from close(2)
    ///
    /// Dropping the handle also closes it but discards any error.
    pub fn close(mut self) -> Result<(), BenchError> {
        if let Some(file) = self.file.take() {
            let fd = file.into_raw_fd();
            let result = unsafe { libc::close(fd) };
            if result < 0 {
                return Err(BenchError::Close {
                    path: self.path.clone(),
                    source: io::Error::last_os_error(),
                });
            }
        }
        Ok(())
    }

    /// Device capacity in bytes, if it can be determined
    pub fn capacity(&self) -> Option<u64> {
        self.file.as_ref().and_then(block::capacity)
    }

    /// Logical sector size reported by the kernel, for block devices on Linux
    pub fn logical_block_size(&self) -> Option<u32> {
        self.file.as_ref().and_then(block::logical_block_size)
    }

    fn raw_fd(&self) -> libc::c_int {
        self.file
            .as_ref()
            .map(|file| file.as_raw_fd())
            .unwrap_or(-1)
    }
}

#[cfg(target_os = "linux")]
fn open_file(path: &Path, flags: OpenFlags) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.read(true);
    if flags.direct {
        options.custom_flags(libc::O_DIRECT);
    }
    options.open(path)
}

// https://github.com/axboe/fio/issues/48
// macOS has no O_DIRECT; F_NOCACHE is the closest equivalent.
#[cfg(target_os = "macos")]
fn open_file(path: &Path, flags: OpenFlags) -> io::Result<File> {
    let file = OpenOptions::new().read(true).open(path)?;
    if flags.direct {
        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(file)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn open_file(path: &Path, flags: OpenFlags) -> io::Result<File> {
    if flags.direct {
        tracing::warn!("direct IO is not supported on this platform, reads may hit the page cache");
    }
    OpenOptions::new().read(true).open(path)
}
