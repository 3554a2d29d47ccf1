//! Block device geometry queries
//!
//! Used by the driver to bound a scan whose end sector was not given and to
//! warn when the configured sector size is smaller than the device's logical
//! block size (direct reads would then fail with EINVAL).

use std::fs::File;
use std::os::unix::fs::FileTypeExt;

// ioctl request codes (linux/fs.h)
#[cfg(target_os = "linux")]
const BLKGETSIZE64: libc::c_ulong = 0x80081272;
#[cfg(target_os = "linux")]
const BLKSSZGET: libc::c_ulong = 0x1268;

/// Size in bytes of a regular file or block device
///
/// Returns `None` for other file types or when the size query fails.
pub fn capacity(file: &File) -> Option<u64> {
    let metadata = file.metadata().ok()?;
    let file_type = metadata.file_type();

    if file_type.is_file() {
        Some(metadata.len())
    } else if file_type.is_block_device() {
        block_device_size(file)
    } else {
        None
    }
}

/// Logical sector size of a block device
pub fn logical_block_size(file: &File) -> Option<u32> {
    let metadata = file.metadata().ok()?;
    if !metadata.file_type().is_block_device() {
        return None;
    }
    block_device_sector_size(file)
}

#[cfg(target_os = "linux")]
fn block_device_size(file: &File) -> Option<u64> {
    use std::os::unix::io::AsRawFd;

    let mut size: u64 = 0;
    let result = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
    if result < 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "ioctl(BLKGETSIZE64) failed, device size unknown"
        );
        return None;
    }
    Some(size)
}

#[cfg(target_os = "linux")]
fn block_device_sector_size(file: &File) -> Option<u32> {
    use std::os::unix::io::AsRawFd;

    let mut size: libc::c_int = 0;
    let result = unsafe { libc::ioctl(file.as_raw_fd(), BLKSSZGET as _, &mut size) };
    if result < 0 || size <= 0 {
        return None;
    }
    Some(size as u32)
}

#[cfg(not(target_os = "linux"))]
fn block_device_size(_file: &File) -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn block_device_sector_size(_file: &File) -> Option<u32> {
    None
}
