// src/fsattr.rs

//! File attribute and timestamp probing
//!
//! Timestamps are unsigned microseconds since the Unix epoch. Support
//! differs per operating system, so every operation degrades gracefully:
//! getters return 0 (the "unknown" sentinel) when a value cannot be read,
//! setters silently skip what the platform cannot apply. Nothing in this
//! module is ever fatal.
//!
//! Stored timestamps are distrusted: any seconds value at or past
//! 1 Jan 2050 UTC, or a nanosecond field above 999 999 999, is treated as
//! corrupt and ignored.

use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Seconds of 1 Jan 2050 UTC; stored times at or past this are corrupt.
const MAX_SANE_SECS: u64 = 2_524_608_000;

const MICROS_PER_SEC: u64 = 1_000_000;

fn sane_micros(secs: u64, nanos: u32) -> Option<u64> {
    if secs >= MAX_SANE_SECS || nanos > 999_999_999 {
        return None;
    }
    Some(secs * MICROS_PER_SEC + u64::from(nanos) / 1_000)
}

fn system_time_micros(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => sane_micros(d.as_secs(), d.subsec_nanos()).unwrap_or(0),
        Err(_) => 0,
    }
}

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    system_time_micros(SystemTime::now())
}

/// Last-modification time of a file, or 0 when unreadable or insane.
pub fn modify_time(path: &Path) -> u64 {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => system_time_micros(t),
        Err(_) => 0,
    }
}

/// Set the last-modification time of a file. Best effort; insane values
/// and platform refusals are skipped.
pub fn set_modify_time(path: &Path, micros: u64) {
    let secs = micros / MICROS_PER_SEC;
    let nanos = (micros % MICROS_PER_SEC) as u32 * 1_000;
    if sane_micros(secs, nanos).is_none() {
        return;
    }
    let ft = FileTime::from_unix_time(secs as i64, nanos);
    if let Err(e) = filetime::set_file_mtime(path, ft) {
        debug!("could not set mtime on {}: {}", path.display(), e);
    }
}

/// Creation (birth) time of a file where the OS records one, otherwise 0.
pub fn create_time(path: &Path) -> u64 {
    match fs::metadata(path).and_then(|m| m.created()) {
        Ok(t) => system_time_micros(t),
        Err(_) => 0,
    }
}

/// Set the creation time of a file through the Windows file-time API.
/// Best effort; insane values and platform refusals are skipped.
#[cfg(windows)]
pub fn set_create_time(path: &Path, micros: u64) {
    use std::os::windows::fs::OpenOptionsExt;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::FILETIME;
    use windows_sys::Win32::Storage::FileSystem::{SetFileTime, FILE_WRITE_ATTRIBUTES};

    // FILETIME counts 100 ns ticks since 1 Jan 1601; the framework time
    // counts microseconds since 1 Jan 1970.
    const MICROS_1601_TO_1970: u64 = 11_644_473_600_000_000;
    const TICKS_PER_MICRO: u64 = 10;

    let secs = micros / MICROS_PER_SEC;
    let nanos = (micros % MICROS_PER_SEC) as u32 * 1_000;
    if sane_micros(secs, nanos).is_none() {
        return;
    }

    let file = match fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(path)
    {
        Ok(file) => file,
        Err(e) => {
            debug!(
                "could not open {} for attribute write: {}",
                path.display(),
                e
            );
            return;
        }
    };

    let ticks = (micros + MICROS_1601_TO_1970) * TICKS_PER_MICRO;
    let creation = FILETIME {
        dwLowDateTime: ticks as u32,
        dwHighDateTime: (ticks >> 32) as u32,
    };
    // Null access/write times leave those fields untouched.
    // SAFETY: valid handle with FILE_WRITE_ATTRIBUTES access, pointer to
    // a live FILETIME; the handle closes when `file` drops.
    let ok = unsafe {
        SetFileTime(
            file.as_raw_handle() as _,
            &creation,
            std::ptr::null(),
            std::ptr::null(),
        )
    };
    if ok == 0 {
        debug!("could not set creation time on {}", path.display());
    }
}

/// The portable file-time API has no creation-time setter outside
/// Windows; the capability matrix keeps this a no-op there.
#[cfg(not(windows))]
pub fn set_create_time(_path: &Path, _micros: u64) {}

/// Whether any execute bit (user, group or other) is set on a regular file.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match fs::metadata(path) {
        Ok(m) => m.is_file() && m.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    false
}

/// Mark a file executable (rwxr-xr-x). Best effort.
#[cfg(unix)]
pub fn set_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o755)) {
        debug!("could not set exec bits on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) {}

/// Whether the file carries the platform read-only attribute.
#[cfg(windows)]
pub fn is_readonly(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(m) => m.permissions().readonly(),
        Err(_) => false,
    }
}

/// Mark the file read-only through the platform attribute. Best effort.
#[cfg(windows)]
pub fn set_readonly(path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_readonly(true);
        if let Err(e) = fs::set_permissions(path, perms) {
            debug!("could not set read-only on {}: {}", path.display(), e);
        }
    }
}

#[cfg(all(target_os = "linux", feature = "linux-immutable"))]
mod immutable {
    use nix::libc;
    use std::fs::File;
    use std::os::fd::AsRawFd;
    use std::path::Path;
    use tracing::debug;

    const FS_IMMUTABLE_FL: libc::c_long = 0x0000_0010;

    nix::ioctl_read!(fs_ioc_getflags, b'f', 1, libc::c_long);
    nix::ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, libc::c_long);

    pub fn is_readonly(path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let mut flags: libc::c_long = 0;
        // SAFETY: valid fd, pointer to a live c_long
        match unsafe { fs_ioc_getflags(file.as_raw_fd(), &mut flags) } {
            Ok(_) => flags & FS_IMMUTABLE_FL != 0,
            Err(_) => false,
        }
    }

    pub fn set_readonly(path: &Path) {
        let Ok(file) = File::open(path) else {
            return;
        };
        let mut flags: libc::c_long = 0;
        // SAFETY: valid fd, pointer to a live c_long
        if unsafe { fs_ioc_getflags(file.as_raw_fd(), &mut flags) }.is_err() {
            return;
        }
        flags |= FS_IMMUTABLE_FL;
        // SAFETY: same as above; requires CAP_LINUX_IMMUTABLE at runtime
        if let Err(e) = unsafe { fs_ioc_setflags(file.as_raw_fd(), &flags) } {
            debug!("could not set immutable flag on {}: {}", path.display(), e);
        }
    }
}

#[cfg(all(target_os = "linux", feature = "linux-immutable"))]
pub use immutable::{is_readonly, set_readonly};

/// The generic POSIX API has no read-only attribute; report "not set".
#[cfg(not(any(windows, all(target_os = "linux", feature = "linux-immutable"))))]
pub fn is_readonly(_path: &Path) -> bool {
    false
}

#[cfg(not(any(windows, all(target_os = "linux", feature = "linux-immutable"))))]
pub fn set_readonly(_path: &Path) {}
