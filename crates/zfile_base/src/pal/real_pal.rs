use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, instrument};

use crate::{ZFileError, ZFileResult};

use super::FilePath;
use super::traits::{
    DirEntry, EntryKind, LockKind, LockSupport, OpenIntent, OpenedDirectory, Pal, PalDirectory,
    PalFile,
};

/* 📖 # Why std::fs plus libc instead of a portability crate?

std::fs already covers opening, stat, rename, removal and directory listing on every
platform. Only three things have no std equivalent on the stable toolchain we target:
fcntl advisory locks, passwd lookups for `~user`, and observing the result of close(2).
Those go through libc on Unix and degrade to "unsupported" elsewhere.
*/

/// Concrete PAL implementation using the real filesystem via std::fs.
///
/// Relative paths are resolved against `base_dir`; absolute paths are used as they are.
/// The default base directory is empty, meaning the process working directory.
#[derive(Debug, Default)]
pub struct RealPal {
    base_dir: PathBuf,
}

impl RealPal {
    /// Create a new RealPal resolving relative paths against `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Resolve a FilePath to the path handed to the OS.
    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        self.base_dir.join(path.as_path())
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn open_file(&self, path: &FilePath, intent: OpenIntent) -> ZFileResult<Box<dyn PalFile>> {
        let resolved = self.resolve_path(path);
        let mut options = fs::OpenOptions::new();
        match intent {
            OpenIntent::Read => {
                options.read(true);
            }
            OpenIntent::Truncate => {
                options.write(true).create(true).truncate(true);
            }
            OpenIntent::CreateNew => {
                options.write(true).create_new(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    options.mode(0o600);
                }
            }
            OpenIntent::Append => {
                options.read(true).append(true).create(true);
            }
            OpenIntent::Update => {
                options.read(true).write(true);
            }
        }
        let file = options.open(&resolved).map_err(|e| {
            debug!(error = %e, resolved = %resolved.display(), "failed to open file");
            Box::new(ZFileError::io(path.as_str(), e))
        })?;
        debug!(resolved = %resolved.display(), "file opened");
        Ok(Box::new(RealFile { file }))
    }

    fn entry_kind(&self, path: &FilePath) -> Option<EntryKind> {
        let metadata = fs::metadata(self.resolve_path(path)).ok()?;
        Some(if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }

    fn modified_time(&self, path: &FilePath) -> Option<SystemTime> {
        fs::metadata(self.resolve_path(path))
            .and_then(|metadata| metadata.modified())
            .ok()
    }

    #[instrument(skip(self), fields(path = %path))]
    fn delete_file(&self, path: &FilePath) -> ZFileResult<()> {
        fs::remove_file(self.resolve_path(path)).map_err(|e| {
            debug!(error = %e, "failed to delete file");
            Box::new(ZFileError::io(path.as_str(), e))
        })
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    fn move_file(&self, from: &FilePath, to: &FilePath) -> ZFileResult<()> {
        fs::rename(self.resolve_path(from), self.resolve_path(to)).map_err(|e| {
            debug!(error = %e, "failed to move file");
            Box::new(ZFileError::io(from.as_str(), e))
        })
    }

    #[instrument(skip(self), fields(path = %path))]
    fn make_directory(&self, path: &FilePath) -> ZFileResult<()> {
        let resolved = self.resolve_path(path);
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(&resolved).map_err(|e| {
            debug!(error = %e, "failed to create directory");
            Box::new(ZFileError::io(path.as_str(), e))
        })?;
        debug!("directory created");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    fn open_directory(&self, path: &FilePath) -> ZFileResult<OpenedDirectory> {
        let resolved = self.resolve_path(path);
        let entries = fs::read_dir(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open directory");
            Box::new(ZFileError::io(path.as_str(), e))
        })?;
        Ok(OpenedDirectory {
            entries: Box::new(RealDirectory { entries }),
            first: None,
        })
    }

    fn home_directory(&self, user: Option<&str>) -> Option<String> {
        #[cfg(unix)]
        {
            passwd_home(user)
        }
        #[cfg(not(unix))]
        {
            let _ = user;
            None
        }
    }
}

/// Looks up a home directory in the system user database.
#[cfg(unix)]
fn passwd_home(user: Option<&str>) -> Option<String> {
    use std::ffi::{CStr, CString};

    // SAFETY: passwd is plain old data; the lookup functions fill it in.
    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buffer: Vec<libc::c_char> = vec![0; 16 * 1024];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let status = match user {
        Some(name) => {
            let name = CString::new(name).ok()?;
            // SAFETY: all pointers are valid for the duration of the call and
            // the buffer length matches the allocation.
            unsafe {
                libc::getpwnam_r(
                    name.as_ptr(),
                    &mut passwd,
                    buffer.as_mut_ptr(),
                    buffer.len(),
                    &mut result,
                )
            }
        }
        // SAFETY: as above.
        None => unsafe {
            libc::getpwuid_r(
                libc::getuid(),
                &mut passwd,
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut result,
            )
        },
    };
    if status != 0 || result.is_null() || passwd.pw_dir.is_null() {
        debug!(?user, status, "user database lookup failed");
        return None;
    }
    // SAFETY: pw_dir points into `buffer`, which is still alive.
    let dir = unsafe { CStr::from_ptr(passwd.pw_dir) };
    Some(dir.to_string_lossy().into_owned())
}

#[derive(Debug)]
struct RealFile {
    file: fs::File,
}

impl Read for RealFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for RealFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for RealFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

#[cfg(unix)]
fn fcntl_lock(file: &fs::File, lock_type: libc::c_int, command: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: flock is plain old data; zero start and length cover the whole file.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = lock_type as _;
    lock.l_whence = libc::SEEK_SET as _;
    lock.l_start = 0;
    lock.l_len = 0;
    // SAFETY: the descriptor is owned by `file` and `lock` outlives the call.
    let result = unsafe { libc::fcntl(file.as_raw_fd(), command, &mut lock as *mut libc::flock) };
    if result == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl PalFile for RealFile {
    #[cfg(unix)]
    fn lock(&mut self, kind: LockKind) -> io::Result<LockSupport> {
        let lock_type = match kind {
            LockKind::Shared => libc::F_RDLCK,
            LockKind::Exclusive => libc::F_WRLCK,
        };
        fcntl_lock(&self.file, lock_type as libc::c_int, libc::F_SETLKW)?;
        Ok(LockSupport::Applied)
    }

    #[cfg(not(unix))]
    fn lock(&mut self, _kind: LockKind) -> io::Result<LockSupport> {
        Ok(LockSupport::Unsupported)
    }

    #[cfg(unix)]
    fn unlock(&mut self) -> io::Result<LockSupport> {
        fcntl_lock(&self.file, libc::F_UNLCK as libc::c_int, libc::F_SETLK)?;
        Ok(LockSupport::Applied)
    }

    #[cfg(not(unix))]
    fn unlock(&mut self) -> io::Result<LockSupport> {
        Ok(LockSupport::Unsupported)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut file = self.file;
        file.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::io::IntoRawFd;
            let fd = file.into_raw_fd();
            // SAFETY: into_raw_fd transferred ownership of the descriptor to us.
            if unsafe { libc::close(fd) } == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        #[cfg(not(unix))]
        drop(file);
        Ok(())
    }
}

#[derive(Debug)]
struct RealDirectory {
    entries: fs::ReadDir,
}

impl PalDirectory for RealDirectory {
    fn next_entry(&mut self) -> Option<io::Result<DirEntry>> {
        let entry = self.entries.next()?;
        Some(entry.map(|entry| DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: None,
        }))
    }
}
