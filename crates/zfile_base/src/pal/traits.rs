use std::fmt::Debug;
use std::io::{self, Read, Seek, Write};
use std::sync::Arc;
use std::time::SystemTime;

use crate::{ZFileError, ZFileResult};

use super::file_path::FilePath;

/* 📖 # What is the Platform Abstraction Layer (PAL)?

The file layer must behave the same on POSIX, on Windows and on an I/O shim with no
native error queries or locking. Instead of conditional branches inside the shared
logic, every platform call goes through the Pal trait:
- RealPal: std::fs plus libc where std has no equivalent (advisory locks, passwd)
- MockPal: in-memory backend, deterministic and able to inject I/O failures

Shared semantics (save exclusivity, line normalization, entry filtering, directory
creation) live above the trait in zfile_engine and are therefore identical on every
backend.
*/

/// How a backend should open a file.
///
/// Derived from the caller's mode and purpose by the engine, so backends never see the
/// purpose and exclusive creation behaves identically everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenIntent {
    /// Read-only; the file must exist.
    Read,
    /// Write-only; create or truncate.
    Truncate,
    /// Write-only; create, failing with `AlreadyExists` if present. Owner read/write only.
    CreateNew,
    /// Read and append; create if missing.
    Append,
    /// Read and write an existing file without truncating.
    Update,
}

/// Kind of whole-file advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// Whether a lock request reached a real locking primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSupport {
    Applied,
    Unsupported,
}

/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    /// Anything that exists and is not a directory.
    File,
}

/// Raw directory entry as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// `None` when the backend only reports names; callers query the full path instead.
    pub kind: Option<EntryKind>,
}

/// Open file as provided by a backend.
pub trait PalFile: Read + Write + Seek + Debug + Send {
    /// Blocks until a whole-file lock of `kind` is held.
    fn lock(&mut self, kind: LockKind) -> io::Result<LockSupport>;

    /// Releases a lock taken with [`PalFile::lock`].
    fn unlock(&mut self) -> io::Result<LockSupport>;

    /// Flushes and releases the resource, reporting failures dropping would swallow.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Open directory as provided by a backend.
pub trait PalDirectory: Debug + Send {
    /// Next raw entry, including `.` and `..` if the platform reports them.
    fn next_entry(&mut self) -> Option<io::Result<DirEntry>>;
}

/// Result of opening a directory.
#[derive(Debug)]
pub struct OpenedDirectory {
    pub entries: Box<dyn PalDirectory>,
    /// Entry produced by the open call itself on find-first style platforms.
    pub first: Option<DirEntry>,
}

/// Platform Abstraction Layer trait providing the primitive file operations.
pub trait Pal: Debug + Send + Sync + 'static {
    /// Opens a file according to `intent`.
    fn open_file(&self, path: &FilePath, intent: OpenIntent) -> ZFileResult<Box<dyn PalFile>>;

    /// Stats a path. `None` if it cannot be stat'ed.
    fn entry_kind(&self, path: &FilePath) -> Option<EntryKind>;

    /// Last modification time, if the backend tracks one.
    fn modified_time(&self, path: &FilePath) -> Option<SystemTime>;

    fn delete_file(&self, path: &FilePath) -> ZFileResult<()>;

    fn move_file(&self, from: &FilePath, to: &FilePath) -> ZFileResult<()>;

    /// Creates a single directory; the parent must already exist.
    fn make_directory(&self, path: &FilePath) -> ZFileResult<()>;

    fn open_directory(&self, path: &FilePath) -> ZFileResult<OpenedDirectory>;

    /// Home directory of `user`, or of the current user when `None`.
    fn home_directory(&self, user: Option<&str>) -> Option<String>;

    /// Whether a leading `~` means a home directory on this backend.
    fn expands_home(&self) -> bool {
        cfg!(unix)
    }

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &FilePath) -> ZFileResult<String> {
        let mut file = self.open_file(path, OpenIntent::Read)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| Box::new(ZFileError::io(path.as_str(), e)))?;
        file.close()
            .map_err(|e| Box::new(ZFileError::io(path.as_str(), e)))?;
        Ok(contents)
    }
}

/* 📖 # Why use Arc<dyn Pal> with PalHandle?

Arc enables cheap cloning of the backend so that the file system facade, the CLI and
tests can share one instance without lifetime parameters.
*/

/// Handle to a PAL implementation, enabling shared ownership.
///
/// # Examples
///
/// ```no_run
/// use zfile_base::{PalHandle, RealPal};
///
/// let pal = PalHandle::new(RealPal::default());
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
