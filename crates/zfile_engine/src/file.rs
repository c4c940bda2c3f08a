use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, instrument, warn};

use zfile_base::{
    FilePath, LockKind, LockSupport, OpenIntent, PalFile, ZFileError, ZFileResult,
};

use crate::config::FileSystemConfig;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Read-only; the file must exist.
    Read,
    /// Create or truncate; exclusive create for [`FileType::Save`].
    Write,
    /// Read and append, creating the file if missing.
    Append,
    /// Update an existing file in place.
    ReadWrite,
}

/// What the opened file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Text,
    /// Persisted application state; never overwritten by a write open.
    Save,
    Raw,
    Html,
}

/// Origin of a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Absolute,
    RelativeToCurrent,
}

/// Maps a caller's mode and purpose onto the backend open operation.
pub(crate) fn open_intent(mode: FileMode, file_type: FileType) -> OpenIntent {
    match (mode, file_type) {
        (FileMode::Read, _) => OpenIntent::Read,
        (FileMode::Write, FileType::Save) => OpenIntent::CreateNew,
        (FileMode::Write, _) => OpenIntent::Truncate,
        (FileMode::Append, _) => OpenIntent::Append,
        (FileMode::ReadWrite, _) => OpenIntent::Update,
    }
}

/* 📖 # Why keep a sticky error flag?

Callers stream many small reads and writes and ask once at the end whether anything
went wrong, the way stdio's `ferror` works. std::io has no such state, so the handle
records every failed transfer itself. Failures are still returned from the individual
call; the flag only remembers them.
*/

/// Exclusively owned open file.
///
/// Created by [`FileSystem::open`](crate::FileSystem::open) and consumed by
/// [`FileHandle::close`]. Dropping a handle releases the resource without reporting
/// errors.
#[derive(Debug)]
pub struct FileHandle {
    file: Box<dyn PalFile>,
    path: FilePath,
    mode: FileMode,
    error: bool,
    pub(crate) config: FileSystemConfig,
}

impl FileHandle {
    pub(crate) fn new(
        file: Box<dyn PalFile>,
        path: FilePath,
        mode: FileMode,
        config: FileSystemConfig,
    ) -> Self {
        Self {
            file,
            path,
            mode,
            error: false,
            config,
        }
    }

    /// Path the handle was opened with.
    pub fn path(&self) -> &FilePath {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    fn io_error(&mut self, error: io::Error) -> Box<ZFileError> {
        self.error = true;
        Box::new(ZFileError::io(self.path.as_str(), error))
    }

    /// Flushes and releases the file.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn close(self) -> ZFileResult<()> {
        let path = self.path;
        self.file.close().map_err(|e| {
            Box::new(ZFileError::io(path.as_str(), e).context("Failed to close file"))
        })?;
        debug!("file closed");
        Ok(())
    }

    /// True if any transfer has failed, or if flushing a write-mode handle fails now.
    pub fn has_error(&mut self) -> bool {
        if self.error {
            return true;
        }
        if self.mode == FileMode::Write {
            if let Err(e) = self.file.flush() {
                debug!(path = %self.path, error = %e, "flush failed");
                self.error = true;
            }
        }
        self.error
    }

    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> ZFileResult<()> {
        let target = match mode {
            SeekMode::Absolute => {
                let start = u64::try_from(offset).map_err(|_| {
                    Box::new(ZFileError::invalid_argument(format!(
                        "negative absolute offset {}",
                        offset
                    )))
                })?;
                SeekFrom::Start(start)
            }
            SeekMode::RelativeToCurrent => SeekFrom::Current(offset),
        };
        match self.file.seek(target) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Moves the position by `delta` bytes.
    pub fn skip(&mut self, delta: i64) -> ZFileResult<()> {
        self.seek(delta, SeekMode::RelativeToCurrent)
    }

    /// Current position from the start of the file.
    pub fn tell(&mut self) -> ZFileResult<u64> {
        match self.file.stream_position() {
            Ok(position) => Ok(position),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Next byte, or `None` at end of file or on failure (which sets the error flag).
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> ZFileResult<()> {
        self.write(&[byte])
    }

    /// Reads until `buffer` is full or the file ends.
    ///
    /// `Ok(0)` means end of file. An error is returned only if no byte was
    /// transferred; a failure after a partial transfer sets the error flag and returns
    /// the partial count.
    pub fn read(&mut self, buffer: &mut [u8]) -> ZFileResult<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if filled == 0 => return Err(self.io_error(e)),
                Err(e) => {
                    warn!(
                        path = %self.path,
                        error = %e,
                        filled,
                        "read failed after partial transfer"
                    );
                    self.error = true;
                    break;
                }
            }
        }
        Ok(filled)
    }

    /// Writes all of `bytes` or fails.
    pub fn write(&mut self, bytes: &[u8]) -> ZFileResult<()> {
        match self.file.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn lock_kind(&self) -> LockKind {
        if self.mode == FileMode::Read {
            LockKind::Shared
        } else {
            LockKind::Exclusive
        }
    }

    fn lock_error(&self, error: io::Error, operation: &str) -> Box<ZFileError> {
        let error = ZFileError::io(self.path.as_str(), error);
        Box::new(error.context(format!("Failed to {} file", operation)))
    }

    /// Takes a whole-file advisory lock, blocking until it is granted.
    ///
    /// Read handles take a shared lock, all others an exclusive one. On backends
    /// without advisory locking this succeeds without locking. A failed lock leaves
    /// the error flag untouched.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn lock(&mut self) -> ZFileResult<()> {
        let kind = self.lock_kind();
        match self.file.lock(kind) {
            Ok(support) => {
                log_lock_support(support, "lock");
                Ok(())
            }
            Err(e) => Err(self.lock_error(e, "lock")),
        }
    }

    /// Releases a lock taken with [`FileHandle::lock`].
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn unlock(&mut self) -> ZFileResult<()> {
        match self.file.unlock() {
            Ok(support) => {
                log_lock_support(support, "unlock");
                Ok(())
            }
            Err(e) => Err(self.lock_error(e, "unlock")),
        }
    }
}

fn log_lock_support(support: LockSupport, operation: &str) {
    match support {
        LockSupport::Applied => debug!(operation, "advisory lock updated"),
        LockSupport::Unsupported => {
            debug!(operation, "advisory locking unsupported by backend, ignoring")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileSystem;
    use zfile_base::{MockPal, PalHandle};

    fn fs_with(files: &[(&str, &[u8])]) -> (MockPal, FileSystem) {
        let mock = MockPal::new();
        for (path, content) in files {
            mock.add_file(FilePath::from(*path), content.to_vec());
        }
        let fs = FileSystem::new(PalHandle::new(mock.clone()));
        (mock, fs)
    }

    #[test]
    fn test_open_intents() {
        assert_eq!(open_intent(FileMode::Read, FileType::Save), OpenIntent::Read);
        assert_eq!(
            open_intent(FileMode::Write, FileType::Save),
            OpenIntent::CreateNew
        );
        assert_eq!(
            open_intent(FileMode::Write, FileType::Text),
            OpenIntent::Truncate
        );
        assert_eq!(
            open_intent(FileMode::Append, FileType::Save),
            OpenIntent::Append
        );
        assert_eq!(
            open_intent(FileMode::ReadWrite, FileType::Raw),
            OpenIntent::Update
        );
    }

    #[test]
    fn test_read_fills_buffer_then_reports_end() {
        let (_, fs) = fs_with(&[("/data", b"hello")]);
        let mut file = fs
            .open(&FilePath::from("/data"), FileMode::Read, FileType::Raw)
            .unwrap();

        let mut buffer = [0u8; 3];
        assert_eq!(file.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer, b"hel");
        assert_eq!(file.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"lo");
        assert_eq!(file.read(&mut buffer).unwrap(), 0);
        assert!(!file.has_error());
        file.close().unwrap();
    }

    #[test]
    fn test_read_failure_is_sentinel_and_sticky() {
        let (mock, fs) = fs_with(&[("/bad", b"data")]);
        mock.fail_io(FilePath::from("/bad"));
        let mut file = fs
            .open(&FilePath::from("/bad"), FileMode::Read, FileType::Raw)
            .unwrap();

        let mut buffer = [0u8; 4];
        let err = file.read(&mut buffer).unwrap_err();
        assert!(err.is_io());
        assert!(file.has_error());
        assert_eq!(file.read_byte(), None);
    }

    #[test]
    fn test_byte_io_and_positioning() {
        let (mock, fs) = fs_with(&[("/bytes", b"abcdef")]);
        let mut file = fs
            .open(&FilePath::from("/bytes"), FileMode::ReadWrite, FileType::Raw)
            .unwrap();

        assert_eq!(file.read_byte(), Some(b'a'));
        file.skip(2).unwrap();
        assert_eq!(file.tell().unwrap(), 3);
        file.write_byte(b'X').unwrap();
        file.seek(1, SeekMode::Absolute).unwrap();
        assert_eq!(file.read_byte(), Some(b'b'));
        file.seek(-1, SeekMode::RelativeToCurrent).unwrap();
        assert_eq!(file.tell().unwrap(), 1);
        file.close().unwrap();

        assert_eq!(
            mock.file_content(&FilePath::from("/bytes")).unwrap(),
            b"abcXef"
        );
    }

    #[test]
    fn test_seek_rejects_negative_absolute_offset() {
        let (_, fs) = fs_with(&[("/f", b"x")]);
        let mut file = fs
            .open(&FilePath::from("/f"), FileMode::Read, FileType::Raw)
            .unwrap();
        assert!(
            file.seek(-3, SeekMode::Absolute)
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(file.skip(-3).unwrap_err().is_io());
        assert!(file.has_error());
    }

    #[test]
    fn test_write_failure_sets_flag() {
        let (mock, fs) = fs_with(&[]);
        let mut file = fs
            .open(&FilePath::from("/out"), FileMode::Write, FileType::Text)
            .unwrap();
        file.write(b"fine").unwrap();
        assert!(!file.has_error());

        mock.fail_io(FilePath::from("/out"));
        assert!(file.write(b"lost").is_err());
        assert!(file.has_error());
        assert!(file.close().is_err());
    }

    #[test]
    fn test_has_error_flushes_write_handles() {
        let (mock, fs) = fs_with(&[]);
        let mut file = fs
            .open(&FilePath::from("/out"), FileMode::Write, FileType::Text)
            .unwrap();
        mock.fail_io(FilePath::from("/out"));
        assert!(file.has_error());
    }

    #[test]
    fn test_lock_without_backend_support_succeeds() {
        let (_, fs) = fs_with(&[("/f", b"x")]);
        let mut file = fs
            .open(&FilePath::from("/f"), FileMode::Read, FileType::Text)
            .unwrap();
        file.lock().unwrap();
        file.unlock().unwrap();
        file.close().unwrap();
    }

    #[test]
    fn test_lock_failure_leaves_error_flag_clear() {
        let (mock, fs) = fs_with(&[("/f", b"x")]);
        let mut file = fs
            .open(&FilePath::from("/f"), FileMode::Read, FileType::Text)
            .unwrap();
        mock.fail_io(FilePath::from("/f"));

        let err = file.lock().unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.get_context(), ["Failed to lock file"]);
        let err = file.unlock().unwrap_err();
        assert_eq!(err.get_context(), ["Failed to unlock file"]);
        assert!(!file.has_error());
    }

    #[test]
    fn test_lock_kind_follows_mode() {
        let (_, fs) = fs_with(&[("/f", b"x")]);
        let expected = [
            (FileMode::Read, LockKind::Shared),
            (FileMode::Write, LockKind::Exclusive),
            (FileMode::Append, LockKind::Exclusive),
            (FileMode::ReadWrite, LockKind::Exclusive),
        ];
        for (mode, kind) in expected {
            let file = fs.open(&FilePath::from("/f"), mode, FileType::Raw).unwrap();
            assert_eq!(file.lock_kind(), kind, "{:?}", mode);
        }
    }

    #[cfg(unix)]
    mod real_locks {
        use super::*;
        use zfile_base::RealPal;

        fn lock_and_unlock(mode: FileMode) {
            let temp_dir = tempfile::TempDir::new().unwrap();
            let target = temp_dir.path().join("locked");
            std::fs::write(&target, b"data").unwrap();
            let fs = FileSystem::new(PalHandle::new(RealPal::default()));

            let mut file = fs.open(&FilePath::from(target), mode, FileType::Raw).unwrap();
            file.lock().unwrap();
            file.unlock().unwrap();
            assert!(!file.has_error());
            file.close().unwrap();
        }

        #[test]
        fn test_read_handle_takes_shared_lock() {
            // a write lock on a read-only descriptor fails with EBADF
            lock_and_unlock(FileMode::Read);
        }

        #[test]
        fn test_append_handle_takes_exclusive_lock() {
            lock_and_unlock(FileMode::Append);
        }

        #[test]
        fn test_read_write_handle_takes_exclusive_lock() {
            lock_and_unlock(FileMode::ReadWrite);
        }
    }

    #[test]
    fn test_handle_records_path_and_mode() {
        let (_, fs) = fs_with(&[("/f", b"x")]);
        let file = fs
            .open(&FilePath::from("/f"), FileMode::Append, FileType::Text)
            .unwrap();
        assert_eq!(file.path().as_str(), "/f");
        assert_eq!(file.mode(), FileMode::Append);
    }
}
