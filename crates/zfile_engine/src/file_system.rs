use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use zfile_base::{FilePath, PalHandle, ResultExt, ZFileError, ZFileResult};

use crate::config::FileSystemConfig;
use crate::dir::{self, DirectoryHandle};
use crate::file::{FileHandle, FileMode, FileType, open_intent};
use crate::path::build_path;

/// Passed to the open callback after a successful non-read open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenNotification {
    pub path: FilePath,
    pub file_type: FileType,
}

/// Callback invoked after every successful non-read open.
pub type OpenCallback = Arc<dyn Fn(&OpenNotification) + Send + Sync>;

/* 📖 # Why a FileSystem value instead of free functions?

Bounds, the backend and the open callback used to be process globals. Bundling them
into one cheaply clonable value makes each of them injectable: tests run against
MockPal with a recording callback, the CLI against RealPal with bounds from
`zfile.toml`.
*/

/// Entry point for all file and directory operations.
///
/// # Examples
///
/// ```
/// use zfile_base::{FilePath, MockPal, PalHandle};
/// use zfile_engine::{FileMode, FileSystem, FileType};
///
/// let fs = FileSystem::new(PalHandle::new(MockPal::new()));
/// let path = fs.path_build("/", "player").unwrap();
///
/// let mut file = fs.open(&path, FileMode::Write, FileType::Save).unwrap();
/// file.write(b"state").unwrap();
/// file.close().unwrap();
///
/// let again = fs.open(&path, FileMode::Write, FileType::Save);
/// assert!(again.unwrap_err().is_already_exists());
/// ```
#[derive(Clone)]
pub struct FileSystem {
    pal: PalHandle,
    config: FileSystemConfig,
    open_callback: Option<OpenCallback>,
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("pal", &self.pal)
            .field("config", &self.config)
            .field("open_callback", &self.open_callback.is_some())
            .finish()
    }
}

impl FileSystem {
    /// Creates a file system on `pal` with default bounds and no open callback.
    pub fn new(pal: PalHandle) -> Self {
        Self {
            pal,
            config: FileSystemConfig::default(),
            open_callback: None,
        }
    }

    /// Replaces the bounds, rejecting unusable values.
    pub fn with_config(mut self, config: FileSystemConfig) -> ZFileResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Installs the callback run after successful non-read opens.
    pub fn with_open_callback(
        mut self,
        callback: impl Fn(&OpenNotification) + Send + Sync + 'static,
    ) -> Self {
        self.open_callback = Some(Arc::new(callback));
        self
    }

    pub fn pal(&self) -> &PalHandle {
        &self.pal
    }

    pub fn config(&self) -> &FileSystemConfig {
        &self.config
    }

    /// Joins `base` and `leaf`, expanding `~` where the backend supports it.
    pub fn path_build(&self, base: &str, leaf: &str) -> ZFileResult<FilePath> {
        build_path(&*self.pal, base, leaf, self.config.max_path_len)
    }

    fn check_path_len(&self, path: &FilePath) -> ZFileResult<()> {
        if path.len() >= self.config.max_path_len {
            return Err(Box::new(ZFileError::invalid_argument(format!(
                "path of {} bytes exceeds the limit of {}",
                path.len(),
                self.config.max_path_len - 1
            ))));
        }
        Ok(())
    }

    /// Opens `path` in `mode`.
    ///
    /// Write opens of [`FileType::Save`] files never replace an existing file; they
    /// fail with `AlreadyExists` and create new files readable by the owner only.
    #[instrument(skip(self), fields(path = %path))]
    pub fn open(
        &self,
        path: &FilePath,
        mode: FileMode,
        file_type: FileType,
    ) -> ZFileResult<FileHandle> {
        self.check_path_len(path)?;
        let intent = open_intent(mode, file_type);
        let file = self
            .pal
            .open_file(path, intent)
            .with_context(|| format!("Failed to open '{}' for {:?}", path, mode))?;
        debug!(?intent, "file opened");

        if mode != FileMode::Read {
            if let Some(callback) = &self.open_callback {
                callback(&OpenNotification {
                    path: path.clone(),
                    file_type,
                });
            }
        }
        Ok(FileHandle::new(file, path.clone(), mode, self.config))
    }

    /// Copies `src` to `dst` in chunks, honoring save exclusivity for the destination.
    ///
    /// A failure part way leaves the partial destination in place; both files are
    /// closed before the failure is returned.
    #[instrument(skip(self), fields(src = %src, dst = %dst))]
    pub fn copy(&self, src: &FilePath, dst: &FilePath, file_type: FileType) -> ZFileResult<()> {
        let mut source = self.open(src, FileMode::Read, file_type)?;
        let mut destination = match self.open(dst, FileMode::Write, file_type) {
            Ok(destination) => destination,
            Err(e) => {
                if let Err(close_error) = source.close() {
                    warn!(error = %close_error, "failed to close copy source");
                }
                return Err(e);
            }
        };

        let mut chunk = vec![0u8; self.config.copy_chunk_size];
        let mut copied: u64 = 0;
        let outcome = loop {
            match source.read(&mut chunk) {
                Ok(0) => {
                    if source.has_error() {
                        break Err(zfile_base::err!("read from '{}' failed part way", src));
                    }
                    break Ok(());
                }
                Ok(count) => {
                    if let Err(e) = destination.write(&chunk[..count]) {
                        break Err(e);
                    }
                    copied += count as u64;
                }
                Err(e) => break Err(e),
            }
        };

        let source_closed = source.close();
        let destination_closed = destination.close();
        if let Err(e) = outcome {
            warn!(copied, error = %e, "copy stopped, partial destination left in place");
            return Err(Box::new((*e).context(format!("Failed to copy '{}' to '{}'", src, dst))));
        }
        source_closed?;
        destination_closed?;
        debug!(copied, "file copied");
        Ok(())
    }

    /// True if anything exists at `path`.
    pub fn file_exists(&self, path: &FilePath) -> bool {
        self.pal.entry_kind(path).is_some()
    }

    #[instrument(skip(self), fields(path = %path))]
    pub fn delete_file(&self, path: &FilePath) -> ZFileResult<()> {
        self.check_path_len(path)?;
        self.pal
            .delete_file(path)
            .with_context(|| format!("Failed to delete '{}'", path))
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub fn move_file(&self, from: &FilePath, to: &FilePath) -> ZFileResult<()> {
        self.check_path_len(from)?;
        self.check_path_len(to)?;
        self.pal
            .move_file(from, to)
            .with_context(|| format!("Failed to move '{}' to '{}'", from, to))
    }

    /// True if `first` was modified after `second`.
    ///
    /// A missing `first` is never newer, a missing `second` is always older. Backends
    /// without timestamps report `false`.
    pub fn file_newer(&self, first: &FilePath, second: &FilePath) -> bool {
        if self.pal.entry_kind(first).is_none() {
            return false;
        }
        if self.pal.entry_kind(second).is_none() {
            return true;
        }
        match (
            self.pal.modified_time(first),
            self.pal.modified_time(second),
        ) {
            (Some(first_time), Some(second_time)) => first_time > second_time,
            _ => false,
        }
    }

    pub fn directory_exists(&self, path: &FilePath) -> bool {
        dir::directory_exists(&self.pal, path)
    }

    /// Creates `path` and all missing parents; succeeds if it already exists.
    pub fn create_directory(&self, path: &FilePath) -> ZFileResult<()> {
        self.check_path_len(path)?;
        dir::create_directory(&self.pal, path, self.config.max_directory_path_len)
    }

    /// Opens `path` for listing its non-directory entries.
    pub fn open_directory(&self, path: &FilePath) -> ZFileResult<DirectoryHandle> {
        self.check_path_len(path)?;
        DirectoryHandle::open(self.pal.clone(), path, self.config.max_path_len)
    }
}
