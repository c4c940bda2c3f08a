use tracing::{debug, instrument, warn};

use zfile_base::{
    DirEntry, EntryKind, FilePath, PATH_SEP_CHAR, PalDirectory, PalHandle, ResultExt, ZFileError,
    ZFileResult,
};

use crate::path::join_path;

/* 📖 # Why filter entries above the backend?

Backends disagree on what a listing contains: POSIX reports `.` and `..` and no entry
types through std, find-first backends hand over the first entry while opening and
report types for everything. The handle applies one rule to every entry, including
the one cached at open: skip `.`, `..` and directories, and when the backend did not
say what an entry is, build its full path and ask. Entries that cannot be queried
(dangling links, races with deletion) are skipped.
*/

/// Exclusively owned directory traversal yielding the names of non-directory entries.
///
/// # Examples
///
/// ```
/// use zfile_base::{FilePath, MockPal, PalHandle};
/// use zfile_engine::FileSystem;
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("/lib/a.txt"), b"".to_vec());
/// let fs = FileSystem::new(PalHandle::new(mock));
///
/// let names: Vec<String> = fs
///     .open_directory(&FilePath::from("/lib"))
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(names, vec!["a.txt"]);
/// ```
#[derive(Debug)]
pub struct DirectoryHandle {
    pal: PalHandle,
    path: FilePath,
    entries: Box<dyn PalDirectory>,
    lookahead: Option<DirEntry>,
    max_path_len: usize,
}

impl DirectoryHandle {
    #[instrument(skip(pal), fields(path = %path))]
    pub(crate) fn open(
        pal: PalHandle,
        path: &FilePath,
        max_path_len: usize,
    ) -> ZFileResult<Self> {
        let opened = pal
            .open_directory(path)
            .with_context(|| format!("Failed to open directory '{}'", path))?;
        debug!(lookahead = opened.first.is_some(), "directory opened");
        Ok(Self {
            pal,
            path: path.clone(),
            entries: opened.entries,
            lookahead: opened.first,
            max_path_len,
        })
    }

    /// Directory being traversed.
    pub fn path(&self) -> &FilePath {
        &self.path
    }

    /// Stores the next name into `buffer`; `false` once the directory is exhausted.
    ///
    /// A name longer than `capacity - 1` bytes is consumed and reported as
    /// `InvalidArgument`.
    pub fn read(&mut self, buffer: &mut String, capacity: usize) -> ZFileResult<bool> {
        buffer.clear();
        let Some(name) = self.next_name()? else {
            return Ok(false);
        };
        if name.len() >= capacity {
            return Err(Box::new(ZFileError::invalid_argument(format!(
                "entry name '{}' does not fit in {} bytes",
                name,
                capacity.saturating_sub(1)
            ))));
        }
        buffer.push_str(&name);
        Ok(true)
    }

    /// Name of the next entry that is neither `.`, `..` nor a directory.
    pub fn next_name(&mut self) -> ZFileResult<Option<String>> {
        loop {
            let entry = match self.lookahead.take() {
                Some(entry) => entry,
                None => match self.entries.next_entry() {
                    None => return Ok(None),
                    Some(Ok(entry)) => entry,
                    Some(Err(e)) => {
                        let error = ZFileError::io(self.path.as_str(), e)
                            .context("Failed to read directory entry");
                        return Err(Box::new(error));
                    }
                },
            };
            if self.is_listed(&entry) {
                return Ok(Some(entry.name));
            }
        }
    }

    fn is_listed(&self, entry: &DirEntry) -> bool {
        if entry.name == "." || entry.name == ".." {
            return false;
        }
        let kind = match entry.kind {
            Some(kind) => Some(kind),
            None => match join_path(self.path.as_str(), &entry.name, self.max_path_len) {
                Ok(full_path) => self.pal.entry_kind(&full_path),
                Err(e) => {
                    warn!(dir = %self.path, name = %entry.name, error = %e, "skipping entry");
                    return false;
                }
            },
        };
        match kind {
            Some(EntryKind::File) => true,
            Some(EntryKind::Directory) => false,
            None => {
                warn!(
                    dir = %self.path,
                    name = %entry.name,
                    "skipping entry that cannot be queried"
                );
                false
            }
        }
    }

    /// Releases the directory and any cached entry.
    pub fn close(self) {
        debug!(path = %self.path, "directory closed");
    }
}

impl Iterator for DirectoryHandle {
    type Item = ZFileResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_name().transpose()
    }
}

/// True iff `path` resolves to a directory.
pub fn directory_exists(pal: &PalHandle, path: &FilePath) -> bool {
    pal.entry_kind(path) == Some(EntryKind::Directory)
}

/// Length of a leading drive designator such as `C:`.
fn drive_prefix_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if cfg!(windows) && bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        2
    } else {
        0
    }
}

/// Creates `path` and any missing parents. Succeeds without changes if it exists.
#[instrument(skip(pal), fields(path = %path))]
pub fn create_directory(
    pal: &PalHandle,
    path: &FilePath,
    max_prefix_len: usize,
) -> ZFileResult<()> {
    if directory_exists(pal, path) {
        debug!("directory already exists");
        return Ok(());
    }

    let full = path.as_str();
    let bytes = full.as_bytes();
    let separator = PATH_SEP_CHAR as u8;
    let start = drive_prefix_len(full);

    for index in start..bytes.len() {
        if bytes[index] != separator || index == start || bytes[index - 1] == separator {
            continue;
        }
        if index >= max_prefix_len {
            return Err(Box::new(ZFileError::invalid_argument(format!(
                "directory prefix of {} bytes exceeds the limit of {}",
                index,
                max_prefix_len - 1
            ))));
        }
        let prefix = FilePath::from(&full[..index]);
        if directory_exists(pal, &prefix) {
            continue;
        }
        debug!(prefix = %prefix, "creating intermediate directory");
        pal.make_directory(&prefix)
            .with_context(|| format!("Failed to create directory '{}'", prefix))?;
    }

    match pal.make_directory(path) {
        Ok(()) => {}
        // a trailing separator means the loop already created the full path
        Err(e) if e.is_already_exists() && directory_exists(pal, path) => {}
        Err(e) => {
            return Err(Box::new(
                (*e).context(format!("Failed to create directory '{}'", path)),
            ));
        }
    }
    debug!("directory created");
    Ok(())
}
