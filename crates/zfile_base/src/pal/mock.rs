use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::{ZFileError, ZFileResult};

use super::file_path::{FilePath, PATH_SEP_CHAR};
use super::traits::{
    DirEntry, EntryKind, LockKind, LockSupport, OpenIntent, OpenedDirectory, Pal, PalDirectory,
    PalFile,
};

/* 📖 # What does MockPal stand in for?

MockPal keeps files and directories in memory and behaves like the most limited
backend the file layer has to support:
1. **No advisory locking**: lock requests report `LockSupport::Unsupported`
2. **Find-first listing**: opening a directory already yields its first entry (`.`),
   so the engine's lookahead and entry filtering are exercised
3. **Fault injection**: `fail_io` makes reads, writes, flushes and locks fail on a path, to
   drive the error sentinel and the sticky error flag
4. **Deterministic clock**: each write advances a logical clock, so modification-time
   comparisons do not depend on filesystem timestamp resolution

Storage sits behind Arc<Mutex<..>> so clones share state, like several handles onto
one disk.
*/

#[derive(Debug)]
struct MockEntry {
    content: Vec<u8>,
    modified: SystemTime,
}

type FileTable = Arc<Mutex<BTreeMap<FilePath, MockEntry>>>;

/// In-memory PAL implementation for testing.
///
/// # Examples
///
/// ```
/// use zfile_base::{FilePath, MockPal, Pal};
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("/test.txt"), b"content".to_vec());
/// let content = mock.read_file_to_string(&FilePath::from("/test.txt")).unwrap();
/// assert_eq!(content, "content");
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    files: FileTable,
    directories: Arc<Mutex<BTreeSet<FilePath>>>,
    homes: Arc<Mutex<HashMap<Option<String>, String>>>,
    failing: Arc<Mutex<HashSet<FilePath>>>,
    clock: Arc<AtomicU64>,
    expands_home: bool,
}

impl MockPal {
    /// Create a new MockPal containing only the root directory.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            directories: Arc::new(Mutex::new(BTreeSet::new())),
            homes: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            clock: Arc::new(AtomicU64::new(1)),
            expands_home: true,
        }
    }

    /// Controls whether `~` is a home-directory marker on this backend.
    pub fn with_home_expansion(mut self, enabled: bool) -> Self {
        self.expands_home = enabled;
        self
    }

    /// Add a file, creating its ancestor directories.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        self.add_ancestors(path.as_str());
        let modified = self.tick();
        self.files
            .lock()
            .insert(path, MockEntry { content, modified });
    }

    /// Add a directory and its ancestors.
    pub fn add_directory(&self, path: FilePath) {
        let normalized = normalize(path.as_str());
        self.add_ancestors(&normalized);
        self.directories.lock().insert(FilePath::from(normalized));
    }

    /// Current content of a file, if present.
    pub fn file_content(&self, path: &FilePath) -> Option<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .map(|entry| entry.content.clone())
    }

    /// Registers the home directory reported for `user` (`None` is the current user).
    pub fn set_home_directory(&self, user: Option<&str>, home: impl Into<String>) {
        self.homes
            .lock()
            .insert(user.map(str::to_string), home.into());
    }

    /// Makes every later read, write and flush on files at `path` fail.
    pub fn fail_io(&self, path: FilePath) {
        self.failing.lock().insert(path);
    }

    fn tick(&self) -> SystemTime {
        tick(&self.clock)
    }

    fn add_ancestors(&self, path: &str) {
        let mut directories = self.directories.lock();
        let mut current = parent_of(path);
        while let Some(parent) = current {
            if is_root(&parent) {
                break;
            }
            current = parent_of(&parent);
            directories.insert(FilePath::from(parent));
        }
    }

    fn is_directory(&self, path: &str) -> bool {
        let normalized = normalize(path);
        is_root(&normalized)
            || normalized == "."
            || self
                .directories
                .lock()
                .contains(&FilePath::from(normalized))
    }

    fn parent_exists(&self, path: &str) -> bool {
        match parent_of(path) {
            Some(parent) => self.is_directory(&parent),
            None => true,
        }
    }

    fn not_found(path: &FilePath) -> Box<ZFileError> {
        Box::new(ZFileError::io(
            path.as_str(),
            io::Error::new(io::ErrorKind::NotFound, format!("No such file: {}", path)),
        ))
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn open_file(&self, path: &FilePath, intent: OpenIntent) -> ZFileResult<Box<dyn PalFile>> {
        if self.is_directory(path.as_str()) {
            return Err(Box::new(ZFileError::io(
                path.as_str(),
                io::Error::other("is a directory"),
            )));
        }
        let exists = self.files.lock().contains_key(path);
        let creates = matches!(
            intent,
            OpenIntent::Truncate | OpenIntent::CreateNew | OpenIntent::Append
        );
        if !exists && !creates {
            return Err(Self::not_found(path));
        }
        if !exists && !self.parent_exists(path.as_str()) {
            return Err(Self::not_found(path));
        }
        if exists && intent == OpenIntent::CreateNew {
            return Err(Box::new(ZFileError::io(
                path.as_str(),
                io::Error::from(io::ErrorKind::AlreadyExists),
            )));
        }

        {
            let mut files = self.files.lock();
            let modified = self.tick();
            let entry = files.entry(path.clone()).or_insert_with(|| MockEntry {
                content: Vec::new(),
                modified,
            });
            if intent == OpenIntent::Truncate {
                entry.content.clear();
                entry.modified = modified;
            }
        }

        Ok(Box::new(MockFile {
            path: path.clone(),
            files: Arc::clone(&self.files),
            failing: Arc::clone(&self.failing),
            clock: Arc::clone(&self.clock),
            position: 0,
            readable: matches!(
                intent,
                OpenIntent::Read | OpenIntent::Append | OpenIntent::Update
            ),
            writable: intent != OpenIntent::Read,
            append: intent == OpenIntent::Append,
        }))
    }

    fn entry_kind(&self, path: &FilePath) -> Option<EntryKind> {
        if self.is_directory(path.as_str()) {
            Some(EntryKind::Directory)
        } else if self.files.lock().contains_key(path) {
            Some(EntryKind::File)
        } else {
            None
        }
    }

    fn modified_time(&self, path: &FilePath) -> Option<SystemTime> {
        self.files.lock().get(path).map(|entry| entry.modified)
    }

    fn delete_file(&self, path: &FilePath) -> ZFileResult<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn move_file(&self, from: &FilePath, to: &FilePath) -> ZFileResult<()> {
        if !self.parent_exists(to.as_str()) {
            return Err(Self::not_found(to));
        }
        let mut files = self.files.lock();
        let entry = files.remove(from).ok_or_else(|| Self::not_found(from))?;
        files.insert(to.clone(), entry);
        Ok(())
    }

    fn make_directory(&self, path: &FilePath) -> ZFileResult<()> {
        let normalized = normalize(path.as_str());
        if self.is_directory(&normalized) || self.files.lock().contains_key(path) {
            return Err(Box::new(ZFileError::io(
                path.as_str(),
                io::Error::from(io::ErrorKind::AlreadyExists),
            )));
        }
        if !self.parent_exists(&normalized) {
            return Err(Self::not_found(path));
        }
        self.directories.lock().insert(FilePath::from(normalized));
        Ok(())
    }

    fn open_directory(&self, path: &FilePath) -> ZFileResult<OpenedDirectory> {
        let normalized = normalize(path.as_str());
        if !self.is_directory(&normalized) {
            return Err(Self::not_found(path));
        }

        let is_child = |candidate: &str| parent_of(candidate).as_deref() == Some(&normalized);
        let mut children: Vec<DirEntry> = Vec::new();
        for directory in self.directories.lock().iter() {
            if is_child(directory.as_str()) {
                children.push(DirEntry {
                    name: leaf_of(directory.as_str()).to_string(),
                    kind: Some(EntryKind::Directory),
                });
            }
        }
        for file in self.files.lock().keys() {
            if is_child(file.as_str()) {
                children.push(DirEntry {
                    name: leaf_of(file.as_str()).to_string(),
                    kind: Some(EntryKind::File),
                });
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let mut entries: VecDeque<DirEntry> = VecDeque::new();
        entries.push_back(DirEntry {
            name: "..".to_string(),
            kind: Some(EntryKind::Directory),
        });
        entries.extend(children);

        Ok(OpenedDirectory {
            entries: Box::new(MockDirectory { entries }),
            first: Some(DirEntry {
                name: ".".to_string(),
                kind: Some(EntryKind::Directory),
            }),
        })
    }

    fn home_directory(&self, user: Option<&str>) -> Option<String> {
        self.homes.lock().get(&user.map(str::to_string)).cloned()
    }

    fn expands_home(&self) -> bool {
        self.expands_home
    }
}

fn tick(clock: &AtomicU64) -> SystemTime {
    let seconds = clock.fetch_add(1, Ordering::SeqCst);
    SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
}

fn is_root(path: &str) -> bool {
    path.is_empty() || path.chars().all(|c| c == PATH_SEP_CHAR)
}

/// Strips trailing separators, keeping a bare root intact.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches(PATH_SEP_CHAR);
    if trimmed.is_empty() && !path.is_empty() {
        PATH_SEP_CHAR.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parent directory of `path`; `None` for relative single-component paths.
fn parent_of(path: &str) -> Option<String> {
    let normalized = normalize(path);
    if is_root(&normalized) {
        return None;
    }
    let index = normalized.rfind(PATH_SEP_CHAR)?;
    if index == 0 {
        Some(PATH_SEP_CHAR.to_string())
    } else {
        Some(normalized[..index].to_string())
    }
}

fn leaf_of(path: &str) -> &str {
    match path.rfind(PATH_SEP_CHAR) {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Open file onto the shared MockPal storage.
#[derive(Debug)]
struct MockFile {
    path: FilePath,
    files: FileTable,
    failing: Arc<Mutex<HashSet<FilePath>>>,
    clock: Arc<AtomicU64>,
    position: u64,
    readable: bool,
    writable: bool,
    append: bool,
}

impl MockFile {
    fn check_failure(&self) -> io::Result<()> {
        if self.failing.lock().contains(&self.path) {
            return Err(io::Error::other("injected I/O failure"));
        }
        Ok(())
    }

    fn vanished(&self) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("{} was removed", self.path))
    }
}

impl Read for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_failure()?;
        if !self.readable {
            return Err(io::Error::other("file not opened for reading"));
        }
        let files = self.files.lock();
        let entry = files.get(&self.path).ok_or_else(|| self.vanished())?;
        let start = usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(entry.content.len());
        let count = buf.len().min(entry.content.len() - start);
        buf[..count].copy_from_slice(&entry.content[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_failure()?;
        if !self.writable {
            return Err(io::Error::other("file not opened for writing"));
        }
        let mut files = self.files.lock();
        let entry = files.get_mut(&self.path).ok_or_else(|| self.vanished())?;
        if self.append {
            self.position = entry.content.len() as u64;
        }
        let start = usize::try_from(self.position)
            .map_err(|_| io::Error::other("position out of range"))?;
        let end = start + buf.len();
        if entry.content.len() < end {
            entry.content.resize(end, 0);
        }
        entry.content[start..end].copy_from_slice(buf);
        entry.modified = tick(&self.clock);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_failure()
    }
}

impl Seek for MockFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let length = self
            .files
            .lock()
            .get(&self.path)
            .map(|entry| entry.content.len() as i64)
            .ok_or_else(|| self.vanished())?;
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::Current(delta) => i64::try_from(self.position)
                .ok()
                .and_then(|position| position.checked_add(delta)),
            SeekFrom::End(delta) => length.checked_add(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek offset out of range",
            ));
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl PalFile for MockFile {
    fn lock(&mut self, _kind: LockKind) -> io::Result<LockSupport> {
        self.check_failure()?;
        Ok(LockSupport::Unsupported)
    }

    fn unlock(&mut self) -> io::Result<LockSupport> {
        self.check_failure()?;
        Ok(LockSupport::Unsupported)
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        self.flush()
    }
}

#[derive(Debug)]
struct MockDirectory {
    entries: VecDeque<DirEntry>,
}

impl PalDirectory for MockDirectory {
    fn next_entry(&mut self) -> Option<io::Result<DirEntry>> {
        self.entries.pop_front().map(Ok)
    }
}
