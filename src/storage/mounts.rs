//! The three mount point kinds: host folders, zip archives and the
//! in-memory injection cache.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hashbrown::HashMap;
use log::{debug, error};

use crate::errors::EngineError;
use crate::storage::vfs::{Mount, Stream, Whence};

fn resolve(position: u64, size: u64, offset: i64, whence: Whence) -> Result<u64, EngineError> {
    let base = match whence {
        Whence::Set => 0,
        Whence::Cur => position as i64,
        Whence::End => size as i64,
    };
    let target = base + offset;
    if target < 0 || target as u64 > size {
        return Err(EngineError::InvalidPath(format!(
            "seek to {target} outside of [0, {size}]"
        )));
    }
    Ok(target as u64)
}

// ---------- Folder ----------

/// A directory on the host file system.
pub struct FolderMount {
    root: PathBuf,
}

impl FolderMount {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(EngineError::InvalidPath(root.display().to_string()));
        }
        Ok(Self { root })
    }

    fn path_of(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            path.push(segment);
        }
        path
    }

    fn scan_folder(&self, folder: &Path, prefix: &str, visit: &mut dyn FnMut(&str)) {
        let Ok(entries) = std::fs::read_dir(folder) else {
            return;
        };
        for entry in entries.flatten() {
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let name = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };
            if kind.is_dir() {
                self.scan_folder(&entry.path(), &name, visit);
            } else if kind.is_file() {
                visit(&name);
            }
        }
    }
}

impl Mount for FolderMount {
    fn contains(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError> {
        let path = self.path_of(name);
        let file = File::open(&path).map_err(|e| EngineError::io(&path, e))?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::io(&path, e))?
            .len();
        Ok(Box::new(FileStream {
            file,
            path,
            position: 0,
            size,
        }))
    }

    fn scan(&self, visit: &mut dyn FnMut(&str)) {
        self.scan_folder(&self.root.clone(), "", visit);
    }
}

struct FileStream {
    file: File,
    path: PathBuf,
    position: u64,
    size: u64,
}

impl Stream for FileStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, EngineError> {
        let read = self
            .file
            .read(buffer)
            .map_err(|e| EngineError::io(&self.path, e))?;
        self.position += read as u64;
        Ok(read)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, EngineError> {
        let target = resolve(self.position, self.size, offset, whence)?;
        self.file
            .seek(SeekFrom::Start(target))
            .map_err(|e| EngineError::io(&self.path, e))?;
        self.position = target;
        Ok(target)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn eof(&self) -> bool {
        self.position >= self.size
    }
}

// ---------- Archive ----------

/// A zip archive over a single file. Entries are inflated on open and served
/// from memory, which keeps the returned handles seekable and `Send`.
pub struct ArchiveMount {
    archive: RefCell<zip::ZipArchive<File>>,
    names: Vec<String>,
}

impl ArchiveMount {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| EngineError::io(&path, e))?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|e| EngineError::decode(path.display().to_string(), e))?;
        let names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        Ok(Self {
            archive: RefCell::new(archive),
            names,
        })
    }
}

impl Mount for ArchiveMount {
    fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|entry| entry == name)
    }

    fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError> {
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive
            .by_name(name)
            .map_err(|_| EngineError::NotFound(name.to_string()))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| EngineError::decode(name, e))?;
        Ok(Box::new(MemoryStream {
            data: Arc::new(data),
            position: 0,
        }))
    }

    fn scan(&self, visit: &mut dyn FnMut(&str)) {
        for name in &self.names {
            visit(name);
        }
    }
}

/// Attach helper mirroring the boot sequence: a directory becomes a
/// [`FolderMount`], anything else is tried as an archive.
pub fn folder_or_archive(path: &Path) -> Result<std::rc::Rc<dyn Mount>, EngineError> {
    if path.is_dir() {
        Ok(std::rc::Rc::new(FolderMount::new(path)?))
    } else {
        Ok(std::rc::Rc::new(ArchiveMount::new(path)?))
    }
}

// ---------- In-memory cache ----------

/// The injectable byte cache. Scripts (or the host) can publish named blobs
/// that are then resolvable like any other mounted entry.
#[derive(Default)]
pub struct MemoryMount {
    entries: RefCell<HashMap<String, Arc<Vec<u8>>>>,
}

impl MemoryMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_raw(&self, name: &str, data: &[u8]) {
        debug!("injecting {} raw byte(s) as `{}`", data.len(), name);
        self.entries
            .borrow_mut()
            .insert(name.to_string(), Arc::new(data.to_vec()));
    }

    pub fn inject_base64(&self, name: &str, encoded: &str) -> Result<(), EngineError> {
        let data = BASE64.decode(encoded.trim()).map_err(|e| {
            error!("data for `{name}` is not Base64 encoded");
            EngineError::decode(name, e)
        })?;
        debug!("injecting {} Base64-decoded byte(s) as `{}`", data.len(), name);
        self.entries
            .borrow_mut()
            .insert(name.to_string(), Arc::new(data));
        Ok(())
    }

    pub fn inject_ascii85(&self, name: &str, encoded: &str) -> Result<(), EngineError> {
        let data = ascii85_decode(encoded).ok_or_else(|| {
            error!("data for `{name}` is not Ascii85 encoded");
            EngineError::decode(name, "malformed Ascii85 input")
        })?;
        debug!("injecting {} Ascii85-decoded byte(s) as `{}`", data.len(), name);
        self.entries
            .borrow_mut()
            .insert(name.to_string(), Arc::new(data));
        Ok(())
    }
}

impl Mount for MemoryMount {
    fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError> {
        let entries = self.entries.borrow();
        let data = entries
            .get(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;
        Ok(Box::new(MemoryStream {
            data: Arc::clone(data),
            position: 0,
        }))
    }

    fn scan(&self, visit: &mut dyn FnMut(&str)) {
        for name in self.entries.borrow().keys() {
            visit(name);
        }
    }
}

pub(crate) struct MemoryStream {
    data: Arc<Vec<u8>>,
    position: usize,
}

impl Stream for MemoryStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, EngineError> {
        let available = self.data.len() - self.position;
        let count = available.min(buffer.len());
        buffer[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, EngineError> {
        let target = resolve(self.position as u64, self.data.len() as u64, offset, whence)?;
        self.position = target as usize;
        Ok(target)
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn eof(&self) -> bool {
        self.position >= self.data.len()
    }
}

// Plain Ascii85, `z` shorthand allowed between groups, whitespace skipped.
fn ascii85_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut flush = |group: &[u8; 5], count: usize, out: &mut Vec<u8>| -> bool {
        let mut value: u64 = 0;
        for i in 0..5 {
            let digit = if i < count { group[i] } else { 84 }; // Pad with 'u'.
            value = value * 85 + digit as u64;
        }
        if value > u32::MAX as u64 {
            return false;
        }
        let bytes = (value as u32).to_be_bytes();
        out.extend_from_slice(&bytes[..count - 1]);
        true
    };

    for ch in encoded.bytes() {
        match ch {
            b' ' | b'\t' | b'\r' | b'\n' => continue,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = ch - b'!';
                count += 1;
                if count == 5 {
                    if !flush(&group, 5, &mut out) {
                        return None;
                    }
                    count = 0;
                }
            }
            _ => return None,
        }
    }

    match count {
        0 => Some(out),
        1 => None, // A single trailing digit can't encode any byte.
        _ => flush(&group, count, &mut out).then_some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vfs::FileSystem;
    use std::io::Write;
    use std::rc::Rc;

    #[test]
    fn inject_raw_round_trip() {
        let cache = MemoryMount::new();
        cache.inject_raw("data.bin", &[1, 2, 3, 4, 5]);

        let mut fs = FileSystem::new();
        fs.attach(Rc::new(cache));

        let mut handle = fs.open("data.bin").unwrap();
        assert_eq!(handle.size(), 5);
        let data = handle.read_to_end().unwrap();
        assert_eq!(data, vec![1, 2, 3, 4, 5]);
        assert!(handle.eof());
    }

    #[test]
    fn inject_base64_decodes() {
        let cache = MemoryMount::new();
        cache.inject_base64("hello.txt", "aGVsbG8=").unwrap();
        let mut handle = cache.open("hello.txt").unwrap();
        assert_eq!(handle.read_to_end().unwrap(), b"hello");

        assert!(cache.inject_base64("bad.txt", "!!!not-base64!!!").is_err());
    }

    #[test]
    fn inject_ascii85_decodes() {
        // "Man " encodes to "9jqo^" in plain Ascii85.
        assert_eq!(ascii85_decode("9jqo^").unwrap(), b"Man ");
        // Partial final group.
        assert_eq!(ascii85_decode("9jqo").unwrap(), b"Man");
        // The `z` shorthand expands to four zero bytes.
        assert_eq!(ascii85_decode("z").unwrap(), vec![0, 0, 0, 0]);
        // Stray characters are rejected.
        assert!(ascii85_decode("9jq~").is_none());
        assert!(ascii85_decode("9").is_none());
    }

    #[test]
    fn memory_stream_seeks() {
        let cache = MemoryMount::new();
        cache.inject_raw("data.bin", b"0123456789");
        let mut handle = cache.open("data.bin").unwrap();

        handle.seek(4, Whence::Set).unwrap();
        assert_eq!(handle.tell(), 4);
        let mut buffer = [0u8; 2];
        handle.read(&mut buffer).unwrap();
        assert_eq!(&buffer, b"45");

        handle.seek(-2, Whence::End).unwrap();
        handle.read(&mut buffer).unwrap();
        assert_eq!(&buffer, b"89");
        assert!(handle.eof());

        assert!(handle.seek(1, Whence::End).is_err());
        assert!(handle.seek(-1, Whence::Set).is_err());
    }

    #[test]
    fn folder_mount_probes_and_scans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let mut file = File::create(dir.path().join("nested/inner.txt")).unwrap();
        file.write_all(b"inner").unwrap();
        File::create(dir.path().join("top.txt")).unwrap();

        let mount = FolderMount::new(dir.path()).unwrap();
        assert!(mount.contains("top.txt"));
        assert!(mount.contains("nested/inner.txt"));
        assert!(!mount.contains("nested"));
        assert!(!mount.contains("missing.txt"));

        let mut handle = mount.open("nested/inner.txt").unwrap();
        assert_eq!(handle.read_to_end().unwrap(), b"inner");

        let mut names = Vec::new();
        mount.scan(&mut |name| names.push(name.to_string()));
        names.sort();
        assert_eq!(names, vec!["nested/inner.txt", "top.txt"]);
    }

    #[test]
    fn first_attached_mount_wins() {
        let first = MemoryMount::new();
        first.inject_raw("name.txt", b"first");
        let second = MemoryMount::new();
        second.inject_raw("name.txt", b"second");
        second.inject_raw("only-second.txt", b"second");

        let mut fs = FileSystem::new();
        fs.attach(Rc::new(first));
        fs.attach(Rc::new(second));

        let mut handle = fs.open("name.txt").unwrap();
        assert_eq!(handle.read_to_end().unwrap(), b"first");
        assert!(fs.contains("only-second.txt"));
    }
}
