//! Virtual file system: an ordered list of mount points answering
//! name→stream queries.
//!
//! Names are forward-slash relative paths, case-sensitive. Mounts are probed
//! in attach order and the first one containing the name wins. Absolute and
//! non-normalized paths (`.`/`..` segments, empty segments, backslashes) are
//! rejected before any mount is consulted.

use std::rc::Rc;

use crate::errors::EngineError;

/// Seek origin for [`Stream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// A read-only streaming handle over a mounted entry.
///
/// Handles are `Send + Sync` so that audio sources can keep decoding from
/// a device-owned thread.
pub trait Stream: Send + Sync {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, EngineError>;
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, EngineError>;
    fn tell(&self) -> u64;
    fn size(&self) -> u64;
    fn eof(&self) -> bool;
}

impl dyn Stream + '_ {
    /// Read the remaining content of the stream into a buffer.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, EngineError> {
        let left = self.size().saturating_sub(self.tell()) as usize;
        let mut data = vec![0; left];
        let mut total = 0;
        while total < left {
            let read = self.read(&mut data[total..])?;
            if read == 0 {
                break;
            }
            total += read;
        }
        data.truncate(total);
        Ok(data)
    }
}

/// A mount point: a provider answering name→stream queries.
pub trait Mount {
    fn contains(&self, name: &str) -> bool;
    fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError>;
    fn scan(&self, visit: &mut dyn FnMut(&str));
}

/// `true` when `name` is a relative, normalized, forward-slash path.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.contains('\\') {
        return false;
    }
    name.split('/').all(|segment| {
        !segment.is_empty() && segment != "." && segment != ".."
    })
}

/// The ordered collection of mount points.
#[derive(Default)]
pub struct FileSystem {
    mounts: Vec<Rc<dyn Mount>>,
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a mount point. Earlier mounts win on name collisions.
    pub fn attach(&mut self, mount: Rc<dyn Mount>) {
        self.mounts.push(mount);
    }

    pub fn contains(&self, name: &str) -> bool {
        is_valid_name(name) && self.mounts.iter().any(|mount| mount.contains(name))
    }

    pub fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError> {
        if !is_valid_name(name) {
            return Err(EngineError::InvalidPath(name.to_string()));
        }
        for mount in &self.mounts {
            if mount.contains(name) {
                return mount.open(name);
            }
        }
        Err(EngineError::NotFound(name.to_string()))
    }

    /// Visit every name reachable through any mount (duplicates included).
    pub fn scan(&self, visit: &mut dyn FnMut(&str)) {
        for mount in &self.mounts {
            mount.scan(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(is_valid_name("boot.lua"));
        assert!(is_valid_name("assets/sprites/hero.png"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("/etc/passwd"));
        assert!(!is_valid_name("../secret"));
        assert!(!is_valid_name("assets/../boot.lua"));
        assert!(!is_valid_name("assets//double"));
        assert!(!is_valid_name("assets\\windows"));
        assert!(!is_valid_name("./boot.lua"));
    }
}
