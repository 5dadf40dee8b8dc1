//! Storage subsystem: resolves names through the virtual file system and
//! memoizes typed resources with an age-based release policy.
//!
//! Mount order is fixed at creation: the in-memory injection cache first,
//! then the game data folder/archive, then (once the identity is set) the
//! writable user folder. The probe rule is uniformly "first attached wins".

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info};

use crate::errors::EngineError;

pub mod mounts;
pub mod resource;
pub mod vfs;

use mounts::{folder_or_archive, FolderMount, MemoryMount};
use resource::{Resource, ResourceKind};
use vfs::{FileSystem, Stream};

/// How many seconds a resource persists in the cache after the initial load
/// (or the latest reuse).
const RESOURCE_AGE_LIMIT: f64 = 30.0;

/// Cache capacity; exceeding it marks the oldest entry for release on the
/// next update cycle.
const CACHE_ENTRIES_LIMIT: usize = 32;

pub struct StorageSettings {
    /// Game data folder or archive.
    pub path: PathBuf,
    /// Base folder for writable identities; platform user directory when
    /// `None`.
    pub user_root: Option<PathBuf>,
}

struct CacheEntry {
    name: String,
    age: f64,
    resource: Rc<Resource>,
}

pub struct Storage {
    filesystem: FileSystem,
    cache: Rc<MemoryMount>,
    resources: Vec<CacheEntry>,
    user_path: PathBuf,
    local_path: Option<PathBuf>,
    age_limit: f64,
    entries_limit: usize,
}

impl Storage {
    pub fn new(settings: &StorageSettings) -> Result<Self, EngineError> {
        let user_path = match &settings.user_root {
            Some(root) => root.clone(),
            None => directories::BaseDirs::new()
                .ok_or_else(|| EngineError::Platform("can't locate the user directory".into()))?
                .data_dir()
                .to_path_buf(),
        };
        debug!("user path is `{}`", user_path.display());

        let cache = Rc::new(MemoryMount::new());

        let mut filesystem = FileSystem::new();
        filesystem.attach(cache.clone());

        let data = folder_or_archive(&settings.path)?;
        filesystem.attach(data);
        debug!("data folder/archive attached w/ path `{}`", settings.path.display());

        Ok(Self {
            filesystem,
            cache,
            resources: Vec::new(),
            user_path,
            local_path: None,
            age_limit: RESOURCE_AGE_LIMIT,
            entries_limit: CACHE_ENTRIES_LIMIT,
        })
    }

    #[cfg(test)]
    fn with_limits(mut self, age_limit: f64, entries_limit: usize) -> Self {
        self.age_limit = age_limit;
        self.entries_limit = entries_limit;
        self
    }

    /// Create and attach the writable `<user-dir>/<identity>` folder.
    pub fn set_identity(&mut self, identity: &str) -> Result<(), EngineError> {
        let local = self.user_path.join(identity);
        std::fs::create_dir_all(&local).map_err(|e| EngineError::io(&local, e))?;

        self.filesystem
            .attach(Rc::new(FolderMount::new(&local)?));
        info!("user-dependent path `{}` attached", local.display());

        self.local_path = Some(local);
        Ok(())
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn inject_raw(&self, name: &str, data: &[u8]) {
        self.cache.inject_raw(name, data);
    }

    pub fn inject_base64(&self, name: &str, encoded: &str) -> Result<(), EngineError> {
        self.cache.inject_base64(name, encoded)
    }

    pub fn inject_ascii85(&self, name: &str, encoded: &str) -> Result<(), EngineError> {
        self.cache.inject_ascii85(name, encoded)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filesystem.contains(name)
    }

    /// Open a streaming handle, probing the mounts in attach order.
    pub fn open(&self, name: &str) -> Result<Box<dyn Stream>, EngineError> {
        self.filesystem.open(name)
    }

    /// Visit every resolvable name.
    pub fn scan(&self, visit: &mut dyn FnMut(&str)) {
        self.filesystem.scan(visit);
    }

    /// Load (or fetch from the cache) the resource named `name`. A cache hit
    /// resets the entry age and returns the memoized value; on a miss the
    /// resource is decoded according to `kind` and cached.
    pub fn load(&mut self, name: &str, kind: ResourceKind) -> Result<Rc<Resource>, EngineError> {
        if let Some(entry) = self.resources.iter_mut().find(|entry| entry.name == name) {
            debug!("cache-hit for resource `{name}`, resetting age");
            entry.age = 0.0;
            return Ok(entry.resource.clone());
        }

        let mut handle = self.filesystem.open(name)?;
        let resource = Rc::new(Resource::load(name, kind, handle.as_mut())?);
        debug!("resource `{name}` loaded from the file-system");

        self.resources.push(CacheEntry {
            name: name.to_string(),
            age: 0.0,
            resource: resource.clone(),
        });

        if self.resources.len() > self.entries_limit {
            // Mark the oldest entry so the next cycle releases it.
            if let Some(oldest) = self
                .resources
                .iter_mut()
                .max_by(|a, b| a.age.total_cmp(&b.age))
            {
                debug!("resource `{}` marked for release", oldest.name);
                oldest.age = self.age_limit;
            }
        }

        Ok(resource)
    }

    /// Write a resource to the writable identity folder. Strings and blobs
    /// are stored as raw bytes, images are encoded as PNG. The resource
    /// cache is not involved.
    pub fn store(&self, name: &str, resource: &Resource) -> Result<(), EngineError> {
        let Some(local) = &self.local_path else {
            return Err(EngineError::Platform(
                "no identity set, nowhere to store".into(),
            ));
        };
        let path = local.join(name);

        match resource {
            Resource::String(chars) => {
                std::fs::write(&path, chars.as_bytes()).map_err(|e| EngineError::io(&path, e))
            }
            Resource::Blob(data) => {
                std::fs::write(&path, data).map_err(|e| EngineError::io(&path, e))
            }
            Resource::Image {
                width,
                height,
                pixels,
            } => {
                let buffer = image::RgbaImage::from_raw(*width, *height, pixels.clone())
                    .ok_or_else(|| EngineError::decode(name, "pixel buffer size mismatch"))?;
                image::DynamicImage::ImageRgba8(buffer)
                    .save_with_format(&path, image::ImageFormat::Png)
                    .map_err(|e| EngineError::decode(name, e))
            }
        }
    }

    /// Drop every cached resource now.
    pub fn flush(&mut self) {
        self.resources.clear();
        debug!("storage cache flushed");
    }

    pub fn cached_count(&self) -> usize {
        self.resources.len()
    }

    /// Age the cache; entries past the age limit are released.
    pub fn update(&mut self, delta_time: f64) -> bool {
        let age_limit = self.age_limit;
        self.resources.retain_mut(|entry| {
            entry.age += delta_time;
            if entry.age < age_limit {
                true
            } else {
                debug!("resource `{}` aged out, releasing", entry.name);
                false
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let mut file = std::fs::File::create(data.join("greeting.txt")).unwrap();
        file.write_all(b"hello there").unwrap();

        let storage = Storage::new(&StorageSettings {
            path: data,
            user_root: Some(dir.path().join("user")),
        })
        .unwrap();
        (dir, storage)
    }

    #[test]
    fn load_memoizes_and_returns_the_same_pointer() {
        let (_dir, mut storage) = fixture();

        let first = storage.load("greeting.txt", ResourceKind::String).unwrap();
        let second = storage.load("greeting.txt", ResourceKind::String).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.as_string(), Some("hello there"));
        assert_eq!(storage.cached_count(), 1);
    }

    #[test]
    fn missing_resources_report_not_found() {
        let (_dir, mut storage) = fixture();
        assert!(matches!(
            storage.load("absent.txt", ResourceKind::Blob),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            storage.open("../escape.txt"),
            Err(EngineError::InvalidPath(_))
        ));
    }

    #[test]
    fn aging_releases_and_reload_succeeds() {
        let (_dir, mut storage) = fixture();

        storage.load("greeting.txt", ResourceKind::String).unwrap();
        assert_eq!(storage.cached_count(), 1);

        storage.update(31.0);
        assert_eq!(storage.cached_count(), 0);

        // The name is still resolvable and reload repopulates the cache.
        let reloaded = storage.load("greeting.txt", ResourceKind::String).unwrap();
        assert_eq!(reloaded.as_string(), Some("hello there"));
        assert_eq!(storage.cached_count(), 1);
    }

    #[test]
    fn reuse_resets_the_age() {
        let (_dir, mut storage) = fixture();

        storage.load("greeting.txt", ResourceKind::String).unwrap();
        storage.update(20.0);
        storage.load("greeting.txt", ResourceKind::String).unwrap(); // Hit: age back to 0.
        storage.update(20.0);
        assert_eq!(storage.cached_count(), 1);
        storage.update(20.0);
        assert_eq!(storage.cached_count(), 0);
    }

    #[test]
    fn cache_cap_marks_the_oldest_for_release() {
        let (dir, storage) = fixture();
        let mut storage = storage.with_limits(30.0, 2);

        for name in ["a.txt", "b.txt", "c.txt"] {
            let mut file =
                std::fs::File::create(dir.path().join("data").join(name)).unwrap();
            file.write_all(name.as_bytes()).unwrap();
        }

        storage.load("a.txt", ResourceKind::String).unwrap();
        storage.update(1.0); // `a` is now the oldest.
        storage.load("b.txt", ResourceKind::String).unwrap();
        storage.load("c.txt", ResourceKind::String).unwrap(); // Over the cap: `a` marked.
        assert_eq!(storage.cached_count(), 3);

        storage.update(0.5);
        assert_eq!(storage.cached_count(), 2);
        assert!(storage
            .resources
            .iter()
            .all(|entry| entry.name != "a.txt"));
    }

    #[test]
    fn injection_shadows_mounted_files() {
        let (_dir, mut storage) = fixture();

        storage.inject_raw("greeting.txt", b"injected");
        let resource = storage.load("greeting.txt", ResourceKind::String).unwrap();
        assert_eq!(resource.as_string(), Some("injected"));
    }

    #[test]
    fn store_writes_into_the_identity_folder() {
        let (dir, mut storage) = fixture();
        storage.set_identity("my-game").unwrap();

        storage
            .store("save.dat", &Resource::Blob(vec![7, 7, 7]))
            .unwrap();
        let written = std::fs::read(dir.path().join("user/my-game/save.dat")).unwrap();
        assert_eq!(written, vec![7, 7, 7]);

        // Stored files resolve through the identity mount...
        let mut handle = storage.open("save.dat").unwrap();
        assert_eq!(handle.read_to_end().unwrap(), vec![7, 7, 7]);
        // ...but storing does not populate the resource cache.
        assert_eq!(storage.cached_count(), 0);
    }

    #[test]
    fn store_then_load_image_round_trips() {
        let (_dir, mut storage) = fixture();
        storage.set_identity("shots").unwrap();

        let pixels: Vec<u8> = (0..16).flat_map(|i| [i * 16, 0, 255 - i * 16, 255]).collect();
        let original = Resource::Image {
            width: 4,
            height: 4,
            pixels: pixels.clone(),
        };
        storage.store("shot.png", &original).unwrap();

        let loaded = storage.load("shot.png", ResourceKind::Image).unwrap();
        let (width, height, decoded) = loaded.as_image().unwrap();
        assert_eq!((width, height), (4, 4));
        assert_eq!(decoded, pixels.as_slice());
    }
}
