//! Typed resources loaded (and memoized) by the storage subsystem.

use crate::errors::EngineError;
use crate::storage::vfs::Stream;

/// The three resource flavors a name can be loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    String,
    Blob,
    Image,
}

#[derive(Debug, Clone)]
pub enum Resource {
    String(String),
    Blob(Vec<u8>),
    Image {
        width: u32,
        height: u32,
        /// RGBA8, row-major, `width * height * 4` bytes.
        pixels: Vec<u8>,
    },
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::String(_) => ResourceKind::String,
            Resource::Blob(_) => ResourceKind::Blob,
            Resource::Image { .. } => ResourceKind::Image,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Resource::String(chars) => Some(chars),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Resource::Blob(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<(u32, u32, &[u8])> {
        match self {
            Resource::Image {
                width,
                height,
                pixels,
            } => Some((*width, *height, pixels)),
            _ => None,
        }
    }

    /// Decode the content of `handle` according to `kind`.
    pub fn load(
        name: &str,
        kind: ResourceKind,
        handle: &mut dyn Stream,
    ) -> Result<Self, EngineError> {
        let data = handle.read_to_end()?;
        match kind {
            ResourceKind::String => Ok(Resource::String(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            ResourceKind::Blob => Ok(Resource::Blob(data)),
            ResourceKind::Image => {
                let decoded = image::load_from_memory(&data)
                    .map_err(|e| EngineError::decode(name, e))?
                    .to_rgba8();
                let (width, height) = (decoded.width(), decoded.height());
                Ok(Resource::Image {
                    width,
                    height,
                    pixels: decoded.into_raw(),
                })
            }
        }
    }
}
