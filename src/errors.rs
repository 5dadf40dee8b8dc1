use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine version mismatch (required {required}, current {current})")]
    VersionMismatch { required: String, current: String },

    #[error("Resource `{0}` not found in any mount")]
    NotFound(String),

    #[error("Can't decode `{name}`: {reason}")]
    Decode { name: String, reason: String },

    #[error("Invalid path `{0}`")]
    InvalidPath(String),

    #[error("I/O error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource limit exceeded: {0}")]
    Resource(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Script error: {0}")]
    Script(#[from] mlua::Error),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EngineError::Decode {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
