//! # Miso
//!
//! Miso is a self-contained 2D retro-style game engine: a host process
//! that boots a Lua-scripted game from a virtual file system, exposes a
//! fixed palette of subsystems (an indexed-color rasterizer with a
//! per-scanline display program, a grouped audio mixer, an input
//! aggregator, a 2D physics façade and persistent storage) and drives a
//! deterministic fixed-timestep main loop.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use miso::prelude::*;
//!
//! # fn main() -> Result<(), EngineError> {
//! let mut engine = Engine::new(&EngineOptions {
//!     path: "path/to/game".into(),
//!     ..EngineOptions::default()
//! })?;
//! engine.run()?;
//! # Ok(()) }
//! ```
//!
//! The data folder (or archive) must carry a `miso.config` file and a
//! `boot.lua` script returning an object with `process`, `update` and
//! `render` methods.
//!
//! ## Concepts
//! - [`Engine`] — subsystem wiring and the main loop
//! - [`storage::Storage`] — mounts, resource cache, persistent state
//! - [`display::Display`] — the indexed canvas and the present pipeline
//! - [`audio::Audio`] — grouped mixing into the output device
//! - [`input::Input`] — keyboard/cursor/controller aggregation
//! - [`script::Interpreter`] — the embedded VM and the module surface
//!
//! ## Backends
//! The default build is headless (scripted input, retained frames) and
//! silent (pull-driven mixer), which keeps the whole engine testable.
//! Enable the `backend_glfw` and `backend_cpal` features for a real
//! window and a real output stream.

#![cfg_attr(not(feature = "backend_glfw"), forbid(unsafe_code))]

pub mod audio;
pub mod config;
pub mod display;
pub mod engine;
pub mod environment;
pub mod errors;
pub mod events;
pub mod generators;
pub mod graphics;
pub mod input;
pub mod physics;
pub mod platform;
pub mod script;
pub mod storage;
pub mod util;
pub mod version;

pub use config::Configuration;
pub use engine::{Engine, EngineOptions};
pub use errors::EngineError;
pub use events::EngineEvent;
pub use version::Version;

pub mod prelude {
    pub use crate::{Configuration, Engine, EngineError, EngineOptions};
}
