//! Engine configuration.
//!
//! The [`Configuration`] struct carries every boot-time knob, grouped in
//! sections that mirror the `miso.config` file: a plain text format with
//! `[section]` headers and `key = value` entries. Unknown entries are
//! ignored with a warning, missing ones keep their defaults. Command-line
//! overrides use dot-keyed paths (`display.scale=3`).

use log::warn;

use crate::errors::EngineError;
use crate::version::Version;

/// The canonical configuration file name, resolved through the storage
/// mounts.
pub const CONFIGURATION_NAME: &str = "miso.config";

#[derive(Debug, Clone)]
pub struct SystemConfiguration {
    /// Name of the writable per-user folder.
    pub identity: String,
    /// Minimum engine version the game requires.
    pub version: Version,
    pub debug: bool,
    /// Window icon asset; empty for none.
    pub icon: String,
    /// Controller mappings asset (SDL gamepad DB format); empty for none.
    pub mappings: String,
    /// Whether the window close button terminates the loop.
    pub quit_on_close: bool,
}

#[derive(Debug, Clone)]
pub struct DisplayConfiguration {
    pub title: String,
    /// Canvas size; zero fits the monitor work area.
    pub width: u32,
    pub height: u32,
    /// Integer upscale; zero picks the largest that fits.
    pub scale: u32,
    pub fullscreen: bool,
    pub vertical_sync: bool,
    /// Fragment-effect asset; empty for the pass-through shader.
    pub effect: String,
}

#[derive(Debug, Clone)]
pub struct AudioConfiguration {
    /// Output device index; negative picks the default device.
    pub device_index: i32,
    pub master_volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    /// Leave collection to the VM.
    Automatic,
    /// Full collection every few seconds.
    Periodic,
    /// A small step on every update.
    Continuous,
}

impl GcMode {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "automatic" => Some(Self::Automatic),
            "periodic" => Some(Self::Periodic),
            "continuous" => Some(Self::Continuous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfiguration {
    pub frames_per_second: u32,
    /// Max catch-up iterations per frame.
    pub skippable_frames: u32,
    /// Hard frame cap; zero for uncapped.
    pub frames_limit: u32,
    pub gc_mode: GcMode,
}

#[derive(Debug, Clone)]
pub struct KeyboardConfiguration {
    /// Escape closes the window when set.
    pub exit_key: bool,
}

#[derive(Debug, Clone)]
pub struct CursorConfiguration {
    pub enabled: bool,
    pub hide: bool,
    /// Emulated-cursor speed, virtual pixels per second.
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct ControllerConfiguration {
    pub inner_deadzone: f32,
    pub outer_deadzone: f32,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub system: SystemConfiguration,
    pub display: DisplayConfiguration,
    pub audio: AudioConfiguration,
    pub engine: EngineConfiguration,
    pub keyboard: KeyboardConfiguration,
    pub cursor: CursorConfiguration,
    pub controller: ControllerConfiguration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            system: SystemConfiguration {
                identity: "miso".to_string(),
                version: Version::default(),
                debug: false,
                icon: String::new(),
                mappings: String::new(),
                quit_on_close: true,
            },
            display: DisplayConfiguration {
                title: "miso".to_string(),
                width: 320,
                height: 240,
                scale: 0,
                fullscreen: false,
                vertical_sync: false,
                effect: String::new(),
            },
            audio: AudioConfiguration {
                device_index: -1,
                master_volume: 1.0,
            },
            engine: EngineConfiguration {
                frames_per_second: 60,
                skippable_frames: 5,
                frames_limit: 0,
                gc_mode: GcMode::Continuous,
            },
            keyboard: KeyboardConfiguration { exit_key: true },
            cursor: CursorConfiguration {
                enabled: true,
                hide: true,
                speed: 512.0,
            },
            controller: ControllerConfiguration {
                inner_deadzone: 0.25,
                outer_deadzone: 0.0,
            },
        }
    }
}

fn parse_string(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_version(value: &str) -> Option<Version> {
    let mut parts = value.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let revision = parts.next()?.parse().ok()?;
    parts.next().is_none().then(|| Version::new(major, minor, revision))
}

impl Configuration {
    /// Parse the configuration file content over the defaults.
    pub fn parse(text: &str) -> Self {
        let mut configuration = Self::default();

        let mut section = String::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = header.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("malformed configuration line `{line}`");
                continue;
            };
            configuration.apply(&format!("{section}.{}", key.trim()), value.trim());
        }

        configuration
    }

    /// Apply a single dot-keyed entry, e.g. `display.scale` = `3`.
    pub fn apply(&mut self, key: &str, value: &str) {
        macro_rules! set {
            ($target:expr, $parser:expr) => {
                match $parser(value) {
                    Some(parsed) => $target = parsed,
                    None => warn!("invalid value `{value}` for `{key}`"),
                }
            };
        }
        match key {
            "system.identity" => set!(self.system.identity, parse_string),
            "system.version" => set!(self.system.version, parse_version),
            "system.debug" => set!(self.system.debug, parse_bool),
            "system.icon" => set!(self.system.icon, parse_string),
            "system.mappings" => set!(self.system.mappings, parse_string),
            "system.quit-on-close" => set!(self.system.quit_on_close, parse_bool),
            "display.title" => set!(self.display.title, parse_string),
            "display.width" => set!(self.display.width, parse_number),
            "display.height" => set!(self.display.height, parse_number),
            "display.scale" => set!(self.display.scale, parse_number),
            "display.fullscreen" => set!(self.display.fullscreen, parse_bool),
            "display.vertical-sync" => set!(self.display.vertical_sync, parse_bool),
            "display.effect" => set!(self.display.effect, parse_string),
            "audio.device-index" => set!(self.audio.device_index, parse_number),
            "audio.master-volume" => set!(self.audio.master_volume, parse_number),
            "engine.frames-per-second" => set!(self.engine.frames_per_second, parse_number),
            "engine.skippable-frames" => set!(self.engine.skippable_frames, parse_number),
            "engine.frames-limit" => set!(self.engine.frames_limit, parse_number),
            "engine.gc-mode" => set!(self.engine.gc_mode, GcMode::parse),
            "keyboard.exit-key" => set!(self.keyboard.exit_key, parse_bool),
            "cursor.enabled" => set!(self.cursor.enabled, parse_bool),
            "cursor.hide" => set!(self.cursor.hide, parse_bool),
            "cursor.speed" => set!(self.cursor.speed, parse_number),
            "controller.inner-deadzone" => set!(self.controller.inner_deadzone, parse_number),
            "controller.outer-deadzone" => set!(self.controller.outer_deadzone, parse_number),
            _ => warn!("unknown configuration entry `{key}`"),
        }
    }

    /// The engine must be at least as recent as the game requires.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.system.version > Version::CURRENT {
            return Err(EngineError::VersionMismatch {
                required: self.system.version.to_string(),
                current: Version::CURRENT.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# A sample game configuration.
[system]
identity = sample-game
version = 0.1.0
debug = true

[display]
title = Sample
width = 480
height = 270
scale = 2
fullscreen = false

[engine]
frames-per-second = 30
gc-mode = periodic

[controller]
inner-deadzone = 0.2
outer-deadzone = 0.05
"#;

    #[test]
    fn parsing_overlays_the_defaults() {
        let configuration = Configuration::parse(SAMPLE);
        assert_eq!(configuration.system.identity, "sample-game");
        assert!(configuration.system.debug);
        assert_eq!(configuration.display.width, 480);
        assert_eq!(configuration.display.height, 270);
        assert_eq!(configuration.display.scale, 2);
        assert_eq!(configuration.engine.frames_per_second, 30);
        assert_eq!(configuration.engine.gc_mode, GcMode::Periodic);
        assert_eq!(configuration.controller.inner_deadzone, 0.2);
        // Untouched entries keep their defaults.
        assert_eq!(configuration.engine.skippable_frames, 5);
        assert!(configuration.keyboard.exit_key);
    }

    #[test]
    fn dot_keyed_overrides_win() {
        let mut configuration = Configuration::parse(SAMPLE);
        configuration.apply("display.scale", "4");
        configuration.apply("system.identity", "overridden");
        assert_eq!(configuration.display.scale, 4);
        assert_eq!(configuration.system.identity, "overridden");
    }

    #[test]
    fn bad_values_are_ignored() {
        let mut configuration = Configuration::default();
        configuration.apply("display.width", "not-a-number");
        assert_eq!(configuration.display.width, 320);
        configuration.apply("bogus.key", "1");
    }

    #[test]
    fn version_gate() {
        let mut configuration = Configuration::default();
        configuration.apply("system.version", "0.0.1");
        assert!(configuration.validate().is_ok());
        configuration.apply("system.version", "99.0.0");
        assert!(matches!(
            configuration.validate(),
            Err(EngineError::VersionMismatch { .. })
        ));
    }
}
