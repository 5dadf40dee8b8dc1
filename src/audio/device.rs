//! Output devices. The engine mixes through [`SoundContext::generate`]
//! either pulled by a real device callback (`backend_cpal`) or by whoever
//! drives the null device (tests, offline rendering).
//!
//! [`SoundContext::generate`]: crate::audio::mixer::SoundContext::generate

use crate::errors::EngineError;

pub trait OutputDevice {
    fn start(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    fn is_started(&self) -> bool;
}

/// A device that never pulls; the mixer can still be driven manually.
#[derive(Default)]
pub struct NullDevice {
    started: bool,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDevice for NullDevice {
    fn start(&mut self) -> Result<(), EngineError> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.started = false;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

#[cfg(feature = "backend_cpal")]
pub use real::CpalDevice;

#[cfg(feature = "backend_cpal")]
mod real {
    use std::sync::{Arc, Mutex};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use log::{error, info};

    use super::OutputDevice;
    use crate::audio::mixer::{SoundContext, CHANNELS, SAMPLE_RATE};
    use crate::errors::EngineError;

    pub struct CpalDevice {
        stream: cpal::Stream,
        started: bool,
    }

    impl CpalDevice {
        pub fn new(
            context: Arc<Mutex<SoundContext>>,
            device_index: Option<usize>,
        ) -> Result<Self, EngineError> {
            let host = cpal::default_host();
            let device = match device_index {
                None => host.default_output_device(),
                Some(index) => host
                    .output_devices()
                    .ok()
                    .and_then(|mut devices| devices.nth(index)),
            }
            .ok_or_else(|| EngineError::Platform("no output audio device".into()))?;
            info!(
                "audio device is `{}`",
                device.name().unwrap_or_else(|_| "unknown".into())
            );

            let config = cpal::StreamConfig {
                channels: CHANNELS as u16,
                sample_rate: cpal::SampleRate(SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        // Mix under the context lock; the lock is held only
                        // for the duration of the pull.
                        if let Ok(mut context) = context.lock() {
                            let frames = data.len() / CHANNELS;
                            context.generate(data, frames);
                        } else {
                            data.fill(0.0);
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
                .map_err(|e| EngineError::Platform(format!("can't open the audio stream: {e}")))?;
            stream
                .pause()
                .map_err(|e| EngineError::Platform(format!("can't pause the audio stream: {e}")))?;

            Ok(Self {
                stream,
                started: false,
            })
        }
    }

    impl OutputDevice for CpalDevice {
        fn start(&mut self) -> Result<(), EngineError> {
            self.stream
                .play()
                .map_err(|e| EngineError::Platform(format!("can't start the audio stream: {e}")))?;
            self.started = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), EngineError> {
            self.stream
                .pause()
                .map_err(|e| EngineError::Platform(format!("can't stop the audio stream: {e}")))?;
            self.started = false;
            Ok(())
        }

        fn is_started(&self) -> bool {
            self.started
        }
    }
}
