//! Audio subsystem: the mixing context behind its lock, the output device
//! lifecycle, and the group-level API exposed to scripts.

use std::sync::{Arc, Mutex};

use log::debug;

pub mod decoder;
pub mod device;
pub mod mixer;
pub mod source;

use crate::errors::EngineError;
use device::OutputDevice;
use mixer::{Mix, SoundContext};
use source::Source;

/// How long the device keeps running after the last source is untracked.
const STOP_GRACE_PERIOD: f64 = 1.0;

pub struct AudioSettings {
    /// `None` picks the default output device.
    pub device_index: Option<usize>,
    pub master_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device_index: None,
            master_volume: 1.0,
        }
    }
}

pub struct Audio {
    context: Arc<Mutex<SoundContext>>,
    device: Box<dyn OutputDevice>,
    grace: f64,
}

impl Audio {
    pub fn new(settings: &AudioSettings) -> Result<Self, EngineError> {
        let context = Arc::new(Mutex::new(SoundContext::new()));
        context
            .lock()
            .unwrap()
            .set_master_volume(settings.master_volume);

        let device = Self::open_device(&context, settings)?;
        debug!("audio ready");

        Ok(Self {
            context,
            device,
            grace: 0.0,
        })
    }

    #[cfg(feature = "backend_cpal")]
    fn open_device(
        context: &Arc<Mutex<SoundContext>>,
        settings: &AudioSettings,
    ) -> Result<Box<dyn OutputDevice>, EngineError> {
        Ok(Box::new(device::CpalDevice::new(
            context.clone(),
            settings.device_index,
        )?))
    }

    #[cfg(not(feature = "backend_cpal"))]
    fn open_device(
        _context: &Arc<Mutex<SoundContext>>,
        _settings: &AudioSettings,
    ) -> Result<Box<dyn OutputDevice>, EngineError> {
        Ok(Box::new(device::NullDevice::new()))
    }

    /// The shared mixing context (device callbacks and tests pull through
    /// this).
    pub fn context(&self) -> &Arc<Mutex<SoundContext>> {
        &self.context
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.context.lock().unwrap().set_master_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.context.lock().unwrap().master_volume()
    }

    pub fn set_group_mix(&self, group_id: usize, mix: Mix) {
        self.context.lock().unwrap().set_mix(group_id, mix);
    }

    pub fn set_group_pan(&self, group_id: usize, pan: f32) {
        self.set_group_mix(group_id, Mix::pan(pan));
    }

    pub fn set_group_balance(&self, group_id: usize, balance: f32) {
        self.set_group_mix(group_id, Mix::balance(balance));
    }

    pub fn set_group_gain(&self, group_id: usize, gain: f32) {
        self.context.lock().unwrap().set_gain(group_id, gain);
    }

    pub fn group_mix(&self, group_id: usize) -> Mix {
        self.context.lock().unwrap().group(group_id).mix
    }

    pub fn group_gain(&self, group_id: usize) -> f32 {
        self.context.lock().unwrap().group(group_id).gain
    }

    /// Add a source to the mix, optionally rewinding it first.
    pub fn track(&mut self, source: &Arc<Mutex<Source>>, reset: bool) {
        let mut context = self.context.lock().unwrap();
        if reset {
            if let Err(error) = source.lock().unwrap().reset() {
                log::warn!("can't reset source: {error}");
            }
        }
        context.track(source);
    }

    pub fn untrack(&mut self, source: &Arc<Mutex<Source>>) {
        self.context.lock().unwrap().untrack(source);
    }

    pub fn is_tracked(&self, source: &Arc<Mutex<Source>>) -> bool {
        self.context.lock().unwrap().is_tracked(source)
    }

    /// Remove every tracked source.
    pub fn halt(&mut self) {
        self.context.lock().unwrap().halt();
        debug!("halted, no more sources active");
    }

    /// Housekeeping plus the device start/stop policy: start on the first
    /// tracked source, stop once none are left for a grace period.
    pub fn update(&mut self, delta_time: f64) -> bool {
        let count = {
            let mut context = self.context.lock().unwrap();
            context.update(delta_time);
            context.tracked_count()
        };

        if count > 0 {
            self.grace = STOP_GRACE_PERIOD;
            if !self.device.is_started() {
                debug!("{count} incoming source(s), starting the device");
                if self.device.start().is_err() {
                    return false;
                }
            }
        } else if self.device.is_started() {
            self.grace -= delta_time;
            if self.grace <= 0.0 {
                debug!("no more sources and grace period elapsed, stopping the device");
                if self.device.stop().is_err() {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::testing::ConstantDecoder;
    use crate::audio::source::SourceKind;

    fn looped(value: f32) -> Arc<Mutex<Source>> {
        let mut source = Source::new(Box::new(ConstantDecoder::new(value, 32)), SourceKind::Music);
        source.set_looped(true);
        Arc::new(Mutex::new(source))
    }

    #[test]
    fn device_starts_with_sources_and_stops_after_the_grace_period() {
        let mut audio = Audio::new(&AudioSettings::default()).unwrap();
        assert!(!audio.device.is_started());

        let source = looped(0.5);
        audio.track(&source, true);
        audio.update(0.1);
        assert!(audio.device.is_started());

        audio.halt();
        audio.update(0.5);
        assert!(audio.device.is_started()); // Still in the grace period.
        audio.update(0.6);
        assert!(!audio.device.is_started());
    }

    #[test]
    fn group_settings_round_trip() {
        let audio = Audio::new(&AudioSettings::default()).unwrap();
        audio.set_group_gain(2, 0.25);
        assert_eq!(audio.group_gain(2), 0.25);

        audio.set_group_balance(1, -1.0);
        let mix = audio.group_mix(1);
        assert_eq!(mix.right_to_right, 0.0);
        assert_eq!(mix.left_to_left, 1.0);

        audio.set_master_volume(0.5);
        assert_eq!(audio.master_volume(), 0.5);
    }

    #[test]
    fn halt_silences_the_mix() {
        let mut audio = Audio::new(&AudioSettings::default()).unwrap();
        let first = looped(0.25);
        let second = looped(0.5);
        audio.track(&first, false);
        audio.track(&second, false);
        audio.update(1.0);

        let mut output = vec![0.0f32; 64 * 2];
        audio.context().lock().unwrap().generate(&mut output, 64);
        assert!(output.iter().all(|&s| (s - 0.75).abs() < 1e-5));

        audio.halt();
        audio.update(1.0);
        audio.context().lock().unwrap().generate(&mut output, 64);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tracking_respects_script_side_ownership() {
        let mut audio = Audio::new(&AudioSettings::default()).unwrap();
        let source = looped(0.1);
        audio.track(&source, false);
        assert!(audio.is_tracked(&source));

        audio.untrack(&source);
        assert!(!audio.is_tracked(&source));
        // The script side still owns the source after untracking.
        assert_eq!(Arc::strong_count(&source), 1);
    }
}
