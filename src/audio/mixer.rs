//! The mixing context: a fixed array of routing groups plus the set of
//! currently tracked sources.
//!
//! The context lives behind a mutex shared with the output device's
//! callback thread; every public mutator of the audio subsystem acquires
//! that lock around calls into here.

use std::sync::{Arc, Mutex, Weak};

use log::warn;

use crate::audio::source::Source;

pub const SAMPLE_RATE: u32 = 44100;
pub const CHANNELS: usize = 2;
pub const GROUPS_COUNT: usize = 8;
pub const DEFAULT_GROUP: usize = 0;

/// A 2x2 left/right routing matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mix {
    pub left_to_left: f32,
    pub left_to_right: f32,
    pub right_to_left: f32,
    pub right_to_right: f32,
}

impl Default for Mix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mix {
    pub fn identity() -> Self {
        Self {
            left_to_left: 1.0,
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: 1.0,
        }
    }

    /// Constant-power panning, `pan` in `[-1, 1]`.
    pub fn pan(pan: f32) -> Self {
        let theta = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5 * std::f32::consts::FRAC_PI_2;
        Self {
            left_to_left: theta.cos(),
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: theta.sin(),
        }
    }

    /// Linear balance, attenuating the opposite side only.
    pub fn balance(balance: f32) -> Self {
        let balance = balance.clamp(-1.0, 1.0);
        Self {
            left_to_left: if balance > 0.0 { 1.0 - balance } else { 1.0 },
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: if balance < 0.0 { 1.0 + balance } else { 1.0 },
        }
    }

    #[inline]
    pub fn apply(&self, left: f32, right: f32) -> (f32, f32) {
        (
            left * self.left_to_left + right * self.right_to_left,
            left * self.left_to_right + right * self.right_to_right,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Group {
    pub mix: Mix,
    pub gain: f32,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            mix: Mix::identity(),
            gain: 1.0,
        }
    }
}

pub struct SoundContext {
    groups: [Group; GROUPS_COUNT],
    tracked: Vec<Weak<Mutex<Source>>>,
    master_volume: f32,
}

impl Default for SoundContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundContext {
    pub fn new() -> Self {
        Self {
            groups: [Group::default(); GROUPS_COUNT],
            tracked: Vec::new(),
            master_volume: 1.0,
        }
    }

    pub fn group(&self, group_id: usize) -> Group {
        self.groups[group_id.min(GROUPS_COUNT - 1)]
    }

    pub fn set_mix(&mut self, group_id: usize, mix: Mix) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.mix = mix;
        }
    }

    pub fn set_gain(&mut self, group_id: usize, gain: f32) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.gain = gain.max(0.0);
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_tracked(&self, source: &Arc<Mutex<Source>>) -> bool {
        self.tracked
            .iter()
            .any(|weak| weak.as_ptr() == Arc::as_ptr(source))
    }

    /// Insert into the active set; the context only holds a weak
    /// reference, ownership stays with the caller.
    pub fn track(&mut self, source: &Arc<Mutex<Source>>) {
        if !self.is_tracked(source) {
            self.tracked.push(Arc::downgrade(source));
        }
    }

    pub fn untrack(&mut self, source: &Arc<Mutex<Source>>) {
        self.tracked
            .retain(|weak| weak.as_ptr() != Arc::as_ptr(source));
    }

    pub fn halt(&mut self) {
        self.tracked.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Drop dead weak references; finished sources are removed by
    /// [`SoundContext::generate`] itself.
    pub fn update(&mut self, _delta_time: f64) -> bool {
        self.tracked.retain(|weak| weak.strong_count() > 0);
        true
    }

    /// Mix `frames` stereo frames of every tracked source into `output`
    /// (interleaved, `frames * 2` samples). Sources hitting their end
    /// while not looped are untracked.
    pub fn generate(&mut self, output: &mut [f32], frames: usize) {
        output[..frames * CHANNELS].fill(0.0);

        let groups = self.groups;
        let master = self.master_volume;
        let mut buffer = vec![0.0f32; frames * CHANNELS];

        self.tracked.retain(|weak| {
            let Some(source) = weak.upgrade() else {
                return false;
            };
            let Ok(mut source) = source.lock() else {
                warn!("source mutex poisoned, dropping the source");
                return false;
            };

            let written = source.generate(&mut buffer, frames);
            let group = groups[source.group().min(GROUPS_COUNT - 1)];
            for frame in 0..written {
                let (left, right) = group.mix.apply(buffer[frame * 2], buffer[frame * 2 + 1]);
                output[frame * 2] += left * group.gain * master;
                output[frame * 2 + 1] += right * group.gain * master;
            }

            written == frames || source.is_looped()
        });
    }
}
