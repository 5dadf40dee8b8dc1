//! Streaming audio sources: a decoder plus per-source routing state
//! (loop, group, mix, gain, speed).

use crate::audio::mixer::{Mix, SAMPLE_RATE};
use crate::errors::EngineError;

/// What a named asset is opened as. `Music` and `Module` stream from the
/// handle, `Sample` is fully decoded up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Music,
    Sample,
    Module,
}

impl SourceKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "music" => Some(Self::Music),
            "sample" => Some(Self::Sample),
            "module" => Some(Self::Module),
            _ => None,
        }
    }
}

/// The codec-backend contract: pull interleaved frames on demand.
///
/// Implementations must not block; at most `frames` frames of decode work
/// happen per call.
pub trait Decoder: Send {
    /// Rewind to the beginning.
    fn reset(&mut self) -> Result<(), EngineError>;
    /// Fill `output` (interleaved stereo, `frames * 2` samples) and return
    /// the frames produced; less than `frames` means end-of-stream.
    fn generate(&mut self, output: &mut [f32], frames: usize) -> usize;
    /// Native rate of the decoded stream.
    fn sample_rate(&self) -> u32;
}

pub struct Source {
    decoder: Box<dyn Decoder>,
    kind: SourceKind,
    looped: bool,
    group: usize,
    mix: Mix,
    gain: f32,
    speed: f32,
    /// Fractional read position into `pending`, advanced by the resampling
    /// step.
    position: f64,
    pending: Vec<f32>,
    exhausted: bool,
}

impl Source {
    pub fn new(decoder: Box<dyn Decoder>, kind: SourceKind) -> Self {
        Self {
            decoder,
            kind,
            looped: false,
            group: crate::audio::mixer::DEFAULT_GROUP,
            mix: Mix::identity(),
            gain: 1.0,
            speed: 1.0,
            position: 0.0,
            pending: Vec::new(),
            exhausted: false,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn set_group(&mut self, group: usize) {
        self.group = group;
    }

    pub fn mix(&self) -> Mix {
        self.mix
    }

    pub fn set_mix(&mut self, mix: Mix) {
        self.mix = mix;
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.mix = Mix::pan(pan.clamp(-1.0, 1.0));
    }

    pub fn set_balance(&mut self, balance: f32) {
        self.mix = Mix::balance(balance.clamp(-1.0, 1.0));
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(f32::EPSILON);
    }

    /// Rewind the decoder and drop any buffered frames.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.decoder.reset()?;
        self.pending.clear();
        self.position = 0.0;
        self.exhausted = false;
        Ok(())
    }

    /// The per-output-frame advance through the decoded stream.
    fn step(&self) -> f64 {
        self.speed as f64 * self.decoder.sample_rate() as f64 / SAMPLE_RATE as f64
    }

    fn buffered_frames(&self) -> usize {
        self.pending.len() / 2
    }

    fn refill(&mut self, frames: usize) {
        let mut chunk = vec![0.0f32; frames * 2];
        let produced = self.decoder.generate(&mut chunk, frames);
        self.pending.extend_from_slice(&chunk[..produced * 2]);
        if produced < frames {
            if self.looped && self.decoder.reset().is_ok() {
                let missing = frames - produced;
                let mut tail = vec![0.0f32; missing * 2];
                let more = self.decoder.generate(&mut tail, missing);
                self.pending.extend_from_slice(&tail[..more * 2]);
                if more == 0 {
                    self.exhausted = true; // Empty stream, avoid spinning.
                }
            } else {
                self.exhausted = true;
            }
        }
    }

    /// Produce `frames` stereo frames into `output` (gain and mix applied),
    /// resampling by speed and rate. Returns the frames written; less than
    /// `frames` means the source is over.
    pub fn generate(&mut self, output: &mut [f32], frames: usize) -> usize {
        let step = self.step();
        let mut written = 0;

        while written < frames {
            let needed = (self.position + step * (frames - written) as f64).ceil() as usize + 1;
            if !self.exhausted && self.buffered_frames() < needed {
                let missing = needed - self.buffered_frames();
                self.refill(missing.max(256));
            }

            let index = self.position.floor() as usize;
            if index + 1 >= self.buffered_frames() {
                if self.exhausted {
                    break;
                }
                continue;
            }

            // Linear interpolation between adjacent frames.
            let fraction = (self.position - index as f64) as f32;
            let left = self.pending[index * 2] * (1.0 - fraction)
                + self.pending[(index + 1) * 2] * fraction;
            let right = self.pending[index * 2 + 1] * (1.0 - fraction)
                + self.pending[(index + 1) * 2 + 1] * fraction;

            let (left, right) = self.mix.apply(left * self.gain, right * self.gain);
            output[written * 2] = left;
            output[written * 2 + 1] = right;

            written += 1;
            self.position += step;
        }

        // Discard fully consumed frames, keeping one for interpolation.
        let consumed = (self.position.floor() as usize).saturating_sub(1);
        if consumed > 0 {
            self.pending.drain(..consumed.min(self.buffered_frames()) * 2);
            self.position -= consumed as f64;
        }

        written
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A deterministic decoder: a fixed number of constant-valued frames.
    pub struct ConstantDecoder {
        pub value: f32,
        pub frames: usize,
        pub cursor: usize,
        pub sample_rate: u32,
    }

    impl ConstantDecoder {
        pub fn new(value: f32, frames: usize) -> Self {
            Self {
                value,
                frames,
                cursor: 0,
                sample_rate: SAMPLE_RATE,
            }
        }
    }

    impl Decoder for ConstantDecoder {
        fn reset(&mut self) -> Result<(), EngineError> {
            self.cursor = 0;
            Ok(())
        }

        fn generate(&mut self, output: &mut [f32], frames: usize) -> usize {
            let left = self.frames - self.cursor;
            let produced = left.min(frames);
            for sample in output.iter_mut().take(produced * 2) {
                *sample = self.value;
            }
            self.cursor += produced;
            produced
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ConstantDecoder;
    use super::*;

    #[test]
    fn a_finite_source_reports_its_end() {
        let mut source = Source::new(Box::new(ConstantDecoder::new(0.5, 100)), SourceKind::Sample);
        let mut output = vec![0.0; 256 * 2];
        let written = source.generate(&mut output, 256);
        assert!(written < 256);
        assert!(written >= 99); // Interpolation may cost the last frame.
        assert!((output[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn a_looped_source_never_runs_dry() {
        let mut source = Source::new(Box::new(ConstantDecoder::new(0.25, 64)), SourceKind::Music);
        source.set_looped(true);
        let mut output = vec![0.0; 512 * 2];
        let written = source.generate(&mut output, 512);
        assert_eq!(written, 512);
        assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn gain_scales_the_samples() {
        let mut source = Source::new(Box::new(ConstantDecoder::new(1.0, 64)), SourceKind::Sample);
        source.set_looped(true);
        source.set_gain(0.5);
        let mut output = vec![0.0; 8 * 2];
        source.generate(&mut output, 8);
        assert!((output[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn double_speed_halves_the_duration() {
        let mut source = Source::new(Box::new(ConstantDecoder::new(0.5, 100)), SourceKind::Sample);
        source.set_speed(2.0);
        let mut output = vec![0.0; 256 * 2];
        let written = source.generate(&mut output, 256);
        assert!((45..=51).contains(&written), "wrote {written}");
    }

    #[test]
    fn setters_round_trip_with_clamping() {
        let mut source = Source::new(Box::new(ConstantDecoder::new(0.0, 1)), SourceKind::Music);
        source.set_gain(2.0);
        assert_eq!(source.gain(), 2.0);
        source.set_gain(-1.0);
        assert_eq!(source.gain(), 0.0);
        source.set_group(3);
        assert_eq!(source.group(), 3);
        source.set_looped(true);
        assert!(source.is_looped());
    }
}
