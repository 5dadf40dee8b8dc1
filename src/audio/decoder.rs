//! Codec backends for audio sources, implemented over `symphonia`.

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::audio::source::{Decoder, SourceKind};
use crate::errors::EngineError;
use crate::storage::vfs::{Stream, Whence};

/// Adapt a VFS handle to symphonia's byte-source contract.
struct HandleSource {
    handle: Box<dyn Stream>,
}

impl std::io::Read for HandleSource {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        self.handle
            .read(buffer)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

impl std::io::Seek for HandleSource {
    fn seek(&mut self, position: std::io::SeekFrom) -> std::io::Result<u64> {
        let (offset, whence) = match position {
            std::io::SeekFrom::Start(offset) => (offset as i64, Whence::Set),
            std::io::SeekFrom::Current(offset) => (offset, Whence::Cur),
            std::io::SeekFrom::End(offset) => (offset, Whence::End),
        };
        self.handle
            .seek(offset, whence)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

impl MediaSource for HandleSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.handle.size())
    }
}

/// A streaming decoder over a VFS handle. Decode work is bounded by the
/// requested frame count, so pulls from the audio callback stay short.
pub struct StreamingDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    /// Decoded samples already converted to interleaved stereo.
    queue: Vec<f32>,
    finished: bool,
}

impl StreamingDecoder {
    pub fn new(handle: Box<dyn Stream>, name: &str) -> Result<Self, EngineError> {
        let source = HandleSource { handle };
        let stream = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some((_, extension)) = name.rsplit_once('.') {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| EngineError::decode(name, e))?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| EngineError::decode(name, "no decodable track"))?;
        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track
            .codec_params
            .channels
            .map(|channels| channels.count())
            .unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::decode(name, e))?;

        debug!("decoder ready for `{name}` ({sample_rate} Hz, {channels} channel(s))");

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            queue: Vec::new(),
            finished: false,
        })
    }

    /// Decode one more packet into the queue; `false` on end-of-stream.
    fn pump(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(_) => return false, // Exhausted (or unrecoverable).
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut samples =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    push_as_stereo(&mut self.queue, samples.samples(), self.channels);
                    return true;
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    // Bad packet, skip it and keep going.
                    warn!("decode error, skipping packet: {reason}");
                    continue;
                }
                Err(_) => return false,
            }
        }
    }
}

impl Decoder for StreamingDecoder {
    fn reset(&mut self) -> Result<(), EngineError> {
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::default(),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| EngineError::decode("source", e))?;
        self.decoder.reset();
        self.queue.clear();
        self.finished = false;
        Ok(())
    }

    fn generate(&mut self, output: &mut [f32], frames: usize) -> usize {
        while !self.finished && self.queue.len() < frames * 2 {
            if !self.pump() {
                self.finished = true;
            }
        }
        let produced = (self.queue.len() / 2).min(frames);
        output[..produced * 2].copy_from_slice(&self.queue[..produced * 2]);
        self.queue.drain(..produced * 2);
        produced
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// A fully pre-decoded source, for short samples triggered repeatedly.
pub struct PreloadedDecoder {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
}

impl PreloadedDecoder {
    pub fn new(mut streaming: StreamingDecoder) -> Self {
        let mut samples = Vec::new();
        while streaming.pump() {}
        samples.append(&mut streaming.queue);
        Self {
            samples,
            sample_rate: streaming.sample_rate,
            cursor: 0,
        }
    }
}

impl Decoder for PreloadedDecoder {
    fn reset(&mut self) -> Result<(), EngineError> {
        self.cursor = 0;
        Ok(())
    }

    fn generate(&mut self, output: &mut [f32], frames: usize) -> usize {
        let left = (self.samples.len() - self.cursor) / 2;
        let produced = left.min(frames);
        output[..produced * 2]
            .copy_from_slice(&self.samples[self.cursor..self.cursor + produced * 2]);
        self.cursor += produced * 2;
        produced
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn push_as_stereo(queue: &mut Vec<f32>, samples: &[f32], channels: usize) {
    match channels {
        0 => {}
        1 => {
            for &sample in samples {
                queue.push(sample);
                queue.push(sample);
            }
        }
        2 => queue.extend_from_slice(samples),
        _ => {
            for frame in samples.chunks_exact(channels) {
                queue.push(frame[0]);
                queue.push(frame[1]);
            }
        }
    }
}

/// Build the decoder backend matching the source kind: samples are
/// preloaded, music and modules stream.
pub fn from_handle(
    handle: Box<dyn Stream>,
    kind: SourceKind,
    name: &str,
) -> Result<Box<dyn Decoder>, EngineError> {
    let streaming = StreamingDecoder::new(handle, name)?;
    match kind {
        SourceKind::Sample => Ok(Box::new(PreloadedDecoder::new(streaming))),
        SourceKind::Music | SourceKind::Module => Ok(Box::new(streaming)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mounts::MemoryMount;
    use crate::storage::vfs::Mount;

    /// A minimal 16-bit stereo PCM WAV container.
    fn wav_bytes(frames: &[(i16, i16)], sample_rate: u32) -> Vec<u8> {
        let data_size = (frames.len() * 4) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM.
        bytes.extend_from_slice(&2u16.to_le_bytes()); // Stereo.
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        for &(left, right) in frames {
            bytes.extend_from_slice(&left.to_le_bytes());
            bytes.extend_from_slice(&right.to_le_bytes());
        }
        bytes
    }

    fn handle_for(bytes: &[u8]) -> Box<dyn Stream> {
        let cache = MemoryMount::new();
        cache.inject_raw("clip.wav", bytes);
        cache.open("clip.wav").unwrap()
    }

    #[test]
    fn wav_decodes_and_resets() {
        let frames: Vec<(i16, i16)> = (0..64).map(|i| (i * 256, -i * 256)).collect();
        let bytes = wav_bytes(&frames, 44100);

        let mut decoder = StreamingDecoder::new(handle_for(&bytes), "clip.wav").unwrap();
        assert_eq!(decoder.sample_rate(), 44100);

        let mut output = vec![0.0f32; 128 * 2];
        let produced = decoder.generate(&mut output, 128);
        assert_eq!(produced, 64);
        assert!((output[2] - (256.0 / 32768.0)).abs() < 1e-3);
        assert!(output[3] < 0.0);

        // Exhausted now, then rewound.
        assert_eq!(decoder.generate(&mut output, 16), 0);
        decoder.reset().unwrap();
        assert_eq!(decoder.generate(&mut output, 128), 64);
    }

    #[test]
    fn preloaded_decoder_replays_from_memory() {
        let frames: Vec<(i16, i16)> = (0..32).map(|_| (1000, 1000)).collect();
        let bytes = wav_bytes(&frames, 22050);

        let streaming = StreamingDecoder::new(handle_for(&bytes), "clip.wav").unwrap();
        let mut decoder = PreloadedDecoder::new(streaming);
        assert_eq!(decoder.sample_rate(), 22050);

        let mut output = vec![0.0f32; 32 * 2];
        assert_eq!(decoder.generate(&mut output, 32), 32);
        assert_eq!(decoder.generate(&mut output, 32), 0);
        decoder.reset().unwrap();
        assert_eq!(decoder.generate(&mut output, 32), 32);
    }

    #[test]
    fn garbage_fails_to_probe() {
        assert!(StreamingDecoder::new(handle_for(&[0u8; 64]), "noise.bin").is_err());
    }
}
