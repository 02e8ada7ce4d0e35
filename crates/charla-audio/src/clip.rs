use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::AudioError;

/// Sample rate the transcription model is tuned for.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Sample width in bytes sent for transcription.
pub const TARGET_SAMPLE_WIDTH: u16 = 2;

/// Decoded PCM audio: interleaved 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Decode a WAV file held in memory.
    ///
    /// Integer samples of any width up to 32 bits and 32-bit float samples
    /// are converted to 16-bit.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, AudioError> {
        let mut reader =
            WavReader::new(Cursor::new(bytes)).map_err(|e| AudioError::InvalidWav(e.to_string()))?;
        let spec = reader.spec();

        debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            "Decoding WAV"
        );

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits) if bits <= 16 => {
                let shift = 16 - bits;
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v << shift))
                    .collect::<Result<_, _>>()
                    .map_err(|e| AudioError::InvalidWav(e.to_string()))?
            }
            (SampleFormat::Int, bits) if bits <= 32 => {
                let shift = bits - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<Result<_, _>>()
                    .map_err(|e| AudioError::InvalidWav(e.to_string()))?
            }
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::InvalidWav(e.to_string()))?,
            (format, bits) => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit {:?}",
                    bits, format
                )))
            }
        };

        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }

    /// Encode as a 16-bit PCM WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        if self.samples.is_empty() {
            return Err(AudioError::Empty);
        }

        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: TARGET_SAMPLE_WIDTH * 8,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                WavWriter::new(&mut cursor, spec).map_err(|e| AudioError::Encode(e.to_string()))?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| AudioError::Encode(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| AudioError::Encode(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Average all channels into one.
    pub fn to_mono(&self) -> AudioClip {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.clone();
        }

        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect();

        AudioClip::new(samples, self.sample_rate, 1)
    }

    /// Linear-interpolation resample to `target_rate`.
    pub fn resample(&self, target_rate: u32) -> AudioClip {
        if self.sample_rate == target_rate || self.samples.is_empty() || target_rate == 0 {
            return self.clone();
        }

        let channels = self.channels.max(1) as usize;
        let frames = self.frames();
        if frames == 0 {
            return AudioClip::new(Vec::new(), target_rate, self.channels);
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_frames = ((frames as f64 / ratio).round() as usize).max(1);
        let last = frames - 1;

        let mut samples = Vec::with_capacity(out_frames * channels);
        for i in 0..out_frames {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = pos - idx as f64;
            for c in 0..channels {
                let a = self.samples[idx * channels + c] as f64;
                let b = self.samples[next * channels + c] as f64;
                samples.push((a + (b - a) * frac).round() as i16);
            }
        }

        AudioClip::new(samples, target_rate, self.channels)
    }

    /// Mono, 16 kHz: the shape sent to the transcription service.
    pub fn prepare_for_transcription(&self) -> AudioClip {
        self.to_mono().resample(TARGET_SAMPLE_RATE)
    }
}
