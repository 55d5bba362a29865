//! Per-turn audio buffering and WAV encoding

use std::io::Cursor;
use std::time::Duration;

use interview_core::{AudioFrame, Channels, SampleRate};

use crate::PipelineError;

/// Accumulates the current turn's samples and encodes them for transport
///
/// Contents never span two turns: callers take the encoded clip (which
/// clears the buffer) before the next turn opens.
#[derive(Debug)]
pub struct TurnBuffer {
    samples: Vec<f32>,
    sample_rate: SampleRate,
    max_samples: usize,
}

impl TurnBuffer {
    pub fn new(sample_rate: SampleRate, max_duration: Duration) -> Self {
        let max_samples = (sample_rate.as_u32() as f64 * max_duration.as_secs_f64()) as usize;

        Self {
            samples: Vec::with_capacity(sample_rate.as_u32() as usize),
            sample_rate,
            max_samples,
        }
    }

    /// Append a frame's samples, downmixing stereo input
    ///
    /// Oldest samples are dropped once the buffer exceeds its maximum turn
    /// length, keeping the most recent audio.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<(), PipelineError> {
        if frame.sample_rate != self.sample_rate {
            return Err(PipelineError::Audio(format!(
                "frame rate {} does not match buffer rate {}",
                frame.sample_rate.as_u32(),
                self.sample_rate.as_u32()
            )));
        }

        let frame = if frame.channels == Channels::Stereo {
            frame.to_mono()
        } else {
            frame.clone()
        };

        self.samples.extend(frame.samples.iter());

        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(0..excess);
        }

        Ok(())
    }

    /// True when nothing has been captured this turn
    ///
    /// Checked before transcription so silence is never submitted.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffered duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.as_u32() as f64)
    }

    /// Encode the buffered turn as a 16-bit PCM mono WAV
    pub fn encode_wav(&self) -> Result<Vec<u8>, PipelineError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate.as_u32(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| PipelineError::Audio(e.to_string()))?;

            for &sample in &self.samples {
                let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                writer
                    .write_sample(pcm)
                    .map_err(|e| PipelineError::Audio(e.to_string()))?;
            }

            writer
                .finalize()
                .map_err(|e| PipelineError::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }

    /// Encode and clear in one step, handing the turn off for transcription
    pub fn take_wav(&mut self) -> Result<Vec<u8>, PipelineError> {
        let wav = self.encode_wav()?;
        self.clear();
        Ok(wav)
    }

    /// Drop the buffered turn
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> TurnBuffer {
        TurnBuffer::new(SampleRate::Hz16000, Duration::from_secs(120))
    }

    #[test]
    fn test_push_and_duration() {
        let mut buf = buffer();
        assert!(buf.is_empty());

        let frame = AudioFrame::new(vec![0.1; 320], SampleRate::Hz16000, Channels::Mono, 0);
        buf.push(&frame).unwrap();

        assert!(!buf.is_empty());
        assert_eq!(buf.duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_rate_mismatch_rejected() {
        let mut buf = buffer();
        let frame = AudioFrame::new(vec![0.1; 160], SampleRate::Hz8000, Channels::Mono, 0);
        assert!(matches!(buf.push(&frame), Err(PipelineError::Audio(_))));
    }

    #[test]
    fn test_wav_header_and_length() {
        let mut buf = buffer();
        let frame = AudioFrame::new(vec![0.25; 1600], SampleRate::Hz16000, Channels::Mono, 0);
        buf.push(&frame).unwrap();

        let wav = buf.encode_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + 1600 * 2);
    }

    #[test]
    fn test_take_wav_clears_buffer() {
        let mut buf = buffer();
        let frame = AudioFrame::new(vec![0.1; 320], SampleRate::Hz16000, Channels::Mono, 0);
        buf.push(&frame).unwrap();

        let wav = buf.take_wav().unwrap();
        assert!(!wav.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut buf = TurnBuffer::new(SampleRate::Hz16000, Duration::from_millis(40));

        let older = AudioFrame::new(vec![0.1; 640], SampleRate::Hz16000, Channels::Mono, 0);
        let newer = AudioFrame::new(vec![0.9; 640], SampleRate::Hz16000, Channels::Mono, 1);
        buf.push(&older).unwrap();
        buf.push(&newer).unwrap();

        assert_eq!(buf.duration(), Duration::from_millis(40));
        // Only the newer frame's samples remain
        let wav = buf.encode_wav().unwrap();
        let first = i16::from_le_bytes([wav[44], wav[45]]);
        assert!(first > 20_000);
    }
}
