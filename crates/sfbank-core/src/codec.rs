//! WAV sample codec for compressed banks.
//!
//! Stores each sample as a complete mono 16-bit WAV file. The payload is
//! lossless, so the quality setting has no effect. Banks compressed by
//! other tools usually carry Ogg Vorbis payloads, which this codec
//! rejects with a per-sample codec error.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use sfbank_sf2::{CodecError, SampleCodec};

#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl SampleCodec for WavCodec {
    fn name(&self) -> &str {
        "wav"
    }

    fn encode(&self, frames: &[i16], sample_rate: u32, _quality: f32) -> Result<Vec<u8>, CodecError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut payload = Vec::with_capacity(44 + frames.len() * 2);
        {
            let mut writer = WavWriter::new(Cursor::new(&mut payload), spec)?;
            for &frame in frames {
                writer.write_sample(frame)?;
            }
            writer.finalize()?;
        }
        Ok(payload)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<i16>, CodecError> {
        let reader = WavReader::new(Cursor::new(payload))?;
        let spec = reader.spec();
        if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(format!(
                "expected mono 16-bit PCM, got {} channel(s) at {} bits",
                spec.channels, spec.bits_per_sample
            )
            .into());
        }
        let frames = reader.into_samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        Ok(frames)
    }
}
