//! WAV sample files, through `hound`.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::warn;
use sfbank_model::{IoKind, Sample, SampleData};

use crate::error::{Result, SfzError};

/// Channels of a decoded WAV file.
#[derive(Debug, Clone)]
pub struct WavSamples {
    pub sample_rate: u32,
    /// One entry for mono files, left then right for stereo files.
    pub channels: Vec<SampleData>,
}

fn wav_error(path: &Path, err: hound::Error, during: IoKind) -> SfzError {
    match err {
        hound::Error::IoError(e) => SfzError::io(path, &e, during),
        other => SfzError::Wav {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Scale an integer sample of `bits` bits to 24 bits.
fn to_24_bits(value: i32, bits: u16) -> i32 {
    if bits <= 24 {
        value << (24 - bits)
    } else {
        value >> (bits - 24)
    }
}

/// Read a WAV file.
///
/// Integer data up to 16 bits is kept as 16-bit frames; deeper integer and
/// float data keeps 24 bits, split into high words and low bytes. Files with
/// more than two channels keep the first two.
pub fn read_wav(path: &Path) -> Result<WavSamples> {
    let mut reader = WavReader::open(path).map_err(|e| wav_error(path, e, IoKind::Read))?;
    let spec = reader.spec();
    let channel_count = usize::from(spec.channels);
    if channel_count == 0 {
        return Err(SfzError::Wav {
            path: path.to_path_buf(),
            reason: "no channels".to_string(),
        });
    }

    let values: Vec<i32> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| to_24_bits(v, spec.bits_per_sample)))
            .collect::<std::result::Result<_, _>>(),
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (f64::from(v).clamp(-1.0, 1.0) * 8_388_607.0).round() as i32))
            .collect::<std::result::Result<_, _>>(),
    }
    .map_err(|e| wav_error(path, e, IoKind::Read))?;

    if channel_count > 2 {
        warn!(
            "{} has {} channels, keeping the first two",
            path.display(),
            channel_count
        );
    }
    let deep = spec.sample_format == SampleFormat::Float || spec.bits_per_sample > 16;
    let channels = (0..channel_count.min(2))
        .map(|channel| {
            let frames: Vec<i32> = values
                .iter()
                .skip(channel)
                .step_by(channel_count)
                .copied()
                .collect();
            split_24(frames, deep)
        })
        .collect();

    Ok(WavSamples {
        sample_rate: spec.sample_rate,
        channels,
    })
}

fn split_24(frames: Vec<i32>, keep_low: bool) -> SampleData {
    let high: Vec<i16> = frames.iter().map(|&v| (v >> 8) as i16).collect();
    if !keep_low {
        return SampleData::from_pcm(high);
    }
    let low: Vec<u8> = frames.iter().map(|&v| (v & 0xff) as u8).collect();
    SampleData::from_pcm24(high, low).unwrap_or_default()
}

/// Write one sample as a mono WAV file, 24-bit when it carries low bytes.
pub fn write_wav(path: &Path, sample: &Sample) -> Result<()> {
    let deep = sample.data.low_bytes().is_some();
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample.sample_rate,
        bits_per_sample: if deep { 24 } else { 16 },
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_error(path, e, IoKind::Create))?;
    if deep {
        for value in sample.data.frames_24() {
            writer
                .write_sample(value)
                .map_err(|e| wav_error(path, e, IoKind::Write))?;
        }
    } else {
        for &frame in sample.data.frames() {
            writer
                .write_sample(frame)
                .map_err(|e| wav_error(path, e, IoKind::Write))?;
        }
    }
    writer.finalize().map_err(|e| wav_error(path, e, IoKind::Write))
}
