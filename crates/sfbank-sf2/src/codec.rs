//! External sample codec used by the compressed variant.

use std::error::Error;

/// Error returned by a [`SampleCodec`].
pub type CodecError = Box<dyn Error + Send + Sync>;

/// Audio codec that turns mono 16-bit frames into an opaque payload.
///
/// The codec owns the payload format entirely; the container only stores
/// its length and bytes.
pub trait SampleCodec: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Compress one sample. `quality` is in `0.0..=1.0`.
    fn encode(&self, frames: &[i16], sample_rate: u32, quality: f32) -> Result<Vec<u8>, CodecError>;

    /// Decompress a payload produced by [`SampleCodec::encode`].
    fn decode(&self, payload: &[u8]) -> Result<Vec<i16>, CodecError>;
}

/// What to do when the codec fails on a sample during compressed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecFailurePolicy {
    /// Fail the whole save; nothing is written.
    #[default]
    Abort,
    /// Store the failed samples as plain PCM and list them in the report.
    KeepPcm,
}
