//! Samples and the shared PCM pool they point into.

use std::sync::Arc;

use crate::ids::SampleId;

/// Maximum length of an entity name in bytes.
pub const MAX_NAME_LEN: usize = 20;

/// Immutable PCM frames shared by reference.
///
/// A loaded file keeps one pool for all samples; each sample addresses a
/// window of it. Copies of a sample (duplication, snapshots) clone the
/// `Arc`, never the frames.
#[derive(Debug, Clone)]
pub struct SampleData {
    pool: Arc<[i16]>,
    /// Low bytes of 24-bit samples, same indexing as `pool`.
    extra: Option<Arc<[u8]>>,
    offset: usize,
    len: usize,
}

impl SampleData {
    /// Standalone 16-bit data.
    pub fn from_pcm(frames: Vec<i16>) -> Self {
        let len = frames.len();
        Self {
            pool: frames.into(),
            extra: None,
            offset: 0,
            len,
        }
    }

    /// Standalone 24-bit data split into high words and low bytes.
    ///
    /// Returns `None` when the two halves differ in length.
    pub fn from_pcm24(frames: Vec<i16>, low: Vec<u8>) -> Option<Self> {
        if frames.len() != low.len() {
            return None;
        }
        let len = frames.len();
        Some(Self {
            pool: frames.into(),
            extra: Some(low.into()),
            offset: 0,
            len,
        })
    }

    /// Window into a shared pool. Returns `None` if it does not fit.
    pub fn window(
        pool: Arc<[i16]>,
        extra: Option<Arc<[u8]>>,
        offset: usize,
        len: usize,
    ) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > pool.len() {
            return None;
        }
        let extra = extra.filter(|e| e.len() >= end);
        Some(Self {
            pool,
            extra,
            offset,
            len,
        })
    }

    pub fn frames(&self) -> &[i16] {
        &self.pool[self.offset..self.offset + self.len]
    }

    /// 24-bit low bytes, when present.
    pub fn low_bytes(&self) -> Option<&[u8]> {
        self.extra
            .as_deref()
            .map(|e| &e[self.offset..self.offset + self.len])
    }

    /// Frames as 24-bit values.
    pub fn frames_24(&self) -> Vec<i32> {
        match self.low_bytes() {
            Some(low) => self
                .frames()
                .iter()
                .zip(low)
                .map(|(&hi, &lo)| (i32::from(hi) << 8) | i32::from(lo))
                .collect(),
            None => self.frames().iter().map(|&s| i32::from(s) << 8).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether two windows share the same underlying pool.
    pub fn shares_pool(&self, other: &SampleData) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }
}

impl Default for SampleData {
    fn default() -> Self {
        Self::from_pcm(Vec::new())
    }
}

/// Content equality. Missing low bytes compare equal to zero low bytes.
impl PartialEq for SampleData {
    fn eq(&self, other: &Self) -> bool {
        let low_eq = match (self.low_bytes(), other.low_bytes()) {
            (Some(a), Some(b)) => a == b,
            (Some(low), None) | (None, Some(low)) => low.iter().all(|&b| b == 0),
            (None, None) => true,
        };
        self.frames() == other.frames() && low_eq
    }
}

/// Stereo role of a sample.
///
/// The id is the partner sample. Links are always symmetric: the partner of
/// a `Left` sample is `Right` and points back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleLink {
    #[default]
    Mono,
    Left(SampleId),
    Right(SampleId),
    Linked(SampleId),
}

impl SampleLink {
    pub fn partner(self) -> Option<SampleId> {
        match self {
            Self::Mono => None,
            Self::Left(id) | Self::Right(id) | Self::Linked(id) => Some(id),
        }
    }

    /// Same role, pointing at another partner.
    pub fn with_partner(self, partner: SampleId) -> SampleLink {
        match self {
            Self::Mono => Self::Mono,
            Self::Left(_) => Self::Left(partner),
            Self::Right(_) => Self::Right(partner),
            Self::Linked(_) => Self::Linked(partner),
        }
    }

    /// Link the partner must carry to point back at `me`.
    pub fn mirrored(self, me: SampleId) -> SampleLink {
        match self {
            Self::Mono => Self::Mono,
            Self::Left(_) => Self::Right(me),
            Self::Right(_) => Self::Left(me),
            Self::Linked(_) => Self::Linked(me),
        }
    }
}

/// A sample as stored in the font.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub data: SampleData,
    pub sample_rate: u32,
    /// MIDI key of the recorded pitch, 255 for unpitched material.
    pub original_pitch: u8,
    /// Correction in cents applied on playback.
    pub pitch_correction: i8,
    /// Loop bounds in frames, relative to the sample start.
    pub loop_start: u32,
    pub loop_end: u32,
    /// Stored in ROM rather than in the file.
    pub rom: bool,
    pub(crate) link: SampleLink,
}

impl Sample {
    pub fn new(name: impl Into<String>, data: SampleData, sample_rate: u32) -> Self {
        let len = data.len() as u32;
        Self {
            name: name.into(),
            data,
            sample_rate,
            original_pitch: 60,
            pitch_correction: 0,
            loop_start: 0,
            loop_end: len,
            rom: false,
            link: SampleLink::Mono,
        }
    }

    pub fn with_pitch(mut self, original_pitch: u8, pitch_correction: i8) -> Self {
        self.original_pitch = original_pitch;
        self.pitch_correction = pitch_correction;
        self
    }

    pub fn with_loop(mut self, start: u32, end: u32) -> Self {
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    /// Stereo link; changed only through [`crate::SoundFont::set_link`].
    pub fn link(&self) -> SampleLink {
        self.link
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    pub(crate) fn loop_fits(&self, start: u32, end: u32) -> bool {
        start <= end && end as usize <= self.len()
    }
}

/// Sample parameters that are mirrored onto a stereo partner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleParam {
    SampleRate(u32),
    OriginalPitch(u8),
    PitchCorrection(i8),
    Loop { start: u32, end: u32 },
}

/// Truncate `name` to [`MAX_NAME_LEN`] bytes on a character boundary.
pub fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
