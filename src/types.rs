use crate::error::{CamillaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Volume or signal level in decibels
pub type Decibels = f32;

/// Returned by [`signal_range_to_db`] for a silent signal
pub const SILENT_RANGE_DB: Decibels = -1000.0;

/// Processing state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingState {
    Running,
    Paused,
    Inactive,
    Starting,
    Stalled,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Running => "Running",
            ProcessingState::Paused => "Paused",
            ProcessingState::Inactive => "Inactive",
            ProcessingState::Starting => "Starting",
            ProcessingState::Stalled => "Stalled",
        }
    }
}

impl FromStr for ProcessingState {
    type Err = CamillaError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Running" => Ok(ProcessingState::Running),
            "Paused" => Ok(ProcessingState::Paused),
            "Inactive" => Ok(ProcessingState::Inactive),
            "Starting" => Ok(ProcessingState::Starting),
            "Stalled" => Ok(ProcessingState::Stalled),
            other => Err(CamillaError::UnknownEnumValue {
                kind: "ProcessingState",
                raw: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the engine last stopped processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    None,
    Done,
    CaptureError,
    PlaybackError,
    CaptureFormatChange,
    PlaybackFormatChange,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::None => "None",
            StopReason::Done => "Done",
            StopReason::CaptureError => "CaptureError",
            StopReason::PlaybackError => "PlaybackError",
            StopReason::CaptureFormatChange => "CaptureFormatChange",
            StopReason::PlaybackFormatChange => "PlaybackFormatChange",
        }
    }
}

impl FromStr for StopReason {
    type Err = CamillaError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "None" => Ok(StopReason::None),
            "Done" => Ok(StopReason::Done),
            "CaptureError" => Ok(StopReason::CaptureError),
            "PlaybackError" => Ok(StopReason::PlaybackError),
            "CaptureFormatChange" => Ok(StopReason::CaptureFormatChange),
            "PlaybackFormatChange" => Ok(StopReason::PlaybackFormatChange),
            other => Err(CamillaError::UnknownEnumValue {
                kind: "StopReason",
                raw: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StandardRate {
    Rate8000 = 8000,
    Rate11025 = 11025,
    Rate16000 = 16000,
    Rate22050 = 22050,
    Rate32000 = 32000,
    Rate44100 = 44100,
    Rate48000 = 48000,
    Rate88200 = 88200,
    Rate96000 = 96000,
    Rate176400 = 176400,
    Rate192000 = 192000,
    Rate352800 = 352800,
    Rate384000 = 384000,
    Rate705600 = 705600,
    Rate768000 = 768000,
}

impl StandardRate {
    /// All standard rates, ascending
    pub const ALL: [StandardRate; 15] = [
        StandardRate::Rate8000,
        StandardRate::Rate11025,
        StandardRate::Rate16000,
        StandardRate::Rate22050,
        StandardRate::Rate32000,
        StandardRate::Rate44100,
        StandardRate::Rate48000,
        StandardRate::Rate88200,
        StandardRate::Rate96000,
        StandardRate::Rate176400,
        StandardRate::Rate192000,
        StandardRate::Rate352800,
        StandardRate::Rate384000,
        StandardRate::Rate705600,
        StandardRate::Rate768000,
    ];

    pub fn hz(self) -> u32 {
        self as u32
    }

    /// Classify a measured rate
    ///
    /// Returns the first standard rate, in ascending order, that lies strictly
    /// within ±4% of `raw`. Rates outside `10584 < raw < 798720` are rejected
    /// before the search.
    pub fn nearest(raw: u32) -> Result<StandardRate> {
        if !(10584 < raw && raw < 798720) {
            return Err(CamillaError::RateOutOfRange(raw));
        }

        // 0.96 * raw < rate < 1.04 * raw, scaled by 100 to stay exact
        let measured = u64::from(raw);
        StandardRate::ALL
            .into_iter()
            .find(|rate| {
                let scaled = u64::from(rate.hz()) * 100;
                96 * measured < scaled && scaled < 104 * measured
            })
            .ok_or(CamillaError::NoStandardRateMatch(raw))
    }
}

impl fmt::Display for StandardRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Convert a signal range (peak to peak, full scale 2.0) to dB
///
/// A range of zero or less maps to [`SILENT_RANGE_DB`].
pub fn signal_range_to_db(range: f32) -> Decibels {
    if range > 0.0 {
        20.0 * (range / 2.0).log10()
    } else {
        SILENT_RANGE_DB
    }
}

/// Semantic version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of this library
    pub const fn library() -> Self {
        Self::new(
            parse_decimal(env!("CARGO_PKG_VERSION_MAJOR")),
            parse_decimal(env!("CARGO_PKG_VERSION_MINOR")),
            parse_decimal(env!("CARGO_PKG_VERSION_PATCH")),
        )
    }
}

const fn parse_decimal(text: &str) -> u32 {
    let bytes = text.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

impl FromStr for Version {
    type Err = CamillaError;

    /// Parse `major.minor.patch`; a pre-release or build suffix on the patch is ignored
    fn from_str(value: &str) -> Result<Self> {
        let invalid = || CamillaError::decode("GetVersion", format!("{:?} is not a version", value));

        let mut parts = value.trim().splitn(3, '.');
        let mut component = |digits_only: bool| -> Result<u32> {
            let part = parts.next().ok_or_else(invalid)?;
            let part = if digits_only {
                part
            } else {
                let end = part
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(part.len());
                &part[..end]
            };
            part.parse().map_err(|_| invalid())
        };

        Ok(Version::new(component(true)?, component(true)?, component(false)?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Device types the engine was built with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedDeviceTypes {
    pub playback: Vec<String>,
    pub capture: Vec<String>,
}
