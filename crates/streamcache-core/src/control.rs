//! Source control protocol.
//!
//! Control operations are source-specific commands (seek to a time, query the
//! duration, switch angle...) that only the filler's live source handle can
//! perform. The cache relays them through a single-slot channel.

use thiserror::Error;

/// Which language table a [`ControlCmd::GetLang`] query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LangKind {
    Audio,
    Subtitle,
}

/// A control command: code plus typed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCmd {
    /// Total duration in seconds.
    GetTimeLength,
    /// Current playback time in seconds.
    GetCurrentTime,
    /// Timestamp of the first frame in seconds.
    GetStartTime,
    GetAspectRatio,
    /// Start time in seconds of the chapter at the given time.
    GetChapterTime(f64),
    GetNumTitles,
    GetNumChapters,
    GetCurrentTitle,
    GetCurrentChapter,
    GetNumAngles,
    GetAngle,
    /// Total size of the source in bytes.
    GetSize,
    /// Language tag of the given track id.
    GetLang { kind: LangKind, id: i32 },
    /// Whether the source drives its own timeline.
    ManagesTimeline,

    SeekToTime(f64),
    SeekToChapter(u32),
    SetAngle(u32),

    /// Ask the filler to exit its loop.
    Quit,
}

impl ControlCmd {
    /// Commands that move the source's byte position when they succeed.
    pub fn changes_position(&self) -> bool {
        matches!(
            self,
            ControlCmd::SeekToTime(_) | ControlCmd::SeekToChapter(_) | ControlCmd::SetAngle(_)
        )
    }

    /// Queries the filler answers from its periodically refreshed cache
    /// rather than a round-trip to the source.
    pub fn is_cached_query(&self) -> bool {
        matches!(
            self,
            ControlCmd::GetTimeLength | ControlCmd::GetCurrentTime | ControlCmd::GetStartTime
        )
    }
}

/// Typed result payload of a successful control command.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    None,
    Double(f64),
    Uint(u64),
    Bool(bool),
    Lang(String),
}

impl ControlValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ControlValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ControlValue::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

/// Failure of a control command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    #[error("control not supported")]
    Unsupported,

    #[error("control failed")]
    Failed,
}

/// Result of a control command.
pub type ControlResult = std::result::Result<ControlValue, ControlError>;
