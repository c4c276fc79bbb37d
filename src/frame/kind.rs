//! Frame classification by header byte.

/// Header of frames carrying telemetry records.
pub const TELEMETRY_HEADER: u8 = 0x01;

/// Header of keepalive frames that only need an acknowledgement.
pub const KEEPALIVE_HEADER: u8 = 0x15;

/// What a frame carries, decided from its header byte alone.
///
/// Every kind is acknowledged; only [`FrameKind::Telemetry`] is decoded.
///
/// # Examples
///
/// ```
/// use galileo::frame::FrameKind;
///
/// assert_eq!(FrameKind::classify(0x01), FrameKind::Telemetry);
/// assert_eq!(FrameKind::classify(0x15), FrameKind::Ignorable);
/// assert_eq!(FrameKind::classify(0x08), FrameKind::Extension(0x08));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Main or archive packet carrying records.
    Telemetry,
    /// Device keepalive.
    Ignorable,
    /// Any other frame type, passed through unparsed.
    Extension(u8),
}

impl FrameKind {
    /// Classify a header byte.
    #[must_use]
    pub const fn classify(header: u8) -> Self {
        match header {
            TELEMETRY_HEADER => Self::Telemetry,
            KEEPALIVE_HEADER => Self::Ignorable,
            other => Self::Extension(other),
        }
    }

    /// Kind name as a static string for metrics and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Ignorable => "keepalive",
            Self::Extension(_) => "extension",
        }
    }
}
