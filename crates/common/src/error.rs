//! Error taxonomy shared across ScreenReel crates.

/// Top-level error type for recorder operations.
///
/// Configuration and validation failures are returned synchronously from
/// `start()`; failures discovered while a recording is running are delivered
/// once through the session's error channel. The type is `Clone` so a single
/// terminal error can be both stored on the session and broadcast.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecorderError {
    #[error("recorder already started; each instance can only record once")]
    AlreadyStarted,

    #[error("recorder has not been started")]
    NotStarted,

    #[error("no capture target provided")]
    NoTargetProvided,

    #[error("capture target with id {0} not found")]
    TargetNotFound(String),

    #[error(
        "unsupported file extension .{extension}: {}",
        if *audio_only {
            "only .m4a is supported for audio recordings"
        } else {
            "only .mp4, .mov and .m4v are supported for video recordings"
        }
    )]
    UnsupportedFileExtension { extension: String, audio_only: bool },

    #[error("invalid file extension: .{extension} cannot carry {codec}")]
    InvalidCodecForExtension { extension: String, codec: String },

    #[error("microphone with id {0} not found")]
    MicrophoneNotFound(String),

    #[error("at least one display must be connected")]
    NoDisplaysConnected,

    #[error("missing screen capture permissions")]
    NoPermissions,

    #[error("unsupported video codec: {0}")]
    UnsupportedCodec(String),

    #[error("could not add {0} input to the container writer")]
    CouldNotAddInput(String),

    #[error(
        "could not start the capture stream{}",
        cause.as_ref().map(|c| format!(": {c}")).unwrap_or_default()
    )]
    CouldNotStartStream { cause: Option<Box<RecorderError>> },

    #[error("unknown recorder error: {0}")]
    Unknown(String),
}

/// Result type alias using RecorderError.
pub type RecorderResult<T> = Result<T, RecorderError>;

impl RecorderError {
    /// Wrap a failure that prevented the capture stream from starting.
    ///
    /// Errors that are already part of the taxonomy are carried as the
    /// cause; anything else degrades to `Unknown` first.
    pub fn could_not_start(cause: impl Into<Option<RecorderError>>) -> Self {
        Self::CouldNotStartStream {
            cause: cause.into().map(Box::new),
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether this error is detected during start() validation, before the
    /// session ever reaches the running state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AlreadyStarted
                | Self::NotStarted
                | Self::NoTargetProvided
                | Self::UnsupportedFileExtension { .. }
                | Self::InvalidCodecForExtension { .. }
                | Self::UnsupportedCodec(_)
        )
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        Self::Unknown(err.to_string())
    }
}

impl From<anyhow::Error> for RecorderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Unknown(format!("{err:#}"))
    }
}
