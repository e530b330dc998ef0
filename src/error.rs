//! Error types.

/// Errors surfaced by the crate.
///
/// Synthesis itself cannot fail: out-of-range parameters are clamped and
/// re-entrant requests are ignored. Errors only come from encoding or
/// writing files and from parsing recipe strings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "wav")]
    #[error("Failed to encode wav data: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid recipe string: {reason}")]
    Recipe { reason: String },
}

impl Error {
    pub(crate) fn recipe(reason: impl Into<String>) -> Self {
        Error::Recipe {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
