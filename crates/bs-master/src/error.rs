//! Session error type.

use bs_audio::AudioError;

/// Error type for session operations.
#[derive(Debug)]
pub enum SessionError {
    /// Reading a file failed
    Io(std::io::Error),
    /// Settings JSON did not parse
    Settings(serde_json::Error),
    /// Audio or MIDI output failed
    Audio(AudioError),
    /// The file holds no words to play
    EmptySource,
    /// The driver thread is gone
    DriverGone,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "I/O error: {}", e),
            SessionError::Settings(e) => write!(f, "Settings error: {}", e),
            SessionError::Audio(e) => write!(f, "{}", e),
            SessionError::EmptySource => write!(f, "Source is empty"),
            SessionError::DriverGone => write!(f, "Playback driver stopped"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            SessionError::Settings(e) => Some(e),
            SessionError::Audio(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Settings(e)
    }
}

impl From<AudioError> for SessionError {
    fn from(e: AudioError) -> Self {
        SessionError::Audio(e)
    }
}
