//! Error types for the meeting client

use thiserror::Error;

use crate::types::SessionState;

/// Result type for meeting client operations
pub type MeetingResult<T> = Result<T, MeetingError>;

/// Errors that can occur while driving a meeting session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MeetingError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was wrong
        message: String,
    },

    /// The access token was never replaced with a real credential
    #[error("Access token is still the placeholder value; update it before starting")]
    PlaceholderCredential,

    /// Destination rejected before any SDK call
    #[error("Invalid destination: {reason}")]
    InvalidDestination {
        /// Why it was rejected
        reason: String,
    },

    /// Device registration failed
    #[error("Device registration failed: {reason}")]
    Registration {
        /// SDK failure text
        reason: String,
    },

    /// A session operation was attempted without a registered device
    #[error("Device is not registered")]
    NotRegistered,

    /// A second session was requested while one is live
    #[error("A session is already active for {destination}")]
    SessionActive {
        /// Destination of the live session
        destination: String,
    },

    /// No live session to act on
    #[error("No active session")]
    NoActiveSession,

    /// Meeting creation failed
    #[error("Failed to create meeting for {destination}: {reason}")]
    MeetingCreation {
        /// Requested destination
        destination: String,
        /// SDK failure text
        reason: String,
    },

    /// Local media could not be acquired
    #[error("Failed to acquire {device}: {reason}")]
    MediaAcquisition {
        /// Device that could not be opened
        device: String,
        /// SDK failure text
        reason: String,
    },

    /// The join call failed
    #[error("Failed to join meeting: {reason}")]
    Join {
        /// SDK failure text
        reason: String,
    },

    /// The leave call failed
    #[error("Failed to leave meeting: {reason}")]
    Leave {
        /// SDK failure text
        reason: String,
    },

    /// Session state machine rejected a transition
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Invalid state error
    #[error("Invalid state: {message}")]
    InvalidState {
        /// What was wrong
        message: String,
    },

    /// Error reported by the conferencing SDK outside of a specific operation
    #[error("SDK error: {message}")]
    Sdk {
        /// SDK failure text
        message: String,
    },
}

impl MeetingError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid destination error
    pub fn invalid_destination(reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            reason: reason.into(),
        }
    }

    /// Create a registration error
    pub fn registration(reason: impl Into<String>) -> Self {
        Self::Registration {
            reason: reason.into(),
        }
    }

    /// Create a media acquisition error
    pub fn media_acquisition(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MediaAcquisition {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a join error
    pub fn join(reason: impl Into<String>) -> Self {
        Self::Join {
            reason: reason.into(),
        }
    }

    /// Create a leave error
    pub fn leave(reason: impl Into<String>) -> Self {
        Self::Leave {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an SDK error
    pub fn sdk(message: impl Into<String>) -> Self {
        Self::Sdk {
            message: message.into(),
        }
    }

    /// Whether the process stays usable after this error.
    ///
    /// Configuration and registration failures halt session operations for the
    /// lifetime of the process; everything else only fails the current attempt.
    pub fn is_per_attempt(&self) -> bool {
        !matches!(
            self,
            Self::Configuration { .. }
                | Self::PlaceholderCredential
                | Self::Registration { .. }
                | Self::NotRegistered
        )
    }

    /// Short, operator-facing rendering of the error
    pub fn user_message(&self) -> String {
        match self {
            Self::PlaceholderCredential => {
                "Make sure to update your access token before starting".to_string()
            }
            Self::NotRegistered => {
                "This device is not registered; restart with a valid access token".to_string()
            }
            Self::MediaAcquisition { device, .. } => {
                format!("Could not access the {device}; check device permissions")
            }
            other => other.to_string(),
        }
    }
}
