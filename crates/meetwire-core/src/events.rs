//! Operator-facing event stream
//!
//! Everything the operator should see (registration results, state changes,
//! surface updates, failures) is published as a [`SessionEvent`] on a
//! broadcast channel. Subscribers that lag simply miss events.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::types::{Destination, MediaCategory, SessionId, SessionState, SurfaceName};

/// Stage of a session attempt that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Input validation before any SDK call
    Validation,
    /// `create_meeting`
    MeetingCreation,
    /// Local capture
    MediaAcquisition,
    /// The join call
    Join,
    /// The leave call
    Leave,
}

impl FailureStage {
    /// Lower-case name shown to the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Validation => "validation",
            FailureStage::MeetingCreation => "meeting creation",
            FailureStage::MediaAcquisition => "media acquisition",
            FailureStage::Join => "join",
            FailureStage::Leave => "leave",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the meeting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Device registration succeeded
    Registered,

    /// Device registration failed; no session operations will be attempted
    RegistrationFailed {
        /// Error reason
        reason: String,
    },

    /// Device registration removed at shutdown
    Deregistered,

    /// A meeting object was created for a destination
    SessionCreated {
        /// Session id
        session_id: SessionId,
        /// Where the meeting points to
        destination: Destination,
    },

    /// Session state changed
    StateChanged {
        /// Session id
        session_id: SessionId,
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },

    /// A stream was bound to a surface
    SurfaceAttached {
        /// Stream category
        category: MediaCategory,
        /// Surface that now renders it
        surface: SurfaceName,
    },

    /// A surface was cleared
    SurfaceDetached {
        /// Stream category
        category: MediaCategory,
        /// Surface that was cleared
        surface: SurfaceName,
    },

    /// A session attempt failed
    SessionFailed {
        /// Session id, if a meeting had been created
        session_id: Option<SessionId>,
        /// Failing stage
        stage: FailureStage,
        /// Error message
        message: String,
    },

    /// The SDK reported an asynchronous error
    SdkError {
        /// Session id
        session_id: SessionId,
        /// Error message
        message: String,
    },

    /// The user left the session
    SessionEnded {
        /// Session id
        session_id: SessionId,
    },

    /// Informational notice for the operator
    Notice {
        /// Message text
        message: String,
    },
}

/// Event stream type
pub type EventStream = BroadcastStream<SessionEvent>;

/// Event emitter for the meeting client
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe as a stream
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Subscribe with a plain receiver
    pub fn receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
