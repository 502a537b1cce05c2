//! Boundary to the external conferencing SDK
//!
//! The client never talks to the network itself. Everything it needs from the
//! vendor SDK is expressed by two traits:
//!
//! - [`ConferencingService`] - the initialised SDK client: device registration,
//!   meeting creation and the per-device stream helpers
//! - [`Meeting`] - one meeting object: join/leave, media helpers and the
//!   `on`/`off` event listener registry
//!
//! Errors returned across this boundary are plain [`SdkFailure`] values; the
//! caller decides which [`MeetingError`](crate::MeetingError) they map to.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::types::{
    CameraConstraints, Destination, JoinConfiguration, MediaStreamDescriptor,
    MicrophoneConstraints, StreamHandle,
};

/// Failure reported by the SDK for a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkFailure {
    /// SDK error name (e.g. `NotAllowedError`)
    pub name: String,
    /// Human readable message
    pub message: String,
}

impl SdkFailure {
    /// Create a failure with a name and message
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SdkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for SdkFailure {}

/// Result of an SDK call
pub type SdkResult<T> = Result<T, SdkFailure>;

/// Credentials and settings handed to the SDK at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkSettings {
    /// Bearer access token
    pub access_token: String,
    /// SDK internal logger level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

/// Names of the meeting events the client listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeetingEventKind {
    /// `error`
    Error,
    /// `media:ready`
    MediaReady,
    /// `media:stopped`
    MediaStopped,
}

impl MeetingEventKind {
    /// Event name as used by the SDK
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::MediaReady => "media:ready",
            Self::MediaStopped => "media:stopped",
        }
    }
}

impl fmt::Display for MeetingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payloads delivered to meeting listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingEvent {
    /// Asynchronous runtime error inside the SDK
    Error(SdkFailure),
    /// A stream became available; the SDK may send an empty payload
    MediaReady(Option<MediaStreamDescriptor>),
    /// A stream stopped; the SDK may send an empty payload
    MediaStopped(Option<MediaStreamDescriptor>),
}

impl MeetingEvent {
    /// Kind used to select listeners
    pub fn kind(&self) -> MeetingEventKind {
        match self {
            Self::Error(_) => MeetingEventKind::Error,
            Self::MediaReady(_) => MeetingEventKind::MediaReady,
            Self::MediaStopped(_) => MeetingEventKind::MediaStopped,
        }
    }
}

/// Listener callback registered with [`Meeting::on`]
pub type MeetingEventCallback = Arc<dyn Fn(&MeetingEvent) + Send + Sync>;

/// Token returned by [`Meeting::on`], used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Local streams returned by [`Meeting::get_media_streams`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaStreamPair {
    /// Combined camera + microphone stream, if any was requested
    pub local_stream: Option<StreamHandle>,
    /// Screen share stream, if one was requested
    pub local_share: Option<StreamHandle>,
}

/// Payload of [`Meeting::add_media`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMediaRequest {
    /// Combined camera + microphone stream
    pub local_stream: Option<StreamHandle>,
    /// Screen share stream
    pub local_share: Option<StreamHandle>,
    /// Media directions of the join
    pub settings: JoinConfiguration,
}

/// Payload of [`Meeting::join_with_media`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinWithMediaRequest {
    /// Microphone stream, if audio is sent
    pub microphone: Option<StreamHandle>,
    /// Camera stream, if video is sent
    pub camera: Option<StreamHandle>,
    /// Media directions of the join
    pub settings: JoinConfiguration,
}

/// One meeting object created by the SDK
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Meeting: Send + Sync {
    /// SDK-assigned meeting id
    fn id(&self) -> String;

    /// Join without media
    async fn join(&self, settings: JoinConfiguration) -> SdkResult<()>;

    /// Join and publish the given local streams in one call
    async fn join_with_media(&self, request: JoinWithMediaRequest) -> SdkResult<()>;

    /// Leave the meeting
    async fn leave(&self) -> SdkResult<()>;

    /// Acquire the local stream/share pair in one request
    async fn get_media_streams(&self, settings: JoinConfiguration) -> SdkResult<MediaStreamPair>;

    /// Publish previously acquired local streams on a joined meeting
    async fn add_media(&self, request: AddMediaRequest) -> SdkResult<()>;

    /// Register a listener; the callback runs on the SDK's event thread
    fn on(&self, kind: MeetingEventKind, callback: MeetingEventCallback) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn off(&self, listener: ListenerId) -> bool;
}

/// The initialised SDK client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConferencingService: Send + Sync {
    /// Register this device with the meetings service
    async fn register(&self) -> SdkResult<()>;

    /// Remove the device registration
    async fn unregister(&self) -> SdkResult<()>;

    /// Create a meeting object for a destination
    async fn create_meeting(&self, destination: &Destination) -> SdkResult<Arc<dyn Meeting>>;

    /// Open a microphone stream
    async fn create_microphone_stream(
        &self,
        constraints: MicrophoneConstraints,
    ) -> SdkResult<StreamHandle>;

    /// Open a camera stream
    async fn create_camera_stream(&self, constraints: CameraConstraints) -> SdkResult<StreamHandle>;
}
