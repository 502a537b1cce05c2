//! Core data types shared by the meeting client
//!
//! - **Session identity** - [`SessionId`], [`Destination`], [`SessionState`]
//! - **Media** - [`MediaCategory`], [`StreamHandle`], [`MediaStreamDescriptor`]
//! - **Join settings** - [`JoinConfiguration`] and the per-device constraints
//!   used by the device-stream join path

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MeetingError, MeetingResult};

/// Unique identifier for a meeting session attempt
pub type SessionId = Uuid;

/// A validated meeting destination (email address, SIP URI, meeting number, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Destination(String);

impl Destination {
    /// Parse a destination as typed by the user. Surrounding whitespace is
    /// dropped; an empty result is rejected.
    pub fn parse(raw: &str) -> MeetingResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MeetingError::invalid_destination("destination must not be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(MeetingError::invalid_destination(format!(
                "destination '{trimmed}' must not contain whitespace"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The destination as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Destination {
    type Error = MeetingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.0
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Meeting object exists, nothing acquired yet
    Created,
    /// Local capture has been requested
    MediaAcquiring,
    /// Join request in flight
    Joining,
    /// Session is live
    Joined,
    /// Attempt failed; terminal
    Failed,
    /// Session was left by the user; terminal
    Left,
}

impl SessionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Left)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Created, MediaAcquiring) => true,
            (MediaAcquiring, Joining) => true,
            (Joining, Joined) => true,
            (Joined, Left) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Lowercase name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::MediaAcquiring => "media_acquiring",
            Self::Joining => "joining",
            Self::Joined => "joined",
            Self::Failed => "failed",
            Self::Left => "left",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a directional media flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaCategory {
    /// Outbound camera video (rendered as self preview)
    LocalCamera,
    /// Outbound microphone audio
    LocalMicrophone,
    /// Outbound screen share
    LocalShare,
    /// Inbound video
    RemoteVideo,
    /// Inbound audio
    RemoteAudio,
    /// Inbound screen share
    RemoteShare,
}

impl MediaCategory {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalCamera => "local-camera",
            Self::LocalMicrophone => "local-microphone",
            Self::LocalShare => "local-share",
            Self::RemoteVideo => "remote-video",
            Self::RemoteAudio => "remote-audio",
            Self::RemoteShare => "remote-share",
        }
    }

    /// Surface that renders this category, if any.
    ///
    /// Local microphone audio is never played back locally and share streams
    /// have no surface in this client.
    pub fn surface(&self) -> Option<SurfaceName> {
        match self {
            Self::LocalCamera => Some(SurfaceName::SelfView),
            Self::RemoteVideo => Some(SurfaceName::RemoteVideoView),
            Self::RemoteAudio => Some(SurfaceName::RemoteAudioView),
            Self::LocalMicrophone | Self::LocalShare | Self::RemoteShare => None,
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable names of the rendering surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SurfaceName {
    /// Local camera preview
    SelfView,
    /// Remote participant video
    RemoteVideoView,
    /// Remote participant audio
    RemoteAudioView,
}

impl SurfaceName {
    /// All surfaces, in page order
    pub const ALL: [SurfaceName; 3] = [
        SurfaceName::SelfView,
        SurfaceName::RemoteVideoView,
        SurfaceName::RemoteAudioView,
    ];

    /// Element id of the surface
    pub fn id(&self) -> &'static str {
        match self {
            Self::SelfView => "self-view",
            Self::RemoteVideoView => "remote-view-video",
            Self::RemoteAudioView => "remote-view-audio",
        }
    }
}

impl fmt::Display for SurfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Opaque handle to a media stream owned by the conferencing SDK
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    id: Uuid,
    label: String,
}

impl StreamHandle {
    /// Create a new handle with a fresh id
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }

    /// Unique id of the underlying stream
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Track label as reported by the SDK
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// One directional media flow reported by the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStreamDescriptor {
    /// What the stream carries
    pub category: MediaCategory,
    /// SDK stream handle
    pub handle: StreamHandle,
    /// False once the SDK has stopped the stream
    pub live: bool,
}

impl MediaStreamDescriptor {
    /// Describe a live stream
    pub fn live(category: MediaCategory, handle: StreamHandle) -> Self {
        Self {
            category,
            handle,
            live: true,
        }
    }

    /// Same stream, marked as stopped
    pub fn stopped(mut self) -> Self {
        self.live = false;
        self
    }
}

/// Which join path the coordinator uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinStrategyKind {
    /// One combined `get_media_streams` request, then join + `add_media`
    #[default]
    StreamPair,
    /// Separate microphone and camera streams, then `join_with_media`
    DeviceStream,
}

impl fmt::Display for JoinStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamPair => f.write_str("stream-pair"),
            Self::DeviceStream => f.write_str("device-stream"),
        }
    }
}

/// What happens when the meeting holds the participant in a lobby
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyBehavior {
    /// Stay in the lobby until a host admits the participant
    #[default]
    WaitForAdmission,
    /// Treat lobby placement as a failed join
    FailIfNotAdmitted,
}

/// Desired media directions and admission behaviour for one join attempt.
///
/// Values are immutable once built; use [`JoinConfiguration::builder`] to make
/// a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfiguration {
    receive_video: bool,
    receive_audio: bool,
    receive_share: bool,
    send_video: bool,
    send_audio: bool,
    send_share: bool,
    lobby: LobbyBehavior,
}

impl Default for JoinConfiguration {
    fn default() -> Self {
        Self {
            receive_video: true,
            receive_audio: true,
            receive_share: false,
            send_video: true,
            send_audio: true,
            send_share: false,
            lobby: LobbyBehavior::WaitForAdmission,
        }
    }
}

impl JoinConfiguration {
    /// Start from the default send/receive audio+video settings
    pub fn builder() -> JoinConfigurationBuilder {
        JoinConfigurationBuilder {
            config: Self::default(),
        }
    }

    /// Receive remote video
    pub fn receive_video(&self) -> bool {
        self.receive_video
    }

    /// Receive remote audio
    pub fn receive_audio(&self) -> bool {
        self.receive_audio
    }

    /// Receive remote screen share
    pub fn receive_share(&self) -> bool {
        self.receive_share
    }

    /// Send camera video
    pub fn send_video(&self) -> bool {
        self.send_video
    }

    /// Send microphone audio
    pub fn send_audio(&self) -> bool {
        self.send_audio
    }

    /// Send a screen share
    pub fn send_share(&self) -> bool {
        self.send_share
    }

    /// Lobby handling
    pub fn lobby(&self) -> LobbyBehavior {
        self.lobby
    }

    /// Whether any local capture is required
    pub fn sends_media(&self) -> bool {
        self.send_audio || self.send_video || self.send_share
    }
}

/// Builder for [`JoinConfiguration`]
#[derive(Debug, Clone)]
pub struct JoinConfigurationBuilder {
    config: JoinConfiguration,
}

impl JoinConfigurationBuilder {
    /// Receive remote video
    pub fn receive_video(mut self, enable: bool) -> Self {
        self.config.receive_video = enable;
        self
    }

    /// Receive remote audio
    pub fn receive_audio(mut self, enable: bool) -> Self {
        self.config.receive_audio = enable;
        self
    }

    /// Receive remote screen share
    pub fn receive_share(mut self, enable: bool) -> Self {
        self.config.receive_share = enable;
        self
    }

    /// Send camera video
    pub fn send_video(mut self, enable: bool) -> Self {
        self.config.send_video = enable;
        self
    }

    /// Send microphone audio
    pub fn send_audio(mut self, enable: bool) -> Self {
        self.config.send_audio = enable;
        self
    }

    /// Send a screen share
    pub fn send_share(mut self, enable: bool) -> Self {
        self.config.send_share = enable;
        self
    }

    /// Lobby handling
    pub fn lobby(mut self, lobby: LobbyBehavior) -> Self {
        self.config.lobby = lobby;
        self
    }

    /// Finish building
    pub fn build(self) -> JoinConfiguration {
        self.config
    }
}

/// Constraints for the microphone stream of the device-stream join path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrophoneConstraints {
    /// Device id; `None` picks the system default
    pub device_id: Option<String>,
    /// Echo cancellation
    pub echo_cancellation: bool,
    /// Noise suppression
    pub noise_suppression: bool,
    /// Automatic gain control
    pub auto_gain_control: bool,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            device_id: None,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Constraints for the camera stream of the device-stream join path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConstraints {
    /// Device id; `None` picks the system default
    pub device_id: Option<String>,
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Capture frames per second
    pub frame_rate: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            device_id: None,
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }
}
