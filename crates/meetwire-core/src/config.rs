//! Client configuration
//!
//! ```rust
//! use meetwire_core::{ClientConfig, JoinStrategyKind};
//!
//! let config = ClientConfig::builder()
//!     .access_token("a-real-token")
//!     .join_strategy(JoinStrategyKind::DeviceStream)
//!     .camera(|c| c.resolution(1280, 720))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.camera.width, 1280);
//! ```
//!
//! The same structure can be read from TOML:
//!
//! ```toml
//! access_token = "..."
//! sdk_log_level = "debug"
//! join_strategy = "device-stream"
//!
//! [join]
//! send_video = true
//! receive_share = false
//!
//! [camera]
//! width = 1280
//! height = 720
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MeetingError, MeetingResult};
use crate::sdk::SdkSettings;
use crate::types::{CameraConstraints, JoinConfiguration, JoinStrategyKind, MicrophoneConstraints};

/// Value shipped in sample configuration; refused at startup
pub const PLACEHOLDER_ACCESS_TOKEN: &str = "YOUR_ACCESS_TOKEN";

/// Environment variable that overrides the configured access token
pub const ACCESS_TOKEN_ENV: &str = "MEETWIRE_ACCESS_TOKEN";

const SDK_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configuration of the meeting client
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Access token handed to the SDK
    pub access_token: String,
    /// Log level of the SDK's own logger
    pub sdk_log_level: String,
    /// Join path to use
    pub join_strategy: JoinStrategyKind,
    /// Media directions for every join attempt
    pub join: JoinConfiguration,
    /// Microphone constraints (device-stream path)
    pub microphone: MicrophoneConstraints,
    /// Camera constraints (device-stream path)
    pub camera: CameraConstraints,
    /// Capacity of the operator event channel
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token: PLACEHOLDER_ACCESS_TOKEN.to_string(),
            sdk_log_level: "debug".to_string(),
            join_strategy: JoinStrategyKind::default(),
            join: JoinConfiguration::default(),
            microphone: MicrophoneConstraints::default(),
            camera: CameraConstraints::default(),
            event_capacity: 256,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_token", &"<redacted>")
            .field("sdk_log_level", &self.sdk_log_level)
            .field("join_strategy", &self.join_strategy)
            .field("join", &self.join)
            .field("microphone", &self.microphone)
            .field("camera", &self.camera)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

impl ClientConfig {
    /// Start building a configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Parse a TOML document. The result is not validated.
    pub fn from_toml_str(input: &str) -> MeetingResult<Self> {
        toml::from_str(input).map_err(|e| MeetingError::config(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML file. The result is not validated.
    pub fn from_file(path: impl AsRef<Path>) -> MeetingResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MeetingError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Replace the access token with `MEETWIRE_ACCESS_TOKEN` when it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.access_token = token;
            }
        }
        self
    }

    /// Check the configuration before any SDK activity
    pub fn validate(&self) -> MeetingResult<()> {
        let token = self.access_token.trim();
        if token == PLACEHOLDER_ACCESS_TOKEN {
            return Err(MeetingError::PlaceholderCredential);
        }
        if token.is_empty() {
            return Err(MeetingError::config("access token is required"));
        }

        if !SDK_LOG_LEVELS.contains(&self.sdk_log_level.as_str()) {
            return Err(MeetingError::config(format!(
                "unknown SDK log level '{}'",
                self.sdk_log_level
            )));
        }

        if self.camera.width == 0 || self.camera.height == 0 || self.camera.frame_rate == 0 {
            return Err(MeetingError::config("camera resolution and frame rate must be non-zero"));
        }

        if self.event_capacity == 0 {
            return Err(MeetingError::config("event capacity must be at least 1"));
        }

        Ok(())
    }

    /// Settings passed to the SDK at construction
    pub fn sdk_settings(&self) -> SdkSettings {
        SdkSettings {
            access_token: self.access_token.trim().to_string(),
            log_level: self.sdk_log_level.clone(),
        }
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the access token (required)
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = token.into();
        self
    }

    /// Set the SDK log level
    pub fn sdk_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.sdk_log_level = level.into();
        self
    }

    /// Choose the join strategy
    pub fn join_strategy(mut self, kind: JoinStrategyKind) -> Self {
        self.config.join_strategy = kind;
        self
    }

    /// Use a pre-built join configuration
    pub fn join(mut self, join: JoinConfiguration) -> Self {
        self.config.join = join;
        self
    }

    /// Configure microphone constraints
    pub fn microphone(mut self, f: impl FnOnce(MicrophoneConstraintsBuilder) -> MicrophoneConstraintsBuilder) -> Self {
        self.config.microphone = f(MicrophoneConstraintsBuilder(self.config.microphone)).0;
        self
    }

    /// Configure camera constraints
    pub fn camera(mut self, f: impl FnOnce(CameraConstraintsBuilder) -> CameraConstraintsBuilder) -> Self {
        self.config.camera = f(CameraConstraintsBuilder(self.config.camera)).0;
        self
    }

    /// Set the operator event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> MeetingResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for microphone constraints
pub struct MicrophoneConstraintsBuilder(MicrophoneConstraints);

impl MicrophoneConstraintsBuilder {
    /// Pick a specific input device
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.0.device_id = Some(device_id.into());
        self
    }

    /// Enable/disable echo cancellation
    pub fn echo_cancellation(mut self, enable: bool) -> Self {
        self.0.echo_cancellation = enable;
        self
    }

    /// Enable/disable noise suppression
    pub fn noise_suppression(mut self, enable: bool) -> Self {
        self.0.noise_suppression = enable;
        self
    }

    /// Enable/disable automatic gain control
    pub fn auto_gain_control(mut self, enable: bool) -> Self {
        self.0.auto_gain_control = enable;
        self
    }
}

/// Builder for camera constraints
pub struct CameraConstraintsBuilder(CameraConstraints);

impl CameraConstraintsBuilder {
    /// Pick a specific camera
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.0.device_id = Some(device_id.into());
        self
    }

    /// Set the capture resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.0.width = width;
        self.0.height = height;
        self
    }

    /// Set the capture frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.0.frame_rate = fps;
        self
    }
}
