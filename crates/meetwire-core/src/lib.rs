//! # meetwire - meeting session coordination
//!
//! This crate wires an external video-conferencing SDK to a set of rendering
//! surfaces. It does not implement signaling or media itself; it sequences
//! the SDK calls and event bindings needed to join a meeting and to tear it
//! down safely:
//!
//! - **surface**: binds stream handles to rendering surfaces by media category
//! - **router**: subscribes to meeting events and dispatches them to the binder
//! - **join**: acquires local media and joins, with two interchangeable strategies
//! - **controller**: device registration, session start/end, command loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meetwire_core::{
//!     ClientConfig, LoopbackService, MemorySurfaces, SessionLifecycleController,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().access_token("my-token").build()?;
//!     let service = Arc::new(LoopbackService::new(config.sdk_settings()));
//!     let surfaces = MemorySurfaces::new();
//!
//!     let mut controller = SessionLifecycleController::new(&config, service, surfaces.binder())?;
//!     controller.initialize().await?;
//!
//!     controller.start_session("user@example.com").await?;
//!     assert!(surfaces.remote_video.is_populated());
//!
//!     controller.end_session().await?;
//!     controller.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod join;
pub mod logging;
pub mod loopback;
pub mod router;
pub mod sdk;
pub mod session;
pub mod surface;
pub mod types;

// Re-export main types
pub use config::{ClientConfig, ClientConfigBuilder, ACCESS_TOKEN_ENV, PLACEHOLDER_ACCESS_TOKEN};
pub use controller::{RegistrationState, SessionLifecycleController, UserCommand};
pub use error::{MeetingError, MeetingResult};
pub use events::{EventEmitter, EventStream, FailureStage, SessionEvent};
pub use join::{DeviceStreamStrategy, JoinCoordinator, JoinStrategy, StreamPairStrategy};
pub use logging::{setup_logging, LoggingConfig};
pub use loopback::{LoopbackMeeting, LoopbackService, SdkOp};
pub use router::{EventBinding, SessionEventRouter};
pub use sdk::{ConferencingService, Meeting, MeetingEvent, MeetingEventKind, SdkFailure, SdkSettings};
pub use session::Session;
pub use surface::{MediaSurfaceBinder, MemorySurface, MemorySurfaces, RenderSurface};
pub use types::{
    CameraConstraints, Destination, JoinConfiguration, JoinStrategyKind, LobbyBehavior,
    MediaCategory, MediaStreamDescriptor, MicrophoneConstraints, SessionId, SessionState,
    StreamHandle, SurfaceName,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
