//! Join coordination
//!
//! A join attempt always walks `Created -> MediaAcquiring -> Joining -> Joined`.
//! Local media is acquired completely before the SDK join call is issued, and
//! any failure leaves the session in `Failed` with nothing left on the
//! rendering surfaces by the attempt itself.
//!
//! Two strategies implement [`JoinStrategy`]:
//!
//! - [`StreamPairStrategy`] - one `get_media_streams` request for the
//!   local stream/share pair, then `join` and `add_media`
//! - [`DeviceStreamStrategy`] - microphone and camera opened separately with
//!   per-device constraints, camera preview shown right away, then a single
//!   `join_with_media`

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::{MeetingError, MeetingResult};
use crate::sdk::{AddMediaRequest, ConferencingService, JoinWithMediaRequest};
use crate::session::Session;
use crate::surface::MediaSurfaceBinder;
use crate::types::{
    CameraConstraints, JoinConfiguration, JoinStrategyKind, MediaCategory, MicrophoneConstraints,
    SessionState, StreamHandle,
};

/// One way of getting a created session into `Joined`
#[async_trait]
pub trait JoinStrategy: Send + Sync {
    /// Which strategy this is
    fn kind(&self) -> JoinStrategyKind;

    /// Acquire local media and join. The session is in `Created` on entry.
    async fn join(&self, session: &mut Session, config: &JoinConfiguration) -> MeetingResult<()>;
}

/// Combined stream-pair acquisition followed by join + `add_media`
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamPairStrategy;

#[async_trait]
impl JoinStrategy for StreamPairStrategy {
    fn kind(&self) -> JoinStrategyKind {
        JoinStrategyKind::StreamPair
    }

    async fn join(&self, session: &mut Session, config: &JoinConfiguration) -> MeetingResult<()> {
        let meeting = session.meeting().clone();

        session.transition(SessionState::MediaAcquiring)?;
        let streams = meeting
            .get_media_streams(*config)
            .await
            .map_err(|e| MeetingError::media_acquisition("local media", e.to_string()))?;

        if config.sends_media() && streams.local_stream.is_none() && streams.local_share.is_none() {
            tracing::warn!("SDK returned no local streams for session {}", session.id());
        }

        session.transition(SessionState::Joining)?;
        meeting
            .join(*config)
            .await
            .map_err(|e| MeetingError::join(e.to_string()))?;

        let published = meeting
            .add_media(AddMediaRequest {
                local_stream: streams.local_stream,
                local_share: streams.local_share,
                settings: *config,
            })
            .await;
        if let Err(e) = published {
            // already in the meeting; a failed attempt must not stay joined
            if let Err(leave) = meeting.leave().await {
                tracing::warn!("Leaving after failed add_media for session {}: {}", session.id(), leave);
            }
            return Err(MeetingError::join(format!("adding media failed: {e}")));
        }

        session.transition(SessionState::Joined)
    }
}

/// Separate microphone/camera acquisition followed by `join_with_media`
pub struct DeviceStreamStrategy {
    service: Arc<dyn ConferencingService>,
    binder: Arc<MediaSurfaceBinder>,
    microphone: MicrophoneConstraints,
    camera: CameraConstraints,
}

impl std::fmt::Debug for DeviceStreamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStreamStrategy")
            .field("microphone", &self.microphone)
            .field("camera", &self.camera)
            .finish()
    }
}

impl DeviceStreamStrategy {
    /// Create the strategy with per-device constraints
    pub fn new(
        service: Arc<dyn ConferencingService>,
        binder: Arc<MediaSurfaceBinder>,
        microphone: MicrophoneConstraints,
        camera: CameraConstraints,
    ) -> Self {
        Self {
            service,
            binder,
            microphone,
            camera,
        }
    }

    async fn open_microphone(&self, config: &JoinConfiguration) -> MeetingResult<Option<StreamHandle>> {
        if !config.send_audio() {
            return Ok(None);
        }
        let stream = self
            .service
            .create_microphone_stream(self.microphone.clone())
            .await
            .map_err(|e| MeetingError::media_acquisition("microphone", e.to_string()))?;
        tracing::debug!("Microphone stream ready: {}", stream);
        Ok(Some(stream))
    }

    async fn open_camera(&self, config: &JoinConfiguration) -> MeetingResult<Option<StreamHandle>> {
        if !config.send_video() {
            return Ok(None);
        }
        let stream = self
            .service
            .create_camera_stream(self.camera.clone())
            .await
            .map_err(|e| MeetingError::media_acquisition("camera", e.to_string()))?;
        tracing::debug!("Camera stream ready: {}", stream);
        Ok(Some(stream))
    }
}

#[async_trait]
impl JoinStrategy for DeviceStreamStrategy {
    fn kind(&self) -> JoinStrategyKind {
        JoinStrategyKind::DeviceStream
    }

    async fn join(&self, session: &mut Session, config: &JoinConfiguration) -> MeetingResult<()> {
        let meeting = session.meeting().clone();

        session.transition(SessionState::MediaAcquiring)?;
        if config.send_share() {
            tracing::warn!(
                "Screen share is not published by the device-stream join (session {})",
                session.id()
            );
        }
        let (microphone, camera) =
            futures::try_join!(self.open_microphone(config), self.open_camera(config))?;

        if let Some(camera) = &camera {
            self.binder.attach(MediaCategory::LocalCamera, camera);
        }

        session.transition(SessionState::Joining)?;
        let request = JoinWithMediaRequest {
            microphone,
            camera: camera.clone(),
            settings: *config,
        };
        if let Err(e) = meeting.join_with_media(request).await {
            if camera.is_some() {
                self.binder.detach(MediaCategory::LocalCamera);
            }
            return Err(MeetingError::join(e.to_string()));
        }

        session.transition(SessionState::Joined)
    }
}

/// Runs the configured join strategy and owns failure handling
pub struct JoinCoordinator {
    strategy: Box<dyn JoinStrategy>,
    config: JoinConfiguration,
}

impl std::fmt::Debug for JoinCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinCoordinator")
            .field("strategy", &self.strategy.kind())
            .field("config", &self.config)
            .finish()
    }
}

impl JoinCoordinator {
    /// Coordinator for an explicit strategy
    pub fn new(strategy: Box<dyn JoinStrategy>, config: JoinConfiguration) -> Self {
        Self { strategy, config }
    }

    /// Coordinator for the strategy selected in the client configuration
    pub fn from_config(
        config: &ClientConfig,
        service: Arc<dyn ConferencingService>,
        binder: Arc<MediaSurfaceBinder>,
    ) -> Self {
        let strategy: Box<dyn JoinStrategy> = match config.join_strategy {
            JoinStrategyKind::StreamPair => Box::new(StreamPairStrategy),
            JoinStrategyKind::DeviceStream => Box::new(DeviceStreamStrategy::new(
                service,
                binder,
                config.microphone.clone(),
                config.camera.clone(),
            )),
        };
        Self::new(strategy, config.join)
    }

    /// Strategy in use
    pub fn kind(&self) -> JoinStrategyKind {
        self.strategy.kind()
    }

    /// Join settings used for every attempt
    pub fn join_configuration(&self) -> &JoinConfiguration {
        &self.config
    }

    /// Join a session that is still in `Created`.
    ///
    /// On failure the session is moved to `Failed` and the error returned. No
    /// retry is attempted.
    pub async fn run(&self, session: &mut Session) -> MeetingResult<()> {
        if session.state() != SessionState::Created {
            return Err(MeetingError::invalid_state(format!(
                "cannot join session {} in state {}",
                session.id(),
                session.state()
            )));
        }

        tracing::info!(
            "Joining {} using {} strategy",
            session.destination(),
            self.strategy.kind()
        );

        match self.strategy.join(session, &self.config).await {
            Ok(()) => Ok(()),
            Err(e) => {
                session.fail(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventEmitter;
    use crate::sdk::{MediaStreamPair, MockConferencingService, MockMeeting, SdkFailure};
    use crate::surface::MemorySurfaces;
    use crate::types::Destination;
    use mockall::Sequence;
    use tracing_test::traced_test;

    fn session_for(meeting: MockMeeting) -> Session {
        Session::new(
            Destination::parse("user@example.com").unwrap(),
            Arc::new(meeting),
            EventEmitter::new(32),
        )
    }

    fn base_meeting() -> MockMeeting {
        let mut meeting = MockMeeting::new();
        meeting.expect_id().return_const("meeting-1".to_string());
        meeting
    }

    #[tokio::test]
    async fn test_stream_pair_orders_acquire_join_add_media() {
        let mut meeting = base_meeting();
        let mut seq = Sequence::new();
        let local = StreamHandle::new("local");

        let returned = local.clone();
        meeting
            .expect_get_media_streams()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(MediaStreamPair {
                    local_stream: Some(returned.clone()),
                    local_share: None,
                })
            });
        meeting
            .expect_join()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let expected = local.clone();
        meeting
            .expect_add_media()
            .withf(move |req| req.local_stream.as_ref() == Some(&expected) && req.local_share.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());

        coordinator.run(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[tokio::test]
    async fn test_stream_pair_acquisition_failure_never_joins() {
        let mut meeting = base_meeting();
        meeting
            .expect_get_media_streams()
            .returning(|_| Err(SdkFailure::new("NotAllowedError", "Permission denied")));
        meeting.expect_join().never();
        meeting.expect_add_media().never();

        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());

        let err = coordinator.run(&mut session).await.unwrap_err();
        assert!(matches!(err, MeetingError::MediaAcquisition { .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_stream_pair_join_failure_is_failed() {
        let mut meeting = base_meeting();
        meeting
            .expect_get_media_streams()
            .returning(|_| Ok(MediaStreamPair::default()));
        meeting
            .expect_join()
            .returning(|_| Err(SdkFailure::new("JoinError", "meeting locked")));
        meeting.expect_add_media().never();

        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());

        let err = coordinator.run(&mut session).await.unwrap_err();
        assert_eq!(err, MeetingError::join("JoinError: meeting locked"));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_stream_pair_add_media_failure_leaves_meeting() {
        let mut meeting = base_meeting();
        let mut seq = Sequence::new();
        meeting
            .expect_get_media_streams()
            .returning(|_| Ok(MediaStreamPair::default()));
        meeting
            .expect_join()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        meeting
            .expect_add_media()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SdkFailure::new("MediaError", "transport closed")));
        meeting
            .expect_leave()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());

        let err = coordinator.run(&mut session).await.unwrap_err();
        assert_eq!(err, MeetingError::join("adding media failed: MediaError: transport closed"));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_stream_pair_failed_leave_keeps_add_media_error() {
        let mut meeting = base_meeting();
        meeting
            .expect_get_media_streams()
            .returning(|_| Ok(MediaStreamPair::default()));
        meeting.expect_join().returning(|_| Ok(()));
        meeting
            .expect_add_media()
            .returning(|_| Err(SdkFailure::new("MediaError", "transport closed")));
        meeting
            .expect_leave()
            .times(1)
            .returning(|| Err(SdkFailure::new("LeaveError", "already gone")));

        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());

        let err = coordinator.run(&mut session).await.unwrap_err();
        assert!(matches!(err, MeetingError::Join { ref reason } if reason.starts_with("adding media failed")));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_device_stream_shows_preview_before_join() {
        let surfaces = MemorySurfaces::new();
        let binder = Arc::new(surfaces.binder());
        let camera = StreamHandle::new("camera");

        let mut service = MockConferencingService::new();
        service
            .expect_create_microphone_stream()
            .withf(|c| c.echo_cancellation && c.noise_suppression)
            .times(1)
            .returning(|_| Ok(StreamHandle::new("microphone")));
        let returned = camera.clone();
        service
            .expect_create_camera_stream()
            .withf(|c| c.width == 1280 && c.height == 720)
            .times(1)
            .returning(move |_| Ok(returned.clone()));

        let mut meeting = base_meeting();
        let self_view = surfaces.self_view.clone();
        let expected = camera.clone();
        meeting
            .expect_join_with_media()
            .times(1)
            .returning(move |req| {
                assert_eq!(self_view.current(), Some(expected.clone()));
                assert!(req.microphone.is_some());
                Ok(())
            });

        let strategy = DeviceStreamStrategy::new(
            Arc::new(service),
            binder,
            MicrophoneConstraints::default(),
            CameraConstraints {
                width: 1280,
                height: 720,
                ..CameraConstraints::default()
            },
        );
        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(strategy), JoinConfiguration::default());

        coordinator.run(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Joined);
        assert_eq!(surfaces.self_view.current(), Some(camera));
    }

    #[tokio::test]
    async fn test_device_stream_camera_denied() {
        let surfaces = MemorySurfaces::new();
        let mut service = MockConferencingService::new();
        service
            .expect_create_microphone_stream()
            .returning(|_| Ok(StreamHandle::new("microphone")));
        service
            .expect_create_camera_stream()
            .returning(|_| Err(SdkFailure::new("NotAllowedError", "Permission denied")));

        let mut meeting = base_meeting();
        meeting.expect_join_with_media().never();

        let strategy = DeviceStreamStrategy::new(
            Arc::new(service),
            Arc::new(surfaces.binder()),
            MicrophoneConstraints::default(),
            CameraConstraints::default(),
        );
        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(strategy), JoinConfiguration::default());

        let err = coordinator.run(&mut session).await.unwrap_err();
        assert!(matches!(err, MeetingError::MediaAcquisition { ref device, .. } if device == "camera"));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!surfaces.self_view.is_populated());
        assert!(surfaces.self_view.assignments().is_empty());
    }

    #[tokio::test]
    async fn test_device_stream_join_failure_clears_preview() {
        let surfaces = MemorySurfaces::new();
        let mut service = MockConferencingService::new();
        service
            .expect_create_microphone_stream()
            .returning(|_| Ok(StreamHandle::new("microphone")));
        service
            .expect_create_camera_stream()
            .returning(|_| Ok(StreamHandle::new("camera")));

        let mut meeting = base_meeting();
        meeting
            .expect_join_with_media()
            .returning(|_| Err(SdkFailure::new("JoinError", "not admitted")));

        let strategy = DeviceStreamStrategy::new(
            Arc::new(service),
            Arc::new(surfaces.binder()),
            MicrophoneConstraints::default(),
            CameraConstraints::default(),
        );
        let mut session = session_for(meeting);
        let coordinator = JoinCoordinator::new(Box::new(strategy), JoinConfiguration::default());

        assert!(coordinator.run(&mut session).await.is_err());
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!surfaces.self_view.is_populated());
    }

    #[tokio::test]
    async fn test_device_stream_receive_only_skips_devices() {
        let mut service = MockConferencingService::new();
        service.expect_create_microphone_stream().never();
        service.expect_create_camera_stream().never();

        let mut meeting = base_meeting();
        meeting
            .expect_join_with_media()
            .withf(|req| req.microphone.is_none() && req.camera.is_none())
            .returning(|_| Ok(()));

        let strategy = DeviceStreamStrategy::new(
            Arc::new(service),
            Arc::new(MediaSurfaceBinder::new()),
            MicrophoneConstraints::default(),
            CameraConstraints::default(),
        );
        let config = JoinConfiguration::builder()
            .send_audio(false)
            .send_video(false)
            .build();
        let mut session = session_for(meeting);

        JoinCoordinator::new(Box::new(strategy), config)
            .run(&mut session)
            .await
            .unwrap();
        assert!(session.is_live());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_device_stream_warns_about_unpublished_share() {
        let mut service = MockConferencingService::new();
        service.expect_create_microphone_stream().never();
        service.expect_create_camera_stream().never();

        let mut meeting = base_meeting();
        meeting
            .expect_join_with_media()
            .withf(|req| req.settings.send_share())
            .times(1)
            .returning(|_| Ok(()));

        let strategy = DeviceStreamStrategy::new(
            Arc::new(service),
            Arc::new(MediaSurfaceBinder::new()),
            MicrophoneConstraints::default(),
            CameraConstraints::default(),
        );
        let config = JoinConfiguration::builder()
            .send_audio(false)
            .send_video(false)
            .send_share(true)
            .build();
        let mut session = session_for(meeting);

        JoinCoordinator::new(Box::new(strategy), config)
            .run(&mut session)
            .await
            .unwrap();
        assert!(session.is_live());
        assert!(logs_contain("Screen share is not published by the device-stream join"));
    }

    #[tokio::test]
    async fn test_run_rejects_session_not_in_created() {
        let mut meeting = base_meeting();
        meeting.expect_get_media_streams().never();
        let mut session = session_for(meeting);
        session.transition(SessionState::MediaAcquiring).unwrap();

        let coordinator = JoinCoordinator::new(Box::new(StreamPairStrategy), JoinConfiguration::default());
        let err = coordinator.run(&mut session).await.unwrap_err();

        assert!(matches!(err, MeetingError::InvalidState { .. }));
        assert_eq!(session.state(), SessionState::MediaAcquiring);
    }
}
