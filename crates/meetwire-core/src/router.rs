//! Routing of meeting events to the surface binder
//!
//! [`SessionEventRouter::bind`] registers the three listeners the client needs
//! on a meeting and hands back an [`EventBinding`]. The binding owns the
//! listener ids; unbinding (explicitly or on drop) removes all of them, so
//! repeated join attempts never stack handlers on the SDK.

use std::sync::Arc;

use crate::events::{EventEmitter, SessionEvent};
use crate::sdk::{ListenerId, Meeting, MeetingEvent, MeetingEventCallback, MeetingEventKind};
use crate::session::Session;
use crate::surface::MediaSurfaceBinder;
use crate::types::SessionId;

/// Dispatches `error`, `media:ready` and `media:stopped` events
#[derive(Debug, Clone)]
pub struct SessionEventRouter {
    binder: Arc<MediaSurfaceBinder>,
    events: EventEmitter,
}

impl SessionEventRouter {
    /// Create a router writing to `binder` and reporting on `events`
    pub fn new(binder: Arc<MediaSurfaceBinder>, events: EventEmitter) -> Self {
        Self { binder, events }
    }

    /// Subscribe the event handlers on the session's meeting
    pub fn bind(&self, session: &Session) -> EventBinding {
        let meeting = session.meeting().clone();
        let session_id = session.id();

        let listeners = vec![
            meeting.on(MeetingEventKind::Error, self.error_handler(session_id)),
            meeting.on(MeetingEventKind::MediaReady, self.media_handler(session_id)),
            meeting.on(MeetingEventKind::MediaStopped, self.media_handler(session_id)),
        ];

        tracing::debug!(
            "Bound {} listeners on meeting {} for session {}",
            listeners.len(),
            meeting.id(),
            session_id
        );

        EventBinding {
            meeting,
            session_id,
            listeners,
        }
    }

    fn error_handler(&self, session_id: SessionId) -> MeetingEventCallback {
        let events = self.events.clone();
        Arc::new(move |event: &MeetingEvent| {
            if let MeetingEvent::Error(failure) = event {
                tracing::error!("Meeting error in session {}: {}", session_id, failure);
                events.emit(SessionEvent::SdkError {
                    session_id,
                    message: failure.to_string(),
                });
            }
        })
    }

    fn media_handler(&self, session_id: SessionId) -> MeetingEventCallback {
        let binder = self.binder.clone();
        Arc::new(move |event: &MeetingEvent| route_media(&binder, session_id, event))
    }
}

fn route_media(binder: &MediaSurfaceBinder, session_id: SessionId, event: &MeetingEvent) {
    match event {
        MeetingEvent::MediaReady(None) => {
            tracing::debug!("Ignoring empty media:ready in session {}", session_id);
        }
        MeetingEvent::MediaReady(Some(media)) if !media.live => {
            // ready for a stream that has already ended
            binder.detach(media.category);
        }
        MeetingEvent::MediaReady(Some(media)) => {
            tracing::debug!("media:ready {} in session {}", media.category, session_id);
            binder.attach(media.category, &media.handle);
        }
        MeetingEvent::MediaStopped(None) => {
            tracing::warn!("Ignoring empty media:stopped in session {}", session_id);
        }
        MeetingEvent::MediaStopped(Some(media)) => {
            tracing::debug!("media:stopped {} in session {}", media.category, session_id);
            binder.detach(media.category);
        }
        MeetingEvent::Error(_) => {}
    }
}

/// Listener registrations for one session
pub struct EventBinding {
    meeting: Arc<dyn Meeting>,
    session_id: SessionId,
    listeners: Vec<ListenerId>,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("session_id", &self.session_id)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl EventBinding {
    /// Listener ids still registered
    pub fn listeners(&self) -> &[ListenerId] {
        &self.listeners
    }

    /// Whether the listeners have been removed
    pub fn is_bound(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Remove every listener. Safe to call more than once.
    pub fn unbind(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        for listener in self.listeners.drain(..) {
            if !self.meeting.off(listener) {
                tracing::debug!("Listener {:?} was already removed", listener);
            }
        }
        tracing::debug!("Unbound listeners for session {}", self.session_id);
    }
}

impl Drop for EventBinding {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{MockMeeting, SdkFailure};
    use crate::surface::MemorySurfaces;
    use crate::types::{Destination, MediaCategory, MediaStreamDescriptor, StreamHandle};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    type Listeners = Arc<Mutex<HashMap<u64, (MeetingEventKind, MeetingEventCallback)>>>;

    /// Mock meeting whose `on`/`off` keep a real listener table
    fn listening_meeting() -> (Arc<dyn Meeting>, Listeners) {
        let listeners: Listeners = Arc::new(Mutex::new(HashMap::new()));
        let mut meeting = MockMeeting::new();
        meeting.expect_id().return_const("meeting-1".to_string());

        let table = listeners.clone();
        let mut next = 0u64;
        meeting.expect_on().returning(move |kind, callback| {
            next += 1;
            table.lock().insert(next, (kind, callback));
            ListenerId(next)
        });

        let table = listeners.clone();
        meeting
            .expect_off()
            .returning(move |id| table.lock().remove(&id.0).is_some());

        (Arc::new(meeting), listeners)
    }

    fn fire(listeners: &Listeners, event: MeetingEvent) {
        let callbacks: Vec<MeetingEventCallback> = listeners
            .lock()
            .values()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }

    fn setup() -> (SessionEventRouter, MemorySurfaces, EventEmitter, Session, Listeners) {
        let surfaces = MemorySurfaces::new();
        let events = EventEmitter::new(16);
        let router = SessionEventRouter::new(Arc::new(surfaces.binder()), events.clone());
        let (meeting, listeners) = listening_meeting();
        let session = Session::new(
            Destination::parse("user@example.com").unwrap(),
            meeting,
            events.clone(),
        );
        (router, surfaces, events, session, listeners)
    }

    #[test]
    fn test_bind_registers_three_listeners() {
        let (router, _surfaces, _events, session, listeners) = setup();
        let binding = router.bind(&session);

        assert_eq!(binding.listeners().len(), 3);
        let kinds: Vec<MeetingEventKind> = listeners.lock().values().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&MeetingEventKind::Error));
        assert!(kinds.contains(&MeetingEventKind::MediaReady));
        assert!(kinds.contains(&MeetingEventKind::MediaStopped));
    }

    #[test]
    fn test_ready_and_stopped_drive_surfaces() {
        let (router, surfaces, _events, session, listeners) = setup();
        let _binding = router.bind(&session);
        let video = StreamHandle::new("remote-video");

        fire(
            &listeners,
            MeetingEvent::MediaReady(Some(MediaStreamDescriptor::live(
                MediaCategory::RemoteVideo,
                video.clone(),
            ))),
        );
        assert_eq!(surfaces.remote_video.current(), Some(video.clone()));

        let stopped = MediaStreamDescriptor::live(MediaCategory::RemoteVideo, video).stopped();
        fire(&listeners, MeetingEvent::MediaStopped(Some(stopped.clone())));
        fire(&listeners, MeetingEvent::MediaStopped(Some(stopped)));
        assert!(!surfaces.remote_video.is_populated());
    }

    #[test]
    fn test_empty_payloads_are_ignored() {
        let (router, surfaces, _events, session, listeners) = setup();
        let _binding = router.bind(&session);

        fire(&listeners, MeetingEvent::MediaReady(None));
        fire(&listeners, MeetingEvent::MediaStopped(None));

        assert!(!surfaces.any_populated());
        assert!(surfaces.self_view.assignments().is_empty());
    }

    #[test]
    fn test_ready_for_dead_stream_clears_surface() {
        let (router, surfaces, _events, session, listeners) = setup();
        let _binding = router.bind(&session);
        let camera = MediaStreamDescriptor::live(MediaCategory::LocalCamera, StreamHandle::new("cam"));

        fire(&listeners, MeetingEvent::MediaReady(Some(camera.clone())));
        fire(&listeners, MeetingEvent::MediaReady(Some(camera.stopped())));

        assert!(!surfaces.self_view.is_populated());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_error_event_is_logged_and_emitted() {
        let (router, surfaces, events, session, listeners) = setup();
        let mut rx = events.receiver();
        let _binding = router.bind(&session);

        fire(
            &listeners,
            MeetingEvent::Error(SdkFailure::new("MediaError", "ICE failed")),
        );

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SdkError {
                session_id: session.id(),
                message: "MediaError: ICE failed".into(),
            }
        );
        assert_eq!(session.state(), crate::types::SessionState::Created);
        assert!(!surfaces.any_populated());
        assert!(logs_contain("ICE failed"));
    }

    #[test]
    fn test_unbind_removes_listeners_once() {
        let (router, surfaces, _events, session, listeners) = setup();
        let mut binding = router.bind(&session);

        binding.unbind();
        binding.unbind();
        assert!(!binding.is_bound());
        assert!(listeners.lock().is_empty());

        fire(
            &listeners,
            MeetingEvent::MediaReady(Some(MediaStreamDescriptor::live(
                MediaCategory::RemoteAudio,
                StreamHandle::new("audio"),
            ))),
        );
        assert!(!surfaces.remote_audio.is_populated());
    }

    #[test]
    fn test_drop_unbinds() {
        let (router, _surfaces, _events, session, listeners) = setup();
        {
            let _binding = router.bind(&session);
            assert_eq!(listeners.lock().len(), 3);
        }
        assert!(listeners.lock().is_empty());
    }

    #[test]
    fn test_rebinding_does_not_stack_handlers() {
        let (router, _surfaces, _events, session, listeners) = setup();
        for _ in 0..3 {
            let mut binding = router.bind(&session);
            binding.unbind();
        }
        let _binding = router.bind(&session);
        assert_eq!(listeners.lock().len(), 3);
    }
}
