//! One meeting attempt and its lifecycle state

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{MeetingError, MeetingResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::router::EventBinding;
use crate::sdk::Meeting;
use crate::types::{Destination, SessionId, SessionState};

/// A created meeting and the state of the attempt to join it
pub struct Session {
    id: SessionId,
    destination: Destination,
    state: SessionState,
    meeting: Arc<dyn Meeting>,
    created_at: DateTime<Utc>,
    joined_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    binding: Option<EventBinding>,
    events: EventEmitter,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("meeting", &self.meeting.id())
            .field("created_at", &self.created_at)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl Session {
    /// Wrap a freshly created meeting; the session starts in `Created`
    pub fn new(destination: Destination, meeting: Arc<dyn Meeting>, events: EventEmitter) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination,
            state: SessionState::Created,
            meeting,
            created_at: Utc::now(),
            joined_at: None,
            ended_at: None,
            binding: None,
            events,
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Destination the meeting was created for
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// SDK meeting object
    pub fn meeting(&self) -> &Arc<dyn Meeting> {
        &self.meeting
    }

    /// When the meeting object was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session reached `Joined`
    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    /// When the session reached a terminal state
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether the session is joined
    pub fn is_live(&self) -> bool {
        self.state == SessionState::Joined
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: SessionState) -> MeetingResult<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(MeetingError::InvalidTransition { from, to: next });
        }

        self.state = next;
        let now = Utc::now();
        match next {
            SessionState::Joined => self.joined_at = Some(now),
            SessionState::Failed | SessionState::Left => self.ended_at = Some(now),
            _ => {}
        }

        tracing::info!("Session {} ({}): {} -> {}", self.id, self.destination, from, next);
        self.events.emit(SessionEvent::StateChanged {
            session_id: self.id,
            from,
            to: next,
        });
        Ok(())
    }

    /// Mark the attempt as failed. No-op once terminal.
    pub fn fail(&mut self, error: &MeetingError) {
        if self.state.is_terminal() {
            return;
        }
        tracing::error!("Session {} failed in state {}: {}", self.id, self.state, error);
        // non-terminal states can always move to Failed
        let _ = self.transition(SessionState::Failed);
    }

    /// Keep the listener registrations for this session
    pub fn set_binding(&mut self, binding: EventBinding) {
        self.binding = Some(binding);
    }

    /// Whether event listeners are registered
    pub fn is_bound(&self) -> bool {
        self.binding.as_ref().is_some_and(EventBinding::is_bound)
    }

    /// Remove the event listeners, if any
    pub fn unbind(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            binding.unbind();
        }
    }
}
