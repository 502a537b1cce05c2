//! Session lifecycle control
//!
//! [`SessionLifecycleController`] is the top-level orchestrator. It owns the
//! SDK client, registers the device once, creates and joins meetings on
//! request and tears them down on hangup. Every failure is caught here,
//! logged, and published as a [`SessionEvent`] so the operator sees it; only
//! configuration and registration failures stop further session operations.
//!
//! # Lifecycle
//!
//! 1. [`initialize`](SessionLifecycleController::initialize) - register the device
//! 2. [`start_session`](SessionLifecycleController::start_session) - create,
//!    bind events, join
//! 3. [`end_session`](SessionLifecycleController::end_session) - leave, clear
//!    surfaces, unbind
//! 4. [`shutdown`](SessionLifecycleController::shutdown) - end any session and
//!    deregister
//!
//! [`run`](SessionLifecycleController::run) drives steps 2-4 from a channel of
//! [`UserCommand`]s.
//!
//! # Hangup while joining
//!
//! A join that is already in flight is allowed to complete. A hangup received
//! in the meantime is remembered, and the session is left as soon as the join
//! succeeds. If the join fails there is nothing to leave.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::{MeetingError, MeetingResult};
use crate::events::{EventEmitter, EventStream, FailureStage, SessionEvent};
use crate::join::JoinCoordinator;
use crate::router::SessionEventRouter;
use crate::sdk::ConferencingService;
use crate::session::Session;
use crate::surface::MediaSurfaceBinder;
use crate::types::{Destination, JoinStrategyKind, SessionId, SessionState};

/// Commands coming from the user input surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Destination submitted
    Join(String),
    /// Hangup control pressed
    Hangup,
    /// Stop the command loop
    Shutdown,
}

/// Device registration status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    /// `initialize` not called yet
    Unregistered,
    /// Device registered
    Registered,
    /// Registration failed; fatal for this controller
    Failed(String),
    /// Registration removed by `shutdown`
    Deregistered,
}

/// Top-level orchestrator of meeting sessions
pub struct SessionLifecycleController {
    service: Arc<dyn ConferencingService>,
    binder: Arc<MediaSurfaceBinder>,
    router: SessionEventRouter,
    coordinator: JoinCoordinator,
    events: EventEmitter,
    registration: RegistrationState,
    session: Option<Session>,
}

impl std::fmt::Debug for SessionLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycleController")
            .field("registration", &self.registration)
            .field("strategy", &self.coordinator.kind())
            .field("session", &self.session)
            .finish()
    }
}

impl SessionLifecycleController {
    /// Create a controller around an initialised SDK client.
    ///
    /// The configuration is validated first; a placeholder access token is
    /// rejected here, before any SDK call.
    pub fn new(
        config: &ClientConfig,
        service: Arc<dyn ConferencingService>,
        binder: MediaSurfaceBinder,
    ) -> MeetingResult<Self> {
        config.validate()?;

        let events = EventEmitter::new(config.event_capacity);
        let binder = Arc::new(binder.with_events(events.clone()));
        let router = SessionEventRouter::new(binder.clone(), events.clone());
        let coordinator = JoinCoordinator::from_config(config, service.clone(), binder.clone());

        Ok(Self {
            service,
            binder,
            router,
            coordinator,
            events,
            registration: RegistrationState::Unregistered,
            session: None,
        })
    }

    /// Subscribe to operator events
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    /// The emitter backing [`events`](Self::events)
    pub fn event_emitter(&self) -> &EventEmitter {
        &self.events
    }

    /// Registration status
    pub fn registration(&self) -> &RegistrationState {
        &self.registration
    }

    /// Join strategy in use
    pub fn strategy(&self) -> JoinStrategyKind {
        self.coordinator.kind()
    }

    /// Live session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Surface binder shared with the event router
    pub fn binder(&self) -> &Arc<MediaSurfaceBinder> {
        &self.binder
    }

    /// Register the device. Must be called exactly once.
    pub async fn initialize(&mut self) -> MeetingResult<()> {
        if self.registration != RegistrationState::Unregistered {
            return Err(MeetingError::invalid_state("device registration was already attempted"));
        }

        tracing::info!("Registering device");
        match self.service.register().await {
            Ok(()) => {
                self.registration = RegistrationState::Registered;
                tracing::info!("Device registered");
                self.events.emit(SessionEvent::Registered);
                Ok(())
            }
            Err(e) => {
                let err = MeetingError::registration(e.to_string());
                tracing::error!("{}", err);
                self.registration = RegistrationState::Failed(e.to_string());
                self.events.emit(SessionEvent::RegistrationFailed {
                    reason: e.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Create a meeting for `destination` and join it.
    ///
    /// On failure the attempt is discarded and the controller stays usable for
    /// another attempt.
    pub async fn start_session(&mut self, destination: &str) -> MeetingResult<SessionId> {
        self.ensure_registered()?;

        let destination = match Destination::parse(destination) {
            Ok(destination) => destination,
            Err(e) => {
                self.report_failure(None, &e);
                return Err(e);
            }
        };

        if let Some(active) = &self.session {
            let err = MeetingError::SessionActive {
                destination: active.destination().to_string(),
            };
            self.notice(format!("{}; hang up before joining {}", err.user_message(), destination));
            return Err(err);
        }

        tracing::info!("Creating meeting for {}", destination);
        let meeting = match self.service.create_meeting(&destination).await {
            Ok(meeting) => meeting,
            Err(e) => {
                let err = MeetingError::MeetingCreation {
                    destination: destination.to_string(),
                    reason: e.to_string(),
                };
                self.report_failure(None, &err);
                return Err(err);
            }
        };

        let mut session = Session::new(destination.clone(), meeting, self.events.clone());
        self.events.emit(SessionEvent::SessionCreated {
            session_id: session.id(),
            destination,
        });

        let binding = self.router.bind(&session);
        session.set_binding(binding);

        match self.coordinator.run(&mut session).await {
            Ok(()) => {
                let id = session.id();
                tracing::info!("Joined {} (session {})", session.destination(), id);
                self.session = Some(session);
                Ok(id)
            }
            Err(e) => {
                session.unbind();
                self.binder.detach_all();
                self.report_failure(Some(session.id()), &e);
                Err(e)
            }
        }
    }

    /// Leave the live session.
    ///
    /// Surfaces still populated after the SDK's `media:stopped` events are
    /// cleared, then the event listeners are removed.
    pub async fn end_session(&mut self) -> MeetingResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(MeetingError::NoActiveSession);
        };
        let session_id = session.id();

        tracing::info!("Leaving {} (session {})", session.destination(), session_id);
        if let Err(e) = session.meeting().leave().await {
            let err = MeetingError::leave(e.to_string());
            self.report_failure(Some(session_id), &err);
            return Err(err);
        }

        self.binder.detach_all();
        session.unbind();
        session.transition(SessionState::Left)?;
        self.session = None;
        self.events.emit(SessionEvent::SessionEnded { session_id });
        Ok(())
    }

    /// End any live session and remove the device registration
    pub async fn shutdown(&mut self) -> MeetingResult<()> {
        if self.session.is_some() {
            if let Err(e) = self.end_session().await {
                tracing::warn!("Leaving during shutdown failed: {}", e);
            }
        }

        if self.registration == RegistrationState::Registered {
            self.service
                .unregister()
                .await
                .map_err(|e| MeetingError::sdk(format!("unregister failed: {e}")))?;
            self.registration = RegistrationState::Deregistered;
            tracing::info!("Device deregistered");
            self.events.emit(SessionEvent::Deregistered);
        }
        Ok(())
    }

    /// Process user commands until `Shutdown` or until the channel closes,
    /// then shut down.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<UserCommand>) -> MeetingResult<()> {
        self.ensure_registered()?;

        while let Some(command) = commands.recv().await {
            match command {
                UserCommand::Join(destination) => {
                    if self.join_while_listening(&destination, &mut commands).await {
                        break;
                    }
                }
                UserCommand::Hangup => {
                    if let Err(e) = self.end_session().await {
                        self.notice(e.user_message());
                    }
                }
                UserCommand::Shutdown => break,
            }
        }

        self.shutdown().await
    }

    /// Run one join while still reading commands. Returns true when the loop
    /// should stop.
    async fn join_while_listening(
        &mut self,
        destination: &str,
        commands: &mut mpsc::Receiver<UserCommand>,
    ) -> bool {
        let events = self.events.clone();
        let mut hangup_requested = false;
        let mut stop_requested = false;
        let mut commands_open = true;

        let result = {
            let join = self.start_session(destination);
            tokio::pin!(join);
            loop {
                tokio::select! {
                    // a join that is ready wins over queued commands
                    biased;
                    result = &mut join => break result,
                    command = commands.recv(), if commands_open => match command {
                        Some(UserCommand::Hangup) => {
                            tracing::info!("Hangup requested while joining; leaving once the join completes");
                            hangup_requested = true;
                        }
                        Some(UserCommand::Join(other)) => {
                            tracing::warn!("Ignoring join to {} while another join is in flight", other);
                            events.emit(SessionEvent::Notice {
                                message: format!("Already joining; ignored request for {other}"),
                            });
                        }
                        Some(UserCommand::Shutdown) => {
                            hangup_requested = true;
                            stop_requested = true;
                        }
                        None => {
                            commands_open = false;
                            hangup_requested = true;
                            stop_requested = true;
                        }
                    },
                }
            }
        };

        match result {
            Ok(_) if hangup_requested => {
                if let Err(e) = self.end_session().await {
                    self.notice(e.user_message());
                }
            }
            Ok(_) => {}
            Err(e) if !e.is_per_attempt() => {
                tracing::error!("Stopping: {}", e);
                return true;
            }
            Err(e) => {
                tracing::debug!("Join attempt ended with {}", e);
            }
        }
        stop_requested
    }

    fn ensure_registered(&self) -> MeetingResult<()> {
        match self.registration {
            RegistrationState::Registered => Ok(()),
            _ => Err(MeetingError::NotRegistered),
        }
    }

    fn report_failure(&self, session_id: Option<SessionId>, error: &MeetingError) {
        let stage = failure_stage(error);
        tracing::error!("Session attempt failed during {}: {}", stage, error);
        self.events.emit(SessionEvent::SessionFailed {
            session_id,
            stage,
            message: error.user_message(),
        });
    }

    fn notice(&self, message: String) {
        tracing::info!("{}", message);
        self.events.emit(SessionEvent::Notice { message });
    }
}

fn failure_stage(error: &MeetingError) -> FailureStage {
    match error {
        MeetingError::InvalidDestination { .. } => FailureStage::Validation,
        MeetingError::MeetingCreation { .. } => FailureStage::MeetingCreation,
        MeetingError::MediaAcquisition { .. } => FailureStage::MediaAcquisition,
        MeetingError::Leave { .. } => FailureStage::Leave,
        _ => FailureStage::Join,
    }
}
