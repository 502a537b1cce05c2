//! In-process conferencing SDK
//!
//! [`LoopbackService`] implements the SDK traits without any network. Joining
//! a meeting "connects" to a simulated remote participant: once local media is
//! published the meeting fires `media:ready` for the local preview and for the
//! remote audio/video it was asked to receive, and `leave` fires
//! `media:stopped` for every stream still running.
//!
//! Every SDK call is recorded ([`LoopbackService::calls`]) and any call can be
//! made to fail ([`LoopbackService::fail`]), which is what the CLI demo and the
//! scenario tests rely on.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::sdk::{
    AddMediaRequest, ConferencingService, JoinWithMediaRequest, ListenerId, MediaStreamPair,
    Meeting, MeetingEvent, MeetingEventCallback, MeetingEventKind, SdkFailure, SdkResult,
    SdkSettings,
};
use crate::types::{
    CameraConstraints, Destination, JoinConfiguration, MediaCategory, MediaStreamDescriptor,
    MicrophoneConstraints, StreamHandle,
};

/// SDK operations, used for the call log and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkOp {
    /// `ConferencingService::register`
    Register,
    /// `ConferencingService::unregister`
    Unregister,
    /// `ConferencingService::create_meeting`
    CreateMeeting,
    /// `ConferencingService::create_microphone_stream`
    CreateMicrophoneStream,
    /// `ConferencingService::create_camera_stream`
    CreateCameraStream,
    /// `Meeting::get_media_streams`
    GetMediaStreams,
    /// `Meeting::join`
    Join,
    /// `Meeting::join_with_media`
    JoinWithMedia,
    /// `Meeting::add_media`
    AddMedia,
    /// `Meeting::leave`
    Leave,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<SdkOp>>,
    failures: Mutex<HashMap<SdkOp, SdkFailure>>,
    latency: Mutex<Option<Duration>>,
}

impl Shared {
    /// Record the call, wait out the simulated latency, then apply any
    /// injected failure
    async fn call(&self, op: SdkOp) -> SdkResult<()> {
        self.calls.lock().push(op);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().get(&op) {
            Some(failure) => {
                tracing::debug!("loopback: {:?} failing with {}", op, failure);
                Err(failure.clone())
            }
            None => Ok(()),
        }
    }
}

/// In-process implementation of [`ConferencingService`]
#[derive(Clone)]
pub struct LoopbackService {
    settings: SdkSettings,
    shared: Arc<Shared>,
    registered: Arc<Mutex<bool>>,
    meetings: Arc<Mutex<Vec<Arc<LoopbackMeeting>>>>,
}

impl std::fmt::Debug for LoopbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackService")
            .field("log_level", &self.settings.log_level)
            .field("registered", &*self.registered.lock())
            .field("meetings", &self.meetings.lock().len())
            .finish()
    }
}

impl LoopbackService {
    /// Initialise the SDK with credentials
    pub fn new(settings: SdkSettings) -> Self {
        tracing::info!("Loopback SDK initialised (log level {})", settings.log_level);
        Self {
            settings,
            shared: Arc::new(Shared::default()),
            registered: Arc::new(Mutex::new(false)),
            meetings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate network latency on every async call
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.shared.latency.lock() = Some(latency);
        self
    }

    /// Make every future call of `op` fail with `failure`
    pub fn fail(&self, op: SdkOp, failure: SdkFailure) {
        self.shared.failures.lock().insert(op, failure);
    }

    /// Let `op` succeed again
    pub fn clear_failure(&self, op: SdkOp) {
        self.shared.failures.lock().remove(&op);
    }

    /// Reject camera access the way a browser does
    pub fn deny_camera(&self) {
        self.fail(
            SdkOp::CreateCameraStream,
            SdkFailure::new("NotAllowedError", "Permission denied"),
        );
    }

    /// Settings the SDK was initialised with
    pub fn settings(&self) -> &SdkSettings {
        &self.settings
    }

    /// Every SDK call made so far, in order
    pub fn calls(&self) -> Vec<SdkOp> {
        self.shared.calls.lock().clone()
    }

    /// Number of calls of one operation
    pub fn call_count(&self, op: SdkOp) -> usize {
        self.shared.calls.lock().iter().filter(|c| **c == op).count()
    }

    /// Whether the device is registered
    pub fn is_registered(&self) -> bool {
        *self.registered.lock()
    }

    /// Meetings created so far
    pub fn meetings(&self) -> Vec<Arc<LoopbackMeeting>> {
        self.meetings.lock().clone()
    }

    /// Most recently created meeting
    pub fn last_meeting(&self) -> Option<Arc<LoopbackMeeting>> {
        self.meetings.lock().last().cloned()
    }
}

#[async_trait]
impl ConferencingService for LoopbackService {
    async fn register(&self) -> SdkResult<()> {
        self.shared.call(SdkOp::Register).await?;
        *self.registered.lock() = true;
        Ok(())
    }

    async fn unregister(&self) -> SdkResult<()> {
        self.shared.call(SdkOp::Unregister).await?;
        *self.registered.lock() = false;
        Ok(())
    }

    async fn create_meeting(&self, destination: &Destination) -> SdkResult<Arc<dyn Meeting>> {
        self.shared.call(SdkOp::CreateMeeting).await?;
        if !self.is_registered() {
            return Err(SdkFailure::new("NotRegistered", "device is not registered"));
        }

        let meeting = Arc::new(LoopbackMeeting::new(destination.clone(), self.shared.clone()));
        self.meetings.lock().push(meeting.clone());
        Ok(meeting)
    }

    async fn create_microphone_stream(
        &self,
        constraints: MicrophoneConstraints,
    ) -> SdkResult<StreamHandle> {
        self.shared.call(SdkOp::CreateMicrophoneStream).await?;
        let label = constraints.device_id.unwrap_or_else(|| "default-microphone".to_string());
        Ok(StreamHandle::new(label))
    }

    async fn create_camera_stream(&self, constraints: CameraConstraints) -> SdkResult<StreamHandle> {
        self.shared.call(SdkOp::CreateCameraStream).await?;
        let label = constraints.device_id.unwrap_or_else(|| "default-camera".to_string());
        Ok(StreamHandle::new(format!(
            "{label} {}x{}@{}",
            constraints.width, constraints.height, constraints.frame_rate
        )))
    }
}

#[derive(Default)]
struct MeetingMedia {
    joined: bool,
    streams: BTreeMap<MediaCategory, StreamHandle>,
}

/// In-process meeting created by [`LoopbackService`]
pub struct LoopbackMeeting {
    id: String,
    destination: Destination,
    shared: Arc<Shared>,
    listeners: Mutex<BTreeMap<ListenerId, (MeetingEventKind, MeetingEventCallback)>>,
    next_listener: AtomicU64,
    media: Mutex<MeetingMedia>,
}

impl LoopbackMeeting {
    fn new(destination: Destination, shared: Arc<Shared>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            destination,
            shared,
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            media: Mutex::new(MeetingMedia::default()),
        }
    }

    /// Destination the meeting was created for
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Whether the meeting is joined
    pub fn is_joined(&self) -> bool {
        self.media.lock().joined
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Streams currently running
    pub fn active_streams(&self) -> Vec<(MediaCategory, StreamHandle)> {
        self.media
            .lock()
            .streams
            .iter()
            .map(|(category, handle)| (*category, handle.clone()))
            .collect()
    }

    /// Deliver an event to the matching listeners
    pub fn emit(&self, event: MeetingEvent) {
        let kind = event.kind();
        let callbacks: Vec<MeetingEventCallback> = self
            .listeners
            .lock()
            .values()
            .filter(|(listener_kind, _)| *listener_kind == kind)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }

    /// Stop one running stream, as when the remote side turns its camera off
    pub fn stop_stream(&self, category: MediaCategory) {
        let handle = self.media.lock().streams.remove(&category);
        if let Some(handle) = handle {
            self.emit(MeetingEvent::MediaStopped(Some(
                MediaStreamDescriptor::live(category, handle).stopped(),
            )));
        }
    }

    fn start_stream(&self, category: MediaCategory, handle: StreamHandle) {
        self.media.lock().streams.insert(category, handle.clone());
        self.emit(MeetingEvent::MediaReady(Some(MediaStreamDescriptor::live(
            category, handle,
        ))));
    }

    fn start_remote(&self, settings: &JoinConfiguration) {
        if settings.receive_video() {
            self.start_stream(
                MediaCategory::RemoteVideo,
                StreamHandle::new(format!("{} video", self.destination)),
            );
        }
        if settings.receive_audio() {
            self.start_stream(
                MediaCategory::RemoteAudio,
                StreamHandle::new(format!("{} audio", self.destination)),
            );
        }
    }
}

#[async_trait]
impl Meeting for LoopbackMeeting {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn join(&self, _settings: JoinConfiguration) -> SdkResult<()> {
        self.shared.call(SdkOp::Join).await?;
        self.media.lock().joined = true;
        Ok(())
    }

    async fn join_with_media(&self, request: JoinWithMediaRequest) -> SdkResult<()> {
        self.shared.call(SdkOp::JoinWithMedia).await?;
        self.media.lock().joined = true;

        if let Some(camera) = request.camera {
            self.start_stream(MediaCategory::LocalCamera, camera);
        }
        if let Some(microphone) = request.microphone {
            self.start_stream(MediaCategory::LocalMicrophone, microphone);
        }
        self.start_remote(&request.settings);
        Ok(())
    }

    async fn leave(&self) -> SdkResult<()> {
        self.shared.call(SdkOp::Leave).await?;
        let streams = {
            let mut media = self.media.lock();
            media.joined = false;
            std::mem::take(&mut media.streams)
        };
        for (category, handle) in streams {
            self.emit(MeetingEvent::MediaStopped(Some(
                MediaStreamDescriptor::live(category, handle).stopped(),
            )));
        }
        Ok(())
    }

    async fn get_media_streams(&self, settings: JoinConfiguration) -> SdkResult<MediaStreamPair> {
        self.shared.call(SdkOp::GetMediaStreams).await?;
        let local_stream = (settings.send_audio() || settings.send_video())
            .then(|| StreamHandle::new("local-stream"));
        let local_share = settings.send_share().then(|| StreamHandle::new("local-share"));
        Ok(MediaStreamPair {
            local_stream,
            local_share,
        })
    }

    async fn add_media(&self, request: AddMediaRequest) -> SdkResult<()> {
        self.shared.call(SdkOp::AddMedia).await?;
        if !self.is_joined() {
            return Err(SdkFailure::new("MeetingNotJoined", "join before adding media"));
        }

        if let Some(stream) = request.local_stream {
            let category = if request.settings.send_video() {
                MediaCategory::LocalCamera
            } else {
                MediaCategory::LocalMicrophone
            };
            self.start_stream(category, stream);
        }
        if let Some(share) = request.local_share {
            self.start_stream(MediaCategory::LocalShare, share);
        }
        self.start_remote(&request.settings);
        Ok(())
    }

    fn on(&self, kind: MeetingEventKind, callback: MeetingEventCallback) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, (kind, callback));
        id
    }

    fn off(&self, listener: ListenerId) -> bool {
        self.listeners.lock().remove(&listener).is_some()
    }
}
