//! Media surface binding
//!
//! A [`RenderSurface`] is whatever renders a stream: a video element, an audio
//! sink, a test double. The [`MediaSurfaceBinder`] owns the mapping from
//! [`MediaCategory`] to surface and is the only writer of surface state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{EventEmitter, SessionEvent};
use crate::types::{MediaCategory, StreamHandle, SurfaceName};

/// A sink that renders one stream at a time
pub trait RenderSurface: Send + Sync {
    /// Assign a stream, or clear the surface with `None`
    fn assign(&self, handle: Option<&StreamHandle>);
}

/// In-memory surface that remembers what it was given
#[derive(Debug, Default)]
pub struct MemorySurface {
    current: Mutex<Option<StreamHandle>>,
    assignments: Mutex<Vec<Option<StreamHandle>>>,
}

impl MemorySurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream currently rendered
    pub fn current(&self) -> Option<StreamHandle> {
        self.current.lock().clone()
    }

    /// Whether a stream is rendered
    pub fn is_populated(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Every assignment in order, clears included
    pub fn assignments(&self) -> Vec<Option<StreamHandle>> {
        self.assignments.lock().clone()
    }
}

impl RenderSurface for MemorySurface {
    fn assign(&self, handle: Option<&StreamHandle>) {
        let handle = handle.cloned();
        self.assignments.lock().push(handle.clone());
        *self.current.lock() = handle;
    }
}

/// The three page surfaces backed by [`MemorySurface`]s
#[derive(Debug, Clone)]
pub struct MemorySurfaces {
    /// Renders the local camera preview
    pub self_view: Arc<MemorySurface>,
    /// Renders remote video
    pub remote_video: Arc<MemorySurface>,
    /// Plays remote audio
    pub remote_audio: Arc<MemorySurface>,
}

impl MemorySurfaces {
    /// Create three empty surfaces
    pub fn new() -> Self {
        Self {
            self_view: Arc::new(MemorySurface::new()),
            remote_video: Arc::new(MemorySurface::new()),
            remote_audio: Arc::new(MemorySurface::new()),
        }
    }

    /// Look up a surface by name
    pub fn get(&self, name: SurfaceName) -> &Arc<MemorySurface> {
        match name {
            SurfaceName::SelfView => &self.self_view,
            SurfaceName::RemoteVideoView => &self.remote_video,
            SurfaceName::RemoteAudioView => &self.remote_audio,
        }
    }

    /// Whether any surface renders a stream
    pub fn any_populated(&self) -> bool {
        SurfaceName::ALL.iter().any(|name| self.get(*name).is_populated())
    }

    /// Build a binder writing to these surfaces
    pub fn binder(&self) -> MediaSurfaceBinder {
        let mut binder = MediaSurfaceBinder::new();
        for name in SurfaceName::ALL {
            binder.register_surface(name, self.get(name).clone());
        }
        binder
    }
}

impl Default for MemorySurfaces {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds stream handles to the surface registered for their category
pub struct MediaSurfaceBinder {
    surfaces: HashMap<SurfaceName, Arc<dyn RenderSurface>>,
    attached: Mutex<BTreeMap<MediaCategory, StreamHandle>>,
    events: Option<EventEmitter>,
}

impl std::fmt::Debug for MediaSurfaceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSurfaceBinder")
            .field("surfaces", &self.surfaces.keys().collect::<Vec<_>>())
            .field("attached", &*self.attached.lock())
            .finish()
    }
}

impl MediaSurfaceBinder {
    /// Create a binder with no surfaces registered
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            attached: Mutex::new(BTreeMap::new()),
            events: None,
        }
    }

    /// Publish surface changes on an event emitter
    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    /// Register (or replace) the sink for a surface name
    pub fn register_surface(&mut self, name: SurfaceName, surface: Arc<dyn RenderSurface>) {
        self.surfaces.insert(name, surface);
    }

    /// Bind `handle` to the surface for `category`, replacing any previous one.
    ///
    /// Categories with no surface are ignored.
    pub fn attach(&self, category: MediaCategory, handle: &StreamHandle) {
        let Some((name, surface)) = self.surface_for(category) else {
            tracing::debug!("No surface for {}, ignoring stream {}", category, handle);
            return;
        };

        let previous = self.attached.lock().insert(category, handle.clone());
        surface.assign(Some(handle));

        match previous {
            Some(old) if old != *handle => {
                tracing::debug!("Replaced {} on {} with {}", old, name, handle)
            }
            _ => tracing::debug!("Attached {} to {}", handle, name),
        }
        self.emit(SessionEvent::SurfaceAttached {
            category,
            surface: name,
        });
    }

    /// Clear the surface for `category`. Safe when nothing is bound.
    pub fn detach(&self, category: MediaCategory) {
        let Some((name, surface)) = self.surface_for(category) else {
            tracing::debug!("No surface for {}, nothing to detach", category);
            return;
        };

        let previous = self.attached.lock().remove(&category);
        surface.assign(None);

        if previous.is_some() {
            tracing::debug!("Cleared {}", name);
            self.emit(SessionEvent::SurfaceDetached {
                category,
                surface: name,
            });
        }
    }

    /// Clear every surface that still renders a stream
    pub fn detach_all(&self) {
        let categories: Vec<MediaCategory> = self.attached.lock().keys().copied().collect();
        for category in categories {
            self.detach(category);
        }
    }

    /// Categories currently bound, with their handles
    pub fn attached(&self) -> Vec<(MediaCategory, StreamHandle)> {
        self.attached
            .lock()
            .iter()
            .map(|(category, handle)| (*category, handle.clone()))
            .collect()
    }

    /// Handle bound for a category
    pub fn handle_for(&self, category: MediaCategory) -> Option<StreamHandle> {
        self.attached.lock().get(&category).cloned()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.attached.lock().is_empty()
    }

    fn surface_for(&self, category: MediaCategory) -> Option<(SurfaceName, &Arc<dyn RenderSurface>)> {
        let name = category.surface()?;
        self.surfaces.get(&name).map(|surface| (name, surface))
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl Default for MediaSurfaceBinder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_populates_matching_surface_only() {
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder();
        let camera = StreamHandle::new("camera");

        binder.attach(MediaCategory::LocalCamera, &camera);

        assert_eq!(surfaces.self_view.current(), Some(camera.clone()));
        assert!(!surfaces.remote_video.is_populated());
        assert!(!surfaces.remote_audio.is_populated());
        assert_eq!(binder.handle_for(MediaCategory::LocalCamera), Some(camera));
    }

    #[test]
    fn test_attach_overwrites_previous_handle() {
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder();
        let first = StreamHandle::new("remote-1");
        let second = StreamHandle::new("remote-2");

        binder.attach(MediaCategory::RemoteVideo, &first);
        binder.attach(MediaCategory::RemoteVideo, &second);

        assert_eq!(surfaces.remote_video.current(), Some(second.clone()));
        assert_eq!(binder.attached(), vec![(MediaCategory::RemoteVideo, second)]);
    }

    #[test]
    fn test_detach_without_binding_clears_surface() {
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder();

        binder.detach(MediaCategory::RemoteAudio);
        binder.detach(MediaCategory::RemoteAudio);

        assert!(!surfaces.remote_audio.is_populated());
        assert_eq!(surfaces.remote_audio.assignments(), vec![None, None]);
    }

    #[test]
    fn test_categories_without_surface_are_ignored() {
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder();

        binder.attach(MediaCategory::LocalMicrophone, &StreamHandle::new("mic"));
        binder.attach(MediaCategory::RemoteShare, &StreamHandle::new("share"));
        binder.detach(MediaCategory::LocalMicrophone);

        assert!(binder.is_empty());
        assert!(!surfaces.any_populated());
        assert!(surfaces.self_view.assignments().is_empty());
    }

    #[test]
    fn test_unregistered_surface_is_ignored() {
        let binder = MediaSurfaceBinder::new();
        binder.attach(MediaCategory::RemoteVideo, &StreamHandle::new("video"));
        assert!(binder.is_empty());
    }

    #[test]
    fn test_detach_all_clears_everything() {
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder();
        binder.attach(MediaCategory::LocalCamera, &StreamHandle::new("camera"));
        binder.attach(MediaCategory::RemoteVideo, &StreamHandle::new("video"));
        binder.attach(MediaCategory::RemoteAudio, &StreamHandle::new("audio"));

        binder.detach_all();

        assert!(binder.is_empty());
        assert!(!surfaces.any_populated());
    }

    #[tokio::test]
    async fn test_surface_events_emitted() {
        let events = EventEmitter::new(8);
        let mut rx = events.receiver();
        let surfaces = MemorySurfaces::new();
        let binder = surfaces.binder().with_events(events);

        binder.attach(MediaCategory::RemoteAudio, &StreamHandle::new("audio"));
        binder.detach(MediaCategory::RemoteAudio);
        // already clear: no second event
        binder.detach(MediaCategory::RemoteAudio);

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SurfaceAttached {
                category: MediaCategory::RemoteAudio,
                surface: SurfaceName::RemoteAudioView,
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SurfaceDetached {
                category: MediaCategory::RemoteAudio,
                surface: SurfaceName::RemoteAudioView,
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
