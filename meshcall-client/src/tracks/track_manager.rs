use crate::engine::EngineHandle;
use crate::error::NegotiationError;
use crate::tracks::{LocalTrack, LocalTrackSet};
use meshcall_core::TrackSource;
use tracing::{debug, info, warn};

/// Owns the local capture state and tells the negotiation engine about every
/// change to it.
pub struct TrackManager {
    tracks: LocalTrackSet,
    engine: Option<EngineHandle>,
}

impl TrackManager {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            tracks: LocalTrackSet::new(),
            engine: Some(engine),
        }
    }

    /// A manager that only keeps state. Useful before a call is set up.
    pub fn detached() -> Self {
        Self {
            tracks: LocalTrackSet::new(),
            engine: None,
        }
    }

    pub fn attach(&mut self, engine: EngineHandle) {
        self.engine = Some(engine);
        self.notify();
    }

    pub fn tracks(&self) -> &LocalTrackSet {
        &self.tracks
    }

    pub fn start_camera(&mut self) -> LocalTrack {
        self.start(TrackSource::Camera)
    }

    pub fn start_microphone(&mut self) -> LocalTrack {
        self.start(TrackSource::Microphone)
    }

    pub fn start_screen_share(&mut self) -> LocalTrack {
        self.start(TrackSource::Screen)
    }

    pub fn stop_camera(&mut self) -> Option<LocalTrack> {
        self.stop(TrackSource::Camera)
    }

    pub fn stop_microphone(&mut self) -> Option<LocalTrack> {
        self.stop(TrackSource::Microphone)
    }

    pub fn stop_screen_share(&mut self) -> Option<LocalTrack> {
        self.stop(TrackSource::Screen)
    }

    /// Put a new capture track of `source` in place, e.g. after a device
    /// switch. Returns the track it displaced.
    pub fn replace(
        &mut self,
        source: TrackSource,
        track: LocalTrack,
    ) -> Result<Option<LocalTrack>, NegotiationError> {
        if track.source != source {
            return Err(NegotiationError::WrongSource {
                expected: source,
                actual: track.source,
            });
        }

        let previous = self.tracks.set(track);
        info!("Local {:?} track is now {}", source, track.id);
        self.notify();
        Ok(previous)
    }

    fn start(&mut self, source: TrackSource) -> LocalTrack {
        let track = LocalTrack::new(source);
        self.tracks.set(track);
        info!("Started local {:?} track {}", source, track.id);
        self.notify();
        track
    }

    fn stop(&mut self, source: TrackSource) -> Option<LocalTrack> {
        let Some(track) = self.tracks.clear(source) else {
            debug!("No local {:?} track to stop", source);
            return None;
        };

        info!("Stopped local {:?} track {}", source, track.id);
        self.notify();
        Some(track)
    }

    fn notify(&self) {
        let Some(engine) = &self.engine else {
            return;
        };
        if let Err(e) = engine.tracks_changed(self.tracks.clone()) {
            warn!("Local track change not delivered: {}", e);
        }
    }
}
