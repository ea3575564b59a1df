mod track_manager;

pub use track_manager::TrackManager;

use meshcall_core::{TrackId, TrackKind, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalTrack {
    pub id: TrackId,
    pub source: TrackSource,
}

impl LocalTrack {
    pub fn new(source: TrackSource) -> Self {
        Self {
            id: TrackId::new(),
            source,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }
}

/// The local capture tracks and which of them is sent on each kind.
///
/// Camera and screen share compete for the single video slot. The one
/// enabled last is sent; stopping it hands the slot back to the other one if
/// that is still running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalTrackSet {
    camera: Option<LocalTrack>,
    microphone: Option<LocalTrack>,
    screen: Option<LocalTrack>,
    video_source: Option<TrackSource>,
}

impl LocalTrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: TrackSource) -> Option<&LocalTrack> {
        self.slot(source).as_ref()
    }

    /// The track to send for `kind`, if any.
    pub fn active(&self, kind: TrackKind) -> Option<&LocalTrack> {
        match kind {
            TrackKind::Audio => self.microphone.as_ref(),
            TrackKind::Video => self.video_source.and_then(|source| self.get(source)),
        }
    }

    pub fn active_video_source(&self) -> Option<TrackSource> {
        self.video_source
    }

    /// Install `track` in its source slot. Returns the track it displaced.
    pub fn set(&mut self, track: LocalTrack) -> Option<LocalTrack> {
        if track.kind() == TrackKind::Video {
            self.video_source = Some(track.source);
        }
        self.slot_mut(track.source).replace(track)
    }

    pub fn clear(&mut self, source: TrackSource) -> Option<LocalTrack> {
        let removed = self.slot_mut(source).take()?;

        if self.video_source == Some(source) {
            let fallback = match source {
                TrackSource::Camera => TrackSource::Screen,
                TrackSource::Screen => TrackSource::Camera,
                TrackSource::Microphone => source,
            };
            self.video_source = self.get(fallback).map(|t| t.source);
        }
        Some(removed)
    }

    /// Every captured track, sent or not.
    pub fn tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        [&self.camera, &self.microphone, &self.screen].into_iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.microphone.is_none() && self.screen.is_none()
    }

    fn slot(&self, source: TrackSource) -> &Option<LocalTrack> {
        match source {
            TrackSource::Camera => &self.camera,
            TrackSource::Microphone => &self.microphone,
            TrackSource::Screen => &self.screen,
        }
    }

    fn slot_mut(&mut self, source: TrackSource) -> &mut Option<LocalTrack> {
        match source {
            TrackSource::Camera => &mut self.camera,
            TrackSource::Microphone => &mut self.microphone,
            TrackSource::Screen => &mut self.screen,
        }
    }
}
