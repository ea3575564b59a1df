use crate::engine::NegotiationEngine;
use crate::tracks::LocalTrackSet;
use meshcall_core::TrackId;
use tracing::{debug, warn};

impl NegotiationEngine {
    /// Propagate a change of the local tracks to every PeerLink.
    ///
    /// A track of a kind that is already being sent is swapped in place. A
    /// sender that appears or disappears needs a new offer round. Tracks that
    /// left the set are released once no link sends them.
    pub async fn on_local_track_set_changed(&mut self, tracks: LocalTrackSet) {
        if self.tracks == tracks {
            debug!("Local tracks unchanged");
            return;
        }
        let released = self
            .tracks
            .tracks()
            .filter(|old| tracks.tracks().all(|new| new.id != old.id))
            .map(|old| old.id)
            .collect::<Vec<TrackId>>();
        self.tracks = tracks;

        let signals = &*self.signals;
        for (remote, link) in self.links.iter_mut() {
            if !link.sync_tracks(&self.tracks).await {
                continue;
            }
            if let Err(e) = link.negotiate(signals).await {
                warn!("Negotiation round with {} aborted: {}", remote, e);
            }
        }

        for track_id in released {
            self.factory.release_track(track_id);
        }
    }
}
