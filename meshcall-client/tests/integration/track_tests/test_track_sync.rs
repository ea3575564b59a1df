use meshcall_client::{EngineHandle, EngineInput, NegotiationState, TrackManager};
use meshcall_core::{ClientMessage, SdpType, TrackId, TrackKind};
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::mock_session::SessionCall;
use crate::utils::test_peer::{TestPeer, connected_pair, exchange};

async fn apply(peer: &mut TestPeer, inputs: &mut mpsc::UnboundedReceiver<EngineInput>) {
    while let Ok(input) = inputs.try_recv() {
        peer.engine.handle_input(input).await;
    }
}

fn offers(sent: &[ClientMessage]) -> usize {
    sent.iter()
        .filter(|m| matches!(m, ClientMessage::Offer { .. }))
        .count()
}

fn assert_one_video_sender(peer: &TestPeer, remote: &str, video: &[TrackId]) {
    let session = peer.session(remote);
    let state = session.state();
    let video_senders = state
        .sent_tracks()
        .iter()
        .filter(|id| video.contains(*id))
        .count();
    assert_eq!(video_senders, 1);
    assert_eq!(state.senders.len(), peer.link(remote).sender_count());
}

#[tokio::test]
async fn test_track_sync() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    let (handle, mut inputs) = EngineHandle::channel();
    let mut tracks = TrackManager::new(handle);

    // A new kind needs a new offer.
    let camera = tracks.start_camera();
    apply(&mut a, &mut inputs).await;
    assert_eq!(offers(&a.sent()), 1);
    assert_eq!(a.link("b").sent_track(TrackKind::Video), Some(camera.id));
    exchange(&mut a, &mut b).await;
    assert_eq!(a.link("b").state(), NegotiationState::Stable);

    // Screen share replaces the camera on the same sender.
    let screen = tracks.start_screen_share();
    apply(&mut a, &mut inputs).await;
    assert!(a.sent().is_empty());
    assert_eq!(a.link("b").sent_track(TrackKind::Video), Some(screen.id));
    assert_eq!(a.session("b").state().sent_tracks(), vec![screen.id]);
    assert_eq!(
        a.session("b").state().count(&SessionCall::ReplaceTrack(screen.id)),
        1
    );
    assert_one_video_sender(&a, "b", &[camera.id, screen.id]);

    // Stopping it brings the camera back.
    tracks.stop_screen_share();
    apply(&mut a, &mut inputs).await;
    assert!(a.sent().is_empty());
    assert_eq!(a.link("b").sent_track(TrackKind::Video), Some(camera.id));
    assert_one_video_sender(&a, "b", &[camera.id, screen.id]);

    let microphone = tracks.start_microphone();
    apply(&mut a, &mut inputs).await;
    assert_eq!(offers(&a.sent()), 1);
    exchange(&mut a, &mut b).await;
    assert_eq!(a.link("b").sent_track(TrackKind::Audio), Some(microphone.id));
    assert_eq!(a.link("b").sender_count(), 2);

    // Removing the last video track removes its sender.
    tracks.stop_camera();
    apply(&mut a, &mut inputs).await;
    assert_eq!(offers(&a.sent()), 1);
    exchange(&mut a, &mut b).await;
    assert_eq!(a.link("b").sent_track(TrackKind::Video), None);
    assert_eq!(a.link("b").sender_count(), 1);
    assert_eq!(a.session("b").state().count(&SessionCall::RemoveTrack), 1);
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
}

#[tokio::test]
async fn test_same_track_set_is_noop() {
    init_tracing();

    let (mut a, _b) = connected_pair("a", "b").await;
    let mut tracks = TrackManager::detached();
    tracks.start_camera();

    a.engine.on_local_track_set_changed(tracks.tracks().clone()).await;
    a.sent();
    let calls = a.session("b").state().calls.len();

    a.engine.on_local_track_set_changed(tracks.tracks().clone()).await;
    assert!(a.sent().is_empty());
    assert_eq!(a.session("b").state().calls.len(), calls);
}

#[tokio::test]
async fn test_new_link_starts_with_current_tracks() {
    init_tracing();

    let mut a = TestPeer::new("a");
    let mut b = TestPeer::new("b");
    let mut tracks = TrackManager::detached();
    let camera = tracks.start_camera();

    a.enter_call(&[]).await;
    a.engine.on_local_track_set_changed(tracks.tracks().clone()).await;
    a.sees_join("b").await;
    b.enter_call(&["a"]).await;
    exchange(&mut a, &mut b).await;

    let link = a.link("b");
    assert_eq!(link.sent_track(TrackKind::Video), Some(camera.id));
    assert_eq!(link.state(), NegotiationState::Stable);
    assert_eq!(b.link("a").state(), NegotiationState::Stable);

    // a answered b's offer, then offered its camera.
    let session = a.session("b");
    let state = session.state();
    assert_eq!(state.count(&SessionCall::SetLocal(SdpType::Answer)), 1);
    assert_eq!(state.count(&SessionCall::SetLocal(SdpType::Offer)), 1);
}

#[tokio::test]
async fn test_stopped_tracks_are_released() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    let (handle, mut inputs) = EngineHandle::channel();
    let mut tracks = TrackManager::new(handle);

    let camera = tracks.start_camera();
    let screen = tracks.start_screen_share();
    apply(&mut a, &mut inputs).await;
    exchange(&mut a, &mut b).await;

    // The camera is still captured while the screen is sent.
    assert!(a.factory.released().is_empty());

    tracks.stop_screen_share();
    apply(&mut a, &mut inputs).await;
    assert_eq!(a.factory.released(), vec![screen.id]);
    assert_eq!(a.link("b").sent_track(TrackKind::Video), Some(camera.id));

    tracks.stop_camera();
    apply(&mut a, &mut inputs).await;
    exchange(&mut a, &mut b).await;
    assert_eq!(a.factory.released(), vec![screen.id, camera.id]);
    assert_eq!(a.link("b").sender_count(), 0);
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
}
