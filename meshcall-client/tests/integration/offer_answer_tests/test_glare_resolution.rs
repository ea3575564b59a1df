use meshcall_client::{LocalTrack, LocalTrackSet, NegotiationState};
use meshcall_core::{ClientMessage, SdpType, TrackKind, TrackSource};

use crate::integration::init_tracing;
use crate::utils::mock_session::SessionCall;
use crate::utils::test_peer::{connected_pair, deliver, exchange};

fn camera_set() -> (LocalTrack, LocalTrackSet) {
    let camera = LocalTrack::new(TrackSource::Camera);
    let mut set = LocalTrackSet::new();
    set.set(camera);
    (camera, set)
}

#[tokio::test]
async fn test_glare_resolution() {
    init_tracing();

    // "a" < "b": a is the polite side.
    let (mut a, mut b) = connected_pair("a", "b").await;
    let (camera_a, tracks_a) = camera_set();
    let (camera_b, tracks_b) = camera_set();

    a.engine.on_local_track_set_changed(tracks_a).await;
    b.engine.on_local_track_set_changed(tracks_b).await;
    assert_eq!(a.link("b").state(), NegotiationState::HaveLocalOffer);
    assert_eq!(b.link("a").state(), NegotiationState::HaveLocalOffer);

    let from_a = a.sent();
    let from_b = b.sent();
    assert!(matches!(&from_a[..], [ClientMessage::Offer { .. }]));
    assert!(matches!(&from_b[..], [ClientMessage::Offer { .. }]));

    // Both offers cross on the wire.
    deliver(&a.id, from_a, &mut b).await;
    deliver(&b.id, from_b, &mut a).await;

    // The impolite side kept its offer.
    assert_eq!(b.link("a").state(), NegotiationState::HaveLocalOffer);
    assert_eq!(b.session("a").state().count(&SessionCall::Rollback), 0);
    // The polite side rolled back, answered and re-offered.
    assert_eq!(a.session("b").state().count(&SessionCall::Rollback), 1);
    assert_eq!(a.link("b").state(), NegotiationState::HaveLocalOffer);

    exchange(&mut a, &mut b).await;

    for (link, session) in [(a.link("b"), a.session("b")), (b.link("a"), b.session("a"))] {
        assert_eq!(link.state(), NegotiationState::Stable);
        assert!(!link.is_negotiating());
        assert_eq!(link.sender_count(), 1);
        assert_eq!(session.state().signaling, meshcall_client::SignalingState::Stable);
    }
    assert_eq!(a.link("b").sent_track(TrackKind::Video), Some(camera_a.id));
    assert_eq!(b.link("a").sent_track(TrackKind::Video), Some(camera_b.id));

    let a_view = a.session("b").state().negotiated.clone();
    let b_view = b.session("a").state().negotiated.clone();
    assert_eq!(a_view, b_view);

    // b applied only a's second offer; the colliding one never reached its session.
    assert_eq!(
        b.session("a").state().count(&SessionCall::SetRemote(SdpType::Offer)),
        1
    );
}

#[tokio::test]
async fn test_concurrent_triggers_collapse() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    let (_, with_camera) = camera_set();
    let mut with_microphone = with_camera.clone();
    with_microphone.set(LocalTrack::new(TrackSource::Microphone));

    a.engine.on_local_track_set_changed(with_camera).await;
    a.engine.on_local_track_set_changed(with_microphone).await;

    // One offer in flight, the second change waits for it.
    let sent = a.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(a.session("b").state().count(&SessionCall::CreateOffer), 1);

    deliver(&a.id, sent, &mut b).await;
    exchange(&mut a, &mut b).await;

    assert_eq!(a.session("b").state().count(&SessionCall::CreateOffer), 2);
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
    assert_eq!(a.link("b").sender_count(), 2);
}
