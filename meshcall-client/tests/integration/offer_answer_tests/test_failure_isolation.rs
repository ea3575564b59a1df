use meshcall_client::{
    EngineConfig, EngineEvent, LinkLossReason, LocalTrack, LocalTrackSet, NegotiationState,
    SessionEventKind, SignalingState, TransportState,
};
use meshcall_core::{ParticipantId, SdpType, TrackSource};
use std::time::Duration;
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::mock_session::SessionCall;
use crate::utils::test_peer::{TestPeer, connected_pair, exchange, forward};

fn with_camera() -> LocalTrackSet {
    let mut set = LocalTrackSet::new();
    set.set(LocalTrack::new(TrackSource::Camera));
    set
}

#[tokio::test]
async fn test_description_failure_keeps_link() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    a.session("b").state().fail_remote_descriptions = true;

    a.engine.on_local_track_set_changed(with_camera()).await;
    forward(&mut a, &mut b).await;
    forward(&mut b, &mut a).await;

    let link = a.link("b");
    assert!(!link.is_negotiating());
    assert_eq!(link.signaling_state(), SignalingState::Stable);
    assert_eq!(a.session("b").state().count(&SessionCall::Rollback), 1);
    assert!(a.engine_events().is_empty());

    // The next round goes through once descriptions apply again.
    a.session("b").state().fail_remote_descriptions = false;
    a.engine.on_local_track_set_changed(LocalTrackSet::new()).await;
    exchange(&mut a, &mut b).await;
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
    assert_eq!(a.link("b").sender_count(), 0);
}

#[tokio::test]
async fn test_failed_remote_offer_keeps_link() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    b.session("a").state().fail_remote_descriptions = true;

    a.engine.on_local_track_set_changed(with_camera()).await;
    forward(&mut a, &mut b).await;

    assert!(b.engine.link(&ParticipantId::from("a")).is_some());
    assert!(b.engine_events().is_empty());
    assert_eq!(b.link("a").signaling_state(), SignalingState::Stable);
    // Nothing was answered.
    assert!(b.sent().is_empty());
}

#[tokio::test]
async fn test_failed_answer_returns_to_stable() {
    init_tracing();

    let (mut a, mut b) = connected_pair("a", "b").await;
    b.session("a").state().fail_answers = true;

    a.engine.on_local_track_set_changed(with_camera()).await;
    forward(&mut a, &mut b).await;

    let link = b.link("a");
    assert!(!link.is_negotiating());
    assert_eq!(link.signaling_state(), SignalingState::Stable);
    assert_eq!(b.session("a").state().count(&SessionCall::Rollback), 1);
    assert!(b.sent().is_empty());
    assert!(b.engine_events().is_empty());

    // b's own next change is offered instead of being deferred.
    b.session("a").state().fail_answers = false;
    let mut microphone = LocalTrackSet::new();
    microphone.set(LocalTrack::new(TrackSource::Microphone));
    b.engine.on_local_track_set_changed(microphone).await;
    assert!(b.link("a").is_negotiating());
    assert_eq!(
        b.session("a").state().count(&SessionCall::SetLocal(SdpType::Offer)),
        2
    );

    // a rolls its unanswered offer back, answers, then offers again.
    exchange(&mut a, &mut b).await;
    assert_eq!(a.session("b").state().count(&SessionCall::Rollback), 1);
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
    assert_eq!(b.link("a").state(), NegotiationState::Stable);
    assert_eq!(a.session("b").state().senders.len(), 1);
    assert_eq!(b.session("a").state().senders.len(), 1);
}

#[tokio::test]
async fn test_transport_failure_drops_only_that_link() {
    init_tracing();

    let (mut a, _b) = connected_pair("a", "b").await;
    a.session("b")
        .emit(SessionEventKind::TransportStateChanged(TransportState::Failed));
    a.engine.process_session_events().await;

    assert!(a.engine.link(&ParticipantId::from("b")).is_none());
    assert!(a.session("b").state().closed);
    assert_eq!(
        a.engine_events(),
        vec![EngineEvent::PeerLinkLost {
            participant_id: "b".into(),
            reason: LinkLossReason::TransportFailed,
        }]
    );
    // Membership is the relay's business.
    assert_eq!(a.engine.call_members(), vec![ParticipantId::from("b")]);
    assert!(a.engine.is_in_call());
}

#[tokio::test(start_paused = true)]
async fn test_answer_timeout_drops_link() {
    init_tracing();

    let config =
        EngineConfig::new("a", "user-a", "R").with_answer_timeout(Duration::from_secs(5));
    let mut a = TestPeer::with_config(config);
    a.enter_call(&["b"]).await;
    assert!(a.link("b").is_negotiating());

    tokio::time::advance(Duration::from_secs(3)).await;
    a.engine.check_timeouts(Instant::now()).await;
    assert!(a.engine.link(&ParticipantId::from("b")).is_some());

    tokio::time::advance(Duration::from_secs(3)).await;
    a.engine.check_timeouts(Instant::now()).await;
    assert!(a.engine.link(&ParticipantId::from("b")).is_none());
    assert!(a.session("b").state().closed);
    assert_eq!(
        a.engine_events(),
        vec![EngineEvent::PeerLinkLost {
            participant_id: "b".into(),
            reason: LinkLossReason::AnswerTimeout,
        }]
    );

    // Late events of the closed session go nowhere.
    a.session("b")
        .emit(SessionEventKind::TransportStateChanged(TransportState::Connected));
    a.engine.process_session_events().await;
    assert!(a.engine_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_answered_offer_never_times_out() {
    init_tracing();

    let (mut a, _b) = connected_pair("a", "b").await;

    tokio::time::advance(Duration::from_secs(60)).await;
    a.engine.check_timeouts(Instant::now()).await;

    assert!(a.engine.link(&ParticipantId::from("b")).is_some());
    assert!(a.engine_events().is_empty());
}
