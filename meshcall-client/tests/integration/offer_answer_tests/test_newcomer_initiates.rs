use meshcall_client::{EngineEvent, NegotiationState};
use meshcall_core::{ClientMessage, ParticipantId, ServerMessage, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::mock_session::SessionCall;
use crate::utils::test_peer::{TestPeer, deliver, exchange};

#[tokio::test]
async fn test_newcomer_initiates() {
    init_tracing();

    let mut a = TestPeer::new("a");
    let mut b = TestPeer::new("b");

    a.enter_call(&[]).await;
    a.sees_join("b").await;
    assert!(a.engine.link(&ParticipantId::from("b")).is_none());
    assert!(
        a.sent()
            .iter()
            .all(|m| !matches!(m, ClientMessage::Offer { .. }))
    );

    b.enter_call(&["a"]).await;
    let sent = b.sent();
    assert!(matches!(
        &sent[..],
        [ClientMessage::JoinCall { .. }, ClientMessage::Offer { to_participant_id, .. }]
            if to_participant_id.as_str() == "a"
    ));
    assert_eq!(b.link("a").state(), NegotiationState::HaveLocalOffer);
    assert!(b.link("a").is_negotiating());

    deliver(&b.id, sent, &mut a).await;
    assert_eq!(a.link("b").state(), NegotiationState::Stable);

    exchange(&mut a, &mut b).await;

    let link = b.link("a");
    assert_eq!(link.state(), NegotiationState::Stable);
    assert!(!link.is_negotiating());
    assert!(link.is_established());

    let offerer_side = b.session("a").state().negotiated.clone();
    let answerer_side = a.session("b").state().negotiated.clone();
    assert!(offerer_side.is_some());
    assert_eq!(offerer_side, answerer_side);
    assert_eq!(a.session("b").state().count(&SessionCall::CreateOffer), 0);

    assert_eq!(
        a.engine_events(),
        vec![EngineEvent::PeerLinkEstablished {
            participant_id: "b".into()
        }]
    );
    assert_eq!(
        b.engine_events(),
        vec![EngineEvent::PeerLinkEstablished {
            participant_id: "a".into()
        }]
    );
}

#[tokio::test]
async fn test_offer_outside_call_is_ignored() {
    init_tracing();

    let mut c = TestPeer::new("c");
    c.engine
        .handle_server_message(ServerMessage::Offer {
            from_participant_id: "a".into(),
            description: SessionDescription::offer("v=0"),
        })
        .await;

    assert!(c.engine.link(&ParticipantId::from("a")).is_none());
    assert_eq!(c.factory.session_count("a"), 0);
    assert!(c.sent().is_empty());
}

#[tokio::test]
async fn test_offer_from_unannounced_member_is_answered() {
    init_tracing();

    let mut a = TestPeer::new("a");
    let mut b = TestPeer::new("b");
    a.enter_call(&[]).await;
    b.enter_call(&["a"]).await;

    // The offer overtakes participantJoinedCall.
    exchange(&mut a, &mut b).await;

    assert_eq!(a.engine.call_members(), vec![ParticipantId::from("b")]);
    assert_eq!(a.link("b").state(), NegotiationState::Stable);
}
