use meshcall_core::{ClientMessage, ServerMessage};
use meshcall_server::RelayError;

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::TestConnection;

#[tokio::test]
async fn test_join_call_requires_room() {
    init_tracing();

    let relay = create_test_relay();
    let conn = TestConnection::connect(&relay, "1").await.unwrap();

    let result = relay.handle_message(
        conn.connection_id,
        ClientMessage::JoinCall {
            room_id: "R".into(),
            participant_id: "1".into(),
            display_name: "x".into(),
        },
    );
    assert!(matches!(result, Err(RelayError::NotRegistered)));

    conn.join_meeting("R");
    let result = relay.handle_message(
        conn.connection_id,
        ClientMessage::JoinCall {
            room_id: "other".into(),
            participant_id: "1".into(),
            display_name: "x".into(),
        },
    );
    assert!(matches!(result, Err(RelayError::RoomMismatch { .. })));

    let result = relay.handle_message(
        conn.connection_id,
        ClientMessage::JoinCall {
            room_id: "R".into(),
            participant_id: "impostor".into(),
            display_name: "x".into(),
        },
    );
    assert!(matches!(result, Err(RelayError::IdentityMismatch { .. })));

    let snapshot = relay.room_snapshot(&"R".into()).await.unwrap();
    assert!(snapshot.in_call.is_empty());
}

#[tokio::test]
async fn test_switching_rooms_leaves_previous_call() {
    init_tracing();

    let relay = create_test_relay();
    let mut mover = TestConnection::connect(&relay, "1").await.unwrap();
    let mut stayer = TestConnection::connect(&relay, "2").await.unwrap();
    mover.join_meeting("A");
    stayer.join_meeting("A");
    mover.join_call("A");
    mover.recv_users_in_call().await.unwrap();
    stayer.drain().await;

    mover.join_meeting("B");

    assert_eq!(
        stayer.drain().await,
        vec![ServerMessage::ParticipantLeftCall {
            participant_id: "1".into()
        }]
    );
    let a = relay.room_snapshot(&"A".into()).await.unwrap();
    assert_eq!(a.present.len(), 1);
    let b = relay.room_snapshot(&"B".into()).await.unwrap();
    assert_eq!(b.present.len(), 1);
    mover.expect_silence().await.unwrap();
}
