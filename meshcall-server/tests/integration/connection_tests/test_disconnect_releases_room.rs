use meshcall_core::{ParticipantId, RoomId};

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::TestConnection;

#[tokio::test]
async fn test_disconnect_releases_room() {
    init_tracing();

    let relay = create_test_relay();
    let alice = TestConnection::connect(&relay, "1").await.unwrap();
    alice.join_meeting("R");

    let snapshot = relay
        .room_snapshot(&RoomId::from("R"))
        .await
        .expect("room should exist");
    assert_eq!(snapshot.present, vec![ParticipantId::from("1")]);

    alice.disconnect();
    assert!(relay.registry().is_empty());
    assert_eq!(relay.registry().lookup(&"1".into()), None);

    // The actor retires asynchronously once its queue is drained.
    for _ in 0..50 {
        if !relay.rooms().contains(&RoomId::from("R")) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(!relay.rooms().contains(&RoomId::from("R")));
    assert_eq!(relay.rooms().room_count(), 0);
}

#[tokio::test]
async fn test_disconnect_before_join_is_harmless() {
    init_tracing();

    let relay = create_test_relay();
    let conn = TestConnection::connect(&relay, "1").await.unwrap();

    conn.disconnect();
    conn.disconnect();

    assert!(relay.registry().is_empty());
    assert_eq!(relay.rooms().room_count(), 0);
}
