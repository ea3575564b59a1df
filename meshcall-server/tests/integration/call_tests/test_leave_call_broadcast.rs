use meshcall_core::ServerMessage;

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{TestConnection, ids};

#[tokio::test]
async fn test_leave_call_broadcast() {
    init_tracing();

    let relay = create_test_relay();
    let mut p1 = TestConnection::connect(&relay, "1").await.unwrap();
    let mut p2 = TestConnection::connect(&relay, "2").await.unwrap();
    let mut p3 = TestConnection::connect(&relay, "3").await.unwrap();
    for p in [&p1, &p2, &p3] {
        p.join_meeting("R");
    }

    p1.join_call("R");
    p2.join_call("R");
    p1.drain().await;
    p2.drain().await;
    p3.drain().await;

    p1.leave_call("R");

    let left = ServerMessage::ParticipantLeftCall {
        participant_id: "1".into(),
    };
    assert_eq!(p2.recv().await.unwrap(), left);
    assert_eq!(p3.recv().await.unwrap(), left);
    p1.expect_silence().await.unwrap();

    // Future joiners no longer see the leaver.
    p3.join_call("R");
    assert_eq!(ids(&p3.recv_users_in_call().await.unwrap()), vec!["2"]);

    // Leaving twice does not announce twice.
    p1.leave_call("R");
    p2.drain().await;
    p2.expect_silence().await.unwrap();
}
