//! Integration tests for the match authority task
//!
//! These drive a real MatchTask through its mailbox and timers under a
//! paused tokio clock, observing only what a connected client would see.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

use arena_server::config::MatchRules;
use arena_server::game::r#match::{Admission, AdmissionError, MatchHandle, MatchPhase, MatchTask};
use arena_server::game::spawn::SpawnSelector;
use arena_server::game::Vec2;
use arena_server::ws::protocol::ServerMsg;

fn start_match() -> MatchHandle {
    let spawner = SpawnSelector::new(
        vec![Vec2::new(-3.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(3.0, 0.0)],
        7,
    )
    .expect("spawn points configured");
    let (task, handle) = MatchTask::new(MatchRules::default(), spawner);
    tokio::spawn(task.run());
    handle
}

async fn admit(handle: &MatchHandle, name: &str) -> Admission {
    handle
        .connect(Uuid::new_v4(), name.to_string(), 0)
        .await
        .expect("admission approved")
}

/// Read events until the predicate matches, failing on (virtual) timeout
async fn wait_for<F>(rx: &mut broadcast::Receiver<ServerMsg>, mut pred: F) -> ServerMsg
where
    F: FnMut(&ServerMsg) -> bool,
{
    timeout(Duration::from_secs(120), async {
        loop {
            match rx.recv().await {
                Ok(msg) if pred(&msg) => return msg,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("expected event before timeout")
}

fn is_state_change(msg: &ServerMsg, expected: MatchPhase) -> bool {
    matches!(msg, ServerMsg::MatchStateChanged { state } if *state == expected)
}

#[tokio::test(start_paused = true)]
async fn two_admissions_play_through_to_finish_and_rematch() {
    let handle = start_match();
    let mut rx = handle.subscribe();

    let alice = admit(&handle, "alice").await;
    assert_eq!(alice.state, MatchPhase::Lobby);

    let bob = admit(&handle, "bob").await;
    assert_eq!(bob.state, MatchPhase::Waiting);
    assert_eq!(handle.phase(), MatchPhase::Waiting);

    // Countdown entry broadcasts the full timer value
    wait_for(&mut rx, |m| {
        matches!(m, ServerMsg::CountdownTick { seconds: 10 })
    })
    .await;

    // The countdown task drains under the paused clock
    wait_for(&mut rx, |m| is_state_change(m, MatchPhase::Game)).await;
    for player in handle.roster() {
        assert_eq!(player.health, 6);
        assert_eq!(player.kills, 0);
    }

    // Three kills: six hits each under default health
    for _ in 0..3 {
        for _ in 0..6 {
            handle.report_hit(alice.player_id, bob.player_id).await;
        }
        wait_for(&mut rx, |m| {
            matches!(m, ServerMsg::Respawned { player_id, .. } if *player_id == bob.player_id)
        })
        .await;
    }

    let winner = wait_for(&mut rx, |m| {
        matches!(m, ServerMsg::WinnerAnnounced { .. })
    })
    .await;
    match winner {
        ServerMsg::WinnerAnnounced { player_id, name } => {
            assert_eq!(player_id, alice.player_id);
            assert_eq!(name, "alice");
        }
        _ => unreachable!(),
    }
    assert_eq!(handle.phase(), MatchPhase::Finish);

    // After the finish delay everyone is reset and a rematch countdown starts
    let reset = wait_for(&mut rx, |m| matches!(m, ServerMsg::RosterReset { .. })).await;
    match reset {
        ServerMsg::RosterReset { players } => {
            assert_eq!(players.len(), 2);
            for entry in players {
                assert_eq!(entry.player.kills, 0);
                assert_eq!(entry.player.health, 6);
            }
        }
        _ => unreachable!(),
    }
    wait_for(&mut rx, |m| is_state_change(m, MatchPhase::Waiting)).await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_countdown_forces_lobby_not_game() {
    let handle = start_match();
    let mut rx = handle.subscribe();

    let alice = admit(&handle, "alice").await;
    let bob = admit(&handle, "bob").await;
    assert_eq!(handle.phase(), MatchPhase::Waiting);

    // Let the countdown run partway down
    wait_for(&mut rx, |m| {
        matches!(m, ServerMsg::CountdownTick { seconds: 5 })
    })
    .await;

    handle.disconnect(bob.player_id).await;
    wait_for(&mut rx, |m| is_state_change(m, MatchPhase::Lobby)).await;

    let roster = handle.roster();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, alice.player_id);
    assert_eq!(roster[0].health, 6);
    assert_eq!(roster[0].kills, 0);

    // The cancelled countdown instance must never finish the transition to
    // Game; drain events across a generous virtual window
    let outcome = timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Ok(msg) if is_state_change(&msg, MatchPhase::Game) => return msg,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await;
    assert!(outcome.is_err(), "stale countdown reached Game after cancel");
    assert_eq!(handle.phase(), MatchPhase::Lobby);
}

#[tokio::test(start_paused = true)]
async fn fifth_admission_is_rejected_at_capacity() {
    let handle = start_match();

    for i in 0..4 {
        admit(&handle, &format!("p{}", i)).await;
    }
    assert_eq!(handle.player_count(), 4);

    let verdict = handle
        .connect(Uuid::new_v4(), "latecomer".to_string(), 0)
        .await;
    assert_eq!(verdict.unwrap_err(), AdmissionError::MatchFull);
    assert_eq!(handle.player_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn session_requests_apply_in_submission_order() {
    let handle = start_match();
    let mut rx = handle.subscribe();

    let alice = admit(&handle, "alice").await;

    use arena_server::ws::protocol::ClientMsg;
    for name in ["one", "two", "three"] {
        handle
            .intent(
                alice.player_id,
                ClientMsg::SetDisplayName {
                    name: name.to_string(),
                },
            )
            .await;
    }

    let mut seen = Vec::new();
    while seen.len() < 3 {
        if let ServerMsg::NameChanged { name, .. } =
            wait_for(&mut rx, |m| matches!(m, ServerMsg::NameChanged { .. })).await
        {
            seen.push(name);
        }
    }
    assert_eq!(seen, ["one", "two", "three"]);

    let roster = handle.roster();
    assert_eq!(roster[0].display_name, "three");
}
