//! Engine actor tests: command channel, outbound channels, cleanup timer.

use std::time::Duration;

use hotseat_protocol::{
    ClientEvent, ConnectionId, Phase, PlayerId, QuestionDraft, RoomCode, RoomView, ServerEvent,
};
use hotseat_room::{EngineHandle, RoomConfig, RoomError, spawn_engine};
use tokio::sync::mpsc;

struct Client {
    conn: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    player: Option<PlayerId>,
}

async fn connect(engine: &EngineHandle, id: u64) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = ConnectionId::new(id);
    engine.connect(conn, tx).await.unwrap();
    Client {
        conn,
        rx,
        player: None,
    }
}

impl Client {
    /// Receives until `pick` accepts an event.
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(ServerEvent) -> Option<T>) -> T {
        loop {
            let event = self.rx.recv().await.expect("outbound channel closed");
            if let Some(found) = pick(event) {
                return found;
            }
        }
    }

    async fn ack(&mut self) -> RoomView {
        let ack = self
            .wait_for(|e| match e {
                ServerEvent::Ack(ack) => Some(ack),
                _ => None,
            })
            .await;
        assert!(ack.success, "ack failed: {:?}", ack.error);
        self.player = ack.player.map(|p| p.id);
        ack.room.unwrap()
    }

    fn id(&self) -> PlayerId {
        self.player.clone().unwrap()
    }
}

fn config() -> RoomConfig {
    RoomConfig {
        rng_seed: Some(5),
        ..RoomConfig::default()
    }
}

/// Three connected players in a waiting room; `clients[0]` hosts.
async fn lobby(engine: &EngineHandle) -> (RoomCode, Vec<Client>) {
    let mut host = connect(engine, 1).await;
    engine
        .dispatch(
            host.conn,
            Some(1),
            ClientEvent::CreateRoom {
                player_name: "Host".into(),
                rounds: 1,
                enable_guessing: true,
            },
        )
        .await
        .unwrap();
    let room = host.ack().await;
    assert!(room.enable_guessing);

    let mut clients = vec![host];
    for id in 2..=3 {
        let mut client = connect(engine, id).await;
        engine
            .dispatch(
                client.conn,
                Some(id),
                ClientEvent::JoinRoom {
                    room_code: room.code.clone(),
                    player_name: format!("P{id}"),
                },
            )
            .await
            .unwrap();
        client.ack().await;
        clients.push(client);
    }
    (room.code, clients)
}

async fn play_to_finish(engine: &EngineHandle, code: &RoomCode, clients: &mut [Client]) {
    engine
        .dispatch(
            clients[0].conn,
            None,
            ClientEvent::HostStartSubmissionState {
                room_code: code.clone(),
            },
        )
        .await
        .unwrap();

    for client in clients.iter_mut() {
        let room = client
            .wait_for(|e| match e {
                ServerEvent::SubmissionState { room } => Some(room),
                _ => None,
            })
            .await;
        let me = client.id();
        let questions = room
            .players
            .iter()
            .find(|p| p.id == me)
            .unwrap()
            .assigned_targets
            .iter()
            .map(|t| QuestionDraft {
                target_player_id: t.id.clone(),
                text: format!("about {}", t.name),
            })
            .collect();
        engine
            .dispatch(
                client.conn,
                None,
                ClientEvent::SubmitQuestions {
                    player_id: me,
                    room_code: code.clone(),
                    questions,
                },
            )
            .await
            .unwrap();
    }

    let host = &mut clients[0];
    host.wait_for(|e| matches!(e, ServerEvent::AllPlayersHaveSubmitted { .. }).then_some(()))
        .await;
    engine
        .dispatch(
            host.conn,
            None,
            ClientEvent::HostStartPlayingState {
                room_code: code.clone(),
            },
        )
        .await
        .unwrap();

    for _ in 0..3 {
        let turn = host
            .wait_for(|e| match e {
                ServerEvent::CurrentPlayerAndQuestion(turn) => Some(turn),
                _ => None,
            })
            .await;
        engine
            .dispatch(
                host.conn,
                None,
                ClientEvent::AnsweredQuestion {
                    room_code: code.clone(),
                    question_id: turn.question.id,
                },
            )
            .await
            .unwrap();
    }
    host.wait_for(|e| matches!(e, ServerEvent::FinishedState { .. }).then_some(()))
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_finished_room_is_deleted_after_cleanup_delay() {
    let engine = spawn_engine(config(), 64);
    let (code, mut clients) = lobby(&engine).await;
    play_to_finish(&engine, &code, &mut clients).await;

    let info = engine.room_info(code.clone()).await.unwrap().unwrap();
    assert_eq!(info.phase, Phase::Finished);
    assert_eq!(info.player_count, 3);

    tokio::time::sleep(Duration::from_secs(599)).await;
    assert_eq!(engine.room_count().await.unwrap(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.room_count().await.unwrap(), 0);
    assert!(engine.room_info(code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_room_info_reports_roster_and_phase() {
    let engine = spawn_engine(config(), 16);
    let (code, _clients) = lobby(&engine).await;

    let info = engine.room_info(code).await.unwrap().unwrap();
    assert_eq!(info.phase, Phase::Waiting);
    assert_eq!(info.player_count, 3);
    assert_eq!(info.max_players, 25);
    assert_eq!(info.rounds, 1);
}

#[tokio::test]
async fn test_disconnected_player_can_rejoin_on_new_connection() {
    let engine = spawn_engine(config(), 16);
    let (code, mut clients) = lobby(&engine).await;
    let guest = clients.remove(1);
    let guest_id = guest.id();
    engine.disconnect(guest.conn).await.unwrap();
    drop(guest);

    let mut back = connect(&engine, 40).await;
    engine
        .dispatch(
            back.conn,
            None,
            ClientEvent::RejoinRoom {
                player_id: guest_id.clone(),
                room_code: code.clone(),
            },
        )
        .await
        .unwrap();

    let roster = back
        .wait_for(|e| match e {
            ServerEvent::EmitAllPlayers { players } => Some(players),
            _ => None,
        })
        .await;
    assert_eq!(roster.len(), 3);
    assert!(roster.iter().any(|p| p.id == guest_id));
    assert_eq!(engine.room_info(code).await.unwrap().unwrap().player_count, 3);
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let engine = spawn_engine(config(), 4);
    engine.shutdown().await.unwrap();

    // Wait for the actor to drop its receiver.
    let mut result = engine.room_count().await;
    while result.is_ok() {
        tokio::task::yield_now().await;
        result = engine.room_count().await;
    }
    assert_eq!(result, Err(RoomError::Unavailable));
}
