//! Chat polling through the real service and session layer.

#![allow(clippy::unwrap_used)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use consultoria_client::{ChatService, ClientConfig, MemorySessionStore, SessionLayer, UserIdentity};
use consultoria_harness::{MockTransport, SimEnv};
use consultoria_proto::{
    Action, ChatAction, Response, SessionId,
    payloads::{
        auth::Role,
        chat::{ChatMessage, ChatMessages},
    },
};

const INTERVAL: Duration = Duration::from_secs(3);

/// Replies to GET_MESSAGES with the next scripted count; `None` is a refusal.
/// The last entry repeats.
fn scripted_backend(script: Vec<Option<usize>>) -> MockTransport {
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    MockTransport::with_responder(move |request| {
        let Action::Chat(ChatAction::GetMessages { project_id, .. }) = request.action else {
            return None;
        };
        let mut script = script.lock().unwrap();
        let step = if script.len() > 1 { script.pop_front() } else { script.front().copied() };

        let id = request.request_id.clone();
        Some(match step.flatten() {
            Some(count) => {
                let messages: Vec<ChatMessage> = (0..count as u64)
                    .map(|n| ChatMessage {
                        id: n + 1,
                        sender_id: 1,
                        sender_name: format!("p{project_id}"),
                        content: format!("m{n}"),
                        timestamp: "2024-05-01T10:00:00".into(),
                    })
                    .collect();
                let data = ChatMessages { total_messages: messages.len(), messages };
                Response::success(id, "messages retrieved", &data).unwrap()
            },
            None => Response::failure(id, "temporarily unavailable"),
        })
    })
}

fn chat_over(transport: &MockTransport) -> Arc<ChatService<MockTransport, SimEnv>> {
    let layer = Arc::new(SessionLayer::new(
        transport.clone(),
        SimEnv::with_seed(3),
        ClientConfig::default(),
        Arc::new(MemorySessionStore::new()),
    ));
    let user =
        UserIdentity { user_id: 42, name: "Ana".into(), role: Role::Consultant, email: None };
    layer.establish_session(SessionId::new("s1"), user).unwrap();
    Arc::new(ChatService::new(layer))
}

fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl FnMut(Vec<ChatMessage>) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |messages: Vec<ChatMessage>| sink.lock().unwrap().push(messages.len()))
}

#[tokio::test(start_paused = true)]
async fn callback_reports_each_count_change_once() {
    let transport = scripted_backend(vec![Some(2), Some(2), Some(3), Some(3), Some(5)]);
    let chat = chat_over(&transport);
    let (seen, callback) = recorder();

    let handle = Arc::clone(&chat).start_polling(7, 42, INTERVAL, callback);
    tokio::time::sleep(INTERVAL * 4 + Duration::from_millis(500)).await;

    assert_eq!(transport.send_calls(), 5);
    assert_eq!(*seen.lock().unwrap(), vec![3, 5]);
    assert_eq!(handle.last_count(), Some(5));

    let requests = transport.sent_requests();
    assert!(requests.iter().all(|r| r.session_id.as_ref().map(SessionId::as_str) == Some("s1")));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_final() {
    let transport = scripted_backend(vec![Some(1), Some(2), Some(3)]);
    let chat = chat_over(&transport);
    let (seen, callback) = recorder();

    let handle = Arc::clone(&chat).start_polling(7, 42, INTERVAL, callback);
    tokio::time::sleep(INTERVAL + Duration::from_millis(500)).await;
    assert_eq!(transport.send_calls(), 2);

    handle.stop();
    handle.stop();
    assert!(handle.is_stopped());

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(transport.send_calls(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn refusals_are_skipped_without_resetting_the_baseline() {
    let transport = scripted_backend(vec![Some(4), None, None, Some(4), Some(6)]);
    let chat = chat_over(&transport);
    let (seen, callback) = recorder();

    let _handle = Arc::clone(&chat).start_polling(7, 42, INTERVAL, callback);
    tokio::time::sleep(INTERVAL * 4 + Duration::from_millis(500)).await;

    assert_eq!(transport.send_calls(), 5);
    assert_eq!(*seen.lock().unwrap(), vec![6]);
}

#[tokio::test(start_paused = true)]
async fn polling_survives_a_dropped_connection() {
    let transport = scripted_backend(vec![Some(1), Some(1), Some(2)]);
    let chat = chat_over(&transport);
    let (seen, callback) = recorder();

    let _handle = Arc::clone(&chat).start_polling(7, 42, INTERVAL, callback);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.connect_calls(), 1);

    transport.close("connection reset").await;
    tokio::time::sleep(INTERVAL * 2).await;

    assert_eq!(transport.connect_calls(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}
