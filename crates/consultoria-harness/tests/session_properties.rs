//! Session layer and action service properties over a scripted transport.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use consultoria_client::{
    AuthService, AuthSession, ChatService, ClientConfig, ConnectionState, MemorySessionStore,
    ProfileService, SessionError, SessionLayer, SessionStore, StoreError, Transport, UserIdentity,
};
use consultoria_harness::{MockTransport, SimEnv};
use consultoria_proto::{
    Action, AuthAction, ChatAction, ErrorCode, Request, Response, SessionId,
    payloads::{
        auth::{AuthData, Role},
        profile::Profile,
    },
};
use proptest::prelude::*;

type Layer = SessionLayer<MockTransport, SimEnv>;

fn layer_over(transport: MockTransport, store: Arc<MemorySessionStore>) -> Arc<Layer> {
    let config = ClientConfig::default().with_request_timeout(Duration::from_secs(5));
    Arc::new(SessionLayer::new(transport, SimEnv::with_seed(1), config, store))
}

fn chat_content(request: &Request) -> String {
    match &request.action {
        Action::Chat(ChatAction::Send { content, .. }) => content.clone(),
        other => panic!("unexpected action {other:?}"),
    }
}

fn send(content: &str) -> Action {
    ChatAction::Send { project_id: 7, user_id: 42, content: content.into() }.into()
}

/// Backend stand-in: Ana (42) logs in as session "s1"; project 7 does not
/// exist; LOGOUT is never answered.
fn ana_backend(request: &Request) -> Option<Response> {
    let id = request.request_id.clone();
    match &request.action {
        Action::Auth(AuthAction::Login { email, password }) => {
            if email == "ana@x.com" && password == "pw123456" {
                let data = AuthData {
                    session_id: SessionId::new("s1"),
                    user_id: 42,
                    name: "Ana".into(),
                    role: Role::Consultant,
                    email: Some(email.clone()),
                };
                Response::success(id, "login successful", &data).ok()
            } else {
                Some(Response::failure(id, "invalid email or password"))
            }
        },
        Action::Auth(AuthAction::Logout) => None,
        Action::Chat(ChatAction::Send { project_id: 7, .. }) => {
            Some(Response::failure(id, "project not found").with_error_code(ErrorCode::NotFound))
        },
        Action::Profile(_) if request.session_id.as_ref().map(SessionId::as_str) == Some("s1") => {
            let profile = Profile {
                user_id: 42,
                name: "Ana".into(),
                email: "ana@x.com".into(),
                role: Role::Consultant,
                bio: None,
                phone: None,
                photo_url: None,
            };
            Response::success(id, "profile retrieved", &profile).ok()
        },
        _ => Some(
            Response::failure(id, "invalid or expired session")
                .with_error_code(ErrorCode::SessionInvalid),
        ),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn responses_reach_their_callers_in_any_order(
        order in (1usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let transport = MockTransport::new();
            let layer = layer_over(transport.clone(), Arc::new(MemorySessionStore::new()));
            let n = order.len();

            let callers: Vec<_> = (0..n)
                .map(|i| {
                    let layer = Arc::clone(&layer);
                    tokio::spawn(async move { (i, layer.send(send(&i.to_string())).await) })
                })
                .collect();

            let sent = transport.wait_for_requests(n).await;
            for &k in &order {
                let request = &sent[k];
                let reply = Response::ok(request.request_id.clone(), chat_content(request));
                assert!(transport.respond(&reply).await);
            }

            for caller in callers {
                let (i, result) = caller.await.unwrap();
                assert_eq!(result.unwrap().message, Some(i.to_string()));
            }
            assert_eq!(layer.pending_requests(), 0);
            assert_eq!(layer.discarded_frames(), 0);
        });
    }
}

#[tokio::test]
async fn disconnect_fails_every_pending_request() {
    let transport = MockTransport::new();
    let layer = layer_over(transport.clone(), Arc::new(MemorySessionStore::new()));

    let callers: Vec<_> = (0..5)
        .map(|i| {
            let layer = Arc::clone(&layer);
            tokio::spawn(async move { layer.send(send(&format!("m{i}"))).await })
        })
        .collect();
    transport.wait_for_requests(5).await;
    assert_eq!(layer.pending_requests(), 5);

    layer.disconnect().await;

    for caller in callers {
        assert!(matches!(caller.await.unwrap(), Err(SessionError::Connection(_))));
    }
    assert_eq!(layer.pending_requests(), 0);
    assert_eq!(layer.state(), ConnectionState::Disconnected);

    // The next request reconnects lazily.
    transport.set_responder(|request| Some(Response::ok(request.request_id.clone(), "ok")));
    assert!(layer.send(send("again")).await.unwrap().success);
    assert_eq!(transport.connect_calls(), 2);
}

#[tokio::test]
async fn peer_close_fails_pending_and_late_replies_are_discarded() {
    let transport = MockTransport::new();
    let layer = layer_over(transport.clone(), Arc::new(MemorySessionStore::new()));

    let caller = {
        let layer = Arc::clone(&layer);
        tokio::spawn(async move { layer.send(send("lost")).await })
    };
    let sent = transport.wait_for_requests(1).await;

    transport.close("connection reset by peer").await;
    let err = caller.await.unwrap().unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("connection reset by peer"));

    // The reply can no longer be delivered on the old connection.
    assert!(!transport.respond(&Response::ok(sent[0].request_id.clone(), "late")).await);
}

#[tokio::test]
async fn chat_without_session_never_touches_the_transport() {
    let transport = MockTransport::new();
    let layer = layer_over(transport.clone(), Arc::new(MemorySessionStore::new()));
    let chat = ChatService::new(layer);

    assert!(matches!(chat.get_messages(7, 42).await, Err(SessionError::NotAuthenticated)));
    assert!(matches!(chat.send_message(7, 42, "oi").await, Err(SessionError::NotAuthenticated)));
    assert!(matches!(
        chat.get_projects_with_chat(42).await,
        Err(SessionError::NotAuthenticated)
    ));

    assert_eq!(transport.connect_calls(), 0);
    assert_eq!(transport.send_calls(), 0);
}

#[tokio::test]
async fn login_then_chat_to_missing_project() {
    let transport = MockTransport::with_responder(ana_backend);
    let store = Arc::new(MemorySessionStore::new());
    let layer = layer_over(transport.clone(), Arc::clone(&store));
    let auth = AuthService::new(Arc::clone(&layer));
    let chat = ChatService::new(Arc::clone(&layer));

    let session = auth.login("ana@x.com", "pw123456").await.unwrap();
    assert_eq!(session.session_id.as_str(), "s1");
    assert_eq!(session.user.user_id, 42);
    assert_eq!(store.load().unwrap(), Some(session.clone()));

    let err = chat.send_message(7, 42, "oi").await.unwrap_err();
    assert!(matches!(&err, SessionError::Rejected { message } if message == "project not found"));
    assert_eq!(err.to_string(), "project not found");

    let sent = transport.sent_requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].session_id, None);
    assert_eq!(sent[1].session_id.as_ref().map(SessionId::as_str), Some("s1"));
    assert_eq!(sent[1].action, send("oi"));
    assert_ne!(sent[0].request_id, sent[1].request_id);

    // A refused call does not end the session.
    assert!(auth.is_authenticated());
}

#[tokio::test]
async fn refused_login_leaves_no_session() {
    let transport = MockTransport::with_responder(ana_backend);
    let store = Arc::new(MemorySessionStore::new());
    let auth = AuthService::new(layer_over(transport, Arc::clone(&store)));

    let err = auth.login("ana@x.com", "wrong").await.unwrap_err();
    match err {
        SessionError::Authentication { message } => {
            assert_eq!(message, "invalid email or password");
        },
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert!(!auth.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

/// Store that reads fine but can never be cleared.
struct ReadOnlyStore;

impl SessionStore for ReadOnlyStore {
    fn load(&self) -> Result<Option<AuthSession>, StoreError> {
        Ok(None)
    }

    fn save(&self, _session: &AuthSession) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Io("read-only file system".into()))
    }
}

#[tokio::test]
async fn refused_login_keeps_server_message_when_store_cannot_clear() {
    let transport = MockTransport::with_responder(ana_backend);
    let config = ClientConfig::default().with_request_timeout(Duration::from_secs(5));
    let store = Arc::new(ReadOnlyStore);
    let auth = AuthService::new(Arc::new(SessionLayer::new(
        transport,
        SimEnv::with_seed(1),
        config,
        store,
    )));

    let err = auth.login("ana@x.com", "wrong").await.unwrap_err();

    let expected = SessionError::Authentication { message: "invalid email or password".into() };
    assert_eq!(err, expected);
    assert!(!auth.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn logout_clears_local_state_even_when_remote_logout_times_out() {
    let transport = MockTransport::with_responder(ana_backend);
    let store = Arc::new(MemorySessionStore::new());
    let layer = layer_over(transport.clone(), Arc::clone(&store));
    let auth = AuthService::new(Arc::clone(&layer));

    auth.login("ana@x.com", "pw123456").await.unwrap();
    assert!(store.load().unwrap().is_some());

    auth.logout().await.unwrap();

    assert!(!auth.is_authenticated());
    assert_eq!(auth.current_user(), None);
    assert_eq!(store.load().unwrap(), None);
    assert!(!transport.is_connected());
    assert_eq!(layer.state(), ConnectionState::Disconnected);

    let logout = transport.sent_requests().pop().unwrap();
    assert_eq!(logout.action, Action::from(AuthAction::Logout));
    assert_eq!(logout.session_id.as_ref().map(SessionId::as_str), Some("s1"));
}

#[tokio::test]
async fn rejected_session_token_is_discarded() {
    let transport = MockTransport::with_responder(ana_backend);
    let expired = AuthSession {
        session_id: SessionId::new("expired"),
        user: UserIdentity {
            user_id: 42,
            name: "Ana".into(),
            role: Role::Consultant,
            email: None,
        },
        authenticated_at: 1_600_000_000,
    };
    let store = Arc::new(MemorySessionStore::with_session(expired));
    let layer = layer_over(transport, Arc::clone(&store));
    let profile = ProfileService::new(Arc::clone(&layer));

    // Resumed from the store, then rejected by the server.
    assert_eq!(layer.session_id().map(|id| id.as_str().to_string()), Some("expired".into()));
    assert!(matches!(profile.get(None).await, Err(SessionError::NotAuthenticated)));

    assert_eq!(layer.session_id(), None);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn unreachable_server_is_transient_and_recoverable() {
    let transport = MockTransport::with_responder(ana_backend);
    transport.set_fail_connect(true);
    let layer = layer_over(transport.clone(), Arc::new(MemorySessionStore::new()));
    let auth = AuthService::new(Arc::clone(&layer));

    let err = auth.login("ana@x.com", "pw123456").await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert!(err.is_transient());
    assert_eq!(transport.send_calls(), 0);

    transport.set_fail_connect(false);
    assert!(auth.login("ana@x.com", "pw123456").await.is_ok());
    assert_eq!(transport.connect_calls(), 2);
}

#[tokio::test]
async fn profile_reads_with_the_current_session() {
    let transport = MockTransport::with_responder(ana_backend);
    let layer = layer_over(transport, Arc::new(MemorySessionStore::new()));
    AuthService::new(Arc::clone(&layer)).login("ana@x.com", "pw123456").await.unwrap();

    let profile = ProfileService::new(layer).get(None).await.unwrap();
    assert_eq!(profile.user_id, 42);
    assert_eq!(profile.name, "Ana");
}
