//! Client and server together over turmoil's simulated network.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use consultoria_client::{
    AuthService, ChatService, ClientConfig, ConnectionState, ProfileService, SessionError,
};
use consultoria_harness::{SIM_PORT, host_server, sim_layer};
use consultoria_proto::payloads::{auth::Role, chat::ChatMessage, profile::ProfileUpdate};
use consultoria_server::Directory;
use tokio::{io::AsyncReadExt, sync::mpsc};
use turmoil::net::TcpListener;

fn server_config() -> ClientConfig {
    ClientConfig::new(format!("server:{SIM_PORT}"))
}

fn sim() -> turmoil::Sim<'static> {
    turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(Duration::from_millis(40))
        .build()
}

#[test]
fn consultant_session_lifecycle() {
    let mut sim = sim();
    host_server(&mut sim, "server", Directory::with_demo_data());

    sim.client("ana", async {
        let layer = sim_layer(server_config(), 1);
        let auth = AuthService::new(Arc::clone(&layer));
        let chat = ChatService::new(Arc::clone(&layer));
        let profile = ProfileService::new(Arc::clone(&layer));

        let session = auth.login("ana@x.com", "pw123456").await?;
        let me = session.user.user_id;
        assert_eq!(session.user.role, Role::Consultant);

        let projects = chat.get_projects_with_chat(me).await?;
        assert_eq!(projects.total_projects, 1);
        let project = &projects.projects[0];
        assert_eq!(project.other_party_name, "Empresa Acme");

        let sent = chat.send_message(project.project_id, me, "oi").await?;
        assert_eq!(sent.sender_name, "Ana");

        let err = chat.send_message(99, me, "oi").await.unwrap_err();
        assert_eq!(err.to_string(), "project not found");

        let updated = profile
            .update(ProfileUpdate { bio: Some("Cloud architect".into()), ..Default::default() })
            .await?;
        assert_eq!(updated.bio.as_deref(), Some("Cloud architect"));

        let photo = profile.upload_photo("me.png", b"\x89PNG...").await?;
        assert!(photo.photo_url.ends_with(".png"));
        assert_eq!(profile.get(None).await?.photo_url, Some(photo.photo_url));

        auth.logout().await?;
        assert_eq!(layer.state(), ConnectionState::Disconnected);
        assert!(matches!(
            chat.get_messages(project.project_id, me).await,
            Err(SessionError::NotAuthenticated)
        ));

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn registration_and_duplicate_email() {
    let mut sim = sim();
    host_server(&mut sim, "server", Directory::with_demo_data());

    sim.client("newcomer", async {
        let layer = sim_layer(server_config(), 2);
        let auth = AuthService::new(Arc::clone(&layer));

        let taken = auth.register("Ana Clone", "ana@x.com", "secret99", Role::Consultant).await;
        match taken {
            Err(SessionError::Authentication { message }) => {
                assert_eq!(message, "email already registered");
            },
            other => panic!("expected refusal, got {other:?}"),
        }
        assert!(!auth.is_authenticated());

        let session = auth.register("Bia", "bia@x.com", "secret99", Role::Consultant).await?;
        assert_eq!(auth.current_user(), Some(session.user.clone()));

        // No project yet, so no chat.
        let chat = ChatService::new(layer);
        assert_eq!(chat.get_projects_with_chat(session.user.user_id).await?.total_projects, 0);

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn company_sees_consultant_messages_by_polling() {
    let mut sim = sim();
    host_server(&mut sim, "server", Directory::with_demo_data());

    sim.client("acme", async {
        let layer = sim_layer(server_config(), 3);
        let session = AuthService::new(Arc::clone(&layer))
            .login("contato@acme.com", "acme1234")
            .await?;
        let chat = Arc::new(ChatService::new(layer));

        let (counts_tx, mut counts_rx) = mpsc::unbounded_channel();
        let on_change = move |messages: Vec<ChatMessage>| {
            let _ = counts_tx.send(messages.len());
        };
        let handle = Arc::clone(&chat).start_polling(
            1,
            session.user.user_id,
            Duration::from_secs(1),
            on_change,
        );

        let mut seen = Vec::new();
        while seen.last() != Some(&3) {
            let count = tokio::time::timeout(Duration::from_secs(30), counts_rx.recv())
                .await?
                .expect("polling ended early");
            seen.push(count);
        }
        handle.stop();

        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "counts went backwards: {seen:?}");
        Ok(())
    });

    sim.client("ana", async {
        let layer = sim_layer(server_config(), 4);
        let session = AuthService::new(Arc::clone(&layer)).login("ana@x.com", "pw123456").await?;
        let chat = ChatService::new(layer);

        tokio::time::sleep(Duration::from_secs(3)).await;
        for text in ["first", "second", "third"] {
            chat.send_message(1, session.user.user_id, text).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn silent_server_times_out_without_leaking_pending_entries() {
    let mut sim = sim();

    sim.host("server", || async {
        let listener = TcpListener::bind(format!("0.0.0.0:{SIM_PORT}")).await?;
        let (mut stream, _) = listener.accept().await?;
        let mut sink = vec![0u8; 1024];
        while stream.read(&mut sink).await? > 0 {}
        Ok(())
    });

    sim.client("ana", async {
        let config = server_config().with_request_timeout(Duration::from_secs(2));
        let layer = sim_layer(config, 5);
        let auth = AuthService::new(Arc::clone(&layer));

        let err = auth.login("ana@x.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { elapsed } if elapsed.as_secs() == 2));
        assert!(err.is_transient());
        assert_eq!(layer.pending_requests(), 0);
        assert_eq!(layer.state(), ConnectionState::Connected);

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn nothing_listening_is_a_connection_error() {
    let mut sim = sim();

    // Host is up, port is closed.
    sim.host("server", || async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    });

    sim.client("ana", async {
        let config = server_config().with_connect_timeout(Duration::from_secs(1));
        let layer = sim_layer(config, 6);

        let err = AuthService::new(Arc::clone(&layer))
            .login("ana@x.com", "pw123456")
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert_eq!(layer.state(), ConnectionState::Disconnected);

        Ok(())
    });

    sim.run().expect("simulation failed");
}
