//! Secured-mode handshake scenarios against a scripted host.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{client_phase, serve_handshake, Peer, SrpHost};
use tokio::sync::mpsc;
use zkmq_client::{pair, Client, ClientConfig, Message, SendError};
use zkmq_wire::{control_frame, ClientPhase, ServerPhase};

fn config() -> ClientConfig {
    ClientConfig::new("tcp://127.0.0.1:5700")
        .with_credentials("alice", "s3cret")
        .with_heart_beat_ms(1_000)
}

#[tokio::test]
async fn successful_handshake_opens_the_gate() {
    let (socket, peer_socket) = pair();
    let mut peer = Peer::new(peer_socket);
    let client = Client::with_socket(config(), Box::new(socket));

    let established = Arc::new(AtomicUsize::new(0));
    let seen = established.clone();
    client.on_protocol_established(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let host_task = tokio::spawn(async move {
        let mut host = SrpHost::new("alice", "s3cret");
        serve_handshake(&mut peer, &mut host).await;
        (peer, host)
    });

    assert!(client.secure_connection(Some(Duration::from_millis(500))).await);
    assert!(client.can_send());
    assert_eq!(established.load(Ordering::SeqCst), 1);

    // a second call is a no-op on an established session
    assert!(client.secure_connection(Some(Duration::from_millis(10))).await);
    assert_eq!(established.load(Ordering::SeqCst), 1);

    host_task.await.unwrap();
}

#[tokio::test]
async fn application_frames_travel_sealed_both_ways() {
    let (socket, peer_socket) = pair();
    let mut peer = Peer::new(peer_socket);
    let client = Client::with_socket(config(), Box::new(socket));

    let (delivered_tx, mut delivered) = mpsc::unbounded_channel::<Message>();
    client.on_message_received(move |message| {
        delivered_tx.send(message.clone()).unwrap();
    });

    let host_task = tokio::spawn(async move {
        let mut host = SrpHost::new("alice", "s3cret");
        serve_handshake(&mut peer, &mut host).await;
        (peer, host)
    });
    assert!(client.secure_connection(Some(Duration::from_millis(500))).await);
    let (mut peer, host) = host_task.await.unwrap();
    let channel = host.channel();

    // client -> host: ciphertext on the wire, plaintext after the channel
    let payload = vec![Bytes::from_static(b"attack at dawn"), Bytes::from_static(b"x")];
    client.send(payload.clone()).await.unwrap();
    let sealed = peer.recv_non_heartbeat().await;
    assert_eq!(sealed.len(), payload.len());
    for (sealed_frame, plain) in sealed.iter().zip(&payload) {
        assert_ne!(sealed_frame, plain, "frames must not travel in the clear");
        assert_eq!(&channel.decrypt(sealed_frame).unwrap(), plain);
    }

    // host -> client: sealed frames come out decrypted and tagged
    let reply = vec![Bytes::from_static(b"acknowledged")];
    let sealed_reply = reply
        .iter()
        .map(|frame| channel.encrypt(frame).unwrap())
        .collect();
    peer.send(sealed_reply).await;

    let message = tokio::time::timeout(Duration::from_secs(2), delivered.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.frames, reply);
    assert_eq!(message.client_id, client.client_id());
}

#[tokio::test]
async fn host_rejection_is_terminal_for_the_session() {
    let (socket, peer_socket) = pair();
    let mut peer = Peer::new(peer_socket);
    let client = Client::with_socket(config(), Box::new(socket));

    let failed = Arc::new(AtomicUsize::new(0));
    let seen = failed.clone();
    client.on_protocol_failed(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let host_task = tokio::spawn(async move {
        let cm0 = peer.recv_non_heartbeat().await;
        assert!(client_phase(&cm0, ClientPhase::Initiation));
        peer.send(SrpHost::sm0()).await;

        let cm1 = peer.recv_non_heartbeat().await;
        assert!(client_phase(&cm1, ClientPhase::Handshake));
        peer.send(vec![control_frame(ServerPhase::Fail1 as u8), Bytes::new()])
            .await;
    });

    assert!(!client.secure_connection(Some(Duration::from_millis(500))).await);
    host_task.await.unwrap();

    assert_eq!(failed.load(Ordering::SeqCst), 1);
    assert!(!client.can_send());
    assert_eq!(
        client.send(vec![Bytes::from_static(b"x")]).await,
        Err(SendError::NotReady)
    );
}

#[tokio::test]
async fn malformed_reply_leaves_the_handshake_pending() {
    let (socket, peer_socket) = pair();
    let mut peer = Peer::new(peer_socket);
    let client = Client::with_socket(config(), Box::new(socket));

    let invalid = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let seen = invalid.clone();
    client.on_invalid_message(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let seen = failed.clone();
    client.on_protocol_failed(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let host_task = tokio::spawn(async move {
        let _cm0 = peer.recv_non_heartbeat().await;
        // five frames with an unknown phase octet: not a handshake reply
        peer.send(vec![
            Bytes::copy_from_slice(&[0x01, 0x06, 0xFF, 0x07]),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ])
        .await;
        peer
    });

    assert!(!client.secure_connection(Some(Duration::from_millis(300))).await);
    let _peer = host_task.await.unwrap();

    assert_eq!(invalid.load(Ordering::SeqCst), 1);
    assert_eq!(failed.load(Ordering::SeqCst), 0, "handshake stays pending");
    assert!(!client.can_send());
}

#[tokio::test]
async fn late_establishment_still_fires_the_event() {
    let (socket, peer_socket) = pair();
    let mut peer = Peer::new(peer_socket);
    let client = Client::with_socket(config(), Box::new(socket));

    let (established_tx, mut established) = mpsc::unbounded_channel::<()>();
    client.on_protocol_established(move || {
        established_tx.send(()).unwrap();
    });

    let host_task = tokio::spawn(async move {
        let mut host = SrpHost::new("alice", "s3cret");
        // answer only after the caller's wait window has expired
        tokio::time::sleep(Duration::from_millis(200)).await;
        serve_handshake(&mut peer, &mut host).await;
    });

    assert!(
        !client.secure_connection(Some(Duration::from_millis(50))).await,
        "window expires before the host answers"
    );

    host_task.await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), established.recv())
        .await
        .expect("exchange completes after the timeout")
        .unwrap();
    assert!(client.can_send());
}
