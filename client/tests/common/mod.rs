//! Shared test support: an in-process peer speaking the host half of the
//! zero-knowledge exchange over an in-memory socket pair.

#![allow(dead_code)]

use bytes::Bytes;
use num_bigint::BigUint;
use zkmq_client::socket::{MessageSocket, PairSocket};
use zkmq_client::{zk, Role, SessionCrypto};
use zkmq_wire::{control_frame, heartbeat_frame, ClientPhase, ServerPhase, ACK, BEL, SOH};

/// Host end of the wire: strips and prepends the dealer addressing frame
/// the way the transport contract requires.
pub struct Peer {
    socket: PairSocket,
}

impl Peer {
    pub fn new(socket: PairSocket) -> Self {
        Self { socket }
    }

    /// Receive one message from the client, addressing frame stripped.
    pub async fn recv(&mut self) -> Vec<Bytes> {
        let mut frames = self.socket.recv().await.expect("client end open");
        assert!(!frames.is_empty(), "wire message must carry frames");
        assert!(frames[0].is_empty(), "client prepends an empty frame");
        frames.remove(0);
        frames
    }

    /// Receive, skipping any heartbeat messages.
    pub async fn recv_non_heartbeat(&mut self) -> Vec<Bytes> {
        loop {
            let frames = self.recv().await;
            if frames.first().map(|f| f.as_ref()) != Some(&zkmq_wire::HEARTBEAT[..]) {
                return frames;
            }
        }
    }

    /// Send frames to the client behind a leading addressing frame.
    pub async fn send(&mut self, frames: Vec<Bytes>) {
        let mut wire = vec![Bytes::new()];
        wire.extend(frames);
        self.socket.send(wire).await.expect("client end open");
    }

    pub async fn send_heartbeat(&mut self) {
        self.send(vec![heartbeat_frame()]).await;
    }
}

pub fn client_phase(frames: &[Bytes], phase: ClientPhase) -> bool {
    frames.first().map(|head| {
        head.len() == 4 && head[0] == SOH && head[1] == ACK && head[2] == phase as u8 && head[3] == BEL
    }) == Some(true)
}

/// Host half of the SRP exchange, computed the verifier way:
/// v = g^x, B = k*v + g^b, S = (A * v^u)^b.
pub struct SrpHost {
    salt: Vec<u8>,
    verifier: BigUint,
    secret: BigUint,
    pub public: BigUint,
    client_public: Option<BigUint>,
    pub key: Option<[u8; 32]>,
}

impl SrpHost {
    pub fn new(identity: &str, password: &str) -> Self {
        let salt = vec![0xA5; 16];
        let x = zk::private_key(identity, password, &salt);
        let verifier = zk::group_generator().modpow(&x, zk::group_prime());
        let ephemeral = zk::generate_ephemeral();
        let public = (zk::multiplier() * &verifier
            + zk::group_generator().modpow(&ephemeral.secret, zk::group_prime()))
            % zk::group_prime();
        Self {
            salt,
            verifier,
            secret: ephemeral.secret,
            public,
            client_public: None,
            key: None,
        }
    }

    pub fn sm0() -> Vec<Bytes> {
        vec![control_frame(ServerPhase::Step0 as u8), Bytes::new()]
    }

    pub fn sm1(&self) -> Vec<Bytes> {
        vec![
            control_frame(ServerPhase::Step1 as u8),
            Bytes::copy_from_slice(&self.salt),
            Bytes::from(self.public.to_bytes_be()),
        ]
    }

    /// Verify the client proof and emit the host proof, or a rejection when
    /// the client proof does not match.
    pub fn sm2(&mut self, cm1: &[Bytes], cm2: &[Bytes]) -> Vec<Bytes> {
        let client_public = BigUint::from_bytes_be(&cm1[2]);
        let u = zk::scrambler(&client_public, &self.public);
        let shared = (&client_public * self.verifier.modpow(&u, zk::group_prime()))
            .modpow(&self.secret, zk::group_prime());
        let key = zk::session_key(&shared);

        let expected = zk::client_proof(&client_public, &self.public, &key);
        if cm2.get(1).map(|f| f.as_ref()) != Some(&expected[..]) {
            return vec![control_frame(ServerPhase::Fail2 as u8), Bytes::new()];
        }

        let m2 = zk::host_proof(&client_public, &expected, &key);
        self.client_public = Some(client_public);
        self.key = Some(key);
        vec![
            control_frame(ServerPhase::Step2 as u8),
            Bytes::copy_from_slice(&m2),
        ]
    }

    /// The host's view of the established channel.
    pub fn channel(&self) -> SessionCrypto {
        let client_public = self.client_public.as_ref().expect("exchange complete");
        let binding = [
            zk::pad(&client_public.to_bytes_be()),
            zk::pad(&self.public.to_bytes_be()),
        ];
        SessionCrypto::derive(
            self.key.as_ref().expect("exchange complete"),
            &[&binding[0], &binding[1]],
            Role::Responder,
        )
        .expect("channel derivation")
    }
}

/// Answer a full successful handshake for the client talking over `peer`.
pub async fn serve_handshake(peer: &mut Peer, host: &mut SrpHost) {
    let cm0 = peer.recv_non_heartbeat().await;
    assert!(client_phase(&cm0, ClientPhase::Initiation));
    peer.send(SrpHost::sm0()).await;

    let cm1 = peer.recv_non_heartbeat().await;
    assert!(client_phase(&cm1, ClientPhase::Handshake));
    peer.send(host.sm1()).await;

    let cm2 = peer.recv_non_heartbeat().await;
    assert!(client_phase(&cm2, ClientPhase::Proof));
    let sm2 = host.sm2(&cm1, &cm2);
    peer.send(sm2).await;
}
