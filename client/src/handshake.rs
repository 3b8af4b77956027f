//! Zero-knowledge handshake session and its driver operations.
//!
//! The session owns the client half of the challenge-response exchange:
//! it emits the outbound step messages, consumes the host replies, and on
//! a verified host proof derives the session crypto and publishes it
//! through the shared one-shot slot.
//!
//! The session is mutated only on the dispatch loop. The wire loop observes
//! nothing of it except the published crypto.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use num_bigint::BigUint;
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{Role, SessionCrypto};
use crate::error::HandshakeError;
use crate::zk;
use zkmq_wire::{control_frame, reply_phase, ClientPhase, ServerPhase};

/// Progress of the challenge-response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Created; nothing sent yet.
    Init,
    /// Initiation sent; awaiting the host acknowledgement.
    AwaitSm0,
    /// Identity and public value sent; awaiting salt and host value.
    AwaitSm1,
    /// Proof sent; awaiting the host proof.
    AwaitSm2,
    /// Host proof verified; channel keys installed.
    Established,
    /// Terminal failure; a fresh session is required to retry.
    Failed,
}

/// Client half of the zero-knowledge exchange.
pub struct HandshakeSession {
    identity: String,
    secret: Zeroizing<String>,
    state: HandshakeState,
    ephemeral: Option<zk::Ephemeral>,
    host_public: Option<BigUint>,
    proof: Option<[u8; 32]>,
    session_key: Option<Zeroizing<[u8; 32]>>,
    crypto: Arc<OnceCell<SessionCrypto>>,
    last_heart_beat: Instant,
}

impl HandshakeSession {
    /// Create a session for the given credentials.
    ///
    /// `crypto` is the shared publication slot; it is written at most once,
    /// when the host proof verifies.
    pub fn new(
        identity: impl Into<String>,
        secret: impl Into<String>,
        crypto: Arc<OnceCell<SessionCrypto>>,
    ) -> Self {
        Self {
            identity: identity.into(),
            secret: Zeroizing::new(secret.into()),
            state: HandshakeState::Init,
            ephemeral: None,
            host_public: None,
            proof: None,
            session_key: None,
            crypto,
            last_heart_beat: Instant::now(),
        }
    }

    /// Current state of the exchange.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// True once the host proof verified and the channel keys are installed.
    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Mark the session failed. Terminal.
    pub fn fail(&mut self) {
        self.state = HandshakeState::Failed;
        self.wipe();
    }

    /// Note an inbound heartbeat.
    pub fn record_heart_beat(&mut self) {
        self.last_heart_beat = Instant::now();
    }

    /// Time elapsed since the most recent inbound heartbeat.
    pub fn since_heart_beat(&self) -> Duration {
        self.last_heart_beat.elapsed()
    }

    /// Emit the first client message and advance to awaiting the host ack.
    pub fn create_initiation_request(&mut self) -> Vec<Bytes> {
        self.state = HandshakeState::AwaitSm0;
        debug!("handshake initiated for identity {}", self.identity);
        vec![control_frame(ClientPhase::Initiation as u8)]
    }

    /// Consume the host acknowledgement and emit the identity step.
    pub fn create_handshake_request(
        &mut self,
        frames: &[Bytes],
    ) -> Result<Vec<Bytes>, HandshakeError> {
        self.expect(HandshakeState::AwaitSm0, frames, ServerPhase::Step0)?;

        let ephemeral = zk::generate_ephemeral();
        let public = Bytes::from(ephemeral.public.to_bytes_be());
        self.ephemeral = Some(ephemeral);
        self.state = HandshakeState::AwaitSm1;

        Ok(vec![
            control_frame(ClientPhase::Handshake as u8),
            Bytes::copy_from_slice(self.identity.as_bytes()),
            public,
        ])
    }

    /// Consume the salt and host public value and emit the client proof.
    pub fn create_proof_request(
        &mut self,
        frames: &[Bytes],
    ) -> Result<Vec<Bytes>, HandshakeError> {
        self.expect(HandshakeState::AwaitSm1, frames, ServerPhase::Step1)?;
        if frames.len() != 3 || frames[1].is_empty() || frames[2].is_empty() {
            return self.malformed("salt step carried unusable payload");
        }

        let salt = &frames[1];
        let host_public = BigUint::from_bytes_be(&frames[2]);
        if !zk::is_valid_public(&host_public) {
            return self.malformed("host public value folds to zero");
        }

        let ephemeral = self.ephemeral.as_ref().ok_or(HandshakeError::OutOfOrder)?;
        let u = zk::scrambler(&ephemeral.public, &host_public);
        if !zk::is_valid_public(&u) {
            return self.malformed("scrambling parameter folds to zero");
        }

        let x = zk::private_key(&self.identity, &self.secret, salt);
        let shared = zk::shared_secret(&host_public, &ephemeral.secret, &x, &u);
        let key = Zeroizing::new(zk::session_key(&shared));
        let proof = zk::client_proof(&ephemeral.public, &host_public, &key);

        self.host_public = Some(host_public);
        self.session_key = Some(key);
        self.proof = Some(proof);
        self.state = HandshakeState::AwaitSm2;

        Ok(vec![
            control_frame(ClientPhase::Proof as u8),
            Bytes::copy_from_slice(&proof),
        ])
    }

    /// Consume the host proof; on success install the session crypto and
    /// mark the session established.
    pub fn process_proof_reply(&mut self, frames: &[Bytes]) -> Result<(), HandshakeError> {
        self.expect(HandshakeState::AwaitSm2, frames, ServerPhase::Step2)?;
        if frames.len() != 2 || frames[1].len() != 32 {
            return self.malformed("host proof carried unusable payload");
        }

        let (Some(ephemeral), Some(host_public), Some(proof), Some(key)) = (
            self.ephemeral.take(),
            self.host_public.take(),
            self.proof.take(),
            self.session_key.take(),
        ) else {
            self.fail();
            return Err(HandshakeError::OutOfOrder);
        };

        let expected = zk::host_proof(&ephemeral.public, &proof, &key);
        if frames[1].as_ref() != expected {
            warn!("host proof mismatch; handshake failed");
            self.fail();
            return Err(HandshakeError::BadProof);
        }

        let binding = [
            zk::pad(&ephemeral.public.to_bytes_be()),
            zk::pad(&host_public.to_bytes_be()),
        ];
        let crypto = match SessionCrypto::derive(
            &*key,
            &[&binding[0], &binding[1]],
            Role::Initiator,
        ) {
            Ok(crypto) => crypto,
            Err(err) => {
                warn!("channel derivation failed: {err}");
                self.fail();
                return Err(HandshakeError::BadProof);
            }
        };

        if self.crypto.set(crypto).is_err() {
            warn!("session crypto already installed");
        }
        self.state = HandshakeState::Established;
        self.record_heart_beat();
        self.wipe();
        debug!("handshake established for identity {}", self.identity);
        Ok(())
    }

    fn expect(
        &mut self,
        state: HandshakeState,
        frames: &[Bytes],
        phase: ServerPhase,
    ) -> Result<(), HandshakeError> {
        if self.state != state {
            self.fail();
            return Err(HandshakeError::OutOfOrder);
        }
        if reply_phase(frames) != Some(phase) {
            self.fail();
            return Err(HandshakeError::Malformed);
        }
        Ok(())
    }

    fn malformed<T>(&mut self, reason: &str) -> Result<T, HandshakeError> {
        warn!("handshake failed: {reason}");
        self.fail();
        Err(HandshakeError::Malformed)
    }

    /// Drop the transient exchange values; the derived channel survives in
    /// the publication slot.
    fn wipe(&mut self) {
        self.ephemeral = None;
        self.host_public = None;
        self.proof = None;
        self.session_key = None;
    }
}
