//! Per-session authenticated symmetric channel.
//!
//! Once the handshake derives a session key, each direction gets its own
//! ChaCha20-Poly1305 cipher expanded from that key with HKDF-SHA256. Every
//! encrypted frame carries a fresh random 96-bit nonce prepended to the
//! ciphertext; replay and truncation protection are AEAD properties.

use bytes::{BufMut, Bytes, BytesMut};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Nonce length prepended to each encrypted frame.
pub const NONCE_LEN: usize = 12;

const KEY_LEN: usize = 32;
const KDF_SALT_PREFIX: &[u8] = b"zkmq/kdf/v1/";
const C2H_INFO: &[u8] = b"zkmq/c2h/traffic";
const H2C_INFO: &[u8] = b"zkmq/h2c/traffic";

/// Which end of the exchange this channel serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The connecting client; encrypts client-to-host.
    Initiator,
    /// The host side; used by test doubles and simulations.
    Responder,
}

/// Channel crypto failure.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key derivation could not expand the requested output.
    #[error("key derivation failed")]
    Derive,

    /// A frame failed authentication or was too short to carry a nonce.
    #[error("frame authentication failed")]
    Frame,
}

/// Authenticated bidirectional channel keyed by the handshake output.
pub struct SessionCrypto {
    send: ChaCha20Poly1305,
    recv: ChaCha20Poly1305,
}

impl SessionCrypto {
    /// Derive the directional ciphers from the handshake session key.
    ///
    /// `binding` is hashed into the derivation salt so the channel is tied
    /// to the exchanged public values, not just the key.
    pub fn derive(key: &[u8], binding: &[&[u8]], role: Role) -> Result<Self, CryptoError> {
        let mut hasher = Sha256::new();
        hasher.update(KDF_SALT_PREFIX);
        for part in binding {
            hasher.update(part);
        }
        let salt = hasher.finalize();

        let hk = Hkdf::<Sha256>::new(Some(salt.as_ref()), key);
        let mut buf = [0u8; KEY_LEN];

        hk.expand(C2H_INFO, &mut buf).map_err(|_| CryptoError::Derive)?;
        let c2h = ChaCha20Poly1305::new_from_slice(&buf).map_err(|_| CryptoError::Derive)?;
        hk.expand(H2C_INFO, &mut buf).map_err(|_| CryptoError::Derive)?;
        let h2c = ChaCha20Poly1305::new_from_slice(&buf).map_err(|_| CryptoError::Derive)?;
        buf.zeroize();

        let (send, recv) = match role {
            Role::Initiator => (c2h, h2c),
            Role::Responder => (h2c, c2h),
        };
        Ok(Self { send, recv })
    }

    /// Encrypt one outbound frame; the output is nonce || ciphertext.
    pub fn encrypt(&self, plain: &[u8]) -> Result<Bytes, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = self
            .send
            .encrypt(Nonce::from_slice(&nonce), plain)
            .map_err(|_| CryptoError::Frame)?;

        let mut out = BytesMut::with_capacity(NONCE_LEN + sealed.len());
        out.put_slice(&nonce);
        out.put_slice(&sealed);
        Ok(out.freeze())
    }

    /// Decrypt one inbound frame laid out as nonce || ciphertext.
    pub fn decrypt(&self, frame: &[u8]) -> Result<Bytes, CryptoError> {
        if frame.len() < NONCE_LEN {
            return Err(CryptoError::Frame);
        }
        let (nonce, sealed) = frame.split_at(NONCE_LEN);
        self.recv
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map(Bytes::from)
            .map_err(|_| CryptoError::Frame)
    }
}
