//! Client-side computations of the zero-knowledge exchange.
//!
//! SRP-6a over the RFC 5054 group-1 parameters (1024-bit prime, g = 2).
//! The client proves knowledge of the identity secret without ever placing
//! it on the wire; both sides end up with the same session key, which seeds
//! the symmetric channel.
//!
//! All values crossing the wire are big-endian byte strings; values fed to
//! the hash are left-padded to the group size so both sides hash identical
//! input.

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// RFC 5054 Appendix A group-1 prime.
const GROUP_PRIME_HEX: &[u8] = b"EEAF0AB9ADB38DD69C33F80AFA8FC5E86072618775FF3C0B9EA2314C\
9C256576D674DF7496EA81D3383B4813D692C6E0E0D5D8E250B98BE48E495C1D6089DAD15DC7D7B46154D6B6CE8EF4AD\
69B15D4982559B297BCF1885C529F566660E57EC68EDBC3C05726CC02FD4CBF4976EAA9AFD5138FE8376435B9FC61D2F\
C0EB06E3";

/// Group size in bytes; wire values are padded to this length for hashing.
pub const GROUP_LEN: usize = 128;

/// Bit length of ephemeral private values.
const EPHEMERAL_BITS: u64 = 256;

static N: Lazy<BigUint> =
    Lazy::new(|| BigUint::parse_bytes(GROUP_PRIME_HEX, 16).expect("group prime"));
static G: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));

/// The group prime N.
pub fn group_prime() -> &'static BigUint {
    &N
}

/// The group generator g.
pub fn group_generator() -> &'static BigUint {
    &G
}

/// Left-pad a big-endian byte string to the group size.
pub fn pad(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() >= GROUP_LEN {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; GROUP_LEN - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

/// SHA-256 over the concatenation of the given byte strings.
pub fn hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hash the given byte strings and fold the digest into a group element.
pub fn hash_to_int(parts: &[&[u8]]) -> BigUint {
    BigUint::from_bytes_be(&hash(parts))
}

/// Multiplier parameter k = H(N | PAD(g)).
pub fn multiplier() -> BigUint {
    hash_to_int(&[&N.to_bytes_be(), &pad(&G.to_bytes_be())])
}

/// Private credential x = H(salt | H(identity ":" secret)).
pub fn private_key(identity: &str, secret: &str, salt: &[u8]) -> BigUint {
    let inner = hash(&[identity.as_bytes(), b":", secret.as_bytes()]);
    hash_to_int(&[salt, &inner])
}

/// A fresh ephemeral pair: secret a and public A = g^a mod N.
pub struct Ephemeral {
    /// Ephemeral secret exponent. Never serialized.
    pub secret: BigUint,
    /// Public value sent to the host.
    pub public: BigUint,
}

/// Generate a nonzero ephemeral pair.
pub fn generate_ephemeral() -> Ephemeral {
    let mut rng = OsRng;
    let mut secret = rng.gen_biguint(EPHEMERAL_BITS);
    while secret.is_zero() {
        secret = rng.gen_biguint(EPHEMERAL_BITS);
    }
    let public = G.modpow(&secret, &N);
    Ephemeral { secret, public }
}

/// Scrambling parameter u = H(PAD(A) | PAD(B)).
pub fn scrambler(client_public: &BigUint, host_public: &BigUint) -> BigUint {
    hash_to_int(&[
        &pad(&client_public.to_bytes_be()),
        &pad(&host_public.to_bytes_be()),
    ])
}

/// True iff a public value received from the peer is usable: B mod N != 0.
pub fn is_valid_public(value: &BigUint) -> bool {
    !(value % &*N).is_zero()
}

/// Client shared secret S = (B - k * g^x) ^ (a + u * x) mod N.
pub fn shared_secret(
    host_public: &BigUint,
    ephemeral_secret: &BigUint,
    private: &BigUint,
    u: &BigUint,
) -> BigUint {
    let n = &*N;
    let k = multiplier();
    let gx = G.modpow(private, n);
    let kgx = (k * gx) % n;
    // subtraction stays in the group via the additive inverse
    let base = ((host_public % n) + (n - kgx)) % n;
    let exponent = ephemeral_secret + u * private;
    base.modpow(&exponent, n)
}

/// Session key K = H(PAD(S)).
pub fn session_key(shared: &BigUint) -> [u8; 32] {
    hash(&[&pad(&shared.to_bytes_be())])
}

/// Client proof M1 = H(PAD(A) | PAD(B) | K).
pub fn client_proof(client_public: &BigUint, host_public: &BigUint, key: &[u8; 32]) -> [u8; 32] {
    hash(&[
        &pad(&client_public.to_bytes_be()),
        &pad(&host_public.to_bytes_be()),
        key,
    ])
}

/// Host proof M2 = H(PAD(A) | M1 | K).
pub fn host_proof(client_public: &BigUint, client_proof: &[u8; 32], key: &[u8; 32]) -> [u8; 32] {
    hash(&[&pad(&client_public.to_bytes_be()), client_proof, key])
}
