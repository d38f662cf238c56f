//! Key material: key pairs and nonces
//!
//! Keys are Curve25519 (X25519) keys as used by NaCl `crypto_box` and
//! libsodium, 32 bytes each. A [`KeyPair`] is built either from freshly
//! drawn OS randomness or from the bytes of two key files; nothing here
//! persists key material.

use std::fmt;

use crypto_box::{PublicKey, SecretKey};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use tracing::debug;
use zeroize::Zeroizing;

use crate::codec;
use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use crate::key_source::KeySource;

/// Length of public and private keys in bytes
pub const KEY_LEN: usize = crypto_box::KEY_SIZE;

/// Length of an authenticated-box nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Which half of a key pair a key belongs to. Used to label diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Public,
    Private,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Public => f.write_str("public key"),
            KeyRole::Private => f.write_str("private key"),
        }
    }
}

/// A public/private key pair.
///
/// The pair is not required to be internally consistent: keys come from
/// two independent files and the authenticated box uses them in different
/// roles (own private key, peer public key). Operations that need a
/// matching pair check [`KeyPair::is_matching`] themselves.
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new key pair from the operating system random source.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        fill_random(&mut bytes[..])?;
        let secret = SecretKey::from_bytes(*bytes);
        let public = secret.public_key();
        Ok(Self { public, secret })
    }

    /// Build a key pair from decoded key bytes, checking both lengths.
    pub fn from_bytes(public_bytes: &[u8], private_bytes: &[u8]) -> Result<Self> {
        let public = PublicKey::from_slice(public_bytes)
            .map_err(|_| length_error(KeyRole::Public, public_bytes.len()))?;
        let secret = SecretKey::from_slice(private_bytes)
            .map_err(|_| length_error(KeyRole::Private, private_bytes.len()))?;
        Ok(Self { public, secret })
    }

    /// Read and decode both keys from their sources.
    ///
    /// Each key file may hold either the raw key bytes or base64 text; see
    /// [`codec::decode_key_file`].
    pub fn load(public: &mut dyn KeySource, private: &mut dyn KeySource) -> Result<Self> {
        let public_bytes = read_key(public, KeyRole::Public)?;
        let private_bytes = read_key(private, KeyRole::Private)?;
        let pair = Self::from_bytes(&public_bytes, &private_bytes)?;
        debug!(matching = pair.is_matching(), "loaded key pair");
        Ok(pair)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_bytes(&self) -> [u8; KEY_LEN] {
        self.public.to_bytes()
    }

    /// The private key bytes, wiped from memory when dropped.
    pub fn private_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Whether the public key is the one derived from the private key.
    pub fn is_matching(&self) -> bool {
        self.secret.public_key() == self.public
    }
}

fn read_key(source: &mut dyn KeySource, role: KeyRole) -> Result<Zeroizing<Vec<u8>>> {
    let content = source
        .read_key()
        .map_err(|e| e.with_context(format!("failed to read {}", role)))?;
    codec::decode_key_file(&content).map_err(|e| {
        KeyboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::KeyRead,
            format!("failed to decode {} from {}", role, source.describe()),
            e,
        )
    })
}

fn length_error(role: KeyRole, len: usize) -> KeyboxError {
    KeyboxError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyRead,
        format!("{} must be {} bytes, got {}", role, KEY_LEN, len),
    )
}

/// A nonce for the authenticated box.
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

impl Nonce {
    /// Draw a fresh nonce from the operating system random source.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; NONCE_LEN];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; NONCE_LEN] = slice.try_into().map_err(|_| {
            KeyboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedInput,
                format!("nonce must be {} bytes, got {}", NONCE_LEN, slice.len()),
            )
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl From<[u8; NONCE_LEN]> for Nonce {
    fn from(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }
}

/// Fill `buf` from the OS random source. Failure is fatal for the command.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(random_source_error)
}

/// A CSPRNG seeded from the OS random source, for APIs that draw their own
/// randomness from an RNG handle.
pub(crate) fn seeded_rng() -> Result<StdRng> {
    seed_from(OsRng)
}

fn seed_from(source: impl RngCore) -> Result<StdRng> {
    StdRng::from_rng(source).map_err(random_source_error)
}

fn random_source_error(err: rand::Error) -> KeyboxError {
    KeyboxError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::RandomSourceUnavailable,
        "operating system random source unavailable",
        err,
    )
}
