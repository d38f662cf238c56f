//! Public-key encryption using NaCl box and libsodium sealed boxes
//!
//! Two modes are supported, both built on X25519 + XSalsa20Poly1305:
//! - sealed box: anonymous, needs only the recipient's public key to
//!   encrypt. The output is the 32-byte ephemeral public key followed by the
//!   boxed message (16-byte Poly1305 MAC + ciphertext), compatible with
//!   libsodium's `crypto_box_seal`.
//! - authenticated box: binds the sender's private key and the recipient's
//!   public key, with a random 24-byte nonce carried out of band. The output
//!   is the 16-byte MAC followed by the ciphertext, compatible with
//!   `crypto_box_easy`.
//!
//! Only a single key pair is ever supplied, so the authenticated box is
//! self-directed: the pair's public key is the recipient on encryption and
//! the sender on decryption.

use clap::ValueEnum;
use crypto_box::SalsaBox;
use crypto_box::aead::Aead;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use crate::keys::{self, KeyPair, Nonce};

/// Length of the Poly1305 authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Bytes a sealed box adds to the plaintext: ephemeral public key + tag
pub const SEALED_OVERHEAD: usize = crypto_box::SEALBYTES;

/// Bytes an authenticated box adds to the plaintext: the tag only
pub const AUTHENTICATED_OVERHEAD: usize = TAG_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(name = "sealed-box", alias = "sealed")]
    SealedBox,
    #[value(name = "authenticated-box", alias = "authenticated")]
    AuthenticatedBox,
}

impl Mode {
    /// Number of bytes the ciphertext is longer than the plaintext.
    pub fn overhead(self) -> usize {
        match self {
            Mode::SealedBox => SEALED_OVERHEAD,
            Mode::AuthenticatedBox => AUTHENTICATED_OVERHEAD,
        }
    }

    /// Whether ciphertext in this mode travels with a nonce.
    pub fn uses_nonce(self) -> bool {
        matches!(self, Mode::AuthenticatedBox)
    }
}

/// The artifacts produced by one encryption.
#[derive(Debug)]
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    /// Present exactly when the mode is [`Mode::AuthenticatedBox`].
    pub nonce: Option<Nonce>,
}

/// Encrypt `plaintext` under `mode`.
pub fn encrypt(mode: Mode, plaintext: &[u8], key_pair: &KeyPair) -> Result<Encrypted> {
    match mode {
        Mode::SealedBox => Ok(Encrypted {
            ciphertext: seal(plaintext, key_pair)?,
            nonce: None,
        }),
        Mode::AuthenticatedBox => {
            let (ciphertext, nonce) = encrypt_authenticated(plaintext, key_pair)?;
            Ok(Encrypted {
                ciphertext,
                nonce: Some(nonce),
            })
        }
    }
}

/// Decrypt `ciphertext` produced under `mode`.
///
/// A nonce passed for a sealed box is ignored; the sealed box derives its
/// own.
pub fn decrypt(
    mode: Mode,
    ciphertext: &[u8],
    nonce: Option<&Nonce>,
    key_pair: &KeyPair,
) -> Result<Zeroizing<Vec<u8>>> {
    match mode {
        Mode::SealedBox => open_sealed(ciphertext, key_pair),
        Mode::AuthenticatedBox => decrypt_authenticated(ciphertext, nonce, key_pair),
    }
}

/// Anonymously encrypt `plaintext` to the public half of `key_pair`.
///
/// The ephemeral key is drawn from a CSPRNG seeded from the OS random
/// source, so an unavailable source surfaces as
/// [`ErrorKind::RandomSourceUnavailable`].
pub fn seal(plaintext: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>> {
    let mut rng = keys::seeded_rng()?;
    let ciphertext = key_pair
        .public_key()
        .seal(&mut rng, plaintext)
        .map_err(|e| {
            KeyboxError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("sealed box encryption failed: {}", e),
            )
        })?;
    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "sealed message"
    );
    Ok(ciphertext)
}

/// Open a sealed box addressed to `key_pair`.
///
/// The recipient public key takes part in deriving the sealed box nonce, so
/// a pair whose public key does not belong to its private key cannot open
/// anything and is reported like any other authentication failure.
pub fn open_sealed(ciphertext: &[u8], key_pair: &KeyPair) -> Result<Zeroizing<Vec<u8>>> {
    if !key_pair.is_matching() {
        debug!("public key does not match private key");
        return Err(authentication_failed());
    }
    let plaintext = key_pair
        .secret_key()
        .unseal(ciphertext)
        .map_err(|_| authentication_failed())?;
    Ok(Zeroizing::new(plaintext))
}

/// Encrypt `plaintext` from the private half of `key_pair` to its public
/// half, under a freshly drawn nonce.
pub fn encrypt_authenticated(plaintext: &[u8], key_pair: &KeyPair) -> Result<(Vec<u8>, Nonce)> {
    let nonce = Nonce::generate()?;
    let ciphertext = encrypt_authenticated_with_nonce(plaintext, key_pair, &nonce)?;
    Ok((ciphertext, nonce))
}

/// Encrypt with a caller-provided nonce.
///
/// This function is ONLY for reproducing known outputs in tests. A nonce
/// must never be used twice with the same keys; use
/// [`encrypt_authenticated`], which draws a fresh one.
pub fn encrypt_authenticated_with_nonce(
    plaintext: &[u8],
    key_pair: &KeyPair,
    nonce: &Nonce,
) -> Result<Vec<u8>> {
    let salsa_box = SalsaBox::new(key_pair.public_key(), key_pair.secret_key());
    let nonce_obj = crypto_box::Nonce::from(*nonce.as_bytes());
    let ciphertext = salsa_box.encrypt(&nonce_obj, plaintext).map_err(|e| {
        KeyboxError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("authenticated box encryption failed: {}", e),
        )
    })?;
    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "boxed message"
    );
    Ok(ciphertext)
}

/// Decrypt an authenticated box sent by the public half of `key_pair` to
/// its private half.
pub fn decrypt_authenticated(
    ciphertext: &[u8],
    nonce: Option<&Nonce>,
    key_pair: &KeyPair,
) -> Result<Zeroizing<Vec<u8>>> {
    let nonce = nonce.ok_or_else(|| {
        KeyboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::MissingNonce,
            "a nonce is required to decrypt an authenticated box",
        )
    })?;
    let salsa_box = SalsaBox::new(key_pair.public_key(), key_pair.secret_key());
    let nonce_obj = crypto_box::Nonce::from(*nonce.as_bytes());
    let plaintext = salsa_box
        .decrypt(&nonce_obj, ciphertext)
        .map_err(|_| authentication_failed())?;
    Ok(Zeroizing::new(plaintext))
}

/// The single error reported for every failed decryption. Callers cannot
/// tell a wrong key from tampered data.
fn authentication_failed() -> KeyboxError {
    KeyboxError::with_kind(
        ErrorCategory::User,
        ErrorKind::AuthenticationFailed,
        "corrupt input, tampered-with data, wrong key, or wrong mode",
    )
}
