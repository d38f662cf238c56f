//! Encrypt, decrypt and keygen operations
//!
//! This module sequences key loading, decoding, the cipher and output
//! routing for one command. Each operation takes a fully parsed [`Request`]
//! and writes its human-facing output to the supplied `stdout`; artifacts
//! with a named destination go to files instead.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::boxcrypt::{self, Mode};
use crate::codec::{Encoding, KeyFileFormat};
use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use crate::key_source::KeySource;
use crate::keys::{KeyPair, Nonce};

/// Mode for files that hold secrets (private keys, decrypted plaintext)
const SECRET_FILE_MODE: u32 = 0o600;

/// Mode for files that are safe to share (public keys, ciphertext, nonces)
const PUBLIC_FILE_MODE: u32 = 0o644;

/// One command, decided at the argument-parsing boundary.
pub enum Request {
    Encrypt(EncryptRequest),
    Decrypt(DecryptRequest),
    Keygen(KeygenRequest),
}

/// Where the two halves of the key pair are read from.
pub struct KeySources {
    pub public_key: Box<dyn KeySource>,
    pub private_key: Box<dyn KeySource>,
}

impl KeySources {
    fn load(mut self) -> Result<KeyPair> {
        KeyPair::load(&mut *self.public_key, &mut *self.private_key)
    }
}

/// Where a message, ciphertext or nonce comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Text given directly on the command line.
    Inline(String),
    /// A file holding the text (or the bytes, for raw input).
    File(PathBuf),
}

/// An input together with the encoding it is declared to be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub source: InputSource,
    pub encoding: Encoding,
}

impl EncodedInput {
    pub fn inline(text: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            source: InputSource::Inline(text.into()),
            encoding,
        }
    }

    pub fn file(path: impl Into<PathBuf>, encoding: Encoding) -> Self {
        Self {
            source: InputSource::File(path.into()),
            encoding,
        }
    }

    fn decode(&self, what: &str) -> Result<Zeroizing<Vec<u8>>> {
        let decoded = match &self.source {
            InputSource::Inline(text) => self.encoding.decode(text),
            InputSource::File(path) => {
                let content = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
                self.encoding.decode_file_content(&content)
            }
        }
        .map_err(|e| e.with_context(format!("{} is not valid {}", what, self.encoding)))?;
        Ok(Zeroizing::new(decoded))
    }
}

pub struct EncryptRequest {
    pub keys: KeySources,
    pub message: EncodedInput,
    pub output_encoding: Encoding,
    /// Selects [`Mode::SealedBox`]; otherwise [`Mode::AuthenticatedBox`].
    pub sealed_box: bool,
    pub output_data: Option<PathBuf>,
    pub output_nonce: Option<PathBuf>,
}

pub struct DecryptRequest {
    pub keys: KeySources,
    pub ciphertext: EncodedInput,
    pub nonce: Option<EncodedInput>,
    /// Explicit mode. When absent the mode follows from whether a nonce
    /// was given.
    pub mode: Option<Mode>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeygenRequest {
    pub public_key_path: PathBuf,
    pub private_key_path: PathBuf,
    pub format: KeyFileFormat,
}

/// Where an artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

/// What a successful command produced.
#[derive(Debug)]
pub enum Outcome {
    Encrypted {
        mode: Mode,
        ciphertext_len: usize,
        data: Destination,
        nonce: Option<Destination>,
    },
    Decrypted {
        mode: Mode,
        plaintext_len: usize,
        destination: Destination,
    },
    KeyPairGenerated {
        key_pair: KeyPair,
        public_key_path: PathBuf,
        private_key_path: PathBuf,
    },
}

/// Run one command to completion.
pub fn run(request: Request, stdout: &mut dyn Write) -> Result<Outcome> {
    match request {
        Request::Encrypt(req) => encrypt(req, stdout),
        Request::Decrypt(req) => decrypt(req, stdout),
        Request::Keygen(req) => keygen(req, stdout),
    }
}

/// Encrypt a message and route the ciphertext (and nonce) to their sinks.
///
/// Every artifact is rendered, and every file artifact staged in a tempfile
/// next to its destination, before any file is renamed into place or any
/// line is printed. A failure on either sink leaves neither behind.
pub fn encrypt(req: EncryptRequest, stdout: &mut dyn Write) -> Result<Outcome> {
    let key_pair = req.keys.load()?;
    let plaintext = req.message.decode("message")?;

    let mode = if req.sealed_box {
        Mode::SealedBox
    } else {
        Mode::AuthenticatedBox
    };
    debug!(?mode, plaintext_len = plaintext.len(), "encrypting");

    let encrypted = boxcrypt::encrypt(mode, &plaintext, &key_pair)
        .map_err(|e| e.with_context("encryption failed"))?;
    drop(plaintext);

    let mut artifacts = vec![Artifact::render(
        "Data",
        &encrypted.ciphertext,
        req.output_encoding,
        req.output_data,
    )?];
    if let Some(nonce) = &encrypted.nonce {
        artifacts.push(Artifact::render(
            "Nonce",
            nonce.as_bytes(),
            req.output_encoding,
            req.output_nonce,
        )?);
    }

    let committed = artifacts
        .into_iter()
        .map(Artifact::commit)
        .collect::<Result<Vec<_>>>()?;
    let mut destinations = Vec::with_capacity(committed.len());
    for (line, destination) in committed {
        writeln!(stdout, "{}", line).map_err(stdout_error)?;
        destinations.push(destination);
    }

    let mut destinations = destinations.into_iter();
    let data = destinations.next().ok_or_else(|| {
        KeyboxError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "ciphertext artifact missing",
        )
    })?;
    let nonce = destinations.next();

    Ok(Outcome::Encrypted {
        mode,
        ciphertext_len: encrypted.ciphertext.len(),
        data,
        nonce,
    })
}

/// Decrypt a ciphertext and write the plaintext bytes as they are.
pub fn decrypt(req: DecryptRequest, stdout: &mut dyn Write) -> Result<Outcome> {
    let key_pair = req.keys.load()?;
    let ciphertext = req.ciphertext.decode("ciphertext")?;
    let nonce = match &req.nonce {
        Some(input) => Some(Nonce::from_slice(&input.decode("nonce")?)?),
        None => None,
    };

    let mode = match (req.mode, &nonce) {
        (Some(Mode::SealedBox), Some(_)) => {
            return Err(KeyboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedInput,
                "a nonce cannot be used with a sealed box",
            ));
        }
        (Some(mode), _) => mode,
        (None, Some(_)) => Mode::AuthenticatedBox,
        (None, None) => Mode::SealedBox,
    };
    debug!(?mode, ciphertext_len = ciphertext.len(), "decrypting");

    let plaintext = boxcrypt::decrypt(mode, &ciphertext, nonce.as_ref(), &key_pair)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let destination = match req.output {
        Some(path) => {
            write_file_atomic(&path, &plaintext, SECRET_FILE_MODE)?;
            info!(path = %path.display(), "wrote plaintext");
            Destination::File(path)
        }
        None => {
            stdout
                .write_all(&plaintext)
                .and_then(|()| stdout.flush())
                .map_err(stdout_error)?;
            Destination::Stdout
        }
    };

    Ok(Outcome::Decrypted {
        mode,
        plaintext_len: plaintext.len(),
        destination,
    })
}

/// Generate a key pair and write both halves to their files.
///
/// Both halves are staged before either is renamed into place, so a
/// failing destination never leaves the other half behind on its own.
pub fn keygen(req: KeygenRequest, stdout: &mut dyn Write) -> Result<Outcome> {
    let key_pair = KeyPair::generate().map_err(|e| e.with_context("key generation failed"))?;

    let public = req.format.encode(&key_pair.public_bytes());
    let staged_public = StagedFile::stage(&req.public_key_path, &public, PUBLIC_FILE_MODE)?;
    let private = req.format.encode(&*key_pair.private_bytes());
    let staged_private = StagedFile::stage(&req.private_key_path, &private, SECRET_FILE_MODE)?;
    staged_public.persist()?;
    staged_private.persist()?;
    info!(
        public = %req.public_key_path.display(),
        private = %req.private_key_path.display(),
        format = ?req.format,
        "generated key pair"
    );

    writeln!(stdout, "Key pair generated successfully!")
        .and_then(|()| {
            writeln!(
                stdout,
                "Public key is saved to: {}",
                req.public_key_path.display()
            )
        })
        .and_then(|()| {
            writeln!(
                stdout,
                "Private key is saved to: {}",
                req.private_key_path.display()
            )
        })
        .map_err(stdout_error)?;

    Ok(Outcome::KeyPairGenerated {
        key_pair,
        public_key_path: req.public_key_path,
        private_key_path: req.private_key_path,
    })
}

/// An encrypt output rendered for its sink but not yet written.
enum Artifact {
    Line(String),
    File {
        label: &'static str,
        staged: StagedFile,
    },
}

impl Artifact {
    fn render(
        label: &'static str,
        bytes: &[u8],
        encoding: Encoding,
        path: Option<PathBuf>,
    ) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = encoding.encode_file_content(bytes);
                Ok(Artifact::File {
                    label,
                    staged: StagedFile::stage(&path, &contents, PUBLIC_FILE_MODE)?,
                })
            }
            None => {
                let text = encoding.encode(bytes).map_err(|e| {
                    e.with_context(format!("cannot print {}", label.to_lowercase()))
                })?;
                Ok(Artifact::Line(format!("{}: {}", label, text)))
            }
        }
    }

    /// Put a file artifact in place. Returns the line to report on stdout.
    fn commit(self) -> Result<(String, Destination)> {
        match self {
            Artifact::Line(line) => Ok((line, Destination::Stdout)),
            Artifact::File { label, staged } => {
                let path = staged.persist()?;
                info!(path = %path.display(), "wrote {}", label);
                let line = format!("{} has been written to: {}", label, path.display());
                Ok((line, Destination::File(path)))
            }
        }
    }
}

/// File contents written and synced to a tempfile in the destination's
/// directory, waiting to be renamed over the destination.
///
/// Dropping a staged file without persisting it removes the tempfile.
struct StagedFile {
    temp_file: tempfile::NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Write `contents` to a tempfile next to `path` and fsync it, with the
    /// given permission bits on Unix.
    fn stage(path: &Path, contents: &[u8], mode: u32) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp_file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| write_error(path, "failed to create tempfile", e))?;

        temp_file
            .write_all(contents)
            .map_err(|e| write_error(path, "failed to write to tempfile", e))?;
        // Flush and fsync() such that the rename later, if it succeeds, will
        // always point to a valid file.
        temp_file
            .flush()
            .map_err(|e| write_error(path, "failed to flush tempfile", e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| write_error(path, "failed to sync file prior to rename", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(fs::Permissions::from_mode(mode))
                .map_err(|e| write_error(path, "failed to set tempfile permissions", e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(Self {
            temp_file,
            path: path.to_path_buf(),
        })
    }

    /// Rename the tempfile over the destination.
    fn persist(self) -> Result<PathBuf> {
        let Self { temp_file, path } = self;
        temp_file.persist(&path).map_err(|e| {
            KeyboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::OutputWrite,
                format!("failed to write to {}", path.display()),
                e.error,
            )
        })?;
        Ok(path)
    }
}

/// Write `contents` to `path` atomically (tempfile + fsync + rename).
///
/// Either the previous file or the complete new one exists afterwards,
/// never a partial write.
fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    StagedFile::stage(path, contents, mode)?.persist()?;
    Ok(())
}

fn write_error(path: &Path, what: &str, err: io::Error) -> KeyboxError {
    KeyboxError::with_kind_and_source(
        ErrorCategory::User,
        ErrorKind::OutputWrite,
        format!("failed to write to {}: {}", path.display(), what),
        err,
    )
}

fn stdout_error(err: io::Error) -> KeyboxError {
    KeyboxError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::OutputWrite,
        "failed to write to stdout",
        err,
    )
}

fn read_error(path: &Path, err: io::Error) -> KeyboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    KeyboxError::with_kind_and_source(
        category,
        ErrorKind::InputRead,
        format!("failed to read from {}", path.display()),
        err,
    )
}
