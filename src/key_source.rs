//! Key file reading functionality

use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Trait for reading key material from various sources
pub trait KeySource {
    /// Read the undecoded contents of a key file.
    ///
    /// Returns the bytes wrapped in `Zeroizing` to ensure they are securely
    /// wiped from memory when dropped.
    fn read_key(&mut self) -> Result<Zeroizing<Vec<u8>>>;

    /// Human-readable name of the source, used in diagnostics.
    fn describe(&self) -> String;
}

/// Reads a key from a file on disk
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for FileKeySource {
    fn read_key(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut file = fs::File::open(&self.path).map_err(|e| key_read_error(&self.path, e))?;
        let mut data = Zeroizing::new(Vec::new());
        file.read_to_end(&mut data)
            .map_err(|e| key_read_error(&self.path, e))?;
        Ok(data)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Returns fixed key bytes (for testing)
pub struct ConstantKeySource {
    content: Zeroizing<Vec<u8>>,
}

impl ConstantKeySource {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Zeroizing::new(content),
        }
    }
}

impl KeySource for ConstantKeySource {
    fn read_key(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.content).clone()))
    }

    fn describe(&self) -> String {
        "in-memory key".to_owned()
    }
}

fn key_read_error(path: &Path, err: io::Error) -> KeyboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    KeyboxError::with_kind_and_source(
        category,
        ErrorKind::KeyRead,
        format!("failed to read from {}", path.display()),
        err,
    )
}
