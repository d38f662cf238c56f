//! Keybox - Public-key encryption using NaCl box and libsodium sealed boxes

#![forbid(unsafe_code)]

pub mod boxcrypt;
pub mod cli;
pub mod codec;
pub mod error;
pub mod key_source;
pub mod keys;
pub mod logging;
pub mod pipeline;
