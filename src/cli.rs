//! Command-line grammar
//!
//! The parsed arguments are turned into a [`Request`] here, so the pipeline
//! only ever sees one of the three closed request variants.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::boxcrypt::Mode;
use crate::codec::{Encoding, KeyFileFormat};
use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use crate::key_source::FileKeySource;
use crate::pipeline::{
    DecryptRequest, EncodedInput, EncryptRequest, KeySources, KeygenRequest, Request,
};

#[derive(Parser, Debug)]
#[command(name = "keybox")]
#[command(version)]
#[command(about = "Public-key encryption with NaCl boxes and sealed boxes.", long_about = None)]
pub struct Cli {
    /// Log what the tool is doing to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt a message
    #[command(alias = "e")]
    Encrypt(EncryptArgs),

    /// Decrypt a message; the plaintext is written as-is
    #[command(alias = "d")]
    Decrypt(DecryptArgs),

    /// Generate a new key pair
    #[command(alias = "g")]
    Keygen(KeygenArgs),
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Path to the public key (raw 32 bytes or base64 text)
    #[arg(short = 'K', long, value_name = "FILE")]
    pub public_key: PathBuf,

    /// Path to the private key (raw 32 bytes or base64 text)
    #[arg(short = 'k', long, value_name = "FILE")]
    pub private_key: PathBuf,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct DataArgs {
    /// The data, as text in the input encoding
    #[arg(short, long, value_name = "TEXT")]
    pub data: Option<String>,

    /// Path to a file holding the data in the input encoding
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub data: DataArgs,

    /// Encoding of the message
    #[arg(short = 'e', long, value_enum, default_value_t = Encoding::Raw)]
    pub input_encoding: Encoding,

    /// Encoding of the ciphertext and nonce output
    #[arg(short = 'f', long, value_enum, default_value_t = Encoding::Base64)]
    pub output_encoding: Encoding,

    /// Write the ciphertext to this file instead of stdout
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output_data: Option<PathBuf>,

    /// Write the nonce to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_nonce: Option<PathBuf>,

    /// Encrypt with a sealed box so that the receiver cannot identify the sender
    #[arg(short = 'S', long)]
    pub sealed_box: bool,
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub data: DataArgs,

    /// Encoding of the ciphertext
    #[arg(
        short = 'e',
        long,
        visible_alias = "encoding",
        value_enum,
        default_value_t = Encoding::Base64
    )]
    pub input_encoding: Encoding,

    /// Nonce of an authenticated box, as text in the nonce encoding
    #[arg(short, long, value_name = "TEXT", conflicts_with = "nonce_file")]
    pub nonce: Option<String>,

    /// Path to a file holding the nonce in the nonce encoding
    #[arg(long, value_name = "FILE")]
    pub nonce_file: Option<PathBuf>,

    /// Encoding of the nonce [default: the ciphertext encoding]
    #[arg(long, value_enum)]
    pub nonce_encoding: Option<Encoding>,

    /// Box mode [default: authenticated-box when a nonce is given, else sealed-box]
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Write the plaintext to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Path to save the public key to
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output_public_key: PathBuf,

    /// Path to save the private key to
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_private_key: PathBuf,

    /// How the keys are stored
    #[arg(long, value_enum, default_value_t = KeyFileFormat::Raw)]
    pub format: KeyFileFormat,
}

impl KeyArgs {
    fn into_sources(self) -> KeySources {
        KeySources {
            public_key: Box::new(FileKeySource::new(self.public_key)),
            private_key: Box::new(FileKeySource::new(self.private_key)),
        }
    }
}

impl DataArgs {
    fn into_input(self, encoding: Encoding) -> Result<EncodedInput> {
        match (self.data, self.input) {
            (_, Some(path)) => Ok(EncodedInput::file(path, encoding)),
            (Some(text), None) => Ok(EncodedInput::inline(text, encoding)),
            (None, None) => Err(KeyboxError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "one of --data or --input is required",
            )),
        }
    }
}

impl TryFrom<Commands> for Request {
    type Error = KeyboxError;

    fn try_from(command: Commands) -> Result<Self> {
        let request = match command {
            Commands::Encrypt(args) => Request::Encrypt(EncryptRequest {
                keys: args.keys.into_sources(),
                message: args.data.into_input(args.input_encoding)?,
                output_encoding: args.output_encoding,
                sealed_box: args.sealed_box,
                output_data: args.output_data,
                output_nonce: args.output_nonce,
            }),
            Commands::Decrypt(args) => {
                let nonce_encoding = args.nonce_encoding.unwrap_or(args.input_encoding);
                let nonce = match (args.nonce, args.nonce_file) {
                    (_, Some(path)) => Some(EncodedInput::file(path, nonce_encoding)),
                    (Some(text), None) => Some(EncodedInput::inline(text, nonce_encoding)),
                    (None, None) => None,
                };
                Request::Decrypt(DecryptRequest {
                    keys: args.keys.into_sources(),
                    ciphertext: args.data.into_input(args.input_encoding)?,
                    nonce,
                    mode: args.mode,
                    output: args.output,
                })
            }
            Commands::Keygen(args) => Request::Keygen(KeygenRequest {
                public_key_path: args.output_public_key,
                private_key_path: args.output_private_key,
                format: args.format,
            }),
        };
        Ok(request)
    }
}
