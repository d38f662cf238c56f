//! Keybox CLI - Public-key encryption
//!
//! Command-line interface for encrypting and decrypting messages using
//! NaCl box (X25519 + XSalsa20Poly1305) and libsodium sealed boxes.

use clap::Parser;
use std::io;
use std::process;

use keybox::cli::Cli;
use keybox::logging;
use keybox::pipeline::{self, Request};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result =
        Request::try_from(cli.command).and_then(|request| pipeline::run(request, &mut out));
    if let Err(e) = result {
        tracing::debug!(category = ?e.category, kind = ?e.kind, "command failed");
        eprintln!("Error: {}", e.display_chain());
        process::exit(1);
    }
}
