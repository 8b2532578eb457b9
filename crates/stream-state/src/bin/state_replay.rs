//! `state-replay`: rebuild a state tree from a chunk stream.
//!
//! Usage:
//!   state-replay [OPTIONS.toml] < chunks.ndjson
//!
//! Chunks are read from stdin, one JSON object per line. The final state is
//! printed to stdout as pretty JSON. Set `RUST_LOG=debug` to see each batch.

use std::io::{self, Read, Write};

use stream_state::cli::{load_options, replay_chunks, CliError};
use stream_state::StoreOptions;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}

fn run() -> Result<String, CliError> {
    let options = match std::env::args().nth(1) {
        Some(path) => load_options(&std::fs::read_to_string(path)?)?,
        None => StoreOptions::default(),
    };

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let state = replay_chunks(&input, options)?;
    serde_json::to_string_pretty(&state).map_err(CliError::Encode)
}

fn main() {
    init_tracing();
    match run() {
        Ok(output) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{output}") {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
