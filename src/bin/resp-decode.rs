use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use resp::config::{
    DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ELEMENTS, DEFAULT_MAX_FRAME_SIZE,
};
use resp::{Connection, Limits};
use tokio::{fs::File, io::AsyncRead};
use tracing::debug;

/// Decode RESP values and print them the way redis-cli does.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// File to decode; reads stdin when omitted.
    file: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_ELEMENTS)]
    max_elements: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_BULK_LEN)]
    max_bulk_len: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

impl Args {
    fn limits(&self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            max_elements: self.max_elements,
            max_bulk_len: self.max_bulk_len,
            max_frame_size: self.max_frame_size,
        }
    }
}

async fn decode_all<S: AsyncRead + Unpin>(mut connection: Connection<S>) -> anyhow::Result<()> {
    let mut count = 0usize;
    loop {
        match connection.read_value().await {
            Ok(value) => {
                count += 1;
                print!("{value:?}");
            }
            Err(err) if err.is_closed() => {
                debug!("decoded {} values", count);
                return Ok(());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to decode value #{}", count + 1))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    let limits = args.limits();

    match &args.file {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            decode_all(Connection::with_limits(file, limits)).await
        }
        None => decode_all(Connection::with_limits(tokio::io::stdin(), limits)).await,
    }
}
