//! Minimal front-end over `lob_core`: enough argv plumbing to exercise the
//! Chunked Object Store and Fsck end to end without a real VCS in front of
//! it. A production front-end would add the rest of §4.6's commands wired
//! to an actual VCS binary; this one just proves the library surface works.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use lob_core::error::LobError;
use lob_core::store::ChunkedObjectStore;
use lob_core::sync::{fsck, FsckRequest};

#[derive(Parser)]
#[command(name = "lobctl", version, about = "Chunked large-object store smoke test")]
struct Cli {
    /// Local LOB store root.
    #[arg(long, env = "LOBCTL_STORE", default_value = ".git-lob/objects")]
    store: PathBuf,

    /// Shared store root, if this repo dedups against one.
    #[arg(long, env = "LOBCTL_SHARED")]
    shared: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file's content and print its SHA-1.
    Store { path: PathBuf },
    /// Retrieve a LOB by SHA-1 to stdout.
    Retrieve { sha: String },
    /// Walk the local store verifying every LOB.
    Fsck {
        #[arg(long)]
        deep: bool,
        #[arg(long)]
        delete_corrupt: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(exit_code_for(&e));
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LobError>() {
        Some(LobError::NotFound(_)) | Some(LobError::NotFoundForShas(_, _)) => 3,
        Some(LobError::Config(_)) => 6,
        Some(LobError::Integrity(_)) | Some(LobError::WrongSize { .. }) => 12,
        _ => 1,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store = ChunkedObjectStore::new(&cli.store, cli.shared.clone())?;

    match cli.command {
        Commands::Store { path } => {
            let file = std::fs::File::open(&path)?;
            let info = store.store(&[], file)?;
            println!("{}", info.sha);
        }
        Commands::Retrieve { sha } => {
            let sha = lob_core::Sha1Hash::from_hex(&sha)?;
            let stdout = std::io::stdout();
            store.retrieve(&sha, stdout.lock(), false, None)?;
        }
        Commands::Fsck { deep, delete_corrupt } => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
            bar.set_message("checking local store...");
            bar.enable_steady_tick(std::time::Duration::from_millis(100));

            let req = FsckRequest { only: None, deep, delete_corrupt };
            let outcome = fsck(&store, &req)?;
            bar.finish_and_clear();

            println!(
                "checked {} LOBs, {} corrupt, {} deleted",
                outcome.checked,
                outcome.corrupt.len(),
                outcome.deleted.len()
            );
            if !outcome.corrupt.is_empty() && !delete_corrupt {
                process::exit(12);
            }
        }
    }
    Ok(())
}
