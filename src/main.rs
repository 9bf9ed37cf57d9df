//! Standalone selective container hasher.
//!
//! Prints the digest of a media container in a checksum-style line so
//! output can be diffed or piped. The box walk itself lives in the
//! fingerprint crate; this binary is a thin faucet onto it.

use clap::Parser;
use keepsake_fingerprint::error::ErrorKind;
use keepsake_fingerprint::{BoxWalker, HashMode, hash_container};
use md5::Md5;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

/// Selective content hasher for ISO-BMFF media containers
#[derive(Parser, Debug)]
#[command(name = "hash-tool", version, about, long_about = None)]
struct Cli {
    /// Path to the media file to hash
    file: PathBuf,
    /// Dump the container's box layout to stderr before hashing
    #[arg(long)]
    debug: bool,
    /// Use the legacy box selection (ftyp and free instead of ftyp and mdat)
    #[arg(long)]
    legacy_algo: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug && let Err(err) = dump_boxes(&cli) {
        eprintln!("hash-tool: {err}");
    }

    let mode = if cli.legacy_algo { HashMode::Legacy } else { HashMode::Standard };
    match hash_container::<Md5>(&cli.file, mode) {
        Ok(digest) => {
            println!("{digest}\t*{}", cli.file.display());
            ExitCode::SUCCESS
        }
        Err(err) if matches!(&*err, ErrorKind::Format(_)) => {
            eprintln!("hash-tool: {err}");
            ExitCode::from(2)
        }
        Err(_) => {
            eprintln!("hash-tool: failed to hash file");
            ExitCode::from(1)
        }
    }
}

fn dump_boxes(cli: &Cli) -> keepsake_fingerprint::error::Result<()> {
    let file = File::open(&cli.file).map_err(|err| exn::Exn::from(ErrorKind::Io(err)))?;
    let mut walker = BoxWalker::new(file)?;
    while let Some(media_box) = walker.next_box()? {
        eprintln!("{:>12}  {}  {} bytes", media_box.position, media_box.fourcc_str(), media_box.size);
    }
    Ok(())
}
