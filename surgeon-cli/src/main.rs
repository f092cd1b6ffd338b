//! Command-line front end: a thin, non-interactive wrapper around
//! [`surgeon_core`]'s dumpfile translator and fast-import stream codec.
//! There is no command interpreter here — batch editing happens by scripting
//! `surgeon-core` as a library; this binary only covers the two shapes of
//! work that make sense as single, non-interactive invocations: converting
//! a Subversion dump into a fast-import stream, and running bulk cleanup
//! (dedup, gc) over an existing one.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fast_export::dump::Dump;

use surgeon_core::Config;

#[derive(Parser)]
#[command(name = "repo-surgeon", version, about = "Edit and convert version-control histories")]
struct Cli {
    /// Abort on the first non-fatal warning instead of logging and
    /// continuing.
    #[arg(long, global = true)]
    strict: bool,

    /// Suppress progress logging below warnings.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a centralized Subversion dumpfile into a git fast-import
    /// stream.
    Translate {
        /// Dumpfile to read, or `-` for stdin.
        #[arg(long, default_value = "-")]
        input: PathBuf,
        /// Stream to write, or `-` for stdout.
        #[arg(long, default_value = "-")]
        output: PathBuf,
        /// VCS-default ignore pattern block prepended to every synthesized
        /// `.gitignore`. Empty disables automatic ignores.
        #[arg(long, default_value = "")]
        ignore_prefix: String,
    },
    /// Read a fast-import stream, run bulk cleanup over it, and write it
    /// back out.
    Pack {
        #[arg(long, default_value = "-")]
        input: PathBuf,
        #[arg(long, default_value = "-")]
        output: PathBuf,
        /// Merge blobs with identical content.
        #[arg(long)]
        dedup: bool,
        /// Drop blobs no surviving fileop references and renumber.
        #[arg(long)]
        gc: bool,
    },
}

fn open_input(path: &PathBuf) -> Result<Box<dyn io::BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_output(path: &PathBuf) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

fn write_stream(commands: &[fast_export::Command], mut out: Box<dyn Write>) -> Result<()> {
    for command in commands {
        command.dump(&mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = Config { strict: cli.strict, quiet: cli.quiet, ..Config::default() };

    match cli.command {
        Commands::Translate { input, output, ignore_prefix } => {
            let reader = open_input(&input)?;
            let revisions = surgeon_core::dumpfile::parse_dump(reader)
                .with_context(|| format!("parsing dumpfile {}", input.display()))?;
            let repo = surgeon_core::dumpfile::translate(revisions, &config, &ignore_prefix);
            let commands = surgeon_core::stream::export(&repo);
            write_stream(&commands, open_output(&output)?)?;
        }
        Commands::Pack { input, output, dedup, gc } => {
            let mut reader = open_input(&input)?;
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            let commands = fast_export::Parser::new(bytes.as_slice())
                .parse_all()
                .with_context(|| format!("parsing stream {}", input.display()))?;
            let mut repo = surgeon_core::stream::import(commands)?;
            if dedup {
                repo.dedup();
            }
            if gc {
                repo.gc();
            }
            let commands = surgeon_core::stream::export(&repo);
            write_stream(&commands, open_output(&output)?)?;
        }
    }

    Ok(())
}
