//! `boxfs`: a command-line driver over the container filesystem in `boxfs`
//! (the library crate). Argument parsing, verb dispatch, and host-file I/O
//! live here; everything below this layer is the sector engine (spec.md
//! §1: "all surrounding pieces ... are core-adjacent").
//!
//! Grounded on `dos_emu/tools/extract.rs`'s `clap` (derive) + `anyhow`
//! pattern: a `Parser` struct holding global flags, a `Subcommand` enum with
//! one variant per verb, and `anyhow::Context` wrapping every fallible call
//! with the verb and path being operated on.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use boxfs::record::SlotKind;
use boxfs::{Container, Path};

#[derive(Parser)]
#[command(name = "boxfs")]
#[command(about = "A self-contained, single-file container filesystem", long_about = None)]
struct Cli {
    /// Increase logging verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all logging except errors.
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new container file.
    Init {
        container: PathBuf,
        /// Overwrite the container if it already exists.
        #[arg(long)]
        force: bool,
    },
    /// Create a directory inside the container.
    Mkdir { container: PathBuf, path: String },
    /// Create an empty user file inside the container.
    Touch { container: PathBuf, path: String },
    /// Write (replacing) a host file's contents into a container file.
    Gulp {
        container: PathBuf,
        path: String,
        #[arg(long = "from")]
        from: PathBuf,
    },
    /// Append a host file's contents onto a container file.
    Append {
        container: PathBuf,
        path: String,
        #[arg(long = "from")]
        from: PathBuf,
    },
    /// Print a container file's contents to stdout.
    Cat { container: PathBuf, path: String },
    /// List a directory's (or a single file's) entries.
    Ls {
        container: PathBuf,
        #[arg(default_value = "")]
        path: String,
    },
    /// Remove an entry (and, for a directory, its whole subtree).
    Rm { container: PathBuf, path: String },
    /// Not supported: stubbed in the original, rejected here at runtime.
    Cp { container: PathBuf, src: String, dst: String },
    /// Not supported: stubbed in the original, rejected here at runtime.
    Mv { container: PathBuf, src: String, dst: String },
    /// Not supported: stubbed in the original, rejected here at runtime.
    Seek { container: PathBuf, path: String, offset: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(&cli.command) {
        log::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    // Best-effort: a logger is already installed (e.g. under a test
    // harness) is not a reason to abort the whole command.
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn run(command: &Command) -> Result<()> {
    match command {
        Command::Init { container, force } => {
            Container::create(container, *force)
                .with_context(|| format!("init {}", container.display()))?;
        }
        Command::Mkdir { container, path } => {
            let p = parse_path(path)?;
            let mut c = open(container)?;
            c.mkdir(&p).with_context(|| format!("mkdir {path}"))?;
        }
        Command::Touch { container, path } => {
            let p = parse_path(path)?;
            let mut c = open(container)?;
            c.touch(&p).with_context(|| format!("touch {path}"))?;
        }
        Command::Gulp { container, path, from } => {
            let p = parse_path(path)?;
            let data = std::fs::read(from)
                .with_context(|| format!("reading host file {}", from.display()))?;
            let mut c = open(container)?;
            c.write_file(&p, &data)
                .with_context(|| format!("gulp {path} from {}", from.display()))?;
        }
        Command::Append { container, path, from } => {
            let p = parse_path(path)?;
            let data = std::fs::read(from)
                .with_context(|| format!("reading host file {}", from.display()))?;
            let mut c = open(container)?;
            c.append_file(&p, &data)
                .with_context(|| format!("append {path} from {}", from.display()))?;
        }
        Command::Cat { container, path } => {
            let p = parse_path(path)?;
            let mut c = open(container)?;
            let data = c.read_file(&p).with_context(|| format!("cat {path}"))?;
            std::io::stdout()
                .write_all(&data)
                .context("writing to stdout")?;
        }
        Command::Ls { container, path } => {
            let p = parse_path(path)?;
            let mut c = open(container)?;
            let entries = c.list(&p).with_context(|| format!("ls {path}"))?;
            for entry in entries {
                let tag = match entry.kind {
                    SlotKind::Dir => "Directory",
                    SlotKind::UserFile => "UserFile",
                    SlotKind::Free => unreachable!("list never yields a free slot"),
                };
                println!("{tag}  {}", entry.name);
            }
        }
        Command::Rm { container, path } => {
            let p = parse_path(path)?;
            let mut c = open(container)?;
            c.remove(&p).with_context(|| format!("rm {path}"))?;
        }
        Command::Cp { .. } | Command::Mv { .. } | Command::Seek { .. } => {
            bail!(boxfs::Error::Unsupported(
                "cp/mv/seek are recognized but not implemented"
            ));
        }
    }
    Ok(())
}

fn open(container: &PathBuf) -> Result<Container<std::fs::File>> {
    Container::open(container).with_context(|| format!("opening container {}", container.display()))
}

fn parse_path(raw: &str) -> Result<Path> {
    Path::parse(raw).with_context(|| format!("invalid path {raw:?}"))
}
