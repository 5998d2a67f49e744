//! `casa`: terminal host for the Casa project lifecycle.
//!
//! `casa init` writes a default `casa.toml`; `casa shell` runs the File menu
//! (New, Load, Save, Save As, Quit) against a headless graph engine.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use casa_lifecycle::controller::ProjectLifecycleController;
use casa_lifecycle::exit_codes;
use casa_lifecycle::headless::{HeadlessGraph, default_catalog};
use casa_lifecycle::io::config::{LifecycleConfig, load_config, write_config};
use casa_lifecycle::io::dialog::DialogBackend;
use casa_lifecycle::logging;
use casa_lifecycle::shell::{ShellExit, TerminalDialogs, run_shell};

#[derive(Parser)]
#[command(name = "casa", version, about = "Project lifecycle shell for the Casa node editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        #[arg(long, default_value = "casa.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the interactive File menu shell.
    Shell {
        /// Config file; defaults apply when it does not exist.
        #[arg(long, default_value = "casa.toml")]
        config: PathBuf,
        /// How file dialogs are answered.
        #[arg(long, value_enum, default_value_t = DialogMode::Terminal)]
        dialogs: DialogMode,
        /// Frame interval in milliseconds.
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..))]
        frame_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DialogMode {
    /// Type paths at the prompt.
    Terminal,
    /// Open the platform file picker.
    Native,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Shell {
            config,
            dialogs,
            frame_ms,
        } => cmd_shell(&config, dialogs, Duration::from_millis(frame_ms)),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &LifecycleConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_shell(config_path: &Path, mode: DialogMode, frame: Duration) -> Result<i32> {
    let config = load_config(config_path)?;
    info!(config = %config_path.display(), ?mode, "starting shell");

    let (backend, answers) = match mode {
        DialogMode::Terminal => {
            let (dialogs, answers) = TerminalDialogs::new();
            let backend: Arc<dyn DialogBackend> = dialogs;
            (backend, Some(answers))
        }
        DialogMode::Native => (native_dialogs()?, None),
    };

    let input = spawn_stdin_reader()?;
    let mut ctrl =
        ProjectLifecycleController::new(HeadlessGraph::new(), backend, config, default_catalog());
    let stdout = io::stdout();
    let exit = run_shell(&mut ctrl, input, answers, &mut stdout.lock(), frame)?;
    ctrl.shutdown();

    Ok(match exit {
        ShellExit::Quit => exit_codes::OK,
        ShellExit::InputClosed => exit_codes::INTERRUPTED,
    })
}

#[cfg(feature = "native-dialogs")]
fn native_dialogs() -> Result<Arc<dyn DialogBackend>> {
    Ok(Arc::new(casa_lifecycle::io::native_dialog::NativeDialogs))
}

#[cfg(not(feature = "native-dialogs"))]
fn native_dialogs() -> Result<Arc<dyn DialogBackend>> {
    bail!("native dialogs are not available in this build (enable the `native-dialogs` feature)")
}

/// Forward stdin lines to a channel; the channel closes at EOF.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("casa-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        })
        .context("spawn stdin reader")?;
    Ok(rx)
}
