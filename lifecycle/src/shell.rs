//! Line-oriented terminal host for the lifecycle controller.
//!
//! Input lines arrive over a channel fed by a stdin reader thread, so the
//! frame loop keeps ticking while the user types. While a terminal dialog is
//! open, the next line is its answer (empty line = cancel) and further input
//! waits until the dialog resolves.

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::controller::{Challenge, Dispatch, FrameReport, LifecycleEvent, ProjectLifecycleController};
use crate::core::types::{Action, ChallengeChoice, DialogKind, Phase};
use crate::headless::HeadlessGraph;
use crate::io::dialog::{DialogBackend, DialogRequest};

const HELP: &str = "\
commands:
  new | load | save | save-as | quit   file menu
  save-first | ditch                   answer the unsaved-changes prompt
  add <type>                           add a node of a registered type
  link <from> <to>                     link two nodes by id
  status                               show project and lifecycle state
  help                                 show this text";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Menu(Action),
    Answer(ChallengeChoice),
    Add(String),
    Link(u32, u32),
    Status,
    Help,
}

/// Parse an input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let command = match head {
        "new" => Command::Menu(Action::New),
        "load" | "open" => Command::Menu(Action::Load),
        "save" => Command::Menu(Action::Save),
        "save-as" | "saveas" => Command::Menu(Action::SaveAs),
        "quit" | "exit" => Command::Menu(Action::Quit),
        "save-first" => Command::Answer(ChallengeChoice::SaveFirst),
        "ditch" => Command::Answer(ChallengeChoice::DitchProject),
        "add" => {
            let kind = words.next().ok_or_else(|| anyhow!("usage: add <type>"))?;
            Command::Add(kind.to_string())
        }
        "link" => {
            let (Some(from), Some(to)) = (words.next(), words.next()) else {
                bail!("usage: link <from> <to>");
            };
            let parse = |raw: &str| {
                raw.parse::<u32>()
                    .map_err(|_| anyhow!("node id must be a number: {raw}"))
            };
            Command::Link(parse(from)?, parse(to)?)
        }
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        other => bail!("unknown command '{other}' (try `help`)"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument '{extra}'");
    }
    Ok(Some(command))
}

/// Dialog backend answered by the shell's own input lines.
pub struct TerminalDialogs {
    answers: Mutex<Receiver<String>>,
}

impl TerminalDialogs {
    /// Backend plus the sender the shell forwards answer lines into.
    pub fn new() -> (Arc<Self>, Sender<String>) {
        let (tx, rx) = mpsc::channel();
        let dialogs = Arc::new(Self {
            answers: Mutex::new(rx),
        });
        (dialogs, tx)
    }
}

impl DialogBackend for TerminalDialogs {
    fn pick(&self, request: &DialogRequest) -> Option<PathBuf> {
        let answer = self.answers.lock().ok()?.recv().ok()?;
        let answer = answer.trim();
        debug!(kind = ?request.kind, answer, "terminal dialog answered");
        if answer.is_empty() {
            None
        } else {
            Some(PathBuf::from(answer))
        }
    }
}

/// Why the shell returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The lifecycle finished through Quit.
    Quit,
    /// Input ended while a confirmation or unsaved work kept the session open.
    InputClosed,
}

/// Run the frame loop until the lifecycle finishes or input runs dry.
///
/// `answers` is the sender of a [`TerminalDialogs`] backend; pass `None` when
/// dialogs are answered elsewhere (native windows).
pub fn run_shell<W: Write>(
    ctrl: &mut ProjectLifecycleController<HeadlessGraph>,
    input: Receiver<String>,
    mut answers: Option<Sender<String>>,
    out: &mut W,
    frame: Duration,
) -> Result<ShellExit> {
    writeln!(out, "casa shell; type `help` for commands")?;
    let mut input_open = true;
    let mut quit_on_close_sent = false;
    let mut answered_dialog = false;
    let mut shown_challenge: Option<Challenge> = None;

    loop {
        let report = ctrl.frame();
        render_report(out, &report, &mut shown_challenge, answers.is_some())?;
        if report.done {
            return Ok(ShellExit::Quit);
        }

        // A chained dialog can open in the same frame the answered one closes.
        let dialog_opened = report
            .events
            .iter()
            .any(|event| matches!(event, LifecycleEvent::DialogOpened { .. }));
        let dialog_open = ctrl.dialog_in_flight().is_some();
        if !dialog_open || dialog_opened {
            answered_dialog = false;
        }

        if !input_open {
            let phase = ctrl.state().phase;
            if phase.is_idle() && !quit_on_close_sent {
                debug!("input closed; requesting quit");
                quit_on_close_sent = true;
                ctrl.dispatch(Action::Quit);
                continue;
            }
            if phase.is_settled() {
                return Ok(ShellExit::InputClosed);
            }
            thread::sleep(frame);
            continue;
        }

        // A modal dialog holds further commands until it resolves.
        if dialog_open && (answered_dialog || answers.is_none()) {
            thread::sleep(frame);
            continue;
        }

        match input.recv_timeout(frame) {
            Ok(line) => {
                if dialog_open {
                    if let Some(tx) = &answers {
                        answered_dialog = true;
                        if tx.send(line).is_err() {
                            writeln!(out, "dialog is no longer listening")?;
                        }
                    }
                    continue;
                }
                handle_line(ctrl, &line, out)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                input_open = false;
                // Unblocks a terminal dialog still waiting for an answer.
                answers = None;
            }
        }
    }
}

fn handle_line<W: Write>(
    ctrl: &mut ProjectLifecycleController<HeadlessGraph>,
    line: &str,
    out: &mut W,
) -> Result<()> {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(()),
        Err(err) => {
            writeln!(out, "{err}")?;
            return Ok(());
        }
    };

    match command {
        Command::Menu(action) => {
            if let Dispatch::Rejected(reason) = ctrl.dispatch(action) {
                writeln!(out, "cannot {}: {reason}", action_name(action))?;
            }
        }
        Command::Answer(choice) => {
            if let Dispatch::Rejected(reason) = ctrl.resolve_challenge(choice) {
                writeln!(out, "{reason}")?;
            }
        }
        Command::Add(kind) => match ctrl.engine_mut().add_node(&kind) {
            Ok(id) => writeln!(out, "added {kind} as node {id}")?,
            Err(err) => writeln!(out, "cannot add node: {err}")?,
        },
        Command::Link(from, to) => match ctrl.engine_mut().link(from, to) {
            Ok(()) => writeln!(out, "linked {from} -> {to}")?,
            Err(err) => writeln!(out, "cannot link: {err}")?,
        },
        Command::Status => write_status(ctrl, out)?,
        Command::Help => writeln!(out, "{HELP}")?,
    }
    Ok(())
}

fn render_report<W: Write>(
    out: &mut W,
    report: &FrameReport,
    shown_challenge: &mut Option<Challenge>,
    prompt_for_paths: bool,
) -> Result<()> {
    for event in &report.events {
        writeln!(out, "{}", describe(event, prompt_for_paths))?;
    }
    if report.challenge != *shown_challenge {
        if let Some(challenge) = &report.challenge {
            writeln!(out, "{} [save-first | ditch]", challenge.prompt())?;
        }
        *shown_challenge = report.challenge;
    }
    Ok(())
}

fn describe(event: &LifecycleEvent, prompt_for_paths: bool) -> String {
    match event {
        LifecycleEvent::DialogOpened { title, .. } if prompt_for_paths => {
            format!("{title}: enter a path (empty line cancels)")
        }
        LifecycleEvent::DialogOpened { title, .. } => format!("{title}: waiting for the file dialog"),
        LifecycleEvent::DialogFailed { kind, message } => {
            format!("{} dialog failed: {message}", dialog_name(*kind))
        }
        LifecycleEvent::ProjectCreated => "new project".to_string(),
        LifecycleEvent::Saved { path } => format!("saved {}", path.display()),
        LifecycleEvent::SaveCancelled => "save cancelled".to_string(),
        LifecycleEvent::SaveFailed { path, message } => {
            format!("could not save {}: {message}", path.display())
        }
        LifecycleEvent::Loaded { path } => format!("loaded {}", path.display()),
        LifecycleEvent::LoadCancelled => "load cancelled".to_string(),
        LifecycleEvent::LoadFailed { path, message } => {
            format!("could not load {}: {message}", path.display())
        }
        LifecycleEvent::ChainAborted { action } => format!("{action} abandoned"),
        LifecycleEvent::Finished => "bye".to_string(),
    }
}

fn write_status<W: Write>(ctrl: &ProjectLifecycleController<HeadlessGraph>, out: &mut W) -> Result<()> {
    match ctrl.engine().document() {
        Some(doc) => writeln!(
            out,
            "project: {} nodes, {} links{}",
            doc.nodes.len(),
            doc.links.len(),
            if ctrl.is_dirty() { " (unsaved changes)" } else { "" }
        )?,
        None => writeln!(out, "project: none")?,
    }
    match ctrl.last_save_path() {
        Some(path) => writeln!(out, "file: {}", path.display())?,
        None => writeln!(out, "file: not saved yet")?,
    }
    let phase = match ctrl.state().phase {
        Phase::Idle => "idle".to_string(),
        Phase::Challenge { action } => format!("confirming {action}"),
        Phase::SaveDialog { then: Some(action) } => format!("saving, then {action}"),
        Phase::SaveDialog { then: None } => "saving".to_string(),
        Phase::LoadDialog => "loading".to_string(),
        Phase::Queued { action } => format!("about to {action}"),
    };
    writeln!(out, "lifecycle: {phase}")?;
    Ok(())
}

fn action_name(action: Action) -> &'static str {
    match action {
        Action::New => "create a project",
        Action::Load => "load",
        Action::Save => "save",
        Action::SaveAs => "save as",
        Action::Quit => "quit",
    }
}

fn dialog_name(kind: DialogKind) -> &'static str {
    match kind {
        DialogKind::Save => "save",
        DialogKind::Load => "load",
    }
}
