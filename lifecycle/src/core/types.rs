//! Shared deterministic types for lifecycle core logic.
//!
//! These types define stable contracts between the controller and its
//! collaborators. They must not depend on external state or I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User-requested project action, usually a File menu click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    New,
    Load,
    Save,
    SaveAs,
    Quit,
}

/// Destructive action that can be gated behind a save challenge and chained
/// behind a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    Load,
    New,
    Quit,
}

impl fmt::Display for GatedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatedAction::Load => "load",
            GatedAction::New => "new",
            GatedAction::Quit => "quit",
        };
        f.write_str(name)
    }
}

/// Gated action that runs without a dialog once nothing is in front of it.
/// A Load always goes through its dialog instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuedAction {
    New,
    Quit,
}

impl From<QueuedAction> for GatedAction {
    fn from(action: QueuedAction) -> Self {
        match action {
            QueuedAction::New => GatedAction::New,
            QueuedAction::Quit => GatedAction::Quit,
        }
    }
}

impl fmt::Display for QueuedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        GatedAction::from(*self).fmt(f)
    }
}

/// Which native file dialog a task drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Save,
    Load,
}

/// The two buttons of the unsaved-changes modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeChoice {
    /// Save the current project, then resume the challenged action.
    SaveFirst,
    /// Discard unsaved changes and resume the challenged action now.
    DitchProject,
}

/// How a save-path dialog ended, as seen by the chaining rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Cancelled,
    Failed,
}

/// Pending lifecycle work. Exactly one value is live at a time, which makes
/// "at most one challenge" and "save precedes load" hold by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// The unsaved-changes modal is up for `action`.
    Challenge { action: GatedAction },
    /// A save-path dialog is queued or running; `then` resumes afterwards.
    SaveDialog { then: Option<GatedAction> },
    /// A load-path dialog is queued or running.
    LoadDialog,
    /// A New or Quit is ready to run on the next resolution pass.
    Queued { action: QueuedAction },
}

impl Phase {
    /// Phase that carries out `action` without a save in front of it.
    pub fn proceed(action: GatedAction) -> Phase {
        match action {
            GatedAction::Load => Phase::LoadDialog,
            GatedAction::New => Phase::Queued {
                action: QueuedAction::New,
            },
            GatedAction::Quit => Phase::Queued {
                action: QueuedAction::Quit,
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// True when nothing will change until the user acts again.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Challenge { .. })
    }

    /// Challenge the host must render this frame, if any.
    pub fn challenge(&self) -> Option<GatedAction> {
        match self {
            Phase::Challenge { action } => Some(*action),
            _ => None,
        }
    }

    /// Dialog that should be running for this phase, if any.
    pub fn dialog(&self) -> Option<DialogKind> {
        match self {
            Phase::SaveDialog { .. } => Some(DialogKind::Save),
            Phase::LoadDialog => Some(DialogKind::Load),
            _ => None,
        }
    }
}

/// What to do with a chained New/Load when its save dialog is cancelled.
///
/// A chained Quit is always dropped after a cancelled save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainPolicy {
    pub abort_new_on_cancelled_save: bool,
    pub abort_load_on_cancelled_save: bool,
}

impl ChainPolicy {
    pub fn aborts_on_cancel(&self, action: GatedAction) -> bool {
        match action {
            GatedAction::Quit => true,
            GatedAction::New => self.abort_new_on_cancelled_save,
            GatedAction::Load => self.abort_load_on_cancelled_save,
        }
    }
}

/// Snapshot of the external facts an action is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectFacts {
    /// A project context is installed.
    pub has_project: bool,
    /// The engine reports unsaved modifications (false without a project).
    pub dirty: bool,
    /// A previous save path is known.
    pub has_save_path: bool,
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A dialog or challenge is already in flight.
    Busy,
    /// The action needs an open project.
    NoProject,
    /// Save was requested with nothing unsaved.
    NothingToSave,
    /// A challenge answer arrived with no challenge showing.
    NoChallenge,
    /// The lifecycle already finished.
    Finished,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Busy => "a dialog or confirmation is already open",
            Rejection::NoProject => "no project is open",
            Rejection::NothingToSave => "no unsaved changes",
            Rejection::NoChallenge => "nothing is waiting for confirmation",
            Rejection::Finished => "the session has ended",
        };
        f.write_str(reason)
    }
}
