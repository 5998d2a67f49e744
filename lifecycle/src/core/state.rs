//! Mutable lifecycle record owned by the controller.

use std::path::{Path, PathBuf};

use crate::core::types::{GatedAction, Phase};

/// Lifecycle bookkeeping. The active project context lives next to it in the
/// controller's [`ContextSlot`](crate::engine::ContextSlot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleState {
    pub phase: Phase,
    /// Target of the last successful save (or load); `Save` reuses it silently.
    pub last_save_path: Option<PathBuf>,
    /// Terminal: the host stops its loop once this is set.
    pub done: bool,
}

impl LifecycleState {
    pub fn last_save_path(&self) -> Option<&Path> {
        self.last_save_path.as_deref()
    }

    /// Flat boolean view of the current phase.
    pub fn flags(&self) -> StateFlags {
        let queued = |wanted: GatedAction| match self.phase {
            Phase::Queued { action } => GatedAction::from(action) == wanted,
            Phase::SaveDialog { then } => then == Some(wanted),
            _ => false,
        };
        let challenge = |wanted: GatedAction| self.phase.challenge() == Some(wanted);

        StateFlags {
            awaiting_save_dialog: matches!(self.phase, Phase::SaveDialog { .. }),
            awaiting_load_dialog: matches!(self.phase, Phase::LoadDialog)
                || queued(GatedAction::Load),
            awaiting_new: queued(GatedAction::New),
            awaiting_quit: queued(GatedAction::Quit),
            challenge_on_load: challenge(GatedAction::Load),
            challenge_on_new: challenge(GatedAction::New),
            challenge_on_quit: challenge(GatedAction::Quit),
            done: self.done,
        }
    }
}

/// Boolean projection of [`LifecycleState`], one flag per pending concern.
///
/// Derived on demand; there is no way to set two challenge flags at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFlags {
    pub awaiting_save_dialog: bool,
    pub awaiting_load_dialog: bool,
    pub awaiting_new: bool,
    pub awaiting_quit: bool,
    pub challenge_on_load: bool,
    pub challenge_on_new: bool,
    pub challenge_on_quit: bool,
    pub done: bool,
}

impl StateFlags {
    pub fn challenge_count(&self) -> usize {
        [
            self.challenge_on_load,
            self.challenge_on_new,
            self.challenge_on_quit,
        ]
        .iter()
        .filter(|flag| **flag)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::QueuedAction;

    fn state(phase: Phase) -> LifecycleState {
        LifecycleState {
            phase,
            ..LifecycleState::default()
        }
    }

    #[test]
    fn idle_state_has_no_flags() {
        assert_eq!(state(Phase::Idle).flags(), StateFlags::default());
    }

    #[test]
    fn chained_save_reports_both_dialog_and_follow_up() {
        let flags = state(Phase::SaveDialog {
            then: Some(GatedAction::Load),
        })
        .flags();
        assert!(flags.awaiting_save_dialog);
        assert!(flags.awaiting_load_dialog);
        assert!(!flags.awaiting_new);
        assert_eq!(flags.challenge_count(), 0);
    }

    #[test]
    fn each_challenge_maps_to_exactly_one_flag() {
        for action in [GatedAction::Load, GatedAction::New, GatedAction::Quit] {
            let flags = state(Phase::Challenge { action }).flags();
            assert_eq!(flags.challenge_count(), 1);
            assert_eq!(flags.challenge_on_load, action == GatedAction::Load);
            assert_eq!(flags.challenge_on_new, action == GatedAction::New);
            assert_eq!(flags.challenge_on_quit, action == GatedAction::Quit);
        }
    }

    #[test]
    fn queued_quit_sets_awaiting_quit_only() {
        let flags = state(Phase::Queued {
            action: QueuedAction::Quit,
        })
        .flags();
        assert_eq!(
            flags,
            StateFlags {
                awaiting_quit: true,
                ..StateFlags::default()
            }
        );
    }
}
