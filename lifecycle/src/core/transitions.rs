//! Transition rules for the project lifecycle state machine.
//!
//! Every rule is a pure function of the current [`Phase`] and the external
//! facts; the controller performs the side effects a [`Decision`] names.

use crate::core::types::{
    Action, ChainPolicy, ChallengeChoice, GatedAction, Phase, ProjectFacts, Rejection, SaveOutcome,
};

/// What the controller must do in response to a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Refuse the action; state is unchanged.
    Reject(Rejection),
    /// Move to a new phase; the work happens on a later resolution pass.
    Enter(Phase),
    /// Create and install a fresh project now.
    CreateProject,
    /// Re-save to the last known path now, without a dialog.
    SaveInPlace,
    /// End the session now.
    Finish,
}

/// Evaluate a menu action against the current phase and project facts.
///
/// Actions are only accepted while idle, so a click can never stack a second
/// challenge or dialog on top of one already in flight.
pub fn decide(phase: &Phase, action: Action, facts: ProjectFacts) -> Decision {
    if !phase.is_idle() {
        return Decision::Reject(Rejection::Busy);
    }
    let dirty = facts.has_project && facts.dirty;

    match action {
        Action::New => {
            if dirty {
                Decision::Enter(Phase::Challenge {
                    action: GatedAction::New,
                })
            } else {
                Decision::CreateProject
            }
        }
        Action::Load => {
            if dirty {
                Decision::Enter(Phase::Challenge {
                    action: GatedAction::Load,
                })
            } else {
                Decision::Enter(Phase::LoadDialog)
            }
        }
        Action::Save => {
            if !facts.has_project {
                Decision::Reject(Rejection::NoProject)
            } else if !dirty {
                Decision::Reject(Rejection::NothingToSave)
            } else if facts.has_save_path {
                Decision::SaveInPlace
            } else {
                Decision::Enter(Phase::SaveDialog { then: None })
            }
        }
        Action::SaveAs => {
            if facts.has_project {
                Decision::Enter(Phase::SaveDialog { then: None })
            } else {
                Decision::Reject(Rejection::NoProject)
            }
        }
        Action::Quit => {
            if dirty {
                Decision::Enter(Phase::Challenge {
                    action: GatedAction::Quit,
                })
            } else {
                Decision::Finish
            }
        }
    }
}

/// Phase after the user answers the challenge for `action`.
pub fn resolve_challenge(action: GatedAction, choice: ChallengeChoice) -> Phase {
    match choice {
        ChallengeChoice::SaveFirst => Phase::SaveDialog { then: Some(action) },
        ChallengeChoice::DitchProject => Phase::proceed(action),
    }
}

/// Phase after a save dialog finishes, resuming or dropping the chained action.
///
/// A failed save always drops the chain so unsaved work is never discarded
/// behind the user's back. A cancelled save drops a chained Quit, and drops
/// New/Load only when `policy` says so.
pub fn after_save(then: Option<GatedAction>, outcome: SaveOutcome, policy: &ChainPolicy) -> Phase {
    let Some(action) = then else {
        return Phase::Idle;
    };
    match outcome {
        SaveOutcome::Saved => Phase::proceed(action),
        SaveOutcome::Cancelled if policy.aborts_on_cancel(action) => Phase::Idle,
        SaveOutcome::Cancelled => Phase::proceed(action),
        SaveOutcome::Failed => Phase::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DialogKind, QueuedAction};

    fn facts(has_project: bool, dirty: bool, has_save_path: bool) -> ProjectFacts {
        ProjectFacts {
            has_project,
            dirty,
            has_save_path,
        }
    }

    #[test]
    fn busy_phase_rejects_every_action() {
        let busy = [
            Phase::Challenge {
                action: GatedAction::Load,
            },
            Phase::SaveDialog { then: None },
            Phase::LoadDialog,
            Phase::Queued {
                action: QueuedAction::Quit,
            },
        ];
        for phase in &busy {
            for action in [
                Action::New,
                Action::Load,
                Action::Save,
                Action::SaveAs,
                Action::Quit,
            ] {
                assert_eq!(
                    decide(phase, action, facts(true, true, true)),
                    Decision::Reject(Rejection::Busy),
                    "{phase:?} / {action:?}"
                );
            }
        }
    }

    #[test]
    fn new_creates_directly_when_clean_and_challenges_when_dirty() {
        let idle = Phase::Idle;
        assert_eq!(
            decide(&idle, Action::New, facts(false, false, false)),
            Decision::CreateProject
        );
        assert_eq!(
            decide(&idle, Action::New, facts(true, false, false)),
            Decision::CreateProject
        );
        assert_eq!(
            decide(&idle, Action::New, facts(true, true, false)),
            Decision::Enter(Phase::Challenge {
                action: GatedAction::New
            })
        );
    }

    #[test]
    fn load_without_project_skips_the_challenge() {
        let decision = decide(&Phase::Idle, Action::Load, facts(false, true, false));
        assert_eq!(decision, Decision::Enter(Phase::LoadDialog));
    }

    #[test]
    fn load_with_dirty_project_challenges() {
        let decision = decide(&Phase::Idle, Action::Load, facts(true, true, false));
        assert_eq!(
            decision,
            Decision::Enter(Phase::Challenge {
                action: GatedAction::Load
            })
        );
    }

    #[test]
    fn save_uses_known_path_and_otherwise_asks() {
        assert_eq!(
            decide(&Phase::Idle, Action::Save, facts(true, true, true)),
            Decision::SaveInPlace
        );
        assert_eq!(
            decide(&Phase::Idle, Action::Save, facts(true, true, false)),
            Decision::Enter(Phase::SaveDialog { then: None })
        );
        assert_eq!(
            decide(&Phase::Idle, Action::Save, facts(true, false, true)),
            Decision::Reject(Rejection::NothingToSave)
        );
        assert_eq!(
            decide(&Phase::Idle, Action::Save, facts(false, false, false)),
            Decision::Reject(Rejection::NoProject)
        );
    }

    #[test]
    fn save_as_always_opens_a_dialog_when_a_project_exists() {
        for (dirty, known) in [(false, false), (true, true), (false, true)] {
            let decision = decide(&Phase::Idle, Action::SaveAs, facts(true, dirty, known));
            assert_eq!(decision, Decision::Enter(Phase::SaveDialog { then: None }));
            assert_eq!(
                Phase::SaveDialog { then: None }.dialog(),
                Some(DialogKind::Save)
            );
        }
    }

    #[test]
    fn quit_finishes_when_clean() {
        assert_eq!(
            decide(&Phase::Idle, Action::Quit, facts(true, false, false)),
            Decision::Finish
        );
        assert_eq!(
            decide(&Phase::Idle, Action::Quit, facts(false, false, false)),
            Decision::Finish
        );
    }

    #[test]
    fn save_first_chains_the_challenged_action() {
        assert_eq!(
            resolve_challenge(GatedAction::New, ChallengeChoice::SaveFirst),
            Phase::SaveDialog {
                then: Some(GatedAction::New)
            }
        );
    }

    #[test]
    fn ditch_proceeds_without_saving() {
        assert_eq!(
            resolve_challenge(GatedAction::Load, ChallengeChoice::DitchProject),
            Phase::LoadDialog
        );
        assert_eq!(
            resolve_challenge(GatedAction::Quit, ChallengeChoice::DitchProject),
            Phase::Queued {
                action: QueuedAction::Quit
            }
        );
    }

    #[test]
    fn cancelled_save_drops_quit_but_keeps_load_and_new_by_default() {
        let policy = ChainPolicy::default();
        assert_eq!(
            after_save(Some(GatedAction::Quit), SaveOutcome::Cancelled, &policy),
            Phase::Idle
        );
        assert_eq!(
            after_save(Some(GatedAction::Load), SaveOutcome::Cancelled, &policy),
            Phase::LoadDialog
        );
        assert_eq!(
            after_save(Some(GatedAction::New), SaveOutcome::Cancelled, &policy),
            Phase::Queued {
                action: QueuedAction::New
            }
        );
    }

    #[test]
    fn strict_policy_drops_every_chain_on_cancel() {
        let policy = ChainPolicy {
            abort_new_on_cancelled_save: true,
            abort_load_on_cancelled_save: true,
        };
        for action in [GatedAction::Load, GatedAction::New, GatedAction::Quit] {
            assert_eq!(
                after_save(Some(action), SaveOutcome::Cancelled, &policy),
                Phase::Idle
            );
        }
    }

    #[test]
    fn failed_save_drops_the_chain() {
        let policy = ChainPolicy::default();
        for action in [GatedAction::Load, GatedAction::New, GatedAction::Quit] {
            assert_eq!(
                after_save(Some(action), SaveOutcome::Failed, &policy),
                Phase::Idle
            );
        }
    }

    #[test]
    fn plain_save_returns_to_idle() {
        let policy = ChainPolicy::default();
        assert_eq!(after_save(None, SaveOutcome::Saved, &policy), Phase::Idle);
        assert_eq!(
            after_save(None, SaveOutcome::Cancelled, &policy),
            Phase::Idle
        );
    }
}
