//! Per-frame orchestration of the project lifecycle.
//!
//! [`ProjectLifecycleController`] owns the lifecycle state, the project
//! context and the in-flight dialog task. The host calls
//! [`dispatch`](ProjectLifecycleController::dispatch) for menu clicks,
//! [`resolve_challenge`](ProjectLifecycleController::resolve_challenge) for
//! modal buttons, and [`frame`](ProjectLifecycleController::frame) once per
//! rendered frame.
//!
//! Resolution order inside a frame is fixed: save dialog, load dialog, queued
//! New, queued Quit, then the challenge to render. A save that completes in a
//! frame hands its chained action to the later steps of the same frame.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::core::state::{LifecycleState, StateFlags};
use crate::core::transitions::{self, Decision, after_save, decide};
use crate::core::types::{
    Action, ChallengeChoice, DialogKind, GatedAction, Phase, ProjectFacts, QueuedAction, Rejection,
    SaveOutcome,
};
use crate::engine::{ContextId, ContextSlot, GraphEngine};
use crate::io::config::LifecycleConfig;
use crate::io::dialog::{DialogBackend, DialogPoll, DialogRequest, DialogTask};
use crate::io::persistence::PersistenceGateway;

/// Something the host should show or react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    DialogOpened { kind: DialogKind, title: String },
    /// The dialog worker could not be started; treated as a cancel.
    DialogFailed { kind: DialogKind, message: String },
    ProjectCreated,
    Saved { path: PathBuf },
    SaveCancelled,
    SaveFailed { path: PathBuf, message: String },
    Loaded { path: PathBuf },
    LoadCancelled,
    LoadFailed { path: PathBuf, message: String },
    /// A chained action was dropped because its save did not happen.
    ChainAborted { action: GatedAction },
    Finished,
}

/// Immediate result of a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The action ran to completion during the call.
    Performed,
    /// The action moved the lifecycle into `Phase`; later frames finish it.
    Pending(Phase),
    Rejected(Rejection),
}

/// Unsaved-changes confirmation to render this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    pub action: GatedAction,
}

impl Challenge {
    pub fn prompt(&self) -> &'static str {
        match self.action {
            GatedAction::Load => {
                "Before you load a new project, would you like to save the current changes?"
            }
            GatedAction::New => {
                "Before you create a new project, would you like to save the current changes?"
            }
            GatedAction::Quit => "Before you quit, would you like to save the current changes?",
        }
    }
}

/// Everything the host needs after one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub events: Vec<LifecycleEvent>,
    pub challenge: Option<Challenge>,
    pub done: bool,
}

/// File menu enablement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    pub new: bool,
    pub load: bool,
    pub save: bool,
    pub save_as: bool,
    pub quit: bool,
}

impl MenuState {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::New => self.new,
            Action::Load => self.load,
            Action::Save => self.save,
            Action::SaveAs => self.save_as,
            Action::Quit => self.quit,
        }
    }
}

/// State machine sequencing New/Load/Save/Save As/Quit against open dialogs
/// and the engine's dirty flag.
pub struct ProjectLifecycleController<E: GraphEngine> {
    engine: E,
    config: LifecycleConfig,
    state: LifecycleState,
    slot: ContextSlot,
    dialogs: Arc<dyn DialogBackend>,
    task: Option<DialogTask>,
    gateway: PersistenceGateway,
    node_types: Vec<E::NodeType>,
    events: Vec<LifecycleEvent>,
}

impl<E: GraphEngine> ProjectLifecycleController<E> {
    /// Build a controller with no project open.
    ///
    /// `node_types` are registered on every project created by New or Load.
    pub fn new(
        engine: E,
        dialogs: Arc<dyn DialogBackend>,
        config: LifecycleConfig,
        node_types: Vec<E::NodeType>,
    ) -> Self {
        Self {
            engine,
            config,
            state: LifecycleState::default(),
            slot: ContextSlot::default(),
            dialogs,
            task: None,
            gateway: PersistenceGateway,
            node_types,
            events: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable engine access for editing and rendering the open graph.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn flags(&self) -> StateFlags {
        self.state.flags()
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    pub fn active_context(&self) -> Option<ContextId> {
        self.slot.get()
    }

    pub fn has_project(&self) -> bool {
        self.slot.is_open()
    }

    pub fn is_dirty(&self) -> bool {
        self.slot.is_open() && self.engine.is_project_dirty()
    }

    pub fn last_save_path(&self) -> Option<&Path> {
        self.state.last_save_path()
    }

    /// Kind of the dialog whose worker is currently running, if any.
    pub fn dialog_in_flight(&self) -> Option<DialogKind> {
        self.task.as_ref().map(DialogTask::kind)
    }

    pub fn menu(&self) -> MenuState {
        let idle = self.state.phase.is_idle() && !self.state.done;
        let facts = self.facts();
        MenuState {
            new: idle,
            load: idle,
            save: idle && facts.has_project && facts.dirty,
            save_as: idle && facts.has_project,
            quit: idle,
        }
    }

    fn facts(&self) -> ProjectFacts {
        ProjectFacts {
            has_project: self.has_project(),
            dirty: self.is_dirty(),
            has_save_path: self.state.last_save_path.is_some(),
        }
    }

    /// Apply a menu action.
    #[instrument(skip(self))]
    pub fn dispatch(&mut self, action: Action) -> Dispatch {
        if self.state.done {
            return Dispatch::Rejected(Rejection::Finished);
        }
        let decision = decide(&self.state.phase, action, self.facts());
        debug!(?decision, "action evaluated");
        match decision {
            Decision::Reject(reason) => {
                debug!(%reason, "action rejected");
                Dispatch::Rejected(reason)
            }
            Decision::Enter(phase) => {
                self.enter(phase);
                Dispatch::Pending(phase)
            }
            Decision::CreateProject => {
                self.create_project();
                Dispatch::Performed
            }
            Decision::SaveInPlace => {
                if let Some(path) = self.state.last_save_path.clone() {
                    self.save_to(&path);
                }
                Dispatch::Performed
            }
            Decision::Finish => {
                self.finish();
                Dispatch::Performed
            }
        }
    }

    /// Apply the user's answer to the challenge currently showing.
    #[instrument(skip(self))]
    pub fn resolve_challenge(&mut self, choice: ChallengeChoice) -> Dispatch {
        let Some(action) = self.state.phase.challenge() else {
            return Dispatch::Rejected(Rejection::NoChallenge);
        };
        let next = transitions::resolve_challenge(action, choice);
        info!(%action, ?choice, "challenge resolved");
        self.enter(next);
        Dispatch::Pending(next)
    }

    /// Advance pending work by one frame. Never blocks.
    pub fn frame(&mut self) -> FrameReport {
        if !self.state.done {
            self.resolve_save_dialog();
            self.resolve_load_dialog();
            self.resolve_queued();
        }
        FrameReport {
            events: mem::take(&mut self.events),
            challenge: self
                .state
                .phase
                .challenge()
                .map(|action| Challenge { action }),
            done: self.state.done,
        }
    }

    /// Drop any outstanding dialog and destroy the project context.
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abandon();
        }
        self.slot.release(&mut self.engine);
    }

    fn resolve_save_dialog(&mut self) {
        let Phase::SaveDialog { then } = self.state.phase else {
            return;
        };
        let Some(picked) = self.poll_dialog(DialogKind::Save) else {
            return;
        };
        let outcome = match picked {
            Some(path) => {
                let path = self.with_project_extension(path);
                self.save_to(&path)
            }
            None => {
                info!("save dialog cancelled");
                self.events.push(LifecycleEvent::SaveCancelled);
                SaveOutcome::Cancelled
            }
        };

        let next = after_save(then, outcome, &self.config.chain);
        if let Some(action) = then {
            if next.is_idle() {
                info!(%action, ?outcome, "chained action dropped");
                self.events.push(LifecycleEvent::ChainAborted { action });
            }
        }
        self.enter(next);
    }

    fn resolve_load_dialog(&mut self) {
        if self.state.phase != Phase::LoadDialog {
            return;
        }
        let Some(picked) = self.poll_dialog(DialogKind::Load) else {
            return;
        };
        match picked {
            Some(path) => self.open_project(&path),
            None => {
                info!("load dialog cancelled");
                self.events.push(LifecycleEvent::LoadCancelled);
            }
        }
        self.enter(Phase::Idle);
    }

    fn resolve_queued(&mut self) {
        let Phase::Queued { action } = self.state.phase else {
            return;
        };
        self.enter(Phase::Idle);
        match action {
            QueuedAction::New => self.create_project(),
            QueuedAction::Quit => self.finish(),
        }
    }

    /// Start the dialog for `kind` if needed and return its answer once ready.
    ///
    /// `None` means still pending; `Some(None)` means cancelled.
    fn poll_dialog(&mut self, kind: DialogKind) -> Option<Option<PathBuf>> {
        if let Some(stale) = self.task.take_if(|task| task.kind() != kind) {
            warn!(stale = ?stale.kind(), wanted = ?kind, "dropping dialog task for another phase");
            stale.abandon();
        }

        if self.task.is_none() {
            let request = DialogRequest::new(kind, &self.config, self.default_dialog_path(kind));
            let title = request.title.clone();
            match DialogTask::start(Arc::clone(&self.dialogs), request) {
                Ok(task) => {
                    self.task = Some(task);
                    self.events
                        .push(LifecycleEvent::DialogOpened { kind, title });
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(?kind, err = %message, "dialog failed to start");
                    self.events
                        .push(LifecycleEvent::DialogFailed { kind, message });
                    return Some(None);
                }
            }
        }

        match self.task.as_mut()?.poll() {
            DialogPoll::Pending => None,
            DialogPoll::Ready => self.task.take().map(DialogTask::take),
        }
    }

    fn default_dialog_path(&self, kind: DialogKind) -> Option<PathBuf> {
        let last = self.state.last_save_path.clone();
        match kind {
            DialogKind::Save => {
                last.or_else(|| Some(PathBuf::from(&self.config.project.default_file_name)))
            }
            DialogKind::Load => last,
        }
    }

    fn with_project_extension(&self, path: PathBuf) -> PathBuf {
        if path.extension().is_some() {
            path
        } else {
            path.with_extension(&self.config.project.extension)
        }
    }

    fn save_to(&mut self, path: &Path) -> SaveOutcome {
        match self.gateway.save(&self.engine, path) {
            Ok(()) => {
                self.engine.clear_project_dirty_flag();
                self.state.last_save_path = Some(path.to_path_buf());
                info!(path = %path.display(), "project saved");
                self.events.push(LifecycleEvent::Saved {
                    path: path.to_path_buf(),
                });
                SaveOutcome::Saved
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(path = %path.display(), err = %message, "save failed");
                self.events.push(LifecycleEvent::SaveFailed {
                    path: path.to_path_buf(),
                    message,
                });
                SaveOutcome::Failed
            }
        }
    }

    /// Load `path` into a fresh context. The open project is only replaced
    /// once the load succeeded.
    fn open_project(&mut self, path: &Path) {
        let previous = self.slot.get();
        let fresh = self.create_registered_context();

        match self.gateway.load(&mut self.engine, path) {
            Ok(()) => {
                self.engine.clear_project_dirty_flag();
                self.slot.install(&mut self.engine, fresh);
                self.state.last_save_path = Some(path.to_path_buf());
                info!(path = %path.display(), context = fresh.raw(), "project loaded");
                self.events.push(LifecycleEvent::Loaded {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => {
                self.engine.destroy_context(fresh);
                self.engine.set_active_context(previous);
                let message = format!("{err:#}");
                warn!(path = %path.display(), err = %message, "load failed");
                self.events.push(LifecycleEvent::LoadFailed {
                    path: path.to_path_buf(),
                    message,
                });
            }
        }
    }

    fn create_project(&mut self) {
        let fresh = self.create_registered_context();
        self.slot.install(&mut self.engine, fresh);
        self.state.last_save_path = None;
        info!(context = fresh.raw(), "new project created");
        self.events.push(LifecycleEvent::ProjectCreated);
    }

    /// Create a context, make it active and register every node type on it.
    fn create_registered_context(&mut self) -> ContextId {
        let id = self.engine.create_context(&self.config.asset_root);
        self.engine.set_active_context(Some(id));
        for definition in &self.node_types {
            self.engine.register_node_type(definition.clone());
        }
        id
    }

    fn finish(&mut self) {
        info!("lifecycle finished");
        self.state.done = true;
        self.events.push(LifecycleEvent::Finished);
    }

    fn enter(&mut self, phase: Phase) {
        if self.state.phase != phase {
            debug!(from = ?self.state.phase, to = ?phase, "phase change");
        }
        self.state.phase = phase;
    }
}

impl<E: GraphEngine> Drop for ProjectLifecycleController<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGraph;
    use crate::test_support::{ScriptedDialogs, controller, settle};

    #[test]
    fn new_on_clean_start_installs_registered_context() {
        let mut ctrl = controller(ScriptedDialogs::new(Vec::new()));
        assert_eq!(ctrl.dispatch(Action::New), Dispatch::Performed);

        assert!(ctrl.has_project());
        assert!(!ctrl.is_dirty());
        assert!(ctrl.engine().registered_types().contains(&"Branch"));
        assert_eq!(ctrl.frame().events, vec![LifecycleEvent::ProjectCreated]);
    }

    #[test]
    fn menu_follows_project_and_dirty_state() {
        let mut ctrl = controller(ScriptedDialogs::new(Vec::new()));
        let menu = ctrl.menu();
        assert!(menu.new && menu.load && menu.quit);
        assert!(!menu.save && !menu.save_as);

        ctrl.dispatch(Action::New);
        assert!(ctrl.menu().save_as);
        assert!(!ctrl.menu().save);

        ctrl.engine_mut().add_node("DoN").expect("add");
        assert!(ctrl.menu().allows(Action::Save));

        ctrl.dispatch(Action::Quit);
        assert_eq!(ctrl.menu(), MenuState::default());
    }

    #[test]
    fn actions_are_rejected_while_a_challenge_is_up() {
        let mut ctrl = controller(ScriptedDialogs::new(Vec::new()));
        ctrl.dispatch(Action::New);
        ctrl.engine_mut().add_node("Branch").expect("add");

        assert_eq!(
            ctrl.dispatch(Action::Load),
            Dispatch::Pending(Phase::Challenge {
                action: GatedAction::Load
            })
        );
        assert_eq!(
            ctrl.dispatch(Action::Quit),
            Dispatch::Rejected(Rejection::Busy)
        );
        assert!(ctrl.flags().challenge_on_load);
        assert!(!ctrl.flags().challenge_on_quit);
    }

    #[test]
    fn challenge_answer_without_challenge_is_rejected() {
        let mut ctrl = controller(ScriptedDialogs::new(Vec::new()));
        assert_eq!(
            ctrl.resolve_challenge(ChallengeChoice::DitchProject),
            Dispatch::Rejected(Rejection::NoChallenge)
        );
    }

    #[test]
    fn save_path_without_extension_gets_project_extension() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dialogs = ScriptedDialogs::new(vec![Some(temp.path().join("untitled"))]);
        let mut ctrl = controller(dialogs);
        ctrl.dispatch(Action::New);
        ctrl.dispatch(Action::SaveAs);

        let events = settle(&mut ctrl);
        let expected = temp.path().join("untitled.csa");
        assert!(events.contains(&LifecycleEvent::Saved {
            path: expected.clone()
        }));
        assert!(expected.exists());
        assert_eq!(ctrl.last_save_path(), Some(expected.as_path()));
    }

    #[test]
    fn failed_load_keeps_current_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.csa");
        let mut ctrl = controller(ScriptedDialogs::new(vec![Some(missing.clone())]));
        ctrl.dispatch(Action::New);
        ctrl.engine_mut().add_node("SetTimer").expect("add");
        ctrl.engine_mut().clear_project_dirty_flag();
        let before = ctrl.active_context();

        ctrl.dispatch(Action::Load);
        let events = settle(&mut ctrl);

        assert!(matches!(
            events.last(),
            Some(LifecycleEvent::LoadFailed { path, .. }) if *path == missing
        ));
        assert_eq!(ctrl.active_context(), before);
        assert_eq!(ctrl.engine().active_context(), before);
        assert_eq!(ctrl.engine().live_contexts(), 1);
        assert_eq!(ctrl.engine().document().map(|doc| doc.nodes.len()), Some(1));
    }

    #[test]
    fn shutdown_releases_context_and_is_repeatable() {
        let mut ctrl = controller(ScriptedDialogs::new(Vec::new()));
        ctrl.dispatch(Action::New);
        ctrl.shutdown();
        ctrl.shutdown();
        assert!(!ctrl.has_project());
        assert_eq!(ctrl.engine().live_contexts(), 0);
    }

    #[test]
    fn frame_after_done_is_inert() {
        let mut ctrl: ProjectLifecycleController<HeadlessGraph> =
            controller(ScriptedDialogs::new(Vec::new()));
        assert_eq!(ctrl.dispatch(Action::Quit), Dispatch::Performed);
        let report = ctrl.frame();
        assert!(report.done);
        assert_eq!(report.events, vec![LifecycleEvent::Finished]);
        assert_eq!(ctrl.dispatch(Action::New), Dispatch::Rejected(Rejection::Finished));
        assert!(ctrl.frame().events.is_empty());
    }
}
