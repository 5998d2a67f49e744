//! Test-only helpers: scripted dialogs, temp workspaces and frame stepping.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::controller::{FrameReport, LifecycleEvent, ProjectLifecycleController};
use crate::engine::GraphEngine;
use crate::headless::{HeadlessGraph, default_catalog};
use crate::io::config::LifecycleConfig;
use crate::io::dialog::{DialogBackend, DialogRequest};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dialog backend answering from a queue. An exhausted queue answers "cancel".
pub struct ScriptedDialogs {
    answers: Mutex<VecDeque<Option<PathBuf>>>,
    requests: Mutex<Vec<DialogRequest>>,
    gate: Option<Mutex<Receiver<()>>>,
}

impl ScriptedDialogs {
    pub fn new(answers: Vec<Option<PathBuf>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Like [`new`](Self::new), but every dialog stays open until
    /// [`DialogGate::release`] is called once for it.
    pub fn gated(answers: Vec<Option<PathBuf>>) -> (Arc<Self>, DialogGate) {
        let (tx, rx) = mpsc::channel();
        let dialogs = Arc::new(Self {
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(Mutex::new(rx)),
        });
        (dialogs, DialogGate(tx))
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<DialogRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

impl DialogBackend for ScriptedDialogs {
    fn pick(&self, request: &DialogRequest) -> Option<PathBuf> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(gate) = &self.gate {
            gate.lock().ok()?.recv().ok()?;
        }
        self.answers.lock().ok()?.pop_front().flatten()
    }
}

/// Releases gated scripted dialogs one at a time.
pub struct DialogGate(Sender<()>);

impl DialogGate {
    pub fn release(&self) {
        let _ = self.0.send(());
    }
}

/// Temporary directory for project files.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace")?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Controller over a [`HeadlessGraph`] with default config and node catalog.
pub fn controller(dialogs: Arc<ScriptedDialogs>) -> ProjectLifecycleController<HeadlessGraph> {
    controller_with_config(dialogs, LifecycleConfig::default())
}

pub fn controller_with_config(
    dialogs: Arc<ScriptedDialogs>,
    config: LifecycleConfig,
) -> ProjectLifecycleController<HeadlessGraph> {
    let backend: Arc<dyn DialogBackend> = dialogs;
    ProjectLifecycleController::new(HeadlessGraph::new(), backend, config, default_catalog())
}

/// Step frames until `stop` returns true, returning every report.
///
/// Panics if the condition does not hold within a few seconds.
pub fn frame_until<E, F>(ctrl: &mut ProjectLifecycleController<E>, mut stop: F) -> Vec<FrameReport>
where
    E: GraphEngine,
    F: FnMut(&ProjectLifecycleController<E>, &FrameReport) -> bool,
{
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    let mut reports = Vec::new();
    loop {
        let report = ctrl.frame();
        let finished = stop(ctrl, &report);
        reports.push(report);
        if finished {
            return reports;
        }
        assert!(
            Instant::now() < deadline,
            "lifecycle did not settle; phase {:?}",
            ctrl.state().phase
        );
        thread::sleep(Duration::from_millis(1));
    }
}

/// Step frames until no dialog or queued action is pending, returning the
/// events emitted along the way.
pub fn settle<E: GraphEngine>(ctrl: &mut ProjectLifecycleController<E>) -> Vec<LifecycleEvent> {
    frame_until(ctrl, |ctrl, report| report.done || ctrl.state().phase.is_settled())
        .into_iter()
        .flat_map(|report| report.events)
        .collect()
}
