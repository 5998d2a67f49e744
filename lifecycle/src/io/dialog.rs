//! Off-loop execution of blocking file dialogs.
//!
//! A native "pick a file" call blocks until the user answers, so each request
//! runs on its own worker thread and posts its answer over a channel. The frame
//! loop only ever looks at the channel with a non-blocking receive.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::types::DialogKind;
use crate::io::config::LifecycleConfig;

/// Parameters for one file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    pub kind: DialogKind,
    pub title: String,
    /// Suggested file or directory.
    pub default_path: Option<PathBuf>,
    /// Label of the single extension filter.
    pub filter_name: String,
    /// Extensions accepted by the filter, without dots.
    pub extensions: Vec<String>,
}

impl DialogRequest {
    pub fn new(kind: DialogKind, cfg: &LifecycleConfig, default_path: Option<PathBuf>) -> Self {
        let title = match kind {
            DialogKind::Save => cfg.dialogs.save_title.clone(),
            DialogKind::Load => cfg.dialogs.load_title.clone(),
        };
        Self {
            kind,
            title,
            default_path,
            filter_name: cfg.project.filter_name.clone(),
            extensions: vec![cfg.project.extension.clone()],
        }
    }
}

/// Synchronous file-dialog primitive. `None` means the user cancelled.
///
/// Implementations may block for as long as the dialog is open; they are only
/// ever called from a dialog worker thread.
pub trait DialogBackend: Send + Sync {
    fn pick(&self, request: &DialogRequest) -> Option<PathBuf>;
}

/// Result of polling a [`DialogTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPoll {
    Pending,
    Ready,
}

/// One running dialog. Taking the answer consumes the task.
#[derive(Debug)]
pub struct DialogTask {
    kind: DialogKind,
    rx: Receiver<Option<PathBuf>>,
    answer: Option<Option<PathBuf>>,
}

impl DialogTask {
    /// Spawn a worker thread that runs `request` against `backend`.
    pub fn start(backend: Arc<dyn DialogBackend>, request: DialogRequest) -> Result<Self> {
        let kind = request.kind;
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("{kind:?}-dialog").to_lowercase())
            .spawn(move || {
                let picked = backend.pick(&request);
                if tx.send(picked).is_err() {
                    debug!(?kind, "dialog answer discarded (task abandoned)");
                }
            })
            .context("spawn dialog thread")?;
        debug!(?kind, "dialog task started");
        Ok(Self {
            kind,
            rx,
            answer: None,
        })
    }

    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    /// Check for the worker's answer without blocking.
    ///
    /// A worker that dies without answering counts as a cancelled dialog.
    pub fn poll(&mut self) -> DialogPoll {
        if self.answer.is_some() {
            return DialogPoll::Ready;
        }
        match self.rx.try_recv() {
            Ok(picked) => {
                self.answer = Some(picked);
                DialogPoll::Ready
            }
            Err(TryRecvError::Empty) => DialogPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                warn!(kind = ?self.kind, "dialog worker exited without an answer");
                self.answer = Some(None);
                DialogPoll::Ready
            }
        }
    }

    /// Consume the task and return the picked path (`None` = cancelled).
    ///
    /// Call only after [`poll`](Self::poll) reported `Ready`; an unanswered
    /// task is treated as cancelled.
    pub fn take(mut self) -> Option<PathBuf> {
        match self.answer.take() {
            Some(picked) => picked,
            None => {
                warn!(kind = ?self.kind, "dialog task taken before it was ready");
                None
            }
        }
    }

    /// Stop waiting for the dialog. The native window cannot be closed from
    /// here; its answer is dropped when it arrives.
    pub fn abandon(self) {
        debug!(kind = ?self.kind, "dialog task abandoned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct Fixed(Option<PathBuf>);

    impl DialogBackend for Fixed {
        fn pick(&self, _request: &DialogRequest) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    struct Gated(Mutex<Receiver<Option<PathBuf>>>);

    impl DialogBackend for Gated {
        fn pick(&self, _request: &DialogRequest) -> Option<PathBuf> {
            self.0.lock().ok()?.recv().ok().flatten()
        }
    }

    struct Panics;

    impl DialogBackend for Panics {
        fn pick(&self, _request: &DialogRequest) -> Option<PathBuf> {
            panic!("native dialog crashed");
        }
    }

    fn request(kind: DialogKind) -> DialogRequest {
        DialogRequest::new(kind, &LifecycleConfig::default(), None)
    }

    fn wait_ready(task: &mut DialogTask) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while task.poll() == DialogPoll::Pending {
            assert!(Instant::now() < deadline, "dialog never became ready");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn request_uses_configured_title_and_filter() {
        let save = request(DialogKind::Save);
        assert_eq!(save.title, "Save the Casa Project");
        assert_eq!(save.extensions, vec!["csa".to_string()]);
        assert_eq!(request(DialogKind::Load).title, "Load the Casa Project");
    }

    #[test]
    fn picked_path_is_delivered_once_ready() {
        let backend = Arc::new(Fixed(Some(PathBuf::from("project1.csa"))));
        let mut task = DialogTask::start(backend, request(DialogKind::Load)).expect("start");
        wait_ready(&mut task);
        assert_eq!(task.poll(), DialogPoll::Ready);
        assert_eq!(task.take(), Some(PathBuf::from("project1.csa")));
    }

    #[test]
    fn poll_stays_pending_while_dialog_is_open() {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::new(Gated(Mutex::new(rx)));
        let mut task = DialogTask::start(backend, request(DialogKind::Save)).expect("start");

        assert_eq!(task.poll(), DialogPoll::Pending);
        tx.send(None).expect("release");
        wait_ready(&mut task);
        assert_eq!(task.take(), None);
    }

    #[test]
    fn crashed_worker_counts_as_cancel() {
        let mut task = DialogTask::start(Arc::new(Panics), request(DialogKind::Save)).expect("start");
        wait_ready(&mut task);
        assert_eq!(task.take(), None);
    }

    #[test]
    fn abandoned_task_does_not_block_the_worker() {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::new(Gated(Mutex::new(rx)));
        let task = DialogTask::start(backend, request(DialogKind::Load)).expect("start");
        task.abandon();
        tx.send(Some(PathBuf::from("late.csa"))).expect("release");
    }
}
