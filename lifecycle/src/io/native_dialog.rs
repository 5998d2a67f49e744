//! OS file dialogs through `rfd`.

use std::path::PathBuf;

use tracing::debug;

use crate::core::types::DialogKind;
use crate::io::dialog::{DialogBackend, DialogRequest};

/// Native open/save dialogs. Each call blocks its worker thread until the
/// user answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDialogs;

impl DialogBackend for NativeDialogs {
    fn pick(&self, request: &DialogRequest) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new()
            .set_title(request.title.as_str())
            .add_filter(request.filter_name.as_str(), request.extensions.as_slice());

        if let Some(default) = &request.default_path {
            if let Some(dir) = default.parent().filter(|p| !p.as_os_str().is_empty()) {
                dialog = dialog.set_directory(dir);
            }
            if let Some(name) = default.file_name() {
                dialog = dialog.set_file_name(name.to_string_lossy());
            }
        }

        let picked = match request.kind {
            DialogKind::Save => dialog.save_file(),
            DialogKind::Load => dialog.pick_file(),
        };
        debug!(kind = ?request.kind, picked = ?picked, "native dialog closed");
        picked
    }
}
