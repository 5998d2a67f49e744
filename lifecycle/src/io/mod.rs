//! I/O helpers: configuration, file dialogs and project files.

pub mod config;
pub mod dialog;
#[cfg(feature = "native-dialogs")]
pub mod native_dialog;
pub mod persistence;
