//! Project-lifecycle coordinator for the Casa node-graph editor.
//!
//! Sequences New, Load, Save, Save As and Quit against two external facts:
//! whether a native file dialog is open and whether the project has unsaved
//! changes. Destructive actions on a dirty project go through a save
//! challenge; a save can be chained in front of the action it guards.
//!
//! - **[`core`]**: Pure, deterministic transition rules and state.
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config files, dialog worker threads, project files).
//! - **[`engine`]**: The graph-engine seam and project context ownership.
//!
//! [`controller`] drives all of them once per frame; [`shell`] is a terminal
//! host built on it.

pub mod controller;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod headless;
pub mod io;
pub mod logging;
pub mod shell;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
