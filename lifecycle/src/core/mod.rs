//! Deterministic, pure logic for the project lifecycle.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! state and return decisions the controller carries out.

pub mod state;
pub mod transitions;
pub mod types;
