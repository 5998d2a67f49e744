//! Graph engine abstraction and project context ownership.
//!
//! The [`GraphEngine`] trait decouples the lifecycle controller from the actual
//! node-graph library. Tests and the terminal host use
//! [`HeadlessGraph`](crate::headless::HeadlessGraph).

use std::path::Path;

use anyhow::Result;
use tracing::debug;

/// Engine-issued handle to one project context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Capabilities the lifecycle needs from the node-graph engine.
///
/// Everything except context creation and destruction acts on the context
/// selected with [`set_active_context`](GraphEngine::set_active_context).
pub trait GraphEngine {
    /// Node type definition handed to [`register_node_type`](GraphEngine::register_node_type).
    type NodeType: Clone;

    fn create_context(&mut self, asset_root: &Path) -> ContextId;
    fn destroy_context(&mut self, id: ContextId);
    fn set_active_context(&mut self, id: Option<ContextId>);
    fn active_context(&self) -> Option<ContextId>;

    fn is_project_dirty(&self) -> bool;
    fn clear_project_dirty_flag(&mut self);

    /// Serialize every node and link of the active context.
    fn serialize_to_buffer(&self) -> Vec<u8>;
    /// Replace the active context's nodes and links with the buffer contents.
    fn deserialize_from_buffer(&mut self, buffer: &[u8]) -> Result<()>;

    fn register_node_type(&mut self, definition: Self::NodeType);
}

/// The single project context owned by the lifecycle.
///
/// Installing a context destroys the one it replaces; releasing destroys the
/// current one. Only the controller creates or destroys contexts.
#[derive(Debug, Default)]
pub struct ContextSlot {
    current: Option<ContextId>,
}

impl ContextSlot {
    pub fn get(&self) -> Option<ContextId> {
        self.current
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Make `id` the active context, destroying the previous one.
    pub fn install<E: GraphEngine>(&mut self, engine: &mut E, id: ContextId) {
        engine.set_active_context(Some(id));
        if let Some(previous) = self.current.replace(id) {
            if previous != id {
                debug!(previous = previous.raw(), next = id.raw(), "destroying replaced context");
                engine.destroy_context(previous);
            }
        }
    }

    /// Destroy the current context, if any.
    pub fn release<E: GraphEngine>(&mut self, engine: &mut E) {
        if let Some(id) = self.current.take() {
            debug!(context = id.raw(), "releasing context");
            engine.set_active_context(None);
            engine.destroy_context(id);
        }
    }
}
