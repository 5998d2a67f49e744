//! In-memory graph engine used by the terminal host and tests.
//!
//! Each context holds a flat list of nodes and links plus the node types
//! registered on it. The project buffer is pretty-printed JSON.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{ContextId, GraphEngine};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphNode {
    pub id: u32,
    pub kind: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphLink {
    pub from: u32,
    pub to: u32,
}

/// Serialized form of one project.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphDocument {
    pub version: u32,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }
}

impl GraphDocument {
    /// Canonical ordering so equal graphs serialize to equal buffers.
    pub fn sort(&mut self) {
        self.nodes.sort_by_key(|node| node.id);
        self.links
            .sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
    }

    /// Structural problems that make the document unusable in a context
    /// with the given registered node types.
    pub fn violations(&self, registered: &BTreeSet<String>) -> Vec<String> {
        let mut errors = Vec::new();
        if self.version != DOCUMENT_VERSION {
            errors.push(format!("unsupported document version {}", self.version));
        }
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id) {
                errors.push(format!("duplicate node id {}", node.id));
            }
            if !registered.contains(&node.kind) {
                errors.push(format!("node {} has unregistered type '{}'", node.id, node.kind));
            }
        }
        for link in &self.links {
            if !ids.contains(&link.from) || !ids.contains(&link.to) {
                errors.push(format!(
                    "link {} -> {} references a missing node",
                    link.from, link.to
                ));
            }
        }
        errors
    }

    /// `None` once the highest id is `u32::MAX`.
    fn next_node_id(&self) -> Option<u32> {
        match self.nodes.iter().map(|node| node.id).max() {
            Some(highest) => highest.checked_add(1),
            None => Some(0),
        }
    }
}

#[derive(Debug)]
struct ProjectContext {
    asset_root: PathBuf,
    registered: BTreeSet<String>,
    document: GraphDocument,
    dirty: bool,
}

/// Headless [`GraphEngine`] keeping every context in memory.
#[derive(Debug, Default)]
pub struct HeadlessGraph {
    contexts: BTreeMap<ContextId, ProjectContext>,
    active: Option<ContextId>,
    next_context: u64,
}

impl HeadlessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of contexts created and not yet destroyed.
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn document(&self) -> Option<&GraphDocument> {
        self.active_ctx().map(|ctx| &ctx.document)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.active_ctx()
            .map(|ctx| ctx.registered.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.active_ctx().map(|ctx| ctx.asset_root.as_path())
    }

    /// Add a node of a registered type to the active context.
    pub fn add_node(&mut self, kind: &str) -> Result<u32> {
        let ctx = self.active_ctx_mut()?;
        if !ctx.registered.contains(kind) {
            bail!("unknown node type '{kind}'");
        }
        let id = ctx
            .document
            .next_node_id()
            .ok_or_else(|| anyhow!("node ids exhausted"))?;
        ctx.document.nodes.push(GraphNode {
            id,
            kind: kind.to_string(),
        });
        ctx.dirty = true;
        Ok(id)
    }

    /// Link two existing nodes in the active context.
    pub fn link(&mut self, from: u32, to: u32) -> Result<()> {
        let ctx = self.active_ctx_mut()?;
        for id in [from, to] {
            if !ctx.document.nodes.iter().any(|node| node.id == id) {
                bail!("no node with id {id}");
            }
        }
        ctx.document.links.push(GraphLink { from, to });
        ctx.document.sort();
        ctx.dirty = true;
        Ok(())
    }

    fn active_ctx(&self) -> Option<&ProjectContext> {
        self.active.and_then(|id| self.contexts.get(&id))
    }

    fn active_ctx_mut(&mut self) -> Result<&mut ProjectContext> {
        let id = self.active.ok_or_else(|| anyhow!("no active context"))?;
        self.contexts
            .get_mut(&id)
            .ok_or_else(|| anyhow!("active context {} was destroyed", id.raw()))
    }
}

impl GraphEngine for HeadlessGraph {
    type NodeType = String;

    fn create_context(&mut self, asset_root: &Path) -> ContextId {
        self.next_context += 1;
        let id = ContextId::new(self.next_context);
        self.contexts.insert(
            id,
            ProjectContext {
                asset_root: asset_root.to_path_buf(),
                registered: BTreeSet::new(),
                document: GraphDocument::default(),
                dirty: false,
            },
        );
        debug!(context = id.raw(), "context created");
        id
    }

    fn destroy_context(&mut self, id: ContextId) {
        if self.contexts.remove(&id).is_none() {
            warn!(context = id.raw(), "destroy of unknown context");
        }
        if self.active == Some(id) {
            self.active = None;
        }
    }

    fn set_active_context(&mut self, id: Option<ContextId>) {
        self.active = id;
    }

    fn active_context(&self) -> Option<ContextId> {
        self.active
    }

    fn is_project_dirty(&self) -> bool {
        self.active_ctx().is_some_and(|ctx| ctx.dirty)
    }

    fn clear_project_dirty_flag(&mut self) {
        if let Ok(ctx) = self.active_ctx_mut() {
            ctx.dirty = false;
        }
    }

    fn serialize_to_buffer(&self) -> Vec<u8> {
        let Some(ctx) = self.active_ctx() else {
            return Vec::new();
        };
        match serde_json::to_vec_pretty(&ctx.document) {
            Ok(mut buf) => {
                buf.push(b'\n');
                buf
            }
            Err(err) => {
                warn!(err = %err, "serialize graph document");
                Vec::new()
            }
        }
    }

    fn deserialize_from_buffer(&mut self, buffer: &[u8]) -> Result<()> {
        let ctx = self.active_ctx_mut()?;
        let mut document: GraphDocument =
            serde_json::from_slice(buffer).context("parse graph document")?;
        let errors = document.violations(&ctx.registered);
        if !errors.is_empty() {
            bail!("invalid graph document:\n- {}", errors.join("\n- "));
        }
        document.sort();
        ctx.document = document;
        // Rebuilding the graph counts as an edit, like any other mutation.
        ctx.dirty = true;
        Ok(())
    }

    fn register_node_type(&mut self, definition: String) {
        match self.active_ctx_mut() {
            Ok(ctx) => {
                ctx.registered.insert(definition);
            }
            Err(err) => warn!(err = %err, node_type = %definition, "register node type"),
        }
    }
}

/// Node types the terminal host registers on every project.
pub fn default_catalog() -> Vec<String> {
    [
        "InputActionFire",
        "OutputAction",
        "Branch",
        "DoN",
        "SetTimer",
        "SingleLineTraceByChannel",
        "PrintString",
        "ImportAnimal",
        "BasicWidgets",
        "TreeDemo",
        "PlotDemo",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
