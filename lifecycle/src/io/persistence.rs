//! Project file save/load through the graph engine's serializer.
//!
//! The file is an opaque engine buffer; nothing here interprets its bytes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument, warn};

use crate::engine::GraphEngine;

/// Moves project buffers between the engine and the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct PersistenceGateway;

impl PersistenceGateway {
    /// Write the active context's serialized graph to `path`, replacing any
    /// existing file.
    ///
    /// The caller clears the dirty flag and records the path on success.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save<E: GraphEngine>(&self, engine: &E, path: &Path) -> Result<()> {
        if engine.active_context().is_none() {
            bail!("no open project to save");
        }
        let buffer = engine.serialize_to_buffer();
        write_atomic(path, &buffer)?;
        debug!(bytes = buffer.len(), "project saved");
        Ok(())
    }

    /// Rebuild the active context's graph from the file at `path`.
    ///
    /// # Panics
    ///
    /// Panics if no context is active; callers create one first.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load<E: GraphEngine>(&self, engine: &mut E, path: &Path) -> Result<()> {
        assert!(
            engine.active_context().is_some(),
            "load requires an active project context"
        );
        let buffer =
            fs::read(path).with_context(|| format!("read project {}", path.display()))?;
        engine
            .deserialize_from_buffer(&buffer)
            .with_context(|| format!("load project {}", path.display()))?;
        debug!(bytes = buffer.len(), "project loaded");
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("project path has no file name {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp project {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), err = %cleanup, "remove temp project");
        }
        return Err(err).with_context(|| format!("replace project {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessGraph, default_catalog};

    fn open_engine() -> HeadlessGraph {
        let mut engine = HeadlessGraph::new();
        let id = engine.create_context(Path::new("data"));
        engine.set_active_context(Some(id));
        for kind in default_catalog() {
            engine.register_node_type(kind);
        }
        engine
    }

    #[test]
    fn save_writes_engine_buffer_verbatim() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.csa");
        let mut engine = open_engine();
        engine.add_node("PrintString").expect("add");

        PersistenceGateway.save(&engine, &path).expect("save");

        let written = fs::read(&path).expect("read");
        assert_eq!(written, engine.serialize_to_buffer());
    }

    #[test]
    fn save_overwrites_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.csa");
        fs::write(&path, "stale contents that are much longer than the new buffer")
            .expect("seed");
        let engine = open_engine();

        PersistenceGateway.save(&engine, &path).expect("save");
        assert_eq!(fs::read(&path).expect("read"), engine.serialize_to_buffer());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("no-such-dir").join("out.csa");
        let err = PersistenceGateway.save(&open_engine(), &path).unwrap_err();
        assert!(format!("{err:#}").contains("write temp project"));
    }

    #[test]
    fn failed_replace_removes_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taken.csa");
        fs::create_dir(&path).expect("mkdir");
        fs::write(path.join("inside"), "x").expect("seed");

        let err = PersistenceGateway.save(&open_engine(), &path).unwrap_err();

        assert!(format!("{err:#}").contains("replace project"));
        assert!(!temp.path().join("taken.csa.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn save_without_project_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = PersistenceGateway
            .save(&HeadlessGraph::new(), &temp.path().join("out.csa"))
            .unwrap_err();
        assert!(err.to_string().contains("no open project"));
    }

    #[test]
    fn load_replaces_current_graph() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("graph.csa");
        let mut source = open_engine();
        source.add_node("Branch").expect("add");
        source.add_node("DoN").expect("add");
        PersistenceGateway.save(&source, &path).expect("save");

        let mut target = open_engine();
        target.add_node("PlotDemo").expect("add");
        PersistenceGateway.load(&mut target, &path).expect("load");

        assert_eq!(target.serialize_to_buffer(), source.serialize_to_buffer());
    }

    #[test]
    fn load_missing_file_leaves_graph_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = open_engine();
        engine.add_node("TreeDemo").expect("add");
        let before = engine.serialize_to_buffer();

        let err = PersistenceGateway
            .load(&mut engine, &temp.path().join("missing.csa"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("read project"));
        assert_eq!(engine.serialize_to_buffer(), before);
    }

    #[test]
    #[should_panic(expected = "load requires an active project context")]
    fn load_without_context_panics() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("graph.csa");
        fs::write(&path, "{}").expect("write");
        let _ = PersistenceGateway.load(&mut HeadlessGraph::new(), &path);
    }
}
