//! Resolves OPC UA NodeSet2 models and turns a selection of their types into
//! the render contexts of a server stub.

use std::path::{Path, PathBuf};

use log::{info, warn};

mod context;
mod error;
mod input;
mod persist;
mod render;
mod resolve;
mod selection;
mod session;
mod utils;

pub mod config;
pub mod console_logging;

pub use config::StubGenConfig;
pub use context::{ContextProjector, RenderMap, RenderValue};
pub use error::{StubGenError, StubGenErrorKind};
pub use input::{
    CompanionFiles, DocumentCache, FileSelectionPolicy, LoadedDocument, NodeSetDirectory,
};
pub use persist::{ProjectState, SavedNode, SavedRootNode};
pub use render::{
    create_unique_dir, emit_artifacts, write_json, EmitOptions, TemplateRenderer,
    BUILD_TEMPLATE, README_TEMPLATE, SOURCE_TEMPLATE,
};
pub use resolve::{resolve, KnownReference, ResolveReport};
pub use selection::{ItemId, ReferenceLink, SelectionTree, TreeItem};
pub use session::{load_session_async, NodeSetSelection, Session};
pub use utils::{namespace_short_name, sanitize_name};

fn build_tree(
    config: &StubGenConfig,
    root_path: &Path,
    session: &Session,
) -> Result<(SelectionTree, Option<ProjectState>), StubGenError> {
    let mut tree = SelectionTree::new();

    if let Some(project_path) = config.project_path(root_path) {
        let state = ProjectState::load(&project_path)?;
        state.apply(session.documents(), &mut tree)?;
        info!(
            "Restored project {} with {} roots",
            state.project_name,
            state.root_nodes.len()
        );
        return Ok((tree, Some(state)));
    }

    for root in &config.roots {
        let id = tree
            .add_root_by_id(session.documents(), &root.uri, &root.node_id)
            .map_err(|e| e.with_context(format!("adding root {}", root.node_id)))?;
        for name in &root.select_optional {
            match tree.find_by_browse_name(id, name) {
                Some(member) => tree.set_selected(member, true),
                None => warn!("No member {} under root {}", name, root.node_id),
            }
        }
    }
    Ok((tree, None))
}

fn read_existing_source(path: &Path) -> Result<Option<String>, StubGenError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path).map(Some).map_err(|e| {
        StubGenError::io("Failed to read source", e).in_file(path.display().to_string())
    })
}

/// Run the whole pipeline for `config`, with relative paths taken from
/// `root_path`. Writes `context.json`, `build_context.json` and the project
/// file, and returns the output directory.
pub fn run_stubgen(config: &StubGenConfig, root_path: &Path) -> Result<PathBuf, StubGenError> {
    let session = Session::load(&config.selection(root_path))?;
    let report = session.report();
    if !report.is_complete() {
        warn!(
            "{} references and {} data types could not be resolved",
            report.unresolved_references, report.unresolved_data_types
        );
    }

    let (tree, restored) = build_tree(config, root_path, &session)?;
    let project_name = config
        .project_name
        .clone()
        .or_else(|| restored.map(|s| s.project_name))
        .unwrap_or_else(|| namespace_short_name(session.selected_model_uri()));

    let mut projector = ContextProjector::new(&session);
    if let Some(source_path) = config.source_path(root_path) {
        if let Some(source) = read_existing_source(&source_path)? {
            projector = projector.with_existing_source(source);
        }
    }
    let server_context = projector.project(&tree);
    let build_context = projector.build_context(Some(&project_name));

    let out_dir = config.output_dir(root_path);
    let out_dir = if config.output.unique_dir {
        create_unique_dir(&out_dir)?
    } else {
        std::fs::create_dir_all(&out_dir).map_err(|e| {
            StubGenError::io("Failed to create output dir", e)
                .in_file(out_dir.display().to_string())
        })?;
        out_dir
    };

    if config.output.context_json {
        write_json(&out_dir.join("context.json"), &server_context)?;
    }
    write_json(&out_dir.join("build_context.json"), &build_context)?;
    if config.output.save_project {
        let state = ProjectState::capture(&tree, project_name.as_str(), config.selected.as_str());
        state.save(&out_dir.join(format!("{project_name}.json")))?;
    }

    info!("Generated {} into {}", project_name, out_dir.display());
    Ok(out_dir)
}
