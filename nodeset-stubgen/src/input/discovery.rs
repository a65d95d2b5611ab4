use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{error::StubGenErrorKind, utils::model_folder_name, StubGenError};

/// What to do when a model folder holds more than one NodeSet file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileSelectionPolicy {
    /// Take the first candidate in file name order.
    #[default]
    First,
    /// Fail unless there is exactly one candidate.
    Unique,
}

/// Build-system companion files sitting next to a NodeSet file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanionFiles {
    pub nodeset: Option<String>,
    pub node_ids_csv: Option<String>,
    pub types_bsd: Option<String>,
}

/// A folder tree with one subfolder per information model.
#[derive(Debug, Clone)]
pub struct NodeSetDirectory {
    root: PathBuf,
    policy: FileSelectionPolicy,
    overrides: HashMap<String, PathBuf>,
}

fn is_nodeset_candidate(name: &str) -> bool {
    name.contains("NodeSet2.xml") && !name.contains("Example")
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, StubGenError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StubGenError::io("Failed to list files", e).in_file(dir.display().to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else {
            warn!("Failed to read entry: {:?}", entry);
            continue;
        };
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl NodeSetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: FileSelectionPolicy::default(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: FileSelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use `path` for `uri` instead of searching its model folder. Relative
    /// paths are taken from the nodeset root.
    pub fn with_override(mut self, uri: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(uri.into(), path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self, uri: &str) -> PathBuf {
        self.root.join(model_folder_name(uri))
    }

    /// The NodeSet file of the model with namespace `uri`.
    pub fn nodeset_file(&self, uri: &str) -> Result<PathBuf, StubGenError> {
        if let Some(path) = self.overrides.get(uri) {
            let path = self.root.join(path);
            debug!("Using configured file {} for {}", path.display(), uri);
            return Ok(path);
        }
        self.nodeset_file_in(&self.model_dir(uri))
            .map_err(|e| e.with_context(format!("locating nodeset for {uri}")))
    }

    /// The NodeSet file inside `dir`, chosen according to the selection policy.
    pub fn nodeset_file_in(&self, dir: &Path) -> Result<PathBuf, StubGenError> {
        let candidates: Vec<PathBuf> = list_files(dir)?
            .into_iter()
            .filter(|p| is_nodeset_candidate(&file_name(p)))
            .collect();

        match (self.policy, candidates.len()) {
            (_, 0) => Err(StubGenError::not_found(format!(
                "NodeSet2.xml file in {}",
                dir.display()
            ))),
            (FileSelectionPolicy::Unique, n) if n > 1 => {
                Err(StubGenError::new(StubGenErrorKind::AmbiguousNodeSet(
                    dir.display().to_string(),
                    candidates.iter().map(|p| file_name(p)).collect(),
                )))
            }
            (FileSelectionPolicy::First, n) => {
                if n > 1 {
                    warn!(
                        "{} nodeset candidates in {}, using {}",
                        n,
                        dir.display(),
                        candidates[0].display()
                    );
                }
                Ok(candidates[0].clone())
            }
            (FileSelectionPolicy::Unique, _) => Ok(candidates[0].clone()),
        }
    }

    /// Find the `NodeIds.csv` and `Types.bsd` files next to a NodeSet file.
    pub fn companion_files(nodeset: &Path) -> CompanionFiles {
        let mut files = CompanionFiles {
            nodeset: Some(file_name(nodeset)),
            ..Default::default()
        };
        let Some(dir) = nodeset.parent() else {
            return files;
        };
        let listed = match list_files(dir) {
            Ok(listed) => listed,
            Err(e) => {
                warn!("{e}");
                return files;
            }
        };
        for path in listed {
            let name = file_name(&path);
            if name.contains("Example") {
                continue;
            }
            if name.contains("NodeIds.csv") && files.node_ids_csv.is_none() {
                files.node_ids_csv = Some(name);
            } else if name.contains("Types.bsd") && files.types_bsd.is_none() {
                files.types_bsd = Some(name);
            }
        }
        files
    }
}
