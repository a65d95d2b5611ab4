use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    input::{FileSelectionPolicy, NodeSetDirectory},
    session::NodeSetSelection,
    StubGenError,
};

/// A type to instantiate when no saved project is replayed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RootConfig {
    pub uri: String,
    pub node_id: String,
    /// Optional members to select, by browse name.
    #[serde(default)]
    pub select_optional: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputConfig {
    pub dir: String,
    #[serde(default)]
    pub unique_dir: bool,
    /// Previously generated source scanned for user code regions.
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default = "default_true")]
    pub context_json: bool,
    #[serde(default = "default_true")]
    pub save_project: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StubGenConfig {
    pub nodeset_root: String,
    pub selected: String,
    #[serde(default)]
    pub file_selection: FileSelectionPolicy,
    #[serde(default)]
    pub nodeset_files: BTreeMap<String, String>,
    /// Saved project to replay instead of `roots`.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub roots: Vec<RootConfig>,
    pub output: OutputConfig,
}

impl StubGenConfig {
    pub fn from_file(path: &Path) -> Result<Self, StubGenError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StubGenError::io("Failed to read config", e).in_file(path.display().to_string())
        })?;
        Self::from_str(&text).map_err(|e| e.in_file(path.display().to_string()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, StubGenError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Where to load the session from, with relative paths taken from
    /// `root_path`.
    pub fn selection(&self, root_path: &Path) -> NodeSetSelection {
        let mut directory = NodeSetDirectory::new(root_path.join(&self.nodeset_root))
            .with_policy(self.file_selection);
        for (uri, file) in &self.nodeset_files {
            directory = directory.with_override(uri, file);
        }
        NodeSetSelection::new(directory, &self.selected)
    }

    pub fn output_dir(&self, root_path: &Path) -> PathBuf {
        root_path.join(&self.output.dir)
    }

    pub fn project_path(&self, root_path: &Path) -> Option<PathBuf> {
        self.project.as_ref().map(|p| root_path.join(p))
    }

    pub fn source_path(&self, root_path: &Path) -> Option<PathBuf> {
        self.output.source_file.as_ref().map(|p| root_path.join(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = StubGenConfig::from_str(
            r#"
nodeset_root: UA-Nodeset
selected: Pump
output:
  dir: out
"#,
        )
        .unwrap();
        assert_eq!(config.file_selection, FileSelectionPolicy::First);
        assert!(config.roots.is_empty());
        assert!(config.output.context_json);
        assert!(config.output.save_project);
        assert!(!config.output.unique_dir);

        let selection = config.selection(Path::new("/data"));
        assert_eq!(selection.directory.root(), Path::new("/data/UA-Nodeset"));
        assert_eq!(selection.selected_dir, "Pump");
    }

    #[test]
    fn parses_full_config() {
        let config = StubGenConfig::from_str(
            r#"
nodeset_root: UA-Nodeset
selected: Pump
file_selection: unique
nodeset_files:
  "http://example.org/UA/Pump/": Pump/Opc.Ua.Pump.NodeSet2.xml
project_name: PumpServer
roots:
  - uri: "http://example.org/UA/Pump/"
    node_id: "ns=1;i=1001"
    select_optional: ["Temperature"]
output:
  dir: out
  unique_dir: true
  context_json: false
"#,
        )
        .unwrap();
        assert_eq!(config.file_selection, FileSelectionPolicy::Unique);
        assert_eq!(config.roots[0].select_optional, vec!["Temperature"]);
        assert_eq!(config.project_name.as_deref(), Some("PumpServer"));
        assert!(!config.output.context_json);
        assert_eq!(config.nodeset_files.len(), 1);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = StubGenConfig::from_str(
            "nodeset_root: x\nselected: y\nfile_selection: newest\noutput:\n  dir: out\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
