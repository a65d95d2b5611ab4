use std::fmt::Display;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StubGenErrorKind {
    #[error("Failed to load XML: {0}")]
    Xml(#[from] nodeset_xml::XmlError),
    #[error("Missing required field: {0}")]
    MissingRequiredValue(&'static str),
    #[error("Model requires {models} nodesets but {files} files were located")]
    ModelFileMismatch { models: usize, files: usize },
    #[error("Multiple nodeset candidates for {0}: {1:?}")]
    AmbiguousNodeSet(String, Vec<String>),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to render template {0}: {1}")]
    Render(String, String),
    #[error("{0}")]
    Other(String),
    #[error("{0}: {1}")]
    Io(String, std::io::Error),
}

#[derive(Error, Debug)]
pub struct StubGenError {
    #[source]
    pub kind: Box<StubGenErrorKind>,
    pub context: Option<String>,
    pub file: Option<String>,
}

impl Display for StubGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stub generation failed: {}", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, ", while {context}")?;
        }
        if let Some(file) = &self.file {
            write!(f, ", while loading file {file}")?;
        }
        Ok(())
    }
}

impl From<nodeset_xml::XmlError> for StubGenError {
    fn from(value: nodeset_xml::XmlError) -> Self {
        Self::new(value.into())
    }
}

impl From<serde_json::Error> for StubGenError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value.into())
    }
}

impl From<serde_yaml::Error> for StubGenError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::new(value.into())
    }
}

impl StubGenError {
    pub fn io(msg: &str, e: std::io::Error) -> Self {
        Self::new(StubGenErrorKind::Io(msg.to_owned(), e))
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(StubGenErrorKind::Other(msg.into()))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(StubGenErrorKind::NotFound(what.into()))
    }

    pub fn render(template: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(StubGenErrorKind::Render(template.into(), msg.into()))
    }

    pub fn missing_required_value(name: &'static str) -> Self {
        Self::new(StubGenErrorKind::MissingRequiredValue(name))
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn new(kind: StubGenErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            context: None,
            file: None,
        }
    }
}
