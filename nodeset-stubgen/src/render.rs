//! Writing generated artifacts. Template expansion itself belongs to an
//! external engine behind [`TemplateRenderer`].

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::{context::RenderValue, StubGenError};

const MAX_UNIQUE_DIR_ATTEMPTS: usize = 100;

pub const SOURCE_TEMPLATE: &str = "source";
pub const BUILD_TEMPLATE: &str = "build";
pub const README_TEMPLATE: &str = "readme";

pub trait TemplateRenderer {
    fn render(&self, template: &str, context: &RenderValue) -> Result<String, StubGenError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &RenderValue) -> Result<String, StubGenError>,
{
    fn render(&self, template: &str, context: &RenderValue) -> Result<String, StubGenError> {
        self(template, context)
    }
}

/// Output file names for [`emit_artifacts`].
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub source_file: String,
    pub build_file: String,
    pub readme_file: String,
    /// Also write the server context as `context.json`.
    pub context_json: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            source_file: "server.c".to_owned(),
            build_file: "CMakeLists.txt".to_owned(),
            readme_file: "README.md".to_owned(),
            context_json: true,
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), StubGenError> {
    std::fs::write(path, contents).map_err(|e| {
        StubGenError::io("Failed to write file", e).in_file(path.display().to_string())
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Pretty-print `value` as JSON into `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StubGenError> {
    let json = serde_json::to_string_pretty(value)?;
    write_file(path, &json)
}

/// Render the source, build descriptor and README templates into `dir`.
/// Returns the paths written, in that order, followed by `context.json`
/// when enabled.
pub fn emit_artifacts(
    renderer: &dyn TemplateRenderer,
    dir: &Path,
    server_context: &RenderValue,
    build_context: &RenderValue,
    options: &EmitOptions,
) -> Result<Vec<PathBuf>, StubGenError> {
    let jobs = [
        (SOURCE_TEMPLATE, server_context, &options.source_file),
        (BUILD_TEMPLATE, build_context, &options.build_file),
        (README_TEMPLATE, build_context, &options.readme_file),
    ];
    let mut written = Vec::new();
    for (template, context, file) in jobs {
        let text = renderer
            .render(template, context)
            .map_err(|e| e.with_context(format!("rendering {file}")))?;
        let path = dir.join(file);
        write_file(&path, &text)?;
        written.push(path);
    }
    if options.context_json {
        let path = dir.join("context.json");
        write_json(&path, server_context)?;
        written.push(path);
    }
    info!("Emitted {} files to {}", written.len(), dir.display());
    Ok(written)
}

/// Create `base`, or `base_1`, `base_2` and so on if it already exists.
pub fn create_unique_dir(base: &Path) -> Result<PathBuf, StubGenError> {
    let file_name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StubGenError::other(format!("Invalid output dir {}", base.display())))?;

    for attempt in 0..MAX_UNIQUE_DIR_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_path_buf()
        } else {
            base.with_file_name(format!("{file_name}_{attempt}"))
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StubGenError::io("Failed to create output dir", e)
                    .in_file(candidate.display().to_string()))
            }
        }
    }
    Err(StubGenError::other(format!(
        "No free output dir next to {} after {MAX_UNIQUE_DIR_ATTEMPTS} attempts",
        base.display()
    )))
}
