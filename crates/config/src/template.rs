//! Question template loading
//!
//! Templates are authored as JSON. Parsing and strict validation live in
//! `interview_core::template`; this module only handles the file boundary.

use std::path::Path;

use interview_core::InterviewTemplate;

use crate::ConfigError;

/// Load and validate a template from a JSON file
pub fn load_template(path: &Path) -> Result<InterviewTemplate, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(format!("failed to read {}: {}", path.display(), e))
    })?;

    let template = InterviewTemplate::from_json(&json)?;

    tracing::info!(
        path = %path.display(),
        mode = ?template.mode(),
        questions = template.scripted_len(),
        "Template loaded"
    );

    Ok(template)
}
