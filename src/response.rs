//! Structured Perl generation response.
//!
//! The model is asked for a JSON document describing the script, its
//! dependencies and documentation. Every field is optional so that a partial
//! answer still renders.

use crate::error::{ClicodError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerlResponse {
    pub status: Option<String>,
    pub response_type: Option<String>,
    pub metadata: Metadata,
    pub perl_code: PerlCode,
    pub dependencies: Dependencies,
    pub documentation: Documentation,
    pub code_structure: CodeStructure,
    pub best_practices: Vec<String>,
    pub testing: Testing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub model_used: Option<String>,
    pub timestamp: Option<String>,
    pub complexity_level: Option<String>,
    // Models return this as a number or a string
    pub estimated_lines: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerlCode {
    pub main_script: String,
    pub additional_files: Vec<AdditionalFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalFile {
    pub filename: String,
    pub content: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependencies {
    pub core_modules: Vec<String>,
    pub cpan_modules: Vec<CpanModule>,
    pub system_requirements: Vec<String>,
}

/// A CPAN dependency, given either in full or as a bare module name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CpanModule {
    Detailed {
        name: String,
        #[serde(default)]
        install_command: String,
        #[serde(default)]
        purpose: String,
    },
    Name(String),
}

impl CpanModule {
    pub fn name(&self) -> &str {
        match self {
            CpanModule::Detailed { name, .. } => name,
            CpanModule::Name(name) => name,
        }
    }

    pub fn install_command(&self) -> String {
        match self {
            CpanModule::Detailed { install_command, name, .. } if install_command.is_empty() => {
                format!("cpan install {}", name)
            }
            CpanModule::Detailed { install_command, .. } => install_command.clone(),
            CpanModule::Name(name) => format!("cpan install {}", name),
        }
    }

    pub fn purpose(&self) -> &str {
        match self {
            CpanModule::Detailed { purpose, .. } => purpose,
            CpanModule::Name(_) => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Documentation {
    pub description: Option<String>,
    pub usage_examples: Vec<String>,
    pub features: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeStructure {
    pub functions: Vec<FunctionInfo>,
    pub main_sections: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionInfo {
    pub name: String,
    pub description: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Testing {
    pub test_cases: Vec<String>,
    pub sample_input: Option<String>,
    pub expected_output: Option<String>,
}

impl PerlResponse {
    /// Parses the model's JSON answer, tolerating markdown fences around it.
    pub fn parse_structured(text: &str) -> Result<Self> {
        if let Ok(response) = serde_json::from_str(text.trim()) {
            return Ok(response);
        }
        let cleaned = extract_json(text);
        serde_json::from_str(cleaned).map_err(|e| {
            warn!("Model response is not valid JSON: {}", e);
            ClicodError::MalformedResponse {
                reason: e.to_string(),
                preview: preview(text),
            }
        })
    }

    /// Wraps a bare script answer.
    pub fn from_plain(text: &str) -> Self {
        let mut response = PerlResponse {
            status: Some("success".to_string()),
            response_type: Some("perl_code_generation".to_string()),
            ..PerlResponse::default()
        };
        response.perl_code.main_script = strip_code_fence(text).to_string();
        response
    }

    pub fn main_script(&self) -> &str {
        &self.perl_code.main_script
    }

    pub fn has_code(&self) -> bool {
        !self.perl_code.main_script.trim().is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

/// Narrows `text` to the JSON document it carries.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    } else if let Some(start) = trimmed.find("```") {
        let body_start = start + 3;
        if let Some(end) = trimmed.rfind("```") {
            if end > body_start {
                return trimmed[body_start..end].trim();
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Returns the inside of the first fenced block, language tag dropped.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim_end(),
        None => body.trim_end(),
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}
