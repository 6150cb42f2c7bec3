//! Markdown rendering of generated responses, configuration and static pages.

use crate::config::{KeySource, MaskedConfiguration, OPTIONS};
use crate::response::PerlResponse;
use std::fmt::Write as _;
use std::path::Path;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const EXAMPLES: &str = r#"# clicod usage examples

## First time setup

```
clicod config --set-key       # store your Gemini API key
clicod config --show          # view the current configuration
clicod test                   # check the key and the model
```

## Basic usage

```
clicod generate "Create a CSV parser with error handling"
clicod generate "Build a log file analyzer" --save
clicod generate "Simple web scraper" --stream
clicod -m gemini-2.5-pro generate "Rotate logs older than a week" -s -f rotate
```

## Settings

```
clicod config --set-model gemini-2.5-pro
clicod config --set-save-location ~/perl-scripts
clicod config --auto-save true --streaming true
clicod config --json-format true    # ask for the structured JSON format
clicod config --set auto_save=false
```

## Interactive mode

```
clicod generate --interactive
```

Inside the session: `exit`, `quit`, `config`, `save on|off`, `stream on|off`.

## Example prompts

* Create a Perl script to monitor disk usage and send alerts
* Build a JSON parser with validation and error handling
* Generate a simple HTTP client with authentication
* Create a log rotation script for system administration
"#;

/// Keeps table cells from breaking the markdown table.
fn cell(text: &str) -> String {
    text.replace('|', "/").replace('\n', " ")
}

fn bullets(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}\n", title);
    for item in items {
        let _ = writeln!(out, "* {}", item);
    }
    out.push('\n');
}

pub fn render_response(response: &PerlResponse) -> String {
    let mut out = String::new();

    let status = response.status.as_deref().unwrap_or("unknown");
    let _ = writeln!(out, "# Status: {}\n", status.to_uppercase());

    let metadata = &response.metadata;
    if metadata.complexity_level.is_some() || metadata.estimated_lines.is_some() {
        let lines = match &metadata.estimated_lines {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => "N/A".to_string(),
        };
        let _ = writeln!(
            out,
            "*Complexity:* {} | *Estimated lines:* {}\n",
            metadata.complexity_level.as_deref().unwrap_or("N/A"),
            lines
        );
    }

    if let Some(description) = response.documentation.description.as_deref() {
        let _ = writeln!(out, "## Description\n\n{}\n", description);
    }

    if response.has_code() {
        let _ = writeln!(
            out,
            "## Generated Perl script\n\n```perl\n{}\n```\n",
            response.main_script().trim_end()
        );
    }

    for file in &response.perl_code.additional_files {
        let _ = writeln!(
            out,
            "## {} - {}\n\n```perl\n{}\n```\n",
            file.filename,
            file.description,
            file.content.trim_end()
        );
    }

    render_dependencies(&mut out, response);
    render_structure(&mut out, response);
    bullets(&mut out, "Usage examples", &response.documentation.usage_examples);
    bullets(&mut out, "Features", &response.documentation.features);
    bullets(&mut out, "Notes", &response.documentation.notes);
    render_testing(&mut out, response);
    bullets(&mut out, "Best practices applied", &response.best_practices);

    out.trim_end().to_string()
}

fn render_dependencies(out: &mut String, response: &PerlResponse) {
    let deps = &response.dependencies;
    if deps.core_modules.is_empty()
        && deps.cpan_modules.is_empty()
        && deps.system_requirements.is_empty()
    {
        return;
    }

    out.push_str("## Dependencies\n\n");
    out.push_str("|Type|Name|Install command|Purpose|\n|-|-|-|-|\n");
    for module in &deps.core_modules {
        let _ = writeln!(out, "|Core|{}|Built-in|Perl core module|", cell(module));
    }
    for module in &deps.cpan_modules {
        let _ = writeln!(
            out,
            "|CPAN|{}|{}|{}|",
            cell(module.name()),
            cell(&module.install_command()),
            cell(module.purpose())
        );
    }
    for requirement in &deps.system_requirements {
        let _ = writeln!(
            out,
            "|System|{}|See documentation|System requirement|",
            cell(requirement)
        );
    }
    out.push('\n');
}

fn render_structure(out: &mut String, response: &PerlResponse) {
    let structure = &response.code_structure;
    if !structure.functions.is_empty() {
        out.push_str("## Functions\n\n|Function|Description|Parameters|\n|-|-|-|\n");
        for function in &structure.functions {
            let _ = writeln!(
                out,
                "|{}|{}|{}|",
                cell(&function.name),
                cell(&function.description),
                cell(&function.parameters.join(", "))
            );
        }
        out.push('\n');
    }
    bullets(out, "Code structure", &structure.main_sections);
}

fn render_testing(out: &mut String, response: &PerlResponse) {
    let testing = &response.testing;
    let sample = testing.sample_input.as_deref().filter(|s| !s.is_empty());
    let expected = testing.expected_output.as_deref().filter(|s| !s.is_empty());
    if testing.test_cases.is_empty() && sample.is_none() && expected.is_none() {
        return;
    }

    out.push_str("## Testing\n\n");
    for case in &testing.test_cases {
        let _ = writeln!(out, "* {}", case);
    }
    if let Some(sample) = sample {
        let _ = writeln!(out, "\n**Sample input:**\n\n```\n{}\n```", sample);
    }
    if let Some(expected) = expected {
        let _ = writeln!(out, "\n**Expected output:**\n\n```\n{}\n```", expected);
    }
    out.push('\n');
}

pub fn render_config(config: &MaskedConfiguration, config_path: &Path) -> String {
    let api_key = match (&config.api_key, config.api_key_source) {
        (Some(masked), KeySource::Environment) => format!("{} (from GEMINI_API_KEY)", masked),
        (Some(masked), _) => masked.clone(),
        (None, _) => "Not set".to_string(),
    };

    let mut out = String::from("# clicod configuration\n\n|Setting|Value|\n|-|-|\n");
    let rows = [
        ("API Key", api_key),
        ("Default Model", config.default_model.clone()),
        ("Save Location", config.save_location.display().to_string()),
        ("Auto Save", config.auto_save.to_string()),
        ("Streaming", config.streaming.to_string()),
        ("JSON Format", config.json_format.to_string()),
        ("Config File", config_path.display().to_string()),
    ];
    for (name, value) in rows {
        let _ = writeln!(out, "|{}|{}|", name, cell(&value));
    }
    out.push_str("\n## Options for `--set`\n\n");
    for spec in OPTIONS {
        let _ = writeln!(
            out,
            "* `{}` ({}): {}",
            spec.name,
            spec.kind.expected(),
            spec.description
        );
    }
    out.trim_end().to_string()
}

pub fn render_examples() -> String {
    EXAMPLES.trim_end().to_string()
}

pub fn render_about(config_path: &Path) -> String {
    format!(
        "# clicod - CLI Code Generator\n\n\
         *Version:* {}\n\n\
         Generates Perl scripts from natural-language descriptions with Gemini.\n\n\
         * Plain script or structured JSON responses (`json_format`)\n\
         * Dependency tracking and usage documentation\n\
         * Streaming output and interactive sessions\n\
         * Atomic saves to the configured location\n\n\
         *Configuration stored in:* `{}`",
        VERSION,
        config_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::response::{CpanModule, FunctionInfo};
    use std::path::PathBuf;

    #[test]
    fn test_render_response_sections() {
        let mut response = PerlResponse::from_plain("print \"a|b\";");
        response.documentation.description = Some("Prints".to_string());
        response.dependencies.core_modules = vec!["List::Util".to_string()];
        response.dependencies.cpan_modules = vec![CpanModule::Name("Text::CSV".to_string())];
        response.code_structure.functions = vec![FunctionInfo {
            name: "main".to_string(),
            description: "entry | point".to_string(),
            parameters: vec!["file".to_string(), "mode".to_string()],
        }];
        response.testing.test_cases = vec!["prints".to_string()];
        response.testing.sample_input = Some(String::new());

        let out = render_response(&response);

        assert!(out.starts_with("# Status: SUCCESS"));
        assert!(out.contains("## Description\n\nPrints"));
        assert!(out.contains("```perl\nprint \"a|b\";\n```"));
        assert!(out.contains("|Core|List::Util|Built-in|Perl core module|"));
        assert!(out.contains("|CPAN|Text::CSV|cpan install Text::CSV||"));
        assert!(out.contains("|main|entry / point|file, mode|"));
        assert!(out.contains("## Testing\n\n* prints"));
        assert!(!out.contains("Sample input"));
    }

    #[test]
    fn test_render_response_skips_empty_sections() {
        let out = render_response(&PerlResponse::default());
        assert_eq!(out, "# Status: UNKNOWN");
    }

    #[test]
    fn test_render_config_never_shows_raw_key() {
        let config = Configuration {
            gemini_api_key: Some("AIzaSyTopSecret0042".to_string()),
            save_location: PathBuf::from("/tmp/scripts"),
            ..Configuration::default()
        };
        let out = render_config(&config.masked(None), Path::new("/home/u/.clicod/config.json"));

        assert!(out.contains("|API Key|****0042|"));
        assert!(!out.contains("AIzaSyTopSecret0042"));
        assert!(out.contains("|Save Location|/tmp/scripts|"));
        assert!(out.contains("|Config File|/home/u/.clicod/config.json|"));
    }

    #[test]
    fn test_render_config_lists_settable_options() {
        let out = render_config(&Configuration::default().masked(None), Path::new("c.json"));
        assert!(out.contains("## Options for `--set`"));
        assert!(out.contains("* `auto_save` ("));
        assert!(out.contains("Save every generated script without --save"));
        assert!(out.contains("Request the structured JSON response format"));
    }

    #[test]
    fn test_render_config_environment_key() {
        let out = render_config(
            &Configuration::default().masked(Some("env-key-7777".to_string())),
            Path::new("c.json"),
        );
        assert!(out.contains("****7777 (from GEMINI_API_KEY)"));
    }

    #[test]
    fn test_render_about_shows_config_path() {
        let out = render_about(Path::new("/x/config.json"));
        assert!(out.contains("`/x/config.json`"));
        assert!(out.contains(VERSION));
    }

    #[test]
    fn test_examples_mention_every_command() {
        let out = render_examples();
        for command in ["config --set-key", "test", "generate", "--interactive"] {
            assert!(out.contains(command), "missing {command}");
        }
    }
}
