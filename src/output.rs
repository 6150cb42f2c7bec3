//! Saving generated scripts to disk.
//!
//! Files are written to a temporary sibling and renamed into place, so an
//! interrupted run leaves either the complete file or nothing.

use crate::error::{ClicodError, Result};
use crate::response::PerlResponse;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_FILENAME: &str = "clicod_generated.pl";
pub const INTERACTIVE_FILENAME: &str = "clicod_script.pl";

const HEADER_RULE_WIDTH: usize = 50;
const PROJECT_URL: &str = "https://github.com/happybear-21/clicod";

/// Paths written by [`save_script`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedScript {
    pub path: PathBuf,
    pub additional_files: Vec<PathBuf>,
}

/// Writes `contents` to `path` through a temporary file in the same directory.
///
/// `mode` sets Unix permissions before the rename.
pub fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other(format!("{} has no file name", path.display())))?;
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let result = write_then_rename(&temp_path, path, contents, mode);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_then_rename(
    temp_path: &Path,
    path: &Path,
    contents: &[u8],
    mode: Option<u32>,
) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    if let Some(mode) = mode {
        set_mode(temp_path, mode)?;
    }
    fs::rename(temp_path, path)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Normalizes a user or model supplied name: last path component only, `.pl` appended.
pub fn script_filename(requested: Option<&str>) -> String {
    let name = requested
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .and_then(|n| Path::new(n).file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    if name.ends_with(".pl") {
        name
    } else {
        format!("{}.pl", name)
    }
}

/// Builds the saved file: shebang, comment header, then the script body.
pub fn render_script_file(response: &PerlResponse, model: &str) -> String {
    let script = response.main_script();
    let (shebang, body) = match script.strip_prefix("#!") {
        Some(rest) => match rest.split_once('\n') {
            Some((line, body)) => (format!("#!{}", line.trim_end()), body),
            None => (format!("#!{}", rest.trim_end()), ""),
        },
        None => ("#!/usr/bin/env perl".to_string(), script),
    };

    let rule = format!("# {}", "=".repeat(HEADER_RULE_WIDTH));
    let mut out = String::new();
    out.push_str(&shebang);
    out.push('\n');
    out.push_str("# Generated by clicod - CLI Code Generator\n");
    out.push_str(&format!("# Model: {}\n", model));
    out.push_str(&format!("# {}\n", PROJECT_URL));
    out.push_str(&rule);
    out.push('\n');

    if let Some(description) = response.documentation.description.as_deref() {
        out.push_str(&format!("# Description: {}\n", description));
    }

    let cpan = &response.dependencies.cpan_modules;
    if !cpan.is_empty() {
        out.push_str("#\n# Required CPAN modules:\n");
        for module in cpan {
            out.push_str(&format!("# {}\n", module.install_command()));
        }
    }

    let usage = &response.documentation.usage_examples;
    if !usage.is_empty() {
        out.push_str("#\n# Usage examples:\n");
        for example in usage {
            out.push_str(&format!("# {}\n", example));
        }
    }

    out.push_str("#\n");
    out.push_str(&rule);
    out.push_str("\n\n");
    out.push_str(body.trim_start_matches('\n'));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Saves the main script and any additional files into `dir`.
pub fn save_script(
    response: &PerlResponse,
    dir: &Path,
    filename: Option<&str>,
    model: &str,
) -> Result<SavedScript> {
    let path = dir.join(script_filename(filename));
    let contents = render_script_file(response, model);

    write_atomic(&path, contents.as_bytes(), Some(0o755)).map_err(|source| {
        ClicodError::OutputWrite {
            path: path.clone(),
            source,
        }
    })?;
    info!("Saved generated script to {}", path.display());

    let mut additional_files = Vec::new();
    for file in &response.perl_code.additional_files {
        let Some(name) = Path::new(file.filename.trim()).file_name() else {
            warn!("Skipping additional file without a usable name: {:?}", file.filename);
            continue;
        };
        let extra_path = dir.join(name);
        if extra_path == path {
            warn!(
                "Skipping additional file {:?}: it would overwrite the main script",
                file.filename
            );
            continue;
        }
        write_atomic(&extra_path, file.content.as_bytes(), None).map_err(|source| {
            ClicodError::OutputWrite {
                path: extra_path.clone(),
                source,
            }
        })?;
        info!("Saved additional file to {}", extra_path.display());
        additional_files.push(extra_path);
    }

    Ok(SavedScript {
        path,
        additional_files,
    })
}

/// How to run the saved script, with a warning when perl is missing.
pub fn perl_hint(path: &Path) -> String {
    if which::which("perl").is_ok() {
        format!("Run with: perl {}", path.display())
    } else {
        format!(
            "Run with: perl {} (perl was not found on PATH)",
            path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{AdditionalFile, CpanModule};
    use tempfile::TempDir;

    fn sample_response() -> PerlResponse {
        let mut response = PerlResponse::from_plain(
            "#!/usr/bin/perl -w\nuse strict;\nprint \"hi\\n\";\n",
        );
        response.documentation.description = Some("Prints hi".to_string());
        response.documentation.usage_examples = vec!["perl hi.pl".to_string()];
        response.dependencies.cpan_modules = vec![CpanModule::Name("Text::CSV".to_string())];
        response
    }

    #[test]
    fn test_script_filename_defaults_and_extension() {
        assert_eq!(script_filename(None), DEFAULT_FILENAME);
        assert_eq!(script_filename(Some("  ")), DEFAULT_FILENAME);
        assert_eq!(script_filename(Some("parser")), "parser.pl");
        assert_eq!(script_filename(Some("parser.pl")), "parser.pl");
        assert_eq!(script_filename(Some("../../etc/evil")), "evil.pl");
    }

    #[test]
    fn test_render_hoists_existing_shebang() {
        let file = render_script_file(&sample_response(), "gemini-2.5-flash");

        assert!(file.starts_with("#!/usr/bin/perl -w\n# Generated by clicod"));
        assert_eq!(file.matches("#!").count(), 1);
        assert!(file.contains("# Model: gemini-2.5-flash\n"));
        assert!(file.contains("# Description: Prints hi\n"));
        assert!(file.contains("# cpan install Text::CSV\n"));
        assert!(file.contains("# perl hi.pl\n"));
        assert!(file.ends_with("use strict;\nprint \"hi\\n\";\n"));
    }

    #[test]
    fn test_render_adds_shebang_when_missing() {
        let response = PerlResponse::from_plain("print 1;");
        let file = render_script_file(&response, "m");
        assert!(file.starts_with("#!/usr/bin/env perl\n"));
        assert!(file.ends_with("print 1;\n"));
    }

    #[test]
    fn test_save_script_writes_main_and_additional_files() {
        let temp = TempDir::new().unwrap();
        let mut response = sample_response();
        response.perl_code.additional_files = vec![AdditionalFile {
            filename: "sub/Helper.pm".to_string(),
            content: "package Helper; 1;".to_string(),
            description: "helper".to_string(),
        }];

        let saved = save_script(&response, temp.path(), Some("hello"), "m").unwrap();

        assert_eq!(saved.path, temp.path().join("hello.pl"));
        assert!(fs::read_to_string(&saved.path).unwrap().contains("use strict;"));
        assert_eq!(saved.additional_files, vec![temp.path().join("Helper.pm")]);
        assert_eq!(
            fs::read_to_string(&saved.additional_files[0]).unwrap(),
            "package Helper; 1;"
        );
    }

    #[test]
    fn test_additional_file_never_replaces_main_script() {
        let temp = TempDir::new().unwrap();
        let mut response = sample_response();
        response.perl_code.additional_files = vec![AdditionalFile {
            filename: DEFAULT_FILENAME.to_string(),
            content: "1;".to_string(),
            description: "clashes with the main script".to_string(),
        }];

        let saved = save_script(&response, temp.path(), None, "m").unwrap();

        assert_eq!(saved.path, temp.path().join(DEFAULT_FILENAME));
        assert!(saved.additional_files.is_empty());
        assert!(fs::read_to_string(&saved.path).unwrap().contains("use strict;"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let saved = save_script(&sample_response(), temp.path(), None, "m").unwrap();
        let mode = fs::metadata(&saved.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");

        write_atomic(&path, b"first", None).unwrap();
        write_atomic(&path, b"second", None).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_failure_creates_nothing() {
        let temp = TempDir::new().unwrap();
        // A directory in the way makes the final rename fail
        let path = temp.path().join("taken");
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(write_atomic(&path, b"data", None).is_err());
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["taken".to_string()]);
    }

    #[test]
    fn test_perl_hint_mentions_path() {
        let hint = perl_hint(Path::new("/tmp/x.pl"));
        assert!(hint.starts_with("Run with: perl /tmp/x.pl"));
    }
}
