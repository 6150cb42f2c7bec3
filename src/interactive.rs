//! Interactive generation session and terminal prompts.
//!
//! All reads and writes go through injected `BufRead`/`Write` handles so the
//! session can be driven from tests.

use crate::command_router::CommandRouter;
use crate::config::parse_bool;
use crate::output::INTERACTIVE_FILENAME;
use crate::renderer::render_config;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;

/// Prints `prompt` and reads one line. `None` on end of input.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Yes/no question; anything but y/yes (including end of input) is no.
pub fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    let answer = prompt_line(input, output, &format!("{} [y/N]: ", question))?;
    Ok(matches!(
        answer.as_deref().map(|a| a.trim().to_ascii_lowercase()).as_deref(),
        Some("y") | Some("yes")
    ))
}

/// What a line typed in the session asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Exit,
    ShowConfig,
    AutoSave(bool),
    Stream(bool),
    Invalid(String),
    Generate(String),
}

pub fn parse_session_command(line: &str) -> SessionCommand {
    let trimmed = line.trim();
    let lower = trimmed.to_ascii_lowercase();

    match lower.as_str() {
        "exit" | "quit" | "q" => return SessionCommand::Exit,
        "config" => return SessionCommand::ShowConfig,
        _ => {}
    }

    if let Some(setting) = lower.strip_prefix("save ") {
        return match parse_bool(setting) {
            Some(on) => SessionCommand::AutoSave(on),
            None => SessionCommand::Invalid("Use 'save on' or 'save off'".to_string()),
        };
    }
    if let Some(setting) = lower.strip_prefix("stream ") {
        return match parse_bool(setting) {
            Some(on) => SessionCommand::Stream(on),
            None => SessionCommand::Invalid("Use 'stream on' or 'stream off'".to_string()),
        };
    }

    SessionCommand::Generate(trimmed.to_string())
}

impl CommandRouter {
    /// Runs the prompt loop until `exit` or end of input.
    ///
    /// Generation and save failures are reported and the loop continues;
    /// configuration write failures end the session.
    pub async fn interactive<R, W>(&mut self, stream: bool, input: &mut R, output: &mut W) -> Result<()>
    where
        R: BufRead,
        W: Write + Send,
    {
        let mut stream = stream;
        writeln!(output, "🚀 clicod - Interactive Perl Code Generation")?;
        writeln!(output, "Using model: {}", self.model())?;
        writeln!(
            output,
            "Commands: 'exit', 'quit', 'config', 'save on/off', 'stream on/off'"
        )?;

        loop {
            let Some(line) = prompt_line(input, output, "\n📝 Describe your Perl script: ")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_session_command(&line) {
                SessionCommand::Exit => break,
                SessionCommand::ShowConfig => {
                    let masked = self.masked_config();
                    self.write_markdown(output, &render_config(&masked, self.store().path()))?;
                }
                SessionCommand::AutoSave(on) => {
                    self.set_option("auto_save", if on { "true" } else { "false" })?;
                    writeln!(
                        output,
                        "✅ Auto-save {}",
                        if on { "enabled" } else { "disabled" }
                    )?;
                }
                SessionCommand::Stream(on) => {
                    stream = on;
                    writeln!(
                        output,
                        "✅ Streaming {} for this session",
                        if on { "enabled" } else { "disabled" }
                    )?;
                }
                SessionCommand::Invalid(message) => writeln!(output, "⚠️ {}", message)?,
                SessionCommand::Generate(prompt) => {
                    info!("Interactive request: {}", prompt);
                    let response = match self.generate_once(&prompt, stream, input, output).await {
                        Ok(response) => response,
                        Err(e) => {
                            writeln!(output, "❌ {:#}", e)?;
                            continue;
                        }
                    };
                    if !response.has_code() {
                        continue;
                    }

                    let wants_save = self.config().auto_save
                        || ask_yes_no(input, output, "\n💾 Save this code to file?")?;
                    if !wants_save {
                        continue;
                    }
                    let filename = prompt_line(
                        input,
                        output,
                        &format!("Enter filename [{}]: ", INTERACTIVE_FILENAME),
                    )?
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| INTERACTIVE_FILENAME.to_string());

                    if let Err(e) = self.save(&response, Some(filename.as_str()), output) {
                        writeln!(output, "❌ {:#}", e)?;
                    }
                }
            }
        }

        writeln!(output, "👋 Thanks for using clicod!")?;
        Ok(())
    }
}
