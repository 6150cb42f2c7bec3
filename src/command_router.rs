//! Command handlers behind the CLI verbs.
//!
//! `generate` and `test` run through a [`CommandRouter`], which owns the
//! configuration loaded for this invocation and the text generator. `config`,
//! `examples` and `about` are plain functions: `config --reset` must work on a
//! corrupt file, and the static pages need no settings at all.

use crate::config::{
    ConfigKey, ConfigStore, Configuration, MaskedConfiguration, env_api_key, lookup_option,
};
use crate::display;
use crate::error::ClicodError;
use crate::gemini::{GenerationRequest, TextGenerator};
use crate::interactive::{ask_yes_no, prompt_line};
use crate::output::{self, SavedScript};
use crate::prompt::{ResponseFormat, build_prompt, build_test_prompt};
use crate::renderer::{render_about, render_config, render_examples, render_response};
use crate::response::PerlResponse;
use anyhow::{Context, Result, anyhow, bail};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

/// Options of `clicod generate`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub prompt: Option<String>,
    pub save: bool,
    pub filename: Option<String>,
    pub stream: bool,
    pub interactive: bool,
}

/// Options of `clicod config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// `Some(None)` reads the key from input.
    pub set_key: Option<Option<String>>,
    /// `(option, raw value)` pairs, validated together.
    pub updates: Vec<(String, String)>,
    pub show: bool,
    pub reset: bool,
}

/// Splits a `KEY=VALUE` argument.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", raw))?;
    Ok((key.trim().to_string(), value.to_string()))
}

pub struct CommandRouter {
    store: ConfigStore,
    config: Configuration,
    generator: Box<dyn TextGenerator>,
    env_api_key: Option<String>,
    model_override: Option<String>,
    colors: bool,
}

impl CommandRouter {
    /// Loads the configuration once for this invocation.
    pub fn new(store: ConfigStore, generator: Box<dyn TextGenerator>) -> Result<Self> {
        let config = store.load()?;
        Ok(Self {
            store,
            config,
            generator,
            env_api_key: env_api_key(),
            model_override: None,
            colors: false,
        })
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model.filter(|m| !m.trim().is_empty());
        self
    }

    /// Replaces the `GEMINI_API_KEY` value captured at construction.
    pub fn with_env_api_key(mut self, key: Option<String>) -> Self {
        self.env_api_key = key;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn model(&self) -> &str {
        self.model_override
            .as_deref()
            .unwrap_or(&self.config.default_model)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::from_json_flag(self.config.json_format)
    }

    pub(crate) fn masked_config(&self) -> MaskedConfiguration {
        self.config.masked(self.env_api_key.clone())
    }

    pub(crate) fn write_markdown<W: Write>(&self, output: &mut W, markdown: &str) -> Result<()> {
        display::write_markdown(output, markdown, self.colors)?;
        Ok(())
    }

    /// Persists one option and keeps the in-memory copy in step.
    pub(crate) fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.config = self.store.set(key, value)?;
        Ok(())
    }

    /// Returns the key to use, offering to store one when none is configured.
    fn ensure_api_key<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<String> {
        if !self.generator.requires_api_key() {
            return Ok(String::new());
        }
        if let Some(key) = self.config.effective_api_key(self.env_api_key.clone()) {
            return Ok(key);
        }

        writeln!(output, "🔐 Gemini API key not found in configuration")?;
        if ask_yes_no(input, output, "Would you like to set it now?")? {
            if let Some(key) = prompt_line(input, output, "Enter your Gemini API key: ")? {
                if !key.trim().is_empty() {
                    self.set_option("gemini_api_key", &key)?;
                    writeln!(output, "✅ API key saved to clicod config")?;
                    return Ok(key.trim().to_string());
                }
            }
        }
        Err(ClicodError::MissingApiKey.into())
    }

    /// Sends one prompt, renders the answer and returns it parsed.
    pub async fn generate_once<R, W>(
        &mut self,
        prompt: &str,
        stream: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<PerlResponse>
    where
        R: BufRead,
        W: Write + Send,
    {
        let api_key = self.ensure_api_key(input, output)?;
        let format = self.response_format();
        let request = GenerationRequest {
            prompt: build_prompt(prompt, format),
            model: self.model().to_string(),
            api_key,
        };
        info!("Generating with model {} (stream: {})", request.model, stream);

        let text = if stream {
            writeln!(output, "📡 clicod streaming from {}...\n", request.model)?;
            let mut sink = |chunk: &str| -> std::io::Result<()> {
                output.write_all(chunk.as_bytes())?;
                output.flush()
            };
            let text = self.generator.generate_stream(&request, &mut sink).await?;
            writeln!(output, "\n\n🔄 Processing streamed response...")?;
            text
        } else {
            writeln!(output, "🤖 clicod generating code using {}...", request.model)?;
            self.generator.generate(&request).await?
        };

        let response = match format {
            ResponseFormat::Structured => match PerlResponse::parse_structured(&text) {
                Ok(response) => response,
                Err(e) => {
                    if !stream {
                        writeln!(output, "Raw response (JSON parse failed):\n{}", text)?;
                    }
                    return Err(e.into());
                }
            },
            ResponseFormat::Plain => PerlResponse::from_plain(&text),
        };

        writeln!(output, "\n{}", "=".repeat(80))?;
        self.write_markdown(output, &render_response(&response))?;
        if !response.is_success() {
            warn!("Model reported status {:?}", response.status);
            writeln!(output, "⚠️ The model did not report success, review the output carefully")?;
        }
        Ok(response)
    }

    /// Saves into the configured location and reports what was written.
    pub fn save<W: Write>(
        &self,
        response: &PerlResponse,
        filename: Option<&str>,
        output: &mut W,
    ) -> Result<Option<SavedScript>> {
        if !response.has_code() {
            warn!("Response contains no Perl code, nothing saved");
            writeln!(output, "⚠️ The response contains no Perl code, nothing saved")?;
            return Ok(None);
        }

        let saved = output::save_script(
            response,
            &self.config.save_location,
            filename,
            self.model(),
        )?;

        writeln!(output, "✅ Code saved to {}", saved.path.display())?;
        for extra in &saved.additional_files {
            writeln!(output, "✅ Additional file saved: {}", extra.display())?;
        }
        let cpan = &response.dependencies.cpan_modules;
        if !cpan.is_empty() {
            writeln!(output, "📦 Install dependencies with:")?;
            for module in cpan {
                writeln!(output, "   {}", module.install_command())?;
            }
        }
        writeln!(output, "🏃 {}", output::perl_hint(&saved.path))?;
        Ok(Some(saved))
    }

    /// `clicod generate`
    pub async fn generate<R, W>(
        &mut self,
        options: GenerateOptions,
        input: &mut R,
        output: &mut W,
    ) -> Result<()>
    where
        R: BufRead,
        W: Write + Send,
    {
        let stream = options.stream || self.config.streaming;
        if options.interactive {
            return self.interactive(stream, input, output).await;
        }

        let Some(prompt) = options.prompt.filter(|p| !p.trim().is_empty()) else {
            bail!(
                "Please provide a description or use --interactive mode\n\
                 Example: clicod generate 'Create a CSV parser script'"
            );
        };

        let response = self.generate_once(&prompt, stream, input, output).await?;

        // Also when streaming: the file is written once, from the assembled response
        if options.save || self.config.auto_save {
            self.save(&response, options.filename.as_deref(), output)?;
        }
        Ok(())
    }

    /// `clicod test`
    pub async fn test_connection<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        let api_key = self.ensure_api_key(input, output)?;
        let format = self.response_format();
        writeln!(
            output,
            "🔌 Testing clicod connection with {}...",
            self.model()
        )?;

        let request = GenerationRequest {
            prompt: build_test_prompt(format),
            model: self.model().to_string(),
            api_key,
        };
        let text = self
            .generator
            .generate(&request)
            .await
            .context("Connection failed")?;

        match format {
            ResponseFormat::Structured => match PerlResponse::parse_structured(&text) {
                Ok(response) if response.is_success() => {
                    writeln!(output, "✅ Connection and JSON parsing successful!")?;
                    writeln!(
                        output,
                        "📊 Response status: {}",
                        response.status.as_deref().unwrap_or("unknown")
                    )?;
                }
                Ok(response) => {
                    writeln!(
                        output,
                        "⚠️ Connected, but the model reported status: {}",
                        response.status.as_deref().unwrap_or("unknown")
                    )?;
                }
                Err(e) => {
                    warn!("Test reply did not parse: {}", e);
                    writeln!(output, "⚠️ Connection successful but JSON parsing failed")?;
                }
            },
            ResponseFormat::Plain => {
                let response = PerlResponse::from_plain(&text);
                writeln!(output, "✅ Connection successful!")?;
                writeln!(
                    output,
                    "📊 Received {} lines of Perl",
                    response.main_script().lines().count()
                )?;
            }
        }
        Ok(())
    }
}

fn describe_update(config: &Configuration, key: &str) -> String {
    let Ok(spec) = lookup_option(key) else {
        return format!("✅ {} updated", key);
    };
    match spec.key {
        ConfigKey::GeminiApiKey => "✅ API key updated".to_string(),
        ConfigKey::DefaultModel => format!("✅ Default model set to: {}", config.default_model),
        ConfigKey::SaveLocation => {
            format!("✅ Save location set to: {}", config.save_location.display())
        }
        ConfigKey::AutoSave => format!("✅ Auto-save {}", enabled(config.auto_save)),
        ConfigKey::Streaming => format!("✅ Streaming {}", enabled(config.streaming)),
        ConfigKey::JsonFormat => format!("✅ JSON format {}", enabled(config.json_format)),
    }
}

fn enabled(on: bool) -> &'static str {
    if on { "enabled" } else { "disabled" }
}

/// `clicod config`
pub fn run_config<R: BufRead, W: Write>(
    store: &ConfigStore,
    options: ConfigOptions,
    input: &mut R,
    output: &mut W,
    colors: bool,
) -> Result<()> {
    if options.reset {
        if ask_yes_no(input, output, "⚠️ Reset all configuration to defaults?")? {
            store.reset()?;
            writeln!(output, "✅ Configuration reset to defaults")?;
        } else {
            writeln!(output, "Reset cancelled")?;
        }
        return Ok(());
    }

    let mut updates = Vec::new();
    let asked_for_key = options.set_key.is_some();
    if let Some(key) = options.set_key {
        let key = match key {
            Some(key) => Some(key),
            None => prompt_line(input, output, "Enter your Gemini API key: ")?,
        };
        match key.filter(|k| !k.trim().is_empty()) {
            Some(key) => updates.push(("gemini_api_key".to_string(), key)),
            None => writeln!(output, "No API key entered, nothing changed")?,
        }
    }
    updates.extend(options.updates);

    if !updates.is_empty() {
        let config = store.apply(&updates)?;
        for (key, _) in &updates {
            writeln!(output, "{}", describe_update(&config, key))?;
        }
    }

    if options.show || (updates.is_empty() && !asked_for_key) {
        let masked = store.show()?;
        display::write_markdown(output, &render_config(&masked, store.path()), colors)?;
    }
    Ok(())
}

/// `clicod examples`
pub fn show_examples<W: Write>(output: &mut W, colors: bool) -> Result<()> {
    display::write_markdown(output, &render_examples(), colors)?;
    Ok(())
}

/// `clicod about`
pub fn show_about<W: Write>(config_path: &Path, output: &mut W, colors: bool) -> Result<()> {
    display::write_markdown(output, &render_about(config_path), colors)?;
    Ok(())
}
