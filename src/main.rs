use clap::{Arg, ArgAction, ArgMatches, Command};
use clicod::command_router::{
    self, CommandRouter, ConfigOptions, GenerateOptions, parse_assignment,
};
use clicod::config::ConfigStore;
use clicod::display::should_use_colors;
use clicod::gemini::generator_from_env;
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CLICOD_LOG";

fn cli() -> Command {
    Command::new("clicod")
        .version(env!("CARGO_PKG_VERSION"))
        .about("clicod - CLI Code Generator: Perl scripts from plain descriptions")
        .long_about(
            "clicod turns a natural-language description into a Perl script using Google Gemini.\n\
             Configuration lives in ~/.clicod/config.json (override the directory with CLICOD_CONFIG_DIR).",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .help("Gemini model for this run, overriding the configured default")
                .value_name("MODEL")
                .global(true)
                .num_args(1),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a Perl script from a description")
                .arg(
                    Arg::new("prompt")
                        .help("What the script should do")
                        .num_args(1..),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .short('s')
                        .help("Save the generated script")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("filename")
                        .long("filename")
                        .short('f')
                        .help("File name for the saved script (.pl is added when missing)")
                        .value_name("NAME")
                        .num_args(1),
                )
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .help("Print the reply while it is generated")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("interactive")
                        .long("interactive")
                        .short('i')
                        .help("Start an interactive session")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change the configuration")
                .arg(
                    Arg::new("set-key")
                        .long("set-key")
                        .help("Store the Gemini API key (prompts when no value is given)")
                        .value_name("KEY")
                        .num_args(0..=1)
                        .default_missing_value(""),
                )
                .arg(
                    Arg::new("set-model")
                        .long("set-model")
                        .help("Set the default model")
                        .value_name("MODEL")
                        .num_args(1),
                )
                .arg(
                    Arg::new("set-save-location")
                        .long("set-save-location")
                        .help("Directory where scripts are saved")
                        .value_name("DIR")
                        .num_args(1),
                )
                .arg(
                    Arg::new("auto-save")
                        .long("auto-save")
                        .help("Save every generated script")
                        .value_name("BOOL")
                        .num_args(1),
                )
                .arg(
                    Arg::new("streaming")
                        .long("streaming")
                        .help("Stream replies by default")
                        .value_name("BOOL")
                        .num_args(1),
                )
                .arg(
                    Arg::new("json-format")
                        .long("json-format")
                        .help("Ask the model for the structured JSON format")
                        .value_name("BOOL")
                        .num_args(1),
                )
                .arg(
                    Arg::new("set")
                        .long("set")
                        .help("Set any option by name")
                        .value_name("KEY=VALUE")
                        .action(ArgAction::Append)
                        .num_args(1),
                )
                .arg(
                    Arg::new("show")
                        .long("show")
                        .help("Show the configuration")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .help("Reset the configuration to defaults")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("test").about("Check the API key and model with a small request"))
        .subcommand(Command::new("examples").about("Show usage examples"))
        .subcommand(Command::new("about").about("Show information about clicod"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn config_options(matches: &ArgMatches) -> anyhow::Result<ConfigOptions> {
    let set_key = matches
        .get_one::<String>("set-key")
        .map(|key| Some(key.clone()).filter(|k| !k.is_empty()));

    let mut updates = Vec::new();
    for (arg, option) in [
        ("set-model", "default_model"),
        ("set-save-location", "save_location"),
        ("auto-save", "auto_save"),
        ("streaming", "streaming"),
        ("json-format", "json_format"),
    ] {
        if let Some(value) = matches.get_one::<String>(arg) {
            updates.push((option.to_string(), value.clone()));
        }
    }
    for raw in matches.get_many::<String>("set").unwrap_or_default() {
        updates.push(parse_assignment(raw)?);
    }

    Ok(ConfigOptions {
        set_key,
        updates,
        show: matches.get_flag("show"),
        reset: matches.get_flag("reset"),
    })
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let colors = should_use_colors();
    let store = ConfigStore::open_default()?;
    info!("Using config file {}", store.path().display());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let Some((name, sub)) = matches.subcommand() else {
        cli().print_help()?;
        return Ok(());
    };
    let model = sub
        .get_one::<String>("model")
        .or_else(|| matches.get_one::<String>("model"))
        .cloned();

    match name {
        "generate" => {
            let prompt = sub
                .get_many::<String>("prompt")
                .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "));
            let options = GenerateOptions {
                prompt,
                save: sub.get_flag("save"),
                filename: sub.get_one::<String>("filename").cloned(),
                stream: sub.get_flag("stream"),
                interactive: sub.get_flag("interactive"),
            };
            let mut router = CommandRouter::new(store, generator_from_env())?
                .with_model_override(model)
                .with_colors(colors);
            router.generate(options, &mut input, &mut output).await?;
        }
        "config" => {
            let options = config_options(sub)?;
            command_router::run_config(&store, options, &mut input, &mut output, colors)?;
        }
        "test" => {
            let mut router = CommandRouter::new(store, generator_from_env())?
                .with_model_override(model)
                .with_colors(colors);
            router.test_connection(&mut input, &mut output).await?;
        }
        "examples" => command_router::show_examples(&mut output, colors)?,
        "about" => command_router::show_about(store.path(), &mut output, colors)?,
        other => unreachable!("unknown subcommand {other}"),
    }

    output.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let matches = cli().get_matches();

    if let Err(e) = run(matches).await {
        let _ = io::stdout().flush();
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}
