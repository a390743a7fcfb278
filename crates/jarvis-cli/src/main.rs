mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_control::DEFAULT_USER;
use jarvis_toolkit::Region;

/// Jarvis -- policy-gated shell commands and desktop automation.
#[derive(Parser, Debug)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Identity recorded in the history ledger
    #[arg(long, global = true, default_value = DEFAULT_USER)]
    user: String,

    /// Config file to use in place of ./.jarvis/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Simulated screen, no audio, no translation service, in-memory history
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a shell command after the policy check
    Exec {
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Translate a plain-language request into a command without running it
    Interpret {
        #[arg(trailing_var_arg = true, required = true)]
        request: Vec<String>,
    },

    /// Interpret a plain-language request and run the result
    Ask {
        #[arg(trailing_var_arg = true, required = true)]
        request: Vec<String>,
    },

    /// Run several commands in order, continuing past failures
    Batch {
        /// Name recorded with the batch
        #[arg(long, default_value = "batch")]
        name: String,

        /// Commands, one per argument
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Run a named command template, or list templates when no name is given
    Template { name: Option<String> },

    /// List the commands the policy allows on this platform
    SafeCommands,

    /// Run an automation sequence from a JSON file
    Sequence {
        /// JSON array of {type, params} objects, or {name, sequence}
        file: PathBuf,
    },

    /// Run a single automation action
    Action {
        /// Action type (click, click_image, type, key, scroll, wait, screenshot, ocr, wait_for_image)
        kind: String,

        /// Action parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Capture the screen to a PNG file
    Screenshot {
        /// Capture only x,y,width,height
        #[arg(long, value_parser = parse_region)]
        region: Option<Region>,

        /// File name inside the screenshot directory
        #[arg(long)]
        output: Option<String>,

        /// Include the PNG as base64 in the output
        #[arg(long)]
        base64: bool,
    },

    /// Find a template image on screen
    Locate {
        template: String,

        #[arg(long, default_value_t = 0.8)]
        confidence: f32,

        #[arg(long, value_parser = parse_region)]
        region: Option<Region>,
    },

    /// Extract text from the screen
    Ocr {
        #[arg(long, value_parser = parse_region)]
        region: Option<Region>,

        /// Recognizer language
        #[arg(long, default_value = "eng")]
        lang: String,
    },

    /// List top-level windows
    Windows,

    /// Focus the first window whose title contains the given text
    Activate { title: String },

    /// Listen for the wake phrase and print each detection
    Listen {
        /// Trigger phrase (defaults to the configured one)
        #[arg(long)]
        phrase: Option<String>,

        /// Stop after this many detections
        #[arg(long)]
        count: Option<u64>,
    },

    /// Show recent history for the current user
    History {
        /// command, interpretation, batch or sequence
        #[arg(long)]
        kind: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Report platform, toolkit backend, screen size and wake status
    Status,

    /// Print the effective configuration and where each section came from
    Config,
}

fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid region '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
        _ => Err(format!("invalid region '{s}': expected x,y,width,height")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing with env filter (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        return commands::info::show_config(cli.config.as_deref());
    }

    let assistant = commands::build_assistant(cli.config.as_deref(), cli.offline).await?;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Exec { command } => commands::shell::exec(&assistant, user, &command.join(" ")).await,
        Commands::Interpret { request } => {
            commands::shell::interpret(&assistant, user, &request.join(" ")).await
        }
        Commands::Ask { request } => commands::shell::ask(&assistant, user, &request.join(" ")).await,
        Commands::Batch {
            name,
            commands: list,
        } => commands::shell::batch(&assistant, user, &name, &list).await,
        Commands::Template { name } => match name {
            Some(name) => commands::shell::template(&assistant, user, &name).await,
            None => commands::emit(&assistant.list_templates()),
        },
        Commands::SafeCommands => commands::emit(&assistant.safe_commands()),
        Commands::Sequence { file } => commands::automation::sequence(&assistant, user, &file).await,
        Commands::Action { kind, params } => {
            commands::automation::action(&assistant, &kind, &params).await
        }
        Commands::Screenshot {
            region,
            output,
            base64,
        } => commands::emit(&assistant.screenshot(region, output, base64).await),
        Commands::Locate {
            template,
            confidence,
            region,
        } => commands::emit(&assistant.locate(&template, confidence, region).await),
        Commands::Ocr { region, lang } => {
            commands::emit(&assistant.extract_text(region, &lang).await)
        }
        Commands::Windows => commands::emit(&assistant.list_windows().await),
        Commands::Activate { title } => commands::emit(&assistant.activate_window(&title).await),
        Commands::Listen { phrase, count } => {
            commands::voice::listen(&assistant, phrase.as_deref(), count).await
        }
        Commands::History { kind, limit } => {
            commands::info::history(&assistant, user, kind.as_deref(), limit)
        }
        Commands::Status => commands::emit(&assistant.status().await),
        Commands::Config => commands::info::show_config(cli.config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn region_parsing() {
        assert_eq!(parse_region("1, 2,30,40").unwrap(), Region::new(1, 2, 30, 40));
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn trailing_command_words_are_collected() {
        let cli = Cli::try_parse_from(["jarvis", "--offline", "exec", "ls", "-la"]).unwrap();
        assert!(cli.offline);
        match cli.command {
            Commands::Exec { command } => assert_eq!(command, vec!["ls", "-la"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
