use std::path::PathBuf;

use anyhow::{Context, Result};
use capsules_shell_exec::{toolbox, ExecutionFacade, Platform};
use clap::{Parser, Subcommand};
use config_loader::{ConfigManager, EngineConfig};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

mod report;

#[derive(Parser)]
#[command(name = "shellctl", version, about = "Run commands and code inside a confined workspace")]
struct Cli {
    /// Workspace root; overrides the config file and SHELLIDE_WORKSPACE
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,
    /// Engine config file (defaults to $CONFIG_DIR/engine.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a shell command line
    Run {
        #[arg(
            value_name = "COMMAND",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command: Vec<String>,
        /// Working directory relative to the workspace
        #[arg(long, value_name = "DIR")]
        cwd: Option<String>,
        /// Timeout in seconds (clamped to the configured maximum)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Execute a source snippet with the language's toolchain
    Code {
        #[arg(long, short)]
        language: String,
        #[arg(long, value_name = "PATH", conflicts_with = "source", required_unless_present = "source")]
        file: Option<PathBuf>,
        #[arg(long, value_name = "SRC")]
        source: Option<String>,
    },
    /// Classify a command line without running it
    Check {
        #[arg(value_name = "COMMAND", num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List languages runnable on this platform
    Languages,
    /// Print host and workspace information
    Info,
    /// Install a package with a supported package manager
    Install { manager: String, package: String },
    /// Print the command line for a dev-server preset
    Serve {
        kind: String,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate an engine config file against its schema without running anything
    ValidateConfig {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let manager = ConfigManager::new();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_file(&manager, path)
            .with_context(|| format!("loading engine config from {}", path.display()))?,
        None => EngineConfig::load(&manager).context("loading engine config")?,
    };
    if let Some(workspace) = &cli.workspace {
        config.workspace_root = workspace.clone();
    }
    debug!(
        workspace = %config.workspace_root.display(),
        shell = %config.shell,
        "engine config loaded"
    );
    Ok(config)
}

/// A lone argument is taken as a complete command line; several are re-quoted
/// so the shell sees the same words the caller passed.
fn command_line(args: Vec<String>) -> String {
    if args.len() == 1 {
        args.into_iter().next().unwrap_or_default()
    } else {
        shell_words::join(args)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::ValidateConfig { file } => {
            info!(file = %file.display(), "validating engine config");
            let outcome = ConfigManager::new().validate_config_file("engine", file);
            let status = report::config_validation(file, outcome)?;
            if status != 0 {
                std::process::exit(status);
            }
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let facade = ExecutionFacade::from_config(config).context("preparing workspace")?;

    let status = match cli.cmd {
        Commands::Run {
            command,
            cwd,
            timeout,
        } => {
            let command = command_line(command);
            report::outcome(
                facade
                    .execute_command(&command, cwd.as_deref(), timeout)
                    .await,
            )?
        }
        Commands::Code {
            language,
            file,
            source,
        } => {
            // clap guarantees exactly one of --file / --source
            let source = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => source.unwrap_or_default(),
            };
            report::outcome(facade.execute_code(&language, &source).await)?
        }
        Commands::Check { command } => {
            let command = command_line(command);
            report::verdict(&command, facade.classify(&command))?
        }
        Commands::Languages => {
            let languages = facade.dispatcher().supported_languages();
            report::emit(&serde_json::json!({
                "platform": platform_name(Platform::current()),
                "languages": languages,
            }))?;
            0
        }
        Commands::Info => {
            report::emit(&toolbox::system_info(&facade).await)?;
            0
        }
        Commands::Install { manager, package } => {
            report::outcome(toolbox::install_package(&facade, &manager, &package).await)?
        }
        Commands::Serve { kind, port } => {
            report::outcome(toolbox::server_command(&facade, &kind, port))?
        }
        Commands::Version | Commands::ValidateConfig { .. } => 0,
    };

    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}

fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Posix => "posix",
        Platform::Windows => "windows",
    }
}
