mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code_for, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use contvol_core::{install_signal_handler, Engine, LifecycleMode, ProviderConfig};
use contvol_runtime::{CancelFlag, OperationContext};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "contvol",
    version,
    about = "Declarative lifecycle for inventory-scoped container volumes"
)]
struct Cli {
    /// Path to the contvol state directory.
    #[arg(long, default_value = "~/.local/share/contvol", global = true)]
    store: String,

    /// Provider configuration file (default: ~/.config/contvol/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the runtime backend from the configuration.
    #[arg(long, global = true, value_parser = ["docker", "mock"])]
    runtime: Option<String>,

    /// Inspect and remove runtime volumes instead of passing state through.
    #[arg(long, default_value_t = false, global = true)]
    reconcile: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update the volume recorded at an address.
    Apply {
        /// Resource address, e.g. `imagetest_container_volume.cache`.
        address: String,
        /// Volume name.
        #[arg(long)]
        name: String,
        /// Inventory seed the volume is scoped to.
        #[arg(long)]
        seed: String,
    },
    /// Show what apply would do without touching state or the runtime.
    Plan {
        address: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        seed: String,
    },
    /// Re-read a recorded volume and commit the result.
    Refresh { address: String },
    /// Delete a recorded volume and drop its record.
    Destroy { address: String },
    /// Adopt an existing volume id under an address.
    Import {
        address: String,
        /// Runtime volume id.
        id: String,
    },
    /// Show one state record.
    Show { address: String },
    /// List all state records.
    List,
    /// Print the volume id computed for a name and seed.
    Id {
        #[arg(long)]
        name: String,
        #[arg(long)]
        seed: String,
    },
    /// Print the resource attribute schema.
    Schema,
    /// Run diagnostic checks on the configuration, runtime and state.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CONTVOL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let cancel = CancelFlag::new();
    install_signal_handler(cancel.clone());
    let ctx = OperationContext::background().with_cancel(cancel);

    let config = match load_config(cli.config.as_deref(), cli.runtime.as_deref(), cli.reconcile) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let store_path = expand_tilde(&cli.store);
    let json_output = cli.json;

    let needs_runtime = match cli.command {
        Commands::Apply { .. } => true,
        Commands::Refresh { .. } | Commands::Destroy { .. } | Commands::Import { .. } => {
            config.lifecycle.mode == LifecycleMode::Reconcile
        }
        _ => false,
    };
    if needs_runtime
        && config.runtime.backend == "docker"
        && std::env::var("CONTVOL_SKIP_PREREQS").as_deref() != Ok("1")
    {
        let missing = contvol_runtime::check_runtime_prereqs(
            &config.runtime.binary,
            config.runtime.host.as_deref(),
        );
        if !missing.is_empty() {
            eprintln!("error: {}", contvol_runtime::format_missing(&missing));
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let engine = || Engine::new(&store_path, &config).map_err(|e| e.to_string());

    let result = match cli.command {
        Commands::Apply {
            address,
            name,
            seed,
        } => engine().and_then(|e| {
            commands::apply::run(&e, &ctx, &address, &name, &seed, json_output)
        }),
        Commands::Plan {
            address,
            name,
            seed,
        } => {
            engine().and_then(|e| commands::plan::run(&e, &address, &name, &seed, json_output))
        }
        Commands::Refresh { address } => {
            engine().and_then(|e| commands::refresh::run(&e, &ctx, &address, json_output))
        }
        Commands::Destroy { address } => {
            engine().and_then(|e| commands::destroy::run(&e, &ctx, &address, json_output))
        }
        Commands::Import { address, id } => {
            engine().and_then(|e| commands::import::run(&e, &ctx, &address, &id, json_output))
        }
        Commands::Show { address } => {
            engine().and_then(|e| commands::show::run(&e, &address, json_output))
        }
        Commands::List => engine().and_then(|e| commands::list::run(&e, json_output)),
        Commands::Id { name, seed } => {
            engine().and_then(|e| commands::id::run(&e, &name, &seed, json_output))
        }
        Commands::Schema => commands::schema::run(&config.resource_type(), json_output),
        Commands::Doctor => commands::doctor::run(&store_path, &config, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

/// Load the provider configuration and apply command-line overrides.
fn load_config(
    path: Option<&Path>,
    runtime: Option<&str>,
    reconcile: bool,
) -> Result<ProviderConfig, String> {
    let mut config = match path {
        Some(p) => ProviderConfig::load(&expand_tilde(&p.to_string_lossy())),
        None => ProviderConfig::load_default(),
    }
    .map_err(|e| format!("configuration error: {e}"))?;

    if let Some(backend) = runtime {
        backend.clone_into(&mut config.runtime.backend);
    }
    if reconcile {
        config.lifecycle.mode = LifecycleMode::Reconcile;
    }
    config
        .validate()
        .map_err(|e| format!("configuration error: {e}"))?;
    tracing::debug!(
        backend = %config.runtime.backend,
        mode = %config.lifecycle.mode,
        "configuration loaded"
    );
    Ok(config)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
