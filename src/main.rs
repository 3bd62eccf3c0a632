use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use qws_script_engine::browser::{DryRunBrowser, StaticSettings, OUTPUT_DIR_KEY};
use qws_script_engine::library::{ScriptLibrary, ScriptSource};
use qws_script_engine::telemetry::{self, TelemetryConfig};
use qws_script_engine::{CommandRegistry, EngineConfig, ExecutionContext, ExecutorState, ScriptExecutor};

#[derive(Parser)]
#[command(name = "qws-script")]
#[command(about = "Replay and inspect browser automation scripts", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a script
    Run {
        /// Script path, or a name from the script library
        #[arg(short, long)]
        file: String,

        /// Path to the output report file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root directory for saved HTML and screenshots
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Log browser calls instead of performing them
        #[arg(long)]
        dry_run: bool,

        /// Stop at the first failing command
        #[arg(long)]
        stop_on_error: bool,

        /// Pause after a failing command (Ctrl-C then stops the run)
        #[arg(long)]
        pause_on_error: bool,
    },
    /// Loads a script and reports entries that would be skipped
    Validate {
        #[arg(short, long)]
        file: String,
    },
    /// Lists user and example scripts
    List,
    /// Lists the registered command names
    Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_telemetry(TelemetryConfig::from_env().verbose(cli.verbose)) {
        eprintln!("⚠️  Telemetry disabled: {e:#}");
    }

    let config = EngineConfig::from_env();
    let library = ScriptLibrary::from_config(&config);
    let registry = Arc::new(CommandRegistry::with_builtins());

    let code = match cli.command {
        Commands::Run {
            file,
            output,
            output_dir,
            dry_run,
            stop_on_error,
            pause_on_error,
        } => {
            let options = RunOptions {
                output,
                output_dir,
                dry_run,
                stop_on_error: stop_on_error || config.stop_on_error,
                pause_on_error: pause_on_error || config.pause_on_error,
            };
            run_script(&file, options, &config, &library, registry).await
        }
        Commands::Validate { file } => validate_script(&file, &config, &library, registry),
        Commands::List => list_scripts(&library),
        Commands::Commands => {
            for name in registry.list_names() {
                println!("{name}");
            }
            0
        }
    };

    telemetry::shutdown_telemetry();
    std::process::exit(code);
}

struct RunOptions {
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    dry_run: bool,
    stop_on_error: bool,
    pause_on_error: bool,
}

fn locate(file: &str, library: &ScriptLibrary) -> Option<PathBuf> {
    let direct = Path::new(file);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    library.resolve(file)
}

/// Loads `file` into a fresh executor, printing what was skipped.
fn load(
    file: &str,
    config: &EngineConfig,
    library: &ScriptLibrary,
    registry: Arc<CommandRegistry>,
) -> Option<ScriptExecutor> {
    let Some(path) = locate(file, library) else {
        eprintln!("❌ Script not found: {file}");
        return None;
    };

    let mut executor = ScriptExecutor::new(registry).with_config(config);
    match executor.load_from_file(&path) {
        Ok(count) => {
            println!("📋 Script Loaded: {} ({} commands)", executor.info().name, count);
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_message());
            return None;
        }
    }

    for err in executor.load_errors() {
        println!("   ⚠️  Skipped {err}");
    }
    Some(executor)
}

async fn run_script(
    file: &str,
    options: RunOptions,
    config: &EngineConfig,
    library: &ScriptLibrary,
    registry: Arc<CommandRegistry>,
) -> i32 {
    println!("🚀 Script Engine Initializing...");

    let Some(mut executor) = load(file, config, library, registry) else {
        return 1;
    };
    if executor.state() == ExecutorState::LoadFailed {
        return 1;
    }

    let mut context = ExecutionContext::new()
        .with_stop_on_error(options.stop_on_error)
        .with_pause_on_error(options.pause_on_error);
    if let Some(dir) = &options.output_dir {
        let settings = StaticSettings::new().with(OUTPUT_DIR_KEY, json!(dir.to_string_lossy()));
        context = context.with_settings(Arc::new(settings));
    }
    if options.dry_run {
        context = context.with_browser(Arc::new(DryRunBrowser::new()));
    } else {
        println!("⚠️  No browser attached; browser commands will fail (use --dry-run to simulate)");
    }

    let control = executor.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("⏹️  Stop requested");
            control.stop();
        }
    });

    println!("▶️  Starting Execution...");
    let passed = executor
        .execute_with_progress(&mut context, &mut |index, total, description| {
            println!("   [{}/{}] {}", index + 1, total, description);
        })
        .await;
    println!("🏁 Execution Finished.");

    for err in executor.get_errors() {
        println!("   ❌ {err}");
    }

    let report = executor.report();
    match serde_json::to_string_pretty(&report) {
        Ok(json) => match &options.output {
            Some(path) => match std::fs::write(path, json) {
                Ok(()) => println!("📄 Report saved to: {}", path.display()),
                Err(e) => eprintln!("❌ Failed to write report: {e}"),
            },
            None => println!("\n--- Execution Report ---\n{json}"),
        },
        Err(e) => eprintln!("❌ Failed to serialize report: {e}"),
    }

    if passed {
        0
    } else {
        1
    }
}

fn validate_script(
    file: &str,
    config: &EngineConfig,
    library: &ScriptLibrary,
    registry: Arc<CommandRegistry>,
) -> i32 {
    let Some(executor) = load(file, config, library, registry) else {
        return 1;
    };
    if executor.load_errors().is_empty() {
        println!("✅ All {} commands are valid", executor.len());
        0
    } else {
        println!("❌ {} entries failed to load", executor.load_errors().len());
        1
    }
}

fn list_scripts(library: &ScriptLibrary) -> i32 {
    match library.list() {
        Ok(entries) if entries.is_empty() => {
            println!("No scripts in {} or {}", library.user_dir().display(), library.examples_dir().display());
            0
        }
        Ok(entries) => {
            for entry in entries {
                let source = match entry.source {
                    ScriptSource::User => "user",
                    ScriptSource::Example => "example",
                };
                println!("{:<30} {:<8} {}", entry.name, source, entry.path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_message());
            1
        }
    }
}
