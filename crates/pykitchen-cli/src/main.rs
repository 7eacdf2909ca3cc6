//! PyKitchen CLI
//!
//! Plays the kitchen in the terminal, or serves it to a browser front end.

mod command;

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pykitchen_core::{
    create_router, AppState, Catalog, Config, EventKind, HintDispatch, KitchenError,
    KitchenEvent, KitchenRuntime, LogEntry, Phase, SessionSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::command::{Command, CommandParseError, HELP};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// PyKitchen - learn Python built-ins by cooking
///
/// Fulfil each order by selecting a tool (a built-in function), placing
/// ingredients (values) into its arguments and running it.
#[derive(Parser, Debug)]
#[command(name = "pykitchen")]
#[command(version, about, long_about = None)]
struct Args {
    /// What to do (default: play)
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Path to configuration file (default: pykitchen.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Path to a catalog file, overriding the configured one
    #[arg(long, value_name = "FILE", global = true)]
    catalog: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Play in the terminal
    Play,

    /// Serve the HTTP API and console WebSocket
    Serve {
        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mode = args.mode.unwrap_or(Mode::Play);

    // Priority: RUST_LOG env var > --verbose flag > default
    // The terminal game stays quiet unless asked.
    let default_filter = match (args.verbose, mode) {
        (true, _) => "debug",
        (false, Mode::Play) => "warn",
        (false, Mode::Serve { .. }) => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("PyKitchen starting");
    tracing::debug!(config = ?args.config, catalog = ?args.catalog, "Arguments");

    match run(&args, mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Builds the runtime and runs the selected mode.
async fn run(args: &Args, mode: Mode) -> anyhow::Result<()> {
    let runtime = build_runtime(args)?;
    match mode {
        Mode::Play => play(runtime).await,
        Mode::Serve { port } => serve(runtime, port).await,
    }
}

/// Loads configuration and catalog, and builds the shared runtime.
fn build_runtime(args: &Args) -> anyhow::Result<KitchenRuntime> {
    let (mut config, base_dir) = load_config(args.config.as_deref())?;

    if let Some(ref catalog) = args.catalog {
        config.catalog = Some(catalog.clone());
        config.validate()?;
    }

    // A --catalog path is relative to where the command runs, not the config file
    let catalog_dir = if args.catalog.is_some() {
        PathBuf::from(".")
    } else {
        base_dir
    };

    let catalog = config.load_catalog(&catalog_dir).map_err(|e| {
        anyhow::anyhow!(
            "{e}\n\nSuggestion: Check the catalog path or remove it to use the bundled catalog"
        )
    })?;

    tracing::info!(
        ingredients = catalog.ingredients.len(),
        tools = catalog.tools.len(),
        orders = catalog.orders.len(),
        "Catalog loaded"
    );

    Ok(KitchenRuntime::from_config(&config, catalog)?)
}

/// Loads configuration from the specified path or default location.
///
/// Returns the directory relative catalog paths resolve against.
fn load_config(config_path: Option<&str>) -> anyhow::Result<(Config, PathBuf)> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            let base_dir = path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            let config = Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok((config, base_dir))
        }
        None => {
            let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok((config, PathBuf::from(".")))
        }
    }
}

// ============================================================================
// serve
// ============================================================================

/// Serves the API until Ctrl+C.
async fn serve(runtime: KitchenRuntime, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    println!("Starting HTTP API server on {addr}...");

    let router = create_router(AppState::new(runtime));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Console feed: ws://{addr}/api/ws");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

// ============================================================================
// play
// ============================================================================

/// Runs the interactive terminal game.
async fn play(runtime: KitchenRuntime) -> anyhow::Result<()> {
    let catalog = runtime.catalog().await;
    let snapshot = runtime.snapshot().await;

    println!("Welcome to PyKitchen! Type 'help' for commands.");
    print_order(&catalog, &snapshot);

    let printer = tokio::spawn(print_events(runtime.subscribe(), Arc::clone(&catalog)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandParseError::Empty) => continue,
            Err(e) => {
                println!("  {e}");
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        execute(&runtime, &catalog, command).await?;
    }

    printer.abort();
    let snapshot = runtime.snapshot().await;
    println!();
    println!("Final score: {}", snapshot.score);
    Ok(())
}

/// Runs one parsed command against the runtime.
///
/// Rejected commands are reported and play continues; anything else is fatal.
async fn execute(
    runtime: &KitchenRuntime,
    catalog: &Catalog,
    command: Command,
) -> anyhow::Result<()> {
    // Log lines arrive through the printer task; only rejections are reported here
    let outcome: Result<(), KitchenError> = match command {
        Command::Ingredient(name) => runtime.select_ingredient(&name).await.map(|_| {
            if let Some(idx) = catalog.ingredient_index(&name) {
                let ingredient = &catalog.ingredients[idx];
                println!("  Picked up {} = {}", ingredient.name, ingredient.display_value);
            }
        }),
        Command::Tool(name) => runtime.select_tool(&name).await.map(drop),
        Command::Place(slot) => runtime.place(slot).await.map(drop),
        Command::Clear(Some(slot)) => runtime.clear_slot(slot).await.map(drop),
        Command::Clear(None) => {
            runtime.clear_all().await;
            Ok(())
        }
        Command::Run => {
            runtime.run().await;
            Ok(())
        }
        Command::Hint => {
            match runtime.request_hint().await {
                HintDispatch::Started => {}
                HintDispatch::Busy => println!("  The chef is still thinking..."),
                HintDispatch::Finished => println!("  All orders are complete."),
            }
            Ok(())
        }
        Command::Status => {
            print_status(catalog, &runtime.snapshot().await);
            Ok(())
        }
        Command::Pantry => {
            print_pantry(catalog);
            Ok(())
        }
        Command::Tools => {
            print_tools(catalog);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_command_error() => {
            println!("  {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Prints console events as they are broadcast.
async fn print_events(mut events: broadcast::Receiver<KitchenEvent>, catalog: Arc<Catalog>) {
    let mut level = 0;
    loop {
        match events.recv().await {
            Ok(KitchenEvent::Log(payload)) => {
                print_entry(&payload.entry);
                prompt();
            }
            Ok(KitchenEvent::State(state)) => {
                if state.phase == Phase::AllOrdersComplete {
                    println!("Final score: {}. Type 'quit' to leave the kitchen.", state.score);
                    prompt();
                } else if state.level != level {
                    level = state.level;
                    if let Some(order) = catalog.order(level) {
                        print_order_card(level, catalog.orders.len(), &order.title, &order.description);
                        prompt();
                    }
                }
            }
            Ok(KitchenEvent::Connected(_)) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "Console fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_entry(entry: &LogEntry) {
    let marker = match entry.kind {
        EventKind::Info => " ",
        EventKind::Error => "!",
        EventKind::Success => "*",
        EventKind::Advisory => "~",
    };
    println!("\r{marker} {}", entry.message);
}

fn print_order(catalog: &Catalog, snapshot: &SessionSnapshot) {
    print_order_card(
        snapshot.level,
        catalog.orders.len(),
        &snapshot.order.title,
        &snapshot.order.description,
    );
}

fn print_order_card(level: usize, total: usize, title: &str, description: &str) {
    println!();
    println!("=== Order {} of {total}: {title} ===", level + 1);
    println!("{description}");
    println!();
}

fn print_status(catalog: &Catalog, snapshot: &SessionSnapshot) {
    print_order(catalog, snapshot);
    println!("  Expected result: {}", snapshot.order.expected_result);
    println!("  Score: {}", snapshot.score);

    let tool = snapshot
        .selected_tool
        .as_deref()
        .and_then(|id| catalog.tool(id));
    match tool {
        Some(tool) => {
            println!("  Tool: {}", tool.signature);
            for (i, (arg, slot)) in tool.args.iter().zip(&snapshot.slots).enumerate() {
                let contents = slot.as_ref().map_or_else(
                    || "(empty)".to_string(),
                    |s| format!("{} = {}", s.name, s.value),
                );
                println!("    {}. {}: {contents}", i + 1, arg.name);
            }
        }
        None => println!("  Tool: (none)"),
    }

    if let Some(ref pending) = snapshot.pending_ingredient {
        println!("  In hand: {pending}");
    }
    if snapshot.hint_busy {
        println!("  The chef is thinking...");
    }
}

fn print_pantry(catalog: &Catalog) {
    println!("Pantry:");
    for ingredient in &catalog.ingredients {
        println!(
            "  {:<12} {:<6} {}",
            ingredient.name,
            ingredient.value_type.to_string(),
            ingredient.display_value
        );
    }
}

fn print_tools(catalog: &Catalog) {
    println!("Tools:");
    for tool in &catalog.tools {
        println!("  {:<18} {}", tool.signature, tool.description);
    }
}
