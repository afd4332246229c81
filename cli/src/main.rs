//! Toggle CLI - console host for the switch engine.
//!
//! Loads the configured switches, restores their persisted state, and then
//! reads commands from stdin:
//!
//! ```text
//! set <name> on|off   request a state change (same path a host write takes)
//! on <name>           shorthand for `set <name> on`
//! off <name>          shorthand for `set <name> off`
//! get <name>          print the cached state
//! list                print every switch with its state and dependencies
//! info <name>         print the host representation as JSON
//! quit                exit
//! ```
//!
//! Host signals are printed as they arrive. A resync is echoed back as a set
//! request, the way a real accessory host answers a forced value.

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use toggle_config::{ToggleConfig, config_path};
use toggle_engine::{ChannelHost, Engine, EngineOptions, HostSignal, Switch, Transition};
use toggle_store::FileStore;

#[derive(Debug, Parser)]
#[command(name = "toggle")]
#[command(about = "Console host for dependent switches", long_about = None)]
#[command(version)]
struct Args {
    /// Write logs to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,

    /// Config file (default: $TOGGLE_CONFIG, then <config_dir>/toggle/toggle.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(log_stderr: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if log_stderr {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
        return;
    }

    let (log_file, init_warnings) = open_log_file();
    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, keep the console clean rather than interleave logs
    // with command output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: next to the config file.
    if let Some(config_path) = config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("toggle.log"));
    }

    // Fallback: ./.toggle/logs/toggle.log
    candidates.push(PathBuf::from(".toggle").join("logs").join("toggle.log"));

    candidates
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Set { name: String, on: bool },
    Get(String),
    List,
    Info(String),
    Help,
    Quit,
}

fn parse_state(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// `Ok(None)` for a blank line.
fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    // Names may contain spaces; everything after the verb is the name.
    let joined = rest.join(" ");

    let command = match verb.to_ascii_lowercase().as_str() {
        "set" => {
            let Some((state, name)) = rest.split_last() else {
                return Err("usage: set <name> on|off".to_string());
            };
            let Some(on) = parse_state(state) else {
                return Err(format!("expected on or off, got '{state}'"));
            };
            if name.is_empty() {
                return Err("usage: set <name> on|off".to_string());
            }
            Command::Set {
                name: name.join(" "),
                on,
            }
        }
        "on" | "off" if !joined.is_empty() => Command::Set {
            name: joined,
            on: verb.eq_ignore_ascii_case("on"),
        },
        "get" if !joined.is_empty() => Command::Get(joined),
        "info" if !joined.is_empty() => Command::Info(joined),
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

fn state_word(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn describe(switch: &Switch) -> String {
    let config = switch.config();
    let mut line = format!("{}: {}", switch.name(), state_word(switch.current_state()));
    if !config.depends_on.is_empty() {
        let deps: Vec<&str> = config.depends_on.iter().map(|n| n.as_str()).collect();
        line.push_str(&format!("  on<-[{}]", deps.join(", ")));
    }
    if !config.depends_off.is_empty() {
        let deps: Vec<&str> = config.depends_off.iter().map(|n| n.as_str()).collect();
        line.push_str(&format!("  off<-[{}]", deps.join(", ")));
    }
    line
}

fn lookup(engine: &Engine, name: &str) -> Option<Switch> {
    let found = engine.switch(name);
    if found.is_none() {
        println!("no such switch: {name}");
    }
    found
}

/// Returns false when the console should stop.
async fn run_command(engine: &Engine, command: Command) -> Result<bool> {
    match command {
        Command::Set { name, on } => {
            let Some(switch) = lookup(engine, &name) else {
                return Ok(true);
            };
            match switch.request_state(on).await {
                Ok(Transition::Applied) => println!("{name}: {}", state_word(on)),
                Ok(Transition::Bounced) => println!("{name}: already on, bouncing"),
                Err(e) => println!("{name}: {e}"),
            }
        }
        Command::Get(name) => {
            if let Some(switch) = lookup(engine, &name) {
                println!("{name}: {}", state_word(switch.current_state()));
            }
        }
        Command::List => {
            for switch in engine.switches() {
                println!("{}", describe(&switch));
            }
        }
        Command::Info(name) => {
            if let Some(switch) = lookup(engine, &name) {
                let json = serde_json::to_string_pretty(&switch.representations())
                    .context("serializing representation")?;
                println!("{json}");
            }
        }
        Command::Help => {
            println!("set <name> on|off | on <name> | off <name> | get <name> | list | info <name> | quit");
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

async fn run_console(engine: &Engine) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                if !run_command(engine, command).await? {
                    return Ok(());
                }
            }
            Err(msg) => println!("{msg}"),
        }
    }
}

/// Print host signals and echo resyncs back as set requests.
async fn run_host(engine: Engine, mut signals: mpsc::Receiver<HostSignal>) {
    while let Some(signal) = signals.recv().await {
        match signal {
            HostSignal::Update { name, value } => println!("[host] {name} = {value:?}"),
            HostSignal::Resync { name, value } => {
                println!("[host] {name} forced to {value:?}");
                let Some(switch) = engine.switch(name.as_str()) else {
                    continue;
                };
                switch
                    .set(value.is_on(), |result| {
                        if let Err(e) = result {
                            tracing::warn!(switch = %name, "Echoed resync failed: {e}");
                        }
                    })
                    .await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_stderr);

    let config = match &args.config {
        Some(path) => ToggleConfig::load_from(path)?,
        None => ToggleConfig::load()?.unwrap_or_default(),
    };
    if config.switches.is_empty() {
        tracing::warn!("No switches configured");
    }

    let storage_dir = config.storage_dir();
    let store = FileStore::open(&storage_dir)
        .await
        .with_context(|| format!("opening store at {}", storage_dir.display()))?;
    tracing::info!(dir = %storage_dir.display(), records = store.len(), "Store opened");

    let engine = Engine::new(Arc::new(store), EngineOptions::from(&config));
    let (host, signals) = ChannelHost::new();
    let host = Arc::new(host);
    let host_task = tokio::spawn(run_host(engine.clone(), signals));

    for switch in config.switches {
        let name = switch.name.clone();
        if let Err(e) = engine.attach(switch, host.clone()).await {
            tracing::error!(switch = %name, "Not registering switch: {e}");
            eprintln!("skipping {name}: {e}");
        }
    }
    println!("{} switch(es) ready, type 'help' for commands", engine.registry().len());

    let result = run_console(&engine).await;

    engine.shutdown();
    host_task.abort();
    result
}
