#![deny(unsafe_code)]

//! Toolshed CLI: inspect the tool menu, search, and try clipboard detection
//! from a terminal.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use toolshed_config::{AppConfig, FileSettings};
use toolshed_core::affinity::AffinityThread;
use toolshed_core::build_info;
use toolshed_core::collab::{
    CollaboratorError, NavigationEvent, NavigationSink, QueryActivation, StaticClipboard, TracingNotifications,
    TracingTelemetry,
};
use toolshed_core::engine::{Collaborators, ToolEngine};
use toolshed_core::logging::{FaultLog, FaultReader};
use toolshed_core::menu::{Menu, MenuItem};
use toolshed_core::reconciler::PassOutcome;
use toolshed_core::registry::ProviderRegistry;
use toolshed_core::{MatchedProvider, SearchItem};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Toolshed: pick the right developer tool for a query or clipboard content.
#[derive(Parser)]
#[command(name = "toolshed", version = build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "toolshed.toml")]
    config: PathBuf,

    /// Path to the settings file.
    #[arg(long, default_value = "toolshed-settings.toml")]
    settings: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tool menu.
    Tools,

    /// Rank tools against a query.
    Search {
        /// The search query.
        query: String,
    },

    /// Recommend tools for a piece of text (read from stdin if omitted).
    Detect {
        /// Text to evaluate.
        text: Option<String>,
    },

    /// Simulate application startup, optionally through a deep link.
    Open {
        /// Activation query, e.g. `tool=base64`.
        link: Option<String>,

        /// Clipboard text to evaluate after startup.
        #[arg(long)]
        clipboard: Option<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Print version and build information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let faults = FaultLog::new(64);
    let fault_reader = faults.reader();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(faults)
        .init();
    if !found {
        debug!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Tools => cmd_tools(&cli, &config).await?,
        Commands::Search { ref query } => cmd_search(&cli, &config, query).await?,
        Commands::Detect { ref text } => cmd_detect(&cli, &config, text.clone(), &fault_reader).await?,
        Commands::Open {
            ref link,
            ref clipboard,
        } => cmd_open(&cli, &config, link.as_deref(), clipboard.as_deref()).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Version => println!("toolshed {}", build_info::version_string()),
    }

    Ok(())
}

/// Navigation sink that prints each selection.
struct PrintNavigation;

impl NavigationSink for PrintNavigation {
    fn navigate(&self, event: NavigationEvent) -> Result<(), CollaboratorError> {
        println!("open {} ({})", event.handle.display_name, event.handle.protocol);
        if let Some(payload) = event.payload {
            println!("  paste: {payload}");
        }
        Ok(())
    }
}

struct Session {
    engine: ToolEngine,
    settings: Arc<FileSettings>,
}

async fn start_engine(cli: &Cli, config: &AppConfig, clipboard: Option<&str>) -> Result<Session> {
    let registry = ProviderRegistry::from_tools(&config.catalogue()).context("invalid tool catalogue")?;
    let settings = Arc::new(
        FileSettings::open(&cli.settings, config)
            .await
            .with_context(|| format!("failed to open settings at '{}'", cli.settings.display()))?,
    );
    let engine = ToolEngine::from_registry(
        &registry,
        Collaborators {
            clipboard: Arc::new(StaticClipboard::new(clipboard)),
            settings: settings.clone(),
            navigation: Arc::new(PrintNavigation),
            notifications: Arc::new(TracingNotifications),
            telemetry: Arc::new(TracingTelemetry),
            dispatcher: Arc::new(AffinityThread::spawn()),
        },
    );
    Ok(Session { engine, settings })
}

async fn cmd_tools(cli: &Cli, config: &AppConfig) -> Result<()> {
    let session = start_engine(cli, config, None).await?;
    let menu = session.engine.menu().await?;
    print!("{}", render_menu(&menu));
    Ok(())
}

async fn cmd_search(cli: &Cli, config: &AppConfig, query: &str) -> Result<()> {
    let session = start_engine(cli, config, None).await?;
    let results = session.engine.search(query);
    if results.is_cleared() {
        println!("Empty query.");
    }
    for item in results.items() {
        match item {
            SearchItem::Tool(tool) => println!("{:<24} {}", tool.name(), tool.descriptor().display_name),
            SearchItem::NoResultFound => println!("No results for \"{}\".", results.query()),
        }
    }
    Ok(())
}

async fn cmd_detect(cli: &Cli, config: &AppConfig, text: Option<String>, faults: &FaultReader) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let session = start_engine(cli, config, Some(&text)).await?;
    // Deep-link style startup would select a tool; only report recommendations
    session.engine.selection_context().disable_auto_select();

    match session.engine.on_clipboard_changed().await {
        PassOutcome::Changed { recommended, .. } if !recommended.is_empty() => {
            for tool in recommended {
                println!("{:<24} {}", tool.name(), tool.descriptor().display_name);
            }
        }
        PassOutcome::Skipped(reason) => println!("Detection skipped: {reason:?}"),
        _ => println!("No tool recognises this content."),
    }

    for fault in faults.entries() {
        if let Some(tool) = &fault.tool {
            eprintln!("warning: {tool}: {}", fault.error.as_deref().unwrap_or(&fault.message));
        }
    }
    Ok(())
}

async fn cmd_open(cli: &Cli, config: &AppConfig, link: Option<&str>, clipboard: Option<&str>) -> Result<()> {
    let session = start_engine(cli, config, clipboard).await?;
    session.engine.on_activated(&QueryActivation::new(link)).await?;

    if clipboard.is_some() {
        session.engine.on_clipboard_changed().await;
    }
    if let Some(tool) = session.engine.current_selection() {
        println!("selected {}", tool.descriptor().display_name);
        debug!(tool = %tool.name(), "Final selection");
    }

    session.engine.wait_for_startup_tasks().await;
    session
        .settings
        .flush()
        .await
        .with_context(|| format!("failed to write settings to '{}'", session.settings.path().display()))?;
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("TOML error")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load the config file, or defaults if it does not exist. The flag reports
/// whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load '{}'", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

fn render_menu(menu: &Menu) -> String {
    let mut out = String::new();
    for item in menu.top() {
        match item {
            MenuItem::Tool(tool) => render_tool(tool, 0, &mut out),
            MenuItem::Separator => out.push_str("----\n"),
        }
    }
    if !menu.footer().is_empty() {
        out.push_str("----\n");
        for tool in menu.footer() {
            render_tool(tool, 0, &mut out);
        }
    }
    out
}

fn render_tool(tool: &MatchedProvider, depth: usize, out: &mut String) {
    let marker = if tool.is_recommended() { " *" } else { "" };
    out.push_str(&format!(
        "{:indent$}{} [{}]{marker}\n",
        "",
        tool.descriptor().display_name,
        tool.descriptor().protocol,
        indent = depth * 2
    ));
    for child in tool.children() {
        render_tool(child, depth + 1, out);
    }
}
