use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use ssui_shell_lib::components::{Port, TypedSlot};
use ssui_shell_lib::config::ShellConfig;
use ssui_shell_lib::schema;
use ssui_shell_lib::transport::CallbackMap;
use ssui_shell_lib::ShellCore;

#[derive(Parser)]
#[command(name = "ssui-shell", version, about = "SSUI shell runtime core")]
struct Cli {
    /// Config file (defaults to <config dir>/ssui/shell.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the backend host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override the backend port
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a type schema and print the tree as JSON
    Parse { text: String },
    /// Show which built-in components a slot would offer
    Resolve {
        text: String,
        #[arg(long, default_value = "input")]
        direction: Port,
    },
    /// GET a backend path
    Get { path: String },
    /// PUT a JSON body to a backend path
    Put { path: String, body: String },
    /// DELETE a backend path
    Delete { path: String },
    /// POST to a backend path; streamed when callbacks are named
    Post {
        path: String,
        #[arg(long)]
        body: Option<String>,
        /// Callback to listen for (repeatable)
        #[arg(long = "callback")]
        callbacks: Vec<String>,
    },
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("invalid JSON body: {}", text))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Command-line entry point for the SSUI shell core
///
/// Thin driver over the library crate: parse schemas, inspect component
/// resolution and call the backend, including streamed calls.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = ShellConfig::load_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.backend.host = host;
    }
    if let Some(port) = cli.port {
        config.backend.port = port;
    }

    let core = ShellCore::new(config)?;

    match cli.command {
        Command::Parse { text } => {
            let node = schema::parse(&text)?;
            print_json(&serde_json::to_value(&node)?)?;
        }
        Command::Resolve { text, direction } => {
            let slot = TypedSlot::new(&core.registry, &text, direction)?;
            match slot.placeholder_text() {
                Some(text) => println!("{}", text),
                None => {
                    println!("{:?} for {} ({})", slot.layout(), slot.declared_type(), direction);
                    for (i, name) in slot.candidate_names().iter().enumerate() {
                        let marker = if Some(i) == slot.active_index() { "*" } else { " " };
                        println!(" {} {}", marker, name);
                    }
                }
            }
        }
        Command::Get { path } => print_json(&core.transport.get(&path).await?)?,
        Command::Put { path, body } => {
            print_json(&core.transport.put(&path, &parse_json(&body)?).await?)?
        }
        Command::Delete { path } => print_json(&core.transport.delete(&path).await?)?,
        Command::Post { path, body, callbacks } => {
            let body = body.as_deref().map(parse_json).transpose()?;
            let callbacks = if callbacks.is_empty() {
                None
            } else {
                let mut map = CallbackMap::new();
                for name in callbacks {
                    let tag = name.clone();
                    map.insert(name, move |value| println!("[{}] {}", tag, value));
                }
                Some(map)
            };
            let result = core.transport.post(&path, body.as_ref(), callbacks).await?;
            print_json(&result)?;
        }
    }

    Ok(())
}
