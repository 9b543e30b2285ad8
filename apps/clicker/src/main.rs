use std::{collections::BTreeMap, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, Clicker, ControlState, Device, TaskHandle};
use serde::Serialize;
use shared::{
    domain::{MediaAction, NavAction, PowerAction, StatusQuery},
    error::{ClickerError, ErrorKind},
    protocol::Value,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clicker", about = "Remote control for a clicker device server", version)]
struct Cli {
    /// Settings file (defaults to ./clicker.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server endpoint, e.g. http://192.168.1.20:8000/clicker
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every device on the server
    Devices,
    /// Show a device's capabilities
    Show { device: String },
    /// Press a raw button
    Press { device: String, button: String },
    /// Switch a device on or off
    Power { device: String, state: PowerAction },
    /// Select an input (without the input_ prefix)
    Input { device: String, input: String },
    /// Query status; all advertised status commands when none is given
    Status {
        device: String,
        query: Option<String>,
    },
    /// Media transport control
    Media { device: String, action: MediaAction },
    /// Navigation pad
    Nav { device: String, action: NavAction },
    /// List activities and mark the current one
    Activities,
    /// Start an activity
    Start { activity: String },
    /// Switch everything off
    PowerOff,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ClickerError>() {
        Some(err) if err.kind == ErrorKind::ConfigMissing => {
            eprintln!("{}", err.user_message());
            eprintln!(
                "Set server_url (or server_host and server_port) in clicker.toml, \
                 export CLICKER_SERVER_URL, or pass --server-url."
            );
        }
        Some(err) => {
            eprintln!("{}", err.user_message());
            eprintln!("  {}", err.message);
        }
        None => eprintln!("error: {err:#}"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(url) = cli.server_url {
        settings = settings.with_server_url(url);
    }
    debug!(server = ?settings.server_url().map(String::from), "settings loaded");

    let clicker = Clicker::from_settings(&settings).context("failed to create client")?;
    let out = Output { json: cli.json };

    match cli.command {
        Command::Devices => {
            let outcome = clicker.refresh().await;
            let registry = clicker.apply(outcome.value).await;
            if out.json {
                let devices: Vec<&Device> =
                    registry.devices().iter().map(|device| &**device).collect();
                out.print_json(&devices)?;
            } else {
                for device in registry.devices() {
                    println!("{:<20} {}", device.name(), device.description());
                }
            }
            if let Some(err) = outcome.error {
                if registry.is_empty() {
                    return Err(err.into());
                }
                eprintln!("warning: some devices could not be loaded: {}", err.message);
            }
        }
        Command::Show { device } => {
            let device = clicker.load_device(&device).await?;
            if out.json {
                out.print_json(&*device)?;
            } else {
                print_device(&device);
            }
        }
        Command::Press { device, button } => {
            let device = clicker.load_device(&device).await?;
            out.finish(clicker.press(device, button)).await?;
        }
        Command::Power { device, state } => {
            let device = clicker.load_device(&device).await?;
            out.finish(clicker.set_power(device, state == PowerAction::On)).await?;
        }
        Command::Input { device, input } => {
            let device = clicker.load_device(&device).await?;
            out.finish(clicker.select_input(device, input)).await?;
        }
        Command::Status { device, query } => {
            let device = clicker.load_device(&device).await?;
            status(&clicker, device, query, &out).await?;
        }
        Command::Media { device, action } => {
            let device = clicker.load_device(&device).await?;
            out.finish(clicker.media(device, action)?).await?;
        }
        Command::Nav { device, action } => {
            let device = clicker.load_device(&device).await?;
            out.finish(clicker.navigate(device, action)?).await?;
        }
        Command::Activities => {
            let catalog = clicker.activities().await.into_result()?;
            if out.json {
                out.print_json(&catalog)?;
            } else {
                for activity in catalog.activities() {
                    let marker = if catalog.current() == Some(&activity.id) {
                        '*'
                    } else {
                        ' '
                    };
                    println!("{marker} {:<20} {}", activity.id, activity.description);
                }
            }
        }
        Command::Start { activity } => {
            out.finish(clicker.start_activity(activity)).await?;
        }
        Command::PowerOff => {
            out.finish(clicker.power_off()).await?;
        }
    }

    clicker.shutdown();
    Ok(())
}

async fn status(
    clicker: &Clicker,
    device: Arc<Device>,
    query: Option<String>,
    out: &Output,
) -> Result<()> {
    let queries: Vec<StatusQuery> = match query {
        Some(query) => vec![StatusQuery::from(query.as_str())],
        None => device
            .status_commands()
            .iter()
            .map(|key| StatusQuery::from(key.as_str()))
            .collect(),
    };

    let handles: Vec<(StatusQuery, TaskHandle)> = queries
        .into_iter()
        .map(|query| {
            let handle = clicker.query_status(Arc::clone(&device), query.clone());
            (query, handle)
        })
        .collect();

    let mut state = ControlState::default();
    let mut values = BTreeMap::new();
    for (query, mut handle) in handles {
        let outcome = handle.wait().await;
        let command = client_core::Command::status(Arc::clone(&device), query.clone());
        state.absorb(&command, &outcome);
        values.insert(query.key().to_string(), outcome?);
    }

    if out.json {
        #[derive(Serialize)]
        struct StatusReport<'a> {
            state: &'a ControlState,
            status: &'a BTreeMap<String, Value>,
        }
        return out.print_json(&StatusReport {
            state: &state,
            status: &values,
        });
    }
    for (key, value) in &values {
        if value == &Value::Nil {
            println!("{key}: (not supported)");
        } else {
            println!("{key}: {value}");
        }
    }
    Ok(())
}

fn print_device(device: &Device) {
    let caps = device.capabilities();
    println!("{} ({})", device.name(), device.description());
    println!("  power:      {}", yes_no(caps.has_power()));
    println!("  media:      {}", yes_no(caps.is_media_player()));
    if caps.has_record() {
        println!("  record:     yes");
    }
    println!("  navigation: {}", yes_no(caps.has_navigation()));
    if caps.has_inputs() {
        println!("  inputs:     {}", caps.inputs().join(", "));
    }
    if !caps.buttons().is_empty() {
        println!("  buttons:    {}", caps.buttons().join(", "));
    }
    if !device.status_commands().is_empty() {
        let commands: Vec<&str> = device.status_commands().iter().map(String::as_str).collect();
        println!("  status:     {}", commands.join(", "));
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Waits for a task and its chain; the first failure becomes the command's error.
    async fn finish(&self, handle: TaskHandle) -> Result<()> {
        let outcomes = handle.wait_chain().await;
        let mut values = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            values.push(outcome?);
        }
        if self.json {
            return self.print_json(&values);
        }
        for value in values.iter().filter(|value| **value != Value::Nil) {
            println!("{value}");
        }
        println!("ok");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
