//! CLI entry point for rig-comm
//!
//! Drives the rig's serial link from a terminal:
//! - List serial ports
//! - Monitor telemetry, optionally sending a command along the way
//! - Send one-off commands
//! - Inspect and check the credential store
//!
//! # Usage
//!
//! ```bash
//! rig-comm ports
//! rig-comm monitor --port /dev/ttyACM0 --duration 30
//! rig-comm monitor --send BARRIER_OPEN --send-after 5 --json
//! rig-comm send --port COM3 LED_1_ON BARRIER_CLOSE
//! echo secret | rig-comm login --user admin
//! ```

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use rig_comm::config::{RigConfig, DEFAULT_CONFIG_PATH};
use rig_comm::credentials::CredentialStore;
use rig_comm::link::PortOpener;
use rig_comm::{logging, ports, DeviceController};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rig-comm")]
#[command(about = "Serial link to the parking-lot rig controller", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports visible to the host
    Ports,

    /// Print telemetry as it arrives
    ///
    /// Without --duration the monitor runs until interrupted. Ctrl+C ends the
    /// process without a clean disconnect; the OS releases the port on exit.
    Monitor {
        /// Port to open; defaults to the configured port, then the first one found
        #[arg(long)]
        port: Option<String>,

        /// Baud rate; defaults to the configured rate
        #[arg(long)]
        baud: Option<u32>,

        /// Stop after this many seconds and disconnect cleanly
        #[arg(long)]
        duration: Option<u64>,

        /// Command to send once while monitoring
        #[arg(long)]
        send: Option<String>,

        /// Seconds to wait before sending (default 0)
        #[arg(long, requires = "send")]
        send_after: Option<u64>,

        /// Print one JSON object per line instead of text
        #[arg(long)]
        json: bool,
    },

    /// Send commands and exit
    Send {
        /// Port to open
        #[arg(long)]
        port: String,

        /// Baud rate; defaults to the configured rate
        #[arg(long)]
        baud: Option<u32>,

        /// Commands, sent in order
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// List users in the credential store
    Users,

    /// Check a password (read from stdin) against the credential store
    Login {
        /// Username to check
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RigConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;
    logging::init_from_config(&config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Ports => list_ports(),
        Commands::Monitor {
            port,
            baud,
            duration,
            send,
            send_after,
            json,
        } => {
            let options = MonitorOptions {
                duration: duration.map(Duration::from_secs),
                send: send.map(|command| (command, Duration::from_secs(send_after.unwrap_or(0)))),
                json,
            };
            monitor(&config, port, baud, options)
        }
        Commands::Send {
            port,
            baud,
            commands,
        } => send(&config, &port, baud, &commands),
        Commands::Users => list_users(&config),
        Commands::Login { user } => login(&config, &user),
    }
}

fn list_ports() -> Result<()> {
    let details = ports::list_port_details();
    if details.is_empty() {
        println!("No serial ports found");
    }
    for port in details {
        println!("{}", port);
    }
    Ok(())
}

struct MonitorOptions {
    duration: Option<Duration>,
    send: Option<(String, Duration)>,
    json: bool,
}

fn monitor(
    config: &RigConfig,
    port: Option<String>,
    baud: Option<u32>,
    options: MonitorOptions,
) -> Result<()> {
    let port = match port.or_else(|| config.serial.port.clone()) {
        Some(port) => port,
        None => ports::list_ports()
            .into_iter()
            .next()
            .context("No serial port given and none found")?,
    };
    let baud = baud.unwrap_or(config.serial.baud_rate);

    let mut controller = DeviceController::with_settings(config.serial.link_settings());
    controller
        .connect(&port, baud)
        .with_context(|| format!("Failed to connect to {}", port))?;

    let started = Instant::now();
    let mut pending = options.send;

    loop {
        if options.duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        if let Some((command, after)) = &pending {
            if started.elapsed() >= *after {
                controller
                    .write(command)
                    .with_context(|| format!("Failed to send {:?}", command))?;
                info!("Sent {:?}", command);
                pending = None;
            }
        }

        match controller.poll_once() {
            Ok(true) => print_reading(&controller, options.json),
            Ok(false) => {}
            Err(err) if err.is_link_lost() => {
                warn!("Connection lost: {}", err);
                bail!("Connection to {} lost: {}", port, err);
            }
            Err(err) => return Err(err.into()),
        }

        thread::sleep(config.serial.poll_interval());
    }

    controller.disconnect();
    Ok(())
}

fn print_reading<O: PortOpener>(controller: &DeviceController<O>, as_json: bool) {
    let timestamp = Local::now();
    if as_json {
        let line = json!({
            "timestamp": timestamp.to_rfc3339(),
            "raw": controller.last_raw_line(),
            "values": controller.values(),
        });
        println!("{}", line);
    } else {
        let mut readings: Vec<String> = controller
            .telemetry()
            .iter()
            .map(|(label, value)| format!("{}={}", label, value))
            .collect();
        readings.sort_unstable();
        println!(
            "[{}] {} | {}",
            timestamp.format("%H:%M:%S%.3f"),
            controller.last_raw_line(),
            readings.join(" ")
        );
    }
}

fn send(config: &RigConfig, port: &str, baud: Option<u32>, commands: &[String]) -> Result<()> {
    let baud = baud.unwrap_or(config.serial.baud_rate);
    let mut controller = DeviceController::with_settings(config.serial.link_settings());
    controller
        .connect(port, baud)
        .with_context(|| format!("Failed to connect to {}", port))?;

    for command in commands {
        controller
            .write(command)
            .with_context(|| format!("Failed to send {:?}", command))?;
        println!("Sent {}", command);
    }
    Ok(())
}

fn list_users(config: &RigConfig) -> Result<()> {
    let store = CredentialStore::new(&config.credentials.path);
    let users = store
        .usernames()
        .with_context(|| format!("Failed to read {}", store.path().display()))?;
    for user in users {
        println!("{}", user);
    }
    Ok(())
}

fn login(config: &RigConfig, user: &str) -> Result<()> {
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let store = CredentialStore::new(&config.credentials.path);
    let accepted = store
        .authenticate(user, password)
        .with_context(|| format!("Failed to read {}", store.path().display()))?;
    if !accepted {
        bail!("Login failed for {}", user);
    }
    println!("Login accepted for {}", user);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_help_explains_interrupt() {
        let cli = Cli::command();
        let monitor = cli.find_subcommand("monitor").unwrap();
        let help = monitor.get_long_about().unwrap().to_string();
        assert!(help.contains("runs until interrupted"));
        assert!(help.contains("the OS releases the port"));
    }

    #[test]
    fn monitor_arguments_parse() {
        let cli = Cli::try_parse_from([
            "rig-comm",
            "monitor",
            "--duration",
            "5",
            "--send",
            "BARRIER_OPEN",
            "--send-after",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Monitor {
                duration,
                send,
                send_after,
                ..
            } => {
                assert_eq!(duration, Some(5));
                assert_eq!(send.as_deref(), Some("BARRIER_OPEN"));
                assert_eq!(send_after, Some(2));
            }
            _ => panic!("expected monitor"),
        }
        assert!(Cli::try_parse_from(["rig-comm", "monitor", "--send-after", "2"]).is_err());
    }
}
