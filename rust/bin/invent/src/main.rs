//! `invent`: the field technician's CLI.
//!
//! Resolves scanned serials, binds devices to installations and manages the
//! customers on their ports against an `inventd` server.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use install::model::CustomerFields;
use install::{BindMode, InstallError, ScanContext};

use commands::Output;

/// Field installation CLI.
#[derive(Parser, Debug)]
#[command(name = "invent", about = "Field installation CLI")]
struct Cli {
    /// Path to client config file (default: ~/.invent/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Server URL, overriding the current context.
    #[arg(long = "server", global = true)]
    server: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage server contexts.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Look up a serial number and its installation.
    Resolve { serial: String },

    /// Bind a serial to an installation (a new one unless --site is given).
    Bind {
        serial: String,
        /// Join an existing installation code.
        #[arg(long)]
        site: Option<String>,
        /// Link and stamp in one server transaction.
        #[arg(long)]
        atomic: bool,
    },

    /// Show devices, customers and free ports of an installation.
    Ports { code: String },

    /// Provision a customer on a port (the lowest free port unless --port is given).
    Assign {
        code: String,
        #[arg(long)]
        port: Option<u32>,
        #[arg(long = "customer-id")]
        customer_id: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        service: String,
        #[arg(long = "power-signal")]
        power_signal: Option<String>,
        #[arg(long = "modem-sn")]
        modem_sn: Option<String>,
    },

    /// Set the port capacity of a device (e.g. 8 or 16).
    Capacity { serial: String, ports: u32 },

    /// Remove an installation link, freeing its device.
    Detach {
        link_id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Remove a customer, freeing its port.
    Dismantle {
        customer_id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Read scans from stdin, one per line.
    Scan {
        /// Installation code the scanned devices join.
        #[arg(long)]
        site: Option<String>,
        /// Serial whose dashboard to return to.
        #[arg(long)]
        serial: Option<String>,
        /// Lines are NFC tag ids in hex.
        #[arg(long)]
        nfc: bool,
        /// Bind every found device.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
        #[arg(long)]
        atomic: bool,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ContextAction {
    /// Create or update a context.
    Set {
        name: String,
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Switch the current context.
    Use { name: String },
    /// List all contexts.
    List,
    /// Delete a context.
    Delete { name: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        match err.downcast_ref::<InstallError>() {
            Some(install_err) => {
                eprintln!("{}", install_err.user_message());
                tracing::debug!("{}", install_err);
            }
            None => eprintln!("error: {:#}", err),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);
    let output = Output::parse(&cli.output)?;
    let server = cli.server.as_deref();

    match cli.command {
        Commands::Context { action } => match action {
            ContextAction::Set { name, server, token } => {
                commands::context::set(&name, server.as_deref(), token.as_deref(), &config_path)?;
            }
            ContextAction::Use { name } => commands::context::use_context(&name, &config_path)?,
            ContextAction::List => commands::context::list(&config_path)?,
            ContextAction::Delete { name } => commands::context::delete(&name, &config_path)?,
        },

        Commands::Resolve { serial } => {
            let remote = commands::connect(&config_path, server)?;
            commands::field::resolve(remote, &serial, output).await?;
        }

        Commands::Bind { serial, site, atomic } => {
            let remote = commands::connect(&config_path, server)?;
            commands::field::bind(remote, &serial, site.as_deref(), bind_mode(atomic), output)
                .await?;
        }

        Commands::Ports { code } => {
            let remote = commands::connect(&config_path, server)?;
            commands::field::ports(remote, &code, output).await?;
        }

        Commands::Assign {
            code,
            port,
            customer_id,
            address,
            service,
            power_signal,
            modem_sn,
        } => {
            let remote = commands::connect(&config_path, server)?;
            let fields = CustomerFields {
                customer_code: customer_id,
                address,
                service,
                power_signal,
                modem_serial: modem_sn,
            };
            commands::field::assign(remote, &code, port, fields, output).await?;
        }

        Commands::Capacity { serial, ports } => {
            let remote = commands::connect(&config_path, server)?;
            commands::field::capacity(remote, &serial, ports).await?;
        }

        Commands::Detach { link_id, yes } => {
            if !yes && !confirm()? {
                println!("Cancelled.");
                return Ok(());
            }
            let remote = commands::connect(&config_path, server)?;
            commands::field::detach(remote, &link_id).await?;
        }

        Commands::Dismantle { customer_id, yes } => {
            if !yes && !confirm()? {
                println!("Cancelled.");
                return Ok(());
            }
            let remote = commands::connect(&config_path, server)?;
            commands::field::dismantle(remote, &customer_id).await?;
        }

        Commands::Scan {
            site,
            serial,
            nfc,
            yes,
            atomic,
        } => {
            let remote = commands::connect(&config_path, server)?;
            let opts = commands::scan::ScanOptions {
                context: ScanContext {
                    installation_code: site,
                    serial_number: serial,
                },
                nfc,
                confirm: yes,
                mode: bind_mode(atomic),
            };
            commands::scan::run(remote, opts).await?;
        }

        Commands::Version => {
            println!("invent cli v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn bind_mode(atomic: bool) -> BindMode {
    if atomic {
        BindMode::Atomic
    } else {
        BindMode::Saga
    }
}

/// Deletes cannot be undone.
fn confirm() -> anyhow::Result<bool> {
    eprint!("Are you sure? [y/N]: ");
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().eq_ignore_ascii_case("y"))
}
