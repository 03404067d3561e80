//! xbdm command-line entry point.
//!
//! ```text
//! xbdm cp <source> <host:X:\path\file>   Upload a file
//! xbdm reboot [--cold] <host>           Warm (default) or cold reboot
//! xbdm screenshot [-f out.png] <host>   Save the screen as PNG
//! xbdm --gen-config                     Write default config to stdout
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use xbdm_cli::config::{ConfigSource, XbdmConfig};
use xbdm_cli::exit_status;
use xbdm_core::{RebootKind, SendFile, XbdmError};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "xbdm", version, about = "Xbox debug monitor client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "xbdm.toml", global = true)]
    config: PathBuf,

    /// Log every protocol line.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Control port (overrides config).
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Copy a local file to the console.
    Cp {
        /// Local file.
        source: PathBuf,
        /// Destination as host:X:\full\path\file (a trailing \ keeps the local name).
        destination: String,
    },
    /// Reboot the console.
    Reboot {
        /// Reload the BIOS instead of a warm reboot.
        #[arg(long)]
        cold: bool,
        host: String,
    },
    /// Save a screenshot as PNG and print its file name.
    Screenshot {
        /// Output file name (default: timestamped name).
        #[arg(short = 'f', long)]
        output: Option<PathBuf>,
        host: String,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        return match toml::to_string_pretty(&XbdmConfig::default()) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        return ExitCode::from(2);
    };

    // Load config.
    let (mut config, source) = XbdmConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let level = if cli.verbose { "info" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match source {
        ConfigSource::File(path) => debug!("loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("no config at {}; using defaults", cli.config.display()),
        ConfigSource::Invalid(reason) => warn!("{reason}; using defaults"),
    }

    let options = config.session_options(cli.verbose);
    let result = match command {
        Cmd::Cp {
            source,
            destination,
        } => copy(source, &destination, cli.verbose, &options).await,
        Cmd::Reboot { cold, host } => {
            xbdm_core::reboot(&host, RebootKind::from_cold(cold), &options).await
        }
        Cmd::Screenshot { output, host } => {
            let request = config.screenshot_request(output);
            xbdm_core::screenshot(&host, request, &options)
                .await
                .map(|path| println!("{}", path.display()))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(exit_status(e.kind()))
        }
    }
}

async fn copy(
    source: PathBuf,
    destination: &str,
    verbose: bool,
    options: &xbdm_core::SessionOptions,
) -> Result<(), XbdmError> {
    let flow = SendFile::prepare(&source, destination).await?;

    if !verbose {
        print!(
            "Copying \"{}\" ({} bytes) to {}... ",
            source.display(),
            flow.source().len(),
            flow.destination()
        );
        std::io::stdout().flush().ok();
    }

    let host = flow.destination().host.clone();
    let result = xbdm_core::run_on_host(&host, options, flow).await;

    if !verbose {
        match &result {
            Ok(_) => println!("Success"),
            Err(_) => println!("Failed"),
        }
    }
    result.map(|_| ())
}
