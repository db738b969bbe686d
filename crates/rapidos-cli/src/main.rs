mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rapidos",
    version,
    about = "Cut minimal initramfs images and boot them as QEMU VMs"
)]
struct Cli {
    /// rapidos.conf config file path [default: rapidos.conf next to the binary].
    #[arg(long, global = true)]
    conf: Option<PathBuf>,

    /// <KEY>=<val> overlay for rapidos.conf. Can be given multiple times.
    #[arg(short = 'C', value_name = "KEY=VAL", value_parser = parse_overlay, global = true)]
    overlay: Vec<(String, String)>,

    /// Enable debug logging, including the parsed configuration.
    #[arg(short = 'v', long, visible_alias = "verbose", default_value_t = false, global = true)]
    debug: bool,

    /// Enable trace-level logging (more detailed than --debug).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List available manifests.
    List {
        /// Output as structured JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cut an image from a manifest.
    Cut {
        /// Manifest name, see `rapidos list`.
        name: String,
        /// Initramfs image path [default: imgs/rapidos-img.cpio next to the binary].
        #[arg(long)]
        img: Option<PathBuf>,
        /// Boot the image once it has been cut.
        #[arg(long, default_value_t = false)]
        boot: bool,
        /// Directory for QEMU PID files [default: imgs/ next to the binary].
        #[arg(long)]
        pid_dir: Option<PathBuf>,
        /// Archive toolkit: u-root or mock [default: $RAPIDOS_TOOLKIT or u-root].
        #[arg(long)]
        toolkit: Option<String>,
    },
    /// Boot an existing image in the next free VM slot.
    Boot {
        /// Initramfs image path [default: imgs/rapidos-img.cpio next to the binary].
        #[arg(long)]
        img: Option<PathBuf>,
        /// Directory for QEMU PID files [default: imgs/ next to the binary].
        #[arg(long)]
        pid_dir: Option<PathBuf>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn parse_overlay(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_owned(), val.to_owned())),
        _ => Err(format!("'{s}' is not in <KEY>=<val> format")),
    }
}

/// Directory holding the running binary; default paths hang off it.
fn rapidos_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RAPIDOS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let rdir = rapidos_dir();
    let conf_path = cli.conf.unwrap_or_else(|| rdir.join("rapidos.conf"));
    let default_img = || rdir.join("imgs").join("rapidos-img.cpio");
    let default_pid_dir = || rdir.join("imgs");
    let overlay: BTreeMap<String, String> = cli.overlay.into_iter().collect();
    let conf_args = commands::ConfArgs {
        path: &conf_path,
        overlay: &overlay,
        debug: cli.debug || cli.trace,
    };

    let result = match cli.command {
        Commands::List { json } => commands::list::run(json),
        Commands::Cut {
            name,
            img,
            boot,
            pid_dir,
            toolkit,
        } => commands::cut::run(
            &conf_args,
            &name,
            &img.unwrap_or_else(default_img),
            boot.then(|| pid_dir.unwrap_or_else(default_pid_dir)).as_deref(),
            toolkit.as_deref(),
        ),
        Commands::Boot { img, pid_dir } => commands::boot::run(
            &conf_args,
            &img.unwrap_or_else(default_img),
            &pid_dir.unwrap_or_else(default_pid_dir),
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:") {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
