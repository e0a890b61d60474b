//! fohos - Build, install and run Flutter apps on OpenHarmony devices
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::eyre;
use tokio::sync::watch;

use flutter_ohos::commands;
use flutter_ohos::{BuildKind, MachineEvent, RunOptions};
use fohos_app::BuildContext;
use fohos_core::{BuildMode, TargetPlatform};
use fohos_daemon::TokioProcessRunner;

/// fohos - Flutter on OpenHarmony
#[derive(Parser, Debug)]
#[command(name = "fohos")]
#[command(about = "Build, install and run Flutter apps on OpenHarmony devices", long_about = None)]
struct Cli {
    /// Path to the Flutter project (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    project: Option<PathBuf>,

    /// Print NDJSON events instead of text
    #[arg(long, global = true)]
    machine: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached devices
    Devices,

    /// Build a package
    #[command(subcommand)]
    Build(BuildCommand),

    /// Build, install and start the app
    Run(RunArgs),

    /// Stream device logs
    Logs {
        #[arg(short, long)]
        device: Option<String>,

        /// Show already-buffered Flutter logs instead of new output
        #[arg(long)]
        past: bool,
    },

    /// Capture the device screen
    Screenshot {
        #[arg(short, long)]
        device: Option<String>,

        #[arg(short, long, default_value = "screenshot.jpeg")]
        output: PathBuf,
    },

    /// Remove build outputs
    Clean,
}

#[derive(Subcommand, Debug)]
enum BuildCommand {
    /// Installable package (.hap)
    Hap(BuildArgs),
    /// Application bundle (.app)
    App(BuildArgs),
    /// Library package (.har) from a Flutter module
    Har(BuildArgs),
    /// Shared package (.hsp)
    Hsp(BuildArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[arg(long, value_parser = parse_mode)]
    mode: Option<BuildMode>,

    #[arg(long)]
    flavor: Option<String>,

    /// Dart entry point
    #[arg(short, long)]
    target: Option<String>,

    #[arg(long)]
    build_number: Option<String>,

    #[arg(long)]
    build_name: Option<String>,

    #[arg(long, value_parser = parse_platform, value_delimiter = ',', default_value = "ohos-arm64")]
    target_platform: Vec<TargetPlatform>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(short, long)]
    device: Option<String>,

    #[arg(long, value_parser = parse_mode, default_value = "debug")]
    mode: BuildMode,

    #[arg(long)]
    flavor: Option<String>,

    /// Do not wait for the Dart VM service
    #[arg(long)]
    no_debug: bool,

    /// Host port for the VM service forward
    #[arg(long)]
    host_vmservice_port: Option<u16>,

    /// Device port of the VM service, when it cannot be read from the log
    #[arg(long)]
    device_vmservice_port: Option<u16>,

    /// Install this .hap instead of building
    #[arg(long, value_name = "HAP")]
    use_application_binary: Option<PathBuf>,

    /// Exit after launch instead of streaming logs
    #[arg(long)]
    detach: bool,
}

fn parse_mode(value: &str) -> Result<BuildMode, String> {
    BuildMode::from_name(value).ok_or_else(|| format!("unknown build mode '{}'", value))
}

fn parse_platform(value: &str) -> Result<TargetPlatform, String> {
    TargetPlatform::from_name(value).ok_or_else(|| format!("unknown target platform '{}'", value))
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let invocation = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let log_file = match fohos_core::logging::init(&invocation) {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Warning: file logging unavailable: {}", e);
            None
        }
    };

    let project = cli
        .project
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let ctx = BuildContext::discover(&project);
    let runner = Arc::new(TokioProcessRunner);
    let machine = cli.machine;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let mut stdout = std::io::stdout();
    let result = match cli.command {
        Command::Devices => commands::devices(&ctx, runner, machine, &mut stdout).await,
        Command::Build(build) => {
            let (kind, args) = match build {
                BuildCommand::Hap(args) => (BuildKind::Hap, args),
                BuildCommand::App(args) => (BuildKind::App, args),
                BuildCommand::Har(args) => (BuildKind::Har, args),
                BuildCommand::Hsp(args) => (BuildKind::Hsp, args),
            };
            let mut info = ctx.build_info(args.mode, args.flavor);
            info.build_number = args.build_number;
            info.build_name = args.build_name;
            if let Some(target) = args.target {
                info.target_file = target;
            }
            commands::build(
                &ctx,
                runner,
                kind,
                info,
                &args.target_platform,
                machine,
                &mut stdout,
            )
            .await
            .map(|_| ())
        }
        Command::Run(args) => {
            let options = RunOptions {
                device: args.device,
                mode: args.mode,
                flavor: args.flavor,
                debugging: !args.no_debug,
                host_vm_port: args.host_vmservice_port,
                device_vm_port: args.device_vmservice_port,
                application_binary: args.use_application_binary,
                follow_logs: !args.detach,
            };
            match commands::run(&ctx, runner, options, cancel_rx, machine, &mut stdout).await {
                Ok(launch) if !launch.is_started() => {
                    if machine {
                        std::process::exit(1);
                    }
                    return Err(eyre!("Failed to launch the app"));
                }
                other => other.map(|_| ()),
            }
        }
        Command::Logs { device, past } => {
            commands::logs(
                &ctx,
                runner,
                device.as_deref(),
                past,
                cancel_rx,
                machine,
                &mut stdout,
            )
            .await
        }
        Command::Screenshot { device, output } => {
            commands::screenshot(&ctx, runner, device.as_deref(), &output, &mut stdout).await
        }
        Command::Clean => commands::clean(&ctx, runner).await,
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        if machine {
            let _ = MachineEvent::error(e.to_string(), e.is_fatal()).write_to(&mut stdout);
            std::process::exit(1);
        }
        if let Some(path) = log_file {
            eprintln!("Details in {}", path.display());
        }
        return Err(e.into());
    }
    Ok(())
}
