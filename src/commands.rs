//! Command implementations behind the `fohos` binary
//!
//! Each command takes the per-invocation [`BuildContext`], a process runner
//! and the writer user-facing output goes to. With `machine` set, output is
//! NDJSON [`MachineEvent`]s instead of text.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::machine::MachineEvent;
use fohos_app::{
    har_consumption_instructions, load_plugins, BuildContext, PipelineHapBuilder, PrebuiltHap,
};
use fohos_core::prelude::*;
use fohos_core::{BuildInfo, BuildMode, TargetPlatform};
use fohos_daemon::{LaunchResult, LogReader, OhosDevice, ProcessRunner};

/// What `fohos build` produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Hap,
    App,
    Har,
    Hsp,
}

impl BuildKind {
    pub fn name(&self) -> &'static str {
        match self {
            BuildKind::Hap => "hap",
            BuildKind::App => "app",
            BuildKind::Har => "har",
            BuildKind::Hsp => "hsp",
        }
    }
}

/// Options for [`run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub device: Option<String>,
    pub mode: BuildMode,
    pub flavor: Option<String>,
    pub debugging: bool,
    pub host_vm_port: Option<u16>,
    pub device_vm_port: Option<u16>,
    /// Install this `.hap` instead of building
    pub application_binary: Option<PathBuf>,
    /// Stream device logs after launch until cancelled
    pub follow_logs: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// devices
// ─────────────────────────────────────────────────────────────────────────────

pub async fn devices<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    runner: Arc<R>,
    machine: bool,
    out: &mut W,
) -> Result<()> {
    ctx.sdk.require_hdc()?;
    let registry = ctx.registry(runner.clone());
    let timeout = Duration::from_secs(ctx.settings.device.discovery_timeout_secs);
    let result = registry.discover_with_timeout(timeout).await?;

    if machine {
        for id in &result.device_ids {
            MachineEvent::device_detected(id, is_emulator(id)).write_to(out)?;
        }
        return Ok(());
    }

    for message in &result.diagnostics {
        writeln!(out, "hdc: {}", message)?;
    }
    if result.device_ids.is_empty() {
        writeln!(out, "No OpenHarmony devices attached")?;
    }
    for id in &result.device_ids {
        if is_emulator(id) {
            writeln!(out, "{} (emulator)", id)?;
        } else {
            writeln!(out, "{}", id)?;
        }
    }
    Ok(())
}

fn is_emulator(id: &str) -> bool {
    id.starts_with("127.0.0.1:")
}

// ─────────────────────────────────────────────────────────────────────────────
// build / clean
// ─────────────────────────────────────────────────────────────────────────────

pub async fn build<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    runner: Arc<R>,
    kind: BuildKind,
    info: BuildInfo,
    platforms: &[TargetPlatform],
    machine: bool,
    out: &mut W,
) -> Result<PathBuf> {
    let pipeline = ctx.pipeline(runner)?;
    let artifact = match kind {
        BuildKind::Hap => pipeline.build_hap(&info, platforms).await?.hap,
        BuildKind::App => pipeline.build_app(&info, platforms).await?,
        BuildKind::Har => pipeline.build_har(&info, platforms).await?,
        BuildKind::Hsp => pipeline.build_hsp(&info, platforms).await?,
    };

    if machine {
        MachineEvent::build_completed(kind.name(), &artifact).write_to(out)?;
    } else if kind == BuildKind::Har {
        let plugins = load_plugins(pipeline.project().root())?;
        write!(out, "{}", har_consumption_instructions(&artifact, &plugins))?;
    } else {
        writeln!(out, "Built {}", artifact.display())?;
    }
    Ok(artifact)
}

pub async fn clean<R: ProcessRunner>(ctx: &BuildContext, runner: Arc<R>) -> Result<()> {
    ctx.pipeline(runner)?.clean().await
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

/// Build, install and start the app on one device.
///
/// With `follow_logs` the device logs are streamed until `cancel` fires, then
/// log readers and port forwards are released. Without it the VM service
/// forward is left in place for a debugger to attach to.
pub async fn run<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    runner: Arc<R>,
    options: RunOptions,
    cancel: watch::Receiver<bool>,
    machine: bool,
    out: &mut W,
) -> Result<LaunchResult> {
    let device = ctx
        .select_device(runner.clone(), options.device.as_deref())
        .await?;
    let flavor = options
        .flavor
        .clone()
        .unwrap_or_else(|| ctx.settings.build.flavor.clone());

    let mut request = ctx.launch_request(options.mode, options.debugging);
    request.host_vm_port = options.host_vm_port;
    request.device_vm_port = options.device_vm_port;
    request.cancel = Some(cancel.clone());

    let result = match &options.application_binary {
        Some(hap) => {
            let package = ctx
                .project()?
                .installable_package(&flavor, hap.clone(), Vec::new())?
                .ok_or_else(|| Error::MissingArtifact { path: hap.clone() })?;
            device
                .start_app(Some(&package), &PrebuiltHap(package.clone()), request)
                .await?
        }
        None => {
            let pipeline = ctx.pipeline(runner.clone())?;
            let info = ctx.build_info(Some(options.mode), Some(flavor.clone()));
            let builder = PipelineHapBuilder::new(&pipeline, info);
            device.start_app(None, &builder, request).await?
        }
    };

    report_launch(ctx, &device, &flavor, &result, machine, out)?;

    if result.is_started() && options.follow_logs {
        follow(device.log_reader().await?, cancel, machine, out).await?;
        device.dispose().await;
    }
    Ok(result)
}

fn report_launch<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    device: &OhosDevice<R>,
    flavor: &str,
    result: &LaunchResult,
    machine: bool,
    out: &mut W,
) -> Result<()> {
    match result {
        LaunchResult::Succeeded { service_uri } => {
            let bundle = ctx.project()?.bundle_name(flavor)?;
            if machine {
                MachineEvent::app_started(
                    device.id(),
                    &bundle,
                    service_uri.as_ref().map(|u| u.to_string()),
                )
                .write_to(out)?;
            } else {
                writeln!(out, "Started {} on {}", bundle, device.id())?;
                if let Some(uri) = service_uri {
                    writeln!(out, "Dart VM service available at {}", uri)?;
                }
            }
        }
        LaunchResult::Failed { reason } => {
            if machine {
                MachineEvent::app_failed(device.id(), reason.clone()).write_to(out)?;
            } else {
                writeln!(out, "Launch failed: {}", reason)?;
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// logs / screenshot
// ─────────────────────────────────────────────────────────────────────────────

/// Stream device logs until the reader closes or `cancel` fires
pub async fn logs<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    runner: Arc<R>,
    device: Option<&str>,
    past: bool,
    cancel: watch::Receiver<bool>,
    machine: bool,
    out: &mut W,
) -> Result<()> {
    let device = ctx.select_device(runner, device).await?;
    let reader = if past {
        device.past_log_reader(&ctx.settings.logs.past_tag).await?
    } else {
        device.log_reader().await?
    };
    let result = follow(reader, cancel, machine, out).await;
    device.dispose().await;
    result
}

async fn follow<W: Write>(
    reader: &LogReader,
    mut cancel: watch::Receiver<bool>,
    machine: bool,
    out: &mut W,
) -> Result<()> {
    let Some(mut lines) = reader.subscribe() else {
        debug!("Log reader {} already closed", reader.name());
        return Ok(());
    };

    while !*cancel.borrow() {
        tokio::select! {
            line = lines.next_line() => match line {
                Some(line) if machine => MachineEvent::log(line).write_to(out)?,
                Some(line) => writeln!(out, "{}", line)?,
                None => break,
            },
            changed = cancel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

pub async fn screenshot<R: ProcessRunner, W: Write>(
    ctx: &BuildContext,
    runner: Arc<R>,
    device: Option<&str>,
    output: &Path,
    out: &mut W,
) -> Result<()> {
    let device = ctx.select_device(runner, device).await?;
    device.screenshot(output).await?;
    writeln!(out, "Screenshot saved to {}", output.display())?;
    Ok(())
}
