//! Command lines for hvigor, ohpm and `flutter assemble`

use std::path::Path;

use fohos_core::{BuildMode, ModuleKind, TargetPlatform};
use fohos_daemon::ProcessCommand;

use super::tools::BuildTools;

/// hvigor task that packages modules of `kind`
pub fn assemble_task(kind: ModuleKind) -> Option<&'static str> {
    match kind {
        ModuleKind::Entry => Some("assembleHap"),
        ModuleKind::Library => Some("assembleHar"),
        ModuleKind::Shared => Some("assembleHsp"),
        ModuleKind::Unknown => None,
    }
}

/// `name@flavor` for each module, comma joined, first occurrence wins
pub fn module_list<'a>(names: impl IntoIterator<Item = &'a str>, flavor: &str) -> String {
    let mut seen = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen.iter()
        .map(|name| format!("{}@{}", name, flavor))
        .collect::<Vec<_>>()
        .join(",")
}

fn hvigor(tools: &BuildTools, ohos_dir: &Path) -> ProcessCommand {
    ProcessCommand::new(&tools.node)
        .arg(tools.hvigorw.display().to_string())
        .current_dir(ohos_dir)
}

/// Package the listed modules with one `assemble*` task
pub fn assemble_modules(
    tools: &BuildTools,
    ohos_dir: &Path,
    modules: &str,
    flavor: &str,
    mode: BuildMode,
    task: &str,
) -> ProcessCommand {
    hvigor(tools, ohos_dir).args([
        "--mode".to_string(),
        "module".to_string(),
        "-p".to_string(),
        format!("module={}", modules),
        "-p".to_string(),
        format!("product={}", flavor),
        "-p".to_string(),
        format!("buildMode={}", mode.as_arg()),
        task.to_string(),
        "--no-daemon".to_string(),
    ])
}

/// Package the whole project into an `.app` bundle
pub fn assemble_app(
    tools: &BuildTools,
    ohos_dir: &Path,
    flavor: &str,
    mode: BuildMode,
) -> ProcessCommand {
    hvigor(tools, ohos_dir).args([
        "--mode".to_string(),
        "project".to_string(),
        "-p".to_string(),
        format!("product={}", flavor),
        "-p".to_string(),
        format!("buildMode={}", mode.as_arg()),
        "assembleApp".to_string(),
        "--no-daemon".to_string(),
    ])
}

pub fn clean(tools: &BuildTools, ohos_dir: &Path) -> ProcessCommand {
    hvigor(tools, ohos_dir).args(["clean", "--no-daemon"])
}

/// Install every dependency declared in `oh-package.json5`
pub fn ohpm_install(tools: &BuildTools, dir: &Path) -> ProcessCommand {
    ProcessCommand::new(&tools.ohpm)
        .args(["install", "--all"])
        .current_dir(dir)
}

pub fn flutter_assemble(
    tools: &BuildTools,
    project_root: &Path,
    output: &Path,
    platform: TargetPlatform,
    mode: BuildMode,
    target_file: &str,
    target: &str,
) -> ProcessCommand {
    ProcessCommand::new(&tools.flutter)
        .args([
            "assemble".to_string(),
            "--no-version-check".to_string(),
            format!("--output={}", output.display()),
            format!("-dTargetPlatform={}", platform.name()),
            format!("-dBuildMode={}", mode.as_arg()),
            format!("-dTargetFile={}", target_file),
            target.to_string(),
        ])
        .current_dir(project_root)
}
