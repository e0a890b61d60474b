//! Build pipeline orchestration
//!
//! Each build kind is a linear sequence of steps. Every step finishes, and
//! every external tool's exit code is checked, before the next starts. The
//! first failing step aborts the build and nothing it produced is used.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fohos_core::prelude::*;
use fohos_core::{BuildInfo, ModuleKind, TargetCatalog, TargetPlatform};
use fohos_daemon::{ProcessCommand, ProcessRunner, RunOutput, SdkDiscovery};

use super::hvigor;
use super::tools::BuildTools;
use crate::project::plugins::{
    deregister_modules, register_modules, use_har_dependencies, use_har_overrides,
    use_source_dependencies,
};
use crate::project::{load_plugins, OhosModule, OhosPlugin, OhosProject, FLUTTER_MODULE_NAME};

/// Name of the engine runtime archive in the staging directory
pub const ENGINE_HAR: &str = "flutter.har";

/// Shared library name the engine loads the AOT snapshot from
pub const APP_LIBRARY: &str = "libapp.so";

/// Output of an installable-package build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapArtifacts {
    pub hap: PathBuf,
    /// Shared packages installed alongside the hap
    pub shared: Vec<PathBuf>,
}

pub struct BuildPipeline<R> {
    project: OhosProject,
    tools: BuildTools,
    sdk: SdkDiscovery,
    runner: Arc<R>,
    catalog: TargetCatalog,
}

impl<R: ProcessRunner> BuildPipeline<R> {
    pub fn new(project: OhosProject, tools: BuildTools, sdk: SdkDiscovery, runner: Arc<R>) -> Self {
        Self {
            project,
            tools,
            sdk,
            runner,
            catalog: TargetCatalog::ohos(),
        }
    }

    pub fn project(&self) -> &OhosProject {
        &self.project
    }

    // ─────────────────────────────────────────────────────────────
    // Build kinds
    // ─────────────────────────────────────────────────────────────

    /// Build the entry module into an installable `.hap`
    #[instrument(skip(self), fields(mode = %info.mode, flavor = info.flavor_or_default()))]
    pub async fn build_hap(
        &self,
        info: &BuildInfo,
        platforms: &[TargetPlatform],
    ) -> Result<HapArtifacts> {
        let entry = self.project.entry_module()?;
        let flavor = info.flavor_or_default();

        self.project.update_project_version(info)?;
        self.write_local_properties()?;

        let plugins = load_plugins(self.project.root())?;
        self.register_plugins(&plugins)?;

        self.assemble_native(info, platforms, &entry.dir).await?;

        let libraries = self.project.modules_of_kind(ModuleKind::Library)?;
        let shared = self.project.modules_of_kind(ModuleKind::Shared)?;
        self.assemble_modules(&libraries, ModuleKind::Library, info)
            .await?;
        self.assemble_modules(&shared, ModuleKind::Shared, info)
            .await?;
        self.stage_hars(&libraries, flavor)?;
        let shared_packages = shared
            .iter()
            .map(|m| resolve_signed(&m.outputs_dir(flavor), &m.name, flavor, "hsp"))
            .collect::<Result<Vec<_>>>()?;

        self.switch_plugins_to_hars(&plugins)?;
        self.ohpm_install().await?;

        self.assemble_modules(std::slice::from_ref(&entry), ModuleKind::Entry, info)
            .await?;
        self.check_signing()?;

        let hap = resolve_signed(&entry.outputs_dir(flavor), &entry.name, flavor, "hap")?;
        info!("Built {}", hap.display());
        Ok(HapArtifacts {
            hap,
            shared: shared_packages,
        })
    }

    /// Build the whole project into an `.app` bundle
    #[instrument(skip(self), fields(mode = %info.mode, flavor = info.flavor_or_default()))]
    pub async fn build_app(&self, info: &BuildInfo, platforms: &[TargetPlatform]) -> Result<PathBuf> {
        let entry = self.project.entry_module()?;
        let flavor = info.flavor_or_default();

        self.project.update_project_version(info)?;
        self.write_local_properties()?;

        let plugins = load_plugins(self.project.root())?;
        self.register_plugins(&plugins)?;

        self.assemble_native(info, platforms, &entry.dir).await?;
        self.ohpm_install().await?;
        self.run_checked(hvigor::assemble_app(
            &self.tools,
            self.project.ohos_dir(),
            flavor,
            info.mode,
        ))
        .await?;
        self.check_signing()?;

        let outputs = self.project.ohos_dir().join("build").join("outputs").join(flavor);
        let app = find_with_extension(&outputs, "app").ok_or(Error::MissingArtifact {
            path: outputs.join(format!("*-{}.app", flavor)),
        })?;
        info!("Built {}", app.display());
        Ok(app)
    }

    /// Build the Flutter module into a `.har` another application can depend on
    #[instrument(skip(self), fields(mode = %info.mode, flavor = info.flavor_or_default()))]
    pub async fn build_har(&self, info: &BuildInfo, platforms: &[TargetPlatform]) -> Result<PathBuf> {
        let module_dir = self.project.flutter_module_dir();
        if !self.project.is_module() {
            return Err(Error::NotAModule {
                path: self.project.root().to_path_buf(),
                reason: "pubspec.yaml does not declare a flutter module".to_string(),
            });
        }
        if !module_dir.is_dir() {
            return Err(Error::NotAModule {
                path: self.project.root().to_path_buf(),
                reason: format!("{} does not exist", module_dir.display()),
            });
        }
        let flavor = info.flavor_or_default();

        self.write_local_properties()?;
        let plugins = load_plugins(self.project.root())?;
        self.register_plugins(&plugins)?;

        self.assemble_native(info, platforms, &module_dir).await?;
        self.ohpm_install().await?;

        let module = OhosModule {
            name: FLUTTER_MODULE_NAME.to_string(),
            dir: module_dir,
            kind: ModuleKind::Library,
            main_element: None,
        };
        let mut packaged = vec![module.clone()];
        packaged.extend(
            self.project
                .modules()?
                .into_iter()
                .filter(|m| plugins.iter().any(|p| p.name == m.name)),
        );
        self.assemble_modules(&packaged, ModuleKind::Library, info)
            .await?;
        self.stage_hars(&packaged, flavor)?;

        let mut profile = self.project.read_build_profile()?;
        deregister_modules(&mut profile, &plugins);
        self.project.write_build_profile(&profile)?;
        let mut manifest = self.project.read_package_manifest()?;
        use_har_overrides(&mut manifest, &plugins);
        self.project.write_package_manifest(&manifest)?;

        let har = self.project.har_dir().join(format!("{}.har", module.name));
        info!("Built {}", har.display());
        Ok(har)
    }

    /// Shared packages (`.hsp`) built from a Flutter module
    pub async fn build_hsp(&self, _info: &BuildInfo, _platforms: &[TargetPlatform]) -> Result<PathBuf> {
        Err(Error::unsupported(
            "Building a shared package (hsp)",
            "not implemented yet; build a har with `fohos build har`",
        ))
    }

    /// Remove hvigor build outputs
    pub async fn clean(&self) -> Result<()> {
        self.run_checked(hvigor::clean(&self.tools, self.project.ohos_dir()))
            .await?;
        let intermediates = self.project.build_dir();
        if intermediates.exists() {
            std::fs::remove_dir_all(&intermediates)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Steps
    // ─────────────────────────────────────────────────────────────

    async fn run_checked(&self, command: ProcessCommand) -> Result<RunOutput> {
        info!("Running {}", command);
        let output = self.runner.run(&command).await?;
        if !output.success() {
            error!("{} failed:\n{}", command, output.combined().trim_end());
            return Err(Error::ProcessExit {
                command: command.command_line(),
                code: output.exit_code,
            });
        }
        Ok(output)
    }

    fn write_local_properties(&self) -> Result<()> {
        let mut properties = self.project.local_properties()?;
        if let Some(sdk) = &self.sdk.sdk {
            properties.set("sdk.dir", &sdk.sdk_path().display().to_string());
        }
        if let Some(node) = self.tools.node_home() {
            properties.set("nodejs.dir", &node.display().to_string());
        }
        properties.save(&self.project.local_properties_path())
    }

    fn register_plugins(&self, plugins: &[OhosPlugin]) -> Result<()> {
        if plugins.is_empty() {
            return Ok(());
        }
        let mut profile = self.project.read_build_profile()?;
        register_modules(&mut profile, plugins);
        self.project.write_build_profile(&profile)?;

        let mut manifest = self.project.read_package_manifest()?;
        use_source_dependencies(&mut manifest, plugins);
        self.project.write_package_manifest(&manifest)
    }

    fn switch_plugins_to_hars(&self, plugins: &[OhosPlugin]) -> Result<()> {
        if plugins.is_empty() {
            return Ok(());
        }
        let mut profile = self.project.read_build_profile()?;
        deregister_modules(&mut profile, plugins);
        self.project.write_build_profile(&profile)?;

        let mut manifest = self.project.read_package_manifest()?;
        use_har_dependencies(&mut manifest, plugins);
        self.project.write_package_manifest(&manifest)
    }

    /// Compile Dart for each platform and copy the results into `module_dir`
    async fn assemble_native(
        &self,
        info: &BuildInfo,
        platforms: &[TargetPlatform],
        module_dir: &Path,
    ) -> Result<()> {
        let Some(&first) = platforms.first() else {
            return Err(Error::build("No target platform to build for"));
        };
        let output = self
            .project
            .build_dir()
            .join("intermediates")
            .join("flutter")
            .join(info.mode.as_arg());
        std::fs::create_dir_all(&output)
            .with_context(|| format!("Creating {}", output.display()))?;

        for &platform in platforms {
            if !platform.supports_mode(info.mode) {
                return Err(Error::unsupported(
                    format!("{} build for {}", info.mode, platform),
                    "x64 devices only run debug builds",
                ));
            }
            let target = self.catalog.select(platform, info.mode)?;
            let order = self.catalog.execution_order(&target.name)?;
            debug!(
                "Assemble order for {}: {}",
                platform,
                order
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );

            self.run_checked(hvigor::flutter_assemble(
                &self.tools,
                self.project.root(),
                &output,
                platform,
                info.mode,
                &info.target_file,
                &target.name,
            ))
            .await?;

            if info.mode.is_aot() {
                let so = output.join(platform.abi()).join("app.so");
                let libs = module_dir.join("libs").join(platform.abi());
                std::fs::create_dir_all(&libs)?;
                copy_file(&so, &libs.join(APP_LIBRARY))?;
            }
        }

        let assets = output.join("flutter_assets");
        if !assets.is_dir() {
            return Err(Error::MissingArtifact { path: assets });
        }
        let rawfile = module_dir
            .join("src")
            .join("main")
            .join("resources")
            .join("rawfile")
            .join("flutter_assets");
        copy_dir(&assets, &rawfile)?;

        self.stage_engine_har(first, info)
    }

    /// Copy the engine runtime archive into the staging directory
    fn stage_engine_har(&self, platform: TargetPlatform, info: &BuildInfo) -> Result<()> {
        let flutter_root = self.tools.flutter_root().ok_or_else(|| {
            Error::tool_not_found("flutter", "cannot resolve the Flutter SDK root")
        })?;
        let engine = match info.mode {
            fohos_core::BuildMode::Debug => format!("ohos-{}", platform.arch()),
            mode => format!("ohos-{}-{}", platform.arch(), mode.as_arg()),
        };
        let har = flutter_root
            .join("bin")
            .join("cache")
            .join("artifacts")
            .join("engine")
            .join(engine)
            .join(ENGINE_HAR);

        let har_dir = self.project.har_dir();
        std::fs::create_dir_all(&har_dir)?;
        copy_file(&har, &har_dir.join(ENGINE_HAR))
    }

    /// One hvigor invocation packaging every module in `modules`
    async fn assemble_modules(
        &self,
        modules: &[OhosModule],
        kind: ModuleKind,
        info: &BuildInfo,
    ) -> Result<()> {
        if modules.is_empty() {
            return Ok(());
        }
        let Some(task) = hvigor::assemble_task(kind) else {
            return Ok(());
        };
        let flavor = info.flavor_or_default();
        let list = hvigor::module_list(modules.iter().map(|m| m.name.as_str()), flavor);
        self.run_checked(hvigor::assemble_modules(
            &self.tools,
            self.project.ohos_dir(),
            &list,
            flavor,
            info.mode,
            task,
        ))
        .await?;
        Ok(())
    }

    /// Copy each module's `.har` into the staging directory
    fn stage_hars(&self, modules: &[OhosModule], flavor: &str) -> Result<()> {
        let har_dir = self.project.har_dir();
        std::fs::create_dir_all(&har_dir)
            .with_context(|| format!("Creating {}", har_dir.display()))?;
        for module in modules {
            let file = format!("{}.har", module.name);
            copy_file(&module.outputs_dir(flavor).join(&file), &har_dir.join(&file))?;
        }
        Ok(())
    }

    async fn ohpm_install(&self) -> Result<()> {
        self.run_checked(hvigor::ohpm_install(&self.tools, self.project.ohos_dir()))
            .await?;
        Ok(())
    }

    fn check_signing(&self) -> Result<()> {
        if !self.project.read_build_profile()?.has_signing_config() {
            warn!(
                "No signing config in {}; the package cannot be installed on a device until one is added",
                self.project.build_profile_path().display()
            );
        }
        Ok(())
    }
}

/// Text telling the user how to depend on a built `.har`
pub fn har_consumption_instructions(har: &Path, plugins: &[OhosPlugin]) -> String {
    let mut text = format!(
        "Built {}\n\nCopy the har directory into your host project and add to its oh-package.json5:\n\n  \"dependencies\": {{\n    \"@ohos/flutter_module\": \"file:./har/{}.har\",\n    \"@ohos/flutter_ohos\": \"file:./har/{}\"\n  }}",
        har.display(),
        FLUTTER_MODULE_NAME,
        ENGINE_HAR
    );
    if !plugins.is_empty() {
        text.push_str(",\n  \"overrides\": {\n");
        let lines: Vec<String> = plugins
            .iter()
            .map(|p| format!("    \"{}\": \"file:./har/{}\"", p.name, p.har_file_name()))
            .collect();
        text.push_str(&lines.join(",\n"));
        text.push_str("\n  }");
    }
    text.push('\n');
    text
}

/// `<name>-<flavor>-signed.<ext>`, else the unsigned variant
fn resolve_signed(dir: &Path, name: &str, flavor: &str, ext: &str) -> Result<PathBuf> {
    let signed = dir.join(format!("{}-{}-signed.{}", name, flavor, ext));
    if signed.is_file() {
        return Ok(signed);
    }
    let unsigned = dir.join(format!("{}-{}-unsigned.{}", name, flavor, ext));
    if unsigned.is_file() {
        warn!("Using unsigned package {}", unsigned.display());
        return Ok(unsigned);
    }
    Err(Error::MissingArtifact { path: signed })
}

fn find_with_extension(dir: &Path, ext: &str) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == ext))
        .collect();
    found.sort();
    found.into_iter().next()
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(Error::MissingArtifact {
            path: from.to_path_buf(),
        });
    }
    std::fs::copy(from, to)?;
    debug!("Copied {} -> {}", from.display(), to.display());
    Ok(())
}

/// Replace `to` with a recursive copy of `from`
fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_dir_all(to)?;
    }
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
