//! Installation sequences around the fetch orchestrator.
//!
//! The full install clones ComfyUI, prepares its virtual environment, fetches
//! the selected models and custom nodes in parallel, installs the remaining
//! Python dependencies and launches the server. A single failed setup command
//! is logged and the sequence continues, matching the fetcher's contract that
//! partial failure never aborts the whole run.

use anyhow::Result;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use crate::backend::catalog::{self, Catalog, Selection};
use crate::backend::fetcher::{
    CloneTask, CommandSet, DownloadTask, FetchOrchestrator, ProgressSink, TaskResult,
};
use crate::backend::utils::{ensure_directory, run_command, stderr_text};

/// Repository of the application itself.
pub const APP_REPO_URL: &str = "https://github.com/comfyanonymous/ComfyUI.git";
/// Port the launched server listens on.
pub const SERVER_PORT: u16 = 8188;

const SETUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Index used for the CUDA build of torch.
const TORCH_INDEX_URL: &str = "https://download.pytorch.org/whl/cu121";

/// Aggregated outcome of an install or downloads-only run.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub download_results: Vec<TaskResult<DownloadTask>>,
    pub clone_results: Vec<TaskResult<CloneTask>>,
}

impl InstallReport {
    pub fn failures(&self) -> usize {
        self.download_results.iter().filter(|r| !r.success).count()
            + self.clone_results.iter().filter(|r| !r.success).count()
    }
}

/// Drives the provisioning sequence for one workspace directory.
pub struct Installer {
    orchestrator: FetchOrchestrator,
    workspace: PathBuf,
}

impl Installer {
    pub fn new(workspace: PathBuf, orchestrator: FetchOrchestrator) -> Self {
        Self {
            orchestrator,
            workspace,
        }
    }

    pub fn app_dir(&self) -> PathBuf {
        self.workspace.join("ComfyUI")
    }

    /// Full install: clone the app, set up the venv, fetch everything,
    /// install remaining dependencies and start the server.
    pub async fn install(
        &self,
        catalog: &Catalog,
        selection: &Selection,
        token: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<InstallReport> {
        let app_dir = self.app_dir();
        let commands = self.commands();

        progress.update_with_message(5, "Installing ComfyUI...");
        self.setup_step(&commands.git, &["clone", APP_REPO_URL], &self.workspace)
            .await;

        progress.update(15);
        self.setup_step(&commands.python, &["-m", "venv", "venv"], &app_dir)
            .await;
        progress.update(25);
        self.setup_step(&commands.pip, &["install", "--upgrade", "pip"], &app_dir)
            .await;
        progress.update(35);

        ensure_directory(app_dir.join("custom_nodes")).await?;
        ensure_directory(app_dir.join("models/checkpoints")).await?;

        let download_tasks = catalog::build_download_tasks(catalog, selection, &app_dir, token);
        let clone_tasks = catalog::build_clone_tasks(catalog, selection, &app_dir);

        progress.update(50);
        let band = BandSink {
            inner: progress,
            lo: 50,
            hi: 80,
        };
        let (download_results, clone_results) = self
            .orchestrator
            .run(download_tasks, clone_tasks, Some(&band))
            .await;

        progress.update(80);
        self.setup_step(
            &commands.pip,
            &[
                "install",
                "torch",
                "torchvision",
                "torchaudio",
                "--index-url",
                TORCH_INDEX_URL,
            ],
            &app_dir,
        )
        .await;
        self.setup_step(
            &commands.pip,
            &["install", "-r", "requirements.txt"],
            &app_dir,
        )
        .await;

        progress.update(95);
        self.launch_server()?;

        progress.update_with_message(100, "is up and running!");
        Ok(InstallReport {
            download_results,
            clone_results,
        })
    }

    /// Downloads-only flow: no cloning, no venv work, no server launch.
    pub async fn download_only(
        &self,
        catalog: &Catalog,
        selection: &Selection,
        token: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<InstallReport> {
        let app_dir = self.app_dir();
        let download_tasks = catalog::build_download_tasks(catalog, selection, &app_dir, token);

        let (download_results, clone_results) = self
            .orchestrator
            .run(download_tasks, Vec::new(), Some(progress))
            .await;

        Ok(InstallReport {
            download_results,
            clone_results,
        })
    }

    fn commands(&self) -> &CommandSet {
        self.orchestrator.commands()
    }

    /// Starts the server detached; dropping the child leaves it running.
    pub fn launch_server(&self) -> Result<()> {
        // The venv's python sits beside its pip.
        let python = Path::new(&self.commands().pip).with_file_name("python");
        let mut command = tokio::process::Command::new(python);
        command
            .args(["main.py", "--listen", "--port", &SERVER_PORT.to_string()])
            .current_dir(self.app_dir())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match command.spawn() {
            Ok(_child) => {
                info!("Server launched on port {SERVER_PORT}");
                Ok(())
            }
            Err(err) => {
                error!("Failed to launch server: {err}");
                Ok(())
            }
        }
    }

    /// Runs one setup command, logging failure without aborting the sequence.
    async fn setup_step(&self, program: &str, args: &[&str], cwd: &Path) {
        match run_command(program, args, Some(cwd), SETUP_TIMEOUT).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => error!(
                "{program} {} failed: {}",
                args.join(" "),
                stderr_text(&output)
            ),
            Err(err) => error!("{program} {} failed: {err}", args.join(" ")),
        }
    }
}

/// Standard model directories whose presence means an install already exists.
pub fn model_dirs_exist(app_dir: &Path) -> bool {
    const REQUIRED: &[&str] = &[
        "Stable-diffusion",
        "Lora",
        "CLIP",
        "CLIP-vision",
        "VAE",
        "ControlNet",
        "ESRGAN",
        "Extra",
    ];
    let base = app_dir.join("models");
    REQUIRED.iter().all(|dir| base.join(dir).is_dir())
}

/// Maps orchestrator percentages into a sub-range of the install sequence.
struct BandSink<'a> {
    inner: &'a dyn ProgressSink,
    lo: u8,
    hi: u8,
}

impl BandSink<'_> {
    fn map(&self, percent: u8) -> u8 {
        let span = u32::from(self.hi - self.lo);
        self.lo + (u32::from(percent.min(100)) * span / 100) as u8
    }
}

impl ProgressSink for BandSink<'_> {
    fn update(&self, percent: u8) {
        self.inner.update(self.map(percent));
    }

    fn update_with_message(&self, percent: u8, message: &str) {
        self.inner.update_with_message(self.map(percent), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::catalog::{CatalogEntry, Category, RepoEntry};

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn install_sequence_runs_setup_through_command_set() {
        let tools = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let pip_log = tools.path().join("pip.log");
        let commands = CommandSet {
            fetcher: write_script(tools.path(), "wget", "touch \"$2\""),
            git: write_script(tools.path(), "git", "mkdir -p \"$(basename \"$2\" .git)\""),
            python: write_script(tools.path(), "python", "exit 0"),
            pip: write_script(
                tools.path(),
                "pip",
                &format!("printf '%s\\n' \"$*\" >> \"{}\"; exit 0", pip_log.display()),
            ),
        };

        let catalog = Catalog {
            categories: vec![Category {
                id: "checkpoints".into(),
                label: "Model Checkpoints".into(),
                entries: vec![CatalogEntry {
                    name: "base.safetensors".into(),
                    url: Some("https://example.com/files/base.safetensors".into()),
                    download_url: None,
                    filename: None,
                    dest_dir: None,
                    required: true,
                    info: None,
                }],
            }],
            custom_nodes: vec![RepoEntry {
                name: "node".into(),
                url: "https://github.com/example/node.git".into(),
                required: true,
                info: None,
            }],
        };

        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let orchestrator = FetchOrchestrator::with_commands(commands).unwrap();
        let installer = Installer::new(workspace.path().to_path_buf(), orchestrator);

        let report = installer
            .install(&catalog, &Selection::default(), None, &sink)
            .await
            .unwrap();

        assert_eq!(report.failures(), 0);
        assert_eq!(report.download_results.len(), 1);
        assert_eq!(report.clone_results.len(), 1);

        let app_dir = installer.app_dir();
        assert!(app_dir.is_dir());
        assert!(app_dir.join("models/checkpoints/base.safetensors").exists());
        assert!(app_dir.join("custom_nodes/node").is_dir());

        let log = std::fs::read_to_string(&pip_log).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "install --upgrade pip",
                "install torch torchvision torchaudio --index-url \
                 https://download.pytorch.org/whl/cu121",
                "install -r requirements.txt",
            ]
        );

        // Setup milestones, the fetch mapped into the 50-80 band, then the
        // closing steps.
        assert_eq!(
            *seen.lock().unwrap(),
            vec![5, 15, 25, 35, 50, 65, 80, 80, 95, 100]
        );
    }

    #[test]
    fn model_dirs_require_full_set() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("ComfyUI");
        assert!(!model_dirs_exist(&app_dir));

        for name in ["Stable-diffusion", "Lora", "CLIP", "CLIP-vision", "VAE"] {
            std::fs::create_dir_all(app_dir.join("models").join(name)).unwrap();
        }
        assert!(!model_dirs_exist(&app_dir));

        for name in ["ControlNet", "ESRGAN", "Extra"] {
            std::fs::create_dir_all(app_dir.join("models").join(name)).unwrap();
        }
        assert!(model_dirs_exist(&app_dir));
    }

    #[test]
    fn band_sink_maps_endpoints() {
        let seen = std::sync::Mutex::new(Vec::new());
        let inner = |p: u8| seen.lock().unwrap().push(p);
        let band = BandSink {
            inner: &inner,
            lo: 50,
            hi: 80,
        };
        band.update(0);
        band.update(50);
        band.update(100);
        assert_eq!(*seen.lock().unwrap(), vec![50, 65, 80]);
    }
}
