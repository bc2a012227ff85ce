//! Command-line entry point.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use comfy_launcher::backend::catalog::{CUSTOM_NODES_CATEGORY, Catalog, Selection};
use comfy_launcher::backend::fetcher::{FetchOrchestrator, ProgressSink};
use comfy_launcher::backend::installer::{Installer, model_dirs_exist};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "comfy-launcher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Workspace directory.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Load the download library from a JSON file instead of the built-in one.
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Civitai API token for authenticated downloads.
    #[arg(long, global = true, env = "CIVITAI_TOKEN")]
    token: Option<String>,

    /// Enable one catalog entry (repeatable).
    #[arg(long, global = true, value_name = "CATEGORY:INDEX", value_parser = parse_selection)]
    select: Vec<(String, usize)>,

    /// Enable every catalog entry.
    #[arg(long, global = true)]
    all: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Set up ComfyUI, fetch everything selected and launch the server.
    Install,
    /// Fetch the selected models without touching the environment.
    Download,
    /// Print the catalog with selection marks.
    Show,
}

fn parse_selection(value: &str) -> Result<(String, usize), String> {
    let Some((category, index)) = value.rsplit_once(':') else {
        return Err(format!("expected <category:index>, got {value}"));
    };
    let index = index
        .parse()
        .map_err(|err| format!("bad index in {value}: {err}"))?;
    Ok((category.to_string(), index))
}

/// Renders progress updates as log lines.
struct LogSink;

impl ProgressSink for LogSink {
    fn update(&self, percent: u8) {
        info!("Progress: {percent}%");
    }

    fn update_with_message(&self, percent: u8, message: &str) {
        if message.is_empty() {
            self.update(percent);
        } else {
            info!("Progress: {percent}% - {message}");
        }
    }
}

fn show_catalog(catalog: &Catalog, selection: &Selection) {
    for category in &catalog.categories {
        println!("{} ({})", category.label, category.id);
        for (index, entry) in category.entries.iter().enumerate() {
            let mark = if entry.required {
                "required"
            } else if selection.is_enabled(&category.id, index) {
                "selected"
            } else {
                " "
            };
            println!("  [{index}] {:<50} {mark}", entry.name);
        }
    }
    println!("Custom Nodes ({CUSTOM_NODES_CATEGORY})");
    for (index, node) in catalog.custom_nodes.iter().enumerate() {
        let mark = if node.required {
            "required"
        } else if selection.is_enabled(CUSTOM_NODES_CATEGORY, index) {
            "selected"
        } else {
            " "
        };
        println!("  [{index}] {:<50} {mark}", node.name);
    }
}

fn build_selection(cli: &Cli, catalog: &Catalog) -> Result<Selection> {
    let mut selection = if cli.all {
        Selection::all_of(catalog)
    } else {
        Selection::default()
    };
    for (category, index) in &cli.select {
        if category != CUSTOM_NODES_CATEGORY && catalog.category(category).is_none() {
            bail!("unknown category: {category}");
        }
        selection.enable(category, *index);
    }
    Ok(selection)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    let selection = build_selection(&cli, &catalog)?;

    let installer = Installer::new(cli.dir.clone(), FetchOrchestrator::new()?);

    match cli.command {
        Command::Install => {
            let report = installer
                .install(&catalog, &selection, cli.token.as_deref(), &LogSink)
                .await?;
            info!(
                "Install finished: {} downloads, {} clones, {} failures",
                report.download_results.len(),
                report.clone_results.len(),
                report.failures()
            );
        }
        Command::Download => {
            if !model_dirs_exist(&installer.app_dir()) {
                info!("Model directories not found yet; files will be placed under the app directory anyway");
            }
            let report = installer
                .download_only(&catalog, &selection, cli.token.as_deref(), &LogSink)
                .await?;
            info!(
                "Downloads finished: {} results, {} failures",
                report.download_results.len(),
                report.failures()
            );
        }
        Command::Show => show_catalog(&catalog, &selection),
    }
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
    fn cli_parses_repeated_selections() {
        let cli = Cli::try_parse_from([
            "comfy-launcher",
            "download",
            "--dir",
            "/tmp/workspace",
            "--select",
            "checkpoints:2",
            "--select",
            "custom_nodes:0",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Download));
        assert_eq!(cli.dir, PathBuf::from("/tmp/workspace"));
        assert_eq!(
            cli.select,
            vec![
                ("checkpoints".to_string(), 2),
                ("custom_nodes".to_string(), 0)
            ]
        );
        assert!(!cli.all);
    }

    #[test]
    fn cli_rejects_malformed_selection() {
        assert!(Cli::try_parse_from(["comfy-launcher", "show", "--select", "nocolon"]).is_err());
        assert!(
            Cli::try_parse_from(["comfy-launcher", "show", "--select", "checkpoints:x"]).is_err()
        );
    }

    #[test]
    fn unknown_select_category_is_rejected() {
        let cli = Cli::try_parse_from([
            "comfy-launcher",
            "show",
            "--select",
            "does-not-exist:0",
        ])
        .unwrap();
        let catalog = Catalog::builtin();
        assert!(build_selection(&cli, &catalog).is_err());
    }

    #[test]
    fn custom_nodes_category_is_always_selectable() {
        let cli =
            Cli::try_parse_from(["comfy-launcher", "show", "--select", "custom_nodes:1"]).unwrap();
        let catalog = Catalog::builtin();
        let selection = build_selection(&cli, &catalog).unwrap();
        assert!(selection.is_enabled(CUSTOM_NODES_CATEGORY, 1));
    }
}
