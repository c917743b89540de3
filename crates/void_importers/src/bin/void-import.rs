//! Asset import tool
//!
//! Imports every outdated source under the configured resource directory.
//!
//! Run with: cargo run -p void_importers --bin void-import -- [config.toml] [--watch]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use void_asset::{AssetConstructors, AssetManager, AssetManagerConfig, AssetResult};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path: Option<PathBuf> = None;
    let mut watch = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--watch" | "-w" => watch = true,
            "--help" | "-h" => {
                println!("usage: void-import [config.toml] [--watch]");
                return ExitCode::SUCCESS;
            }
            _ if arg.starts_with('-') => {
                log::error!("Unknown flag: {}", arg);
                return ExitCode::FAILURE;
            }
            _ => config_path = Some(PathBuf::from(arg)),
        }
    }

    match run(config_path, watch) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every import succeeded
fn run(config_path: Option<PathBuf>, watch: bool) -> AssetResult<bool> {
    let mut config = AssetManagerConfig::load(config_path.as_deref())?;
    config.hot_reload |= watch;

    let importers = void_importers::default_importers()?;
    let mut manager = AssetManager::new(config, AssetConstructors::with_builtin(), Arc::new(importers))?;

    let metas = manager.load_all_metas()?;
    log::info!("{} resources known from meta files", metas);

    let report = manager.refresh()?;
    log::info!(
        "{} files scanned, {} imported, {} renamed, {} failed",
        report.scan.files,
        report.imported.len(),
        report.scan.renamed,
        report.failed.len()
    );
    for (path, error) in &report.failed {
        log::error!("{}: {}", path.display(), error);
    }

    if !manager.config().hot_reload {
        return Ok(report.is_clean());
    }

    manager.setup_file_watcher()?;
    log::info!("Watching for changes, Ctrl+C to stop");
    loop {
        std::thread::sleep(Duration::from_millis(manager.config().watch_debounce_ms.max(50)));
        match manager.process_file_changes() {
            Ok(Some(report)) => {
                for (path, id) in &report.imported {
                    log::info!("Reimported {} -> {}", path.display(), id);
                }
                for (path, error) in &report.failed {
                    log::error!("{}: {}", path.display(), error);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Refresh failed: {}", e),
        }
    }
}
