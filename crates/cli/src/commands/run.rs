//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use config_loader::PipelineSettings;
use contracts::ContextMode;

use crate::cli::RunArgs;
use crate::session::{Session, SessionConfig, SessionStats};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let settings = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let mode = resolve_mode(args, &settings)?;
    info!(
        mode = mode.as_str(),
        devices = settings.devices.len(),
        modules = settings.modules.len(),
        restriction = settings.restriction.is_some(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&settings, &mode);
        return Ok(());
    }

    let config = SessionConfig {
        max_sample_sets: if args.max_sample_sets == 0 {
            settings.run.max_sample_sets
        } else {
            Some(args.max_sample_sets)
        },
        timeout: Duration::from_secs(if args.timeout == 0 {
            settings.run.timeout_secs
        } else {
            args.timeout
        }),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        mode,
        settings,
    };

    info!("Starting pipeline...");
    let stats: SessionStats = Session::new(config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        sample_sets = stats.sample_sets_received,
        dispatched = stats.sample_sets_dispatched,
        module_errors = stats.module_errors,
        "Pipeline completed"
    );
    stats.print_summary();

    Ok(())
}

/// Context mode from CLI overrides, falling back to the settings
fn resolve_mode(args: &RunArgs, settings: &PipelineSettings) -> Result<ContextMode> {
    if let Some(path) = &args.record {
        return Ok(ContextMode::Record(path.clone()));
    }
    if let Some(path) = &args.playback {
        return Ok(ContextMode::Playback(path.clone()));
    }
    settings
        .context
        .context_mode()
        .context("context.path is required for file-backed modes")
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves; the run still ends on
/// its limit or timeout.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(settings: &PipelineSettings, mode: &ContextMode) {
    println!("\n=== Configuration Summary ===\n");
    println!("Context: {}", mode.as_str());
    if let ContextMode::Playback(path) | ContextMode::Record(path) = mode {
        println!("  File: {}", path.display());
    }

    println!("\nDevices ({}):", settings.devices.len());
    for device in &settings.devices {
        let profiles = device.to_descriptor();
        println!(
            "  - {} ({} stream profiles, {} motion profiles)",
            device.name,
            profiles.streams.len(),
            profiles.motions.len()
        );
    }

    println!("\nModules ({}):", settings.modules.len());
    for module in &settings.modules {
        println!(
            "  - uid {} - {} declared configs{}",
            module.uid,
            module.configs.len(),
            if module.async_processing == Some(true) { " (async)" } else { "" }
        );
    }

    match &settings.restriction {
        Some(restriction) => {
            println!("\nRestriction:");
            if !restriction.device_name.is_empty() {
                println!("  Device: {}", restriction.device_name);
            }
            for stream in restriction.enabled_streams() {
                let entry = restriction.stream(stream);
                println!(
                    "  {}: {}x{}@{}",
                    stream, entry.width, entry.height, entry.frame_rate
                );
            }
            println!("  Time sync: {:?}", restriction.time_sync_mode);
        }
        None => println!("\nRestriction: none"),
    }

    println!();
}
