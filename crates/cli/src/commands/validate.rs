//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::{ContextKind, PipelineSettings};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    context: ContextKind,
    device_count: usize,
    module_count: usize,
    declared_config_count: usize,
    has_restriction: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    context: settings.context.mode,
                    device_count: settings.devices.len(),
                    module_count: settings.modules.len(),
                    declared_config_count: settings.modules.iter().map(|m| m.configs.len()).sum(),
                    has_restriction: settings.restriction.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(settings: &PipelineSettings) -> Vec<String> {
    let mut warnings = Vec::new();

    if settings.context.mode != ContextKind::Playback && settings.devices.is_empty() {
        warnings.push("No devices configured - negotiation cannot succeed".to_string());
    }

    if settings.modules.is_empty() && settings.restriction.is_none() {
        warnings.push(
            "No modules and no restriction - the default configuration will be used".to_string(),
        );
    }

    for device in &settings.devices {
        if device.fail_open || device.fail_start {
            warnings.push(format!("Device '{}' has failure injection enabled", device.name));
        }
    }

    for module in &settings.modules {
        if module.reject_configs {
            warnings.push(format!(
                "Module {} rejects every config - negotiation will fail",
                module.uid
            ));
        }
    }

    if settings.run.max_sample_sets.is_none() {
        warnings.push(format!(
            "run.max_sample_sets is not set - runs until the {}s timeout",
            settings.run.timeout_secs
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Context: {:?}", summary.context);
            println!("  Devices: {}", summary.device_count);
            println!(
                "  Modules: {} ({} declared configs)",
                summary.module_count, summary.declared_config_count
            );
            println!("  Restriction: {}", if summary.has_restriction { "yes" } else { "no" });
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
