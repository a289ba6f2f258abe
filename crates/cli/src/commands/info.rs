//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::{ContextKind, PipelineSettings};
use contracts::{DeviceDescriptor, SupportedModuleConfig};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    context: ContextInfo,
    devices: Vec<DeviceInfo>,
    modules: Vec<ModuleInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restriction: Option<SupportedModuleConfig>,
    default_config: SupportedModuleConfig,
}

#[derive(Serialize)]
struct ContextInfo {
    mode: ContextKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    realtime: bool,
}

#[derive(Serialize)]
struct DeviceInfo {
    name: String,
    serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    profiles: Option<DeviceDescriptor>,
}

#[derive(Serialize)]
struct ModuleInfo {
    uid: u32,
    declared_configs: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    configs: Vec<SupportedModuleConfig>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let settings = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&settings, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&settings, args);
    }

    Ok(())
}

fn build_config_info(settings: &PipelineSettings, args: &InfoArgs) -> ConfigInfo {
    let devices = settings
        .devices
        .iter()
        .map(|device| DeviceInfo {
            name: device.name.clone(),
            serial: device.serial.clone(),
            profiles: args.devices.then(|| device.to_descriptor()),
        })
        .collect();

    let modules = settings
        .modules
        .iter()
        .map(|module| ModuleInfo {
            uid: module.uid,
            declared_configs: module.configs.len(),
            configs: if args.modules {
                module.declared_configs()
            } else {
                Vec::new()
            },
        })
        .collect();

    ConfigInfo {
        context: ContextInfo {
            mode: settings.context.mode,
            path: settings
                .context
                .path
                .as_ref()
                .map(|p| p.display().to_string()),
            realtime: settings.context.realtime,
        },
        devices,
        modules,
        restriction: settings.restriction.clone(),
        default_config: SupportedModuleConfig::hardcoded_default(),
    }
}

fn print_config_info(settings: &PipelineSettings, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 rs-pipeline Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Context");
    println!("   ├─ Mode: {:?}", settings.context.mode);
    if let Some(path) = &settings.context.path {
        println!("   ├─ File: {}", path.display());
    }
    println!("   └─ Realtime: {}", settings.context.realtime);

    println!("\n📷 Devices ({})", settings.devices.len());
    for (i, device) in settings.devices.iter().enumerate() {
        let is_last = i == settings.devices.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        let descriptor = device.to_descriptor();

        println!("   {} {} (serial '{}')", prefix, device.name, device.serial);
        if args.devices {
            for profile in &descriptor.streams {
                println!(
                    "   {}  ├─ {} {}x{}@{}",
                    child_prefix, profile.stream, profile.width, profile.height, profile.frame_rate
                );
            }
            for profile in &descriptor.motions {
                println!(
                    "   {}  ├─ {} @{}Hz",
                    child_prefix, profile.motion, profile.sample_rate
                );
            }
        } else {
            println!(
                "   {}  └─ {} stream / {} motion profiles",
                child_prefix,
                descriptor.streams.len(),
                descriptor.motions.len()
            );
        }
    }

    println!("\n🧩 Modules ({})", settings.modules.len());
    for (i, module) in settings.modules.iter().enumerate() {
        let is_last = i == settings.modules.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        println!(
            "   {} uid {} ({} declared configs)",
            prefix,
            module.uid,
            module.configs.len()
        );
        if args.modules {
            for (idx, config) in module.declared_configs().iter().enumerate() {
                println!("   {}  [{}] {}", child_prefix, idx, describe(config));
            }
        }
    }

    println!("\n⚙️  Restriction");
    match &settings.restriction {
        Some(restriction) => println!("   └─ {}", describe(restriction)),
        None => println!("   └─ none"),
    }

    println!("\n📐 Default Configuration");
    println!("   └─ {}", describe(&SupportedModuleConfig::hardcoded_default()));

    println!();
}

/// One-line description of a capability declaration
fn describe(config: &SupportedModuleConfig) -> String {
    let mut parts = Vec::new();
    if !config.device_name.is_empty() {
        parts.push(format!("device={}", config.device_name));
    }
    for stream in config.enabled_streams() {
        let entry = config.stream(stream);
        let rate = if entry.frame_rate == 0 {
            "*".to_string()
        } else {
            entry.frame_rate.to_string()
        };
        parts.push(format!("{}={}x{}@{}", stream, entry.width, entry.height, rate));
    }
    for motion in config.enabled_motions() {
        parts.push(format!("{}@{}Hz", motion, config.motion(motion).sample_rate));
    }
    parts.push(format!("sync={:?}", config.time_sync_mode));
    if config.async_processing {
        parts.push("async".to_string());
    }
    parts.join(" ")
}
