//! 配置校验模块
//!
//! 字段级规则由 `validator` derive 完成，跨字段规则手写：
//! - device name 唯一
//! - module uid 唯一
//! - playback / record 模式必须提供 path
//! - 启用的图像流分辨率不能为 0
//! - restriction 的 device_name 必须存在于 devices 中 (live / record)

use std::collections::HashSet;

use contracts::{ContractError, StreamType, SupportedModuleConfig};
use validator::Validate;

use crate::settings::{ContextKind, PipelineSettings};

/// 校验 PipelineSettings 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(settings: &PipelineSettings) -> Result<(), ContractError> {
    settings
        .validate()
        .map_err(|e| ContractError::config_validation("settings", e.to_string()))?;

    validate_context(settings)?;
    validate_device_names(settings)?;
    validate_module_uids(settings)?;
    validate_stream_resolutions(settings)?;
    validate_restriction_device(settings)?;
    Ok(())
}

/// 文件模式必须有 path
fn validate_context(settings: &PipelineSettings) -> Result<(), ContractError> {
    let context = &settings.context;
    if context.mode != ContextKind::Live && context.path.is_none() {
        return Err(ContractError::config_validation(
            "context.path",
            format!("path is required for {:?} mode", context.mode).to_lowercase(),
        ));
    }
    Ok(())
}

/// 校验 device name 唯一性
fn validate_device_names(settings: &PipelineSettings) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for device in &settings.devices {
        if !seen.insert(device.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("devices[name={}]", device.name),
                "duplicate device name",
            ));
        }
    }
    Ok(())
}

/// 校验 module uid 唯一性
fn validate_module_uids(settings: &PipelineSettings) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for module in &settings.modules {
        if !seen.insert(module.uid) {
            return Err(ContractError::config_validation(
                format!("modules[uid={}]", module.uid),
                "duplicate module uid",
            ));
        }
    }
    Ok(())
}

/// 启用的流分辨率 > 0
fn validate_stream_resolutions(settings: &PipelineSettings) -> Result<(), ContractError> {
    if let Some(restriction) = &settings.restriction {
        check_resolutions("restriction", restriction)?;
    }
    for module in &settings.modules {
        for (idx, config) in module.configs.iter().enumerate() {
            check_resolutions(&format!("modules[uid={}].configs[{idx}]", module.uid), config)?;
        }
    }
    for device in &settings.devices {
        for profile in &device.streams {
            if profile.width == 0 || profile.height == 0 {
                return Err(ContractError::config_validation(
                    format!("devices[{}].streams.{}", device.name, profile.stream),
                    "resolution must be non-zero",
                ));
            }
        }
    }
    Ok(())
}

fn check_resolutions(field: &str, config: &SupportedModuleConfig) -> Result<(), ContractError> {
    for stream in StreamType::ALL {
        let entry = config.stream(stream);
        if entry.enabled && (entry.width == 0 || entry.height == 0) {
            return Err(ContractError::config_validation(
                format!("{field}.image_streams.{stream}"),
                format!(
                    "resolution must be non-zero, got {}x{}",
                    entry.width, entry.height
                ),
            ));
        }
    }
    Ok(())
}

/// restriction 指定的设备必须已声明
///
/// playback 的设备来自录制文件，此处不校验。
fn validate_restriction_device(settings: &PipelineSettings) -> Result<(), ContractError> {
    if settings.context.mode == ContextKind::Playback {
        return Ok(());
    }
    let Some(restriction) = &settings.restriction else {
        return Ok(());
    };
    if restriction.device_name.is_empty() {
        return Ok(());
    }
    if !settings
        .devices
        .iter()
        .any(|d| d.name == restriction.device_name)
    {
        return Err(ContractError::config_validation(
            "restriction.device_name",
            format!(
                "device '{}' not found in devices",
                restriction.device_name
            ),
        ));
    }
    Ok(())
}
