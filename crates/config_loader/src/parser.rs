//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::ContractError;

use crate::settings::PipelineSettings;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PipelineSettings, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PipelineSettings, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineSettings, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ContextKind;
    use contracts::{MotionType, StreamType, TimeSyncMode};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[devices]]
name = "sim-cam"
"#;
        let settings = parse_toml(content).unwrap();
        assert_eq!(settings.context.mode, ContextKind::Live);
        assert!(settings.context.realtime);
        assert_eq!(settings.devices.len(), 1);
        assert_eq!(settings.run.timeout_secs, 10);
        assert!(settings.restriction.is_none());
    }

    #[test]
    fn test_parse_toml_restriction_and_modules() {
        let content = r#"
[restriction]
device_name = "sim-cam"
time_sync_mode = "sync_all"

[restriction.image_streams.color]
enabled = true
width = 640
height = 480
frame_rate = 30

[[modules]]
uid = 7
async_processing = true

[[modules.configs]]
[modules.configs.image_streams.depth]
enabled = true
width = 640
height = 480

[modules.configs.motion_sensors.gyro]
enabled = true
"#;
        let settings = parse_toml(content).unwrap();
        let restriction = settings.restriction.unwrap();
        assert_eq!(restriction.time_sync_mode, TimeSyncMode::SyncAll);
        assert_eq!(restriction.stream(StreamType::Color).frame_rate, 30);

        let module = &settings.modules[0];
        assert_eq!(module.uid, 7);
        let declared = module.declared_configs();
        assert!(declared[0].async_processing);
        assert_eq!(declared[0].stream(StreamType::Depth).frame_rate, 0);
        assert!(declared[0].motion(MotionType::Gyro).enabled);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "context": { "mode": "playback", "path": "session.jsonl", "realtime": false },
            "run": { "max_sample_sets": 5 }
        }"#;
        let settings = parse_json(content).unwrap();
        assert_eq!(settings.context.mode, ContextKind::Playback);
        assert_eq!(settings.run.max_sample_sets, Some(5));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_stream_is_rejected() {
        let content = r#"
[restriction.image_streams.thermal]
enabled = true
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
