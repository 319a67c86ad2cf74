/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置验证
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::impl_default;

/// 桥接配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 承载原生发送函数的全局对象
    pub channel_object: String,

    /// `channel_object` 上原生发送函数的名称
    pub send_method: String,

    /// 等待回复的脚本调用超时（毫秒）
    pub call_timeout_ms: Option<u64>,

    /// 宿主无法处理时拒绝脚本端的待决调用
    pub reject_unresolved: bool,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl_default!(BridgeConfig {
    channel_object: "external".to_string(),
    send_method: "notify".to_string(),
    call_timeout_ms: None,
    reject_unresolved: true,
    logging: LoggingConfig::default(),
});

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BRIDGE_CALL_TIMEOUT_MS") {
            match val.trim() {
                "" | "none" | "0" => self.call_timeout_ms = None,
                other => {
                    if let Ok(ms) = other.parse() {
                        self.call_timeout_ms = Some(ms);
                    }
                }
            }
        }
        if let Ok(val) = env::var("BRIDGE_REJECT_UNRESOLVED") {
            self.reject_unresolved = val.parse().unwrap_or(self.reject_unresolved);
        }
        if let Ok(val) = env::var("BRIDGE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !is_script_identifier(&self.channel_object) {
            return Err(ConfigError::ValidationError(format!(
                "channel_object {:?} is not a script identifier",
                self.channel_object
            )));
        }
        if !is_script_identifier(&self.send_method) {
            return Err(ConfigError::ValidationError(format!(
                "send_method {:?} is not a script identifier",
                self.send_method
            )));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "call_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. `BRIDGE_CONFIG` 指定的文件
    /// 2. ./bridge.toml
    /// 3. ./bridge.json
    /// 4. 使用默认配置
    ///
    /// 最后应用环境变量覆盖
    pub fn load_or_default() -> Self {
        let mut config = Self::load_first_found().unwrap_or_else(|| {
            tracing::info!(target: "bridge", "Using default configuration");
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn load_first_found() -> Option<Self> {
        if let Some(path) = env::var_os("BRIDGE_CONFIG") {
            let path = Path::new(&path);
            let loaded = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => Self::from_json_file(path),
                _ => Self::from_toml_file(path),
            };
            match loaded {
                Ok(config) => {
                    tracing::info!(target: "bridge", "Loaded config from {:?}", path);
                    return Some(config);
                }
                Err(e) => {
                    tracing::warn!(target: "bridge", "Ignoring config {:?}: {}", path, e);
                }
            }
        }

        if let Ok(config) = Self::from_toml_file("bridge.toml") {
            tracing::info!(target: "bridge", "Loaded config from bridge.toml");
            return Some(config);
        }

        if let Ok(config) = Self::from_json_file("bridge.json") {
            tracing::info!(target: "bridge", "Loaded config from bridge.json");
            return Some(config);
        }

        None
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（未设置 `RUST_LOG` 时使用）
    pub level: LogLevel,

    /// 是否输出彩色日志
    pub ansi: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    ansi: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 合法脚本标识符：`[A-Za-z_$][A-Za-z0-9_$]*`
pub(crate) fn is_script_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
