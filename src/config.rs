//! Modulant 配置管理
//!
//! 支持YAML配置文件驱动的运行时组装

use crate::{ModulantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// 运行时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// 运行时基础设置
    pub runtime: RuntimeSettings,
    /// 声明式状态注册
    #[serde(default)]
    pub states: Vec<StateConfig>,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 宿主自定义参数，原样透传给模块作者
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// 运行时基础设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// 实例名称
    pub name: String,
    /// 失败状态是否允许显式重试
    ///
    /// false 时 (模块, 状态) 的失败是终态，所有后续等待方收到同一错误；
    /// true 时失败记录在返回后被清除，显式的再次 fire 会重新执行处理器。
    #[serde(default)]
    pub retry_failed_states: bool,
}

/// 单个状态的声明式注册
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// 状态名称
    pub name: String,
    /// 前置状态名称
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace / debug / info / warn / error
    pub level: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            name: "modulant".to_string(),
            retry_failed_states: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeSettings::default(),
            states: Vec::new(),
            logging: LoggingConfig::default(),
            parameters: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// 从YAML字符串解析配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ModulantError::ConfigParsing {
            message: format!("Failed to parse config: {}", e),
        })
    }

    /// 从YAML文件加载配置
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModulantError::ConfigIO {
                message: format!("Failed to read config file {:?}: {}", path.as_ref(), e),
            }
        })?;
        Self::from_yaml_str(&content)
    }

    /// 序列化为YAML字符串
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ModulantError::ConfigParsing {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// 保存到YAML文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_yaml_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| ModulantError::ConfigIO {
            message: format!("Failed to write config file {:?}: {}", path.as_ref(), e),
        })
    }
}

/// 生成带示例状态链的默认配置文件
pub fn generate_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = RuntimeConfig {
        runtime: RuntimeSettings::default(),
        states: vec![
            StateConfig {
                name: "construct".to_string(),
                prerequisites: vec!["lib".to_string()],
            },
            StateConfig {
                name: "serve".to_string(),
                prerequisites: vec!["construct".to_string()],
            },
        ],
        logging: LoggingConfig::default(),
        parameters: HashMap::new(),
    };
    config.save_to_file(path)
}
