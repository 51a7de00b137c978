//! Modulant 错误处理系统
//!
//! 统一的错误类型和稳定的错误码

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 框架统一错误类型
///
/// 所有变体只携带字符串化的上下文，因此错误可以被克隆，
/// 并在共享的去重 future 之间分发给每一个等待方。
#[derive(Error, Debug, Clone)]
pub enum ModulantError {
    #[error("Module '{name}' not found")]
    ModuleNotFound { name: String },

    #[error("Module '{name}' is already registered")]
    ModuleAlreadyRegistered { name: String },

    #[error("Dependency resolution failed for module '{name}': {source}")]
    DependencyResolution {
        name: String,
        #[source]
        source: Box<ModulantError>,
    },

    #[error("Abilities not found: {}", .abilities.join(", "))]
    AbilityNotFound { abilities: Vec<String> },

    #[error("Circular dependency detected: {}", .path.join(" => "))]
    CircularDependency { path: Vec<String> },

    #[error("State '{state}' is unknown")]
    StateUnknown { state: String },

    #[error("State '{state}' failed for module '{module}': {message}")]
    StateHandler {
        state: String,
        module: String,
        message: String,
    },

    #[error("Module validation failed: {message}")]
    ModuleValidation { message: String },

    #[error("Event bus error: {message}")]
    EventBus { message: String },

    #[error("Config IO error: {message}")]
    ConfigIO { message: String },

    #[error("Config parsing error: {message}")]
    ConfigParsing { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// 附着在拒绝结果和 loaderror 事件上的稳定错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    DependencyResolution,
    CircularDependency,
    HandlerFailure,
    Other,
}

impl ModulantError {
    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 创建模块校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ModuleValidation {
            message: message.into(),
        }
    }

    /// 映射到稳定错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ModuleNotFound { .. } => ErrorCode::NotFound,
            Self::DependencyResolution { .. } | Self::AbilityNotFound { .. } => {
                ErrorCode::DependencyResolution
            }
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::StateHandler { .. } => ErrorCode::HandlerFailure,
            _ => ErrorCode::Other,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ModulantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModulantError::ModuleNotFound {
            name: "module1".to_string(),
        };
        assert_eq!(error.to_string(), "Module 'module1' not found");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_circular_path_display() {
        let error = ModulantError::CircularDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            error.to_string(),
            "Circular dependency detected: a => b => a"
        );
        assert_eq!(error.code(), ErrorCode::CircularDependency);
    }

    #[test]
    fn test_dependency_resolution_wraps_cause() {
        let cause = ModulantError::ModuleNotFound {
            name: "missing".to_string(),
        };
        let error = ModulantError::DependencyResolution {
            name: "requester".to_string(),
            source: Box::new(cause),
        };
        assert_eq!(error.code(), ErrorCode::DependencyResolution);
        assert!(error.to_string().contains("requester"));
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let error = ModulantError::StateHandler {
            state: "lib".to_string(),
            module: "module1".to_string(),
            message: "boom".to_string(),
        };
        let cloned = error.clone();
        assert_eq!(cloned.code(), ErrorCode::HandlerFailure);
    }
}
