//! Modulant - 可插拔模块运行时
//!
//! 以独立编写的插件组装应用：发现命名模块、解析模块间依赖、
//! 通过有序的加载器链取回模块，并沿状态DAG分阶段初始化
//!
//! # 核心组成
//!
//! - **加载与依赖解析**: 加载器责任链、递归依赖加载、环路检测、
//!   必需/可选/能力三种解析方式、按名称去重
//! - **状态编排**: 以 "lib" 为根的状态DAG、依赖先行的触发顺序、
//!   依赖代理、双向的跨模块状态回调
//!
//! # 特性
//!
//! - **无全局状态**: 全部注册表由显式的管理器实例持有，可多实例共存
//! - **异步优先**: 基于Tokio，兄弟加载和兄弟触发并发推进
//! - **至多一次**: 加载器调用和状态处理器按键去重，并发请求共享结果

pub mod collection;
pub mod config;
pub mod context;
pub mod dependency;
pub mod error;
pub mod events;
pub mod loaders;
pub mod manager;
pub mod module;
pub mod proxy;
pub mod state;
pub mod state_manager;
pub mod store;
pub mod types;

// 重新导出核心类型
pub use collection::LoaderCollection;
pub use config::{generate_default_config_file, LoggingConfig, RuntimeConfig, RuntimeSettings, StateConfig};
pub use context::LoadContext;
pub use dependency::DependencyDescriptor;
pub use error::{ErrorCode, ModulantError, Result};
pub use events::{EventBus, EventStats, RuntimeEvent, RuntimeEventHandler};
pub use loaders::{CodeLoader, ModuleLoader, RegistryLoader};
pub use manager::ModuleManager;
pub use module::{Module, ModuleBuilder, ModuleMetadata};
pub use proxy::ModuleProxy;
pub use state::{StateDefinition, StateStore};
pub use state_manager::{StateManager, StateManagerConfig};
pub use store::ModuleStore;
pub use types::*;

/// 框架信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FRAMEWORK_NAME: &str = "Modulant";

/// 按配置初始化日志系统
pub fn init_logging(config: &LoggingConfig) {
    let level = match config.level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    // 已有全局订阅者时保持原样
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init();
}

/// 快速启动函数
pub async fn initialize() -> Result<()> {
    init_logging(&LoggingConfig::default());
    tracing::info!("Initializing {} v{}", FRAMEWORK_NAME, VERSION);
    Ok(())
}
