//! Modulant 事件系统
//!
//! 加载器和状态机的观察者注册，按事件类型分发，隔离处理器失败

use crate::module::Module;
use crate::types::{now_ns, ModuleName, StateName, TimestampNs};
use crate::{ErrorCode, ModulantError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// 运行时事件
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// 加载开始
    LoadStart {
        name: ModuleName,
        path: Vec<ModuleName>,
        timestamp: TimestampNs,
    },
    /// 模块及其依赖加载完成
    Loaded {
        name: ModuleName,
        module: Arc<Module>,
        path: Vec<ModuleName>,
        timestamp: TimestampNs,
    },
    /// 加载失败
    LoadError {
        name: ModuleName,
        path: Vec<ModuleName>,
        code: ErrorCode,
        error: String,
        timestamp: TimestampNs,
    },
    /// 状态处理器即将执行
    StateFire {
        state: StateName,
        module: Arc<Module>,
        timestamp: TimestampNs,
    },
    /// 状态达成
    StateFulfilled {
        state: StateName,
        module: Arc<Module>,
        timestamp: TimestampNs,
    },
    /// 状态失败
    StateFailed {
        state: StateName,
        module: Arc<Module>,
        error: String,
        timestamp: TimestampNs,
    },
}

impl RuntimeEvent {
    /// 事件类型标识，用于订阅路由
    pub fn event_type(&self) -> &'static str {
        match self {
            RuntimeEvent::LoadStart { .. } => "loadstart",
            RuntimeEvent::Loaded { .. } => "loaded",
            RuntimeEvent::LoadError { .. } => "loaderror",
            RuntimeEvent::StateFire { .. } => "fire",
            RuntimeEvent::StateFulfilled { .. } => "fulfilled",
            RuntimeEvent::StateFailed { .. } => "failed",
        }
    }

    pub(crate) fn load_start(name: &str, path: Vec<ModuleName>) -> Self {
        RuntimeEvent::LoadStart {
            name: name.to_string(),
            path,
            timestamp: now_ns(),
        }
    }

    pub(crate) fn loaded(name: &str, module: Arc<Module>, path: Vec<ModuleName>) -> Self {
        RuntimeEvent::Loaded {
            name: name.to_string(),
            module,
            path,
            timestamp: now_ns(),
        }
    }

    pub(crate) fn load_error(name: &str, path: Vec<ModuleName>, error: &ModulantError) -> Self {
        RuntimeEvent::LoadError {
            name: name.to_string(),
            path,
            code: error.code(),
            error: error.to_string(),
            timestamp: now_ns(),
        }
    }

    pub(crate) fn state_fire(state: &str, module: Arc<Module>) -> Self {
        RuntimeEvent::StateFire {
            state: state.to_string(),
            module,
            timestamp: now_ns(),
        }
    }

    pub(crate) fn state_fulfilled(state: &str, module: Arc<Module>) -> Self {
        RuntimeEvent::StateFulfilled {
            state: state.to_string(),
            module,
            timestamp: now_ns(),
        }
    }

    pub(crate) fn state_failed(state: &str, module: Arc<Module>, error: &ModulantError) -> Self {
        RuntimeEvent::StateFailed {
            state: state.to_string(),
            module,
            error: error.to_string(),
            timestamp: now_ns(),
        }
    }
}

/// 事件处理器接口
#[async_trait]
pub trait RuntimeEventHandler: Send + Sync {
    async fn handle(&self, event: &RuntimeEvent) -> Result<()>;
    fn name(&self) -> &str;
}

// 类型别名用于简化复杂类型
type HandlerMap = RwLock<HashMap<String, Vec<Arc<dyn RuntimeEventHandler>>>>;

/// 事件总线
///
/// 事件在发布点内联分发给订阅者，保持与加载/状态流程的确定性顺序；
/// 单个处理器的失败被记录但不会影响其他处理器或发布方。
pub struct EventBus {
    handlers: HandlerMap,
    stats: RwLock<EventStats>,
}

/// 事件统计
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    pub total_events: u64,
    pub events_by_type: HashMap<String, u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventStats::default()),
        }
    }

    /// 订阅指定类型的事件
    pub async fn subscribe(&self, event_type: &str, handler: Arc<dyn RuntimeEventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(event_type.to_string())
            .or_insert_with(Vec::new)
            .push(handler);
        debug!("Subscribed to event type: {}", event_type);
    }

    /// 发布事件
    pub async fn publish(&self, event: RuntimeEvent) {
        let event_type = event.event_type();

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            stats
                .events_by_type
                .entry(event_type.to_string())
                .and_modify(|count| *count += 1)
                .or_insert(1);
        }

        let subscribers = {
            let handlers = self.handlers.read().await;
            handlers.get(event_type).cloned().unwrap_or_default()
        };

        for handler in subscribers {
            if let Err(e) = handler.handle(&event).await {
                error!(
                    "Event handler {} failed for event {}: {}",
                    handler.name(),
                    event_type,
                    e
                );
            }
        }
    }

    /// 获取事件统计
    pub async fn stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingHandler {
        name: String,
        counter: Arc<AtomicU64>,
        fail: bool,
    }

    #[async_trait]
    impl RuntimeEventHandler for CountingHandler {
        async fn handle(&self, _event: &RuntimeEvent) -> Result<()> {
            self.counter.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(ModulantError::internal("handler down"));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn test_publish_routes_by_event_type() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU64::new(0));
        bus.subscribe(
            "loadstart",
            Arc::new(CountingHandler {
                name: "counting".to_string(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .await;

        bus.publish(RuntimeEvent::load_start("module1", vec!["module1".into()]))
            .await;
        // 其他类型不会路由到该处理器
        bus.publish(RuntimeEvent::load_error(
            "module2",
            vec!["module2".into()],
            &ModulantError::ModuleNotFound {
                name: "module2".to_string(),
            },
        ))
        .await;

        assert_eq!(counter.load(Ordering::Relaxed), 1);

        let stats = bus.stats().await;
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.events_by_type.get("loadstart"), Some(&1));
        assert_eq!(stats.events_by_type.get("loaderror"), Some(&1));
    }

    #[tokio::test]
    async fn test_handler_failure_is_isolated() {
        let bus = EventBus::new();
        let failing = Arc::new(AtomicU64::new(0));
        let healthy = Arc::new(AtomicU64::new(0));
        bus.subscribe(
            "loadstart",
            Arc::new(CountingHandler {
                name: "failing".to_string(),
                counter: failing.clone(),
                fail: true,
            }),
        )
        .await;
        bus.subscribe(
            "loadstart",
            Arc::new(CountingHandler {
                name: "healthy".to_string(),
                counter: healthy.clone(),
                fail: false,
            }),
        )
        .await;

        bus.publish(RuntimeEvent::load_start("module1", vec!["module1".into()]))
            .await;

        assert_eq!(failing.load(Ordering::Relaxed), 1);
        assert_eq!(healthy.load(Ordering::Relaxed), 1);
    }
}
