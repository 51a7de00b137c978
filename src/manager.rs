//! 模块管理器门面
//!
//! 在一个显式实例内持有全部注册表并注入到各组件，无进程级单例，
//! 多个互不相干的管理器可以共存

use crate::collection::LoaderCollection;
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::loaders::{CodeLoader, ModuleLoader};
use crate::module::Module;
use crate::state::{StateDefinition, StateStore};
use crate::state_manager::{StateManager, StateManagerConfig};
use crate::store::ModuleStore;
use crate::types::{StateOutcome, LIB_STATE};
use crate::{ModulantError, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// 模块管理器
pub struct ModuleManager {
    config: RuntimeConfig,
    module_store: Arc<ModuleStore>,
    state_store: Arc<StateStore>,
    loader: Arc<LoaderCollection>,
    state_manager: Arc<StateManager>,
    events: Arc<EventBus>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// 按配置组装管理器，配置中声明的状态随之注册
    pub fn with_config(config: RuntimeConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let module_store = Arc::new(ModuleStore::new());
        let state_store = Arc::new(StateStore::new());
        let loader = Arc::new(LoaderCollection::new(module_store.clone(), events.clone()));
        let state_manager = Arc::new(StateManager::new(
            module_store.clone(),
            state_store.clone(),
            events.clone(),
            StateManagerConfig {
                retry_failed_states: config.runtime.retry_failed_states,
            },
        ));

        for state in &config.states {
            debug!("registering state '{}' from config", state.name);
            state_store.add(StateDefinition::new(
                state.name.clone(),
                state.prerequisites.clone(),
            ));
        }

        info!("ModuleManager '{}' assembled", config.runtime.name);
        Self {
            config,
            module_store,
            state_store,
            loader,
            state_manager,
            events,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// 事件总线，订阅加载器和状态机事件
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn module_store(&self) -> Arc<ModuleStore> {
        self.module_store.clone()
    }

    /// 追加一个加载器，注册顺序即优先级
    pub fn register_loader(&self, loader: Arc<dyn ModuleLoader>) {
        self.loader.register_loader(loader);
    }

    /// 注册一个状态及其前置状态
    pub fn register_state(&self, name: &str, prerequisites: &[&str]) {
        self.state_store.add(StateDefinition::new(
            name,
            prerequisites.iter().map(|p| p.to_string()).collect(),
        ));
    }

    /// 直接注册一个进程内构造的模块：校验、包装为代码加载器、立即加载
    pub async fn register_module(&self, module: Module) -> Result<Arc<Module>> {
        module.validate()?;
        let module = Arc::new(module);
        let name = module.name().to_string();
        self.loader
            .register_loader(Arc::new(CodeLoader::new(module)));
        self.load(&name).await
    }

    /// 加载模块及其依赖
    pub async fn load(&self, name: &str) -> Result<Arc<Module>> {
        self.loader
            .load_module_and_dependencies(name, None, None)
            .await
    }

    /// 并发加载一组模块
    pub async fn load_all(&self, names: &[&str]) -> Result<Vec<Arc<Module>>> {
        let futures: Vec<_> = names.iter().map(|name| self.load(name)).collect();
        join_all(futures).await.into_iter().collect()
    }

    /// 加载后在模块上触发状态
    pub async fn fire(&self, state_name: &str, name: &str) -> Result<StateOutcome> {
        self.load(name).await?;
        let module = self
            .module_store
            .get(name)
            .ok_or_else(|| ModulantError::ModuleNotFound {
                name: name.to_string(),
            })?;
        self.state_manager.fire(state_name, &module).await
    }

    /// 在一组模块上触发状态
    pub async fn fire_all(&self, state_name: &str, names: &[&str]) -> Result<Vec<StateOutcome>> {
        self.load_all(names).await?;
        let futures: Vec<_> = names.iter().map(|name| self.fire(state_name, name)).collect();
        join_all(futures).await.into_iter().collect()
    }

    /// 仅触发 "lib" 状态的快捷方式
    pub async fn fire_lib(&self, name: &str) -> Result<StateOutcome> {
        self.fire(LIB_STATE, name).await
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeSettings, StateConfig};
    use crate::dependency::DependencyDescriptor;
    use crate::types::{downcast_interface, ModuleInterface};
    use parking_lot::Mutex;

    struct GreeterLib {
        greeting: String,
    }

    fn greeter_module() -> Module {
        Module::builder("greeter")
            .handler(LIB_STATE, |_deps, _bound| async {
                Ok(Some(Arc::new(GreeterLib {
                    greeting: "hello".to_string(),
                }) as ModuleInterface))
            })
            .build()
    }

    #[tokio::test]
    async fn test_register_module_validates_first() {
        let manager = ModuleManager::new();

        let invalid = Module::builder("broken")
            .handler("start", |_deps, _bound| async { Ok(None) })
            .build();
        assert!(matches!(
            manager.register_module(invalid).await,
            Err(ModulantError::ModuleValidation { .. })
        ));

        let module = manager.register_module(greeter_module()).await.unwrap();
        assert_eq!(module.name(), "greeter");
        assert!(manager.module_store().contains("greeter"));
    }

    #[tokio::test]
    async fn test_fire_loads_then_drives_state() {
        let manager = ModuleManager::new();
        manager.register_module(greeter_module()).await.unwrap();

        let outcome = manager.fire_lib("greeter").await.unwrap();
        let lib = downcast_interface::<GreeterLib>(outcome.unwrap()).unwrap();
        assert_eq!(lib.greeting, "hello");
    }

    #[tokio::test]
    async fn test_fire_unknown_module_is_not_found() {
        let manager = ModuleManager::new();
        let result = manager.fire_lib("nothing").await;
        assert!(matches!(
            result,
            Err(ModulantError::ModuleNotFound { name }) if name == "nothing"
        ));
    }

    #[tokio::test]
    async fn test_config_states_are_registered() {
        let config = RuntimeConfig {
            runtime: RuntimeSettings::default(),
            states: vec![
                StateConfig {
                    name: "construct".to_string(),
                    prerequisites: vec![LIB_STATE.to_string()],
                },
                StateConfig {
                    name: "serve".to_string(),
                    prerequisites: vec!["construct".to_string()],
                },
            ],
            logging: Default::default(),
            parameters: Default::default(),
        };
        let manager = ModuleManager::with_config(config);

        let steps = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Module::builder("server");
        for state in [LIB_STATE, "construct", "serve"] {
            let steps = steps.clone();
            let label = state.to_string();
            builder = builder.handler(state, move |_deps, _bound| {
                let steps = steps.clone();
                let label = label.clone();
                async move {
                    steps.lock().push(label.clone());
                    Ok(if label == LIB_STATE {
                        Some(Arc::new(()) as ModuleInterface)
                    } else {
                        None
                    })
                }
            });
        }
        manager.register_module(builder.build()).await.unwrap();

        manager.fire("serve", "server").await.unwrap();
        assert_eq!(steps.lock().as_slice(), ["lib", "construct", "serve"]);
    }

    #[tokio::test]
    async fn test_fire_all_drives_dependency_chain() {
        let manager = ModuleManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        let backend = Module::builder("backend")
            .ability("storage")
            .handler(LIB_STATE, move |_deps, _bound| {
                let o = o.clone();
                async move {
                    o.lock().push("backend".to_string());
                    Ok(Some(Arc::new(()) as ModuleInterface))
                }
            })
            .build();

        let o = order.clone();
        let frontend = Module::builder("frontend")
            .dependency(DependencyDescriptor::name("backend", "backend"))
            .handler(LIB_STATE, move |deps, _bound| {
                let o = o.clone();
                async move {
                    assert!(deps.get("backend").is_some());
                    o.lock().push("frontend".to_string());
                    Ok(Some(Arc::new(()) as ModuleInterface))
                }
            })
            .build();

        manager.register_module(backend).await.unwrap();
        manager.register_module(frontend).await.unwrap();

        manager.fire_all(LIB_STATE, &["frontend"]).await.unwrap();
        assert_eq!(order.lock().as_slice(), ["backend", "frontend"]);
    }

    #[tokio::test]
    async fn test_managers_are_independent() {
        let first = ModuleManager::new();
        let second = ModuleManager::new();
        first.register_module(greeter_module()).await.unwrap();

        assert!(first.module_store().contains("greeter"));
        assert!(!second.module_store().contains("greeter"));
        assert!(second.fire_lib("greeter").await.is_err());
    }
}
