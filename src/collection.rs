//! 加载器集合
//!
//! 发现并递归加载模块及其依赖：责任链调度、在途加载去重、
//! 环路检测、必需/可选/能力三路并发解析

use crate::context::LoadContext;
use crate::events::{EventBus, RuntimeEvent};
use crate::loaders::ModuleLoader;
use crate::module::Module;
use crate::store::ModuleStore;
use crate::types::{DependencyKind, ModuleName, OnModuleCallback};
use crate::{ModulantError, Result};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// 在途加载的共享结果：并发请求方共用同一个结果
type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Module>>>>;

/// 加载器集合
pub struct LoaderCollection {
    /// 注册顺序即优先级，先注册者先尝试
    loaders: RwLock<Vec<Arc<dyn ModuleLoader>>>,
    /// 在途加载表 - 每个名称至多一次加载器调用
    loading: Mutex<HashMap<ModuleName, SharedLoad>>,
    store: Arc<ModuleStore>,
    events: Arc<EventBus>,
}

impl LoaderCollection {
    pub fn new(store: Arc<ModuleStore>, events: Arc<EventBus>) -> Self {
        Self {
            loaders: RwLock::new(Vec::new()),
            loading: Mutex::new(HashMap::new()),
            store,
            events,
        }
    }

    /// 追加一个加载器
    pub fn register_loader(&self, loader: Arc<dyn ModuleLoader>) {
        self.loaders.write().push(loader);
    }

    /// 加载模块及其全部依赖
    ///
    /// `on_module` 只在调用树的根部传入，对树内每个加载成功的模块触发。
    /// `parent_context` 由递归的依赖加载传入，用于环路检测。
    pub fn load_module_and_dependencies(
        self: &Arc<Self>,
        name: &str,
        on_module: Option<OnModuleCallback>,
        parent_context: Option<Arc<LoadContext>>,
    ) -> BoxFuture<'static, Result<Arc<Module>>> {
        let this = self.clone();
        let name = name.to_string();
        let context = Arc::new(LoadContext::new(name.clone(), parent_context, on_module));

        async move {
            debug!("LoaderCollection.load_module_and_dependencies({}) starts", name);

            if let Some(path) = context.circular_loop() {
                let err = ModulantError::CircularDependency { path };
                error!("{}", err);
                this.events
                    .publish(RuntimeEvent::load_error(&name, context.load_path(), &err))
                    .await;
                return Err(err);
            }

            // 同一把锁内完成在途/已注册检查和在途登记，避免重复加载
            let shared = {
                let mut loading = this.loading.lock();
                if let Some(existing) = loading.get(&name) {
                    existing.clone()
                } else if let Some(module) = this.store.get(&name) {
                    return Ok(module);
                } else {
                    let fut = {
                        let this = this.clone();
                        let name = name.clone();
                        let context = context.clone();
                        async move { this.perform_load(name, context).await }
                    }
                    .boxed()
                    .shared();
                    loading.insert(name.clone(), fut.clone());
                    fut
                }
            };

            shared.await
        }
        .boxed()
    }

    /// 执行一次真实加载：责任链取模块、解析依赖、入库、通知
    async fn perform_load(
        self: Arc<Self>,
        name: ModuleName,
        context: Arc<LoadContext>,
    ) -> Result<Arc<Module>> {
        self.events
            .publish(RuntimeEvent::load_start(&name, context.load_path()))
            .await;

        let outcome = async {
            let module = self.run_loader_chain(&name).await?;
            debug!(
                "LoaderCollection.load_module_and_dependencies({}) dependency resolution",
                name
            );
            self.resolve_dependencies(&module, &context).await?;
            self.store.set(&name, module.clone())?;
            Ok(module)
        }
        .await;

        // 无论成败清除在途记录；失败的加载允许显式重试
        self.loading.lock().remove(&name);

        match outcome {
            Ok(module) => {
                if let Some(callback) = context.on_module() {
                    (*callback)(&name, module.clone());
                }
                self.events
                    .publish(RuntimeEvent::loaded(
                        &name,
                        module.clone(),
                        context.load_path(),
                    ))
                    .await;
                Ok(module)
            }
            Err(err) => {
                self.events
                    .publish(RuntimeEvent::load_error(&name, context.load_path(), &err))
                    .await;
                Err(err)
            }
        }
    }

    /// 按优先级尝试加载器，第一个产出者胜出
    async fn run_loader_chain(&self, name: &str) -> Result<Arc<Module>> {
        let loaders: Vec<_> = self.loaders.read().clone();
        for loader in loaders {
            match loader.load(name).await {
                Ok(Some(module)) => return Ok(module),
                Ok(None) => continue,
                Err(e) => {
                    debug!(
                        "got an error loading {} with loader {}: {}",
                        name,
                        loader.name(),
                        e
                    );
                }
            }
        }
        Err(ModulantError::ModuleNotFound {
            name: name.to_string(),
        })
    }

    /// 并发解析模块声明的依赖
    async fn resolve_dependencies(
        self: &Arc<Self>,
        module: &Arc<Module>,
        context: &Arc<LoadContext>,
    ) -> Result<()> {
        let required = self.load_required_named(module, context);
        let optional = self.load_optional_named(module, context);
        let (required_results, optional_results) = tokio::join!(required, optional);

        for result in required_results {
            if let Err(err) = result {
                return Err(Self::wrap_resolution_failure(module.name(), err));
            }
        }
        for (target, result) in optional_results {
            if let Err(e) = result {
                debug!(
                    "optional dependency '{}' of '{}' failed to load, silently ignoring: {}",
                    target,
                    module.name(),
                    e
                );
            }
        }

        self.check_required_abilities(module)
    }

    fn load_required_named(
        self: &Arc<Self>,
        module: &Arc<Module>,
        context: &Arc<LoadContext>,
    ) -> BoxFuture<'static, Vec<Result<Arc<Module>>>> {
        let dependencies: Vec<_> = module
            .required_dependencies()
            .into_iter()
            .filter(|d| d.kind() == DependencyKind::Name)
            .collect();
        debug!(
            "LoaderCollection.load_required_named({}) got {} dependencies to fetch",
            module.name(),
            dependencies.len()
        );
        let futures: Vec<_> = dependencies
            .iter()
            .map(|d| self.load_module_and_dependencies(d.target(), None, Some(context.clone())))
            .collect();
        join_all(futures).boxed()
    }

    fn load_optional_named(
        self: &Arc<Self>,
        module: &Arc<Module>,
        context: &Arc<LoadContext>,
    ) -> BoxFuture<'static, Vec<(ModuleName, Result<Arc<Module>>)>> {
        let dependencies: Vec<_> = module
            .optional_dependencies()
            .into_iter()
            .filter(|d| d.kind() == DependencyKind::Name)
            .collect();
        debug!(
            "LoaderCollection.load_optional_named({}) got {} dependencies to fetch",
            module.name(),
            dependencies.len()
        );
        let futures: Vec<_> = dependencies
            .iter()
            .map(|d| {
                let target = d.target().to_string();
                let fut =
                    self.load_module_and_dependencies(d.target(), None, Some(context.clone()));
                async move { (target, fut.await) }
            })
            .collect();
        join_all(futures).boxed()
    }

    /// 必需的能力依赖只对当前索引解析，从不触发加载
    fn check_required_abilities(&self, module: &Arc<Module>) -> Result<()> {
        let missing: Vec<String> = module
            .required_dependencies()
            .into_iter()
            .filter(|d| d.kind() == DependencyKind::Ability)
            .filter(|d| self.store.get_by_ability(d.target()).is_none())
            .map(|d| d.target().to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(
            "LoaderCollection.check_required_abilities({}): {} missing abilities",
            module.name(),
            missing.len()
        );
        Err(Self::wrap_resolution_failure(
            module.name(),
            ModulantError::AbilityNotFound { abilities: missing },
        ))
    }

    /// 环路错误按原样穿透，其余失败包装为依赖解析错误
    fn wrap_resolution_failure(requester: &str, err: ModulantError) -> ModulantError {
        match err {
            ModulantError::CircularDependency { .. } => err,
            other => ModulantError::DependencyResolution {
                name: requester.to_string(),
                source: Box::new(other),
            },
        }
    }
}
