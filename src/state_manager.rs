//! 状态编排引擎
//!
//! 按状态DAG在模块上触发状态：依赖先行、前置状态先行、
//! 处理器按 (模块, 状态) 去重执行、双向状态回调扇出

use crate::events::{EventBus, RuntimeEvent};
use crate::module::Module;
use crate::proxy::ModuleProxy;
use crate::state::{StateDefinition, StateStore};
use crate::store::ModuleStore;
use crate::types::{ModuleName, StateName, StateOutcome, LIB_STATE};
use crate::{ModulantError, Result};
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// 处理器执行的共享结果：并发请求方共用同一个结果
type SharedFire = Shared<BoxFuture<'static, Result<StateOutcome>>>;

/// 状态编排配置
#[derive(Debug, Clone, Default)]
pub struct StateManagerConfig {
    /// 失败状态是否允许显式重试；默认失败为终态
    pub retry_failed_states: bool,
}

/// 状态编排引擎
pub struct StateManager {
    module_store: Arc<ModuleStore>,
    state_store: Arc<StateStore>,
    /// 每个模块的依赖代理，首次使用时构建
    proxies: DashMap<ModuleName, Arc<ModuleProxy>>,
    /// (模块, 状态) 执行表 - 处理器对每个组合至多执行一次
    firing: Mutex<HashMap<(ModuleName, StateName), SharedFire>>,
    events: Arc<EventBus>,
    config: StateManagerConfig,
}

impl StateManager {
    pub fn new(
        module_store: Arc<ModuleStore>,
        state_store: Arc<StateStore>,
        events: Arc<EventBus>,
        config: StateManagerConfig,
    ) -> Self {
        // "lib" 是隐式根状态
        state_store.add(StateDefinition::root(LIB_STATE));
        Self {
            module_store,
            state_store,
            proxies: DashMap::new(),
            firing: Mutex::new(HashMap::new()),
            events,
            config,
        }
    }

    /// 获取或构建模块的依赖代理
    pub fn proxy_for(&self, module: &Arc<Module>) -> Arc<ModuleProxy> {
        if let Some(existing) = self.proxies.get(module.name()) {
            return existing.clone();
        }
        let proxy = Arc::new(ModuleProxy::new(
            module.clone(),
            self.module_store.clone(),
        ));
        self.proxies
            .insert(module.name().to_string(), proxy.clone());
        proxy
    }

    /// 在模块上触发一个状态
    ///
    /// 返回值是模块自身处理器对该状态的产出；依赖扇出、前置状态和
    /// 回调扇出是围绕它的顺序保障，不改变返回值。
    pub fn fire(
        self: &Arc<Self>,
        state_name: &str,
        module: &Arc<Module>,
    ) -> BoxFuture<'static, Result<StateOutcome>> {
        let this = self.clone();
        let state_name = state_name.to_string();
        let module = module.clone();

        async move {
            if !this.state_store.contains(&state_name) {
                return Err(ModulantError::StateUnknown { state: state_name });
            }
            let proxy = this.proxy_for(&module);

            // "lib" 阶段：依赖的公共接口先于依赖方存在
            this.fire_dependencies_state(LIB_STATE, &module).await?;
            let lib_outcome = this.run_module_state(LIB_STATE, &module, &proxy).await?;
            this.fire_state_callbacks(LIB_STATE, &module).await;
            if state_name == LIB_STATE {
                return Ok(lib_outcome);
            }

            // 前置状态先行（"lib" 已在上面满足）
            let prerequisites = this
                .state_store
                .get(&state_name)
                .map(|s| s.prerequisites().to_vec())
                .unwrap_or_default();
            let futures: Vec<_> = prerequisites
                .iter()
                .filter(|p| p.as_str() != LIB_STATE)
                .map(|p| {
                    trace!(
                        "StateManager.fire({}) adding prerequisite {}",
                        state_name,
                        p
                    );
                    this.fire(p, &module)
                })
                .collect();
            for result in join_all(futures).await {
                result?;
            }

            // 依赖必须先于依赖方到达该状态
            this.fire_dependencies_state(&state_name, &module).await?;
            let outcome = this.run_module_state(&state_name, &module, &proxy).await?;
            this.fire_state_callbacks(&state_name, &module).await;
            Ok(outcome)
        }
        .boxed()
    }

    /// 在当前可解析的每个依赖模块上触发状态
    fn fire_dependencies_state(
        self: &Arc<Self>,
        state_name: &str,
        module: &Arc<Module>,
    ) -> BoxFuture<'static, Result<()>> {
        trace!(
            "StateManager.fire_dependencies_state({}) launching for dependencies of {}",
            state_name,
            module.name()
        );
        let dependencies = self.proxy_for(module).dependency_modules();
        let futures: Vec<_> = dependencies
            .iter()
            .map(|dependency| self.fire(state_name, dependency))
            .collect();
        async move {
            for result in join_all(futures).await {
                result?;
            }
            Ok(())
        }
        .boxed()
    }

    /// 执行模块自身的状态处理器，按 (模块, 状态) 去重
    fn run_module_state(
        self: &Arc<Self>,
        state_name: &str,
        module: &Arc<Module>,
        proxy: &Arc<ModuleProxy>,
    ) -> BoxFuture<'static, Result<StateOutcome>> {
        let key = (module.name().to_string(), state_name.to_string());
        let shared = {
            let mut firing = self.firing.lock();
            if let Some(existing) = firing.get(&key) {
                existing.clone()
            } else {
                let fut = {
                    let this = self.clone();
                    let module = module.clone();
                    let state = state_name.to_string();
                    let lookup = proxy.lookup();
                    async move {
                        this.events
                            .publish(RuntimeEvent::state_fire(&state, module.clone()))
                            .await;
                        module.mark_state_pending(&state);
                        // "lib" 绑定空接口，其他状态绑定已产出的 "lib" 接口
                        let bound = if state == LIB_STATE {
                            None
                        } else {
                            module.lib()
                        };
                        let outcome = match module.handler(&state) {
                            Some(handler) => (*handler)(lookup, bound).await,
                            None => Ok(None),
                        };
                        match outcome {
                            Ok(result) => {
                                module.record_state_fulfilled(&state, result.clone());
                                this.events
                                    .publish(RuntimeEvent::state_fulfilled(&state, module.clone()))
                                    .await;
                                Ok(result)
                            }
                            Err(err) => {
                                let failure = ModulantError::StateHandler {
                                    state: state.clone(),
                                    module: module.name().to_string(),
                                    message: err.to_string(),
                                };
                                module.record_state_failed(&state, err.to_string());
                                this.events
                                    .publish(RuntimeEvent::state_failed(
                                        &state,
                                        module.clone(),
                                        &failure,
                                    ))
                                    .await;
                                Err(failure)
                            }
                        }
                    }
                }
                .boxed()
                .shared();
                firing.insert(key.clone(), fut.clone());
                fut
            }
        };

        let this = self.clone();
        let module = module.clone();
        async move {
            let result = shared.await;
            if result.is_err() && this.config.retry_failed_states {
                // 重试策略下清除记录，显式的再次触发会重新执行处理器
                this.firing.lock().remove(&key);
                module.clear_state_record(&key.1);
            }
            result
        }
        .boxed()
    }

    /// 双向状态回调扇出
    ///
    /// 后到达状态的一方触发通知，与加载和触发顺序无关。单个回调的
    /// 失败被隔离记录，绝不影响整体触发。
    fn fire_state_callbacks(
        self: &Arc<Self>,
        state_name: &str,
        module: &Arc<Module>,
    ) -> BoxFuture<'static, ()> {
        trace!(
            "StateManager.fire_state_callbacks({}, {})",
            state_name,
            module.name()
        );
        let mut futures = Vec::new();
        let lookup = self.proxy_for(module).lookup();

        // 我依赖的模块：目标已达成该状态时触发我声明的回调
        for descriptor in module.dependencies() {
            if let Some(target) = self.module_store.get_dependency(descriptor) {
                if target.is_state_fulfilled(state_name) {
                    trace!(
                        "StateManager.fire_state_callbacks({}): launching callbacks for dependency {}",
                        module.name(),
                        descriptor.alias()
                    );
                    futures.push(descriptor.fire_callbacks(
                        state_name,
                        lookup.clone(),
                        module.lib(),
                    ));
                }
            }
        }

        // 依赖我的模块：对方自身已达成该状态时触发对方声明的回调
        for (dependent, descriptor) in self.module_store.get_dependent_modules(module) {
            if dependent.is_state_fulfilled(state_name) {
                trace!(
                    "StateManager.fire_state_callbacks({}): launching callbacks for dependent {}",
                    module.name(),
                    dependent.name()
                );
                let dependent_lookup = self.proxy_for(&dependent).lookup();
                futures.push(descriptor.fire_callbacks(
                    state_name,
                    dependent_lookup,
                    dependent.lib(),
                ));
            }
        }

        async move {
            join_all(futures).await;
        }
        .boxed()
    }
}
