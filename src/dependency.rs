//! 依赖描述符
//!
//! 一个模块对另一个模块的不可变需求声明：按名称或能力解析，
//! 必需或可选，带查询别名和可选的按状态回调

use crate::types::{DependencyKind, DependencyLookup, ModuleInterface, StateCallback, StateName};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// 依赖描述符
///
/// 由声明方模块持有；运行时只读取声明字段并触发回调。
/// 同一描述符同一状态的回调扇出至多发生一次，无论双方以何种顺序
/// 到达该状态、也无论状态被重复触发多少次。
pub struct DependencyDescriptor {
    kind: DependencyKind,
    target: String,
    alias: String,
    optional: bool,
    /// 按状态注册的回调
    callbacks: RwLock<HashMap<StateName, Vec<StateCallback>>>,
    /// 已扇出的状态集合
    fired: Mutex<HashSet<StateName>>,
}

impl DependencyDescriptor {
    pub fn new(
        kind: DependencyKind,
        target: impl Into<String>,
        alias: impl Into<String>,
        optional: bool,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            alias: alias.into(),
            optional,
            callbacks: RwLock::new(HashMap::new()),
            fired: Mutex::new(HashSet::new()),
        }
    }

    /// 必需的按名称依赖
    pub fn name(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(DependencyKind::Name, target, alias, false)
    }

    /// 可选的按名称依赖
    pub fn optional_name(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(DependencyKind::Name, target, alias, true)
    }

    /// 必需的按能力依赖
    pub fn ability(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(DependencyKind::Ability, target, alias, false)
    }

    /// 可选的按能力依赖
    pub fn optional_ability(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(DependencyKind::Ability, target, alias, true)
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    /// 解析目标：模块名或能力标签
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 处理器通过该别名查询此依赖
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// 注册状态回调
    ///
    /// 回调在依赖和声明方都达成该状态后触发，接收声明方的依赖查询
    /// 函数和声明方的 "lib" 接口。
    pub fn on_state<F, Fut>(&self, state: impl Into<String>, callback: F)
    where
        F: Fn(DependencyLookup, Option<ModuleInterface>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        let callback: StateCallback = Arc::new(move |deps, bound| callback(deps, bound).boxed());
        self.callbacks
            .write()
            .entry(state.into())
            .or_insert_with(Vec::new)
            .push(callback);
    }

    /// 触发某状态的回调扇出
    ///
    /// 单个回调的失败被记录并吞掉，绝不向外传播。
    pub(crate) fn fire_callbacks(
        self: &Arc<Self>,
        state: &str,
        deps: DependencyLookup,
        bound: Option<ModuleInterface>,
    ) -> BoxFuture<'static, ()> {
        {
            let mut fired = self.fired.lock();
            if !fired.insert(state.to_string()) {
                return futures::future::ready(()).boxed();
            }
        }
        let callbacks = self
            .callbacks
            .read()
            .get(state)
            .cloned()
            .unwrap_or_default();
        let state = state.to_string();
        let alias = self.alias.clone();
        async move {
            for callback in callbacks {
                if let Err(e) = (*callback)(deps.clone(), bound.clone()).await {
                    debug!(
                        "State callback for '{}' on dependency '{}' failed, ignoring: {}",
                        state, alias, e
                    );
                }
            }
        }
        .boxed()
    }

    /// 该状态的回调是否已经扇出过
    pub fn has_fired(&self, state: &str) -> bool {
        self.fired.lock().contains(state)
    }
}

impl std::fmt::Debug for DependencyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyDescriptor")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("alias", &self.alias)
            .field("optional", &self.optional)
            .finish()
    }
}
