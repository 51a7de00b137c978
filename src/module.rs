//! 模块实体
//!
//! 带声明依赖和按状态处理器的命名单元，以及其按状态履约记录

use crate::dependency::DependencyDescriptor;
use crate::types::{
    AbilityName, DependencyLookup, FulfillmentStatus, ModuleInterface, ModuleName, StateHandler,
    StateName, StateOutcome, LIB_STATE,
};
use crate::{ModulantError, Result};
use futures::future::FutureExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// 模块描述信息
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// 模块描述
    pub description: String,
    /// 模块标签
    pub tags: Vec<String>,
}

/// 单个状态的履约记录
#[derive(Clone)]
struct StateRecord {
    status: FulfillmentStatus,
    result: StateOutcome,
    error: Option<String>,
}

/// 模块
///
/// 由宿主构造并注册一次；运行时除记录按状态结果外不做任何修改。
pub struct Module {
    name: ModuleName,
    abilities: HashSet<AbilityName>,
    dependencies: Vec<Arc<DependencyDescriptor>>,
    handlers: HashMap<StateName, StateHandler>,
    metadata: ModuleMetadata,
    /// 按状态履约记录，代理查询路径上无阻塞读取
    records: RwLock<HashMap<StateName, StateRecord>>,
}

impl Module {
    /// 创建模块构建器
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// 模块声明的能力标签
    pub fn abilities(&self) -> &HashSet<AbilityName> {
        &self.abilities
    }

    pub fn has_ability(&self, ability: &str) -> bool {
        self.abilities.contains(ability)
    }

    /// 声明顺序的依赖描述符
    pub fn dependencies(&self) -> &[Arc<DependencyDescriptor>] {
        &self.dependencies
    }

    pub fn required_dependencies(&self) -> Vec<Arc<DependencyDescriptor>> {
        self.dependencies
            .iter()
            .filter(|d| !d.is_optional())
            .cloned()
            .collect()
    }

    pub fn optional_dependencies(&self) -> Vec<Arc<DependencyDescriptor>> {
        self.dependencies
            .iter()
            .filter(|d| d.is_optional())
            .cloned()
            .collect()
    }

    /// 按别名查找依赖声明
    pub fn find_dependency_by_alias(&self, alias: &str) -> Option<Arc<DependencyDescriptor>> {
        self.dependencies
            .iter()
            .find(|d| d.alias() == alias)
            .cloned()
    }

    pub fn has_handler(&self, state: &str) -> bool {
        self.handlers.contains_key(state)
    }

    pub(crate) fn handler(&self, state: &str) -> Option<StateHandler> {
        self.handlers.get(state).cloned()
    }

    /// 注册前校验：名称非空且存在 "lib" 处理器
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ModulantError::validation("module name is empty"));
        }
        if !self.has_handler(LIB_STATE) {
            return Err(ModulantError::validation(format!(
                "module '{}' has no '{}' handler",
                self.name, LIB_STATE
            )));
        }
        Ok(())
    }

    /// 某状态的当前履约状态
    pub fn state_status(&self, state: &str) -> FulfillmentStatus {
        self.records
            .read()
            .get(state)
            .map(|r| r.status)
            .unwrap_or(FulfillmentStatus::Unfired)
    }

    pub fn is_state_fulfilled(&self, state: &str) -> bool {
        self.state_status(state) == FulfillmentStatus::Fulfilled
    }

    pub fn is_state_failed(&self, state: &str) -> bool {
        self.state_status(state) == FulfillmentStatus::Failed
    }

    pub fn is_state_pending(&self, state: &str) -> bool {
        self.state_status(state) == FulfillmentStatus::Pending
    }

    /// 某状态的已达成结果；未达成返回 None
    pub fn state_result(&self, state: &str) -> StateOutcome {
        let records = self.records.read();
        match records.get(state) {
            Some(record) if record.status == FulfillmentStatus::Fulfilled => record.result.clone(),
            _ => None,
        }
    }

    /// 某状态的失败信息
    pub fn state_error(&self, state: &str) -> Option<String> {
        self.records.read().get(state).and_then(|r| r.error.clone())
    }

    /// "lib" 状态产出的接口；未达成返回 None
    pub fn lib(&self) -> Option<ModuleInterface> {
        self.state_result(LIB_STATE)
    }

    pub(crate) fn mark_state_pending(&self, state: &str) {
        self.records.write().insert(
            state.to_string(),
            StateRecord {
                status: FulfillmentStatus::Pending,
                result: None,
                error: None,
            },
        );
    }

    pub(crate) fn record_state_fulfilled(&self, state: &str, result: StateOutcome) {
        self.records.write().insert(
            state.to_string(),
            StateRecord {
                status: FulfillmentStatus::Fulfilled,
                result,
                error: None,
            },
        );
    }

    pub(crate) fn record_state_failed(&self, state: &str, message: String) {
        self.records.write().insert(
            state.to_string(),
            StateRecord {
                status: FulfillmentStatus::Failed,
                result: None,
                error: Some(message),
            },
        );
    }

    /// 重试前清除失败记录
    pub(crate) fn clear_state_record(&self, state: &str) {
        self.records.write().remove(state);
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("abilities", &self.abilities)
            .field("dependencies", &self.dependencies)
            .field("states", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 模块构建器
pub struct ModuleBuilder {
    name: ModuleName,
    abilities: HashSet<AbilityName>,
    dependencies: Vec<Arc<DependencyDescriptor>>,
    handlers: HashMap<StateName, StateHandler>,
    metadata: ModuleMetadata,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abilities: HashSet::new(),
            dependencies: Vec::new(),
            handlers: HashMap::new(),
            metadata: ModuleMetadata::default(),
        }
    }

    /// 声明一个能力标签
    pub fn ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.insert(ability.into());
        self
    }

    /// 声明一个依赖
    pub fn dependency(mut self, descriptor: DependencyDescriptor) -> Self {
        self.dependencies.push(Arc::new(descriptor));
        self
    }

    /// 声明一个已共享的依赖描述符
    pub fn dependency_arc(mut self, descriptor: Arc<DependencyDescriptor>) -> Self {
        self.dependencies.push(descriptor);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// 注册一个状态处理器
    ///
    /// 处理器接收依赖查询函数和绑定接口："lib" 状态绑定 None，
    /// 其他状态绑定模块已产出的 "lib" 接口。
    pub fn handler<F, Fut>(mut self, state: impl Into<String>, handler: F) -> Self
    where
        F: Fn(DependencyLookup, Option<ModuleInterface>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateOutcome>> + Send + 'static,
    {
        let handler: StateHandler = Arc::new(move |deps, bound| handler(deps, bound).boxed());
        self.handlers.insert(state.into(), handler);
        self
    }

    pub fn build(self) -> Module {
        Module {
            name: self.name,
            abilities: self.abilities,
            dependencies: self.dependencies,
            handlers: self.handlers,
            metadata: self.metadata,
            records: RwLock::new(HashMap::new()),
        }
    }
}
