//! 状态定义和状态注册表
//!
//! 状态按声明的前置状态构成以 "lib" 为根的有向无环图

use crate::types::StateName;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 状态定义
#[derive(Debug, Clone)]
pub struct StateDefinition {
    name: StateName,
    prerequisites: Vec<StateName>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>, prerequisites: Vec<String>) -> Self {
        Self {
            name: name.into(),
            prerequisites,
        }
    }

    /// 无前置状态的状态
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[StateName] {
        &self.prerequisites
    }
}

/// 状态注册表
#[derive(Default)]
pub struct StateStore {
    states: RwLock<HashMap<StateName, StateDefinition>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册状态；重复注册覆盖旧定义
    pub fn add(&self, state: StateDefinition) {
        self.states.write().insert(state.name().to_string(), state);
    }

    pub fn get(&self, name: &str) -> Option<StateDefinition> {
        self.states.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.read().contains_key(name)
    }
}
