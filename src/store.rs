//! 模块注册表
//!
//! 名称到模块的一次性写入注册表，带记忆化的能力索引和反向依赖查询

use crate::dependency::DependencyDescriptor;
use crate::module::Module;
use crate::types::{AbilityName, DependencyKind, ModuleName};
use crate::{ModulantError, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// 模块注册表
pub struct ModuleStore {
    modules: RwLock<HashMap<ModuleName, Arc<Module>>>,
    /// 注册顺序，能力解析按此顺序取第一个提供方
    order: RwLock<Vec<ModuleName>>,
    /// 能力解析缓存 - 首次命中后固定，后续注册不再改变结果
    ability_cache: DashMap<AbilityName, Arc<Module>>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            ability_cache: DashMap::new(),
        }
    }

    /// 注册模块；重复名称是错误
    pub fn set(&self, name: &str, module: Arc<Module>) -> Result<()> {
        let mut modules = self.modules.write();
        if modules.contains_key(name) {
            return Err(ModulantError::ModuleAlreadyRegistered {
                name: name.to_string(),
            });
        }
        trace!("ModuleStore.set({}) setting module in store", name);
        modules.insert(name.to_string(), module);
        self.order.write().push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// 按能力解析：注册顺序中第一个声明该能力的模块，首次命中后缓存
    pub fn get_by_ability(&self, ability: &str) -> Option<Arc<Module>> {
        if let Some(cached) = self.ability_cache.get(ability) {
            return Some(cached.clone());
        }
        let modules = self.modules.read();
        let order = self.order.read();
        let selected = order
            .iter()
            .filter_map(|name| modules.get(name))
            .find(|m| m.has_ability(ability))
            .cloned()?;
        self.ability_cache
            .insert(ability.to_string(), selected.clone());
        Some(selected)
    }

    /// 按描述符种类分派解析
    pub fn get_dependency(&self, descriptor: &DependencyDescriptor) -> Option<Arc<Module>> {
        match descriptor.kind() {
            DependencyKind::Name => self.get(descriptor.target()),
            DependencyKind::Ability => self.get_by_ability(descriptor.target()),
        }
    }

    /// 反向查询：所有声明了解析到给定模块的依赖的 (模块, 描述符) 对
    pub fn get_dependent_modules(
        &self,
        module: &Arc<Module>,
    ) -> Vec<(Arc<Module>, Arc<DependencyDescriptor>)> {
        let modules = self.modules.read();
        let mut dependents = Vec::new();
        for candidate in modules.values() {
            for descriptor in candidate.dependencies() {
                let resolves = match descriptor.kind() {
                    DependencyKind::Name => descriptor.target() == module.name(),
                    DependencyKind::Ability => module.has_ability(descriptor.target()),
                };
                if resolves {
                    dependents.push((candidate.clone(), descriptor.clone()));
                }
            }
        }
        dependents
    }
}

impl Default for ModuleStore {
    fn default() -> Self {
        Self::new()
    }
}
