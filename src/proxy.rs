//! 依赖代理
//!
//! 每个模块一个的别名到接口查询层，处理器通过它访问依赖的产出

use crate::module::Module;
use crate::store::ModuleStore;
use crate::types::{DependencyLookup, ModuleInterface};
use std::sync::Arc;

/// 模块的依赖代理
///
/// 纯查询：在调用时刻通过注册表解析别名对应的依赖，返回其已达成的
/// "lib" 接口，否则返回 None。永不阻塞，永不报错，处理器可以在执行的
/// 任意时刻安全地探测可选或晚到的依赖。
pub struct ModuleProxy {
    module: Arc<Module>,
    store: Arc<ModuleStore>,
}

impl ModuleProxy {
    pub fn new(module: Arc<Module>, store: Arc<ModuleStore>) -> Self {
        Self { module, store }
    }

    /// 按别名查询依赖的 "lib" 接口
    pub fn get(&self, alias: &str) -> Option<ModuleInterface> {
        let descriptor = self.module.find_dependency_by_alias(alias)?;
        let target = self.store.get_dependency(&descriptor)?;
        target.lib()
    }

    /// 可克隆的查询句柄，交给状态处理器和状态回调
    pub fn lookup(&self) -> DependencyLookup {
        let module = self.module.clone();
        let store = self.store.clone();
        DependencyLookup::new(move |alias: &str| {
            let descriptor = module.find_dependency_by_alias(alias)?;
            let target = store.get_dependency(&descriptor)?;
            target.lib()
        })
    }

    /// 当前时刻可以解析到的依赖模块（未解析的声明被跳过）
    pub fn dependency_modules(&self) -> Vec<Arc<Module>> {
        self.module
            .dependencies()
            .iter()
            .filter_map(|descriptor| self.store.get_dependency(descriptor))
            .collect()
    }
}
