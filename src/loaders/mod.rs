//! 可插拔模块加载器
//!
//! 加载器按注册顺序组成责任链：产出模块、声明放弃或报错（视同放弃）

use crate::module::Module;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// 模块加载器契约
///
/// `Ok(Some(module))` 产出模块并终止链条；`Ok(None)` 放弃，轮到下一个；
/// `Err` 被记录后视同放弃。
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// 加载器名称，用于日志
    fn name(&self) -> &str;

    /// 尝试按名称定位模块
    async fn load(&self, module_name: &str) -> Result<Option<Arc<Module>>>;
}

/// 代码加载器 - 包装一个进程内构造的具体模块实例
pub struct CodeLoader {
    label: String,
    module: Arc<Module>,
}

impl CodeLoader {
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            label: format!("code loader of {}", module.name()),
            module,
        }
    }
}

#[async_trait]
impl ModuleLoader for CodeLoader {
    fn name(&self) -> &str {
        &self.label
    }

    async fn load(&self, module_name: &str) -> Result<Option<Arc<Module>>> {
        if module_name != self.module.name() {
            return Ok(None);
        }
        Ok(Some(self.module.clone()))
    }
}

/// 注册表加载器 - 宿主预填充的名称到模块映射
#[derive(Default)]
pub struct RegistryLoader {
    modules: RwLock<HashMap<String, Arc<Module>>>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入一个模块；同名覆盖
    pub fn insert(&self, module: Arc<Module>) {
        let name = module.name().to_string();
        trace!("RegistryLoader.insert({})", name);
        self.modules.write().insert(name, module);
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }
}

#[async_trait]
impl ModuleLoader for RegistryLoader {
    fn name(&self) -> &str {
        "registry loader"
    }

    async fn load(&self, module_name: &str) -> Result<Option<Arc<Module>>> {
        Ok(self.modules.read().get(module_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LIB_STATE;

    fn module(name: &str) -> Arc<Module> {
        Arc::new(
            Module::builder(name)
                .handler(LIB_STATE, |_deps, _bound| async { Ok(None) })
                .build(),
        )
    }

    #[tokio::test]
    async fn test_code_loader_matches_only_its_module() {
        let loader = CodeLoader::new(module("module1"));
        assert_eq!(loader.name(), "code loader of module1");
        assert!(loader.load("module1").await.unwrap().is_some());
        assert!(loader.load("module2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registry_loader_lookup() {
        let loader = RegistryLoader::new();
        assert!(loader.is_empty());
        loader.insert(module("module1"));
        loader.insert(module("module2"));
        assert_eq!(loader.len(), 2);
        assert!(loader.load("module2").await.unwrap().is_some());
        assert!(loader.load("module3").await.unwrap().is_none());
    }
}
