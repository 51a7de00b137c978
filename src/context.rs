//! 模块加载上下文
//!
//! 单次加载调用树内的链式上下文，只用于环路检测和回调继承

use crate::types::{ModuleName, OnModuleCallback};
use std::sync::Arc;

/// 加载上下文
///
/// 单向链表：每次递归依赖加载在父上下文上挂一个新节点。
/// 根上下文携带的加载回调沿链继承，对树内每个模块触发。
pub struct LoadContext {
    name: ModuleName,
    parent: Option<Arc<LoadContext>>,
    on_module: Option<OnModuleCallback>,
}

impl LoadContext {
    pub fn new(
        name: impl Into<String>,
        parent: Option<Arc<LoadContext>>,
        on_module: Option<OnModuleCallback>,
    ) -> Self {
        // 有父节点时继承它的回调，忽略传入值
        let on_module = match &parent {
            Some(parent) => parent.on_module.clone(),
            None => on_module,
        };
        Self {
            name: name.into(),
            parent,
            on_module,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_module(&self) -> Option<OnModuleCallback> {
        self.on_module.clone()
    }

    /// 检测环路：当前名称链中出现重复时返回完整环路路径
    ///
    /// 路径按加载顺序排列，首尾是同一个名称，例如 [a, b, a]。
    pub fn circular_loop(&self) -> Option<Vec<ModuleName>> {
        let mut names = vec![self.name.clone()];
        let mut current = self.parent.clone();
        while let Some(ctx) = current {
            if names.iter().any(|n| n == &ctx.name) {
                names.push(ctx.name.clone());
                names.reverse();
                return Some(names);
            }
            names.push(ctx.name.clone());
            current = ctx.parent.clone();
        }
        None
    }

    /// 从根到当前节点的加载路径
    pub fn load_path(&self) -> Vec<ModuleName> {
        let mut names = vec![self.name.clone()];
        let mut current = self.parent.clone();
        while let Some(ctx) = current {
            names.push(ctx.name.clone());
            current = ctx.parent.clone();
        }
        names.reverse();
        names
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("path", &self.load_path())
            .finish()
    }
}
