//! Modulant 核心数据类型
//!
//! 模块运行时共享的名称别名、接口类型和处理器签名

use crate::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// 基础名称类型
pub type ModuleName = String;
pub type StateName = String;
pub type AbilityName = String;
pub type TimestampNs = i64;

/// 根状态名 - 所有其他状态的隐式前置状态
pub const LIB_STATE: &str = "lib";

/// 模块对外接口 - "lib" 状态产出的不透明接口，消费方自行向下转型
pub type ModuleInterface = Arc<dyn Any + Send + Sync>;

/// 状态处理器的产出 - "lib" 状态产出接口，其他状态可以为空
pub type StateOutcome = Option<ModuleInterface>;

/// 依赖查询 - 按别名解析已就绪依赖的接口，永不阻塞
///
/// 交给状态处理器和状态回调的轻量句柄，可克隆，可在处理器执行的
/// 任意时刻探测可选或晚到的依赖。
#[derive(Clone)]
pub struct DependencyLookup {
    inner: Arc<dyn Fn(&str) -> Option<ModuleInterface> + Send + Sync>,
}

impl DependencyLookup {
    pub fn new(lookup: impl Fn(&str) -> Option<ModuleInterface> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(lookup),
        }
    }

    /// 按别名查询依赖的 "lib" 接口；未解析或未达成返回 None
    pub fn get(&self, alias: &str) -> Option<ModuleInterface> {
        (*self.inner)(alias)
    }

    /// 查询并向下转型
    pub fn get_as<T: Send + Sync + 'static>(&self, alias: &str) -> Option<Arc<T>> {
        self.get(alias).and_then(downcast_interface::<T>)
    }
}

impl std::fmt::Debug for DependencyLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DependencyLookup")
    }
}

/// 状态处理器 - 接收依赖查询函数和绑定接口（"lib" 状态为 None）
pub type StateHandler = Arc<
    dyn Fn(DependencyLookup, Option<ModuleInterface>) -> BoxFuture<'static, Result<StateOutcome>>
        + Send
        + Sync,
>;

/// 依赖描述符上注册的状态回调
pub type StateCallback = Arc<
    dyn Fn(DependencyLookup, Option<ModuleInterface>) -> BoxFuture<'static, Result<()>>
        + Send
        + Sync,
>;

/// 模块加载完成回调 - 在加载调用树的根部注册，对树内每个模块触发
pub type OnModuleCallback = Arc<dyn Fn(&str, Arc<crate::module::Module>) + Send + Sync>;

/// 依赖声明的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// 按精确模块名解析
    Name,
    /// 按抽象能力标签解析
    Ability,
}

/// 单个 (模块, 状态) 的履约状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    /// 未触发
    Unfired,
    /// 处理器执行中
    Pending,
    /// 已完成
    Fulfilled,
    /// 已失败
    Failed,
}

/// 将不透明接口向下转型为具体类型
pub fn downcast_interface<T: Send + Sync + 'static>(interface: ModuleInterface) -> Option<Arc<T>> {
    interface.downcast::<T>().ok()
}

/// 当前时间戳（纳秒）
pub fn now_ns() -> TimestampNs {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
