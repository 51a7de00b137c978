//! Modulant 主程序 - 配置驱动运行
//!
//! 通过YAML配置文件组装一个小型模块化应用并分阶段拉起

use anyhow::Context;
use modulant::{
    downcast_interface, generate_default_config_file, init_logging, DependencyDescriptor, Module,
    ModuleInterface, ModuleManager, RuntimeConfig, StateConfig, LIB_STATE,
};
use std::env;
use std::sync::Arc;

/// 程序入口点
#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("run failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// 主要逻辑函数
async fn run_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_with_config(default_config()).await,
        2 => {
            let command = &args[1];
            match command.as_str() {
                "init" => {
                    generate_default_config_file("modulant.yaml")
                        .context("failed to generate default config")?;
                    println!("Generated default config: modulant.yaml");
                    Ok(())
                }
                path => {
                    let config = RuntimeConfig::from_yaml_file(path)
                        .with_context(|| format!("failed to load config from {}", path))?;
                    run_with_config(config).await
                }
            }
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn default_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.states = vec![
        StateConfig {
            name: "construct".to_string(),
            prerequisites: vec![LIB_STATE.to_string()],
        },
        StateConfig {
            name: "serve".to_string(),
            prerequisites: vec!["construct".to_string()],
        },
    ];
    config
}

/// 用两个演示模块组装并拉起应用
async fn run_with_config(config: RuntimeConfig) -> anyhow::Result<()> {
    init_logging(&config.logging);
    tracing::info!("starting runtime '{}'", config.runtime.name);

    let manager = ModuleManager::with_config(config);

    manager.register_module(storage_module()).await?;
    manager.register_module(web_module()).await?;

    let outcome = manager.fire("serve", "web").await?;
    tracing::info!("'web' reached 'serve' (result present: {})", outcome.is_some());
    Ok(())
}

/// 存储演示模块：声明 storage 能力
fn storage_module() -> Module {
    Module::builder("storage")
        .ability("app.storage")
        .description("in-memory key/value store")
        .handler(LIB_STATE, |_deps, _bound| async {
            tracing::info!("storage: lib constructed");
            Ok(Some(Arc::new(StorageLib::default()) as ModuleInterface))
        })
        .handler("construct", |_deps, _bound| async {
            tracing::info!("storage: constructed");
            Ok(None)
        })
        .handler("serve", |_deps, _bound| async {
            tracing::info!("storage: serving");
            Ok(None)
        })
        .build()
}

/// Web演示模块：按能力依赖存储
fn web_module() -> Module {
    Module::builder("web")
        .dependency(DependencyDescriptor::ability("app.storage", "storage"))
        .description("demo web frontend")
        .handler(LIB_STATE, |deps, _bound| async move {
            let storage = deps.get_as::<StorageLib>("storage");
            tracing::info!("web: lib constructed (storage present: {})", storage.is_some());
            Ok(Some(Arc::new(WebLib) as ModuleInterface))
        })
        .handler("construct", |_deps, _bound| async {
            tracing::info!("web: constructed");
            Ok(None)
        })
        .handler("serve", |deps, _bound| async move {
            let storage = deps.get_as::<StorageLib>("storage");
            tracing::info!("web: serving (storage present: {})", storage.is_some());
            Ok(None)
        })
        .build()
}

#[derive(Default)]
struct StorageLib;

struct WebLib;

fn print_usage() {
    println!("Usage:");
    println!("  modulant              run with the built-in demo config");
    println!("  modulant init         generate modulant.yaml");
    println!("  modulant <config>     run with the given YAML config");
}
