pub mod bridge;

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::Result;
use crate::netpool::NetPool;

/// 网络插件能力：给定容器 ID 与进程 PID，接通网络并返回分配的地址
pub trait NetPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn setup(&self, container_id: &str, pid: i32) -> Result<String>;
}

/// 显式的插件注册表
///
/// 进程启动时由初始化例程构建并传给 Supervisor，不依赖加载期的
/// 自注册副作用。按名查找，未注册 = 不配网络，而非错误。
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn NetPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn NetPlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&dyn NetPlugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }
}

/// 构建内置插件集
pub fn builtin_registry(pool: Arc<NetPool>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(bridge::BridgePlugin::new(pool)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contains_bridge() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = Arc::new(NetPool::new(tmp.path().join("netpool.json")));
        let registry = builtin_registry(pool);
        assert!(registry.get("bridge0").is_some());
        assert!(registry.get("nope").is_none());
    }
}
