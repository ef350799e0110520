//! ExecutorRegistry - capability ごとの Executor の登録と管理
//!
//! # 使用例
//! ```ignore
//! let mut registry = ExecutorRegistry::new();
//! registry.register(Arc::new(site_builder))?;
//! let executor = registry.get(Capability::SiteBuild);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Capability;
use crate::ports::Executor;

/// RegistryError は ExecutorRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Executor for capability '{0}' is already registered")]
    AlreadyRegistered(Capability),
}

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<Capability, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) -> Result<(), RegistryError> {
        let capability = executor.capability();
        if self.executors.contains_key(&capability) {
            return Err(RegistryError::AlreadyRegistered(capability));
        }
        self.executors.insert(capability, executor);
        Ok(())
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn Executor>> {
        self.executors.get(&capability).cloned()
    }

    /// 登録済みの capability（順序は Capability の定義順）
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities: Vec<_> = self.executors.keys().copied().collect();
        capabilities.sort();
        capabilities
    }
}
