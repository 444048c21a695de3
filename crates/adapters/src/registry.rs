// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup-time engine registry.
//!
//! Immutable after construction. Each adapter is a compiled-in module
//! selected by id; there is no dynamic discovery.

use crate::engine::EngineAdapter;
use crate::engines::{
    AuggieAdapter, CodexAdapter, CopilotAdapter, CursorAdapter, OpencodeAdapter, VibeAdapter,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry id of the engine used when a step has no override.
pub const DEFAULT_ENGINE_ID: &str = "codex";

/// Immutable map from engine id to adapter.
#[derive(Clone)]
pub struct EngineRegistry {
    adapters: Arc<HashMap<&'static str, Arc<dyn EngineAdapter>>>,
}

impl EngineRegistry {
    /// Registry with every built-in adapter.
    pub fn with_builtin() -> Self {
        let mut adapters: HashMap<&'static str, Arc<dyn EngineAdapter>> = HashMap::new();
        for adapter in [
            Arc::new(CodexAdapter) as Arc<dyn EngineAdapter>,
            Arc::new(CursorAdapter),
            Arc::new(OpencodeAdapter),
            Arc::new(AuggieAdapter),
            Arc::new(CopilotAdapter),
            Arc::new(VibeAdapter),
        ] {
            adapters.insert(adapter.metadata().id, adapter);
        }
        Self {
            adapters: Arc::new(adapters),
        }
    }

    /// Registry from explicit adapters (tests).
    pub fn from_adapters(list: Vec<Arc<dyn EngineAdapter>>) -> Self {
        Self {
            adapters: Arc::new(
                list.into_iter()
                    .map(|a| (a.metadata().id, a))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn EngineAdapter>> {
        self.adapters.get(id).cloned()
    }

    /// Adapter for a step, falling back to the default engine.
    pub fn resolve(&self, engine: Option<&str>) -> Option<Arc<dyn EngineAdapter>> {
        self.get(engine.unwrap_or(DEFAULT_ENGINE_ID))
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.adapters.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
