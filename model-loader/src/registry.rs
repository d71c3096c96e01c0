//! Adapter registry (C7, §4.7): selects the first adapter that can serve a model.

use crate::backend::Adapter;
use depot_values::Model;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    /// First adapter for which `can_handle(model)` holds, in registration order.
    pub fn find_for(&self, model: &Model) -> Option<Arc<dyn Adapter>> {
        self.adapters.iter().find(|a| a.can_handle(model)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use depot_values::{Capabilities, ModelType, Result};

    struct StubAdapter {
        formats: Vec<&'static str>,
        types: Vec<ModelType>,
        name: &'static str,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }
        fn supported_formats(&self) -> &[&str] {
            &self.formats
        }
        fn supported_types(&self) -> &[ModelType] {
            &self.types
        }
        async fn load(
            &self,
            _model: &Model,
            _params: &crate::backend::LoadParams,
        ) -> Result<Arc<dyn crate::backend::Backend>> {
            unimplemented!("not exercised in this test")
        }
    }

    fn model(format: &str, model_type: ModelType) -> Model {
        Model {
            id: "hf:a/b/c".into(),
            alias: None,
            name: "b".into(),
            description: None,
            version: None,
            registry: "hf".into(),
            repo_id: "a/b".into(),
            artifact_name: "c".into(),
            model_type,
            format: format.to_string(),
            capabilities: Capabilities::default(),
            size_in_bytes: 1,
            files: vec![],
            local_path: "/tmp".into(),
            created_at: None,
        }
    }

    #[test]
    fn selects_first_matching_adapter_by_format_and_type() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter {
            formats: vec!["gguf"],
            types: vec![ModelType::TextGeneration],
            name: "gguf-text",
        }));
        registry.register(Arc::new(StubAdapter {
            formats: vec!["gguf"],
            types: vec![ModelType::Embedding],
            name: "gguf-embed",
        }));

        let found = registry
            .find_for(&model("gguf", ModelType::Embedding))
            .unwrap();
        assert_eq!(found.name(), "gguf-embed");

        assert!(registry
            .find_for(&model("onnx", ModelType::TextGeneration))
            .is_none());
    }
}
