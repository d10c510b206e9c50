//! Dispatch table from resource type names to implementations.
//!
//! Records cross this boundary as [`serde_json::Value`]; each call is a
//! self-contained message (configuration or state in, state or error out).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{RepositoryFile, RepositoryFiles, Resource, ResourceError};
use crate::reconcile::{ActionPlan, ProgressCallback};
use crate::store::RemoteFileStore;

/// Type-erased view of a [`Resource`].
#[async_trait]
trait ErasedResource: Send + Sync {
    async fn plan(&self, prior: Option<Value>, config: Value) -> Result<ActionPlan, ResourceError>;
    async fn create(&self, config: Value) -> Result<Value, ResourceError>;
    async fn read(&self, state: Value) -> Result<Option<Value>, ResourceError>;
    async fn update(&self, prior: Value, config: Value) -> Result<Value, ResourceError>;
    async fn delete(&self, state: Value) -> Result<(), ResourceError>;
    async fn import(&self, id: &str) -> Result<Option<Value>, ResourceError>;
}

#[async_trait]
impl<R: Resource> ErasedResource for R {
    async fn plan(&self, prior: Option<Value>, config: Value) -> Result<ActionPlan, ResourceError> {
        let prior: Option<R::Record> = prior.map(serde_json::from_value).transpose()?;
        let config: R::Record = serde_json::from_value(config)?;
        Resource::plan(self, prior.as_ref(), &config).await
    }

    async fn create(&self, config: Value) -> Result<Value, ResourceError> {
        let config: R::Record = serde_json::from_value(config)?;
        let state = Resource::create(self, &config).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn read(&self, state: Value) -> Result<Option<Value>, ResourceError> {
        let state: R::Record = serde_json::from_value(state)?;
        match Resource::read(self, &state).await? {
            Some(state) => Ok(Some(serde_json::to_value(state)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, prior: Value, config: Value) -> Result<Value, ResourceError> {
        let prior: R::Record = serde_json::from_value(prior)?;
        let config: R::Record = serde_json::from_value(config)?;
        let state = Resource::update(self, &prior, &config).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn delete(&self, state: Value) -> Result<(), ResourceError> {
        let state: R::Record = serde_json::from_value(state)?;
        Resource::delete(self, &state).await
    }

    async fn import(&self, id: &str) -> Result<Option<Value>, ResourceError> {
        match Resource::import(self, id).await? {
            Some(state) => Ok(Some(serde_json::to_value(state)?)),
            None => Ok(None),
        }
    }
}

/// Registered resource kinds.
pub struct Provider {
    resources: BTreeMap<&'static str, Box<dyn ErasedResource>>,
}

impl Provider {
    /// Provider with every built-in resource kind bound to `store`.
    pub fn new(store: Arc<dyn RemoteFileStore>) -> Self {
        Self::with_progress(store, None)
    }

    /// Like [`Provider::new`], reporting reconciliation progress to `on_progress`.
    pub fn with_progress(
        store: Arc<dyn RemoteFileStore>,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> Self {
        let mut provider = Self {
            resources: BTreeMap::new(),
        };
        provider.register(RepositoryFiles::new(Arc::clone(&store)).with_progress(on_progress));
        provider.register(RepositoryFile::new(store));
        provider
    }

    /// Add or replace a resource kind.
    pub fn register<R: Resource + 'static>(&mut self, resource: R) {
        self.resources.insert(R::TYPE_NAME, Box::new(resource));
    }

    /// Registered type names, sorted.
    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    fn resource(&self, type_name: &str) -> Result<&dyn ErasedResource, ResourceError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ResourceError::UnknownResource(type_name.to_string()))
    }

    pub async fn plan(
        &self,
        type_name: &str,
        prior: Option<Value>,
        config: Value,
    ) -> Result<ActionPlan, ResourceError> {
        debug!(resource = type_name, "plan");
        self.resource(type_name)?.plan(prior, config).await
    }

    pub async fn create(&self, type_name: &str, config: Value) -> Result<Value, ResourceError> {
        debug!(resource = type_name, "create");
        self.resource(type_name)?.create(config).await
    }

    pub async fn read(&self, type_name: &str, state: Value) -> Result<Option<Value>, ResourceError> {
        debug!(resource = type_name, "read");
        self.resource(type_name)?.read(state).await
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior: Value,
        config: Value,
    ) -> Result<Value, ResourceError> {
        debug!(resource = type_name, "update");
        self.resource(type_name)?.update(prior, config).await
    }

    pub async fn delete(&self, type_name: &str, state: Value) -> Result<(), ResourceError> {
        debug!(resource = type_name, "delete");
        self.resource(type_name)?.delete(state).await
    }

    pub async fn import(&self, type_name: &str, id: &str) -> Result<Option<Value>, ResourceError> {
        debug!(resource = type_name, id, "import");
        self.resource(type_name)?.import(id).await
    }
}
