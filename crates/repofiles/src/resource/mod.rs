//! Resource lifecycle exposed to an orchestration engine.
//!
//! Each resource kind implements [`Resource`]: typed `create`, `read`,
//! `update`, `delete` and `import` over a serde record. The [`Provider`]
//! registers the kinds by type name and speaks JSON records at its boundary.
//!
//! # Module Structure
//!
//! - [`repository_files`] - `gitlab_repository_files`, a file set committed atomically
//! - [`repository_file`] - `gitlab_repository_file`, one file via the per-file endpoints
//! - [`provider`] - The dispatch table

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::reconcile::ActionPlan;

mod error;
pub mod provider;
pub mod repository_file;
pub mod repository_files;

pub use error::ResourceError;
pub use provider::Provider;
pub use repository_file::{FileRecord, RepositoryFile};
pub use repository_files::RepositoryFiles;

/// Lifecycle operations of one resource kind.
///
/// `read` and `import` return `Ok(None)` when the remote object is gone, so
/// the orchestrator can drop it from state.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Configuration and state record.
    type Record: Serialize + DeserializeOwned + Send + Sync;

    /// Name the orchestrator uses for this kind.
    const TYPE_NAME: &'static str;

    /// Changes `create` or `update` would make, without making them.
    async fn plan(
        &self,
        prior: Option<&Self::Record>,
        config: &Self::Record,
    ) -> Result<ActionPlan, ResourceError>;

    async fn create(&self, config: &Self::Record) -> Result<Self::Record, ResourceError>;

    async fn read(&self, state: &Self::Record) -> Result<Option<Self::Record>, ResourceError>;

    async fn update(
        &self,
        prior: &Self::Record,
        config: &Self::Record,
    ) -> Result<Self::Record, ResourceError>;

    async fn delete(&self, state: &Self::Record) -> Result<(), ResourceError>;

    async fn import(&self, id: &str) -> Result<Option<Self::Record>, ResourceError>;
}

/// Reject a change to an identity field.
pub(crate) fn check_immutable(
    field: &'static str,
    old: &Option<String>,
    new: &Option<String>,
) -> Result<(), ResourceError> {
    match (old, new) {
        (Some(old), Some(new)) if old != new => Err(ResourceError::ImmutableField {
            field,
            old: old.clone(),
            new: new.clone(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_immutable() {
        let main = Some("main".to_string());
        assert!(check_immutable("branch", &main, &main.clone()).is_ok());
        assert!(check_immutable("branch", &None, &main).is_ok());

        let err = check_immutable("branch", &main, &Some("dev".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "branch cannot change from \"main\" to \"dev\"");
    }
}
