// Collaborator interfaces injected into the widget at mount time.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{FetchError, StoreError};
use crate::protocol::MenuRequest;
use crate::team::{CurrentTeamRecord, PersistedPreference, TeamList};

/// Remote source of the team list.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn fetch(&self) -> Result<TeamList, FetchError>;
}

/// Storage for the persisted "current team" preference.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// `Ok(None)` when nothing (or an empty record) is stored.
    async fn read(&self) -> Result<Option<PersistedPreference>, StoreError>;

    async fn write(&self, record: CurrentTeamRecord) -> Result<(), StoreError>;
}

/// One-way notification that the feed should show a different scope.
pub trait FeedScope: Send + Sync {
    fn notify(&self, scope_id: &str);
}

/// One-way request to open the auxiliary menu.
pub trait MenuChannel: Send + Sync {
    fn request(&self, request: MenuRequest);
}

/// One-way request to open a URL outside the widget.
pub trait ExternalOpener: Send + Sync {
    fn open_external(&self, url: &str);
}

/// Target of the "Create a Team" entry and the opener that handles it.
pub struct CreateTeamLink {
    pub url: String,
    pub opener: Arc<dyn ExternalOpener>,
}

/// Feed sink and link opener used when no host bridge is attached: records
/// the request in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeed;

impl FeedScope for TracingFeed {
    fn notify(&self, scope_id: &str) {
        info!("Feed scope changed to {}", scope_id);
    }
}

impl ExternalOpener for TracingFeed {
    fn open_external(&self, url: &str) {
        info!("Open in browser: {}", url);
    }
}
