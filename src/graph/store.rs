use super::error::GraphError;
use super::types::RemoteItem;
use super::upload::ChunkRange;

/// Where the next listing page comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of a container's children.
    Children(String),
    /// Continuation link returned by the previous page.
    Next(String),
}

#[derive(Debug, Default)]
pub struct ChildrenPage {
    pub items: Vec<RemoteItem>,
    pub next: Option<PageCursor>,
}

/// Remote drive operations used by the walker and the image pipeline.
/// `DriveClient` is the production implementation.
#[async_trait::async_trait]
pub trait DriveStore: Send + Sync {
    async fn list_page(&self, cursor: &PageCursor) -> Result<ChildrenPage, GraphError>;

    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>, GraphError>;

    /// Whether `parent_id` already has a child called `name`.
    async fn child_exists(&self, parent_id: &str, name: &str) -> Result<bool, GraphError>;

    async fn rename(&self, item_id: &str, new_name: &str) -> Result<(), GraphError>;

    async fn delete(&self, item_id: &str) -> Result<(), GraphError>;

    /// Single-request upload, for payloads below the session threshold.
    async fn put_content(&self, parent_id: &str, name: &str, bytes: &[u8])
        -> Result<(), GraphError>;

    /// Create a resumable upload session, returning its upload URL.
    async fn create_upload_session(&self, parent_id: &str, name: &str)
        -> Result<String, GraphError>;

    async fn put_chunk(
        &self,
        upload_url: &str,
        range: ChunkRange,
        total: u64,
        bytes: &[u8],
    ) -> Result<(), GraphError>;
}
