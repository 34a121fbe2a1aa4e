//! In-memory drive used by walker, upload and pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::error::GraphError;
use super::store::{ChildrenPage, DriveStore, PageCursor};
use super::types::RemoteItem;
use super::upload::ChunkRange;

pub const ROOT_ID: &str = "root";
const ROOT_PATH: &str = "/drives/d/root:";

/// A mutating call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Rename { id: String, new_name: String },
    Delete { id: String },
    PutContent { parent_id: String, name: String, len: usize },
    CreateSession { parent_id: String, name: String },
    PutChunk { start: u64, end: u64, total: u64 },
}

#[derive(Default)]
struct State {
    children: HashMap<String, Vec<RemoteItem>>,
    folder_paths: HashMap<String, String>,
    contents: HashMap<String, Vec<u8>>,
    calls: Vec<Call>,
    downloads: usize,
    next_id: usize,
    chunks_sent: usize,
    fail_chunk_at: Option<usize>,
    failing_uploads: HashSet<String>,
    failing_lists: HashSet<String>,
    failing_deletes: bool,
}

pub struct MockDrive {
    state: Mutex<State>,
    page_size: usize,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::with_page_size(200)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let mut state = State::default();
        state
            .folder_paths
            .insert(ROOT_ID.to_string(), ROOT_PATH.to_string());
        Self {
            state: Mutex::new(state),
            page_size,
        }
    }

    fn parent_path(state: &State, parent_id: &str) -> String {
        state
            .folder_paths
            .get(parent_id)
            .cloned()
            .unwrap_or_else(|| ROOT_PATH.to_string())
    }

    pub fn add_folder(&self, parent_id: &str, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let parent_path = Self::parent_path(&state, parent_id);
        let own_path = format!("{}/{}", parent_path, name);
        state.folder_paths.insert(id.to_string(), own_path);
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(RemoteItem {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent_id.to_string(),
                parent_path,
                size: 0,
                mime_type: None,
                is_folder: true,
                download_url: None,
            });
    }

    pub fn add_file(&self, parent_id: &str, id: &str, name: &str, mime: Option<&str>, bytes: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        let parent_path = Self::parent_path(&state, parent_id);
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(RemoteItem {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent_id.to_string(),
                parent_path,
                size: bytes.len() as u64,
                mime_type: mime.map(str::to_string),
                is_folder: false,
                download_url: None,
            });
        state.contents.insert(id.to_string(), bytes);
    }

    pub fn fail_chunk_at(&self, index: usize) {
        self.state.lock().unwrap().fail_chunk_at = Some(index);
    }

    /// Make every upload (small or session) targeting `name` fail.
    pub fn fail_uploads_named(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(name.to_string());
    }

    pub fn fail_listing_of(&self, parent_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_lists
            .insert(parent_id.to_string());
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().failing_deletes = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn downloads(&self) -> usize {
        self.state.lock().unwrap().downloads
    }

    /// Current child names of a container, in insertion order.
    pub fn names_in(&self, parent_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .children
            .get(parent_id)
            .map(|items| items.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored bytes of the child `name` under `parent_id`.
    pub fn content_of(&self, parent_id: &str, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let item = state
            .children
            .get(parent_id)?
            .iter()
            .find(|i| i.name == name)?;
        state.contents.get(&item.id).cloned()
    }

    fn server_error(what: &str) -> GraphError {
        GraphError::Status {
            status: 500,
            url: format!("mock://{}", what),
            body: "injected failure".into(),
            retry_after: None,
        }
    }

    fn store_upload(state: &mut State, parent_id: &str, name: &str, bytes: Vec<u8>) {
        state.next_id += 1;
        let id = format!("uploaded-{}", state.next_id);
        let parent_path = Self::parent_path(state, parent_id);
        let siblings = state.children.entry(parent_id.to_string()).or_default();
        siblings.retain(|i| !i.name.eq_ignore_ascii_case(name));
        siblings.push(RemoteItem {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
            parent_path,
            size: bytes.len() as u64,
            mime_type: None,
            is_folder: false,
            download_url: None,
        });
        state.contents.insert(id, bytes);
    }
}

#[async_trait::async_trait]
impl DriveStore for MockDrive {
    async fn list_page(&self, cursor: &PageCursor) -> Result<ChildrenPage, GraphError> {
        let state = self.state.lock().unwrap();
        let (parent_id, offset) = match cursor {
            PageCursor::Children(id) => (id.clone(), 0),
            PageCursor::Next(link) => {
                let (id, offset) = link.rsplit_once('|').ok_or_else(|| GraphError::Malformed {
                    url: link.clone(),
                    reason: "bad mock cursor".into(),
                })?;
                (id.to_string(), offset.parse().unwrap_or(0))
            }
        };
        if state.failing_lists.contains(&parent_id) {
            return Err(Self::server_error("list"));
        }
        let all = state.children.get(&parent_id).cloned().unwrap_or_default();
        let end = (offset + self.page_size).min(all.len());
        let items = all[offset.min(end)..end].to_vec();
        let next = (end < all.len()).then(|| PageCursor::Next(format!("{}|{}", parent_id, end)));
        Ok(ChildrenPage { items, next })
    }

    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>, GraphError> {
        let mut state = self.state.lock().unwrap();
        state.downloads += 1;
        state
            .contents
            .get(&item.id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(item.id.clone()))
    }

    async fn child_exists(&self, parent_id: &str, name: &str) -> Result<bool, GraphError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .children
            .get(parent_id)
            .is_some_and(|items| items.iter().any(|i| i.name.eq_ignore_ascii_case(name))))
    }

    async fn rename(&self, item_id: &str, new_name: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Rename {
            id: item_id.to_string(),
            new_name: new_name.to_string(),
        });
        for items in state.children.values_mut() {
            if let Some(item) = items.iter_mut().find(|i| i.id == item_id) {
                item.name = new_name.to_string();
                return Ok(());
            }
        }
        Err(GraphError::NotFound(item_id.to_string()))
    }

    async fn delete(&self, item_id: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            id: item_id.to_string(),
        });
        if state.failing_deletes {
            return Err(Self::server_error("delete"));
        }
        for items in state.children.values_mut() {
            items.retain(|i| i.id != item_id);
        }
        state.contents.remove(item_id);
        Ok(())
    }

    async fn put_content(
        &self,
        parent_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PutContent {
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            len: bytes.len(),
        });
        if state.failing_uploads.contains(name) {
            return Err(Self::server_error("put"));
        }
        Self::store_upload(&mut state, parent_id, name, bytes.to_vec());
        Ok(())
    }

    async fn create_upload_session(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<String, GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateSession {
            parent_id: parent_id.to_string(),
            name: name.to_string(),
        });
        if state.failing_uploads.contains(name) {
            return Err(Self::server_error("session"));
        }
        Ok(format!("mock-upload://{}/{}", parent_id, name))
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        range: ChunkRange,
        total: u64,
        bytes: &[u8],
    ) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PutChunk {
            start: range.start,
            end: range.end,
            total,
        });
        assert_eq!(bytes.len() as u64, range.len());
        let index = state.chunks_sent;
        state.chunks_sent += 1;
        if state.fail_chunk_at == Some(index) {
            return Err(Self::server_error("chunk"));
        }
        if range.end == total {
            let target = upload_url.trim_start_matches("mock-upload://");
            if let Some((parent_id, name)) = target.split_once('/') {
                let (parent_id, name) = (parent_id.to_string(), name.to_string());
                Self::store_upload(&mut state, &parent_id, &name, Vec::new());
            }
        }
        Ok(())
    }
}
