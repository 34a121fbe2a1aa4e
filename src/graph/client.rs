use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::Url;

use super::error::GraphError;
use super::store::{ChildrenPage, DriveStore, PageCursor};
use super::types::{Collection, Drive, DriveItem, IdOnly, RemoteItem, UploadSession};
use super::upload::ChunkRange;
use crate::auth::{AccessToken, TokenSource};

/// Children page size requested from Graph.
const PAGE_SIZE: u32 = 200;

/// Status codes on which a `$filter` name lookup falls back to listing.
const FILTER_FALLBACK_STATUSES: [u16; 4] = [400, 401, 403, 501];

/// Authenticated Graph v1.0 client.
///
/// Holds the current bearer token; on an HTTP 401 the token is refreshed once
/// through the [`TokenSource`] and the request is sent again.
pub struct GraphClient {
    http: Client,
    api: Url,
    token: RwLock<AccessToken>,
    source: Arc<dyn TokenSource>,
}

impl GraphClient {
    pub fn new(
        http: Client,
        api_root: &str,
        token: AccessToken,
        source: Arc<dyn TokenSource>,
    ) -> Result<Self, GraphError> {
        let api = Url::parse(api_root).map_err(|e| GraphError::Malformed {
            url: api_root.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            http,
            api,
            token: RwLock::new(token),
            source,
        })
    }

    /// Build an API URL from path segments, each percent-encoded.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, GraphError> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|()| GraphError::Malformed {
                url: self.api.to_string(),
                reason: "API root cannot carry a path".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> Result<String, GraphError> {
        {
            let token = self.token.read().await;
            if !token.is_expired() {
                return Ok(format!("Bearer {}", token.secret()));
            }
        }
        tracing::debug!("Access token expired, refreshing");
        self.refresh_bearer().await
    }

    async fn refresh_bearer(&self) -> Result<String, GraphError> {
        let fresh = self.source.refresh().await?;
        let header = format!("Bearer {}", fresh.secret());
        *self.token.write().await = fresh;
        Ok(header)
    }

    /// Send an authenticated request, refreshing the token once on 401.
    ///
    /// `build` is invoked per attempt since request bodies are consumed.
    async fn send<F>(&self, url: &str, build: F) -> Result<Response, GraphError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let bearer = self.bearer().await?;
        let response = dispatch(url, build(&self.http).header(AUTHORIZATION, bearer)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check(url, response).await;
        }

        tracing::info!("Graph returned 401, refreshing token and retrying once");
        let bearer = self.refresh_bearer().await?;
        let response = dispatch(url, build(&self.http).header(AUTHORIZATION, bearer)).await?;
        check(url, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GraphError> {
        let response = self.send(url, |c| c.get(url)).await?;
        parse_json(url, response).await
    }

    /// Resolve a site path such as `Marketing` or `teams/Ops` to its id.
    pub async fn resolve_site(&self, site: &str) -> Result<String, GraphError> {
        let mut segments = vec!["sites", "root:"];
        if !(site.starts_with("sites/") || site.starts_with("teams/")) {
            segments.push("sites");
        }
        segments.extend(site.split('/').filter(|s| !s.is_empty()));
        let url = self.url(segments)?;
        let site: IdOnly = self.get_json(url.as_str()).await?;
        Ok(site.id)
    }

    /// Find the document library named `library` on the site.
    pub async fn resolve_drive(&self, site_id: &str, library: &str) -> Result<String, GraphError> {
        let url = self.url(["sites", site_id, "drives"])?;
        let drives: Collection<Drive> = self.get_json(url.as_str()).await?;
        if let Some(drive) = drives.value.iter().find(|d| d.name == library) {
            return Ok(drive.id.clone());
        }
        let available: Vec<&str> = drives.value.iter().map(|d| d.name.as_str()).collect();
        Err(GraphError::NotFound(format!(
            "library '{}' (available: {})",
            library,
            available.join(", ")
        )))
    }

    /// Bind this client to one drive, producing the [`DriveStore`] the
    /// pipeline works against.
    pub fn into_drive(self, drive_id: String) -> DriveClient {
        DriveClient {
            graph: self,
            drive_id,
        }
    }
}

/// A single document library, addressed by drive id.
pub struct DriveClient {
    graph: GraphClient,
    drive_id: String,
}

impl DriveClient {
    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    fn item_url(&self, item_id: &str, action: Option<&str>) -> Result<Url, GraphError> {
        let mut segments = vec!["drives", self.drive_id.as_str(), "items", item_id];
        segments.extend(action);
        self.graph.url(segments)
    }

    /// `items/{parent}:/{name}:/{action}` path addressing.
    fn child_url(&self, parent_id: &str, name: &str, action: &str) -> Result<Url, GraphError> {
        let parent = format!("{}:", parent_id);
        let name = format!("{}:", name);
        let drive = self.drive_id.as_str();
        self.graph
            .url(["drives", drive, "items", parent.as_str(), name.as_str(), action])
    }

    /// Id of the drive root, or of the folder at `start_folder` beneath it.
    pub async fn resolve_start(&self, start_folder: &str) -> Result<String, GraphError> {
        let mut segments = vec!["drives", self.drive_id.as_str()];
        if start_folder.is_empty() {
            segments.push("root");
        } else {
            segments.push("root:");
            segments.extend(start_folder.split('/').filter(|s| !s.is_empty()));
        }
        let url = self.graph.url(segments)?;
        let item: IdOnly = match self.graph.get_json(url.as_str()).await {
            Err(e) if e.status() == Some(404) => {
                return Err(GraphError::NotFound(format!("folder '{}'", start_folder)))
            }
            other => other?,
        };
        Ok(item.id)
    }

    async fn exists_by_filter(&self, parent_id: &str, name: &str) -> Result<bool, GraphError> {
        let mut url = self.item_url(parent_id, Some("children"))?;
        let escaped = name.replace('\'', "''");
        url.query_pairs_mut()
            .append_pair("$filter", &format!("name eq '{}'", escaped))
            .append_pair("$select", "id,name");
        let page: Collection<DriveItem> = self.graph.get_json(url.as_str()).await?;
        Ok(page
            .value
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(name)))
    }

    async fn exists_by_listing(&self, parent_id: &str, name: &str) -> Result<bool, GraphError> {
        let mut url = self.item_url(parent_id, Some("children"))?;
        url.query_pairs_mut()
            .append_pair("$select", "id,name")
            .append_pair("$top", &PAGE_SIZE.to_string());
        let mut next = Some(url.to_string());
        while let Some(link) = next {
            let page: Collection<DriveItem> = self.graph.get_json(&link).await?;
            if page.value.iter().any(|i| i.name.eq_ignore_ascii_case(name)) {
                return Ok(true);
            }
            next = page.next_link;
        }
        Ok(false)
    }
}

#[async_trait::async_trait]
impl DriveStore for DriveClient {
    async fn list_page(&self, cursor: &PageCursor) -> Result<ChildrenPage, GraphError> {
        let url = match cursor {
            PageCursor::Children(id) => {
                let mut url = self.item_url(id, Some("children"))?;
                url.query_pairs_mut()
                    .append_pair("$top", &PAGE_SIZE.to_string());
                url.to_string()
            }
            PageCursor::Next(link) => link.clone(),
        };
        let page: Collection<DriveItem> = self.graph.get_json(&url).await?;
        Ok(ChildrenPage {
            items: page.value.into_iter().map(RemoteItem::from).collect(),
            next: page.next_link.map(PageCursor::Next),
        })
    }

    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>, GraphError> {
        if let Some(direct) = &item.download_url {
            match fetch_bytes(&self.graph.http, direct).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => tracing::debug!(
                    "Direct download of {} failed, using content endpoint: {}",
                    item.name,
                    e
                ),
            }
        }
        let url = self.item_url(&item.id, Some("content"))?;
        let url = url.as_str();
        let response = self.graph.send(url, |c| c.get(url)).await?;
        read_bytes(url, response).await
    }

    async fn child_exists(&self, parent_id: &str, name: &str) -> Result<bool, GraphError> {
        match self.exists_by_filter(parent_id, name).await {
            Err(e) if e.status().is_some_and(|s| FILTER_FALLBACK_STATUSES.contains(&s)) => {
                tracing::debug!("Name filter unsupported ({}), listing children instead", e);
                self.exists_by_listing(parent_id, name).await
            }
            other => other,
        }
    }

    async fn rename(&self, item_id: &str, new_name: &str) -> Result<(), GraphError> {
        let url = self.item_url(item_id, None)?;
        let url = url.as_str();
        let body = serde_json::json!({ "name": new_name });
        self.graph.send(url, |c| c.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn delete(&self, item_id: &str) -> Result<(), GraphError> {
        let url = self.item_url(item_id, None)?;
        let url = url.as_str();
        self.graph.send(url, |c| c.delete(url)).await?;
        Ok(())
    }

    async fn put_content(
        &self,
        parent_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), GraphError> {
        let url = self.child_url(parent_id, name, "content")?;
        let url = url.as_str();
        self.graph
            .send(url, |c| {
                c.put(url)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.to_vec())
            })
            .await?;
        Ok(())
    }

    async fn create_upload_session(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<String, GraphError> {
        let url = self.child_url(parent_id, name, "createUploadSession")?;
        let url = url.as_str();
        let body = serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        });
        let response = self.graph.send(url, |c| c.post(url).json(&body)).await?;
        let session: UploadSession = parse_json(url, response).await?;
        Ok(session.upload_url)
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        range: ChunkRange,
        total: u64,
        bytes: &[u8],
    ) -> Result<(), GraphError> {
        // Upload URLs are pre-authenticated; a bearer header is rejected.
        let request = self
            .graph
            .http
            .put(upload_url)
            .header(CONTENT_LENGTH, range.len())
            .header(CONTENT_RANGE, range.content_range(total))
            .body(bytes.to_vec());
        let response = dispatch(upload_url, request).await?;
        check(upload_url, response).await?;
        Ok(())
    }
}

async fn dispatch(url: &str, request: RequestBuilder) -> Result<Response, GraphError> {
    request.send().await.map_err(|source| GraphError::Http {
        url: url.to_string(),
        source,
    })
}

/// Pass successful responses through; turn anything else into a status error.
async fn check(url: &str, response: Response) -> Result<Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    Err(GraphError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        body,
        retry_after,
    })
}

async fn parse_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, GraphError> {
    response.json().await.map_err(|e| GraphError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

async fn read_bytes(url: &str, response: Response) -> Result<Vec<u8>, GraphError> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|source| GraphError::Http {
            url: url.to_string(),
            source,
        })
}

async fn fetch_bytes(http: &Client, url: &str) -> Result<Vec<u8>, GraphError> {
    let response = dispatch(url, http.get(url)).await?;
    let response = check(url, response).await?;
    read_bytes(url, response).await
}
