use serde::Deserialize;

/// `driveItem` resource as returned by Graph listings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub parent_reference: Option<ItemReference>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub folder: Option<serde_json::Value>,
    #[serde(default, rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// One page of a `children` listing.
#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Drive {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct IdOnly {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
}

/// An entry of the remote tree, flattened for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    /// Graph parent path, e.g. `/drives/b!abc/root:/Photos/2024`.
    pub parent_path: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub is_folder: bool,
    /// Short-lived pre-authenticated content URL, if the listing carried one.
    pub download_url: Option<String>,
}

impl From<DriveItem> for RemoteItem {
    fn from(item: DriveItem) -> Self {
        let (parent_id, parent_path) = match item.parent_reference {
            Some(r) => (r.id.unwrap_or_default(), r.path.unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        Self {
            id: item.id,
            name: item.name,
            parent_id,
            parent_path,
            size: item.size,
            mime_type: item.file.and_then(|f| f.mime_type),
            is_folder: item.folder.is_some(),
            download_url: item.download_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_page_deserialize() {
        let json = r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#...",
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/drives/d/items/root/children?$skiptoken=abc",
            "value": [
                {
                    "id": "01FILE",
                    "name": "photo.JPG",
                    "size": 4194304,
                    "parentReference": {"id": "01PARENT", "path": "/drives/d/root:/Photos"},
                    "file": {"mimeType": "image/jpeg"},
                    "@microsoft.graph.downloadUrl": "https://tenant.sharepoint.com/download?x"
                },
                {
                    "id": "01FOLDER",
                    "name": "2024",
                    "parentReference": {"id": "01PARENT", "path": "/drives/d/root:/Photos"},
                    "folder": {"childCount": 3}
                }
            ]
        }"#;
        let page: Collection<DriveItem> = serde_json::from_str(json).unwrap();
        assert!(page.next_link.as_deref().unwrap().contains("skiptoken"));
        let items: Vec<RemoteItem> = page.value.into_iter().map(RemoteItem::from).collect();

        assert_eq!(items[0].name, "photo.JPG");
        assert_eq!(items[0].parent_id, "01PARENT");
        assert_eq!(items[0].parent_path, "/drives/d/root:/Photos");
        assert_eq!(items[0].mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(items[0].size, 4194304);
        assert!(!items[0].is_folder);
        assert!(items[0].download_url.is_some());

        assert!(items[1].is_folder);
        assert!(items[1].mime_type.is_none());
    }

    #[test]
    fn test_last_page_has_no_next_link() {
        let page: Collection<DriveItem> = serde_json::from_str(r#"{"value": []}"#).unwrap();
        assert!(page.next_link.is_none());
        assert!(page.value.is_empty());
    }

    #[test]
    fn test_upload_session_deserialize() {
        let json = r#"{"uploadUrl":"https://sn3302.up.1drv.com/up/fe6987415ace7X4e1eF866337","expirationDateTime":"2015-01-29T09:21:55.523Z"}"#;
        let session: UploadSession = serde_json::from_str(json).unwrap();
        assert!(session.upload_url.starts_with("https://sn3302"));
    }
}
