use std::collections::VecDeque;

use futures_util::stream::{self, Stream};

use super::error::GraphError;
use super::store::{DriveStore, PageCursor};
use super::types::RemoteItem;
use crate::retry::{retry_with_backoff, RetryConfig};

struct WalkState {
    /// Containers whose listing has not started yet.
    stack: Vec<String>,
    buffered: VecDeque<RemoteItem>,
    cursor: Option<PageCursor>,
}

/// Lazily walk everything below `root_id`, depth-first.
///
/// Pages are fetched only as the consumer pulls items. Folders are yielded
/// like any other item and, when `recursive` is set, queued for listing once
/// the current container is exhausted. A failed page ends the stream with
/// that error; the walk cannot be resumed.
pub fn walk<'a>(
    store: &'a dyn DriveStore,
    root_id: &str,
    recursive: bool,
    retry: RetryConfig,
) -> impl Stream<Item = Result<RemoteItem, GraphError>> + 'a {
    let state = WalkState {
        stack: vec![root_id.to_string()],
        buffered: VecDeque::new(),
        cursor: None,
    };

    stream::try_unfold(state, move |mut state| async move {
        loop {
            if let Some(item) = state.buffered.pop_front() {
                if item.is_folder && recursive {
                    state.stack.push(item.id.clone());
                }
                return Ok(Some((item, state)));
            }

            let cursor = match state.cursor.take() {
                Some(cursor) => cursor,
                None => match state.stack.pop() {
                    Some(id) => PageCursor::Children(id),
                    None => return Ok(None),
                },
            };

            let page =
                retry_with_backoff(&retry, super::classify, || store.list_page(&cursor)).await?;
            tracing::debug!("Listed {} items ({:?})", page.items.len(), cursor);
            state.buffered.extend(page.items);
            state.cursor = page.next;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mock::{MockDrive, ROOT_ID};
    use futures_util::{StreamExt, TryStreamExt};

    fn tree() -> MockDrive {
        let drive = MockDrive::with_page_size(2);
        drive.add_file(ROOT_ID, "f1", "a.jpg", Some("image/jpeg"), vec![1]);
        drive.add_folder(ROOT_ID, "d1", "2023");
        drive.add_file(ROOT_ID, "f2", "b.txt", Some("text/plain"), vec![2]);
        drive.add_folder("d1", "d2", "Events");
        drive.add_file("d1", "f3", "c.png", Some("image/png"), vec![3]);
        drive.add_file("d2", "f4", "d.jpg", Some("image/jpeg"), vec![4]);
        drive
    }

    #[tokio::test]
    async fn test_recursive_walk_yields_all_descendants() {
        let drive = tree();
        let items: Vec<RemoteItem> = walk(&drive, ROOT_ID, true, RetryConfig::none())
            .try_collect()
            .await
            .unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        // Root is listed fully (across pages) before descending.
        assert_eq!(names, vec!["a.jpg", "2023", "b.txt", "Events", "c.png", "d.jpg"]);
    }

    #[tokio::test]
    async fn test_non_recursive_walk_stays_at_root() {
        let drive = tree();
        let items: Vec<RemoteItem> = walk(&drive, ROOT_ID, false, RetryConfig::none())
            .try_collect()
            .await
            .unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "2023", "b.txt"]);
    }

    #[tokio::test]
    async fn test_parent_paths_follow_tree() {
        let drive = tree();
        let items: Vec<RemoteItem> = walk(&drive, ROOT_ID, true, RetryConfig::none())
            .try_collect()
            .await
            .unwrap();
        let deep = items.iter().find(|i| i.name == "d.jpg").unwrap();
        assert_eq!(deep.parent_path, "/drives/d/root:/2023/Events");
        assert_eq!(deep.parent_id, "d2");
    }

    #[tokio::test]
    async fn test_empty_root() {
        let drive = MockDrive::new();
        let count = walk(&drive, ROOT_ID, true, RetryConfig::none())
            .count()
            .await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_listing_failure_surfaces_after_earlier_items() {
        let drive = tree();
        drive.fail_listing_of("d1");
        let results: Vec<Result<RemoteItem, GraphError>> =
            walk(&drive, ROOT_ID, true, RetryConfig::none()).collect().await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        assert!(results.last().unwrap().is_err());
    }
}
