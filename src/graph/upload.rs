//! Upload routing: one PUT for small payloads, otherwise an upload session
//! fed sequential byte-range chunks.

use super::error::GraphError;
use super::store::DriveStore;

/// Payloads of this size or larger go through an upload session.
pub const CHUNKED_UPLOAD_THRESHOLD: usize = 3_900_000;

/// Chunk size for session uploads. Graph requires multiples of 320 KiB.
pub const UPLOAD_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Half-open byte range `[start, end)` of one upload chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `Content-Range` header value; HTTP ranges are inclusive.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end - 1, total)
    }
}

/// Split `total` bytes into contiguous chunks of at most `chunk_size`.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<ChunkRange> {
    debug_assert!(chunk_size > 0);
    let mut ranges = Vec::with_capacity(total.div_ceil(chunk_size) as usize);
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        ranges.push(ChunkRange { start, end });
        start = end;
    }
    ranges
}

/// Upload `bytes` as `parent_id/name`, replacing any existing item of that name.
///
/// Chunks are sent strictly in order; the first failing chunk aborts the
/// whole upload.
pub async fn upload(
    store: &dyn DriveStore,
    parent_id: &str,
    name: &str,
    bytes: &[u8],
) -> Result<(), GraphError> {
    if bytes.len() < CHUNKED_UPLOAD_THRESHOLD {
        return store.put_content(parent_id, name, bytes).await;
    }

    let upload_url = store.create_upload_session(parent_id, name).await?;
    let total = bytes.len() as u64;
    let ranges = chunk_ranges(total, UPLOAD_CHUNK_SIZE as u64);
    tracing::debug!("Uploading {} in {} chunks ({} bytes)", name, ranges.len(), total);
    for range in ranges {
        let piece = &bytes[range.start as usize..range.end as usize];
        store.put_chunk(&upload_url, range, total, piece).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mock::{Call, MockDrive};

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_chunk_ranges_six_over_five() {
        let ranges = chunk_ranges(6 * MB, 5 * MB);
        assert_eq!(
            ranges,
            vec![
                ChunkRange { start: 0, end: 5 * MB },
                ChunkRange { start: 5 * MB, end: 6 * MB },
            ]
        );
    }

    #[test]
    fn test_chunk_ranges_exact_multiple() {
        let ranges = chunk_ranges(10, 5);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1], ChunkRange { start: 5, end: 10 });
    }

    #[test]
    fn test_chunk_ranges_cover_without_gaps() {
        let total = 17 * MB + 123;
        let ranges = chunk_ranges(total, 5 * MB);
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, total);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(ranges.iter().map(ChunkRange::len).sum::<u64>(), total);
    }

    #[test]
    fn test_content_range_is_inclusive() {
        let r = ChunkRange { start: 5 * MB, end: 6 * MB };
        assert_eq!(r.content_range(6 * MB), "bytes 5242880-6291455/6291456");
    }

    #[test]
    fn test_chunk_ranges_empty() {
        assert!(chunk_ranges(0, 5).is_empty());
    }

    #[tokio::test]
    async fn test_small_payload_single_put() {
        let drive = MockDrive::new();
        upload(&drive, "P", "a_2k.jpg", &[7u8; 1000]).await.unwrap();
        assert_eq!(
            drive.calls(),
            vec![Call::PutContent {
                parent_id: "P".into(),
                name: "a_2k.jpg".into(),
                len: 1000
            }]
        );
    }

    #[tokio::test]
    async fn test_six_megabytes_two_sequential_chunks() {
        let drive = MockDrive::new();
        let payload = vec![1u8; 6 * MB as usize];
        upload(&drive, "P", "big_2k.tif", &payload).await.unwrap();
        assert_eq!(
            drive.calls(),
            vec![
                Call::CreateSession {
                    parent_id: "P".into(),
                    name: "big_2k.tif".into()
                },
                Call::PutChunk {
                    start: 0,
                    end: 5 * MB,
                    total: 6 * MB
                },
                Call::PutChunk {
                    start: 5 * MB,
                    end: 6 * MB,
                    total: 6 * MB
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_threshold_boundary_uses_session() {
        let drive = MockDrive::new();
        upload(&drive, "P", "x.png", &vec![0u8; CHUNKED_UPLOAD_THRESHOLD])
            .await
            .unwrap();
        assert!(matches!(drive.calls()[0], Call::CreateSession { .. }));
    }

    #[tokio::test]
    async fn test_failed_chunk_aborts_upload() {
        let drive = MockDrive::new();
        drive.fail_chunk_at(0);
        let payload = vec![1u8; 11 * MB as usize];
        let err = upload(&drive, "P", "big.jpg", &payload).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        let chunks = drive
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::PutChunk { .. }))
            .count();
        assert_eq!(chunks, 1);
    }
}
