use std::ops::Range;

use beat_store::{BlockKind, ContentStore, FileNode};
use bytes::Bytes;
use futures::stream::{self, Stream, TryStreamExt};

use crate::error::{TreeError, TreeResult};

/// Streaming reader over one file version.
///
/// The length is known up front and any byte range can be read without
/// touching chunks outside it, so callers can serve partial content and never
/// need to hold the whole file in memory.
#[derive(Clone, Debug)]
pub struct FileReader {
    store: ContentStore,
    node: FileNode,
}

impl FileReader {
    pub(crate) fn new(store: ContentStore, node: FileNode) -> Self {
        Self { store, node }
    }

    /// Total file length in bytes.
    pub fn len(&self) -> u64 {
        self.node.size
    }

    pub fn is_empty(&self) -> bool {
        self.node.size == 0
    }

    /// Read one chunk by index.
    pub fn chunk(&self, index: usize) -> TreeResult<Bytes> {
        let id = self
            .node
            .chunks
            .get(index)
            .ok_or_else(|| TreeError::NotFound(format!("chunk {index}")))?;
        let block = self
            .store
            .blocks()
            .read(id)?
            .ok_or(TreeError::Unavailable(*id))?;
        if block.kind != BlockKind::Chunk {
            return Err(beat_store::StoreError::CorruptBlock {
                id: *id,
                reason: format!("expected chunk, got {}", block.kind),
            }
            .into());
        }
        Ok(Bytes::from(block.data))
    }

    /// Stream the bytes in `range` (clamped to the file length), one chunk
    /// slice at a time.
    pub fn stream(self, range: Range<u64>) -> impl Stream<Item = TreeResult<Bytes>> + Send {
        let end = range.end.min(self.node.size);
        let start = range.start.min(end);
        stream::try_unfold((self, start), move |(reader, pos)| async move {
            if pos >= end {
                return Ok(None);
            }
            let chunk_size = reader.node.chunk_size.max(1);
            let index = (pos / chunk_size) as usize;
            let chunk_start = index as u64 * chunk_size;
            let data = reader.chunk(index)?;
            let from = (pos - chunk_start) as usize;
            let to = ((end - chunk_start) as usize).min(data.len());
            if from >= to {
                return Err(TreeError::Store(beat_store::StoreError::CorruptBlock {
                    id: reader.node.chunks[index],
                    reason: "chunk shorter than its file node claims".into(),
                }));
            }
            let piece = data.slice(from..to);
            let next = pos + piece.len() as u64;
            Ok::<_, TreeError>(Some((piece, (reader, next))))
        })
    }

    /// Stream the whole file.
    pub fn stream_all(self) -> impl Stream<Item = TreeResult<Bytes>> + Send {
        let len = self.len();
        self.stream(0..len)
    }

    /// Read `range` into memory.
    pub async fn read_range(self, range: Range<u64>) -> TreeResult<Vec<u8>> {
        let mut out = Vec::with_capacity((range.end.saturating_sub(range.start)).min(self.len()) as usize);
        let mut chunks = std::pin::pin!(self.stream(range));
        while let Some(piece) = chunks.try_next().await? {
            out.extend_from_slice(&piece);
        }
        Ok(out)
    }

    /// Read the whole file into memory.
    pub async fn read_all(self) -> TreeResult<Vec<u8>> {
        let len = self.len();
        self.read_range(0..len).await
    }
}
