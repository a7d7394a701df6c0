use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::chunk::column::Chunk;
use crate::chunk::persist::PersistedChunk;
use crate::err::StorageError;
use crate::storage::{DimensionConfig, StorageProvider};

type ChunkKey = (Uuid, i32, i32);

/// Keeps everything in process memory. Chunks are stored in their persisted form so loads go
/// through the same decoding as on disk.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    worlds: Mutex<HashMap<String, Vec<DimensionConfig>>>,
    chunks: Mutex<HashMap<ChunkKey, PersistedChunk>>,
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("memory storage lock poisoned".into())
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn stored(&self, dimension: Uuid, x: i32, z: i32) -> Option<PersistedChunk> {
        self.chunks
            .lock()
            .ok()
            .and_then(|chunks| chunks.get(&(dimension, x, z)).cloned())
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.lock().map(|chunks| chunks.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn load_dimensions(&self, world: &str) -> Result<Vec<DimensionConfig>, StorageError> {
        let worlds = self.worlds.lock().map_err(poisoned)?;
        Ok(worlds.get(world).cloned().unwrap_or_default())
    }

    async fn save_dimensions(
        &self,
        world: &str,
        dimensions: &[DimensionConfig],
    ) -> Result<(), StorageError> {
        let mut worlds = self.worlds.lock().map_err(poisoned)?;
        worlds.insert(world.to_string(), dimensions.to_vec());
        Ok(())
    }

    async fn load_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
    ) -> Result<Option<Chunk>, StorageError> {
        let persisted = {
            let chunks = self.chunks.lock().map_err(poisoned)?;
            chunks.get(&(dimension, x, z)).cloned()
        };
        match persisted {
            Some(p) => Ok(Some(Chunk::from_persisted(&p)?)),
            None => Ok(None),
        }
    }

    async fn save_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
        chunk: PersistedChunk,
    ) -> Result<(), StorageError> {
        let mut chunks = self.chunks.lock().map_err(poisoned)?;
        chunks.insert((dimension, x, z), chunk);
        Ok(())
    }

    async fn exists_chunk(&self, dimension: Uuid, x: i32, z: i32) -> Result<bool, StorageError> {
        let chunks = self.chunks.lock().map_err(poisoned)?;
        Ok(chunks.contains_key(&(dimension, x, z)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::generator::{ChunkGenerator, FlatGenerator};

    #[tokio::test]
    async fn chunks_are_keyed_by_dimension() {
        let storage = MemoryStorage::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let chunk = FlatGenerator::default().generate(1, 1).unwrap();
        storage.save_chunk(a, 1, 1, chunk.to_persisted()).await.unwrap();
        assert!(storage.exists_chunk(a, 1, 1).await.unwrap());
        assert!(!storage.exists_chunk(b, 1, 1).await.unwrap());
        assert_eq!(storage.load_chunk(a, 1, 1).await.unwrap(), Some(chunk));
        assert!(storage.load_chunk(b, 1, 1).await.unwrap().is_none());
        assert_eq!(storage.chunk_count(), 1);
    }

    #[tokio::test]
    async fn dimensions_are_keyed_by_world() {
        let storage = MemoryStorage::new();
        let dims = vec![DimensionConfig::generate("overworld")];
        storage.save_dimensions("world", &dims).await.unwrap();
        assert_eq!(storage.load_dimensions("world").await.unwrap(), dims);
        assert!(storage.load_dimensions("other").await.unwrap().is_empty());
    }
}
