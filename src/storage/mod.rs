use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunk::column::Chunk;
use crate::chunk::persist::PersistedChunk;
use crate::err::StorageError;

pub(crate) mod fs;
pub(crate) mod memory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DimensionConfig {
    pub(crate) name: String,
    pub(crate) uuid: Uuid,
    pub(crate) seed: u64,
}

impl DimensionConfig {
    /// A fresh dimension with a random seed and id.
    pub(crate) fn generate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            seed: rand::random::<u64>(),
        }
    }
}

/// The dimension list of one world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WorldFile {
    pub(crate) dimensions: Vec<DimensionConfig>,
}

/// Where worlds keep their dimensions and chunks.
///
/// Missing data is `Ok(None)` or an empty list, never an error. A chunk that exists but cannot be
/// decoded is reported as [`StorageError::Malformed`].
#[async_trait]
pub(crate) trait StorageProvider: Send + Sync {
    async fn load_dimensions(&self, world: &str) -> Result<Vec<DimensionConfig>, StorageError>;

    async fn save_dimensions(
        &self,
        world: &str,
        dimensions: &[DimensionConfig],
    ) -> Result<(), StorageError>;

    async fn load_chunk(&self, dimension: Uuid, x: i32, z: i32)
        -> Result<Option<Chunk>, StorageError>;

    async fn save_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
        chunk: PersistedChunk,
    ) -> Result<(), StorageError>;

    async fn exists_chunk(&self, dimension: Uuid, x: i32, z: i32) -> Result<bool, StorageError>;
}
