use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::fs;
use uuid::Uuid;

use crate::chunk::column::Chunk;
use crate::chunk::persist::PersistedChunk;
use crate::err::StorageError;
use crate::storage::{DimensionConfig, StorageProvider, WorldFile};

/// JSON files under one directory: `<world>.json` holds the dimension list and every chunk lives
/// in `<dimension uuid>/<x>,<z>.json`.
pub(crate) struct FsWorldStorage {
    path: PathBuf,
}

impl FsWorldStorage {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn world_file(&self, world: &str) -> PathBuf {
        self.path.join(format!("{world}.json"))
    }

    fn chunk_file(&self, dimension: Uuid, x: i32, z: i32) -> PathBuf {
        self.path
            .join(dimension.to_string())
            .join(format!("{x},{z}.json"))
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Written next to the target and renamed over it so a crash never leaves half a file.
async fn write_replace(path: &Path, contents: Vec<u8>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl StorageProvider for FsWorldStorage {
    async fn load_dimensions(&self, world: &str) -> Result<Vec<DimensionConfig>, StorageError> {
        match read_optional(&self.world_file(world)).await? {
            Some(contents) => Ok(serde_json::from_str::<WorldFile>(&contents)?.dimensions),
            None => Ok(vec![]),
        }
    }

    async fn save_dimensions(
        &self,
        world: &str,
        dimensions: &[DimensionConfig],
    ) -> Result<(), StorageError> {
        let file = WorldFile {
            dimensions: dimensions.to_vec(),
        };
        write_replace(&self.world_file(world), serde_json::to_vec_pretty(&file)?).await
    }

    async fn load_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
    ) -> Result<Option<Chunk>, StorageError> {
        let Some(contents) = read_optional(&self.chunk_file(dimension, x, z)).await? else {
            return Ok(None);
        };
        let persisted: PersistedChunk = serde_json::from_str(&contents)?;
        Ok(Some(Chunk::from_persisted(&persisted)?))
    }

    async fn save_chunk(
        &self,
        dimension: Uuid,
        x: i32,
        z: i32,
        chunk: PersistedChunk,
    ) -> Result<(), StorageError> {
        let path = self.chunk_file(dimension, x, z);
        write_replace(&path, serde_json::to_vec(&chunk)?).await?;
        debug!("Saved chunk {x},{z} to {}", path.display());
        Ok(())
    }

    async fn exists_chunk(&self, dimension: Uuid, x: i32, z: i32) -> Result<bool, StorageError> {
        match fs::metadata(self.chunk_file(dimension, x, z)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
