use std::sync::Arc;

use log::{info, warn};
use voxelcraft_lib::web::dto;

use crate::chunk::generator::FlatGenerator;
use crate::err::StorageError;
use crate::storage::{DimensionConfig, StorageProvider};
use crate::world::dimension::DimensionHandle;
use crate::world::visibility::{ChunkVisibilityManager, VisibilityConfig};

pub(crate) mod dimension;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod visibility;
pub(crate) mod window;

pub(crate) const DEFAULT_DIMENSION: &str = "overworld";

/// The running dimensions of one world.
pub(crate) struct World {
    name: String,
    dimensions: Vec<DimensionHandle>,
}

impl World {
    /// Loads the world's dimension list, creating and persisting an overworld if there is none,
    /// and starts one actor per dimension.
    pub(crate) async fn init(
        name: impl Into<String>,
        storage: Arc<dyn StorageProvider>,
        config: VisibilityConfig,
    ) -> Result<World, StorageError> {
        let name = name.into();
        let mut configs = storage.load_dimensions(&name).await?;
        if configs.is_empty() {
            let overworld = DimensionConfig::generate(DEFAULT_DIMENSION);
            info!("Creating dimension {} ({}) in world {name}", overworld.name, overworld.uuid);
            configs.push(overworld);
            storage.save_dimensions(&name, &configs).await?;
        }

        let dimensions = configs
            .into_iter()
            .map(|dimension| {
                info!("Starting dimension {} ({})", dimension.name, dimension.uuid);
                let manager = ChunkVisibilityManager::new(
                    dimension.uuid,
                    config.clone(),
                    storage.clone(),
                    Arc::new(FlatGenerator::default()),
                );
                DimensionHandle::spawn(dimension, manager)
            })
            .collect();
        Ok(World { name, dimensions })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Where new players spawn.
    pub(crate) fn default_dimension(&self) -> Option<&DimensionHandle> {
        self.dimensions
            .iter()
            .find(|d| d.name() == DEFAULT_DIMENSION)
            .or_else(|| self.dimensions.first())
    }

    pub(crate) async fn tick(&self) {
        for dimension in &self.dimensions {
            if let Err(e) = dimension.tick().await {
                warn!("Could not tick {}: {e}", dimension.name());
            }
        }
    }

    pub(crate) async fn autosave(&self) {
        for dimension in &self.dimensions {
            if let Err(e) = dimension.autosave().await {
                warn!("Could not autosave {}: {e}", dimension.name());
            }
        }
    }

    pub(crate) async fn stats(&self) -> Vec<dto::DimensionStats> {
        let mut stats = vec![];
        for dimension in &self.dimensions {
            match dimension.stats().await {
                Ok(s) => stats.push(s),
                Err(e) => warn!("No stats for {}: {e}", dimension.name()),
            }
        }
        stats
    }

    /// Saves and stops every dimension.
    pub(crate) async fn shutdown(&self) {
        for dimension in &self.dimensions {
            match dimension.shutdown().await {
                Ok(summary) if summary.failed > 0 => warn!(
                    "{} chunks of {} ({}) could not be saved",
                    summary.failed,
                    dimension.name(),
                    dimension.uuid()
                ),
                Ok(_) => {}
                Err(e) => warn!("Could not shut down {}: {e}", dimension.name()),
            }
        }
        info!("World {} saved", self.name);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[tokio::test]
    async fn fresh_world_gets_a_persisted_overworld() -> Result<(), StorageError> {
        let storage = Arc::new(MemoryStorage::new());
        let world = World::init("world", storage.clone(), VisibilityConfig::default()).await?;

        let stored = storage.load_dimensions("world").await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, DEFAULT_DIMENSION);
        let dimension = world.default_dimension().unwrap();
        assert_eq!(dimension.uuid(), stored[0].uuid);

        let stats = world.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].uuid, stored[0].uuid.to_string());
        assert_eq!(stats[0].seed, stored[0].seed);
        world.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn existing_dimensions_are_reused() -> Result<(), StorageError> {
        let storage = Arc::new(MemoryStorage::new());
        let nether = DimensionConfig::generate("nether");
        let overworld = DimensionConfig::generate(DEFAULT_DIMENSION);
        storage
            .save_dimensions("world", &[nether.clone(), overworld.clone()])
            .await?;

        let world = World::init("world", storage.clone(), VisibilityConfig::default()).await?;
        assert_eq!(world.default_dimension().unwrap().uuid(), overworld.uuid);
        assert_eq!(world.stats().await.len(), 2);
        assert_eq!(storage.load_dimensions("world").await?.len(), 2);
        world.shutdown().await;
        Ok(())
    }
}
