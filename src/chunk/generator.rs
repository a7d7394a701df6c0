use crate::chunk::column::Chunk;
use crate::chunk::{
    BlockState, Position, BEDROCK, DEFAULT_MIN_Y, DEFAULT_WORLD_HEIGHT, MAX_LIGHT, SECTION_EDGE,
    STONE,
};
use crate::err::ChunkError;

/// Produces a column for a key that storage has nothing for.
pub(crate) trait ChunkGenerator: Send + Sync {
    fn generate(&self, chunk_x: i32, chunk_z: i32) -> Result<Chunk, ChunkError>;
}

/// Flat placeholder terrain: a stack of uniform layers starting at `base_y`, with full sky light
/// on the layer just above the top one.
#[derive(Debug, Clone)]
pub(crate) struct FlatGenerator {
    min_y: i32,
    world_height: i32,
    base_y: i32,
    layers: Vec<BlockState>,
    propagate_light: bool,
}

impl FlatGenerator {
    pub(crate) fn new(min_y: i32, world_height: i32, base_y: i32, layers: Vec<BlockState>) -> Self {
        Self {
            min_y,
            world_height,
            base_y,
            layers,
            propagate_light: false,
        }
    }

    pub(crate) fn with_light_propagation(mut self, propagate: bool) -> Self {
        self.propagate_light = propagate;
        self
    }
}

impl Default for FlatGenerator {
    /// Bedrock at y = 0 with one layer of stone on top.
    fn default() -> Self {
        Self::new(DEFAULT_MIN_Y, DEFAULT_WORLD_HEIGHT, 0, vec![BEDROCK, STONE])
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, _chunk_x: i32, _chunk_z: i32) -> Result<Chunk, ChunkError> {
        let mut chunk = Chunk::new(self.min_y, self.world_height);
        let sky_y = self.base_y + self.layers.len() as i32;
        for x in 0..SECTION_EDGE {
            for z in 0..SECTION_EDGE {
                for (i, block) in self.layers.iter().enumerate() {
                    chunk.set_block(Position::new(x, self.base_y + i as i32, z), *block)?;
                }
                chunk.set_sky_light(Position::new(x, sky_y, z), MAX_LIGHT)?;
            }
        }
        if self.propagate_light {
            chunk.propagate_skylight()?;
        }
        Ok(chunk)
    }
}
