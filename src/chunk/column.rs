use std::collections::VecDeque;

use async_nbt::{NbtCompound, NbtTag};

use crate::chunk::light::LightStore;
use crate::chunk::packed_array::PackedArray;
use crate::chunk::palette::{PaletteKind, PalettedContainer};
use crate::chunk::persist::{decode_array, encode_array, PersistedChunk, PersistedLight};
use crate::chunk::section::ChunkSection;
use crate::chunk::{BlockState, Position, AIR, SECTION_EDGE};
use crate::err::ChunkError;
use crate::protocol_types::traits::{SizedProt, WriteProt};

const HEIGHTMAP_ENTRIES: usize = 256;

/// A full-height column of sections with its sky and block light.
///
/// x and z are column-local and taken modulo 16; y is absolute. Block and biome accesses outside
/// `min_y..min_y + world_height` read as air and writes there are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    min_y: i32,
    world_height: i32,
    sections: Vec<ChunkSection>,
    sky_light: LightStore,
    block_light: LightStore,
}

impl Chunk {
    pub(crate) fn new(min_y: i32, world_height: i32) -> Chunk {
        let num_sections = (world_height.max(0) >> 4) as usize;
        Chunk {
            min_y,
            world_height: num_sections as i32 * SECTION_EDGE,
            sections: vec![ChunkSection::new(); num_sections],
            sky_light: LightStore::new(min_y, num_sections),
            block_light: LightStore::new(min_y, num_sections),
        }
    }

    pub(crate) fn min_y(&self) -> i32 {
        self.min_y
    }

    pub(crate) fn world_height(&self) -> i32 {
        self.world_height
    }

    pub(crate) fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub(crate) fn sections(&self) -> &[ChunkSection] {
        &self.sections
    }

    pub(crate) fn sky_light_store(&self) -> &LightStore {
        &self.sky_light
    }

    pub(crate) fn block_light_store(&self) -> &LightStore {
        &self.block_light
    }

    fn section_index(&self, y: i32) -> Option<usize> {
        let index = (y - self.min_y) >> 4;
        if index < 0 || index as usize >= self.sections.len() {
            None
        } else {
            Some(index as usize)
        }
    }

    fn section_local(&self, pos: Position) -> Position {
        Position::new(pos.x & 15, (pos.y - self.min_y) & 15, pos.z & 15)
    }

    fn biome_local(&self, pos: Position) -> Position {
        let local = self.section_local(pos);
        Position::new(local.x >> 2, local.y >> 2, local.z >> 2)
    }

    pub(crate) fn get_block(&self, pos: Position) -> BlockState {
        match self.section_index(pos.y) {
            Some(i) => self.sections[i].get_block(self.section_local(pos)),
            None => AIR,
        }
    }

    pub(crate) fn set_block(&mut self, pos: Position, block: BlockState) -> Result<(), ChunkError> {
        let local = self.section_local(pos);
        match self.section_index(pos.y) {
            Some(i) => self.sections[i].set_block(local, block),
            None => Ok(()),
        }
    }

    pub(crate) fn get_biome(&self, pos: Position) -> u32 {
        match self.section_index(pos.y) {
            Some(i) => self.sections[i].get_biome(self.biome_local(pos)),
            None => PaletteKind::Biomes.neutral(),
        }
    }

    pub(crate) fn set_biome(&mut self, pos: Position, biome: u32) -> Result<(), ChunkError> {
        let local = self.biome_local(pos);
        match self.section_index(pos.y) {
            Some(i) => self.sections[i].set_biome(local, biome),
            None => Ok(()),
        }
    }

    pub(crate) fn sky_light(&self, pos: Position) -> u8 {
        self.sky_light.get(pos)
    }

    pub(crate) fn set_sky_light(&mut self, pos: Position, level: u8) -> Result<(), ChunkError> {
        self.sky_light.set(pos, level)
    }

    pub(crate) fn block_light(&self, pos: Position) -> u8 {
        self.block_light.get(pos)
    }

    pub(crate) fn set_block_light(&mut self, pos: Position, level: u8) -> Result<(), ChunkError> {
        self.block_light.set(pos, level)
    }

    /// Spreads sky light through this column only; light never crosses into neighbours.
    pub(crate) fn propagate_skylight(&mut self) -> Result<(), ChunkError> {
        relax(&mut self.sky_light, self.min_y, self.world_height)
    }

    pub(crate) fn propagate_block_light(&mut self) -> Result<(), ChunkError> {
        relax(&mut self.block_light, self.min_y, self.world_height)
    }

    /// Height above `min_y` of the topmost non-air block, 0 for an empty column.
    fn surface_height(&self, x: i32, z: i32) -> u32 {
        for (i, section) in self.sections.iter().enumerate().rev() {
            if section.block_count() == 0 {
                continue;
            }
            for y in (0..SECTION_EDGE).rev() {
                if section.get_block(Position::new(x, y, z)) != AIR {
                    return (i as i32 * SECTION_EDGE + y + 1) as u32;
                }
            }
        }
        0
    }

    /// One entry per (x, z), indexed `z * 16 + x`, wide enough to hold `world_height`.
    pub(crate) fn heightmap(&self) -> Result<PackedArray, ChunkError> {
        let bits = (32 - (self.world_height as u32).leading_zeros()).max(1) as u8;
        let mut map = PackedArray::new(HEIGHTMAP_ENTRIES, bits);
        for z in 0..SECTION_EDGE {
            for x in 0..SECTION_EDGE {
                map.set((z * SECTION_EDGE + x) as usize, self.surface_height(x, z))?;
            }
        }
        Ok(map)
    }

    /// Both heightmaps the client expects. Without block properties to tell them apart,
    /// MOTION_BLOCKING and WORLD_SURFACE are the same surface.
    pub(crate) fn heightmaps(&self) -> Result<NbtCompound, ChunkError> {
        let words: Vec<i64> = self.heightmap()?.words().iter().map(|w| *w as i64).collect();
        let mut compound = NbtCompound::new();
        compound.insert("MOTION_BLOCKING", NbtTag::LongArray(words.clone()));
        compound.insert("WORLD_SURFACE", NbtTag::LongArray(words));
        Ok(compound)
    }

    /// Every section in ascending order, each as block count, block states and biomes.
    pub(crate) async fn dump(&self) -> Result<Vec<u8>, String> {
        let mut buf = Vec::with_capacity(self.sections.iter().map(|s| s.prot_size()).sum());
        for section in &self.sections {
            section.write(&mut buf).await?;
        }
        Ok(buf)
    }

    pub(crate) fn to_persisted(&self) -> PersistedChunk {
        PersistedChunk {
            min_y: self.min_y,
            world_height: self.world_height,
            sections: self
                .sections
                .iter()
                .map(|s| Some(s.block_states().to_persisted()))
                .collect(),
            biomes: self
                .sections
                .iter()
                .map(|s| Some(s.biomes().to_persisted()))
                .collect(),
            sky_light: persist_light(&self.sky_light),
            block_light: persist_light(&self.block_light),
        }
    }

    pub(crate) fn from_persisted(data: &PersistedChunk) -> Result<Chunk, ChunkError> {
        if data.world_height <= 0 || data.world_height % SECTION_EDGE != 0 {
            return Err(ChunkError::Malformed(format!(
                "world height {} is not a positive multiple of {SECTION_EDGE}",
                data.world_height
            )));
        }
        let mut chunk = Chunk::new(data.min_y, data.world_height);
        let expected = chunk.num_sections();
        if data.sections.len() != expected || data.biomes.len() != expected {
            return Err(ChunkError::Malformed(format!(
                "expected {expected} sections and biomes, got {} and {}",
                data.sections.len(),
                data.biomes.len()
            )));
        }
        for (i, (blocks, biomes)) in data.sections.iter().zip(&data.biomes).enumerate() {
            let blocks = match blocks {
                Some(p) => PalettedContainer::from_persisted(PaletteKind::Blocks, p)?,
                None => PalettedContainer::new_blocks(),
            };
            let biomes = match biomes {
                Some(p) => PalettedContainer::from_persisted(PaletteKind::Biomes, p)?,
                None => PalettedContainer::new_biomes(),
            };
            chunk.sections[i] = ChunkSection::from_containers(blocks, biomes)?;
        }
        for light in &data.sky_light {
            chunk.sky_light.set_slot(light.slot, decode_array(&light.data)?)?;
        }
        for light in &data.block_light {
            chunk.block_light.set_slot(light.slot, decode_array(&light.data)?)?;
        }
        Ok(chunk)
    }
}

fn persist_light(store: &LightStore) -> Vec<PersistedLight> {
    store
        .present_slots()
        .map(|(slot, data)| PersistedLight {
            slot,
            data: encode_array(data),
        })
        .collect()
}

fn in_column(pos: Position, min_y: i32, world_height: i32) -> bool {
    (0..SECTION_EDGE).contains(&pos.x)
        && (0..SECTION_EDGE).contains(&pos.z)
        && (min_y..min_y + world_height).contains(&pos.y)
}

/// Breadth-first relaxation. Cells may be queued more than once; levels only ever rise toward
/// `source - distance`, so the queue drains.
fn relax(store: &mut LightStore, min_y: i32, world_height: i32) -> Result<(), ChunkError> {
    let mut queue = VecDeque::new();
    for x in 0..SECTION_EDGE {
        for z in 0..SECTION_EDGE {
            for y in min_y..min_y + world_height {
                let pos = Position::new(x, y, z);
                if store.get(pos) > 0 {
                    queue.push_back(pos);
                }
            }
        }
    }

    while let Some(pos) = queue.pop_front() {
        let level = store.get(pos) as i32;
        for neighbor in pos.neighbors() {
            if !in_column(neighbor, min_y, world_height) {
                continue;
            }
            if (store.get(neighbor) as i32) < level - 1 {
                store.set(neighbor, (level - 1) as u8)?;
                queue.push_back(neighbor);
            }
        }
    }
    Ok(())
}
