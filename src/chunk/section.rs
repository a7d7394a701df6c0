use async_trait::async_trait;
use tokio::io::AsyncWrite;

use voxelcraft_derive::{SizedProt, WriteProt};

use crate::chunk::palette::{PaletteKind, PalettedContainer};
use crate::chunk::{BlockState, Position, AIR, SECTION_BLOCKS};
use crate::err::ChunkError;
use crate::protocol_types::traits::{SizedProt, WriteProt};

/// One 16x16x16 slab of a column plus its 4x4x4 biome grid.
///
/// On the wire a section is its non-air block count followed by both containers.
#[derive(Debug, Clone, PartialEq, Eq, SizedProt, WriteProt)]
pub(crate) struct ChunkSection {
    block_count: i16,
    block_states: PalettedContainer,
    biomes: PalettedContainer,
}

impl ChunkSection {
    pub(crate) fn new() -> ChunkSection {
        ChunkSection {
            block_count: 0,
            block_states: PalettedContainer::new_blocks(),
            biomes: PalettedContainer::new_biomes(),
        }
    }

    /// Rebuilds a section from decoded containers; the block count is recomputed.
    pub(crate) fn from_containers(
        block_states: PalettedContainer,
        biomes: PalettedContainer,
    ) -> Result<ChunkSection, ChunkError> {
        if block_states.kind() != PaletteKind::Blocks || biomes.kind() != PaletteKind::Biomes {
            return Err(ChunkError::Malformed("section containers have the wrong kind".into()));
        }
        let block_count = (0..SECTION_BLOCKS)
            .filter(|i| block_states.get(*i) != AIR)
            .count() as i16;
        Ok(ChunkSection {
            block_count,
            block_states,
            biomes,
        })
    }

    pub(crate) fn block_count(&self) -> i16 {
        self.block_count
    }

    pub(crate) fn block_states(&self) -> &PalettedContainer {
        &self.block_states
    }

    pub(crate) fn biomes(&self) -> &PalettedContainer {
        &self.biomes
    }

    pub(crate) fn get_block(&self, pos: Position) -> BlockState {
        self.block_states.get_at(pos)
    }

    pub(crate) fn set_block(&mut self, pos: Position, block: BlockState) -> Result<(), ChunkError> {
        let previous = self.block_states.set_at(pos, block)?;
        if previous == AIR && block != AIR {
            self.block_count += 1;
        } else if previous != AIR && block == AIR {
            self.block_count -= 1;
        }
        Ok(())
    }

    /// `pos` is in biome cells (0..4 on every axis).
    pub(crate) fn get_biome(&self, pos: Position) -> u32 {
        self.biomes.get_at(pos)
    }

    pub(crate) fn set_biome(&mut self, pos: Position, biome: u32) -> Result<(), ChunkError> {
        self.biomes.set_at(pos, biome).map(|_| ())
    }
}

impl Default for ChunkSection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::palette::SectionEncoding;

    #[test]
    fn block_count_tracks_air() {
        let mut section = ChunkSection::new();
        section.set_block(Position::new(1, 1, 1), 5).unwrap();
        section.set_block(Position::new(2, 1, 1), 5).unwrap();
        section.set_block(Position::new(2, 1, 1), 6).unwrap();
        assert_eq!(section.block_count(), 2);
        section.set_block(Position::new(1, 1, 1), AIR).unwrap();
        assert_eq!(section.block_count(), 1);
        assert_eq!(section.get_block(Position::new(2, 1, 1)), 6);
    }

    #[test]
    fn biomes_are_independent_of_blocks() {
        let mut section = ChunkSection::new();
        section.set_biome(Position::new(1, 2, 3), 4).unwrap();
        assert_eq!(section.get_biome(Position::new(1, 2, 3)), 4);
        assert_eq!(section.get_biome(Position::new(0, 0, 0)), 0);
        assert!(matches!(section.block_states().encoding(), SectionEncoding::SingleValue(AIR)));
    }

    #[test]
    fn from_containers_recounts_blocks() {
        let mut section = ChunkSection::new();
        for x in 0..16 {
            section.set_block(Position::new(x, 0, 0), 1).unwrap();
        }
        let rebuilt =
            ChunkSection::from_containers(section.block_states().clone(), section.biomes().clone())
                .unwrap();
        assert_eq!(rebuilt.block_count(), 16);
        assert_eq!(rebuilt, section);
    }

    #[tokio::test]
    async fn empty_section_wire_form() -> Result<(), String> {
        let section = ChunkSection::new();
        let mut buf = vec![];
        section.write(&mut buf).await?;
        assert_eq!(buf, vec![0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(section.prot_size(), buf.len());
        Ok(())
    }
}
