use std::fmt::Debug;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::chunk::packed_array::PackedArray;
use crate::chunk::persist::{decode_array, encode_array, PersistedContainer};
use crate::chunk::{
    Position, AIR, BIOME_BITS, BIOME_EDGE, BLOCK_BITS, DEFAULT_BIOME, SECTION_BIOMES,
    SECTION_BLOCKS, SECTION_EDGE,
};
use crate::err::ChunkError;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{SizedProt, WriteProt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaletteKind {
    Blocks,
    Biomes,
}

impl PaletteKind {
    pub(crate) fn neutral(&self) -> u32 {
        match &self {
            PaletteKind::Blocks => AIR,
            PaletteKind::Biomes => DEFAULT_BIOME,
        }
    }

    pub(crate) fn container_length(&self) -> usize {
        match &self {
            PaletteKind::Blocks => SECTION_BLOCKS,
            PaletteKind::Biomes => SECTION_BIOMES,
        }
    }

    pub(crate) fn bits(&self) -> u8 {
        match &self {
            PaletteKind::Blocks => BLOCK_BITS,
            PaletteKind::Biomes => BIOME_BITS,
        }
    }

    fn section_edge(&self) -> i32 {
        match &self {
            PaletteKind::Blocks => SECTION_EDGE,
            PaletteKind::Biomes => BIOME_EDGE,
        }
    }

    /// Local index of a position already reduced to this container's grid.
    pub(crate) fn index(&self, position: Position) -> Option<usize> {
        let edge = self.section_edge();
        if !(0..edge).contains(&position.x)
            || !(0..edge).contains(&position.y)
            || !(0..edge).contains(&position.z)
        {
            return None;
        }
        match &self {
            PaletteKind::Blocks => {
                Some(((position.y << 8) | (position.z << 4) | position.x) as usize)
            }
            PaletteKind::Biomes => {
                Some(((position.y << 4) | (position.z << 2) | position.x) as usize)
            }
        }
    }
}

/// How a container stores its values.
///
/// `Packed` always uses the kind's fixed global bit width; there is no per-section palette.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum SectionEncoding {
    SingleValue(u32),
    Packed(PackedArray),
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct PalettedContainer {
    kind: PaletteKind,
    encoding: SectionEncoding,
}

impl PalettedContainer {
    pub(crate) fn new_blocks() -> Self {
        Self::single(PaletteKind::Blocks, AIR)
    }

    pub(crate) fn new_biomes() -> Self {
        Self::single(PaletteKind::Biomes, DEFAULT_BIOME)
    }

    pub(crate) fn single(kind: PaletteKind, value: u32) -> Self {
        Self {
            kind,
            encoding: SectionEncoding::SingleValue(value),
        }
    }

    pub(crate) fn kind(&self) -> PaletteKind {
        self.kind
    }

    pub(crate) fn encoding(&self) -> &SectionEncoding {
        &self.encoding
    }

    pub(crate) fn get(&self, index: usize) -> u32 {
        match &self.encoding {
            SectionEncoding::SingleValue(value) => *value,
            SectionEncoding::Packed(data) => data.get(index).unwrap_or_else(|| self.kind.neutral()),
        }
    }

    pub(crate) fn get_at(&self, position: Position) -> u32 {
        match self.kind.index(position) {
            Some(index) => self.get(index),
            None => self.kind.neutral(),
        }
    }

    /// Writes `value` at `index` and returns the value it replaced.
    ///
    /// A single-value container is promoted to a packed array on the first divergent write
    /// and never demoted again.
    pub(crate) fn set(&mut self, index: usize, value: u32) -> Result<u32, ChunkError> {
        let capacity = self.kind.container_length();
        let bits = self.kind.bits();
        if index >= capacity || value as u64 >= 1u64 << bits {
            return Err(ChunkError::OutOfRange {
                index,
                value,
                bits,
                capacity,
            });
        }
        match &mut self.encoding {
            SectionEncoding::SingleValue(current) if *current == value => Ok(value),
            SectionEncoding::SingleValue(current) => {
                let previous = *current;
                let mut data = PackedArray::filled(capacity, bits, previous)?;
                data.set(index, value)?;
                self.encoding = SectionEncoding::Packed(data);
                Ok(previous)
            }
            SectionEncoding::Packed(data) => {
                let previous = data.get(index).unwrap_or_else(|| self.kind.neutral());
                data.set(index, value)?;
                Ok(previous)
            }
        }
    }

    pub(crate) fn set_at(&mut self, position: Position, value: u32) -> Result<u32, ChunkError> {
        match self.kind.index(position) {
            Some(index) => self.set(index, value),
            None => Err(ChunkError::OutOfRange {
                index: usize::MAX,
                value,
                bits: self.kind.bits(),
                capacity: self.kind.container_length(),
            }),
        }
    }

    pub(crate) fn to_persisted(&self) -> PersistedContainer {
        match &self.encoding {
            SectionEncoding::SingleValue(value) => PersistedContainer::SingleValue { value: *value },
            SectionEncoding::Packed(data) => PersistedContainer::Packed {
                data: encode_array(data),
            },
        }
    }

    pub(crate) fn from_persisted(
        kind: PaletteKind,
        persisted: &PersistedContainer,
    ) -> Result<Self, ChunkError> {
        let encoding = match persisted {
            PersistedContainer::SingleValue { value } => {
                if *value as u64 >= 1u64 << kind.bits() {
                    return Err(ChunkError::Malformed(format!(
                        "{kind:?} value {value} exceeds {} bits",
                        kind.bits()
                    )));
                }
                SectionEncoding::SingleValue(*value)
            }
            PersistedContainer::Packed { data } => {
                let data = decode_array(data)?;
                if data.bits_per_value() != kind.bits()
                    || data.capacity() != kind.container_length()
                {
                    return Err(ChunkError::Malformed(format!(
                        "{kind:?} container must be {} x {} bits, got {} x {}",
                        kind.container_length(),
                        kind.bits(),
                        data.capacity(),
                        data.bits_per_value()
                    )));
                }
                SectionEncoding::Packed(data)
            }
        };
        Ok(Self { kind, encoding })
    }
}

impl Debug for PalettedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.encoding {
            SectionEncoding::SingleValue(value) => {
                write!(f, "kind: {:?}, single value: {}", self.kind, value)
            }
            SectionEncoding::Packed(data) => write!(f, "kind: {:?}, {:?}", self.kind, data),
        }
    }
}

#[async_trait]
impl WriteProt for PalettedContainer {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        match &self.encoding {
            SectionEncoding::SingleValue(value) => {
                0u8.write(stream).await?; // bits per value is 0 in this case
                VarInt::from(*value).write(stream).await?;
                VarInt::from(0).write(stream).await?; // empty long array
            }
            SectionEncoding::Packed(data) => {
                data.bits_per_value().write(stream).await?;
                data.write(stream).await?;
            }
        }
        Ok(())
    }
}

impl SizedProt for PalettedContainer {
    fn prot_size(&self) -> usize {
        match &self.encoding {
            SectionEncoding::SingleValue(value) => 1 + VarInt::from(*value).prot_size() + 1,
            SectionEncoding::Packed(data) => 1 + data.prot_size(),
        }
    }
}
