use core::fmt::Display;

use async_nbt::NbtCompound;
use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWrite;

use voxelcraft_derive::{SizedProt, WriteProt, WriteProtPacket};

use crate::chunk::column::Chunk;
use crate::chunk::light::LightStore;
use crate::err::ProtError;
use crate::protocol_types::compound::BitSet;
use crate::protocol_types::primitives::{SizedVec, VarInt};
use crate::protocol_types::traits::{ClientPacket, SizedProt, WriteProt};
use crate::world::window::ChunkPos;
use crate::{packet, packet_base};

packet!(
    PlayKeepAlive 0x24 {
        id: i64,
    }
);

packet!(
    UnloadChunk 0x1d {
        chunk_x: i32,
        chunk_z: i32,
    }
);

packet!(
    SetCenterChunk 0x49 {
        chunk_x: VarInt,
        chunk_z: VarInt,
    }
);

packet!(
    ChunkDataAndUpdateLight 0x22 {
        chunk_x: i32,
        chunk_z: i32,
        heightmaps: NbtCompound,
        data: SizedVec<u8>,
        block_entity_count: VarInt,
        trust_edges: bool,
        light: LightData,
    }
);

/// Light section of a chunk packet: the four masks, then one array per slot the presence mask
/// marks, in slot order.
#[derive(Debug, Clone, PartialEq, SizedProt, WriteProt)]
pub(crate) struct LightData {
    pub(crate) sky_light_mask: BitSet,
    pub(crate) block_light_mask: BitSet,
    pub(crate) empty_sky_light_mask: BitSet,
    pub(crate) empty_block_light_mask: BitSet,
    pub(crate) sky_lights: SizedVec<SizedVec<u8>>,
    pub(crate) block_lights: SizedVec<SizedVec<u8>>,
}

fn light_arrays(store: &LightStore) -> SizedVec<SizedVec<u8>> {
    store
        .present_slots()
        .map(|(_, data)| SizedVec::from(data.to_le_bytes()))
        .collect::<Vec<_>>()
        .into()
}

impl LightData {
    pub(crate) fn from_chunk(chunk: &Chunk) -> Self {
        let sky = chunk.sky_light_store();
        let block = chunk.block_light_store();
        Self {
            sky_light_mask: BitSet::from_words(sky.has_data_mask().words()),
            block_light_mask: BitSet::from_words(block.has_data_mask().words()),
            empty_sky_light_mask: BitSet::from_words(sky.empty_mask().words()),
            empty_block_light_mask: BitSet::from_words(block.empty_mask().words()),
            sky_lights: light_arrays(sky),
            block_lights: light_arrays(block),
        }
    }
}

impl ChunkDataAndUpdateLight {
    pub(crate) async fn from_chunk(pos: ChunkPos, chunk: &Chunk) -> Result<Self, ProtError> {
        let heightmaps = chunk
            .heightmaps()
            .map_err(|e| ProtError::Any(e.to_string()))?;
        Ok(Self::new(
            pos.x,
            pos.z,
            heightmaps,
            chunk.dump().await?.into(),
            VarInt::from(0),
            false,
            LightData::from_chunk(chunk),
        ))
    }
}

#[derive(Debug, WriteProtPacket)]
pub(crate) enum ClientPackets {
    PlayKeepAlive(PlayKeepAlive),
    UnloadChunk(UnloadChunk),
    SetCenterChunk(SetCenterChunk),
    ChunkDataAndUpdateLight(ChunkDataAndUpdateLight),
}

impl Display for ClientPackets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientPackets::PlayKeepAlive(p) => Display::fmt(p, f),
            ClientPackets::UnloadChunk(p) => Display::fmt(p, f),
            ClientPackets::SetCenterChunk(p) => Display::fmt(p, f),
            ClientPackets::ChunkDataAndUpdateLight(p) => write!(f, "{p} ({},{})", p.chunk_x, p.chunk_z),
        }
    }
}
