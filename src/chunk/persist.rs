use base64::engine::general_purpose;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::chunk::packed_array::PackedArray;
use crate::err::ChunkError;

/// Stored form of one block or biome container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PersistedContainer {
    SingleValue { value: u32 },
    /// base64 of [`PackedArray::serialize`]
    Packed { data: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PersistedLight {
    pub(crate) slot: usize,
    pub(crate) data: String,
}

/// Stored form of a whole column. Files written before light was persisted simply lack the
/// light fields and decode as unlit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedChunk {
    pub(crate) min_y: i32,
    pub(crate) world_height: i32,
    pub(crate) sections: Vec<Option<PersistedContainer>>,
    pub(crate) biomes: Vec<Option<PersistedContainer>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) sky_light: Vec<PersistedLight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) block_light: Vec<PersistedLight>,
}

pub(crate) fn encode_array(array: &PackedArray) -> String {
    general_purpose::STANDARD.encode(array.serialize())
}

pub(crate) fn decode_array(data: &str) -> Result<PackedArray, ChunkError> {
    let bytes = general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ChunkError::Malformed(format!("bad base64: {e}")))?;
    PackedArray::deserialize(&bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn container_json_shape() {
        let single = serde_json::to_value(PersistedContainer::SingleValue { value: 7 }).unwrap();
        assert_eq!(single, serde_json::json!({ "type": "single_value", "value": 7 }));
    }

    #[test]
    fn chunk_without_light_fields_decodes() {
        let json = r#"{
            "minY": -64,
            "worldHeight": 32,
            "sections": [{ "type": "single_value", "value": 0 }, null],
            "biomes": [null, null]
        }"#;
        let chunk: PersistedChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.min_y, -64);
        assert_eq!(chunk.sections.len(), 2);
        assert!(chunk.sky_light.is_empty());
        assert!(chunk.block_light.is_empty());
    }

    #[test]
    fn array_blob_round_trips() {
        let mut array = PackedArray::new(4096, 4);
        array.set(4095, 9).unwrap();
        let back = decode_array(&encode_array(&array)).unwrap();
        assert_eq!(back, array);
        assert!(decode_array("not base64!").is_err());
    }
}
