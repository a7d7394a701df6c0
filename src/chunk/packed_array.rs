use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::err::ChunkError;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{SizedProt, WriteProt};

const WORD_BITS: usize = 64;
const HEADER_LEN: usize = 1 + 4 + 4;

/// Fixed-width unsigned integers packed into 64-bit words.
///
/// Values never straddle a word boundary: value `i` lives in word `i / (64 / bits)` at bit
/// offset `(i % (64 / bits)) * bits`, least significant bits first. The words are exactly what
/// goes over the wire (as big-endian longs) and into persisted blobs (as little-endian bytes).
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct PackedArray {
    bits_per_value: u8,
    capacity: usize,
    words: Vec<u64>,
}

fn word_count(capacity: usize, bits_per_value: u8) -> usize {
    let per_word = WORD_BITS / bits_per_value as usize;
    (capacity + per_word - 1) / per_word
}

impl PackedArray {
    pub(crate) fn new(capacity: usize, bits_per_value: u8) -> Self {
        assert!(
            (1..=32).contains(&bits_per_value),
            "bits per value must be within 1..=32, got {bits_per_value}"
        );
        Self {
            bits_per_value,
            capacity,
            words: vec![0; word_count(capacity, bits_per_value)],
        }
    }

    /// Creates an array where every slot holds `value`.
    pub(crate) fn filled(capacity: usize, bits_per_value: u8, value: u32) -> Result<Self, ChunkError> {
        let mut array = Self::new(capacity, bits_per_value);
        array.fill(value)?;
        Ok(array)
    }

    /// A 1-bit array with every slot set.
    pub(crate) fn ones(capacity: usize) -> Self {
        let mut array = Self::new(capacity, 1);
        for index in 0..capacity {
            array.words[index / 64] |= 1 << (index % 64);
        }
        array
    }

    /// Rebuilds an array around words produced by [`PackedArray::words`].
    pub(crate) fn from_words(
        capacity: usize,
        bits_per_value: u8,
        words: Vec<u64>,
    ) -> Result<Self, ChunkError> {
        if !(1..=32).contains(&bits_per_value) {
            return Err(ChunkError::Malformed(format!(
                "invalid bits per value {bits_per_value}"
            )));
        }
        let expected = word_count(capacity, bits_per_value);
        if words.len() != expected {
            return Err(ChunkError::Malformed(format!(
                "expected {expected} words for {capacity} {bits_per_value}-bit values, got {}",
                words.len()
            )));
        }
        Ok(Self {
            bits_per_value,
            capacity,
            words,
        })
    }

    fn values_per_word(&self) -> usize {
        WORD_BITS / self.bits_per_value as usize
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits_per_value) - 1
    }

    pub(crate) fn bits_per_value(&self) -> u8 {
        self.bits_per_value
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn max_value(&self) -> u32 {
        self.mask() as u32
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn size_in_bytes(&self) -> usize {
        self.words.len() * 8
    }

    pub(crate) fn get(&self, index: usize) -> Option<u32> {
        if index >= self.capacity {
            return None;
        }
        let per_word = self.values_per_word();
        let offset = (index % per_word) * self.bits_per_value as usize;
        Some(((self.words[index / per_word] >> offset) & self.mask()) as u32)
    }

    pub(crate) fn set(&mut self, index: usize, value: u32) -> Result<(), ChunkError> {
        if index >= self.capacity || value as u64 > self.mask() {
            return Err(ChunkError::OutOfRange {
                index,
                value,
                bits: self.bits_per_value,
                capacity: self.capacity,
            });
        }
        let per_word = self.values_per_word();
        let offset = (index % per_word) * self.bits_per_value as usize;
        let mask = self.mask();
        let word = &mut self.words[index / per_word];
        *word = (*word & !(mask << offset)) | ((value as u64) << offset);
        Ok(())
    }

    /// Sets every slot to `value`. Slots past the capacity in the last word stay zero.
    pub(crate) fn fill(&mut self, value: u32) -> Result<(), ChunkError> {
        if value as u64 > self.mask() {
            return Err(ChunkError::OutOfRange {
                index: 0,
                value,
                bits: self.bits_per_value,
                capacity: self.capacity,
            });
        }
        let per_word = self.values_per_word();
        let bits = self.bits_per_value as usize;
        let pattern = (0..per_word).fold(0u64, |acc, i| acc | ((value as u64) << (i * bits)));
        let full_words = self.capacity / per_word;
        for word in self.words.iter_mut().take(full_words) {
            *word = pattern;
        }
        let rest = self.capacity % per_word;
        if rest > 0 {
            let tail = (0..rest).fold(0u64, |acc, i| acc | ((value as u64) << (i * bits)));
            self.words[full_words] = tail;
        }
        Ok(())
    }

    /// Grows the array to `new_capacity` slots. Existing values are kept and new slots read 0;
    /// the array never shrinks.
    pub(crate) fn resize(&mut self, new_capacity: usize) {
        if new_capacity <= self.capacity {
            return;
        }
        self.words
            .resize(word_count(new_capacity, self.bits_per_value), 0);
        self.capacity = new_capacity;
    }

    /// The words as little-endian bytes. For 4-bit arrays this is the nibble layout light
    /// arrays use on the wire.
    pub(crate) fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// `bits: u8`, `capacity: u32 LE`, `word count: u32 LE`, then the words little-endian.
    pub(crate) fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.size_in_bytes());
        out.push(self.bits_per_value);
        out.extend_from_slice(&(self.capacity as u32).to_le_bytes());
        out.extend_from_slice(&(self.words.len() as u32).to_le_bytes());
        out.extend(self.to_le_bytes());
        out
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self, ChunkError> {
        if bytes.len() < HEADER_LEN {
            return Err(ChunkError::Malformed(format!(
                "packed array blob too short: {} bytes",
                bytes.len()
            )));
        }
        let bits_per_value = bytes[0];
        let capacity = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        let count = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let body = &bytes[HEADER_LEN..];
        if body.len() != count * 8 {
            return Err(ChunkError::Malformed(format!(
                "packed array announces {count} words but carries {} bytes",
                body.len()
            )));
        }
        let words = body
            .chunks_exact(8)
            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect();
        Self::from_words(capacity, bits_per_value, words)
    }
}

impl std::fmt::Debug for PackedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PackedArray {{ bits: {}, capacity: {}, words: {} }}",
            self.bits_per_value,
            self.capacity,
            self.words.len()
        )
    }
}

// Long array: VarInt word count, then each word as a big-endian long.
#[async_trait]
impl WriteProt for PackedArray {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        VarInt::from(self.words.len()).write(stream).await?;
        for word in &self.words {
            word.write(stream).await?;
        }
        Ok(())
    }
}

impl SizedProt for PackedArray {
    fn prot_size(&self) -> usize {
        VarInt::from(self.words.len()).prot_size() + self.size_in_bytes()
    }
}
