use crate::chunk::packed_array::PackedArray;
use crate::chunk::{Position, LIGHT_BITS, SECTION_BLOCKS};
use crate::err::ChunkError;

/// Sparse 4-bit light levels for one column, one slot per section plus one below and one above
/// the world.
///
/// `has_data` and `empty` are kept in sync with slot presence on every mutation: an allocated
/// slot has `has_data = 1, empty = 0`, an absent one `has_data = 0, empty = 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LightStore {
    min_y: i32,
    slots: Vec<Option<PackedArray>>,
    has_data: PackedArray,
    empty: PackedArray,
}

fn new_slot() -> PackedArray {
    PackedArray::new(SECTION_BLOCKS, LIGHT_BITS)
}

impl LightStore {
    pub(crate) fn new(min_y: i32, num_sections: usize) -> Self {
        let count = num_sections + 2;
        Self {
            min_y,
            slots: vec![None; count],
            has_data: PackedArray::new(count, 1),
            empty: PackedArray::ones(count),
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot holding `y`, or `None` if `y` lies more than one section outside the column.
    pub(crate) fn slot_index(&self, y: i32) -> Option<usize> {
        let index = ((y - self.min_y) >> 4) + 1;
        if index < 0 || index as usize >= self.slots.len() {
            None
        } else {
            Some(index as usize)
        }
    }

    fn block_index(&self, pos: Position) -> usize {
        ((((pos.y - self.min_y) & 15) << 8) | ((pos.z & 15) << 4) | (pos.x & 15)) as usize
    }

    pub(crate) fn get(&self, pos: Position) -> u8 {
        self.slot_index(pos.y)
            .and_then(|slot| self.slots[slot].as_ref())
            .and_then(|data| data.get(self.block_index(pos)))
            .unwrap_or(0) as u8
    }

    /// Writes a light level. Writing 0 into an absent slot allocates nothing; positions outside
    /// the slot range are ignored.
    pub(crate) fn set(&mut self, pos: Position, level: u8) -> Result<(), ChunkError> {
        let Some(slot) = self.slot_index(pos.y) else {
            return Ok(());
        };
        let index = self.block_index(pos);
        if self.slots[slot].is_none() {
            if level == 0 {
                return Ok(());
            }
            let mut data = new_slot();
            data.set(index, level as u32)?;
            self.install(slot, data)?;
            return Ok(());
        }
        match self.slots[slot].as_mut() {
            Some(data) => data.set(index, level as u32),
            None => Ok(()),
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&PackedArray> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Replaces a whole slot, as when decoding a persisted column.
    pub(crate) fn set_slot(&mut self, index: usize, data: PackedArray) -> Result<(), ChunkError> {
        if index >= self.slots.len() {
            return Err(ChunkError::Malformed(format!(
                "light slot {index} outside 0..{}",
                self.slots.len()
            )));
        }
        if data.bits_per_value() != LIGHT_BITS || data.capacity() != SECTION_BLOCKS {
            return Err(ChunkError::Malformed(format!(
                "light slot must be {SECTION_BLOCKS} x {LIGHT_BITS} bits, got {:?}",
                data
            )));
        }
        self.install(index, data)
    }

    fn install(&mut self, index: usize, data: PackedArray) -> Result<(), ChunkError> {
        if index >= self.has_data.capacity() {
            let old = self.empty.capacity();
            self.has_data.resize(index + 1);
            self.empty.resize(index + 1);
            for i in old..=index {
                self.empty.set(i, 1)?;
            }
        }
        self.slots[index] = Some(data);
        self.has_data.set(index, 1)?;
        self.empty.set(index, 0)?;
        Ok(())
    }

    pub(crate) fn has_data_mask(&self) -> &PackedArray {
        &self.has_data
    }

    pub(crate) fn empty_mask(&self) -> &PackedArray {
        &self.empty
    }

    /// Allocated slots in ascending order, gated by the presence mask.
    pub(crate) fn present_slots(&self) -> impl Iterator<Item = (usize, &PackedArray)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Some(data) if self.has_data.get(i) == Some(1) => Some((i, data)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> LightStore {
        LightStore::new(-64, 24)
    }

    #[test]
    fn starts_dark_and_empty() {
        let light = store();
        assert_eq!(light.slot_count(), 26);
        assert_eq!(light.get(Position::new(3, 10, 3)), 0);
        for i in 0..26 {
            assert_eq!(light.has_data_mask().get(i), Some(0));
            assert_eq!(light.empty_mask().get(i), Some(1));
        }
        assert_eq!(light.present_slots().count(), 0);
    }

    #[test]
    fn zero_write_stays_sparse() {
        let mut light = store();
        light.set(Position::new(0, 0, 0), 0).unwrap();
        assert!(light.slot(light.slot_index(0).unwrap()).is_none());
    }

    #[test]
    fn first_write_allocates_and_updates_masks() {
        let mut light = store();
        light.set(Position::new(8, 4, 8), 15).unwrap();
        let slot = light.slot_index(4).unwrap();
        assert_eq!(slot, 5);
        assert_eq!(light.get(Position::new(8, 4, 8)), 15);
        assert_eq!(light.get(Position::new(8, 5, 8)), 0);
        assert_eq!(light.has_data_mask().get(slot), Some(1));
        assert_eq!(light.empty_mask().get(slot), Some(0));
        assert_eq!(light.present_slots().map(|(i, _)| i).collect::<Vec<_>>(), vec![slot]);
    }

    #[test]
    fn bleed_slots_cover_one_section_outside() {
        let mut light = store();
        assert_eq!(light.slot_index(-65), Some(0));
        assert_eq!(light.slot_index(-80), Some(0));
        assert_eq!(light.slot_index(-81), None);
        assert_eq!(light.slot_index(320), Some(25));
        assert_eq!(light.slot_index(336), None);
        light.set(Position::new(0, -70, 0), 7).unwrap();
        assert_eq!(light.get(Position::new(0, -70, 0)), 7);
        light.set(Position::new(0, 400, 0), 7).unwrap();
        assert_eq!(light.get(Position::new(0, 400, 0)), 0);
    }

    #[test]
    fn rejects_levels_above_fifteen() {
        let mut light = store();
        assert!(light.set(Position::new(0, 0, 0), 16).is_err());
        assert!(light.slot(light.slot_index(0).unwrap()).is_none());
    }

    #[test]
    fn set_slot_validates_shape() {
        let mut light = store();
        assert!(light.set_slot(3, PackedArray::new(4096, 5)).is_err());
        assert!(light.set_slot(26, new_slot()).is_err());
        light.set_slot(3, new_slot()).unwrap();
        assert_eq!(light.has_data_mask().get(3), Some(1));
        assert_eq!(light.empty_mask().get(3), Some(0));
    }
}
