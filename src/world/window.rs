use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::chunk::SECTION_EDGE;

/// Chunk column coordinates within a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ChunkPos {
    pub(crate) x: i32,
    pub(crate) z: i32,
}

impl ChunkPos {
    pub(crate) fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The column containing a world position.
    pub(crate) fn containing(x: f64, z: f64) -> Self {
        let edge = SECTION_EDGE as f64;
        Self {
            x: (x / edge).floor() as i32,
            z: (z / edge).floor() as i32,
        }
    }

    fn distance_sq(&self, other: ChunkPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// The `(2 * radius + 1)^2` columns of a square window.
pub(crate) fn square_around(center: ChunkPos, radius: i32) -> HashSet<ChunkPos> {
    let radius = radius.max(0);
    (-radius..=radius)
        .flat_map(|dx| (-radius..=radius).map(move |dz| ChunkPos::new(center.x + dx, center.z + dz)))
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct WindowDiff {
    /// Nearest to the new centre first.
    pub(crate) to_load: Vec<ChunkPos>,
    pub(crate) to_unload: Vec<ChunkPos>,
}

/// Columns entering and leaving a window. Without an old window everything is a load.
pub(crate) fn diff(
    old: Option<&HashSet<ChunkPos>>,
    new: &HashSet<ChunkPos>,
    center: ChunkPos,
) -> WindowDiff {
    let mut to_load: Vec<ChunkPos> = match old {
        Some(old) => new.difference(old).copied().collect(),
        None => new.iter().copied().collect(),
    };
    to_load.sort_by_key(|pos| (pos.distance_sq(center), *pos));
    let mut to_unload: Vec<ChunkPos> = match old {
        Some(old) => old.difference(new).copied().collect(),
        None => vec![],
    };
    to_unload.sort();
    WindowDiff { to_load, to_unload }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn containing_floors_negative_positions() {
        assert_eq!(ChunkPos::containing(0.0, 0.0), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(15.9, 16.0), ChunkPos::new(0, 1));
        assert_eq!(ChunkPos::containing(-0.1, -16.0), ChunkPos::new(-1, -1));
        assert_eq!(ChunkPos::containing(-16.1, 33.0), ChunkPos::new(-2, 2));
    }

    #[test]
    fn square_has_side_two_r_plus_one() {
        for radius in 0..8 {
            let window = square_around(ChunkPos::new(3, -7), radius);
            assert_eq!(window.len(), ((2 * radius + 1) * (2 * radius + 1)) as usize);
            assert!(window.contains(&ChunkPos::new(3 + radius, -7 - radius)));
            assert!(!window.contains(&ChunkPos::new(4 + radius, -7)));
        }
    }

    #[test]
    fn first_window_is_all_loads() {
        let new = square_around(ChunkPos::new(0, 0), 5);
        let diff = diff(None, &new, ChunkPos::new(0, 0));
        assert_eq!(diff.to_load.len(), 121);
        assert!(diff.to_unload.is_empty());
        assert_eq!(diff.to_load[0], ChunkPos::new(0, 0));
    }

    #[test]
    fn step_east_swaps_one_column() {
        let old = square_around(ChunkPos::new(0, 0), 5);
        let new = square_around(ChunkPos::new(1, 0), 5);
        let diff = diff(Some(&old), &new, ChunkPos::new(1, 0));
        assert_eq!(diff.to_load.len(), 11);
        assert!(diff.to_load.iter().all(|p| p.x == 6));
        assert_eq!(diff.to_unload.len(), 11);
        assert!(diff.to_unload.iter().all(|p| p.x == -5));
    }

    #[test]
    fn loads_and_unloads_are_disjoint() {
        let centers = [(0, 0), (2, 3), (-4, 1), (10, 10), (9, 11)];
        for a in centers {
            for b in centers {
                let old = square_around(ChunkPos::new(a.0, a.1), 4);
                let new = square_around(ChunkPos::new(b.0, b.1), 4);
                let diff = diff(Some(&old), &new, ChunkPos::new(b.0, b.1));
                let loads: HashSet<_> = diff.to_load.iter().collect();
                assert!(diff.to_unload.iter().all(|p| !loads.contains(p)));
            }
        }
    }
}
