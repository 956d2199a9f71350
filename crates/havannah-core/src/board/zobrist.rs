//! Zobrist keys and the 12 board symmetries.

use std::sync::LazyLock;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::topology::{MAX_CELLS, MAX_DIAMETER};
use crate::types::Player;

/// 6 rotations x 2 reflections.
pub const NUM_SYMMETRIES: usize = 12;

const ZOBRIST_SEED: u64 = 0x4861_7661_6e6e_6168;

static KEYS: LazyLock<[[u64; MAX_CELLS]; Player::NUM]> = LazyLock::new(|| {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(ZOBRIST_SEED);
    let mut keys = [[0u64; MAX_CELLS]; Player::NUM];
    for side in keys.iter_mut() {
        for k in side.iter_mut() {
            *k = rng.next_u64();
        }
    }
    keys
});

/// Key for `player` owning the cell at `(x, y)`. Coordinates are board
/// coordinates; the table is shared by all sizes.
#[inline]
pub fn key(player: Player, x: i32, y: i32) -> u64 {
    KEYS[player.index()][y as usize * MAX_DIAMETER + x as usize]
}

/// Map `(x, y)` through symmetry `sym` of a board of `size`.
///
/// Symmetries `0..6` rotate by `sym * 60` degrees about the centre cell,
/// `6..12` mirror across the main diagonal first. Symmetry 0 is the identity.
#[inline]
pub fn transform(x: i32, y: i32, size: usize, sym: usize) -> (i32, i32) {
    let m = size as i32 - 1;
    let (mut a, mut b) = (x - m, y - m);
    if sym >= 6 {
        std::mem::swap(&mut a, &mut b);
    }
    for _ in 0..sym % 6 {
        (a, b) = (a - b, a);
    }
    (a + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_has_order_six() {
        for (x, y) in [(0, 0), (3, 1), (4, 4), (6, 5)] {
            let mut p = (x, y);
            for _ in 0..6 {
                p = transform(p.0, p.1, 5, 1);
            }
            assert_eq!(p, (x, y));
        }
    }

    fn distinct_images(x: i32, y: i32) -> usize {
        let mut images: Vec<_> = (0..NUM_SYMMETRIES).map(|s| transform(x, y, 5, s)).collect();
        images.sort();
        images.dedup();
        images.len()
    }

    #[test]
    fn test_transforms_are_distinct() {
        // (3, 1) from the centre lies on no mirror axis
        assert_eq!(distinct_images(7, 5), NUM_SYMMETRIES);
        // (1, 0) and (1, 1) sit on an axis and only have six images
        assert_eq!(distinct_images(5, 4), 6);
        assert_eq!(distinct_images(5, 5), 6);
        assert_eq!(distinct_images(4, 4), 1);
    }
}
