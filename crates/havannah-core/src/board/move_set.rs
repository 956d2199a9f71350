/// Open-addressing set of canonical hashes used by unique move iteration.
///
/// Sized once to at least twice the expected number of insertions, so linear
/// probing never wraps a full table.
pub(crate) struct MoveHashSet {
    slots: Vec<u64>,
    mask: usize,
    has_zero: bool,
}

impl MoveHashSet {
    pub fn with_expected(n: usize) -> Self {
        let cap = (n.max(4) * 2).next_power_of_two();
        MoveHashSet { slots: vec![0; cap], mask: cap - 1, has_zero: false }
    }

    /// Insert `hash`; returns false if it was already present.
    pub fn insert(&mut self, hash: u64) -> bool {
        if hash == 0 {
            return !std::mem::replace(&mut self.has_zero, true);
        }
        let mut i = (hash ^ (hash >> 29)) as usize & self.mask;
        loop {
            match self.slots[i] {
                0 => {
                    self.slots[i] = hash;
                    return true;
                }
                h if h == hash => return false,
                _ => i = (i + 1) & self.mask,
            }
        }
    }
}
