/// One board cell. Group fields are only meaningful on union-find roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cell {
    /// 0 = empty, 1 / 2 = player
    pub owner: u8,
    /// placed by a real move rather than inside a search
    pub perm: bool,
    /// ring DFS depth marker, 0 outside a walk
    pub mark: u16,
    /// proximity bits, 2 per player (adjacent, within two)
    pub local: u8,
    pub corner: u8,
    pub edge: u8,
    pub size: u16,
    pub parent: u16,
}

impl Cell {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.owner == 0
    }
}
