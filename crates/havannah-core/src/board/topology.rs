//! Static board geometry: playable cells, corner/edge masks and neighbour
//! tables, built once per supported size.

use std::sync::LazyLock;

use crate::types::Move;

pub const MIN_SIZE: usize = 4;
pub const MAX_SIZE: usize = 10;
pub const MAX_DIAMETER: usize = 2 * MAX_SIZE - 1;
pub const MAX_CELLS: usize = MAX_DIAMETER * MAX_DIAMETER;

/// Neighbour table sentinel for "off the board".
pub const NO_CELL: u16 = u16::MAX;

/// Adjacent offsets `(dx, dy)` in circular order, followed by the 12 cells at
/// distance two. Direction `i` and `i + 1 (mod 6)` are adjacent to each other.
pub const OFFSETS: [(i32, i32); 18] = [
    (0, -1), (1, 0), (1, 1), (0, 1), (-1, 0), (-1, -1),
    (0, -2), (1, -1), (2, 0), (2, 1), (2, 2), (1, 2),
    (0, 2), (-1, 1), (-2, 0), (-2, -1), (-2, -2), (-1, -2),
];

pub struct Topology {
    size: usize,
    diameter: usize,
    num_cells: usize,
    valid: Vec<bool>,
    corner: Vec<u8>,
    edge: Vec<u8>,
    neighbours: Vec<[u16; 18]>,
}

static TOPOLOGIES: LazyLock<Vec<Topology>> =
    LazyLock::new(|| (MIN_SIZE..=MAX_SIZE).map(Topology::build).collect());

impl Topology {
    /// Shared geometry for `size`. Panics outside `MIN_SIZE..=MAX_SIZE`.
    pub fn for_size(size: usize) -> &'static Topology {
        assert!((MIN_SIZE..=MAX_SIZE).contains(&size), "unsupported board size {size}");
        &TOPOLOGIES[size - MIN_SIZE]
    }

    fn build(size: usize) -> Topology {
        let d = 2 * size - 1;
        let m = size as i32 - 1;
        let e = d as i32 - 1;
        let inside = |x: i32, y: i32| {
            x >= 0 && y >= 0 && x < d as i32 && y < d as i32 && (x - y).abs() < size as i32
        };

        let mut topo = Topology {
            size,
            diameter: d,
            num_cells: 0,
            valid: vec![false; d * d],
            corner: vec![0; d * d],
            edge: vec![0; d * d],
            neighbours: vec![[NO_CELL; 18]; d * d],
        };

        let corners = [(0, 0), (m, 0), (e, m), (e, e), (m, e), (0, m)];

        for y in 0..d as i32 {
            for x in 0..d as i32 {
                if !inside(x, y) {
                    continue;
                }
                let idx = y as usize * d + x as usize;
                topo.valid[idx] = true;
                topo.num_cells += 1;

                if let Some(c) = corners.iter().position(|&c| c == (x, y)) {
                    topo.corner[idx] = 1 << c;
                } else {
                    let edges = [
                        y == 0,
                        x - y == m,
                        x == e,
                        y == e,
                        y - x == m,
                        x == 0,
                    ];
                    for (i, on) in edges.into_iter().enumerate() {
                        if on {
                            topo.edge[idx] |= 1 << i;
                        }
                    }
                }

                for (k, &(dx, dy)) in OFFSETS.iter().enumerate() {
                    let (nx, ny) = (x + dx, y + dy);
                    if inside(nx, ny) {
                        topo.neighbours[idx][k] = (ny as usize * d + nx as usize) as u16;
                    }
                }
            }
        }
        topo
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn diameter(&self) -> usize {
        self.diameter
    }

    /// Number of playable cells, `3s(s-1) + 1`.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Length of the padded cell vector.
    #[inline]
    pub fn padded_len(&self) -> usize {
        self.diameter * self.diameter
    }

    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.valid[idx]
    }

    #[inline]
    pub fn corner_mask(&self, idx: usize) -> u8 {
        self.corner[idx]
    }

    #[inline]
    pub fn edge_mask(&self, idx: usize) -> u8 {
        self.edge[idx]
    }

    /// Neighbour in table slot `k` (0..6 adjacent, 6..18 distance two).
    #[inline]
    pub fn neighbour(&self, idx: usize, k: usize) -> Option<usize> {
        match self.neighbours[idx][k] {
            NO_CELL => None,
            n => Some(n as usize),
        }
    }

    #[inline]
    pub fn index_of(&self, mv: Move) -> Option<usize> {
        if !mv.is_coord() {
            return None;
        }
        let (x, y) = (mv.x as usize, mv.y as usize);
        if x >= self.diameter || y >= self.diameter {
            return None;
        }
        let idx = y * self.diameter + x;
        self.valid[idx].then_some(idx)
    }

    #[inline]
    pub fn move_at(&self, idx: usize) -> Move {
        Move::new((idx % self.diameter) as i8, (idx / self.diameter) as i8)
    }

    /// Playable cell indices in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.padded_len()).filter(|&i| self.valid[i])
    }

    pub fn center(&self) -> Move {
        let m = (self.size - 1) as i8;
        Move::new(m, m)
    }
}
