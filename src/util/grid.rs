//! A numeric grid with bulk operations and cost-based path-finding.

use std::collections::BinaryHeap;

/// A `width × height` grid of numeric cells.
///
/// For path-finding, a negative cell is a wall; any other value is the
/// extra cost of stepping onto that cell.
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<f64>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn peek(&self, x: u32, y: u32) -> Option<f64> {
        self.contains(x as i32, y as i32)
            .then(|| self.cells[self.offset(x, y)])
    }

    pub fn poke(&mut self, x: u32, y: u32, value: f64) {
        if self.contains(x as i32, y as i32) {
            let offset = self.offset(x, y);
            self.cells[offset] = value;
        }
    }

    /// Fill every cell by cycling through `values`.
    pub fn fill(&mut self, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        for (index, cell) in self.cells.iter_mut().enumerate() {
            *cell = values[index % values.len()];
        }
    }

    /// Copy the overlapping region of `other` into this grid.
    pub fn copy(&mut self, other: &Grid) {
        let width = self.width.min(other.width);
        let height = self.height.min(other.height);
        for y in 0..height {
            for x in 0..width {
                let value = other.cells[other.offset(x, y)];
                let offset = self.offset(x, y);
                self.cells[offset] = value;
            }
        }
    }

    /// Visit every cell.
    pub fn scan<F>(&self, mut callback: F)
    where
        F: FnMut(u32, u32, f64),
    {
        for y in 0..self.height {
            for x in 0..self.width {
                callback(x, y, self.cells[self.offset(x, y)]);
            }
        }
    }

    /// Rewrite every cell through `callback`.
    pub fn process<F>(&mut self, mut callback: F)
    where
        F: FnMut(u32, u32, f64) -> f64,
    {
        for y in 0..self.height {
            for x in 0..self.width {
                let offset = self.offset(x, y);
                self.cells[offset] = callback(x, y, self.cells[offset]);
            }
        }
    }

    /// A* over the 4-connected neighbourhood, weighting steps by
    /// `1 + cell value`. Returns the visited cells from start to goal
    /// (inclusive), or an empty vector when unreachable.
    pub fn path(&self, from: (u32, u32), to: (u32, u32)) -> Vec<(u32, u32)> {
        #[derive(PartialEq)]
        struct Open {
            priority: f64,
            position: (u32, u32),
        }
        impl Eq for Open {}
        impl PartialOrd for Open {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Open {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // Reversed: BinaryHeap is a max-heap, we want lowest first.
                other.priority.total_cmp(&self.priority)
            }
        }

        let walkable = |x: u32, y: u32| self.cells[self.offset(x, y)] >= 0.0;
        if !self.contains(from.0 as i32, from.1 as i32)
            || !self.contains(to.0 as i32, to.1 as i32)
            || !walkable(from.0, from.1)
            || !walkable(to.0, to.1)
        {
            return Vec::new();
        }

        let heuristic = |(x, y): (u32, u32)| {
            (x as f64 - to.0 as f64).abs() + (y as f64 - to.1 as f64).abs()
        };

        let size = self.cells.len();
        let mut best = vec![f64::INFINITY; size];
        let mut parent: Vec<Option<(u32, u32)>> = vec![None; size];
        let mut open = BinaryHeap::new();

        best[self.offset(from.0, from.1)] = 0.0;
        open.push(Open {
            priority: heuristic(from),
            position: from,
        });

        while let Some(Open { position, .. }) = open.pop() {
            if position == to {
                let mut path = vec![position];
                let mut current = position;
                while let Some(previous) = parent[self.offset(current.0, current.1)] {
                    path.push(previous);
                    current = previous;
                }
                path.reverse();
                return path;
            }

            let (x, y) = position;
            let cost = best[self.offset(x, y)];
            for (dx, dy) in [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)] {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if !self.contains(nx, ny) {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if !walkable(nx, ny) {
                    continue;
                }
                let offset = self.offset(nx, ny);
                let next_cost = cost + 1.0 + self.cells[offset];
                if next_cost < best[offset] {
                    best[offset] = next_cost;
                    parent[offset] = Some(position);
                    open.push(Open {
                        priority: next_cost + heuristic((nx, ny)),
                        position: (nx, ny),
                    });
                }
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_cycles_the_source_values() {
        let mut grid = Grid::new(3, 2);
        grid.fill(&[1.0, 2.0]);
        assert_eq!(grid.peek(0, 0), Some(1.0));
        assert_eq!(grid.peek(1, 0), Some(2.0));
        assert_eq!(grid.peek(2, 0), Some(1.0));
        assert_eq!(grid.peek(0, 1), Some(2.0));
    }

    #[test]
    fn peek_poke_bounds() {
        let mut grid = Grid::new(2, 2);
        grid.poke(1, 1, 9.0);
        assert_eq!(grid.peek(1, 1), Some(9.0));
        assert_eq!(grid.peek(2, 0), None);
        grid.poke(5, 5, 1.0); // Silently discarded.
    }

    #[test]
    fn copy_respects_the_overlap() {
        let mut small = Grid::new(2, 2);
        small.fill(&[7.0]);
        let mut large = Grid::new(4, 4);
        large.copy(&small);
        assert_eq!(large.peek(1, 1), Some(7.0));
        assert_eq!(large.peek(2, 2), Some(0.0));
    }

    #[test]
    fn process_transforms_every_cell() {
        let mut grid = Grid::new(2, 2);
        grid.process(|x, y, _| (x + y * 2) as f64);
        assert_eq!(grid.peek(0, 0), Some(0.0));
        assert_eq!(grid.peek(1, 1), Some(3.0));
    }

    #[test]
    fn path_goes_around_walls() {
        let mut grid = Grid::new(3, 3);
        // A vertical wall with a gap at the bottom.
        grid.poke(1, 0, -1.0);
        grid.poke(1, 1, -1.0);

        let path = grid.path((0, 0), (2, 0));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(2, 0)));
        assert_eq!(path.len(), 7); // Down, around the wall and back up.
        assert!(path.iter().all(|&(x, y)| grid.peek(x, y).unwrap() >= 0.0));
    }

    #[test]
    fn unreachable_targets_yield_an_empty_path() {
        let mut grid = Grid::new(3, 1);
        grid.poke(1, 0, -1.0);
        assert!(grid.path((0, 0), (2, 0)).is_empty());
        // Start or goal on a wall is unreachable too.
        assert!(grid.path((1, 0), (2, 0)).is_empty());
    }

    #[test]
    fn costly_cells_are_avoided_when_cheaper_routes_exist() {
        let mut grid = Grid::new(3, 2);
        grid.poke(1, 0, 10.0); // Expensive middle cell on the top row.
        let path = grid.path((0, 0), (2, 0));
        // The detour through the bottom row is cheaper.
        assert!(path.contains(&(1, 1)));
        assert!(!path.contains(&(1, 0)));
    }
}
