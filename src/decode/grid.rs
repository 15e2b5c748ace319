/// A cell of the square feature grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Number of king moves between two cells.
    pub fn chebyshev_distance(self, other: Self) -> usize {
        let dy = if self.row > other.row {
            self.row - other.row
        } else {
            other.row - self.row
        };
        let dx = if self.col > other.col {
            self.col - other.col
        } else {
            other.col - self.col
        };
        dy.max(dx)
    }
}

/// Conversions between flattened indices and cells of an `F x F` grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: usize,
}

impl Grid {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    #[inline]
    pub fn size(self) -> usize {
        self.size
    }

    #[inline]
    pub fn len(self) -> usize {
        self.size * self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn cell(self, index: usize) -> Cell {
        Cell {
            row: index / self.size,
            col: index % self.size,
        }
    }

    #[inline]
    pub fn index(self, Cell { row, col }: Cell) -> usize {
        row * self.size + col
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, Grid};

    #[test]
    fn index_round_trips_through_cell() {
        for size in [1, 4, 48, 64] {
            let grid = Grid::new(size);
            for index in 0..grid.len() {
                assert_eq!(grid.index(grid.cell(index)), index);
            }
        }
    }

    #[test]
    fn cell_is_row_major() {
        let grid = Grid::new(4);
        assert_eq!(grid.cell(5), Cell::new(1, 1));
        assert_eq!(grid.cell(3), Cell::new(0, 3));
        assert_eq!(grid.cell(15), Cell::new(3, 3));
    }

    #[test]
    fn chebyshev_distance() {
        let a = Cell::new(2, 2);
        assert_eq!(a.chebyshev_distance(a), 0);
        assert_eq!(a.chebyshev_distance(Cell::new(3, 3)), 1);
        assert_eq!(a.chebyshev_distance(Cell::new(1, 3)), 1);
        assert_eq!(a.chebyshev_distance(Cell::new(0, 3)), 2);
        assert_eq!(Cell::new(0, 3).chebyshev_distance(a), 2);
    }
}
