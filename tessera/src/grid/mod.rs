//! Dense (time step, row, column) indexing of tile addresses.


mod naming;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use naming::NamingScheme;

use crate::error::{Error, Result};

/// Grid coordinates of one tile: time step `e`, row `r`, column `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub e: u32,
    pub r: u32,
    pub c: u32,
}

impl TileKey {
    pub fn new(e: u32, r: u32, c: u32) -> Self {
        Self { e, r, c }
    }
}

/// Sorted, duplicate-free coordinate values of a rectangular tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridIndex {
    pub e: Vec<u32>,
    pub r: Vec<u32>,
    pub c: Vec<u32>,
}

impl GridIndex {
    pub fn new(e: &[u32], r: &[u32], c: &[u32]) -> Self {
        let sorted = |values: &[u32]| -> Vec<u32> {
            values.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        };
        Self {
            e: sorted(e),
            r: sorted(r),
            c: sorted(c),
        }
    }

    fn from_keys<'a>(keys: impl Iterator<Item = &'a TileKey> + Clone) -> Self {
        let collect = |f: fn(&TileKey) -> u32| -> Vec<u32> {
            keys.clone().map(f).collect::<BTreeSet<_>>().into_iter().collect()
        };
        Self {
            e: collect(|k| k.e),
            r: collect(|k| k.r),
            c: collect(|k| k.c),
        }
    }

    pub fn rows(&self) -> usize {
        self.r.len()
    }

    pub fn cols(&self) -> usize {
        self.c.len()
    }

    pub fn steps(&self) -> usize {
        self.e.len()
    }

    pub fn step_position(&self, e: u32) -> Option<usize> {
        self.e.binary_search(&e).ok()
    }

    pub fn row_position(&self, r: u32) -> Option<usize> {
        self.r.binary_search(&r).ok()
    }

    pub fn col_position(&self, c: u32) -> Option<usize> {
        self.c.binary_search(&c).ok()
    }

    /// True when both grids share the same rows and columns.
    pub fn same_layout(&self, other: &GridIndex) -> bool {
        self.r == other.r && self.c == other.c
    }
}

/// Dense 3-D array stored `[row, column, step]` with the row index varying fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid3<T> {
    rows: usize,
    cols: usize,
    steps: usize,
    cells: Vec<T>,
}

impl<T> Grid3<T> {
    pub fn new(rows: usize, cols: usize, steps: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            rows * cols * steps,
            "cells length must equal rows * cols * steps"
        );
        Self {
            rows,
            cols,
            steps,
            cells,
        }
    }

    pub fn from_fn(
        rows: usize,
        cols: usize,
        steps: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut cells = Vec::with_capacity(rows * cols * steps);
        for step in 0..steps {
            for col in 0..cols {
                for row in 0..rows {
                    cells.push(f(row, col, step));
                }
            }
        }
        Self::new(rows, cols, steps, cells)
    }

    /// `(rows, cols, steps)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.steps)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, step: usize) -> &T {
        assert!(row < self.rows && col < self.cols && step < self.steps);
        &self.cells[row + self.rows * (col + self.cols * step)]
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

/// Tile addresses for every cell of a dense grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSet {
    pub grid: GridIndex,
    pub addresses: Grid3<String>,
}

impl TileSet {
    pub fn new(grid: GridIndex, addresses: Grid3<String>) -> Self {
        assert_eq!(
            addresses.shape(),
            (grid.rows(), grid.cols(), grid.steps()),
            "address grid shape must match the grid index"
        );
        Self { grid, addresses }
    }

    /// Builds the address of every cell of `grid` with `scheme`.
    pub fn from_scheme(grid: GridIndex, scheme: &NamingScheme) -> Self {
        let addresses = Grid3::from_fn(grid.rows(), grid.cols(), grid.steps(), |r, c, e| {
            scheme.format(TileKey::new(grid.e[e], grid.r[r], grid.c[c]))
        });
        Self { grid, addresses }
    }

    /// Address by grid positions.
    pub fn at(&self, step: usize, row: usize, col: usize) -> &str {
        self.addresses.get(row, col, step)
    }

    /// Address by grid values.
    pub fn address(&self, key: TileKey) -> Option<&str> {
        let step = self.grid.step_position(key.e)?;
        let row = self.grid.row_position(key.r)?;
        let col = self.grid.col_position(key.c)?;
        Some(self.at(step, row, col))
    }
}

/// Matches `addresses` against `scheme` and arranges them into a dense grid.
///
/// Addresses the scheme does not recognise are ignored. Fails with
/// [`Error::NoMatch`] if nothing matched and with [`Error::AmbiguousGrid`] if any
/// (e, r, c) cell has zero or several addresses.
pub fn index_grid<I, S>(addresses: I, scheme: &NamingScheme) -> Result<TileSet>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut matched: BTreeMap<TileKey, Vec<String>> = BTreeMap::new();
    let mut ignored = 0usize;
    for address in addresses {
        let address = address.into();
        match scheme.parse(&address) {
            Some(key) => matched.entry(key).or_default().push(address),
            None => ignored += 1,
        }
    }

    if matched.is_empty() {
        return Err(Error::NoMatch {
            pattern: scheme.pattern().to_string(),
        });
    }

    let grid = GridIndex::from_keys(matched.keys());
    for &e in &grid.e {
        for &r in &grid.r {
            for &c in &grid.c {
                let count = matched.get(&TileKey::new(e, r, c)).map_or(0, Vec::len);
                if count != 1 {
                    return Err(Error::AmbiguousGrid { e, r, c, count });
                }
            }
        }
    }

    tracing::debug!(
        steps = grid.steps(),
        rows = grid.rows(),
        cols = grid.cols(),
        ignored,
        "Indexed tile grid"
    );

    let addresses = Grid3::from_fn(grid.rows(), grid.cols(), grid.steps(), |r, c, e| {
        let key = TileKey::new(grid.e[e], grid.r[r], grid.c[c]);
        matched
            .get_mut(&key)
            .and_then(Vec::pop)
            .unwrap_or_default()
    });

    Ok(TileSet { grid, addresses })
}
