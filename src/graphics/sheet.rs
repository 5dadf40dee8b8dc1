//! Sheets ("banks"): a source image partitioned into rectangular cells
//! addressable by integer id.

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::EngineError;
use crate::graphics::surface::Surface;
use crate::graphics::{Rect, Size, CELL_NIL};

pub struct Sheet {
    atlas: Rc<RefCell<Surface>>,
    cells: Vec<Rect>,
}

impl Sheet {
    /// Partition the atlas into a uniform grid of `cell_width` by
    /// `cell_height` cells, numbered left-to-right, top-to-bottom.
    pub fn new_fixed(
        atlas: Rc<RefCell<Surface>>,
        cell_width: u32,
        cell_height: u32,
    ) -> Result<Self, EngineError> {
        if cell_width == 0 || cell_height == 0 {
            return Err(EngineError::Resource("cell size can't be zero".into()));
        }
        let (columns, rows) = {
            let surface = atlas.borrow();
            (surface.width() / cell_width, surface.height() / cell_height)
        };
        if columns == 0 || rows == 0 {
            return Err(EngineError::Resource(
                "cell size exceeds the atlas size".into(),
            ));
        }
        let mut cells = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for column in 0..columns {
                cells.push(Rect::new(
                    (column * cell_width) as i32,
                    (row * cell_height) as i32,
                    cell_width,
                    cell_height,
                ));
            }
        }
        Ok(Self { atlas, cells })
    }

    /// Build from an explicit cell table.
    pub fn new_explicit(
        atlas: Rc<RefCell<Surface>>,
        cells: Vec<Rect>,
    ) -> Result<Self, EngineError> {
        if cells.is_empty() {
            return Err(EngineError::Resource("a sheet needs at least one cell".into()));
        }
        Ok(Self { atlas, cells })
    }

    /// Decode a packed cell table: little-endian `u32 {x, y, w, h}` quads.
    pub fn new_from_blob(
        atlas: Rc<RefCell<Surface>>,
        blob: &[u8],
    ) -> Result<Self, EngineError> {
        if blob.len() % 16 != 0 {
            return Err(EngineError::decode(
                "cells",
                "cell table length is not a multiple of 16",
            ));
        }
        let cells = blob
            .chunks_exact(16)
            .map(|chunk| {
                let word = |i: usize| {
                    u32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
                };
                Rect::new(word(0) as i32, word(4) as i32, word(8), word(12))
            })
            .collect();
        Self::new_explicit(atlas, cells)
    }

    pub fn atlas(&self) -> &Rc<RefCell<Surface>> {
        &self.atlas
    }

    pub fn count(&self) -> usize {
        self.cells.len()
    }

    /// The rectangle of cell `id`; the nil sentinel selects cell `0`.
    pub fn cell(&self, id: u32) -> Option<Rect> {
        let index = if id == CELL_NIL { 0 } else { id as usize };
        self.cells.get(index).copied()
    }

    pub fn cell_size(&self, id: u32) -> Option<Size> {
        self.cell(id).map(|rect| Size::new(rect.width, rect.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas(width: u32, height: u32) -> Rc<RefCell<Surface>> {
        Rc::new(RefCell::new(Surface::new(width, height)))
    }

    #[test]
    fn fixed_grid_cells_are_row_major() {
        let sheet = Sheet::new_fixed(atlas(16, 8), 8, 8).unwrap();
        assert_eq!(sheet.count(), 2);
        assert_eq!(sheet.cell(0), Some(Rect::new(0, 0, 8, 8)));
        assert_eq!(sheet.cell(1), Some(Rect::new(8, 0, 8, 8)));
        assert_eq!(sheet.cell(2), None);
    }

    #[test]
    fn nil_cell_selects_cell_zero() {
        let sheet = Sheet::new_fixed(atlas(16, 16), 8, 8).unwrap();
        assert_eq!(sheet.cell(CELL_NIL), sheet.cell(0));
    }

    #[test]
    fn blob_table_decodes_little_endian_quads() {
        let mut blob = Vec::new();
        for value in [1u32, 2, 3, 4, 10, 20, 30, 40] {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        let sheet = Sheet::new_from_blob(atlas(64, 64), &blob).unwrap();
        assert_eq!(sheet.count(), 2);
        assert_eq!(sheet.cell(0), Some(Rect::new(1, 2, 3, 4)));
        assert_eq!(sheet.cell(1), Some(Rect::new(10, 20, 30, 40)));

        assert!(Sheet::new_from_blob(atlas(8, 8), &[0; 15]).is_err());
    }
}
