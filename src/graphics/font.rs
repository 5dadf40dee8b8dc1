//! Cell-based bitmap fonts: a sheet whose cells are glyphs, mapped through
//! an alphabet string.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::graphics::blit;
use crate::graphics::sheet::Sheet;
use crate::graphics::surface::Surface;
use crate::graphics::{Point, Size};

/// Glyphs for the printable ASCII range, in cell order.
pub const DEFAULT_ALPHABET: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

pub struct Font {
    sheet: Rc<Sheet>,
    glyphs: HashMap<char, u32>,
}

impl Font {
    /// Map the characters of `alphabet` (default: printable ASCII) onto
    /// the sheet cells, in order. Characters without a matching cell are
    /// skipped when drawing.
    pub fn new(sheet: Rc<Sheet>, alphabet: Option<&str>) -> Self {
        let alphabet = alphabet.unwrap_or(DEFAULT_ALPHABET);
        let glyphs = alphabet
            .chars()
            .enumerate()
            .filter(|(index, _)| *index < sheet.count())
            .map(|(index, glyph)| (glyph, index as u32))
            .collect();
        Self { sheet, glyphs }
    }

    /// The pixel box `text` would cover at the given scale.
    pub fn measure(&self, text: &str, scale_x: f32, scale_y: f32) -> Size {
        let mut width = 0.0f32;
        let mut height = 0.0f32;
        for glyph in text.chars() {
            let Some(size) = self
                .glyphs
                .get(&glyph)
                .and_then(|&cell| self.sheet.cell_size(cell))
            else {
                continue;
            };
            width += size.width as f32 * scale_x.abs();
            height = height.max(size.height as f32 * scale_y.abs());
        }
        Size::new(width as u32, height as u32)
    }

    /// Render `text` glyph by glyph, left to right, starting at
    /// `position`.
    pub fn write(
        &self,
        target: &mut Surface,
        position: Point,
        text: &str,
        scale_x: f32,
        scale_y: f32,
    ) {
        let atlas = self.sheet.atlas().borrow();
        let mut x = position.x as f32;
        for glyph in text.chars() {
            let Some(cell) = self.glyphs.get(&glyph).and_then(|&id| self.sheet.cell(id))
            else {
                continue;
            };
            let origin = Point::new(x as i32, position.y);
            if scale_x == 1.0 && scale_y == 1.0 {
                blit::blit(target, origin, &atlas, cell);
            } else {
                blit::blit_scaled(target, origin, &atlas, cell, scale_x, scale_y);
            }
            x += cell.width as f32 * scale_x.abs();
        }
    }
}
