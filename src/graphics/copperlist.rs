//! The display-side conversion of an indexed surface into RGBA pixels,
//! optionally driven scanline-by-scanline by a display program.

use crate::graphics::color::Rgba;
use crate::graphics::palette::Palette;
use crate::graphics::program::{Instruction, Program};
use crate::graphics::surface::Surface;
use crate::graphics::{Pixel, MAX_PALETTE_COLORS};

pub struct Copperlist {
    palette: Palette,
    shifting: [Pixel; MAX_PALETTE_COLORS],
    program: Option<Program>,
}

impl Default for Copperlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Copperlist {
    pub fn new() -> Self {
        Self {
            palette: Palette::default(),
            shifting: identity(),
            program: None,
        }
    }

    /// Drop the program and restore the identity shifting; the palette is
    /// left alone.
    pub fn reset(&mut self) {
        self.shifting = identity();
        self.program = None;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Override display-level shifting entries; an empty slice restores
    /// the identity map.
    pub fn set_shifting(&mut self, pairs: &[(Pixel, Pixel)]) {
        if pairs.is_empty() {
            self.shifting = identity();
        } else {
            for &(from, to) in pairs {
                self.shifting[from as usize] = to;
            }
        }
    }

    pub fn set_program(&mut self, program: Option<Program>) {
        self.program = program;
    }

    /// Convert `surface` into RGBA bytes (4 per pixel, row-major).
    /// `output` must hold `width * height * 4` bytes.
    pub fn surface_to_rgba(&self, surface: &Surface, output: &mut [u8]) {
        debug_assert_eq!(output.len(), surface.data().len() * 4);
        match &self.program {
            None => self.convert_plain(surface, output),
            Some(program) => self.convert_programmed(surface, program, output),
        }
    }

    fn convert_plain(&self, surface: &Surface, output: &mut [u8]) {
        let table = self.palette.table();
        for (pixel, chunk) in surface.data().iter().zip(output.chunks_exact_mut(4)) {
            let color = table[self.shifting[*pixel as usize] as usize];
            chunk[0] = color.r;
            chunk[1] = color.g;
            chunk[2] = color.b;
            chunk[3] = color.a;
        }
    }

    fn convert_programmed(&self, surface: &Surface, program: &Program, output: &mut [u8]) {
        // Working state, mutated by the program as the raster advances.
        let mut table: [Rgba; MAX_PALETTE_COLORS] = *self.palette.table();
        let mut shifting = self.shifting;
        let mut modulo: i64 = 0;
        let mut offset: i64 = 0;

        let instructions = program.instructions();
        let mut pc = 0;

        let data = surface.data();
        let length = data.len() as i64;
        let width = surface.width();
        let height = surface.height();

        let mut cursor: i64 = 0; // Source scan pointer, in pixels.
        let mut out = output.chunks_exact_mut(4);

        for y in 0..height {
            for x in 0..width {
                // Fire every due instruction; `WAIT` holds execution until
                // the raster reaches its position. The program counter only
                // moves forward, so the walk always terminates.
                while pc < instructions.len() {
                    match instructions[pc] {
                        Instruction::Wait { x: wx, y: wy } => {
                            if y > wy || (y == wy && x >= wx) {
                                pc += 1;
                            } else {
                                break;
                            }
                        }
                        Instruction::Skip { dx, dy } => {
                            cursor += dy as i64 * width as i64 + dx as i64;
                            pc += 1;
                        }
                        Instruction::Modulo(amount) => {
                            modulo = amount as i64;
                            pc += 1;
                        }
                        Instruction::Offset(amount) => {
                            offset = amount as i64;
                            pc += 1;
                        }
                        Instruction::Color { index, color } => {
                            table[index as usize] = color;
                            pc += 1;
                        }
                        Instruction::Shift { from, to } => {
                            shifting[from as usize] = to;
                            pc += 1;
                        }
                        Instruction::Nop => {
                            pc += 1;
                        }
                    }
                }

                let source = (cursor + offset).rem_euclid(length) as usize;
                let color = table[shifting[data[source] as usize] as usize];
                let chunk = out.next().unwrap();
                chunk[0] = color.r;
                chunk[1] = color.g;
                chunk[2] = color.b;
                chunk[3] = color.a;

                cursor += 1;
            }
            cursor += modulo;
        }
    }
}

fn identity() -> [Pixel; MAX_PALETTE_COLORS] {
    let mut table = [0; MAX_PALETTE_COLORS];
    for (index, entry) in table.iter_mut().enumerate() {
        *entry = index as Pixel;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_at(output: &[u8], width: u32, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let base = ((y * width + x) * 4) as usize;
        (
            output[base],
            output[base + 1],
            output[base + 2],
            output[base + 3],
        )
    }

    #[test]
    fn plain_conversion_uses_palette_and_shifting() {
        let mut surface = Surface::new(2, 1);
        surface.poke(0, 0, 1);
        surface.poke(1, 0, 2);

        let mut copperlist = Copperlist::new();
        copperlist.set_palette(Palette::from_colors(&[
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(255, 0, 0),
            Rgba::opaque(0, 255, 0),
        ]));
        copperlist.set_shifting(&[(1, 2)]);

        let mut output = vec![0; 2 * 4];
        copperlist.surface_to_rgba(&surface, &mut output);
        assert_eq!(rgba_at(&output, 2, 0, 0), (0, 255, 0, 255)); // 1 shifted to 2.
        assert_eq!(rgba_at(&output, 2, 1, 0), (0, 255, 0, 255));
    }

    #[test]
    fn gradient_program_interpolates_per_scanline() {
        let height = 200u32;
        let mut surface = Surface::new(4, height);
        surface.clear(1);

        let mut program = Program::new();
        program.gradient(
            1,
            &[
                (0, Rgba::new(0, 0, 0, 255)),
                (height - 1, Rgba::new(255, 255, 255, 255)),
            ],
        );

        let mut copperlist = Copperlist::new();
        copperlist.set_program(Some(program));

        let mut output = vec![0; (4 * height * 4) as usize];
        copperlist.surface_to_rgba(&surface, &mut output);

        for y in [0u32, 50, 100, 199] {
            let expected = (y * 255 / (height - 1)) as i32;
            let (r, g, b, a) = rgba_at(&output, 4, 0, y);
            assert!((r as i32 - expected).abs() <= 1, "row {y}: {r} vs {expected}");
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 255);
        }
    }

    #[test]
    fn color_change_mid_line_splits_the_row() {
        let mut surface = Surface::new(4, 1);
        surface.clear(1);

        let mut program = Program::new();
        program.wait(2, 0);
        program.color(1, Rgba::opaque(255, 0, 0));

        let mut copperlist = Copperlist::new();
        copperlist.set_palette(Palette::from_colors(&[Rgba::BLACK, Rgba::WHITE]));
        copperlist.set_program(Some(program));

        let mut output = vec![0; 4 * 4];
        copperlist.surface_to_rgba(&surface, &mut output);
        assert_eq!(rgba_at(&output, 4, 0, 0), (255, 255, 255, 255));
        assert_eq!(rgba_at(&output, 4, 1, 0), (255, 255, 255, 255));
        assert_eq!(rgba_at(&output, 4, 2, 0), (255, 0, 0, 255));
        assert_eq!(rgba_at(&output, 4, 3, 0), (255, 0, 0, 255));
    }

    #[test]
    fn shift_instruction_remaps_indices() {
        let mut surface = Surface::new(1, 2);
        surface.poke(0, 0, 1);
        surface.poke(0, 1, 1);

        let mut program = Program::new();
        program.wait(0, 1);
        program.shift(1, 2);

        let mut copperlist = Copperlist::new();
        copperlist.set_palette(Palette::from_colors(&[
            Rgba::BLACK,
            Rgba::opaque(10, 10, 10),
            Rgba::opaque(200, 200, 200),
        ]));
        copperlist.set_program(Some(program));

        let mut output = vec![0; 2 * 4];
        copperlist.surface_to_rgba(&surface, &mut output);
        assert_eq!(rgba_at(&output, 1, 0, 0), (10, 10, 10, 255));
        assert_eq!(rgba_at(&output, 1, 0, 1), (200, 200, 200, 255));
    }

    #[test]
    fn a_wait_past_the_bottom_never_fires_and_conversion_terminates() {
        let surface = Surface::new(4, 4);
        let mut program = Program::new();
        program.wait(0, 1000);
        program.color(0, Rgba::WHITE);

        let mut copperlist = Copperlist::new();
        copperlist.set_palette(Palette::from_colors(&[Rgba::BLACK]));
        copperlist.set_program(Some(program));

        let mut output = vec![0; 4 * 4 * 4];
        copperlist.surface_to_rgba(&surface, &mut output);
        assert_eq!(rgba_at(&output, 4, 3, 3), (0, 0, 0, 255));
    }

    #[test]
    fn offset_displaces_the_fetch() {
        let mut surface = Surface::new(4, 1);
        for x in 0..4 {
            surface.poke(x, 0, x as u8);
        }

        let mut program = Program::new();
        program.offset(1);

        let mut copperlist = Copperlist::new();
        let greys = Palette::greyscale(4);
        copperlist.set_palette(greys.clone());
        copperlist.set_program(Some(program));

        let mut output = vec![0; 4 * 4];
        copperlist.surface_to_rgba(&surface, &mut output);
        // Every fetch reads one pixel ahead, wrapping at the end.
        let first = greys.get(1);
        assert_eq!(rgba_at(&output, 4, 0, 0).0, first.r);
        let last = greys.get(0);
        assert_eq!(rgba_at(&output, 4, 3, 0).0, last.r);
    }
}
