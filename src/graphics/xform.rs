//! Per-scanline affine source sampling, in the spirit of console "mode 7"
//! effects.
//!
//! Eight registers drive the mapping: `H`/`V` offset the screen-space
//! position fed into the `A`/`B`/`C`/`D` matrix, `X`/`Y` translate the
//! result into source space. An optional table swaps register values at
//! chosen output scanlines.

use crate::graphics::surface::Surface;
use crate::graphics::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    H,
    V,
    A,
    B,
    C,
    D,
    X,
    Y,
}

impl Register {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "h" => Some(Self::H),
            "v" => Some(Self::V),
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "c" => Some(Self::C),
            "d" => Some(Self::D),
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            _ => None,
        }
    }
}

/// Out-of-bounds sampling policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Wrap {
    #[default]
    Repeat,
    Edge,
    /// Sample a fixed border index.
    Border,
    /// Skip pixels that fall outside the source area.
    None,
}

impl Wrap {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "repeat" => Some(Self::Repeat),
            "edge" => Some(Self::Edge),
            "border" => Some(Self::Border),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Registers {
    h: f32,
    v: f32,
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    x: f32,
    y: f32,
}

impl Default for Registers {
    fn default() -> Self {
        // Identity mapping.
        Self {
            h: 0.0,
            v: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl Registers {
    fn set(&mut self, register: Register, value: f32) {
        match register {
            Register::H => self.h = value,
            Register::V => self.v = value,
            Register::A => self.a = value,
            Register::B => self.b = value,
            Register::C => self.c = value,
            Register::D => self.d = value,
            Register::X => self.x = value,
            Register::Y => self.y = value,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct XForm {
    registers: Registers,
    wrap: Wrap,
    border: u8,
    /// `(scanline, register, value)` triplets, sorted by scanline.
    table: Vec<(i32, Register, f32)>,
}

impl XForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&mut self, register: Register, value: f32) {
        self.registers.set(register, value);
    }

    /// Shortcut for the `A`/`B`/`C`/`D` matrix.
    pub fn set_matrix(&mut self, a: f32, b: f32, c: f32, d: f32) {
        self.registers.a = a;
        self.registers.b = b;
        self.registers.c = c;
        self.registers.d = d;
    }

    /// Shortcut for the `H`/`V` screen offset.
    pub fn set_offset(&mut self, h: f32, v: f32) {
        self.registers.h = h;
        self.registers.v = v;
    }

    pub fn set_wrap(&mut self, wrap: Wrap) {
        self.wrap = wrap;
    }

    pub fn set_border(&mut self, border: u8) {
        self.border = border;
    }

    /// Install (or clear) the per-scanline override table.
    pub fn set_table(&mut self, mut entries: Vec<(i32, Register, f32)>) {
        entries.sort_by_key(|(scanline, _, _)| *scanline);
        self.table = entries;
    }

    /// Blit `area` of `source` over the target clip region starting at
    /// `position`, sampling through the affine mapping. Shifting and
    /// transparency of the target state apply as for a plain blit.
    pub fn blit(
        &self,
        target: &mut Surface,
        position: Point,
        source: &Surface,
        area: Rect,
    ) {
        let area = area.intersection(&Rect::of_size(source.size()));
        if area.is_empty() {
            return;
        }
        let clipping = target.state().clipping;
        let destination = Rect::new(
            position.x,
            position.y,
            (clipping.right() - position.x).max(0) as u32,
            (clipping.bottom() - position.y).max(0) as u32,
        )
        .intersection(&clipping);
        if destination.is_empty() {
            return;
        }

        let shifting = target.state().shifting;
        let transparent = target.state().transparent;

        let mut registers = self.registers;
        let mut next_entry = 0;

        for y in destination.y..destination.bottom() {
            let scanline = y - position.y;
            while next_entry < self.table.len() && self.table[next_entry].0 <= scanline {
                let (_, register, value) = self.table[next_entry];
                registers.set(register, value);
                next_entry += 1;
            }

            let row = (scanline as f32) + registers.v;
            for x in destination.x..destination.right() {
                let column = ((x - position.x) as f32) + registers.h;
                let u = registers.a * column + registers.b * row + registers.x;
                let v = registers.c * column + registers.d * row + registers.y;
                let Some(index) = self.sample(source, &area, u, v) else {
                    continue;
                };
                let index = shifting[index as usize];
                if transparent[index as usize] {
                    continue;
                }
                let offset = target.offset(x, y);
                target.data_mut()[offset] = index;
            }
        }
    }

    fn sample(&self, source: &Surface, area: &Rect, u: f32, v: f32) -> Option<u8> {
        let width = area.width as i32;
        let height = area.height as i32;
        let mut su = u.floor() as i32;
        let mut sv = v.floor() as i32;
        let outside = su < 0 || su >= width || sv < 0 || sv >= height;
        if outside {
            match self.wrap {
                Wrap::Repeat => {
                    su = su.rem_euclid(width);
                    sv = sv.rem_euclid(height);
                }
                Wrap::Edge => {
                    su = su.clamp(0, width - 1);
                    sv = sv.clamp(0, height - 1);
                }
                Wrap::Border => return Some(self.border),
                Wrap::None => return None,
            }
        }
        Some(source.peek(area.x + su, area.y + sv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_source() -> Surface {
        let mut source = Surface::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                source.poke(x, y, (y * 4 + x) as u8 + 1);
            }
        }
        source
    }

    #[test]
    fn identity_transform_matches_a_blit() {
        let source = gradient_source();
        let xform = XForm::new();

        let mut target = Surface::new(4, 4);
        target.set_transparent(&[(0, false)]);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));

        assert_eq!(target.data(), source.data());
    }

    #[test]
    fn translation_registers_shift_the_sampling() {
        let source = gradient_source();
        let mut xform = XForm::new();
        xform.set_register(Register::X, 1.0);
        xform.set_register(Register::Y, 1.0);
        xform.set_wrap(Wrap::None);

        let mut target = Surface::new(4, 4);
        target.set_transparent(&[(0, false)]);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));

        assert_eq!(target.peek(0, 0), source.peek(1, 1));
        assert_eq!(target.peek(2, 2), source.peek(3, 3));
        // Out of the source with wrap `none`: untouched.
        assert_eq!(target.peek(3, 3), 0);
    }

    #[test]
    fn repeat_wraps_and_edge_clamps() {
        let source = gradient_source();
        let mut xform = XForm::new();
        xform.set_register(Register::X, 2.0);

        let mut target = Surface::new(4, 1);
        target.set_transparent(&[(0, false)]);
        xform.set_wrap(Wrap::Repeat);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));
        assert_eq!(target.peek(2, 0), source.peek(0, 0)); // 4 wraps to 0.

        xform.set_wrap(Wrap::Edge);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));
        assert_eq!(target.peek(2, 0), source.peek(3, 0)); // 4 clamps to 3.
    }

    #[test]
    fn border_wrap_paints_the_border_index() {
        let source = gradient_source();
        let mut xform = XForm::new();
        xform.set_register(Register::X, 100.0);
        xform.set_wrap(Wrap::Border);
        xform.set_border(9);

        let mut target = Surface::new(2, 2);
        target.set_transparent(&[(0, false)]);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));
        assert!(target.data().iter().all(|&p| p == 9));
    }

    #[test]
    fn scanline_table_switches_registers_mid_frame() {
        let source = gradient_source();
        let mut xform = XForm::new();
        xform.set_wrap(Wrap::None);
        xform.set_table(vec![(2, Register::X, 1.0)]);

        let mut target = Surface::new(4, 4);
        target.set_transparent(&[(0, false)]);
        xform.blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 4, 4));

        assert_eq!(target.peek(0, 0), source.peek(0, 0)); // Before the switch.
        assert_eq!(target.peek(0, 2), source.peek(1, 2)); // After the switch.
        assert_eq!(target.peek(0, 3), source.peek(1, 3));
    }
}
