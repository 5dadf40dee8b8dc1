//! Palettes: ordered sequences of up to 256 colors.
//!
//! Unused tail entries are filled with the last valid color so that
//! nearest-color matching stays well-defined over the whole index range.

use crate::graphics::color::Rgba;
use crate::graphics::{Pixel, MAX_PALETTE_COLORS};

#[derive(Clone)]
pub struct Palette {
    colors: [Rgba; MAX_PALETTE_COLORS],
    size: usize,
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette").field("size", &self.size).finish()
    }
}

impl Default for Palette {
    /// A full 256-level greyscale ramp.
    fn default() -> Self {
        Self::greyscale(MAX_PALETTE_COLORS)
    }
}

impl Palette {
    /// An evenly spaced greyscale palette with `levels` entries.
    pub fn greyscale(levels: usize) -> Self {
        let levels = levels.clamp(1, MAX_PALETTE_COLORS);
        let mut colors = [Rgba::BLACK; MAX_PALETTE_COLORS];
        for (i, color) in colors.iter_mut().enumerate().take(levels) {
            let luminance = if levels > 1 {
                (i * 255 / (levels - 1)) as u8
            } else {
                0
            };
            *color = Rgba::opaque(luminance, luminance, luminance);
        }
        let mut palette = Self {
            colors,
            size: levels,
        };
        palette.fill_tail();
        palette
    }

    /// A color-cube palette with `red`/`green`/`blue` levels per channel.
    pub fn quantized(red: usize, green: usize, blue: usize) -> Self {
        let mut entries = Vec::with_capacity(red * green * blue);
        let level = |i: usize, n: usize| -> u8 {
            if n > 1 {
                (i * 255 / (n - 1)) as u8
            } else {
                0
            }
        };
        for r in 0..red.max(1) {
            for g in 0..green.max(1) {
                for b in 0..blue.max(1) {
                    entries.push(Rgba::opaque(
                        level(r, red.max(1)),
                        level(g, green.max(1)),
                        level(b, blue.max(1)),
                    ));
                }
            }
        }
        Self::from_colors(&entries)
    }

    /// Build from an explicit color list; entries past the 256th are
    /// discarded.
    pub fn from_colors(entries: &[Rgba]) -> Self {
        let size = entries.len().clamp(1, MAX_PALETTE_COLORS);
        let mut colors = [Rgba::BLACK; MAX_PALETTE_COLORS];
        colors[..size].copy_from_slice(&entries[..size]);
        let mut palette = Self { colors, size };
        palette.fill_tail();
        palette
    }

    fn fill_tail(&mut self) {
        let last = self.colors[self.size - 1];
        for color in self.colors.iter_mut().skip(self.size) {
            *color = last;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn colors(&self) -> &[Rgba] {
        &self.colors[..self.size]
    }

    /// The whole 256-entry table, tail included. This is what the raster
    /// conversion indexes with unshifted pixel values.
    pub fn table(&self) -> &[Rgba; MAX_PALETTE_COLORS] {
        &self.colors
    }

    pub fn get(&self, index: Pixel) -> Rgba {
        self.colors[index as usize]
    }

    /// Overwrite a single entry; growing the effective size when `index`
    /// is past it.
    pub fn set(&mut self, index: Pixel, color: Rgba) {
        self.colors[index as usize] = color;
        if index as usize >= self.size {
            self.size = index as usize + 1;
            self.fill_tail();
        }
    }

    /// The index of the entry closest to `color`. Ties resolve to the
    /// lowest index, identical inputs always map to the same output.
    pub fn find_nearest(&self, color: Rgba) -> Pixel {
        let mut best = 0;
        let mut best_distance = u32::MAX;
        for (index, candidate) in self.colors[..self.size].iter().enumerate() {
            let distance = candidate.distance_squared(&color);
            if distance < best_distance {
                best = index;
                best_distance = distance;
                if distance == 0 {
                    break;
                }
            }
        }
        best as Pixel
    }

    /// Move every entry towards `target` by `ratio`.
    pub fn lerp(&mut self, target: Rgba, ratio: f32) {
        for color in self.colors.iter_mut() {
            *color = color.lerp(&target, ratio);
        }
    }

    /// Append the colors of `other`, optionally skipping the ones already
    /// present. Stops silently when full.
    pub fn merge(&mut self, other: &Palette, remove_duplicates: bool) {
        for &color in other.colors() {
            if remove_duplicates && self.colors[..self.size].contains(&color) {
                continue;
            }
            if self.size >= MAX_PALETTE_COLORS {
                break;
            }
            self.colors[self.size] = color;
            self.size += 1;
        }
        self.fill_tail();
    }

    /// Weighted mix of two colors, the module-level helper exposed to
    /// scripts.
    pub fn mix(a: Rgba, b: Rgba, ratio: f32) -> Rgba {
        a.lerp(&b, ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_capped_at_256() {
        let entries: Vec<Rgba> = (0..300)
            .map(|i| Rgba::opaque((i % 256) as u8, 0, 0))
            .collect();
        let palette = Palette::from_colors(&entries);
        assert_eq!(palette.size(), 256);
    }

    #[test]
    fn tail_is_filled_with_the_last_color() {
        let palette = Palette::from_colors(&[
            Rgba::opaque(10, 20, 30),
            Rgba::opaque(200, 100, 50),
        ]);
        assert_eq!(palette.size(), 2);
        assert_eq!(palette.get(2), Rgba::opaque(200, 100, 50));
        assert_eq!(palette.get(255), Rgba::opaque(200, 100, 50));
    }

    #[test]
    fn nearest_match_is_deterministic() {
        let palette = Palette::from_colors(&[
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(128, 128, 128),
            Rgba::opaque(255, 255, 255),
        ]);
        assert_eq!(palette.find_nearest(Rgba::opaque(5, 5, 5)), 0);
        assert_eq!(palette.find_nearest(Rgba::opaque(130, 120, 125)), 1);
        assert_eq!(palette.find_nearest(Rgba::opaque(250, 255, 250)), 2);
        // Exact entries map to themselves.
        for index in 0..palette.size() as u8 {
            assert_eq!(palette.find_nearest(palette.get(index)), index);
        }
        // Same input, same output.
        let probe = Rgba::opaque(77, 99, 111);
        assert_eq!(palette.find_nearest(probe), palette.find_nearest(probe));
    }

    #[test]
    fn greyscale_endpoints() {
        let palette = Palette::greyscale(256);
        assert_eq!(palette.get(0), Rgba::opaque(0, 0, 0));
        assert_eq!(palette.get(255), Rgba::opaque(255, 255, 255));
    }

    #[test]
    fn merge_with_deduplication() {
        let mut palette = Palette::from_colors(&[Rgba::BLACK, Rgba::WHITE]);
        let other = Palette::from_colors(&[Rgba::WHITE, Rgba::opaque(255, 0, 0)]);
        palette.merge(&other, true);
        assert_eq!(palette.size(), 3);
        assert_eq!(palette.get(2), Rgba::opaque(255, 0, 0));
    }
}
