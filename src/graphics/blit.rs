//! Compositing operators: copy pixels from a source surface into a target
//! surface through the target's rendering state.
//!
//! On every sampling operator the *target* state's shifting map is applied
//! to the source index first, then its transparency map decides whether the
//! pixel is skipped. `copy` is the raw exception.

use crate::graphics::palette::Palette;
use crate::graphics::surface::Surface;
use crate::graphics::{Pixel, Point, Rect};

/// Per-pixel gate used by [`stencil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Never,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    Always,
}

impl Comparator {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "never" => Some(Self::Never),
            "less" => Some(Self::Less),
            "less-or-equal" => Some(Self::LessOrEqual),
            "greater" => Some(Self::Greater),
            "greater-or-equal" => Some(Self::GreaterOrEqual),
            "equal" => Some(Self::Equal),
            "not-equal" => Some(Self::NotEqual),
            "always" => Some(Self::Always),
            _ => None,
        }
    }

    #[inline]
    fn test(&self, value: Pixel, threshold: Pixel) -> bool {
        match self {
            Self::Never => false,
            Self::Less => value < threshold,
            Self::LessOrEqual => value <= threshold,
            Self::Greater => value > threshold,
            Self::GreaterOrEqual => value >= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
            Self::Always => true,
        }
    }
}

/// Component-wise combination used by [`blend`]; the non-clamped variants
/// wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFunction {
    Replace,
    Add,
    AddClamped,
    Subtract,
    SubtractClamped,
    ReverseSubtract,
    ReverseSubtractClamped,
    Multiply,
    MultiplyClamped,
    Min,
    Max,
}

impl BlendFunction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "replace" => Some(Self::Replace),
            "add" => Some(Self::Add),
            "add-clamped" => Some(Self::AddClamped),
            "subtract" => Some(Self::Subtract),
            "subtract-clamped" => Some(Self::SubtractClamped),
            "reverse-subtract" => Some(Self::ReverseSubtract),
            "reverse-subtract-clamped" => Some(Self::ReverseSubtractClamped),
            "multiply" => Some(Self::Multiply),
            "multiply-clamped" => Some(Self::MultiplyClamped),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    #[inline]
    fn apply(&self, source: u8, destination: u8) -> u8 {
        match self {
            Self::Replace => source,
            Self::Add => source.wrapping_add(destination),
            Self::AddClamped => source.saturating_add(destination),
            Self::Subtract => source.wrapping_sub(destination),
            Self::SubtractClamped => source.saturating_sub(destination),
            Self::ReverseSubtract => destination.wrapping_sub(source),
            Self::ReverseSubtractClamped => destination.saturating_sub(source),
            Self::Multiply | Self::MultiplyClamped => {
                ((source as u16 * destination as u16) / 255) as u8
            }
            Self::Min => source.min(destination),
            Self::Max => source.max(destination),
        }
    }
}

struct Span {
    /// Top-left of the written region, in target coordinates.
    target: Point,
    /// Top-left of the sampled region, in source coordinates.
    source: Point,
    width: u32,
    height: u32,
}

/// Clamp `area` to the source bounds and the destination to the target's
/// clipping region, keeping the two aligned.
fn clip(target: &Surface, position: Point, source: &Surface, area: Rect) -> Option<Span> {
    let area = area.intersection(&Rect::of_size(source.size()));
    if area.is_empty() {
        return None;
    }

    let destination = Rect::new(position.x, position.y, area.width, area.height)
        .intersection(&target.state().clipping);
    if destination.is_empty() {
        return None;
    }

    Some(Span {
        target: Point::new(destination.x, destination.y),
        source: Point::new(
            area.x + (destination.x - position.x),
            area.y + (destination.y - position.y),
        ),
        width: destination.width,
        height: destination.height,
    })
}

/// Copy a source sub-rectangle applying shifting and transparency.
pub fn blit(target: &mut Surface, position: Point, source: &Surface, area: Rect) {
    let Some(span) = clip(target, position, source, area) else {
        return;
    };
    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    for row in 0..span.height as i32 {
        for column in 0..span.width as i32 {
            let index =
                shifting[source.peek(span.source.x + column, span.source.y + row) as usize];
            if transparent[index as usize] {
                continue;
            }
            let offset = target.offset(span.target.x + column, span.target.y + row);
            target.data_mut()[offset] = index;
        }
    }
}

/// Raw copy: no shifting, no transparency, clipping only.
pub fn copy(target: &mut Surface, position: Point, source: &Surface, area: Rect) {
    let Some(span) = clip(target, position, source, area) else {
        return;
    };
    for row in 0..span.height as i32 {
        let from = source.offset(span.source.x, span.source.y + row);
        let to = target.offset(span.target.x, span.target.y + row);
        let width = span.width as usize;
        let row_data = &source.data()[from..from + width];
        target.data_mut()[to..to + width].copy_from_slice(row_data);
    }
}

/// Like [`blit`], with the source sampled modulo the area size starting
/// from `offset`.
pub fn tile(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    offset: Point,
) {
    let area = area.intersection(&Rect::of_size(source.size()));
    if area.is_empty() {
        return;
    }
    let destination = Rect::new(position.x, position.y, area.width, area.height)
        .intersection(&target.state().clipping);
    if destination.is_empty() {
        return;
    }
    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    for y in destination.y..destination.bottom() {
        let v = (y - position.y + offset.y).rem_euclid(area.height as i32);
        for x in destination.x..destination.right() {
            let u = (x - position.x + offset.x).rem_euclid(area.width as i32);
            let index = shifting[source.peek(area.x + u, area.y + v) as usize];
            if transparent[index as usize] {
                continue;
            }
            let at = target.offset(x, y);
            target.data_mut()[at] = index;
        }
    }
}

/// Copy gated by a mask surface: a pixel is written only when
/// `comparator(mask value at the target position, threshold)` holds.
pub fn stencil(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    mask: &Surface,
    comparator: Comparator,
    threshold: Pixel,
) {
    let Some(span) = clip(target, position, source, area) else {
        return;
    };
    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    for row in 0..span.height as i32 {
        for column in 0..span.width as i32 {
            let x = span.target.x + column;
            let y = span.target.y + row;
            if !comparator.test(mask.peek(x, y), threshold) {
                continue;
            }
            let index =
                shifting[source.peek(span.source.x + column, span.source.y + row) as usize];
            if transparent[index as usize] {
                continue;
            }
            let offset = target.offset(x, y);
            target.data_mut()[offset] = index;
        }
    }
}

/// Combine source over target component-wise through the palette's RGB,
/// writing back the nearest palette index.
pub fn blend(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    palette: &Palette,
    function: BlendFunction,
) {
    let Some(span) = clip(target, position, source, area) else {
        return;
    };
    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    for row in 0..span.height as i32 {
        for column in 0..span.width as i32 {
            let index =
                shifting[source.peek(span.source.x + column, span.source.y + row) as usize];
            if transparent[index as usize] {
                continue;
            }
            let x = span.target.x + column;
            let y = span.target.y + row;
            let s = palette.get(index);
            let d = palette.get(target.peek(x, y));
            let combined = crate::graphics::color::Rgba::opaque(
                function.apply(s.r, d.r),
                function.apply(s.g, d.g),
                function.apply(s.b, d.b),
            );
            let offset = target.offset(x, y);
            target.data_mut()[offset] = palette.find_nearest(combined);
        }
    }
}

/// For every source pixel call `callback(x, y, from, to)` (coordinates are
/// target-space) and write the returned index.
pub fn process<F>(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    mut callback: F,
) where
    F: FnMut(i32, i32, Pixel, Pixel) -> Pixel,
{
    let Some(span) = clip(target, position, source, area) else {
        return;
    };
    for row in 0..span.height as i32 {
        for column in 0..span.width as i32 {
            let x = span.target.x + column;
            let y = span.target.y + row;
            let from = source.peek(span.source.x + column, span.source.y + row);
            let to = target.peek(x, y);
            let offset = target.offset(x, y);
            target.data_mut()[offset] = callback(x, y, from, to);
        }
    }
}

/// Nearest-neighbour scaled blit; negative factors flip the source on the
/// corresponding axis. `position` is the destination top-left.
pub fn blit_scaled(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    scale_x: f32,
    scale_y: f32,
) {
    let area = area.intersection(&Rect::of_size(source.size()));
    if area.is_empty() || scale_x == 0.0 || scale_y == 0.0 {
        return;
    }
    let width = (area.width as f32 * scale_x.abs()).round() as i32;
    let height = (area.height as f32 * scale_y.abs()).round() as i32;
    if width <= 0 || height <= 0 {
        return;
    }
    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    let clipping = target.state().clipping;
    for dy in 0..height {
        let y = position.y + dy;
        let mut v = ((dy as f32 + 0.5) / scale_y.abs()) as i32;
        if scale_y < 0.0 {
            v = area.height as i32 - 1 - v;
        }
        for dx in 0..width {
            let x = position.x + dx;
            if !clipping.contains(x, y) {
                continue;
            }
            let mut u = ((dx as f32 + 0.5) / scale_x.abs()) as i32;
            if scale_x < 0.0 {
                u = area.width as i32 - 1 - u;
            }
            let index = shifting[source.peek(area.x + u, area.y + v) as usize];
            if transparent[index as usize] {
                continue;
            }
            let offset = target.offset(x, y);
            target.data_mut()[offset] = index;
        }
    }
}

/// Scaled and rotated blit. `position` is where the anchor lands on the
/// target; `anchor_x`/`anchor_y` are relative to the (scaled) source area,
/// `rotation` is in radians.
#[allow(clippy::too_many_arguments)]
pub fn blit_scaled_rotated(
    target: &mut Surface,
    position: Point,
    source: &Surface,
    area: Rect,
    scale_x: f32,
    scale_y: f32,
    rotation: f32,
    anchor_x: f32,
    anchor_y: f32,
) {
    if rotation == 0.0 {
        let width = area.width as f32 * scale_x.abs();
        let height = area.height as f32 * scale_y.abs();
        let origin = Point::new(
            position.x - (anchor_x * width) as i32,
            position.y - (anchor_y * height) as i32,
        );
        if scale_x == 1.0 && scale_y == 1.0 {
            blit(target, origin, source, area);
        } else {
            blit_scaled(target, origin, source, area, scale_x, scale_y);
        }
        return;
    }

    let area = area.intersection(&Rect::of_size(source.size()));
    if area.is_empty() || scale_x == 0.0 || scale_y == 0.0 {
        return;
    }

    let width = area.width as f32 * scale_x.abs();
    let height = area.height as f32 * scale_y.abs();
    let pivot_x = anchor_x * width;
    let pivot_y = anchor_y * height;

    let (sin, cos) = rotation.sin_cos();

    // Bounding box of the rotated quad around the pivot.
    let corners = [
        (-pivot_x, -pivot_y),
        (width - pivot_x, -pivot_y),
        (-pivot_x, height - pivot_y),
        (width - pivot_x, height - pivot_y),
    ];
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (cx, cy) in corners {
        let rx = cx * cos - cy * sin;
        let ry = cx * sin + cy * cos;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }

    let shifting = target.state().shifting;
    let transparent = target.state().transparent;
    let clipping = target.state().clipping;

    for y in (position.y + min_y.floor() as i32)..=(position.y + max_y.ceil() as i32) {
        for x in (position.x + min_x.floor() as i32)..=(position.x + max_x.ceil() as i32) {
            if !clipping.contains(x, y) {
                continue;
            }
            // Rotate back into the scaled source frame.
            let rel_x = (x - position.x) as f32 + 0.5;
            let rel_y = (y - position.y) as f32 + 0.5;
            let u = rel_x * cos + rel_y * sin + pivot_x;
            let v = -rel_x * sin + rel_y * cos + pivot_y;
            if u < 0.0 || u >= width || v < 0.0 || v >= height {
                continue;
            }
            let mut su = (u / scale_x.abs()) as i32;
            let mut sv = (v / scale_y.abs()) as i32;
            if scale_x < 0.0 {
                su = area.width as i32 - 1 - su;
            }
            if scale_y < 0.0 {
                sv = area.height as i32 - 1 - sv;
            }
            let index = shifting[source.peek(area.x + su, area.y + sv) as usize];
            if transparent[index as usize] {
                continue;
            }
            let offset = target.offset(x, y);
            target.data_mut()[offset] = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dotted_source() -> Surface {
        // 16x16, index 0 everywhere except (8, 8) = 7.
        let mut source = Surface::new(16, 16);
        source.poke(8, 8, 7);
        source
    }

    #[test]
    fn blit_skips_transparent_pixels() {
        let source = dotted_source();
        let mut target = Surface::new(16, 16);
        target.clear(3);
        let before = target.data().to_vec();

        target.set_transparent(&[(0, true)]);
        blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 16, 16));

        for y in 0..16 {
            for x in 0..16 {
                let expected = if (x, y) == (8, 8) {
                    7
                } else {
                    before[y as usize * 16 + x as usize]
                };
                assert_eq!(target.peek(x, y), expected);
            }
        }
    }

    #[test]
    fn blit_then_inverse_copy_restores_the_target() {
        let mut source = Surface::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                source.poke(x, y, (y * 4 + x) as Pixel + 1);
            }
        }
        let mut target = Surface::new(8, 8);
        target.clear(9);
        let before = target.data().to_vec();
        let backup = target.data().to_vec();

        // With transparency disabled a blit is a plain region copy, so
        // copying the prior content back restores the target bitwise.
        target.set_transparent(&[(0, false)]);
        blit(&mut target, Point::new(2, 2), &source, Rect::new(0, 0, 4, 4));
        assert_ne!(target.data(), before.as_slice());

        let snapshot = Surface::from_data(8, 8, backup);
        copy(&mut target, Point::new(2, 2), &snapshot, Rect::new(2, 2, 4, 4));
        assert_eq!(target.data(), before.as_slice());
    }

    #[test]
    fn blit_applies_shifting_on_source_indices() {
        let mut source = Surface::new(2, 1);
        source.poke(0, 0, 1);
        source.poke(1, 0, 2);

        let mut target = Surface::new(2, 1);
        target.set_shifting(&[(1, 5)]);
        blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 2, 1));

        assert_eq!(target.peek(0, 0), 5);
        assert_eq!(target.peek(1, 0), 2);
    }

    #[test]
    fn blit_is_clipped() {
        let source = dotted_source();
        let mut target = Surface::new(16, 16);
        target.set_clipping(Some(Rect::new(0, 0, 4, 4)));
        blit(&mut target, Point::new(0, 0), &source, Rect::new(0, 0, 16, 16));
        assert_eq!(target.peek(8, 8), 0); // Outside the clip: untouched.
    }

    #[test]
    fn blit_with_negative_position_samples_the_right_texels() {
        let mut source = Surface::new(4, 1);
        for x in 0..4 {
            source.poke(x, 0, x as Pixel + 1);
        }
        let mut target = Surface::new(4, 1);
        blit(&mut target, Point::new(-2, 0), &source, Rect::new(0, 0, 4, 1));
        assert_eq!(target.peek(0, 0), 3);
        assert_eq!(target.peek(1, 0), 4);
        assert_eq!(target.peek(2, 0), 0);
    }

    #[test]
    fn tile_wraps_the_source() {
        let mut source = Surface::new(2, 2);
        source.poke(0, 0, 1);
        source.poke(1, 0, 2);
        source.poke(0, 1, 3);
        source.poke(1, 1, 4);

        let mut target = Surface::new(4, 4);
        target.set_transparent(&[(0, false)]);
        // The destination area is the source area's size; wrap from offset.
        tile(
            &mut target,
            Point::new(0, 0),
            &source,
            Rect::new(0, 0, 2, 2),
            Point::new(1, 0),
        );
        assert_eq!(target.peek(0, 0), 2);
        assert_eq!(target.peek(1, 0), 1);
        assert_eq!(target.peek(0, 1), 4);
        assert_eq!(target.peek(1, 1), 3);
    }

    #[test]
    fn stencil_gates_by_mask_value() {
        let mut source = Surface::new(2, 1);
        source.poke(0, 0, 5);
        source.poke(1, 0, 5);

        let mut mask = Surface::new(2, 1);
        mask.poke(0, 0, 0);
        mask.poke(1, 0, 9);

        let mut target = Surface::new(2, 1);
        stencil(
            &mut target,
            Point::new(0, 0),
            &source,
            Rect::new(0, 0, 2, 1),
            &mask,
            Comparator::Greater,
            4,
        );
        assert_eq!(target.peek(0, 0), 0);
        assert_eq!(target.peek(1, 0), 5);
    }

    #[test]
    fn blend_adds_through_the_palette() {
        use crate::graphics::color::Rgba;
        let palette = Palette::from_colors(&[
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(100, 0, 0),
            Rgba::opaque(0, 100, 0),
            Rgba::opaque(100, 100, 0),
        ]);

        let mut source = Surface::new(1, 1);
        source.poke(0, 0, 1); // Red-ish.
        let mut target = Surface::new(1, 1);
        target.poke(0, 0, 2); // Green-ish.

        blend(
            &mut target,
            Point::new(0, 0),
            &source,
            Rect::new(0, 0, 1, 1),
            &palette,
            BlendFunction::AddClamped,
        );
        assert_eq!(target.peek(0, 0), 3); // Nearest to (100, 100, 0).
    }

    #[test]
    fn process_sees_both_sides() {
        let mut source = Surface::new(1, 1);
        source.poke(0, 0, 3);
        let mut target = Surface::new(1, 1);
        target.poke(0, 0, 4);

        process(
            &mut target,
            Point::new(0, 0),
            &source,
            Rect::new(0, 0, 1, 1),
            |_, _, from, to| from + to,
        );
        assert_eq!(target.peek(0, 0), 7);
    }

    #[test]
    fn scaled_blit_doubles_pixels() {
        let mut source = Surface::new(2, 1);
        source.poke(0, 0, 1);
        source.poke(1, 0, 2);

        let mut target = Surface::new(4, 2);
        target.set_transparent(&[(0, false)]);
        blit_scaled(
            &mut target,
            Point::new(0, 0),
            &source,
            Rect::new(0, 0, 2, 1),
            2.0,
            2.0,
        );
        assert_eq!(target.peek(0, 0), 1);
        assert_eq!(target.peek(1, 0), 1);
        assert_eq!(target.peek(2, 0), 2);
        assert_eq!(target.peek(3, 1), 2);
    }

    #[test]
    fn rotated_blit_quarter_turn() {
        let mut source = Surface::new(2, 1);
        source.poke(0, 0, 1);
        source.poke(1, 0, 2);

        let mut target = Surface::new(5, 5);
        blit_scaled_rotated(
            &mut target,
            Point::new(2, 2),
            &source,
            Rect::new(0, 0, 2, 1),
            1.0,
            1.0,
            std::f32::consts::FRAC_PI_2,
            0.0,
            0.0,
        );
        // A quarter turn maps the horizontal strip onto a vertical one.
        let written: Vec<(i32, i32, Pixel)> = (0..5)
            .flat_map(|y| (0..5).map(move |x| (x, y)))
            .filter_map(|(x, y)| {
                let p = target.peek(x, y);
                (p != 0).then_some((x, y, p))
            })
            .collect();
        assert_eq!(written.len(), 2);
        let (x0, _, _) = written[0];
        assert!(written.iter().all(|&(x, _, _)| x == x0));
    }
}
