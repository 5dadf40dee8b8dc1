//! Drawing primitives over a [`Surface`]. Every operator clips to the
//! top-of-stack clipping region.

use crate::graphics::surface::Surface;
use crate::graphics::{Pixel, Point, Rect};

/// Fill vs. outline rendering for the closed shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Fill,
    Line,
}

impl DrawMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fill" => Some(DrawMode::Fill),
            "line" => Some(DrawMode::Line),
            _ => None,
        }
    }
}

impl Surface {
    /// Fill the whole surface, clipping region ignored.
    pub fn clear(&mut self, index: Pixel) {
        self.data_mut().fill(index);
    }

    #[inline]
    fn plot(&mut self, x: i32, y: i32, index: Pixel) {
        if self.state().clipping.contains(x, y) {
            let offset = self.offset(x, y);
            self.data_mut()[offset] = index;
        }
    }

    pub fn point(&mut self, x: i32, y: i32, index: Pixel) {
        self.plot(x, y, index);
    }

    pub fn hline(&mut self, x: i32, y: i32, length: u32, index: Pixel) {
        let clip = self.state().clipping;
        if y < clip.y || y >= clip.bottom() {
            return;
        }
        let x0 = x.max(clip.x);
        let x1 = (x + length as i32).min(clip.right());
        if x0 >= x1 {
            return;
        }
        let start = self.offset(x0, y);
        let end = self.offset(x1 - 1, y) + 1;
        self.data_mut()[start..end].fill(index);
    }

    pub fn vline(&mut self, x: i32, y: i32, length: u32, index: Pixel) {
        let clip = self.state().clipping;
        if x < clip.x || x >= clip.right() {
            return;
        }
        let y0 = y.max(clip.y);
        let y1 = (y + length as i32).min(clip.bottom());
        for yy in y0..y1 {
            let offset = self.offset(x, yy);
            self.data_mut()[offset] = index;
        }
    }

    /// Bresenham line between two points, endpoints included.
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, index: Pixel) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut error = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.plot(x, y, index);
            if x == x1 && y == y1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += sx;
            }
            if doubled <= dx {
                error += dx;
                y += sy;
            }
        }
    }

    pub fn polyline(&mut self, points: &[Point], index: Pixel) {
        for pair in points.windows(2) {
            self.line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, index);
        }
    }

    pub fn rectangle(&mut self, mode: DrawMode, rect: Rect, index: Pixel) {
        if rect.is_empty() {
            return;
        }
        match mode {
            DrawMode::Fill => {
                for y in rect.y..rect.bottom() {
                    self.hline(rect.x, y, rect.width, index);
                }
            }
            DrawMode::Line => {
                self.hline(rect.x, rect.y, rect.width, index);
                self.hline(rect.x, rect.bottom() - 1, rect.width, index);
                if rect.height > 2 {
                    self.vline(rect.x, rect.y + 1, rect.height - 2, index);
                    self.vline(rect.right() - 1, rect.y + 1, rect.height - 2, index);
                }
            }
        }
    }

    pub fn triangle(
        &mut self,
        mode: DrawMode,
        v0: Point,
        v1: Point,
        v2: Point,
        index: Pixel,
    ) {
        match mode {
            DrawMode::Line => {
                self.line(v0.x, v0.y, v1.x, v1.y, index);
                self.line(v1.x, v1.y, v2.x, v2.y, index);
                self.line(v2.x, v2.y, v0.x, v0.y, index);
            }
            DrawMode::Fill => {
                let orient = |a: Point, b: Point, x: i32, y: i32| -> i64 {
                    (b.x - a.x) as i64 * (y - a.y) as i64 - (b.y - a.y) as i64 * (x - a.x) as i64
                };
                let min_x = v0.x.min(v1.x).min(v2.x);
                let max_x = v0.x.max(v1.x).max(v2.x);
                let min_y = v0.y.min(v1.y).min(v2.y);
                let max_y = v0.y.max(v1.y).max(v2.y);
                for y in min_y..=max_y {
                    for x in min_x..=max_x {
                        let w0 = orient(v1, v2, x, y);
                        let w1 = orient(v2, v0, x, y);
                        let w2 = orient(v0, v1, x, y);
                        let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0)
                            || (w0 <= 0 && w1 <= 0 && w2 <= 0);
                        if inside {
                            self.plot(x, y, index);
                        }
                    }
                }
            }
        }
    }

    pub fn circle(&mut self, mode: DrawMode, cx: i32, cy: i32, radius: u32, index: Pixel) {
        if radius == 0 {
            self.plot(cx, cy, index);
            return;
        }
        // Midpoint circle; the filled variant emits spans per step.
        let mut x = radius as i32;
        let mut y = 0;
        let mut error = 1 - x;
        while x >= y {
            match mode {
                DrawMode::Line => {
                    for (px, py) in [
                        (cx + x, cy + y),
                        (cx - x, cy + y),
                        (cx + x, cy - y),
                        (cx - x, cy - y),
                        (cx + y, cy + x),
                        (cx - y, cy + x),
                        (cx + y, cy - x),
                        (cx - y, cy - x),
                    ] {
                        self.plot(px, py, index);
                    }
                }
                DrawMode::Fill => {
                    let span_x = (2 * x + 1) as u32;
                    let span_y = (2 * y + 1) as u32;
                    self.hline(cx - x, cy + y, span_x, index);
                    self.hline(cx - x, cy - y, span_x, index);
                    self.hline(cx - y, cy + x, span_y, index);
                    self.hline(cx - y, cy - x, span_y, index);
                }
            }
            y += 1;
            if error < 0 {
                error += 2 * y + 1;
            } else {
                x -= 1;
                error += 2 * (y - x) + 1;
            }
        }
    }

    /// Seed fill starting at `(x, y)`: every 4-connected pixel holding the
    /// seed's current value (within the clipping region) is replaced.
    pub fn fill(&mut self, x: i32, y: i32, index: Pixel) {
        let clip = self.state().clipping;
        if !clip.contains(x, y) {
            return;
        }
        let match_index = self.peek(x, y);
        if match_index == index {
            return;
        }
        let mut stack = vec![(x, y)];
        while let Some((px, py)) = stack.pop() {
            if !clip.contains(px, py) || self.peek(px, py) != match_index {
                continue;
            }
            let offset = self.offset(px, py);
            self.data_mut()[offset] = index;
            stack.push((px + 1, py));
            stack.push((px - 1, py));
            stack.push((px, py + 1));
            stack.push((px, py - 1));
        }
    }

    /// Call `callback(x, y, index)` for every pixel in `rect` (clipped) and
    /// write back the returned index.
    pub fn scan<F>(&mut self, rect: Rect, mut callback: F)
    where
        F: FnMut(i32, i32, Pixel) -> Pixel,
    {
        let area = rect.intersection(&self.state().clipping);
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let offset = self.offset(x, y);
                let current = self.data()[offset];
                let next = callback(x, y, current);
                self.data_mut()[offset] = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_fills_everything() {
        let mut surface = Surface::new(4, 4);
        surface.set_clipping(Some(Rect::new(1, 1, 2, 2)));
        surface.clear(7);
        assert!(surface.data().iter().all(|&p| p == 7));
    }

    #[test]
    fn primitives_fully_outside_the_clip_are_no_ops() {
        let mut surface = Surface::new(8, 8);
        surface.set_clipping(Some(Rect::new(0, 0, 4, 4)));
        surface.hline(5, 5, 3, 9);
        surface.vline(6, 0, 8, 9);
        surface.rectangle(DrawMode::Fill, Rect::new(4, 4, 4, 4), 9);
        surface.circle(DrawMode::Line, 6, 6, 1, 9);
        assert!(surface.data().iter().all(|&p| p == 0));
    }

    #[test]
    fn hline_is_clipped_at_both_ends() {
        let mut surface = Surface::new(8, 1);
        surface.set_clipping(Some(Rect::new(2, 0, 4, 1)));
        surface.hline(0, 0, 8, 3);
        let expected = [0, 0, 3, 3, 3, 3, 0, 0];
        assert_eq!(surface.data(), &expected);
    }

    #[test]
    fn line_draws_both_endpoints() {
        let mut surface = Surface::new(4, 4);
        surface.line(0, 0, 3, 3, 5);
        assert_eq!(surface.peek(0, 0), 5);
        assert_eq!(surface.peek(3, 3), 5);
        assert_eq!(surface.peek(1, 1), 5);
        assert_eq!(surface.peek(2, 2), 5);
    }

    #[test]
    fn filled_rectangle_covers_its_area() {
        let mut surface = Surface::new(6, 6);
        surface.rectangle(DrawMode::Fill, Rect::new(1, 2, 3, 2), 4);
        for y in 0..6 {
            for x in 0..6 {
                let inside = (1..4).contains(&x) && (2..4).contains(&y);
                assert_eq!(surface.peek(x, y), if inside { 4 } else { 0 });
            }
        }
    }

    #[test]
    fn stroked_rectangle_is_hollow() {
        let mut surface = Surface::new(5, 5);
        surface.rectangle(DrawMode::Line, Rect::new(0, 0, 5, 5), 2);
        assert_eq!(surface.peek(0, 0), 2);
        assert_eq!(surface.peek(4, 4), 2);
        assert_eq!(surface.peek(2, 0), 2);
        assert_eq!(surface.peek(0, 2), 2);
        assert_eq!(surface.peek(2, 2), 0);
    }

    #[test]
    fn filled_triangle_contains_its_vertices() {
        let mut surface = Surface::new(8, 8);
        surface.triangle(
            DrawMode::Fill,
            Point::new(0, 0),
            Point::new(7, 0),
            Point::new(0, 7),
            6,
        );
        assert_eq!(surface.peek(0, 0), 6);
        assert_eq!(surface.peek(7, 0), 6);
        assert_eq!(surface.peek(0, 7), 6);
        assert_eq!(surface.peek(2, 2), 6);
        assert_eq!(surface.peek(7, 7), 0);
    }

    #[test]
    fn seed_fill_respects_boundaries() {
        let mut surface = Surface::new(5, 5);
        surface.rectangle(DrawMode::Line, Rect::new(0, 0, 5, 5), 1);
        surface.fill(2, 2, 8);
        assert_eq!(surface.peek(2, 2), 8);
        assert_eq!(surface.peek(1, 1), 8);
        assert_eq!(surface.peek(0, 0), 1); // The border is untouched.
    }

    #[test]
    fn scan_transforms_in_place() {
        let mut surface = Surface::new(4, 4);
        surface.clear(1);
        surface.scan(Rect::new(0, 0, 4, 2), |_, _, index| index + 10);
        assert_eq!(surface.peek(0, 0), 11);
        assert_eq!(surface.peek(3, 1), 11);
        assert_eq!(surface.peek(0, 2), 1);
    }

    #[test]
    fn rewriting_scanned_values_is_idempotent() {
        let mut surface = Surface::new(4, 4);
        surface.line(0, 0, 3, 2, 9);
        let before = surface.data().to_vec();
        let snapshot = before.clone();
        surface.scan(Rect::new(0, 0, 4, 4), |x, y, _| {
            snapshot[y as usize * 4 + x as usize]
        });
        assert_eq!(surface.data(), before.as_slice());
    }
}
