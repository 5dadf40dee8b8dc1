//! A batch: a capacity-bounded queue of sprite draw requests over one
//! sheet, flushed in a single sweep.

use std::rc::Rc;

use crate::graphics::blit;
use crate::graphics::sheet::Sheet;
use crate::graphics::surface::Surface;
use crate::graphics::Point;

#[derive(Debug, Clone, Copy)]
pub struct Sprite {
    pub cell_id: u32,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
}

impl Sprite {
    pub fn at(cell_id: u32, x: f32, y: f32) -> Self {
        Self {
            cell_id,
            x,
            y,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
        }
    }
}

pub struct Batch {
    sheet: Rc<Sheet>,
    entries: Vec<Sprite>,
    capacity: usize,
}

impl Batch {
    pub fn new(sheet: Rc<Sheet>, capacity: usize) -> Self {
        Self {
            sheet,
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a sprite; `false` when the batch is full.
    pub fn add(&mut self, sprite: Sprite) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(sprite);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Change the capacity, discarding overflowing entries.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.entries.truncate(capacity);
    }

    pub fn grow(&mut self, amount: usize) {
        self.capacity += amount;
        self.entries.reserve(amount);
    }

    /// Draw every queued sprite onto `target`, in insertion order. The
    /// queue is kept; pair with [`Batch::clear`] for one-shot usage.
    pub fn flush(&mut self, target: &mut Surface) {
        let atlas = self.sheet.atlas().borrow();
        for sprite in &self.entries {
            let Some(cell) = self.sheet.cell(sprite.cell_id) else {
                continue;
            };
            if sprite.rotation == 0.0
                && sprite.scale_x == 1.0
                && sprite.scale_y == 1.0
                && sprite.anchor_x == 0.0
                && sprite.anchor_y == 0.0
            {
                blit::blit(
                    target,
                    Point::new(sprite.x as i32, sprite.y as i32),
                    &atlas,
                    cell,
                );
            } else {
                blit::blit_scaled_rotated(
                    target,
                    Point::new(sprite.x as i32, sprite.y as i32),
                    &atlas,
                    cell,
                    sprite.scale_x,
                    sprite.scale_y,
                    sprite.rotation,
                    sprite.anchor_x,
                    sprite.anchor_y,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn sheet() -> Rc<Sheet> {
        let mut atlas = Surface::new(4, 2);
        atlas.poke(0, 0, 1); // Cell 0 marker.
        atlas.poke(2, 0, 2); // Cell 1 marker.
        Rc::new(Sheet::new_fixed(Rc::new(RefCell::new(atlas)), 2, 2).unwrap())
    }

    #[test]
    fn capacity_bounds_the_queue() {
        let mut batch = Batch::new(sheet(), 2);
        assert!(batch.add(Sprite::at(0, 0.0, 0.0)));
        assert!(batch.add(Sprite::at(1, 2.0, 0.0)));
        assert!(!batch.add(Sprite::at(0, 4.0, 0.0)));

        batch.grow(1);
        assert!(batch.add(Sprite::at(0, 4.0, 0.0)));
        assert_eq!(batch.len(), 3);

        batch.resize(1);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn flush_draws_in_insertion_order() {
        let mut batch = Batch::new(sheet(), 8);
        batch.add(Sprite::at(0, 0.0, 0.0));
        batch.add(Sprite::at(1, 1.0, 0.0)); // Overlaps the first sprite.

        let mut target = Surface::new(4, 2);
        batch.flush(&mut target);

        // The second sprite's marker lands over the first one's area.
        assert_eq!(target.peek(1, 0), 2);
        assert_eq!(target.peek(0, 0), 1);

        batch.clear();
        assert!(batch.is_empty());
    }
}
