//! Display subsystem: owns the screen surface, the display palette and
//! program (copperlist), the RGBA staging buffer and the presentation
//! backend.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::errors::EngineError;
use crate::graphics::copperlist::Copperlist;
use crate::graphics::palette::Palette;
use crate::graphics::program::Program;
use crate::graphics::surface::Surface;
use crate::graphics::{Pixel, Point, Size};
use crate::platform::{Frame, VideoBackend};

pub struct Display {
    backend: Box<dyn VideoBackend>,
    surface: Rc<RefCell<Surface>>,
    copperlist: Copperlist,
    vram: Vec<u8>,
    offset: Point,
    /// Accumulates for the display's whole lifetime; feeds the effect
    /// shader's `u_time`.
    time: f64,
}

impl Display {
    pub fn new(backend: Box<dyn VideoBackend>) -> Self {
        let canvas = backend.layout().canvas;
        let mut surface = Surface::new(canvas.width, canvas.height);
        surface.clear(0);
        debug!("display ready w/ {}x{} canvas", canvas.width, canvas.height);

        Self {
            backend,
            surface: Rc::new(RefCell::new(surface)),
            copperlist: Copperlist::new(),
            vram: vec![0; canvas.width as usize * canvas.height as usize * 4],
            offset: Point::default(),
            time: 0.0,
        }
    }

    pub fn canvas_size(&self) -> Size {
        self.backend.layout().canvas
    }

    pub fn physical_size(&self) -> Size {
        let present = self.backend.layout().present;
        Size::new(present.width, present.height)
    }

    /// The ratio between the physical output and the virtual canvas.
    pub fn scale(&self) -> f32 {
        self.physical_size().width as f32 / self.canvas_size().width as f32
    }

    /// The screen surface, shareable with script-visible canvases.
    pub fn surface(&self) -> Rc<RefCell<Surface>> {
        self.surface.clone()
    }

    pub fn palette(&self) -> &Palette {
        self.copperlist.palette()
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        self.copperlist.palette_mut()
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.copperlist.set_palette(palette);
    }

    pub fn set_shifting(&mut self, pairs: &[(Pixel, Pixel)]) {
        self.copperlist.set_shifting(pairs);
    }

    pub fn set_program(&mut self, program: Option<Program>) {
        self.copperlist.set_program(program);
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Drop the display program, the display-level shifting and the
    /// present offset.
    pub fn reset(&mut self) {
        self.offset = Point::default();
        self.copperlist.reset();
    }

    pub fn should_close(&self) -> bool {
        self.backend.should_close()
    }

    pub fn request_close(&mut self) {
        self.backend.request_close();
    }

    pub fn backend(&self) -> &dyn VideoBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn VideoBackend {
        self.backend.as_mut()
    }

    pub fn update(&mut self, delta_time: f64) -> bool {
        self.time += delta_time;
        true
    }

    /// Convert the canvas to RGBA through the display program and hand it
    /// to the backend.
    pub fn present(&mut self) -> Result<(), EngineError> {
        let surface = self.surface.borrow();
        self.copperlist.surface_to_rgba(&surface, &mut self.vram);

        self.backend.present(&Frame {
            pixels: &self.vram,
            width: surface.width(),
            height: surface.height(),
            offset: self.offset,
            time: self.time as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::color::Rgba;
    use crate::platform::headless::HeadlessBackend;
    use crate::platform::VideoSettings;

    fn display(width: u32, height: u32) -> Display {
        let backend = HeadlessBackend::new(&VideoSettings {
            width,
            height,
            scale: 2,
            ..VideoSettings::default()
        })
        .unwrap();
        Display::new(Box::new(backend))
    }

    fn headless(display: &Display) -> &HeadlessBackend {
        display
            .backend()
            .as_any()
            .downcast_ref::<HeadlessBackend>()
            .unwrap()
    }

    #[test]
    fn boot_and_clear_reaches_the_framebuffer() {
        let mut display = display(320, 200);
        display.set_palette(Palette::from_colors(&[
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(10, 10, 10),
            Rgba::opaque(20, 20, 20),
            Rgba::opaque(30, 30, 30),
            Rgba::opaque(40, 40, 40),
            Rgba::opaque(50, 60, 70),
        ]));

        display.surface().borrow_mut().clear(5);
        display.present().unwrap();

        let backend = headless(&display);
        let (width, height, pixels) = backend.last_frame().unwrap();
        assert_eq!((width, height), (320, 200));
        assert_eq!(&pixels[0..4], &[50, 60, 70, 255]);
    }

    #[test]
    fn scale_reflects_the_layout() {
        let display = display(320, 200);
        assert_eq!(display.canvas_size(), Size::new(320, 200));
        assert_eq!(display.physical_size(), Size::new(640, 400));
        assert_eq!(display.scale(), 2.0);
    }

    #[test]
    fn time_accumulates_across_updates() {
        let mut display = display(64, 64);
        display.update(0.5);
        display.update(0.25);
        assert!((display.time - 0.75).abs() < 1e-9);
    }
}
