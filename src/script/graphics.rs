//! The `miso.graphics.*` modules: images, canvases, banks, batches,
//! fonts, palettes, display programs and transforms.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Function, Lua, Table, UserData, UserDataMethods, UserDataRef};

use crate::graphics::batch::{Batch, Sprite};
use crate::graphics::blit::{self, BlendFunction, Comparator};
use crate::graphics::color::Rgba;
use crate::graphics::font::Font;
use crate::graphics::palette::Palette;
use crate::graphics::primitives::DrawMode;
use crate::graphics::program::Program;
use crate::graphics::sheet::Sheet;
use crate::graphics::surface::Surface;
use crate::graphics::xform::{Register, Wrap, XForm};
use crate::graphics::{Pixel, Point, Rect, CELL_NIL};
use crate::script::context::host;
use crate::storage::resource::ResourceKind;

/// Alpha below this maps to the transparent index when palettizing
/// decoded RGBA images.
const ALPHA_THRESHOLD: u8 = 128;

fn parse_colors(table: &Table) -> mlua::Result<Vec<Rgba>> {
    let mut colors = Vec::new();
    for entry in table.sequence_values::<Table>() {
        let entry = entry?;
        colors.push(Rgba::opaque(entry.get(1)?, entry.get(2)?, entry.get(3)?));
    }
    Ok(colors)
}

/// The optional trailing `ox, oy, w, h` source-area arguments.
type AreaArgs = (Option<i32>, Option<i32>, Option<u32>, Option<u32>);

fn area_of(surface: &Rc<RefCell<Surface>>, (ox, oy, w, h): AreaArgs) -> Rect {
    let surface = surface.borrow();
    Rect::new(
        ox.unwrap_or(0),
        oy.unwrap_or(0),
        w.unwrap_or(surface.width()),
        h.unwrap_or(surface.height()),
    )
}

/// Run a target/source operation, copying the source first when both
/// wrap the same surface.
fn with_source<R>(
    target: &Rc<RefCell<Surface>>,
    source: &Rc<RefCell<Surface>>,
    operation: impl FnOnce(&mut Surface, &Surface) -> R,
) -> R {
    if Rc::ptr_eq(target, source) {
        let snapshot = {
            let source = source.borrow();
            Surface::from_data(source.width(), source.height(), source.data().to_vec())
        };
        operation(&mut target.borrow_mut(), &snapshot)
    } else {
        operation(&mut target.borrow_mut(), &source.borrow())
    }
}

fn palettize(width: u32, height: u32, pixels: &[u8], palette: &Palette) -> Surface {
    let data = pixels
        .chunks_exact(4)
        .map(|rgba| {
            if rgba[3] < ALPHA_THRESHOLD {
                0
            } else {
                palette.find_nearest(Rgba::new(rgba[0], rgba[1], rgba[2], rgba[3]))
            }
        })
        .collect();
    Surface::from_data(width, height, data)
}

// ---------- Image ----------

pub struct ImageObject {
    pub surface: Rc<RefCell<Surface>>,
}

fn load_image_surface(
    lua: &Lua,
    name: &str,
    palette: Option<&Palette>,
) -> mlua::Result<Surface> {
    let context = host(lua)?;
    let resource = context
        .storage
        .borrow_mut()
        .load(name, ResourceKind::Image)
        .map_err(mlua::Error::external)?;
    let (width, height, pixels) = resource
        .as_image()
        .ok_or_else(|| mlua::Error::runtime(format!("`{name}` is not an image")))?;
    let surface = match palette {
        Some(palette) => palettize(width, height, pixels, palette),
        None => {
            let display = context.display.borrow();
            palettize(width, height, pixels, display.palette())
        }
    };
    Ok(surface)
}

impl UserData for ImageObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("size", |_, this, ()| {
            let surface = this.surface.borrow();
            Ok((surface.width(), surface.height()))
        });
        methods.add_method("center", |_, this, ()| {
            let center = this.surface.borrow().center();
            Ok((center.x, center.y))
        });
        methods.add_method("clear", |_, this, index: Option<Pixel>| {
            this.surface.borrow_mut().clear(index.unwrap_or(0));
            Ok(())
        });
        methods.add_method("peek", |_, this, (x, y): (i32, i32)| {
            Ok(this.surface.borrow().peek(x, y))
        });
        methods.add_method("poke", |_, this, (x, y, index): (i32, i32, Pixel)| {
            this.surface.borrow_mut().poke(x, y, index);
            Ok(())
        });
    }
}

pub fn image_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |lua, (first, second): (Option<mlua::Value>, Option<mlua::Value>)| {
                let surface = match (first, second) {
                    // The screen surface.
                    (None, _) => {
                        let context = host(lua)?;
                        let display = context.display.borrow();
                        return Ok(ImageObject {
                            surface: display.surface(),
                        });
                    }
                    // A blank offscreen surface.
                    (Some(mlua::Value::Integer(width)), Some(mlua::Value::Integer(height))) => {
                        Surface::new(width as u32, height as u32)
                    }
                    // A palettized asset, matched against an explicit
                    // palette or the display's one.
                    (Some(mlua::Value::String(name)), second) => {
                        let palette = match second {
                            Some(mlua::Value::UserData(userdata)) => {
                                Some(userdata.borrow::<PaletteObject>()?.palette.clone())
                            }
                            _ => None,
                        };
                        load_image_surface(lua, &name.to_string_lossy(), palette.as_ref())?
                    }
                    _ => {
                        return Err(mlua::Error::runtime(
                            "expected (), (width, height) or (name [, palette])",
                        ))
                    }
                };
                Ok(ImageObject {
                    surface: Rc::new(RefCell::new(surface)),
                })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Canvas ----------

pub struct CanvasObject {
    pub surface: Rc<RefCell<Surface>>,
}

impl UserData for CanvasObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("size", |_, this, ()| {
            let surface = this.surface.borrow();
            Ok((surface.width(), surface.height()))
        });
        methods.add_method("center", |_, this, ()| {
            let center = this.surface.borrow().center();
            Ok((center.x, center.y))
        });

        // -- state stack --
        methods.add_method("push", |_, this, ()| {
            this.surface.borrow_mut().push();
            Ok(())
        });
        methods.add_method("pop", |_, this, count: Option<usize>| {
            this.surface.borrow_mut().pop(count.unwrap_or(1));
            Ok(())
        });
        methods.add_method("reset", |_, this, ()| {
            this.surface.borrow_mut().reset();
            Ok(())
        });
        methods.add_method(
            "clipping",
            |_, this, region: (Option<i32>, Option<i32>, Option<u32>, Option<u32>)| {
                let mut surface = this.surface.borrow_mut();
                match region {
                    (Some(x), Some(y), Some(width), Some(height)) => {
                        surface.set_clipping(Some(Rect::new(x, y, width, height)))
                    }
                    _ => surface.set_clipping(None),
                }
                Ok(())
            },
        );
        methods.add_method(
            "shift",
            |_, this, (first, to): (Option<mlua::Value>, Option<Pixel>)| {
                let mut surface = this.surface.borrow_mut();
                match (first, to) {
                    (None, _) => surface.set_shifting(&[]),
                    (Some(mlua::Value::Integer(from)), Some(to)) => {
                        surface.set_shifting(&[(from as Pixel, to)])
                    }
                    (Some(mlua::Value::Table(pairs)), _) => {
                        let mut entries = Vec::new();
                        for pair in pairs.pairs::<Pixel, Pixel>() {
                            let (from, to) = pair?;
                            entries.push((from, to));
                        }
                        surface.set_shifting(&entries);
                    }
                    _ => return Err(mlua::Error::runtime("expected (), (from, to) or (table)")),
                }
                Ok(())
            },
        );
        methods.add_method(
            "transparent",
            |_, this, (first, on): (Option<mlua::Value>, Option<bool>)| {
                let mut surface = this.surface.borrow_mut();
                match (first, on) {
                    (None, _) => surface.set_transparent(&[]),
                    (Some(mlua::Value::Integer(index)), Some(on)) => {
                        surface.set_transparent(&[(index as Pixel, on)])
                    }
                    (Some(mlua::Value::Table(pairs)), _) => {
                        let mut entries = Vec::new();
                        for pair in pairs.pairs::<Pixel, bool>() {
                            let (index, on) = pair?;
                            entries.push((index, on));
                        }
                        surface.set_transparent(&entries);
                    }
                    _ => {
                        return Err(mlua::Error::runtime(
                            "expected (), (index, flag) or (table)",
                        ))
                    }
                }
                Ok(())
            },
        );

        // -- primitives --
        methods.add_method("clear", |_, this, index: Option<Pixel>| {
            this.surface.borrow_mut().clear(index.unwrap_or(0));
            Ok(())
        });
        methods.add_method("point", |_, this, (x, y, index): (i32, i32, Pixel)| {
            this.surface.borrow_mut().point(x, y, index);
            Ok(())
        });
        methods.add_method(
            "hline",
            |_, this, (x, y, length, index): (i32, i32, u32, Pixel)| {
                this.surface.borrow_mut().hline(x, y, length, index);
                Ok(())
            },
        );
        methods.add_method(
            "vline",
            |_, this, (x, y, length, index): (i32, i32, u32, Pixel)| {
                this.surface.borrow_mut().vline(x, y, length, index);
                Ok(())
            },
        );
        methods.add_method(
            "line",
            |_, this, (x0, y0, x1, y1, index): (i32, i32, i32, i32, Pixel)| {
                this.surface.borrow_mut().line(x0, y0, x1, y1, index);
                Ok(())
            },
        );
        methods.add_method(
            "polyline",
            |_, this, (vertices, index): (Vec<i32>, Pixel)| {
                let points: Vec<Point> = vertices
                    .chunks_exact(2)
                    .map(|pair| Point::new(pair[0], pair[1]))
                    .collect();
                this.surface.borrow_mut().polyline(&points, index);
                Ok(())
            },
        );
        methods.add_method("fill", |_, this, (x, y, index): (i32, i32, Pixel)| {
            this.surface.borrow_mut().fill(x, y, index);
            Ok(())
        });
        methods.add_method(
            "triangle",
            |_,
             this,
             (mode, x0, y0, x1, y1, x2, y2, index): (
                String,
                i32,
                i32,
                i32,
                i32,
                i32,
                i32,
                Pixel,
            )| {
                let mode = DrawMode::parse(&mode)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown draw mode `{mode}`")))?;
                this.surface.borrow_mut().triangle(
                    mode,
                    Point::new(x0, y0),
                    Point::new(x1, y1),
                    Point::new(x2, y2),
                    index,
                );
                Ok(())
            },
        );
        methods.add_method(
            "rectangle",
            |_, this, (mode, x, y, width, height, index): (String, i32, i32, u32, u32, Pixel)| {
                let mode = DrawMode::parse(&mode)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown draw mode `{mode}`")))?;
                this.surface
                    .borrow_mut()
                    .rectangle(mode, Rect::new(x, y, width, height), index);
                Ok(())
            },
        );
        methods.add_method(
            "circle",
            |_, this, (mode, cx, cy, radius, index): (String, i32, i32, u32, Pixel)| {
                let mode = DrawMode::parse(&mode)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown draw mode `{mode}`")))?;
                this.surface.borrow_mut().circle(mode, cx, cy, radius, index);
                Ok(())
            },
        );
        methods.add_method("peek", |_, this, (x, y): (i32, i32)| {
            Ok(this.surface.borrow().peek(x, y))
        });
        methods.add_method("poke", |_, this, (x, y, index): (i32, i32, Pixel)| {
            this.surface.borrow_mut().poke(x, y, index);
            Ok(())
        });
        methods.add_method(
            "scan",
            |_, this, (callback, area): (Function, AreaArgs)| {
                let area = area_of(&this.surface, area);
                let mut failure = None;
                this.surface.borrow_mut().scan(area, |x, y, index| {
                    if failure.is_some() {
                        return index;
                    }
                    match callback.call::<Pixel>((x, y, index)) {
                        Ok(next) => next,
                        Err(error) => {
                            failure = Some(error);
                            index
                        }
                    }
                });
                match failure {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            },
        );

        // -- compositing --
        methods.add_method(
            "copy",
            |_,
             this,
             (image, x, y, area): (UserDataRef<ImageObject>, Option<i32>, Option<i32>, AreaArgs)| {
                let area = area_of(&image.surface, area);
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::copy(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                    );
                });
                Ok(())
            },
        );
        methods.add_method(
            "blit",
            |_,
             this,
             (image, x, y, area): (UserDataRef<ImageObject>, Option<i32>, Option<i32>, AreaArgs)| {
                let area = area_of(&image.surface, area);
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::blit(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                    );
                });
                Ok(())
            },
        );
        methods.add_method(
            "tile",
            |_,
             this,
             (image, x, y, offset_u, offset_v, area): (
                UserDataRef<ImageObject>,
                i32,
                i32,
                i32,
                i32,
                AreaArgs,
            )| {
                let area = area_of(&image.surface, area);
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::tile(
                        target,
                        Point::new(x, y),
                        source,
                        area,
                        Point::new(offset_u, offset_v),
                    );
                });
                Ok(())
            },
        );
        methods.add_method(
            "stencil",
            |_,
             this,
             (image, mask, comparator, threshold, x, y, area): (
                UserDataRef<ImageObject>,
                UserDataRef<ImageObject>,
                String,
                Pixel,
                Option<i32>,
                Option<i32>,
                AreaArgs,
            )| {
                let comparator = Comparator::parse(&comparator).ok_or_else(|| {
                    mlua::Error::runtime(format!("unknown comparator `{comparator}`"))
                })?;
                let area = area_of(&image.surface, area);
                let mask = mask.surface.borrow();
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::stencil(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                        &mask,
                        comparator,
                        threshold,
                    );
                });
                Ok(())
            },
        );
        methods.add_method(
            "blend",
            |lua,
             this,
             (image, function, x, y, area): (
                UserDataRef<ImageObject>,
                String,
                Option<i32>,
                Option<i32>,
                AreaArgs,
            )| {
                let function = BlendFunction::parse(&function).ok_or_else(|| {
                    mlua::Error::runtime(format!("unknown blend function `{function}`"))
                })?;
                let context = host(lua)?;
                let palette = context.display.borrow().palette().clone();
                let area = area_of(&image.surface, area);
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::blend(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                        &palette,
                        function,
                    );
                });
                Ok(())
            },
        );
        methods.add_method(
            "process",
            |_,
             this,
             (callback, image, x, y, area): (
                Function,
                UserDataRef<ImageObject>,
                Option<i32>,
                Option<i32>,
                AreaArgs,
            )| {
                let area = area_of(&image.surface, area);
                let mut failure = None;
                with_source(&this.surface, &image.surface, |target, source| {
                    blit::process(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                        |x, y, from, to| {
                            if failure.is_some() {
                                return to;
                            }
                            match callback.call::<Pixel>((x, y, from, to)) {
                                Ok(next) => next,
                                Err(error) => {
                                    failure = Some(error);
                                    to
                                }
                            }
                        },
                    );
                });
                match failure {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            },
        );
        methods.add_method(
            "xform",
            |_,
             this,
             (xform, image, x, y, area): (
                UserDataRef<XFormObject>,
                UserDataRef<ImageObject>,
                Option<i32>,
                Option<i32>,
                AreaArgs,
            )| {
                let area = area_of(&image.surface, area);
                with_source(&this.surface, &image.surface, |target, source| {
                    xform.xform.blit(
                        target,
                        Point::new(x.unwrap_or(0), y.unwrap_or(0)),
                        source,
                        area,
                    );
                });
                Ok(())
            },
        );
    }
}

pub fn canvas_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |lua, (first, height): (Option<mlua::Value>, Option<u32>)| {
                let surface = match (first, height) {
                    // The screen canvas.
                    (None, _) => {
                        let context = host(lua)?;
                        let display = context.display.borrow();
                        display.surface()
                    }
                    // An offscreen canvas.
                    (Some(mlua::Value::Integer(width)), Some(height)) => {
                        Rc::new(RefCell::new(Surface::new(width as u32, height)))
                    }
                    // A canvas over an existing image's surface.
                    (Some(mlua::Value::UserData(userdata)), _) => {
                        let image = userdata.borrow::<ImageObject>()?;
                        image.surface.clone()
                    }
                    _ => {
                        return Err(mlua::Error::runtime(
                            "expected (), (width, height) or (image)",
                        ))
                    }
                };
                Ok(CanvasObject { surface })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Bank ----------

pub struct BankObject {
    pub sheet: Rc<Sheet>,
}

impl UserData for BankObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("size", |_, this, cell: Option<u32>| {
            let size = this
                .sheet
                .cell_size(cell.unwrap_or(CELL_NIL))
                .ok_or_else(|| mlua::Error::runtime("cell is out of range"))?;
            Ok((size.width, size.height))
        });
        methods.add_method("count", |_, this, ()| Ok(this.sheet.count()));
    }
}

pub fn bank_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set("NIL", CELL_NIL)?;
    module.set(
        "new",
        lua.create_function(
            |lua, (image, first, second): (UserDataRef<ImageObject>, mlua::Value, Option<u32>)| {
                let sheet = match (first, second) {
                    // A uniform grid of cells.
                    (mlua::Value::Integer(cell_width), Some(cell_height)) => Sheet::new_fixed(
                        image.surface.clone(),
                        cell_width as u32,
                        cell_height,
                    ),
                    // An explicit cell table loaded from the storage.
                    (mlua::Value::String(name), _) => {
                        let name = name.to_string_lossy();
                        let context = host(lua)?;
                        let resource = context
                            .storage
                            .borrow_mut()
                            .load(&name, ResourceKind::Blob)
                            .map_err(mlua::Error::external)?;
                        let blob = resource
                            .as_blob()
                            .ok_or_else(|| mlua::Error::runtime("cells asset is not a blob"))?;
                        Sheet::new_from_blob(image.surface.clone(), blob)
                    }
                    _ => {
                        return Err(mlua::Error::runtime(
                            "expected (image, cw, ch) or (image, cells-name)",
                        ))
                    }
                }
                .map_err(mlua::Error::external)?;
                Ok(BankObject {
                    sheet: Rc::new(sheet),
                })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Batch ----------

pub struct BatchObject {
    batch: Batch,
}

impl UserData for BatchObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut(
            "add",
            |_,
             this,
             (cell_id, x, y, scale_x, scale_y, rotation, anchor_x, anchor_y): (
                u32,
                f32,
                f32,
                Option<f32>,
                Option<f32>,
                Option<f32>,
                Option<f32>,
                Option<f32>,
            )| {
                let sprite = Sprite {
                    cell_id,
                    x,
                    y,
                    scale_x: scale_x.unwrap_or(1.0),
                    scale_y: scale_y.unwrap_or(1.0),
                    rotation: rotation.unwrap_or(0.0),
                    anchor_x: anchor_x.unwrap_or(0.0),
                    anchor_y: anchor_y.unwrap_or(0.0),
                };
                if !this.batch.add(sprite) {
                    return Err(mlua::Error::runtime("batch is full"));
                }
                Ok(())
            },
        );
        methods.add_method_mut("clear", |_, this, ()| {
            this.batch.clear();
            Ok(())
        });
        methods.add_method_mut("resize", |_, this, capacity: usize| {
            this.batch.resize(capacity);
            Ok(())
        });
        methods.add_method_mut("grow", |_, this, amount: usize| {
            this.batch.grow(amount);
            Ok(())
        });
        methods.add_method_mut("flush", |_, this, canvas: UserDataRef<CanvasObject>| {
            this.batch.flush(&mut canvas.surface.borrow_mut());
            this.batch.clear();
            Ok(())
        });
    }
}

pub fn batch_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_, (bank, capacity): (UserDataRef<BankObject>, usize)| {
                Ok(BatchObject {
                    batch: Batch::new(bank.sheet.clone(), capacity),
                })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Font ----------

pub struct FontObject {
    font: Font,
}

impl UserData for FontObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method(
            "write",
            |_,
             this,
             (canvas, text, x, y, scale_x, scale_y): (
                UserDataRef<CanvasObject>,
                String,
                i32,
                i32,
                Option<f32>,
                Option<f32>,
            )| {
                let scale_x = scale_x.unwrap_or(1.0);
                this.font.write(
                    &mut canvas.surface.borrow_mut(),
                    Point::new(x, y),
                    &text,
                    scale_x,
                    scale_y.unwrap_or(scale_x),
                );
                Ok(())
            },
        );
        methods.add_method(
            "measure",
            |_, this, (text, scale_x, scale_y): (String, Option<f32>, Option<f32>)| {
                let scale_x = scale_x.unwrap_or(1.0);
                let size = this
                    .font
                    .measure(&text, scale_x, scale_y.unwrap_or(scale_x));
                Ok((size.width, size.height))
            },
        );
    }
}

pub fn font_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(
            |_,
             (image, cell_width, cell_height, alphabet): (
                UserDataRef<ImageObject>,
                u32,
                u32,
                Option<String>,
            )| {
                let sheet = Sheet::new_fixed(image.surface.clone(), cell_width, cell_height)
                    .map_err(mlua::Error::external)?;
                Ok(FontObject {
                    font: Font::new(Rc::new(sheet), alphabet.as_deref()),
                })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Palette ----------

pub struct PaletteObject {
    pub palette: Palette,
}

impl UserData for PaletteObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("size", |_, this, ()| Ok(this.palette.size()));
        methods.add_method("colors", |lua, this, ()| {
            let colors = lua.create_table()?;
            for (index, color) in this.palette.colors().iter().enumerate() {
                let entry = lua.create_table()?;
                entry.set(1, color.r)?;
                entry.set(2, color.g)?;
                entry.set(3, color.b)?;
                colors.set(index + 1, entry)?;
            }
            Ok(colors)
        });
        methods.add_method("peek", |_, this, index: Pixel| {
            let color = this.palette.get(index);
            Ok((color.r, color.g, color.b))
        });
        methods.add_method_mut(
            "poke",
            |_, this, (index, r, g, b): (Pixel, u8, u8, u8)| {
                this.palette.set(index, Rgba::opaque(r, g, b));
                Ok(())
            },
        );
        methods.add_method("match", |_, this, (r, g, b): (u8, u8, u8)| {
            Ok(this.palette.find_nearest(Rgba::opaque(r, g, b)))
        });
        methods.add_method_mut(
            "lerp",
            |_, this, (r, g, b, ratio): (u8, u8, u8, Option<f32>)| {
                this.palette
                    .lerp(Rgba::opaque(r, g, b), ratio.unwrap_or(0.5));
                Ok(())
            },
        );
        methods.add_method_mut(
            "merge",
            |_, this, (other, remove_duplicates): (UserDataRef<PaletteObject>, Option<bool>)| {
                this.palette
                    .merge(&other.palette, remove_duplicates.unwrap_or(true));
                Ok(())
            },
        );
    }
}

pub fn palette_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "mix",
        lua.create_function(
            |_, (r0, g0, b0, r1, g1, b1, ratio): (u8, u8, u8, u8, u8, u8, Option<f32>)| {
                let mixed = Palette::mix(
                    Rgba::opaque(r0, g0, b0),
                    Rgba::opaque(r1, g1, b1),
                    ratio.unwrap_or(0.5),
                );
                Ok((mixed.r, mixed.g, mixed.b))
            },
        )?,
    )?;
    module.set(
        "new",
        lua.create_function(
            |_, (first, green, blue): (Option<mlua::Value>, Option<usize>, Option<usize>)| {
                let palette = match (first, green, blue) {
                    (None, _, _) => Palette::default(),
                    (Some(mlua::Value::Integer(levels)), None, None) => {
                        Palette::greyscale(levels as usize)
                    }
                    (Some(mlua::Value::Integer(red)), Some(green), Some(blue)) => {
                        Palette::quantized(red as usize, green, blue)
                    }
                    (Some(mlua::Value::Table(colors)), _, _) => {
                        Palette::from_colors(&parse_colors(&colors)?)
                    }
                    _ => {
                        return Err(mlua::Error::runtime(
                            "expected (), (levels), (r, g, b) or (colors)",
                        ))
                    }
                };
                Ok(PaletteObject { palette })
            },
        )?,
    )?;
    Ok(module)
}

// ---------- Program ----------

pub struct ProgramObject {
    pub program: Program,
}

impl UserData for ProgramObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("clear", |_, this, ()| {
            this.program.clear();
            Ok(())
        });
        methods.add_method_mut(
            "erase",
            |_, this, (position, count): (usize, Option<usize>)| {
                this.program.erase(position, count.unwrap_or(1));
                Ok(())
            },
        );
        methods.add_method_mut("nop", |_, this, ()| {
            this.program.nop();
            Ok(())
        });
        methods.add_method_mut("wait", |_, this, (x, y): (u32, u32)| {
            this.program.wait(x, y);
            Ok(())
        });
        methods.add_method_mut("skip", |_, this, (dx, dy): (i32, i32)| {
            this.program.skip(dx, dy);
            Ok(())
        });
        methods.add_method_mut("modulo", |_, this, amount: i32| {
            this.program.modulo(amount);
            Ok(())
        });
        methods.add_method_mut("offset", |_, this, amount: i32| {
            this.program.offset(amount);
            Ok(())
        });
        methods.add_method_mut(
            "color",
            |_, this, (index, r, g, b): (Pixel, u8, u8, u8)| {
                this.program.color(index, Rgba::opaque(r, g, b));
                Ok(())
            },
        );
        methods.add_method_mut("shift", |_, this, (from, to): (Pixel, Pixel)| {
            this.program.shift(from, to);
            Ok(())
        });
        methods.add_method_mut(
            "gradient",
            |_, this, (index, stops): (Pixel, Table)| {
                let mut entries = Vec::new();
                for stop in stops.sequence_values::<Table>() {
                    let stop = stop?;
                    let scanline: u32 = stop.get(1)?;
                    entries.push((
                        scanline,
                        Rgba::opaque(stop.get(2)?, stop.get(3)?, stop.get(4)?),
                    ));
                }
                this.program.gradient(index, &entries);
                Ok(())
            },
        );
        methods.add_method_mut(
            "palette",
            |_, this, (colors, x, y): (Table, Option<u32>, Option<u32>)| {
                let entries: Vec<(Pixel, Rgba)> = parse_colors(&colors)?
                    .into_iter()
                    .enumerate()
                    .map(|(index, color)| (index as Pixel, color))
                    .collect();
                this.program
                    .palette(&entries, x.unwrap_or(0), y.unwrap_or(0));
                Ok(())
            },
        );
    }
}

pub fn program_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(|_, ()| {
            Ok(ProgramObject {
                program: Program::new(),
            })
        })?,
    )?;
    Ok(module)
}

// ---------- XForm ----------

pub struct XFormObject {
    pub xform: XForm,
}

impl UserData for XFormObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("offset", |_, this, (h, v): (f32, f32)| {
            this.xform.set_offset(h, v);
            Ok(())
        });
        methods.add_method_mut(
            "matrix",
            |_,
             this,
             (a, b, c, d, x, y): (f32, f32, f32, f32, Option<f32>, Option<f32>)| {
                this.xform.set_matrix(a, b, c, d);
                if let (Some(x), Some(y)) = (x, y) {
                    this.xform.set_register(Register::X, x);
                    this.xform.set_register(Register::Y, y);
                }
                Ok(())
            },
        );
        methods.add_method_mut(
            "register",
            |_, this, (name, value): (String, f32)| {
                let register = Register::parse(&name)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown register `{name}`")))?;
                this.xform.set_register(register, value);
                Ok(())
            },
        );
        methods.add_method_mut(
            "wrap",
            |_, this, (mode, border): (String, Option<Pixel>)| {
                let wrap = Wrap::parse(&mode)
                    .ok_or_else(|| mlua::Error::runtime(format!("unknown wrap mode `{mode}`")))?;
                this.xform.set_wrap(wrap);
                if let Some(border) = border {
                    this.xform.set_border(border);
                }
                Ok(())
            },
        );
        methods.add_method_mut("table", |_, this, entries: Option<Table>| {
            let mut table = Vec::new();
            if let Some(entries) = entries {
                for entry in entries.sequence_values::<Table>() {
                    let entry = entry?;
                    let scanline: i32 = entry.get(1)?;
                    let name: String = entry.get(2)?;
                    let value: f32 = entry.get(3)?;
                    let register = Register::parse(&name).ok_or_else(|| {
                        mlua::Error::runtime(format!("unknown register `{name}`"))
                    })?;
                    table.push((scanline, register, value));
                }
            }
            this.xform.set_table(table);
            Ok(())
        });
    }
}

pub fn xform_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "new",
        lua.create_function(|_, ()| {
            Ok(XFormObject {
                xform: XForm::new(),
            })
        })?,
    )?;
    Ok(module)
}

// ---------- Display ----------

pub fn display_loader(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "palette",
        lua.create_function(|lua, palette: UserDataRef<PaletteObject>| {
            let context = host(lua)?;
            context
                .display
                .borrow_mut()
                .set_palette(palette.palette.clone());
            Ok(())
        })?,
    )?;
    module.set(
        "offset",
        lua.create_function(|lua, (x, y): (Option<i32>, Option<i32>)| {
            let context = host(lua)?;
            context
                .display
                .borrow_mut()
                .set_offset(Point::new(x.unwrap_or(0), y.unwrap_or(0)));
            Ok(())
        })?,
    )?;
    module.set(
        "shift",
        lua.create_function(
            |lua, (first, to): (Option<mlua::Value>, Option<Pixel>)| {
                let context = host(lua)?;
                let mut display = context.display.borrow_mut();
                match (first, to) {
                    (None, _) => display.set_shifting(&[]),
                    (Some(mlua::Value::Integer(from)), Some(to)) => {
                        display.set_shifting(&[(from as Pixel, to)])
                    }
                    (Some(mlua::Value::Table(pairs)), _) => {
                        let mut entries = Vec::new();
                        for pair in pairs.pairs::<Pixel, Pixel>() {
                            let (from, to) = pair?;
                            entries.push((from, to));
                        }
                        display.set_shifting(&entries);
                    }
                    _ => return Err(mlua::Error::runtime("expected (), (from, to) or (table)")),
                }
                Ok(())
            },
        )?,
    )?;
    module.set(
        "program",
        lua.create_function(|lua, program: Option<UserDataRef<ProgramObject>>| {
            let context = host(lua)?;
            context
                .display
                .borrow_mut()
                .set_program(program.map(|object| object.program.clone()));
            Ok(())
        })?,
    )?;
    module.set(
        "reset",
        lua.create_function(|lua, ()| {
            let context = host(lua)?;
            context.display.borrow_mut().reset();
            Ok(())
        })?,
    )?;
    Ok(module)
}
