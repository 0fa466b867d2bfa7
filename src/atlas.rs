//! Texture atlas collaborator
//!
//! The atlas image is a grid of equal cells. Glyphs fill cells row-major
//! from the top-left; named regions span rectangles of whole cells. The
//! metadata lives in a small JSON document next to the image:
//!
//! ```json
//! { "columns": 8, "rows": 4, "glyphs": "0123456789",
//!   "regions": { "tile": [0, 2, 8, 1] } }
//! ```
//!
//! [`GridAtlas::builtin`] paints its own image, so the game is playable
//! without any asset files.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use serde::Deserialize;

use crate::error::AssetError;
use crate::sim::{Effect, SpriteDesc};

/// Regions every atlas must provide
pub const REQUIRED_REGIONS: [&str; 3] = ["tile", "background", "logo"];

/// Glyphs of the builtin atlas, row-major from the top-left cell
pub const BUILTIN_GLYPHS: &str = "0123456789ABCDEF";

/// Pixel size of one builtin atlas cell
pub const BUILTIN_CELL: u32 = 8;

/// 5x7 bitmaps for [`BUILTIN_GLYPHS`]; bit 4 is the leftmost column
const FONT: [[u8; 7]; 16] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
    [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
];

const GLYPH_INK: [u8; 4] = [255, 255, 255, 255];
const FRAME_EDGE: [u8; 4] = [170, 200, 255, 255];
const FRAME_FILL: [u8; 4] = [30, 45, 80, 200];
const BACKDROP: [u8; 4] = [12, 16, 28, 255];

/// Texture coordinates of a rectangle in the atlas
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: Self = Self {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    pub fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.u1, self.v1]
    }
}

/// UV lookup used by sprite and text construction
pub trait TextureAtlas {
    fn region(&self, name: &str) -> Option<UvRect>;
    fn glyph(&self, c: char) -> Option<UvRect>;
}

/// Decoded RGBA8 image ready for texture upload
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    columns: u32,
    rows: u32,
    #[serde(default)]
    glyphs: String,
    #[serde(default)]
    regions: HashMap<String, [u32; 4]>,
}

#[derive(Debug, Clone)]
pub struct GridAtlas {
    columns: u32,
    rows: u32,
    glyphs: HashMap<char, UvRect>,
    regions: HashMap<String, UvRect>,
    image: Option<AtlasImage>,
}

impl GridAtlas {
    /// Build a grid atlas without an image
    pub fn grid(
        columns: u32,
        rows: u32,
        glyphs: &str,
        regions: &[(&str, [u32; 4])],
    ) -> Result<Self, AssetError> {
        if columns == 0 || rows == 0 {
            return Err(AssetError::EmptyGrid);
        }
        Ok(Self::build(columns, rows, glyphs, regions))
    }

    fn build(columns: u32, rows: u32, glyphs: &str, regions: &[(&str, [u32; 4])]) -> Self {
        let mut atlas = Self {
            columns,
            rows,
            glyphs: HashMap::new(),
            regions: HashMap::new(),
            image: None,
        };
        for (i, c) in glyphs.chars().enumerate() {
            let i = i as u32;
            if i >= columns * rows {
                log::warn!("Atlas grid has no cell for glyph '{c}'");
                break;
            }
            let uv = atlas.cells(i % columns, i / columns, 1, 1);
            atlas.glyphs.insert(c, uv);
        }
        for (name, [col, row, w, h]) in regions {
            let uv = atlas.cells(*col, *row, *w, *h);
            atlas.regions.insert((*name).to_string(), uv);
        }
        atlas
    }

    /// Atlas with a rasterised 5x7 hex font and the required regions
    ///
    /// Used when no atlas asset is shipped; every cell is [`BUILTIN_CELL`]
    /// pixels square.
    pub fn builtin() -> Self {
        let regions = [
            ("tile", [0, 2, 8, 1]),
            ("background", [0, 3, 4, 1]),
            ("logo", [4, 3, 4, 1]),
        ];
        let mut atlas = Self::build(8, 4, BUILTIN_GLYPHS, &regions);
        atlas.image = Some(rasterize_builtin(8, 4));
        atlas
    }

    pub fn from_metadata(json: &str) -> Result<Self, AssetError> {
        let meta: Metadata = serde_json::from_str(json)?;
        let regions: Vec<(&str, [u32; 4])> = meta
            .regions
            .iter()
            .map(|(name, rect)| (name.as_str(), *rect))
            .collect();
        let atlas = Self::grid(meta.columns, meta.rows, &meta.glyphs, &regions)?;
        for name in REQUIRED_REGIONS {
            if !atlas.regions.contains_key(name) {
                return Err(AssetError::MissingRegion(name.to_string()));
            }
        }
        Ok(atlas)
    }

    /// Load an atlas from its RGBA pixels and JSON metadata
    pub fn load(image: AtlasImage, metadata: &str) -> Result<Self, AssetError> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected || expected == 0 {
            return Err(AssetError::ImageSize {
                width: image.width,
                height: image.height,
                expected,
                actual: image.rgba.len(),
            });
        }
        let mut atlas = Self::from_metadata(metadata)?;
        log::info!(
            "Loaded {}x{} atlas ({} glyphs, {} regions)",
            image.width,
            image.height,
            atlas.glyphs.len(),
            atlas.regions.len()
        );
        atlas.image = Some(image);
        Ok(atlas)
    }

    pub fn image(&self) -> Option<&AtlasImage> {
        self.image.as_ref()
    }

    fn cells(&self, col: u32, row: u32, w: u32, h: u32) -> UvRect {
        let cw = 1.0 / self.columns as f32;
        let ch = 1.0 / self.rows as f32;
        UvRect {
            u0: col as f32 * cw,
            v0: row as f32 * ch,
            u1: (col + w).min(self.columns) as f32 * cw,
            v1: (row + h).min(self.rows) as f32 * ch,
        }
    }
}

/// RGBA8 canvas the builtin atlas is painted on
struct Canvas {
    width: u32,
    rgba: Vec<u8>,
}

impl Canvas {
    fn put(&mut self, x: u32, y: u32, color: [u8; 4]) {
        let i = ((y * self.width + x) * 4) as usize;
        self.rgba[i..i + 4].copy_from_slice(&color);
    }

    fn glyph(&mut self, x: u32, y: u32, bits: &[u8; 7]) {
        for (row, line) in (0u32..).zip(bits) {
            for col in 0..5 {
                if (line >> (4 - col)) & 1 == 1 {
                    self.put(x + 1 + col, y + row, GLYPH_INK);
                }
            }
        }
    }

    fn fill(&mut self, x0: u32, y0: u32, w: u32, h: u32, color: impl Fn(u32, u32) -> [u8; 4]) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                self.put(x, y, color(x - x0, y - y0));
            }
        }
    }
}

/// Paint the builtin atlas: glyph cells, tile frame, backdrop and logo
fn rasterize_builtin(columns: u32, rows: u32) -> AtlasImage {
    let cell = BUILTIN_CELL;
    let width = columns * cell;
    let height = rows * cell;
    let mut canvas = Canvas {
        width,
        rgba: vec![0; (width * height * 4) as usize],
    };

    for (i, bits) in (0u32..).zip(&FONT) {
        canvas.glyph((i % columns) * cell, (i / columns) * cell, bits);
    }

    canvas.fill(0, 2 * cell, width, cell, |x, y| {
        let edge = x == 0 || y == 0 || x == width - 1 || y == cell - 1;
        if edge { FRAME_EDGE } else { FRAME_FILL }
    });
    canvas.fill(0, 3 * cell, width / 2, cell, |_, _| BACKDROP);

    // Logo spells 1011 in the right half of the last row
    for (i, digit) in (0u32..).zip([1, 0, 1, 1]) {
        canvas.glyph(width / 2 + i * cell, 3 * cell, &FONT[digit]);
    }

    AtlasImage {
        width,
        height,
        rgba: canvas.rgba,
    }
}

impl TextureAtlas for GridAtlas {
    fn region(&self, name: &str) -> Option<UvRect> {
        self.regions.get(name).copied()
    }

    fn glyph(&self, c: char) -> Option<UvRect> {
        self.glyphs.get(&c).copied()
    }
}

/// Lay out `text` as one sprite per glyph, centered on `(x, y)`
///
/// `width` and `height` are the unscaled size of one glyph cell. Characters
/// the atlas has no glyph for are skipped (spaces still advance).
#[allow(clippy::too_many_arguments)]
pub fn layout_text(
    atlas: &dyn TextureAtlas,
    text: &str,
    x: f32,
    y: f32,
    scale: f32,
    width: f32,
    height: f32,
    effect: Effect,
) -> Vec<SpriteDesc> {
    let advance = width * scale;
    let count = text.chars().count() as f32;
    let left = x - advance * (count - 1.0) / 2.0;

    text.chars()
        .enumerate()
        .filter_map(|(i, c)| {
            if c == ' ' {
                return None;
            }
            let Some(uv) = atlas.glyph(c) else {
                log::warn!("No glyph for '{c}' in atlas");
                return None;
            };
            Some(SpriteDesc {
                position: Vec3::new(left + i as f32 * advance, y, 0.2),
                size: Vec2::new(width, height),
                scale,
                uv,
                effect,
                visible: true,
            })
        })
        .collect()
}
