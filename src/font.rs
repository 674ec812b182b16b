//! Glyph rasterization for dataset synthesis.
//!
//! TrueType fonts are drawn with `rusttype`. When no usable font file is
//! available, a built-in 5x7 bitmap face is scaled up instead so dataset
//! creation never depends on what is installed on the machine.

use anyhow::{Context, Result};
use rusttype::{point, Font, Scale};
use std::fs;
use std::path::Path;

/// Pixels left free around the glyph on each axis.
const MARGIN: usize = 4;
/// Sub-samples per axis when rasterizing the bitmap face.
const SUPERSAMPLE: usize = 4;

/// Source of glyph shapes.
#[derive(Clone)]
pub enum GlyphFont {
    TrueType(Font<'static>),
    Builtin,
}

impl std::fmt::Debug for GlyphFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphFont::TrueType(_) => f.write_str("GlyphFont::TrueType"),
            GlyphFont::Builtin => f.write_str("GlyphFont::Builtin"),
        }
    }
}

impl GlyphFont {
    /// Load a TrueType/OpenType font file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let font = Font::try_from_vec(data)
            .with_context(|| format!("failed to parse font file {}", path.display()))?;
        Ok(GlyphFont::TrueType(font))
    }

    /// Load `path` if given, falling back to the built-in face on any failure.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return GlyphFont::Builtin;
        };
        match Self::from_file(path) {
            Ok(font) => font,
            Err(err) => {
                log::warn!("font {} unavailable ({err:#}), using built-in font", path.display());
                GlyphFont::Builtin
            }
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, GlyphFont::Builtin)
    }

    /// Render `ch` white-on-black, centered, as row-major raw pixels in [0, 255].
    pub fn render(&self, ch: char, img_size: usize) -> Vec<f32> {
        let mut canvas = vec![0.0f32; img_size * img_size];
        let glyph_size = img_size.saturating_sub(MARGIN).max(1);
        match self {
            GlyphFont::TrueType(font) => draw_truetype(font, ch, glyph_size, img_size, &mut canvas),
            GlyphFont::Builtin => draw_bitmap(ch, glyph_size, img_size, &mut canvas),
        }
        canvas
    }
}

fn draw_truetype(font: &Font, ch: char, glyph_size: usize, img_size: usize, canvas: &mut [f32]) {
    let scale = Scale::uniform(glyph_size as f32);
    let v_metrics = font.v_metrics(scale);
    let glyph = font
        .glyph(ch)
        .scaled(scale)
        .positioned(point(0.0, v_metrics.ascent));

    let Some(bb) = glyph.pixel_bounding_box() else {
        return;
    };
    // Center the ink box, not the advance box.
    let offset_x = (img_size as i32 - bb.width()) / 2;
    let offset_y = (img_size as i32 - bb.height()) / 2;

    glyph.draw(|x, y, coverage| {
        let px = x as i32 + offset_x;
        let py = y as i32 + offset_y;
        if px < 0 || py < 0 || px >= img_size as i32 || py >= img_size as i32 {
            return;
        }
        let idx = py as usize * img_size + px as usize;
        canvas[idx] = canvas[idx].max(coverage * 255.0);
    });
}

fn draw_bitmap(ch: char, glyph_size: usize, img_size: usize, canvas: &mut [f32]) {
    let rows = bitmap_rows(ch);
    let cell = glyph_size as f32 / BITMAP_HEIGHT as f32;
    let width = cell * BITMAP_WIDTH as f32;
    let height = cell * BITMAP_HEIGHT as f32;
    let x0 = (img_size as f32 - width) / 2.0;
    let y0 = (img_size as f32 - height) / 2.0;
    let samples = (SUPERSAMPLE * SUPERSAMPLE) as f32;

    for py in 0..img_size {
        for px in 0..img_size {
            let mut hits = 0usize;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let x = px as f32 + (sx as f32 + 0.5) / SUPERSAMPLE as f32;
                    let y = py as f32 + (sy as f32 + 0.5) / SUPERSAMPLE as f32;
                    let gx = ((x - x0) / cell).floor();
                    let gy = ((y - y0) / cell).floor();
                    if gx < 0.0 || gy < 0.0 {
                        continue;
                    }
                    let (gx, gy) = (gx as usize, gy as usize);
                    if gx >= BITMAP_WIDTH || gy >= BITMAP_HEIGHT {
                        continue;
                    }
                    if rows[gy] & (1 << (BITMAP_WIDTH - 1 - gx)) != 0 {
                        hits += 1;
                    }
                }
            }
            canvas[py * img_size + px] = 255.0 * hits as f32 / samples;
        }
    }
}

const BITMAP_WIDTH: usize = 5;
const BITMAP_HEIGHT: usize = 7;

fn bitmap_rows(ch: char) -> [u8; BITMAP_HEIGHT] {
    match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0; BITMAP_HEIGHT],
        // Unknown characters render as an outlined box.
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
