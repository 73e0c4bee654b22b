use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use glam::Vec2;

use crate::loader::ImageData;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FontLoadError {
    #[error("font load error: {0}")]
    Parse(String),

    #[error("no font registered as {0:?}")]
    UnknownFont(FontId),
}

/// Horizontal placement of text lines, and of a text object around its position.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// Fraction of the text width that sits on the anchor: `0` left, `1` right.
    pub fn factor(self) -> f32 {
        match self {
            TextAlign::Left => 0.0,
            TextAlign::Center => 0.5,
            TextAlign::Right => 1.0,
        }
    }
}

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// Owns a collection of loaded fonts.
///
/// Fonts are immutable after loading. The application keeps the system and hands it to text
/// objects when their content changes.
pub struct FontSystem {
    fonts: Vec<fontdue::Font>,
}

impl FontSystem {
    pub fn new() -> Self {
        Self { fonts: Vec::new() }
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<FontId, FontLoadError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError::Parse(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push(font);
        log::debug!("loaded font {id:?}");
        Ok(id)
    }

    fn get(&self, id: FontId) -> Result<&fontdue::Font, FontLoadError> {
        self.fonts.get(id.0).ok_or(FontLoadError::UnknownFont(id))
    }

    fn layout(&self, font: &fontdue::Font, text: &str, px: f32) -> Layout<()> {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[font], &TextStyle::new(text, px, 0));
        layout
    }

    /// Lays out each `\n`-separated line on its own and stacks them.
    fn block(&self, font: &fontdue::Font, text: &str, px: f32) -> TextBlock {
        let advance = font.horizontal_line_metrics(px).map_or(px, |m| m.new_line_size);
        let mut lines = Vec::new();
        let mut size = Vec2::ZERO;

        for (i, line) in text.split('\n').enumerate() {
            let layout = self.layout(font, line, px);
            let top = i as f32 * advance;
            let width = layout
                .glyphs()
                .iter()
                .map(|g| g.x + g.width as f32)
                .fold(0.0f32, f32::max);
            let bottom = layout
                .glyphs()
                .iter()
                .map(|g| g.y + g.height as f32)
                .fold(layout.height(), f32::max);

            size = size.max(Vec2::new(width, top + bottom));
            lines.push(TextLine { layout, width, top });
        }

        TextBlock { lines, size }
    }

    /// Size in pixels of `text` set at `px`.
    pub fn measure_text(&self, id: FontId, text: &str, px: f32) -> Result<Vec2, FontLoadError> {
        let font = self.get(id)?;
        Ok(self.block(font, text, px).size)
    }

    /// Rasterizes `text` into a white RGBA bitmap whose alpha is glyph coverage.
    ///
    /// Lines narrower than the widest one are placed according to `align`. The object's color
    /// tints the bitmap at draw time.
    pub fn rasterize(
        &self,
        id: FontId,
        text: &str,
        px: f32,
        align: TextAlign,
    ) -> Result<ImageData, FontLoadError> {
        let font = self.get(id)?;
        let block = self.block(font, text, px);

        let width = (block.size.x.ceil() as u32).max(1);
        let height = (block.size.y.ceil() as u32).max(1);
        let mut pixels = vec![0u8; width as usize * height as usize * 4];

        for line in &block.lines {
            let dx = ((block.size.x - line.width) * align.factor()).round();
            for glyph in line.layout.glyphs() {
                if glyph.width == 0 || glyph.height == 0 {
                    continue;
                }
                let (metrics, coverage) = font.rasterize_config(glyph.key);
                for row in 0..metrics.height {
                    for col in 0..metrics.width {
                        let x = (glyph.x + dx) as i64 + col as i64;
                        let y = (glyph.y + line.top) as i64 + row as i64;
                        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                            continue;
                        }
                        let idx = (y as usize * width as usize + x as usize) * 4;
                        let alpha = coverage[row * metrics.width + col];
                        pixels[idx..idx + 3].copy_from_slice(&[255, 255, 255]);
                        pixels[idx + 3] = pixels[idx + 3].max(alpha);
                    }
                }
            }
        }

        Ok(ImageData::new(width, height, 4, pixels))
    }
}

struct TextLine {
    layout: Layout<()>,
    width: f32,
    top: f32,
}

struct TextBlock {
    lines: Vec<TextLine>,
    size: Vec2,
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_load() {
        let mut fonts = FontSystem::new();
        assert!(matches!(fonts.load_font(b"not a font"), Err(FontLoadError::Parse(_))));
    }

    #[test]
    fn unknown_font_is_reported() {
        let fonts = FontSystem::new();
        assert_eq!(
            fonts.rasterize(FontId(3), "hi", 16.0, TextAlign::Left).unwrap_err(),
            FontLoadError::UnknownFont(FontId(3))
        );
    }

    #[test]
    fn text_align_places_lines_left_to_right() {
        assert_eq!(TextAlign::default(), TextAlign::Left);
        assert_eq!(TextAlign::Left.factor(), 0.0);
        assert_eq!(TextAlign::Center.factor(), 0.5);
        assert_eq!(TextAlign::Right.factor(), 1.0);
    }
}
