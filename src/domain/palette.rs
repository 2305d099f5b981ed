// Color palettes and per-render line color allocation
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const BLACK: Rgba = Rgba::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);
    pub const DARK_GREY: Rgba = Rgba::rgb(0xa9, 0xa9, 0xa9);
}

/// Color handed out when every palette entry is in use.
pub const FALLBACK_LINE_COLOR: Rgba = Rgba::BLACK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedColor {
    pub name: &'static str,
    pub color: Rgba,
}

const fn named(name: &'static str, r: u8, g: u8, b: u8) -> NamedColor {
    NamedColor {
        name,
        color: Rgba::rgb(r, g, b),
    }
}

/// Okabe-Ito colors, distinguishable under the common forms of color blindness.
const HIGH_CONTRAST_LINES: [NamedColor; 7] = [
    named("orange", 0xe6, 0x9f, 0x00),
    named("sky blue", 0x56, 0xb4, 0xe9),
    named("bluish green", 0x00, 0x9e, 0x73),
    named("yellow", 0xf0, 0xe4, 0x42),
    named("blue", 0x00, 0x72, 0xb2),
    named("vermillion", 0xd5, 0x5e, 0x00),
    named("reddish purple", 0xcc, 0x79, 0xa7),
];

const NAMED_LINES: [NamedColor; 15] = [
    named("navy", 0x00, 0x00, 0x80),
    named("brown", 0xa5, 0x2a, 0x2a),
    named("crimson", 0xdc, 0x14, 0x3c),
    named("darkkhaki", 0xbd, 0xb7, 0x6b),
    named("deepskyblue", 0x00, 0xbf, 0xff),
    named("goldenrod", 0xda, 0xa5, 0x20),
    named("gray", 0x80, 0x80, 0x80),
    named("green", 0x00, 0x80, 0x00),
    named("limegreen", 0x32, 0xcd, 0x32),
    named("magenta", 0xff, 0x00, 0xff),
    named("mediumturquoise", 0x48, 0xd1, 0xcc),
    named("orangered", 0xff, 0x45, 0x00),
    named("purple", 0x80, 0x00, 0x80),
    named("royalblue", 0x41, 0x69, 0xe1),
    named("violet", 0xee, 0x82, 0xee),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteKind {
    #[default]
    HighContrast,
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    pub foreground: Rgba,
    pub background: Rgba,
    pub grid_color: Rgba,
    pub line_colors: Vec<NamedColor>,
}

impl ColorPalette {
    /// White on black with a dark grey grid.
    pub fn high_contrast() -> Self {
        Self {
            foreground: Rgba::WHITE,
            background: Rgba::BLACK,
            grid_color: Rgba::DARK_GREY,
            line_colors: HIGH_CONTRAST_LINES.to_vec(),
        }
    }

    /// Same styling as `high_contrast`, with a larger set of line colors.
    pub fn named() -> Self {
        Self {
            line_colors: NAMED_LINES.to_vec(),
            ..Self::high_contrast()
        }
    }

    pub fn from_kind(kind: PaletteKind) -> Self {
        match kind {
            PaletteKind::HighContrast => Self::high_contrast(),
            PaletteKind::Named => Self::named(),
        }
    }

    pub fn allocator(&self) -> ColorAllocator {
        ColorAllocator::new(self.line_colors.clone())
    }
}

/// Hands out line colors that have not been used yet in the current render.
///
/// Each render owns its own allocator, so concurrent renders never share
/// state. Allocation order follows the palette order.
#[derive(Debug, Clone)]
pub struct ColorAllocator {
    palette: Vec<NamedColor>,
    used: HashSet<&'static str>,
}

impl ColorAllocator {
    pub fn new(palette: Vec<NamedColor>) -> Self {
        Self {
            palette,
            used: HashSet::new(),
        }
    }

    /// First unused palette color, or `FALLBACK_LINE_COLOR` once the palette
    /// is exhausted.
    pub fn allocate(&mut self) -> Rgba {
        match self.palette.iter().find(|c| !self.used.contains(c.name)).copied() {
            Some(next) => {
                self.used.insert(next.name);
                next.color
            }
            None => {
                tracing::warn!(
                    palette_size = self.palette.len(),
                    "line colors exhausted, falling back to black"
                );
                FALLBACK_LINE_COLOR
            }
        }
    }

    /// Make every palette color available again.
    pub fn reset(&mut self) {
        self.used.clear();
    }

    /// Number of distinct colors this allocator can hand out.
    pub fn capacity(&self) -> usize {
        self.palette.len()
    }

    pub fn remaining(&self) -> usize {
        self.palette.len() - self.used.len()
    }
}
