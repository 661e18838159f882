use crate::font::{HELVETICA, HELVETICA_BOLD};
use crate::types::{Color, Pt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Medium,
    Bold,
}

/// Immutable text style. Every draw call receives one explicitly; the sink
/// keeps no "current style" between calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub weight: FontWeight,
    /// Size in milli-points so presets can be `const`.
    pub size_milli: i64,
    pub opacity: f32,
}

impl TextStyle {
    pub const fn new(weight: FontWeight, size_pt: i64, opacity: f32) -> Self {
        Self {
            weight,
            size_milli: size_pt * 1000,
            opacity,
        }
    }

    pub fn size(&self) -> Pt {
        Pt::from_milli_i64(self.size_milli)
    }
}

/// Field names.
pub const LABEL: TextStyle = TextStyle::new(FontWeight::Bold, 10, 0.88);
/// Field values.
pub const VALUE: TextStyle = TextStyle::new(FontWeight::Medium, 10, 0.72);
/// Footer and URL text.
pub const MUTED: TextStyle = TextStyle::new(FontWeight::Medium, 10, 0.48);
pub const TITLE: TextStyle = TextStyle::new(FontWeight::Bold, 18, 0.88);
/// Secondary line-item text.
pub const SUBTITLE: TextStyle = TextStyle::new(FontWeight::Medium, 9, 0.72);

/// Amount shown on the total row; title-sized but value-weighted.
pub const TOTAL_VALUE: TextStyle = TextStyle::new(FontWeight::Medium, 18, 0.72);

pub const DIVIDER_OPACITY: f32 = 0.06;

pub fn accent() -> Color {
    Color::from_rgb8(0xFF, 0x45, 0x00)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Right,
    Center,
}

/// Where a text block goes. `width` is the wrap width; alignment is applied
/// per wrapped line inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextFrame {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub align: TextAlign,
}

impl TextFrame {
    pub fn new(x: Pt, y: Pt, width: Pt) -> Self {
        Self {
            x,
            y,
            width,
            align: TextAlign::Left,
        }
    }

    pub fn aligned(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: Pt,
    pub opacity: f32,
}

impl StrokeStyle {
    pub fn divider() -> Self {
        Self {
            color: Color::BLACK,
            width: Pt::from_i32(1),
            opacity: DIVIDER_OPACITY,
        }
    }
}

/// Maps weights to registered font names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSet {
    pub medium: String,
    pub bold: String,
}

impl Default for FontSet {
    fn default() -> Self {
        Self {
            medium: HELVETICA.to_string(),
            bold: HELVETICA_BOLD.to_string(),
        }
    }
}

impl FontSet {
    pub fn font_for(&self, weight: FontWeight) -> &str {
        match weight {
            FontWeight::Medium => &self.medium,
            FontWeight::Bold => &self.bold,
        }
    }
}
