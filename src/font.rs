use crate::error::RenderError;
use crate::types::Pt;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use ttf_parser::GlyphId;

pub const HELVETICA: &str = "Helvetica";
pub const HELVETICA_BOLD: &str = "Helvetica-Bold";

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

// AFM advance widths for printable ASCII (32..=126).
#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    /// One of the standard 14 faces; referenced by name, never embedded.
    Base14,
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

/// Metrics in 1/1000 em, indexed by WinAnsi code.
#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) line_gap: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    kerning: HashMap<(u8, u8), i16>,
}

/// Font lookup and text measurement shared by every render of one renderer.
#[derive(Debug)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

impl FontRegistry {
    /// A registry preloaded with Helvetica and Helvetica-Bold.
    pub(crate) fn new() -> Self {
        let mut registry = Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
        };
        registry.insert(
            HELVETICA.to_string(),
            Vec::new(),
            base14_metrics(&HELVETICA_ASCII),
            FontProgramKind::Base14,
            Vec::new(),
        );
        registry.insert(
            HELVETICA_BOLD.to_string(),
            Vec::new(),
            base14_metrics(&HELVETICA_BOLD_ASCII),
            FontProgramKind::Base14,
            Vec::new(),
        );
        registry
    }

    pub(crate) fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String, RenderError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        self.register_bytes(data, path.to_str())
    }

    pub(crate) fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, RenderError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| RenderError::Asset(format!("invalid font data for {source}: {err}")))?;
        let (name, aliases) = font_names(&face, Path::new(source));
        let (metrics, program_kind) = FontMetrics::from_face(&face);
        drop(face);
        self.insert(name.clone(), data, metrics, program_kind, aliases);
        Ok(name)
    }

    fn insert(
        &mut self,
        name: String,
        data: Vec<u8>,
        metrics: FontMetrics,
        program_kind: FontProgramKind,
        aliases: Vec<String>,
    ) {
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
            program_kind,
        });
        for alias in std::iter::once(name).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(&normalize_name(name))
    }

    fn index_of(&self, name: &str) -> usize {
        // Index 0 is always Helvetica.
        self.lookup.get(&normalize_name(name)).copied().unwrap_or(0)
    }

    /// Resolves a font name, falling back to Helvetica.
    pub(crate) fn resolve(&self, name: &str) -> &RegisteredFont {
        &self.fonts[self.index_of(name)]
    }

    pub(crate) fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        self.resolve(name).metrics.measure_text_width(font_size, text)
    }

    pub(crate) fn line_height(&self, name: &str, font_size: Pt) -> Pt {
        self.resolve(name).metrics.line_height(font_size)
    }
}

#[cfg(test)]
impl FontMetrics {
    /// Helvetica widths with explicit kerning pairs.
    pub(crate) fn helvetica_with_kerning(pairs: &[(char, char, i16)]) -> Self {
        let mut metrics = base14_metrics(&HELVETICA_ASCII);
        for &(left, right, value) in pairs {
            if let (Some(l), Some(r)) = (winansi_code(left), winansi_code(right)) {
                metrics.kerning.insert((l, r), value);
            }
        }
        metrics
    }
}

#[cfg(test)]
impl FontRegistry {
    /// Registers metrics under `name` without a font program.
    pub(crate) fn register_metrics(&mut self, name: &str, metrics: FontMetrics) {
        self.insert(
            name.to_string(),
            Vec::new(),
            metrics,
            FontProgramKind::Base14,
            Vec::new(),
        );
    }
}

fn base14_metrics(ascii: &[u16; 95]) -> FontMetrics {
    let mut widths = Vec::with_capacity((LAST_CHAR - FIRST_CHAR) as usize + 1);
    for code in FIRST_CHAR..=LAST_CHAR {
        let width = match code {
            32..=126 => ascii[(code - 32) as usize],
            // Latin-1 punctuation that is narrower or wider than a digit.
            0xA0 => 278,
            0x91 | 0x92 => ascii[(b'\'' - 32) as usize],
            0x93 | 0x94 => ascii[(b'"' - 32) as usize],
            0x95 => 350,
            0x97 => 1000,
            0x85 | 0x89 => 1000,
            _ => 556,
        };
        widths.push(width);
    }
    FontMetrics {
        widths,
        ascent: 718,
        descent: -207,
        line_gap: 231,
        cap_height: 718,
        italic_angle: 0,
        bbox: (-166, -225, 1000, 931),
        missing_width: 278,
        is_fixed_pitch: false,
        kerning: HashMap::new(),
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;

        let mut glyph_ids = Vec::with_capacity((LAST_CHAR - FIRST_CHAR) as usize + 1);
        let mut widths = Vec::with_capacity(glyph_ids.capacity());
        for code in FIRST_CHAR..=LAST_CHAR {
            let gid = winansi_char(code).and_then(|ch| face.glyph_index(ch));
            let advance = gid.and_then(|id| face.glyph_hor_advance(id)).unwrap_or(0);
            glyph_ids.push(gid.map(|id| id.0).unwrap_or(0));
            widths.push(((advance as f32 * scale).round() as i32).clamp(0, u16::MAX as i32) as u16);
        }
        let missing_width = widths[(b' ' - FIRST_CHAR) as usize];

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let line_gap = scale_i16(face.line_gap(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                widths,
                ascent,
                descent,
                line_gap,
                cap_height,
                italic_angle,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
                kerning: build_kerning_pairs(face, &glyph_ids, scale),
            },
            program_kind,
        )
    }

    pub(crate) fn advance_for_code(&self, code: u8) -> u16 {
        if code < FIRST_CHAR {
            return self.missing_width;
        }
        self.widths
            .get((code - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(self.missing_width)
    }

    /// Kerning between two WinAnsi codes in 1/1000 em. Negative tightens.
    pub(crate) fn kern_adjustment(&self, left: u8, right: u8) -> i16 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0)
    }

    /// Advance of `text` including kerning, the same advance the PDF writer
    /// produces with its `TJ` adjustments.
    pub(crate) fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let mut total_units: i32 = 0;
        let mut prev: Option<u8> = None;
        for ch in text.chars() {
            let code = winansi_code(ch).unwrap_or(b'?');
            total_units = total_units.saturating_add(self.advance_for_code(code) as i32);
            if let Some(prev_code) = prev {
                total_units = total_units.saturating_add(self.kern_adjustment(prev_code, code) as i32);
            }
            prev = Some(code);
        }
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    fn line_height(&self, font_size: Pt) -> Pt {
        let height_1000 = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        if height_1000 <= 0 {
            return font_size;
        }
        font_size.mul_ratio(height_1000, 1000)
    }
}

fn build_kerning_pairs(
    face: &ttf_parser::Face<'_>,
    glyph_ids: &[u16],
    scale: f32,
) -> HashMap<(u8, u8), i16> {
    let mut out = HashMap::new();
    let Some(kern) = face.tables().kern else {
        return out;
    };
    let subtables: Vec<_> = kern
        .subtables
        .into_iter()
        .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
        .collect();
    if subtables.is_empty() {
        return out;
    }

    for (left_idx, &left) in glyph_ids.iter().enumerate() {
        if left == 0 {
            continue;
        }
        for (right_idx, &right) in glyph_ids.iter().enumerate() {
            if right == 0 {
                continue;
            }
            let total: i32 = subtables
                .iter()
                .filter_map(|sub| sub.glyphs_kerning(GlyphId(left), GlyphId(right)))
                .map(i32::from)
                .sum();
            if total == 0 {
                continue;
            }
            let clamped = total.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            let scaled = scale_i16(clamped, scale);
            if scaled != 0 {
                out.insert(
                    (left_idx as u8 + FIRST_CHAR, right_idx as u8 + FIRST_CHAR),
                    scaled,
                );
            }
        }
    }
    out
}

/// Maps a char to its cp1252 (WinAnsi) byte.
pub(crate) fn winansi_code(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0000}'..='\u{007F}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn winansi_char(code: u8) -> Option<char> {
    if !(0x80..=0x9F).contains(&code) {
        return Some(code as char);
    }
    (0x2000u32..0x2200)
        .chain([0x0152, 0x0153, 0x0160, 0x0161, 0x0178, 0x017D, 0x017E, 0x0192, 0x02C6, 0x02DC])
        .filter_map(char::from_u32)
        .find(|ch| winansi_code(*ch) == Some(code))
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(name);
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let aliases = [family, full, post, stem]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_match_afm() {
        let registry = FontRegistry::new();
        let size = Pt::from_i32(10);
        // "Invoice": I(278) n(556) v(500) o(556) i(222) c(500) e(556) = 3168
        assert_eq!(
            registry.measure_text_width(HELVETICA, size, "Invoice").to_milli_i64(),
            31_680
        );
        // Bold: I(278) n(611) v(556) o(611) i(278) c(556) e(556) = 3446
        assert_eq!(
            registry
                .measure_text_width(HELVETICA_BOLD, size, "Invoice")
                .to_milli_i64(),
            34_460
        );
    }

    #[test]
    fn kerning_pairs_tighten_measured_width() {
        let mut registry = FontRegistry::new();
        registry.register_metrics(
            "Kerned",
            FontMetrics::helvetica_with_kerning(&[('A', 'V', -70), ('V', 'A', -70)]),
        );
        let size = Pt::from_i32(10);
        let plain = registry.measure_text_width(HELVETICA, size, "AVA");
        let kerned = registry.measure_text_width("Kerned", size, "AVA");
        // Two pairs of -70 units at 10pt.
        assert_eq!(plain.to_milli_i64() - kerned.to_milli_i64(), 1_400);
    }

    #[test]
    fn measurement_is_stateless_across_threads() {
        use rayon::prelude::*;
        let registry = FontRegistry::new();
        let size = Pt::from_i32(10);
        let widths: Vec<Pt> = (0..64)
            .into_par_iter()
            .map(|i| registry.measure_text_width(HELVETICA, size, &format!("Row {}", i % 4)))
            .collect();
        for (i, width) in widths.iter().enumerate() {
            assert_eq!(*width, widths[i % 4]);
        }
    }

    #[test]
    fn unknown_fonts_fall_back_to_helvetica() {
        let registry = FontRegistry::new();
        let size = Pt::from_i32(10);
        assert_eq!(
            registry.measure_text_width("NoSuchFont", size, "abc"),
            registry.measure_text_width(HELVETICA, size, "abc")
        );
        assert!(!registry.contains("NoSuchFont"));
        assert!(registry.contains("helvetica-bold"));
    }

    #[test]
    fn line_height_includes_line_gap() {
        let registry = FontRegistry::new();
        let height = registry.line_height(HELVETICA, Pt::from_i32(10));
        assert_eq!(height.to_milli_i64(), 11_560);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(vec![0, 1, 2, 3], Some("broken.ttf"))
            .expect_err("garbage is not a font");
        assert!(matches!(err, RenderError::Asset(_)));
    }

    #[test]
    fn winansi_round_trips_euro_and_pound() {
        assert_eq!(winansi_code('€'), Some(0x80));
        assert_eq!(winansi_char(0x80), Some('€'));
        assert_eq!(winansi_code('£'), Some(0xA3));
        assert_eq!(winansi_code('\u{4E2D}'), None);
    }
}
