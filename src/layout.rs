use crate::error::RenderError;
use crate::sink::DocumentSink;
use crate::style::{self, StrokeStyle, TextFrame, TextStyle};
use crate::types::{Pt, Rect, Size};

pub const PADDING_X: i32 = 32;
pub const PADDING_Y: i32 = 24;
pub const GUTTER: i32 = 16;

// Vertical rhythm, in points.
pub(crate) const HEADER_GAP: i32 = 16;
pub(crate) const TITLE_GAP: i32 = 16;
pub(crate) const SECTION_GAP: i32 = 16;
pub(crate) const FIELD_GAP: i32 = 8;
pub(crate) const TABLE_HEADER_GAP: i32 = 10;
pub(crate) const ROW_GAP: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub size: Size,
    pub padding_x: Pt,
    pub padding_y: Pt,
    pub gutter: Pt,
}

impl PageGeometry {
    pub fn invoice() -> Self {
        Self {
            size: Size::invoice_landscape(),
            padding_x: Pt::from_i32(PADDING_X),
            padding_y: Pt::from_i32(PADDING_Y),
            gutter: Pt::from_i32(GUTTER),
        }
    }

    pub fn content_width(&self) -> Pt {
        (self.size.width - self.padding_x * 2).max(Pt::ZERO)
    }

    pub fn content_right(&self) -> Pt {
        self.padding_x + self.content_width()
    }

    pub fn column_width(&self, columns: i32) -> Pt {
        self.content_width() / columns.max(1)
    }

    /// Column `index` of `columns` equal columns spanning the content width.
    pub fn column_x(&self, columns: i32, index: i32) -> Pt {
        self.padding_x + self.content_width().mul_ratio(index, columns.max(1))
    }

    /// Width available to wrapped text inside a column.
    pub fn wrap_width(&self, column_width: Pt) -> Pt {
        (column_width - self.gutter).max(Pt::ZERO)
    }

    pub fn anchors(&self, label_height: Pt, total_row_height: Pt) -> BottomAnchors {
        let footer_y = self.size.height - self.padding_y - label_height;
        let bottom_divider_y = footer_y - self.padding_y;
        let total_row_y = bottom_divider_y - self.padding_y - total_row_height;
        BottomAnchors {
            footer_y,
            bottom_divider_y,
            total_row_y,
        }
    }
}

/// Positions computed backward from the page bottom. These never depend on
/// how much content flowed above them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BottomAnchors {
    pub footer_y: Pt,
    pub bottom_divider_y: Pt,
    pub total_row_y: Pt,
}

/// Running vertical offset for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    y: Pt,
}

impl Cursor {
    pub fn new(y: Pt) -> Self {
        Self { y }
    }

    pub fn y(&self) -> Pt {
        self.y
    }

    /// Moves down by `delta` and returns the new offset. Negative deltas are
    /// ignored so the flow never moves back up.
    pub fn advance(&mut self, delta: Pt) -> Pt {
        self.y += delta.max(Pt::ZERO);
        self.y
    }

    /// Jumps to a bottom-anchored position. Returns the flowed offset it
    /// replaced so the caller can check for collisions.
    pub fn anchor_from_bottom(&mut self, y: Pt) -> Pt {
        std::mem::replace(&mut self.y, y)
    }
}

/// Measures, draws and returns the measured height.
pub fn draw_block<S: DocumentSink>(
    sink: &mut S,
    text: &str,
    frame: TextFrame,
    style: &TextStyle,
) -> Result<Pt, RenderError> {
    let height = sink.measure_text_height(text, frame.width, style)?;
    sink.draw_text(text, frame, style)?;
    Ok(height)
}

/// A bold label followed by value lines, each placed under the previous one's
/// measured height. Blank values are skipped. Returns the stack height.
pub fn draw_stacked<'a, S, I>(
    sink: &mut S,
    label: &str,
    values: I,
    x: Pt,
    y: Pt,
    width: Pt,
) -> Result<Pt, RenderError>
where
    S: DocumentSink,
    I: IntoIterator<Item = &'a str>,
{
    let mut cursor = Cursor::new(y);
    cursor.advance(draw_block(
        sink,
        label,
        TextFrame::new(x, y, width),
        &style::LABEL,
    )?);
    cursor.advance(Pt::from_i32(FIELD_GAP));
    for value in values.into_iter().filter(|value| !value.trim().is_empty()) {
        let height = draw_block(
            sink,
            value,
            TextFrame::new(x, cursor.y(), width),
            &style::VALUE,
        )?;
        cursor.advance(height);
    }
    Ok(cursor.y() - y)
}

/// Full-bleed section divider.
pub fn draw_divider<S: DocumentSink>(
    sink: &mut S,
    geometry: &PageGeometry,
    y: Pt,
) -> Result<(), RenderError> {
    draw_rule(sink, Pt::ZERO, geometry.size.width, y)
}

pub fn draw_rule<S: DocumentSink>(sink: &mut S, x1: Pt, x2: Pt, y: Pt) -> Result<(), RenderError> {
    sink.draw_line((x1, y), (x2, y), &StrokeStyle::divider())
}

/// Header shared by both pages: brand mark on the left, domain text
/// right-aligned. Returns the header height.
pub(crate) fn draw_header<S: DocumentSink>(
    sink: &mut S,
    geometry: &PageGeometry,
    domain: &str,
    y: Pt,
) -> Result<Pt, RenderError> {
    let mark = &crate::brand::BRAND_MARK;
    sink.draw_path(mark, geometry.padding_x, y)?;
    let domain_height = draw_block(
        sink,
        domain,
        TextFrame::new(geometry.padding_x, y, geometry.content_width())
            .aligned(style::TextAlign::Right),
        &style::MUTED,
    )?;
    let height = domain_height.max(mark.height());
    sink.mark_section(
        "header",
        Rect::new(geometry.padding_x, y, geometry.content_width(), height),
    );
    Ok(height)
}

/// Footer shared by both pages: full-width divider, muted domain on the left
/// and the page label on the right.
pub(crate) fn draw_footer<S: DocumentSink>(
    sink: &mut S,
    geometry: &PageGeometry,
    anchors: &BottomAnchors,
    domain: &str,
    page_label: &str,
) -> Result<(), RenderError> {
    draw_divider(sink, geometry, anchors.bottom_divider_y)?;
    let width = geometry.content_width();
    let left = draw_block(
        sink,
        domain,
        TextFrame::new(geometry.padding_x, anchors.footer_y, width),
        &style::MUTED,
    )?;
    let right = draw_block(
        sink,
        page_label,
        TextFrame::new(geometry.padding_x, anchors.footer_y, width)
            .aligned(style::TextAlign::Right),
        &style::MUTED,
    )?;
    sink.mark_section(
        "footer",
        Rect::new(geometry.padding_x, anchors.footer_y, width, left.max(right)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_divide_the_content_width() {
        let geometry = PageGeometry::invoice();
        assert_eq!(geometry.content_width(), Pt::from_i32(778));
        assert_eq!(geometry.column_x(4, 0), Pt::from_i32(32));
        assert_eq!(geometry.column_x(4, 2), Pt::from_i32(421));
        assert_eq!(geometry.column_width(4).to_milli_i64(), 194_500);
        assert_eq!(geometry.wrap_width(geometry.column_width(4)).to_milli_i64(), 178_500);
        assert_eq!(geometry.content_right(), Pt::from_i32(810));
    }

    #[test]
    fn anchors_are_computed_from_the_page_bottom() {
        let geometry = PageGeometry::invoice();
        let anchors = geometry.anchors(Pt::from_f32(11.56), Pt::from_f32(20.808));
        assert_eq!(anchors.footer_y.to_milli_i64(), 559_440);
        assert_eq!(anchors.bottom_divider_y.to_milli_i64(), 535_440);
        assert_eq!(anchors.total_row_y.to_milli_i64(), 490_632);
    }

    #[test]
    fn cursor_only_moves_down_until_anchored() {
        let mut cursor = Cursor::new(Pt::from_i32(24));
        assert_eq!(cursor.advance(Pt::from_i32(10)), Pt::from_i32(34));
        assert_eq!(cursor.advance(Pt::from_i32(-5)), Pt::from_i32(34));
        let flowed = cursor.anchor_from_bottom(Pt::from_i32(20));
        assert_eq!(flowed, Pt::from_i32(34));
        assert_eq!(cursor.y(), Pt::from_i32(20));
    }
}
