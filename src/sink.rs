//! The drawing surface the layout engine talks to.
//!
//! Every call carries its own style; implementations must not rely on state
//! left behind by a previous call.

use crate::brand::{PlacedOp, VectorPath};
use crate::canvas::Canvas;
use crate::error::RenderError;
use crate::font::FontRegistry;
use crate::metrics::PageMetrics;
use crate::pdf::{self, PdfOptions};
use crate::style::{FontSet, StrokeStyle, TextAlign, TextFrame, TextStyle};
use crate::text::{wrap_lines, wrapped_height};
use crate::types::{Color, Pt, Rect, Size};
use std::sync::Arc;

pub trait DocumentSink {
    /// Height of `text` wrapped at `width`. Empty text measures one line.
    fn measure_text_height(&self, text: &str, width: Pt, style: &TextStyle)
    -> Result<Pt, RenderError>;

    /// Unwrapped advance width of a single line.
    fn measure_text_width(&self, text: &str, style: &TextStyle) -> Result<Pt, RenderError>;

    /// Draws `text` wrapped at `frame.width`, top of the first line at
    /// `frame.y`.
    fn draw_text(&mut self, text: &str, frame: TextFrame, style: &TextStyle)
    -> Result<(), RenderError>;

    fn draw_line(
        &mut self,
        from: (Pt, Pt),
        to: (Pt, Pt),
        stroke: &StrokeStyle,
    ) -> Result<(), RenderError>;

    /// Fills a vector path anchored at `(x, y)`.
    fn draw_path(&mut self, path: &VectorPath, x: Pt, y: Pt) -> Result<(), RenderError>;

    /// Places encoded PNG or JPEG bytes into `rect`.
    fn draw_image(&mut self, bytes: &[u8], rect: Rect) -> Result<(), RenderError>;

    fn add_page(&mut self) -> Result<(), RenderError>;

    fn page_count(&self) -> usize;

    /// Records the extent of a named section. Not rendered.
    fn mark_section(&mut self, _name: &str, _rect: Rect) {}

    /// Consumes the sink and returns the complete output once every byte has
    /// been written.
    fn finalize(self) -> Result<Vec<u8>, RenderError>
    where
        Self: Sized;
}

/// Records onto a [`Canvas`] and serializes to PDF on finalize.
pub struct PdfSink {
    canvas: Canvas,
    fonts: Arc<FontRegistry>,
    font_set: FontSet,
    options: PdfOptions,
    page_metrics: Vec<PageMetrics>,
}

impl PdfSink {
    pub(crate) fn new(
        page_size: Size,
        fonts: Arc<FontRegistry>,
        font_set: FontSet,
        options: PdfOptions,
    ) -> Self {
        Self {
            canvas: Canvas::new(page_size),
            fonts,
            font_set,
            options,
            page_metrics: Vec::new(),
        }
    }

    fn font_name(&self, style: &TextStyle) -> &str {
        self.font_set.font_for(style.weight)
    }

    fn apply_text_style(&mut self, style: &TextStyle) {
        let name = self.font_set.font_for(style.weight).to_string();
        self.canvas.set_font_name(&name);
        self.canvas.set_font_size(style.size());
        self.canvas.set_fill_color(Color::BLACK);
        self.canvas.set_opacity(style.opacity, 1.0);
    }

    fn line_height(&self, style: &TextStyle) -> Pt {
        self.fonts.line_height(self.font_name(style), style.size())
    }

    fn wrap(&self, text: &str, width: Pt, style: &TextStyle) -> Vec<String> {
        let name = self.font_name(style);
        let size = style.size();
        wrap_lines(text, width, |candidate| {
            self.fonts.measure_text_width(name, size, candidate)
        })
    }

    #[cfg(test)]
    pub(crate) fn into_document(mut self) -> crate::canvas::Document {
        self.close_page_metrics();
        self.canvas.finish()
    }

    fn close_page_metrics(&mut self) {
        self.page_metrics.push(PageMetrics {
            page_number: self.canvas.page_count(),
            command_count: self.canvas.current_command_count(),
            ..PageMetrics::default()
        });
    }

    /// Finalizes and also reports per-page metrics.
    pub(crate) fn finalize_with_metrics(mut self) -> Result<(Vec<u8>, Vec<PageMetrics>), RenderError> {
        self.close_page_metrics();
        let mut page_metrics = std::mem::take(&mut self.page_metrics);
        let fonts = Arc::clone(&self.fonts);
        let options = self.options.clone();
        let document = self.canvas.finish();
        let output = pdf::document_to_pdf(&document, &fonts, &options)?;
        for ((metrics, page), content_bytes) in page_metrics
            .iter_mut()
            .zip(&document.pages)
            .zip(output.page_content_bytes)
        {
            metrics.text_count = page.strings().count();
            metrics.image_count = page.image_count();
            metrics.content_bytes = content_bytes;
        }
        Ok((output.bytes, page_metrics))
    }
}

impl DocumentSink for PdfSink {
    fn measure_text_height(
        &self,
        text: &str,
        width: Pt,
        style: &TextStyle,
    ) -> Result<Pt, RenderError> {
        if width < Pt::ZERO {
            return Err(RenderError::Measurement(format!(
                "negative wrap width {}mpt",
                width.to_milli_i64()
            )));
        }
        let lines = self.wrap(text, width, style);
        Ok(wrapped_height(lines.len(), self.line_height(style)))
    }

    fn measure_text_width(&self, text: &str, style: &TextStyle) -> Result<Pt, RenderError> {
        Ok(self
            .fonts
            .measure_text_width(self.font_name(style), style.size(), text))
    }

    fn draw_text(
        &mut self,
        text: &str,
        frame: TextFrame,
        style: &TextStyle,
    ) -> Result<(), RenderError> {
        if frame.width < Pt::ZERO {
            return Err(RenderError::DrawPrimitive(format!(
                "negative text frame width {}mpt",
                frame.width.to_milli_i64()
            )));
        }
        let lines = self.wrap(text, frame.width, style);
        let line_height = self.line_height(style);
        self.apply_text_style(style);
        let mut y = frame.y;
        for line in lines {
            if !line.is_empty() {
                let x = match frame.align {
                    TextAlign::Left => frame.x,
                    TextAlign::Right | TextAlign::Center => {
                        let slack = (frame.width - self.measure_text_width(&line, style)?)
                            .max(Pt::ZERO);
                        match frame.align {
                            TextAlign::Right => frame.x + slack,
                            _ => frame.x + slack / 2,
                        }
                    }
                };
                self.canvas.draw_string(x, y, line);
            }
            y += line_height;
        }
        Ok(())
    }

    fn draw_line(
        &mut self,
        from: (Pt, Pt),
        to: (Pt, Pt),
        stroke: &StrokeStyle,
    ) -> Result<(), RenderError> {
        if stroke.width <= Pt::ZERO {
            return Err(RenderError::DrawPrimitive(
                "stroke width must be positive".to_string(),
            ));
        }
        self.canvas.set_stroke_color(stroke.color);
        self.canvas.set_line_width(stroke.width);
        self.canvas.set_opacity(1.0, stroke.opacity);
        self.canvas.move_to(from.0, from.1);
        self.canvas.line_to(to.0, to.1);
        self.canvas.stroke();
        Ok(())
    }

    fn draw_path(&mut self, path: &VectorPath, x: Pt, y: Pt) -> Result<(), RenderError> {
        if path.ops.is_empty() {
            return Err(RenderError::DrawPrimitive("empty vector path".to_string()));
        }
        self.canvas.save_state();
        self.canvas.set_fill_color(path.fill);
        self.canvas.set_opacity(1.0, 1.0);
        for op in path.placed(x, y) {
            match op {
                PlacedOp::MoveTo((px, py)) => self.canvas.move_to(px, py),
                PlacedOp::LineTo((px, py)) => self.canvas.line_to(px, py),
                PlacedOp::CubicTo((x1, y1), (x2, y2), (x3, y3)) => {
                    self.canvas.curve_to(x1, y1, x2, y2, x3, y3)
                }
                PlacedOp::Close => self.canvas.close_path(),
            }
        }
        self.canvas.fill();
        self.canvas.restore_state();
        Ok(())
    }

    fn draw_image(&mut self, bytes: &[u8], rect: Rect) -> Result<(), RenderError> {
        if rect.width <= Pt::ZERO || rect.height <= Pt::ZERO {
            return Err(RenderError::DrawPrimitive(
                "image rect must have a positive size".to_string(),
            ));
        }
        let resource_id = pdf::image_data_uri(bytes)?;
        self.canvas.draw_image(rect, resource_id);
        Ok(())
    }

    fn add_page(&mut self) -> Result<(), RenderError> {
        self.close_page_metrics();
        self.canvas.show_page();
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.canvas.page_count()
    }

    fn mark_section(&mut self, name: &str, rect: Rect) {
        self.canvas.record_bounds(name, rect);
    }

    fn finalize(self) -> Result<Vec<u8>, RenderError> {
        self.finalize_with_metrics().map(|(bytes, _)| bytes)
    }
}
