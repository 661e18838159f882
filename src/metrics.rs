use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub text_count: usize,
    pub image_count: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderMetrics {
    pub pages: Vec<PageMetrics>,
    pub render_ms: f64,
    pub total_bytes: usize,
    /// Set when the QR image was left out of the crypto section.
    pub qr_degraded: bool,
    /// How far the last table row runs past the total row, in milli-points.
    pub table_overflow_milli: Option<i64>,
}
