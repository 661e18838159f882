//! Deterministic two-page invoice layout engine.
//!
//! An [`InvoiceDocument`] is flowed top-down onto a fixed 842 x 595 canvas
//! with measured text heights, the total row is pinned to the bottom of page
//! one, and page two carries the payment instructions. Output is a PDF held
//! in memory.

mod brand;
mod canvas;
mod currency;
mod error;
mod font;
mod inspect;
mod invoice_page;
mod layout;
mod metrics;
mod model;
mod payment;
mod pdf;
mod perf;
mod qr;
mod sink;
mod style;
mod text;
mod types;

pub use brand::{BRAND_MARK, PathOp, VectorPath};
pub use currency::{
    currency_symbol, dollars_to_cents, format_currency, format_percent, line_total_cents,
    percent_of_cents, subtotal_cents,
};
pub use error::{QrError, RenderError};
pub use inspect::{
    PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path,
};
pub use layout::PageGeometry;
pub use metrics::{PageMetrics, RenderMetrics};
pub use model::{
    BankDetails, BillingType, Client, Company, CryptoDetails, FeeLine, InvoiceDocument, LineItem,
};
pub use payment::PaymentSections;
pub use qr::{QrCodeEncoder, QrEncoder};
pub use sink::{DocumentSink, PdfSink};
pub use style::{FontSet, FontWeight, StrokeStyle, TextAlign, TextFrame, TextStyle};
pub use types::{Color, Pt, Rect, Size};

use font::FontRegistry;
use invoice_page::TableFlow;
use payment::PaymentOutcome;
use pdf::PdfOptions;
use perf::PerfLogger;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_DOMAIN: &str = "outpacestudios.com";

/// What happens when the line items run into the pinned total row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Render anyway and log the overlap.
    #[default]
    Allow,
    /// Fail with [`RenderError::LayoutOverflow`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct RenderedInvoice {
    pub bytes: Vec<u8>,
    pub metrics: RenderMetrics,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
}

struct ComposeOutcome {
    table: TableFlow,
    payment: PaymentOutcome,
}

pub struct InvoiceRenderer {
    domain: String,
    font_registry: Arc<FontRegistry>,
    font_set: FontSet,
    geometry: PageGeometry,
    overflow_policy: OverflowPolicy,
    qr_encoder: Arc<dyn QrEncoder>,
    perf: Option<PerfLogger>,
}

impl InvoiceRenderer {
    pub fn builder() -> InvoiceRendererBuilder {
        InvoiceRendererBuilder::new()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Renders both pages to an in-memory PDF.
    pub fn render(&self, doc: &InvoiceDocument) -> Result<RenderedInvoice, RenderError> {
        let started = Instant::now();
        doc.validate()?;
        let mut sink = self.pdf_sink(doc);
        let outcome = self.draw_pages(doc, &mut sink)?;
        let compose_ms = started.elapsed().as_secs_f64() * 1000.0;

        let finalize_started = Instant::now();
        let (bytes, pages) = sink.finalize_with_metrics()?;
        let finalize_ms = finalize_started.elapsed().as_secs_f64() * 1000.0;

        let metrics = RenderMetrics {
            pages,
            render_ms: started.elapsed().as_secs_f64() * 1000.0,
            total_bytes: bytes.len(),
            qr_degraded: outcome.payment.qr_degraded,
            table_overflow_milli: outcome.table.overlap().map(Pt::to_milli_i64),
        };
        if let Some(perf) = &self.perf {
            let invoice = doc.invoice_number.as_str();
            perf.log_span_ms("compose", invoice, compose_ms);
            perf.log_span_ms("finalize", invoice, finalize_ms);
            let commands: usize = metrics.pages.iter().map(|p| p.command_count).sum();
            perf.log_counts(
                "render",
                invoice,
                &[
                    ("pages", metrics.pages.len() as u64),
                    ("rows", outcome.table.rows as u64),
                    ("commands", commands as u64),
                    ("bytes", bytes.len() as u64),
                ],
            );
            perf.flush();
        }
        tracing::debug!(
            invoice = %doc.invoice_number,
            bytes = bytes.len(),
            render_ms = metrics.render_ms,
            "invoice rendered"
        );

        let sha256 = sha256_hex(&bytes);
        Ok(RenderedInvoice {
            bytes,
            metrics,
            sha256,
        })
    }

    /// Renders onto a caller-supplied sink and returns whatever it finalizes
    /// to. Input is validated before the sink sees any call.
    pub fn render_with_sink<S: DocumentSink>(
        &self,
        doc: &InvoiceDocument,
        mut sink: S,
    ) -> Result<Vec<u8>, RenderError> {
        self.draw_pages(doc, &mut sink)?;
        sink.finalize()
    }

    /// Renders independent invoices on the rayon pool. Results keep the
    /// input order.
    pub fn render_many_parallel(
        &self,
        docs: &[InvoiceDocument],
    ) -> Vec<Result<RenderedInvoice, RenderError>> {
        docs.par_iter().map(|doc| self.render(doc)).collect()
    }

    /// A fresh PDF sink configured with this renderer's fonts, for use with
    /// [`InvoiceRenderer::render_with_sink`].
    pub fn pdf_sink(&self, doc: &InvoiceDocument) -> PdfSink {
        PdfSink::new(
            self.geometry.size,
            Arc::clone(&self.font_registry),
            self.font_set.clone(),
            PdfOptions {
                title: Some(format!("Invoice {}", doc.invoice_number)),
            },
        )
    }

    fn draw_pages<S: DocumentSink>(
        &self,
        doc: &InvoiceDocument,
        sink: &mut S,
    ) -> Result<ComposeOutcome, RenderError> {
        let company = doc.validate()?;

        let table = invoice_page::compose_invoice_page(
            sink,
            doc,
            company,
            &self.geometry,
            &self.domain,
        )?;
        if let Some(overlap) = table.overlap() {
            tracing::warn!(
                invoice = %doc.invoice_number,
                rows = table.rows,
                overlap_pt = overlap.to_f32(),
                "line items run into the total row"
            );
            if self.overflow_policy == OverflowPolicy::Reject {
                return Err(RenderError::LayoutOverflow {
                    overlap_milli: overlap.to_milli_i64(),
                });
            }
        }

        sink.add_page()?;
        let payment = payment::compose_payment_page(
            sink,
            doc,
            &self.geometry,
            &self.domain,
            self.qr_encoder.as_ref(),
        )?;

        if sink.page_count() != invoice_page::PAGE_COUNT {
            return Err(RenderError::DrawPrimitive(format!(
                "sink reports {} pages after composing",
                sink.page_count()
            )));
        }
        Ok(ComposeOutcome { table, payment })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Clone)]
pub struct InvoiceRendererBuilder {
    domain: String,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, Option<String>)>,
    font_set: FontSet,
    overflow_policy: OverflowPolicy,
    qr_encoder: Arc<dyn QrEncoder>,
    perf_path: Option<PathBuf>,
}

impl Default for InvoiceRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceRendererBuilder {
    pub fn new() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            font_set: FontSet::default(),
            overflow_policy: OverflowPolicy::default(),
            qr_encoder: Arc::new(QrCodeEncoder::default()),
            perf_path: None,
        }
    }

    /// Brand domain shown in the header and footer of both pages.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    /// Registers TrueType/OpenType bytes, optionally under an explicit name.
    pub fn register_font_bytes(mut self, data: Vec<u8>, name: Option<&str>) -> Self {
        self.font_bytes.push((data, name.map(str::to_string)));
        self
    }

    pub fn font_set(mut self, font_set: FontSet) -> Self {
        self.font_set = font_set;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn qr_encoder(mut self, encoder: Arc<dyn QrEncoder>) -> Self {
        self.qr_encoder = encoder;
        self
    }

    /// JSONL timing/counter log, one record per span.
    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<InvoiceRenderer, RenderError> {
        let domain = self.domain.trim();
        if domain.is_empty() {
            return Err(RenderError::InvalidConfiguration(
                "domain must not be empty".to_string(),
            ));
        }
        let mut registry = FontRegistry::new();
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, name) in self.font_bytes {
            registry.register_bytes(data, name.as_deref())?;
        }
        for name in [&self.font_set.medium, &self.font_set.bold] {
            if !registry.contains(name) {
                return Err(RenderError::InvalidConfiguration(format!(
                    "font '{name}' is not registered"
                )));
            }
        }
        let perf = match self.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        Ok(InvoiceRenderer {
            domain: domain.to_string(),
            font_registry: Arc::new(registry),
            font_set: self.font_set,
            geometry: PageGeometry::invoice(),
            overflow_policy: self.overflow_policy,
            qr_encoder: self.qr_encoder,
            perf,
        })
    }
}
