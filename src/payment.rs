use crate::error::RenderError;
use crate::invoice_page::page_label;
use crate::layout::{
    self, Cursor, PageGeometry, SECTION_GAP, TITLE_GAP, draw_block, draw_divider, draw_rule,
    draw_stacked,
};
use crate::model::{BankDetails, CryptoDetails, InvoiceDocument};
use crate::qr::QrEncoder;
use crate::sink::DocumentSink;
use crate::style::{self, TextAlign, TextFrame};
use crate::types::{Pt, Rect};

pub(crate) const QR_SIZE: i32 = 80;

/// Which payment sections page two carries. Decided once from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSections {
    None,
    BankOnly,
    CryptoOnly,
    BankThenCrypto,
}

impl PaymentSections {
    pub fn for_document(doc: &InvoiceDocument) -> Self {
        match (doc.bank_details.is_some(), doc.crypto_details.is_some()) {
            (false, false) => PaymentSections::None,
            (true, false) => PaymentSections::BankOnly,
            (false, true) => PaymentSections::CryptoOnly,
            (true, true) => PaymentSections::BankThenCrypto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PaymentOutcome {
    pub(crate) sections: PaymentSections,
    pub(crate) qr_degraded: bool,
}

pub(crate) fn compose_payment_page<S: DocumentSink>(
    sink: &mut S,
    doc: &InvoiceDocument,
    geometry: &PageGeometry,
    domain: &str,
    qr: &dyn QrEncoder,
) -> Result<PaymentOutcome, RenderError> {
    let sections = PaymentSections::for_document(doc);
    let mut cursor = Cursor::new(geometry.padding_y);

    let header = layout::draw_header(sink, geometry, domain, cursor.y())?;
    cursor.advance(header + Pt::from_i32(layout::HEADER_GAP));
    let title = draw_block(
        sink,
        "Payment Instructions",
        TextFrame::new(geometry.padding_x, cursor.y(), geometry.content_width()),
        &style::TITLE,
    )?;
    cursor.advance(title + Pt::from_i32(TITLE_GAP));
    draw_divider(sink, geometry, cursor.y())?;
    cursor.advance(Pt::from_i32(SECTION_GAP));

    let mut qr_degraded = false;
    match (&doc.bank_details, &doc.crypto_details) {
        (None, None) => {}
        (Some(bank), None) => draw_bank_section(sink, bank, geometry, &mut cursor)?,
        (None, Some(crypto)) => {
            qr_degraded = draw_crypto_section(sink, crypto, geometry, &mut cursor, qr)?;
        }
        (Some(bank), Some(crypto)) => {
            draw_bank_section(sink, bank, geometry, &mut cursor)?;
            draw_or_separator(sink, geometry, &mut cursor)?;
            qr_degraded = draw_crypto_section(sink, crypto, geometry, &mut cursor, qr)?;
        }
    }
    tracing::debug!(?sections, qr_degraded, "payment sections drawn");

    let label = page_label(2);
    let label_height = sink.measure_text_height(&label, geometry.content_width(), &style::MUTED)?;
    let anchors = geometry.anchors(label_height, Pt::ZERO);
    layout::draw_footer(sink, geometry, &anchors, domain, &label)?;

    Ok(PaymentOutcome {
        sections,
        qr_degraded,
    })
}

fn draw_section_heading<S: DocumentSink>(
    sink: &mut S,
    heading: &str,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    let height = draw_block(
        sink,
        heading,
        TextFrame::new(geometry.padding_x, cursor.y(), geometry.content_width()),
        &style::LABEL,
    )?;
    cursor.advance(height + Pt::from_i32(SECTION_GAP));
    Ok(())
}

fn draw_bank_section<S: DocumentSink>(
    sink: &mut S,
    bank: &BankDetails,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    let top = cursor.y();
    draw_section_heading(sink, "Bank Transfer", geometry, cursor)?;
    let y = cursor.y();
    let wrap = geometry.wrap_width(geometry.column_width(4));
    let heights = [
        draw_stacked(
            sink,
            "Bank Name",
            [bank.bank_name.as_str()],
            geometry.column_x(4, 0),
            y,
            wrap,
        )?,
        draw_stacked(
            sink,
            "IBAN",
            [bank.iban.as_str()],
            geometry.column_x(4, 1),
            y,
            wrap,
        )?,
        draw_stacked(
            sink,
            "SWIFT/BIC",
            [bank.swift_code.as_str()],
            geometry.column_x(4, 2),
            y,
            wrap,
        )?,
        draw_stacked(
            sink,
            "Bank Address",
            bank.bank_address.iter().map(String::as_str),
            geometry.column_x(4, 3),
            y,
            wrap,
        )?,
    ];
    let end = cursor.advance(heights.into_iter().fold(Pt::ZERO, Pt::max));
    sink.mark_section(
        "payment.bank",
        Rect::new(geometry.padding_x, top, geometry.content_width(), end - top),
    );
    Ok(())
}

/// Two rules flanking a centered "OR".
fn draw_or_separator<S: DocumentSink>(
    sink: &mut S,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    cursor.advance(Pt::from_i32(SECTION_GAP));
    let y = cursor.y();
    let text_width = sink.measure_text_width("OR", &style::MUTED)?;
    let height = draw_block(
        sink,
        "OR",
        TextFrame::new(geometry.padding_x, y, geometry.content_width()).aligned(TextAlign::Center),
        &style::MUTED,
    )?;
    let center = geometry.padding_x + geometry.content_width() / 2;
    let half = text_width / 2 + geometry.gutter;
    let rule_y = y + height / 2;
    draw_rule(sink, geometry.padding_x, center - half, rule_y)?;
    draw_rule(sink, center + half, geometry.content_right(), rule_y)?;
    sink.mark_section(
        "payment.or",
        Rect::new(geometry.padding_x, y, geometry.content_width(), height),
    );
    cursor.advance(height + Pt::from_i32(SECTION_GAP));
    Ok(())
}

/// Returns true when the QR image had to be left out.
fn draw_crypto_section<S: DocumentSink>(
    sink: &mut S,
    crypto: &CryptoDetails,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
    qr: &dyn QrEncoder,
) -> Result<bool, RenderError> {
    let top = cursor.y();
    draw_section_heading(sink, "Crypto Payment", geometry, cursor)?;
    let y = cursor.y();
    let column = geometry.column_width(4);
    let network = draw_stacked(
        sink,
        "Network",
        [crypto.network.as_str()],
        geometry.column_x(4, 0),
        y,
        geometry.wrap_width(column),
    )?;
    let address = draw_stacked(
        sink,
        "Wallet Address",
        [crypto.address.as_str()],
        geometry.column_x(4, 1),
        y,
        geometry.wrap_width(column * 2),
    )?;

    // The image area is reserved whether or not encoding succeeds.
    let qr_size = Pt::from_i32(QR_SIZE);
    let qr_rect = Rect::new(geometry.column_x(4, 3), y, qr_size, qr_size);
    let degraded = match qr.encode(&crypto.address) {
        Ok(bytes) => {
            sink.draw_image(&bytes, qr_rect)?;
            false
        }
        Err(err) => {
            tracing::warn!(error = %err, network = %crypto.network, "qr encoding failed; omitting image");
            true
        }
    };

    let end = cursor.advance(network.max(address).max(qr_size));
    sink.mark_section(
        "payment.crypto",
        Rect::new(geometry.padding_x, top, geometry.content_width(), end - top),
    );
    Ok(degraded)
}
