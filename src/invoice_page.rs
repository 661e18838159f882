use crate::currency::format_currency;
use crate::error::RenderError;
use crate::layout::{
    self, Cursor, HEADER_GAP, PageGeometry, ROW_GAP, SECTION_GAP, TABLE_HEADER_GAP, TITLE_GAP,
    draw_block, draw_divider, draw_rule, draw_stacked,
};
use crate::model::{Company, InvoiceDocument};
use crate::sink::DocumentSink;
use crate::style::{self, TextAlign, TextFrame};
use crate::types::{Pt, Rect};

pub(crate) const PAGE_COUNT: usize = 2;

pub(crate) fn page_label(page: usize) -> String {
    format!("{page} of {PAGE_COUNT}")
}

/// Where the line-item flow ended relative to the pinned total row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TableFlow {
    pub(crate) rows: usize,
    pub(crate) flow_end_y: Pt,
    pub(crate) total_row_y: Pt,
}

impl TableFlow {
    /// Positive when the flowed rows run into the total row.
    pub(crate) fn overlap(&self) -> Option<Pt> {
        let overlap = self.flow_end_y - self.total_row_y;
        (overlap > Pt::ZERO).then_some(overlap)
    }
}

// Description | Amount sub-columns inside the right half of the page.
struct TableColumns {
    x: Pt,
    width: Pt,
    sub_width: Pt,
    wrap: Pt,
}

impl TableColumns {
    fn new(geometry: &PageGeometry) -> Self {
        let width = geometry.column_width(2);
        let sub_width = width / 2;
        Self {
            x: geometry.column_x(2, 1),
            width,
            sub_width,
            wrap: geometry.wrap_width(sub_width),
        }
    }

    fn amount_frame(&self, y: Pt) -> TextFrame {
        TextFrame::new(self.x + self.sub_width, y, self.sub_width).aligned(TextAlign::Right)
    }

    fn right(&self) -> Pt {
        self.x + self.width
    }
}

pub(crate) fn compose_invoice_page<S: DocumentSink>(
    sink: &mut S,
    doc: &InvoiceDocument,
    company: &Company,
    geometry: &PageGeometry,
    domain: &str,
) -> Result<TableFlow, RenderError> {
    let mut cursor = Cursor::new(geometry.padding_y);

    let header = layout::draw_header(sink, geometry, domain, cursor.y())?;
    cursor.advance(header + Pt::from_i32(HEADER_GAP));

    let title = draw_block(
        sink,
        "Invoice",
        TextFrame::new(geometry.padding_x, cursor.y(), geometry.content_width()),
        &style::TITLE,
    )?;
    cursor.advance(title + Pt::from_i32(TITLE_GAP));

    draw_company_block(sink, company, geometry, &mut cursor)?;
    draw_divider(sink, geometry, cursor.y())?;
    cursor.advance(Pt::from_i32(SECTION_GAP));

    draw_details_row(sink, doc, geometry, &mut cursor)?;
    draw_divider(sink, geometry, cursor.y())?;
    cursor.advance(Pt::from_i32(SECTION_GAP));

    let columns = TableColumns::new(geometry);
    draw_table_header(sink, &columns, &mut cursor)?;

    let mut rows = 0usize;
    for item in &doc.line_items {
        let amount = format_currency(item.amount_cents(), &doc.currency);
        draw_row(
            sink,
            &columns,
            &mut cursor,
            &item.description,
            item.sub_description.as_deref(),
            &amount,
        )?;
        rows += 1;
    }
    if let Some(fee) = doc.processing_fee() {
        let amount = format_currency(fee.amount_cents, &doc.currency);
        draw_row(sink, &columns, &mut cursor, &fee.label, None, &amount)?;
        rows += 1;
    }
    tracing::debug!(rows, flow_end_mpt = cursor.y().to_milli_i64(), "table flowed");

    let page_label = page_label(1);
    let label_height =
        sink.measure_text_height(&page_label, geometry.content_width(), &style::MUTED)?;
    let total_text = format_currency(doc.total_cents, &doc.currency);
    let total_row_height = sink
        .measure_text_height("Total", columns.wrap, &style::TITLE)?
        .max(sink.measure_text_height(&total_text, columns.sub_width, &style::TOTAL_VALUE)?);
    let anchors = geometry.anchors(label_height, total_row_height);

    let flow_end_y = cursor.anchor_from_bottom(anchors.total_row_y);
    draw_rule(
        sink,
        columns.x,
        columns.right(),
        anchors.total_row_y - Pt::from_i32(ROW_GAP),
    )?;
    draw_block(
        sink,
        "Total",
        TextFrame::new(columns.x, cursor.y(), columns.wrap),
        &style::TITLE,
    )?;
    draw_block(
        sink,
        &total_text,
        columns.amount_frame(cursor.y()),
        &style::TOTAL_VALUE,
    )?;
    sink.mark_section(
        "table.total",
        Rect::new(columns.x, cursor.y(), columns.width, total_row_height),
    );

    layout::draw_footer(sink, geometry, &anchors, domain, &page_label)?;

    Ok(TableFlow {
        rows,
        flow_end_y,
        total_row_y: anchors.total_row_y,
    })
}

fn draw_company_block<S: DocumentSink>(
    sink: &mut S,
    company: &Company,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    let y = cursor.y();
    let wrap = geometry.wrap_width(geometry.column_width(4));
    let address = draw_stacked(
        sink,
        &company.legal_name,
        company.address.iter().map(String::as_str),
        geometry.column_x(4, 0),
        y,
        wrap,
    )?;
    let contact = draw_stacked(
        sink,
        "Contact",
        std::iter::once(company.email.as_str()).chain(company.phone.as_deref()),
        geometry.column_x(4, 1),
        y,
        wrap,
    )?;
    let height = address.max(contact);
    sink.mark_section(
        "company",
        Rect::new(geometry.padding_x, y, geometry.content_width(), height),
    );
    tracing::debug!(height_mpt = height.to_milli_i64(), "company block");
    cursor.advance(height + Pt::from_i32(SECTION_GAP));
    Ok(())
}

fn draw_details_row<S: DocumentSink>(
    sink: &mut S,
    doc: &InvoiceDocument,
    geometry: &PageGeometry,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    let y = cursor.y();
    let wrap = geometry.wrap_width(geometry.column_width(4));
    let client = &doc.client;
    let recipient = std::iter::once(client.name.as_str())
        .chain(client.address.iter().map(String::as_str))
        .chain(std::iter::once(client.email.as_str()));

    let heights = [
        draw_stacked(
            sink,
            "Invoice no.",
            [doc.invoice_number.as_str()],
            geometry.column_x(4, 0),
            y,
            wrap,
        )?,
        draw_stacked(sink, "To", recipient, geometry.column_x(4, 1), y, wrap)?,
        draw_stacked(
            sink,
            "Issue Date",
            [doc.date.as_str()],
            geometry.column_x(4, 2),
            y,
            wrap,
        )?,
        draw_stacked(
            sink,
            "Due Date",
            [doc.due_date.as_str()],
            geometry.column_x(4, 3),
            y,
            wrap,
        )?,
    ];
    let height = heights.into_iter().fold(Pt::ZERO, Pt::max);
    sink.mark_section(
        "details",
        Rect::new(geometry.padding_x, y, geometry.content_width(), height),
    );
    tracing::debug!(height_mpt = height.to_milli_i64(), "invoice details");
    cursor.advance(height + Pt::from_i32(SECTION_GAP));
    Ok(())
}

fn draw_table_header<S: DocumentSink>(
    sink: &mut S,
    columns: &TableColumns,
    cursor: &mut Cursor,
) -> Result<(), RenderError> {
    let y = cursor.y();
    let description = draw_block(
        sink,
        "Description",
        TextFrame::new(columns.x, y, columns.wrap),
        &style::LABEL,
    )?;
    let amount = draw_block(sink, "Amount", columns.amount_frame(y), &style::LABEL)?;
    cursor.advance(description.max(amount) + Pt::from_i32(TABLE_HEADER_GAP));
    draw_rule(sink, columns.x, columns.right(), cursor.y())?;
    cursor.advance(Pt::from_i32(ROW_GAP));
    Ok(())
}

fn draw_row<S: DocumentSink>(
    sink: &mut S,
    columns: &TableColumns,
    cursor: &mut Cursor,
    description: &str,
    sub_description: Option<&str>,
    amount: &str,
) -> Result<(), RenderError> {
    let row_start = cursor.y();
    let description_height = draw_block(
        sink,
        description,
        TextFrame::new(columns.x, row_start, columns.wrap),
        &style::LABEL,
    )?;
    let sub_height = match sub_description.filter(|text| !text.trim().is_empty()) {
        Some(text) => draw_block(
            sink,
            text,
            TextFrame::new(columns.x, row_start + description_height, columns.wrap),
            &style::SUBTITLE,
        )?,
        None => Pt::ZERO,
    };
    let amount_height = draw_block(sink, amount, columns.amount_frame(row_start), &style::VALUE)?;

    let content_height = (description_height + sub_height).max(amount_height);
    let rule_y = row_start + content_height + Pt::from_i32(ROW_GAP);
    draw_rule(sink, columns.x, columns.right(), rule_y)?;
    sink.mark_section(
        "table.row",
        Rect::new(columns.x, row_start, columns.width, content_height),
    );
    cursor.advance(content_height + Pt::from_i32(ROW_GAP) * 2);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Document};
    use crate::font::FontRegistry;
    use crate::model::LineItem;
    use crate::model::fixtures::invoice;
    use crate::pdf::PdfOptions;
    use crate::sink::PdfSink;
    use crate::style::FontSet;
    use crate::types::Size;
    use std::sync::Arc;

    fn render_page_one(doc: &InvoiceDocument) -> (TableFlow, Document) {
        let mut sink = PdfSink::new(
            Size::invoice_landscape(),
            Arc::new(FontRegistry::new()),
            FontSet::default(),
            PdfOptions::default(),
        );
        let company = doc.validate().expect("valid");
        let flow = compose_invoice_page(
            &mut sink,
            doc,
            company,
            &PageGeometry::invoice(),
            "outpacestudios.com",
        )
        .expect("page one");
        (flow, sink.into_document())
    }

    fn section_tops(document: &Document, key: &str) -> Vec<i64> {
        document.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Meta { key: k, value } if k == key => {
                    value.split(',').nth(1).and_then(|v| v.parse().ok())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn draws_fixed_labels_in_order() {
        let doc = invoice(vec![LineItem::new("Retainer", 1, 500000)], 500000);
        let (_, document) = render_page_one(&doc);
        let strings: Vec<&str> = document.pages[0].strings().collect();
        let position = |needle: &str| {
            strings
                .iter()
                .position(|s| *s == needle)
                .unwrap_or_else(|| panic!("{needle} missing"))
        };
        assert!(position("outpacestudios.com") < position("Invoice"));
        assert!(position("Invoice") < position("Outpace Studios Ltd"));
        assert!(position("Contact") < position("Invoice no."));
        assert!(position("Invoice no.") < position("Description"));
        assert!(position("Description") < position("Retainer"));
        assert!(position("Retainer") < position("Total"));
        assert!(strings.contains(&"$5,000.00"));
        assert!(strings.contains(&"1 of 2"));
        assert!(strings.contains(&"+44 20 7946 0000"));
    }

    #[test]
    fn total_position_ignores_row_count() {
        let one = invoice(vec![LineItem::new("A", 1, 100)], 100);
        let mut three = invoice(
            vec![
                LineItem::new("A", 1, 100).with_sub_description("first"),
                LineItem::new("B", 2, 100).with_sub_description("second"),
                LineItem::new("C", 3, 100).with_sub_description("third"),
            ],
            600,
        );
        three.processing_fee_percent = Some(4.4);
        let (flow_one, doc_one) = render_page_one(&one);
        let (flow_three, doc_three) = render_page_one(&three);
        assert_eq!(flow_one.total_row_y, flow_three.total_row_y);
        assert_eq!(
            section_tops(&doc_one, "table.total"),
            section_tops(&doc_three, "table.total")
        );
        assert_eq!(flow_one.rows, 1);
        assert_eq!(flow_three.rows, 4);
        assert!(flow_three.flow_end_y > flow_one.flow_end_y);
        assert_eq!(section_tops(&doc_three, "table.row").len(), 4);
    }

    #[test]
    fn rows_flow_strictly_downward() {
        let doc = invoice(
            vec![
                LineItem::new("Design and development retainer for the full quarter", 1, 100)
                    .with_sub_description("Covers product design, frontend and backend work"),
                LineItem::new("B", 1, 100),
            ],
            200,
        );
        let (_, document) = render_page_one(&doc);
        let tops = section_tops(&document, "table.row");
        assert_eq!(tops.len(), 2);
        // The sub-description line pushes the second row further down.
        assert!(tops[1] - tops[0] > 3 * 11_560);
    }

    #[test]
    fn long_tables_report_overlap_with_the_total() {
        let items = (0..12)
            .map(|i| LineItem::new(format!("Item {i}"), 1, 100).with_sub_description("detail"))
            .collect();
        let (flow, _) = render_page_one(&invoice(items, 1200));
        let overlap = flow.overlap().expect("rows collide with the total");
        assert!(overlap > Pt::ZERO);
    }

    #[test]
    fn short_tables_do_not_overlap() {
        let (flow, _) = render_page_one(&invoice(vec![LineItem::new("A", 1, 100)], 100));
        assert!(flow.overlap().is_none());
    }
}
