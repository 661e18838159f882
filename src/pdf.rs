use crate::canvas::{Command, Document, Page};
use crate::error::RenderError;
use crate::font::{FontMetrics, FontProgramKind, FontRegistry, RegisteredFont, winansi_code};
use crate::types::{Color, Pt, Size};
use base64::Engine;
use fixed::types::I32F32;
use image::GenericImageView;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

const PRODUCER: &str = "ledgerpress";
const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const RESOURCES_ID: usize = 3;
const INFO_ID: usize = 4;
const FIRST_DYNAMIC_ID: usize = 5;

#[derive(Debug, Clone, Default)]
pub(crate) struct PdfOptions {
    pub(crate) title: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct PdfOutput {
    pub(crate) bytes: Vec<u8>,
    pub(crate) page_content_bytes: Vec<usize>,
}

/// Serializes a recorded document. Object numbering depends only on the
/// commands, so equal documents produce equal bytes.
pub(crate) fn document_to_pdf(
    document: &Document,
    registry: &FontRegistry,
    options: &PdfOptions,
) -> Result<PdfOutput, RenderError> {
    let mut objects: Vec<String> = Vec::new();
    let mut next_id = FIRST_DYNAMIC_ID;

    let font_names = collect_font_names(document, registry);
    let mut font_map: BTreeMap<String, String> = BTreeMap::new();
    let mut font_resources = Vec::new();
    for (index, name) in font_names.iter().enumerate() {
        let resource = format!("F{}", index + 1);
        let font = registry.resolve(name);
        let (font_objects, font_id) = match font.program_kind {
            FontProgramKind::Base14 => (vec![font_object(&font.name)], next_id),
            FontProgramKind::TrueType | FontProgramKind::OpenTypeCff => {
                build_truetype_font_objects(font, next_id)
            }
        };
        next_id += font_objects.len();
        objects.extend(font_objects);
        font_resources.push((resource.clone(), font_id));
        font_map.insert(name.clone(), resource);
    }

    let (gs_objects, gs_resources, gs_map) = build_extgstate_objects(document, next_id);
    next_id += gs_objects.len();
    objects.extend(gs_objects);

    let (image_objects, image_resources, image_map) = build_image_objects(document, next_id)?;
    next_id += image_objects.len();
    objects.extend(image_objects);

    let page_height = document.page_size.height;
    let mut page_ids = Vec::with_capacity(document.pages.len());
    let mut page_content_bytes = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, page_height, registry, &font_map, &gs_map, &image_map);
        page_content_bytes.push(content.len());
        let content_id = next_id;
        let page_id = next_id + 1;
        next_id += 2;
        objects.push(stream_object(&content));
        objects.push(page_object(document.page_size, content_id));
        page_ids.push(page_id);
    }

    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut head = vec![
        format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>"),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_ids.len()
        ),
        resources_object(&font_resources, &gs_resources, &image_resources),
        info_object(options.title.as_deref()),
    ];
    head.extend(objects);

    Ok(PdfOutput {
        bytes: build_pdf(&head, CATALOG_ID, INFO_ID)?,
        page_content_bytes,
    })
}

// Sorted so the resource numbering never depends on draw order.
fn collect_font_names(document: &Document, registry: &FontRegistry) -> Vec<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        let mut current = "Helvetica".to_string();
        for cmd in &page.commands {
            match cmd {
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { .. } => {
                    names.insert(registry.resolve(&current).name.clone());
                }
                _ => {}
            }
        }
    }
    names.into_iter().collect()
}

fn build_truetype_font_objects(font: &RegisteredFont, start_id: usize) -> (Vec<String>, usize) {
    let font_file_id = start_id;
    let descriptor_id = start_id + 1;
    let font_id = start_id + 2;
    (
        vec![
            font_file_object(&font.data, font.program_kind),
            font_descriptor_object(font, font_file_id),
            truetype_font_object(font, descriptor_id),
        ],
        font_id,
    )
}

fn opacity_key(fill: f32, stroke: f32) -> (u16, u16) {
    let quantize = |v: f32| ((v * 1000.0).round() as i32).clamp(0, 1000) as u16;
    (quantize(fill), quantize(stroke))
}

type ResourceList = Vec<(String, usize)>;

fn build_extgstate_objects(
    document: &Document,
    start_id: usize,
) -> (Vec<String>, ResourceList, BTreeMap<(u16, u16), String>) {
    let mut pairs: BTreeSet<(u16, u16)> = BTreeSet::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetOpacity { fill, stroke } = cmd {
                pairs.insert(opacity_key(*fill, *stroke));
            }
        }
    }

    let mut objects = Vec::new();
    let mut resources = Vec::new();
    let mut name_map = BTreeMap::new();
    for (index, (f, s)) in pairs.into_iter().enumerate() {
        let name = format!("GS{}", index + 1);
        objects.push(format!(
            "<< /Type /ExtGState /ca {} /CA {} >>",
            format_milli(f as i64),
            format_milli(s as i64)
        ));
        resources.push((name.clone(), start_id + index));
        name_map.insert((f, s), name);
    }
    (objects, resources, name_map)
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

// Images are numbered in first-use order; identical resource ids share one
// XObject.
fn build_image_objects(
    document: &Document,
    start_id: usize,
) -> Result<(Vec<String>, ResourceList, BTreeMap<String, String>), RenderError> {
    let mut objects = Vec::new();
    let mut resources = Vec::new();
    let mut name_map = BTreeMap::new();
    for page in &document.pages {
        for cmd in &page.commands {
            let Command::DrawImage { resource_id, .. } = cmd else {
                continue;
            };
            if name_map.contains_key(resource_id) {
                continue;
            }
            let image = load_image(resource_id)?;
            let name = format!("Im{}", resources.len() + 1);
            objects.push(image_object(&image));
            resources.push((name.clone(), start_id + resources.len()));
            name_map.insert(resource_id.clone(), name);
        }
    }
    Ok((objects, resources, name_map))
}

fn load_image(source: &str) -> Result<ImageData, RenderError> {
    let (mime, data) = parse_data_uri(source)
        .ok_or_else(|| RenderError::DrawPrimitive("image resource is not a data uri".into()))?;
    decode_image_bytes(&data, Some(&mime))
}

fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Result<ImageData, RenderError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };
    let decoded = image::load_from_memory(data)
        .map_err(|err| RenderError::DrawPrimitive(format!("image decode failed: {err}")))?;
    let (width, height) = decoded.dimensions();

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
        });
    }

    // Transparent pixels are flattened onto white.
    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32) + 127) / 255) as u8;
        rgb.extend_from_slice(&[blend(r), blend(g), blend(b)]);
    }
    Ok(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb)?,
    })
}

pub(crate) fn image_data_uri(bytes: &[u8]) -> Result<String, RenderError> {
    let mime = match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(other) => {
            return Err(RenderError::DrawPrimitive(format!(
                "unsupported image format {other:?}"
            )));
        }
        Err(err) => {
            return Err(RenderError::DrawPrimitive(format!(
                "unrecognized image bytes: {err}"
            )));
        }
    };
    Ok(format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn image_object(image: &ImageData) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn truetype_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let subtype = match font.program_kind {
        FontProgramKind::OpenTypeCff => "Type1",
        _ => "TrueType",
    };
    let widths = font
        .metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /FirstChar 32 /LastChar 255 /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        subtype,
        sanitize_font_name(&font.name),
        widths,
        descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let flags = if metrics.is_fixed_pitch { 33 } else { 32 };
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        _ => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /MissingWidth {} /{} {} 0 R >>",
        sanitize_font_name(&font.name),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], kind: FontProgramKind) -> String {
    let mut stream_data = ascii_hex_encode(data);
    stream_data.push_str(">\n");
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode",
        stream_data.len(),
        data.len()
    );
    if matches!(kind, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    dict.push_str(" >>\nstream\n");
    format!("{dict}{stream_data}endstream")
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let entries = entries
        .iter()
        .map(|(name, id)| format!("/{name} {id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<< {entries} >>")
}

fn resources_object(
    fonts: &[(String, usize)],
    states: &[(String, usize)],
    images: &[(String, usize)],
) -> String {
    let mut out = String::from("<< /ProcSet [/PDF /Text /ImageC /ImageB]");
    if !fonts.is_empty() {
        out.push_str(&format!(" /Font {}", resource_dict(fonts)));
    }
    if !states.is_empty() {
        out.push_str(&format!(" /ExtGState {}", resource_dict(states)));
    }
    if !images.is_empty() {
        out.push_str(&format!(" /XObject {}", resource_dict(images)));
    }
    out.push_str(" >>");
    out
}

fn page_object(size: Size, content_id: usize) -> String {
    format!(
        "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
        PAGES_ID,
        fmt_pt(size.width),
        fmt_pt(size.height),
        RESOURCES_ID,
        content_id
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut out = format!("<< /Producer ({PRODUCER})");
    if let Some(title) = title {
        out.push_str(&format!(" /Title ({})", encode_winansi_pdf_string(title)));
    }
    out.push_str(" >>");
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn render_page(
    page: &Page,
    page_height: Pt,
    registry: &FontRegistry,
    font_map: &BTreeMap<String, String>,
    gs_map: &BTreeMap<(u16, u16), String>,
    image_map: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let mut font_size = Pt::from_f32(12.0);
    let mut font_name = "Helvetica".to_string();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_op(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_op(*color, "RG")),
            Command::SetLineWidth(width) => out.push_str(&format!("{} w\n", fmt_pt(*width))),
            Command::SetOpacity { fill, stroke } => {
                if let Some(name) = gs_map.get(&opacity_key(*fill, *stroke)) {
                    out.push_str(&format!("/{name} gs\n"));
                }
            }
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(page_height - *y1),
                    fmt_pt(*x2),
                    fmt_pt(page_height - *y2),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::DrawString { x, y, text } => {
                let font = registry.resolve(&font_name);
                let resource = font_map.get(&font.name).map(String::as_str).unwrap_or("F1");
                let baseline = *y + font_size.mul_ratio(font.metrics.ascent as i32, 1000);
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - baseline)
                ));
                out.push_str(&text_show_op(&font.metrics, text));
                out.push_str("ET\n");
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some(name) = image_map.get(resource_id) {
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(page_height - *y - *height)
                    ));
                    out.push_str(&format!("/{name} Do\n"));
                    out.push_str("Q\n");
                }
            }
        }
    }
    out
}

fn build_pdf(objects: &[String], catalog_id: usize, info_id: usize) -> Result<Vec<u8>, RenderError> {
    let mut out: Vec<u8> = Vec::new();
    out.write_all(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n")?;

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        write!(out, "{} 0 obj\n{}\nendobj\n", index + 1, obj)?;
    }

    let xref_start = out.len();
    write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1)?;
    for offset in offsets {
        write!(out, "{offset:010} 00000 n \n")?;
    }
    write!(
        out,
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        catalog_id,
        info_id,
        xref_start
    )?;
    Ok(out)
}

/// Encodes text as a WinAnsi PDF literal body. Unmappable chars become `?`.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        push_escaped(&mut out, winansi_code(ch).unwrap_or(b'?'));
    }
    out
}

fn push_escaped(out: &mut String, byte: u8) {
    match byte {
        b'\\' => out.push_str("\\\\"),
        b'(' => out.push_str("\\("),
        b')' => out.push_str("\\)"),
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
        b => out.push(b as char),
    }
}

/// `Tj` for unkerned text, otherwise a `TJ` array carrying the kerning so the
/// drawn advance matches `FontMetrics::measure_text_width`.
fn text_show_op(metrics: &FontMetrics, text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();
    let mut prev: Option<u8> = None;
    for ch in text.chars() {
        let code = winansi_code(ch).unwrap_or(b'?');
        if let Some(prev_code) = prev {
            let kern = metrics.kern_adjustment(prev_code, code);
            if kern != 0 {
                parts.push(format!("({run})"));
                run.clear();
                // TJ offsets are subtracted from the advance.
                parts.push((-(kern as i32)).to_string());
            }
        }
        push_escaped(&mut run, code);
        prev = Some(code);
    }
    if parts.is_empty() {
        return format!("({run}) Tj\n");
    }
    parts.push(format!("({run})"));
    format!("[{}] TJ\n", parts.join(" "))
}

fn color_op(color: Color, op: &str) -> String {
    format!(
        "{} {} {} {}\n",
        fmt(color.r),
        fmt(color.g),
        fmt(color.b),
        op
    )
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value.clamp(-1.0e6, 1.0e6));
    let scaled = (fixed * I32F32::from_num(1000)).round();
    format_milli(scaled.to_num())
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:03}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Rect;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 69, 0]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .expect("png");
        out
    }

    fn two_page_document() -> Document {
        let mut canvas = Canvas::new(Size::invoice_landscape());
        canvas.set_font_name("Helvetica-Bold");
        canvas.set_font_size(Pt::from_i32(18));
        canvas.set_opacity(0.88, 0.88);
        canvas.draw_string(Pt::from_i32(32), Pt::from_i32(24), "Invoice (draft)");
        canvas.show_page();
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_opacity(1.0, 0.06);
        canvas.move_to(Pt::ZERO, Pt::from_i32(100));
        canvas.line_to(Pt::from_i32(842), Pt::from_i32(100));
        canvas.stroke();
        let uri = image_data_uri(&tiny_png()).expect("uri");
        let rect = Rect::new(Pt::from_i32(700), Pt::from_i32(200), Pt::from_i32(80), Pt::from_i32(80));
        canvas.draw_image(rect, uri);
        canvas.finish()
    }

    #[test]
    fn formats_milli_points_without_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(11_560), "11.56");
        assert_eq!(format_milli(-500), "-0.5");
        assert_eq!(format_milli(842_000), "842");
        assert_eq!(fmt(0.06), "0.06");
    }

    #[test]
    fn winansi_strings_are_escaped() {
        assert_eq!(encode_winansi_pdf_string("a(b)\\"), "a\\(b\\)\\\\");
        assert_eq!(encode_winansi_pdf_string("€5"), "\\2005");
        assert_eq!(encode_winansi_pdf_string("£"), "\\243");
        assert_eq!(encode_winansi_pdf_string("\u{4e2d}"), "?");
    }

    // Glyph advances plus TJ offsets, in 1/1000 em, for unescaped ASCII runs.
    fn shown_advance_units(metrics: &FontMetrics, op: &str) -> i32 {
        let body = op
            .trim_end()
            .trim_end_matches("TJ")
            .trim_end_matches("Tj")
            .trim();
        let mut total = 0;
        let mut rest = body.trim_start_matches('[').trim_end_matches(']');
        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('(') {
                let end = stripped.find(')').expect("closing paren");
                total += stripped[..end]
                    .bytes()
                    .map(|b| metrics.advance_for_code(b) as i32)
                    .sum::<i32>();
                rest = stripped[end + 1..].trim_start();
            } else {
                let end = rest.find(' ').unwrap_or(rest.len());
                total -= rest[..end].parse::<i32>().expect("offset");
                rest = rest[end..].trim_start();
            }
        }
        total
    }

    #[test]
    fn kerned_text_is_drawn_at_its_measured_advance() {
        let metrics = FontMetrics::helvetica_with_kerning(&[
            ('A', 'V', -70),
            ('V', 'A', -70),
            ('T', 'A', -50),
        ]);
        let op = text_show_op(&metrics, "AVATAR");
        assert_eq!(op, "[(A) 70 (V) 70 (AT) 50 (AR)] TJ\n");
        let size = Pt::from_i32(18);
        let measured = metrics.measure_text_width(size, "AVATAR");
        let drawn = size.mul_ratio(shown_advance_units(&metrics, &op), 1000);
        assert_eq!(measured, drawn);
    }

    #[test]
    fn unkerned_text_keeps_a_plain_show() {
        let metrics = FontMetrics::helvetica_with_kerning(&[]);
        assert_eq!(text_show_op(&metrics, "Total"), "(Total) Tj\n");
    }

    #[test]
    fn writes_a_parseable_two_page_file() {
        let registry = FontRegistry::new();
        let out = document_to_pdf(&two_page_document(), &registry, &PdfOptions::default())
            .expect("pdf");
        let parsed = lopdf::Document::load_mem(&out.bytes).expect("lopdf parses");
        assert_eq!(parsed.get_pages().len(), 2);
        assert_eq!(out.page_content_bytes.len(), 2);
        let text = String::from_utf8_lossy(&out.bytes);
        assert!(text.contains("/BaseFont /Helvetica-Bold"));
        assert!(text.contains("/ca 0.88 /CA 0.88"));
        assert!(text.contains("/ca 1 /CA 0.06"));
        assert!(text.contains("/Subtype /Image /Width 2 /Height 2"));
        assert!(text.contains("(Invoice \\(draft\\)) Tj"));
        assert!(text.contains("/Producer (ledgerpress)"));
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let registry = FontRegistry::new();
        let first = document_to_pdf(&two_page_document(), &registry, &PdfOptions::default())
            .expect("first");
        let second = document_to_pdf(&two_page_document(), &registry, &PdfOptions::default())
            .expect("second");
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn baseline_is_flipped_into_pdf_space() {
        let registry = FontRegistry::new();
        let out = document_to_pdf(&two_page_document(), &registry, &PdfOptions::default())
            .expect("pdf");
        let text = String::from_utf8_lossy(&out.bytes);
        // 595 - (24 + 18 * 0.718)
        assert!(text.contains("32 558.076 Td"));
    }

    #[test]
    fn rejects_undecodable_image_bytes() {
        assert!(matches!(
            image_data_uri(b"not an image"),
            Err(RenderError::DrawPrimitive(_))
        ));
    }
}
