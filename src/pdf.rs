use crate::assets::{DecodedImage, ImageEncoding};
use crate::canvas::{Command, Document, Page};
use crate::error::CanvasError;
use crate::field::FormField;
use crate::style::BaseFont;
use crate::types::{Color, Pt, Rect};
use fixed::types::I32F32;
use lopdf::{
    Dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId,
    Stream as LoStream, StringFormat, dictionary,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// Field flag bit 13: the text field accepts multiple lines.
const FF_MULTILINE: i64 = 1 << 12;
// Annotation flag bit 3: print the widget.
const ANNOT_PRINT: i64 = 4;
const FIELD_PADDING: f32 = 2.0;
const LINE_HEIGHT: f32 = 1.15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOptions {
    pub title: Option<String>,
    pub producer: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: None,
            producer: concat!("canvasform ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Counters gathered while serialising, surfaced through the perf log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfStats {
    pub objects: usize,
    pub images: usize,
    pub fields: usize,
    pub replaced_chars: usize,
    pub content_bytes: usize,
}

pub fn document_to_pdf(document: &Document, options: &PdfOptions) -> Result<Vec<u8>, CanvasError> {
    document_to_pdf_with_stats(document, options).map(|(bytes, _)| bytes)
}

pub(crate) fn document_to_pdf_with_stats(
    document: &Document,
    options: &PdfOptions,
) -> Result<(Vec<u8>, PdfStats), CanvasError> {
    let mut stats = PdfStats::default();
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let page_height = document.page_size.height;

    let mut font_ids: BTreeMap<BaseFont, LoObjectId> = BTreeMap::new();
    for base in [BaseFont::Helvetica, BaseFont::HelveticaBold] {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base.postscript_name(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_ids.insert(base, id);
    }
    let font_resources = font_resource_dict(&font_ids);

    let image_names = build_image_objects(&mut doc, &document.images);
    stats.images = image_names
        .values()
        .map(|(_, id)| *id)
        .collect::<BTreeSet<_>>()
        .len();

    let rendered = render_page(&document.page, page_height, &image_names);
    stats.replaced_chars += rendered.replaced;
    stats.content_bytes = rendered.content.len();
    let content_id = doc.add_object(LoStream::new(dictionary! {}, rendered.content.into_bytes()));

    let mut widget_ids = Vec::with_capacity(document.page.fields.len());
    for field in &document.page.fields {
        let appearance = field_appearance(field);
        stats.replaced_chars += appearance.replaced;
        let ap_id = doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    0.into(),
                    0.into(),
                    real(field.rect.width),
                    real(field.rect.height),
                ],
                "Resources" => dictionary! {
                    "Font" => font_resources.clone(),
                },
            },
            appearance.content.into_bytes(),
        ));
        let widget = widget_dictionary(field, page_id, ap_id, page_height);
        widget_ids.push(doc.add_object(widget));
    }
    stats.fields = widget_ids.len();

    let mut xobjects = Dictionary::new();
    for (name, id) in image_names.values() {
        xobjects.set(name.as_bytes().to_vec(), *id);
    }
    let mut resources = dictionary! {
        "Font" => font_resources.clone(),
    };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            real(document.page_size.width),
            real(document.page_size.height),
        ],
        "Contents" => content_id,
        "Resources" => resources,
    };
    if !widget_ids.is_empty() {
        page.set(
            "Annots",
            widget_ids.iter().map(|id| LoObject::Reference(*id)).collect::<Vec<_>>(),
        );
    }
    doc.objects.insert(page_id, LoObject::Dictionary(page));
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if !widget_ids.is_empty() {
        catalog.set(
            "AcroForm",
            dictionary! {
                "Fields" => widget_ids.iter().map(|id| LoObject::Reference(*id)).collect::<Vec<_>>(),
                "DR" => dictionary! { "Font" => font_resources },
                "DA" => literal("/Helv 0 Tf 0 g"),
                "NeedAppearances" => true,
            },
        );
    }
    let catalog_id = doc.add_object(catalog);

    let mut info = dictionary! {
        "Producer" => text_string(&options.producer),
    };
    if let Some(title) = options.title.as_deref() {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);

    let file_id = document_id(document);
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.trailer.set(
        "ID",
        vec![
            LoObject::String(file_id.clone(), StringFormat::Hexadecimal),
            LoObject::String(file_id, StringFormat::Hexadecimal),
        ],
    );
    doc.compress();
    stats.objects = doc.objects.len();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| CanvasError::emission(None, format!("pdf serialisation failed: {err}")))?;
    Ok((out, stats))
}

fn font_resource_dict(font_ids: &BTreeMap<BaseFont, LoObjectId>) -> Dictionary {
    let mut dict = Dictionary::new();
    for (base, id) in font_ids {
        dict.set(base.resource_name(), *id);
    }
    dict
}

/// Adds one XObject per distinct image payload. Resource ids that share a
/// payload share the object. Returns resource id -> (XObject name, object id).
fn build_image_objects(
    doc: &mut LoDocument,
    images: &BTreeMap<String, Arc<DecodedImage>>,
) -> BTreeMap<String, (String, LoObjectId)> {
    let mut by_hash: BTreeMap<[u8; 32], (String, LoObjectId)> = BTreeMap::new();
    let mut out = BTreeMap::new();
    for (resource_id, image) in images {
        let hash = image_hash(image);
        if let Some(existing) = by_hash.get(&hash) {
            out.insert(resource_id.clone(), existing.clone());
            continue;
        }
        let id = add_image_object(doc, image);
        let entry = (format!("Im{}", by_hash.len() + 1), id);
        by_hash.insert(hash, entry.clone());
        out.insert(resource_id.clone(), entry);
    }
    out
}

fn image_hash(image: &DecodedImage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(image.width.to_be_bytes());
    hasher.update(image.height.to_be_bytes());
    match &image.encoding {
        ImageEncoding::Dct { data, .. } => {
            hasher.update(b"dct");
            hasher.update(data);
        }
        ImageEncoding::Raw { rgb, alpha } => {
            hasher.update(b"raw");
            hasher.update(rgb);
            if let Some(alpha) = alpha {
                hasher.update(b"alpha");
                hasher.update(alpha);
            }
        }
    }
    hasher.finalize().into()
}

fn add_image_object(doc: &mut LoDocument, image: &DecodedImage) -> LoObjectId {
    let width = image.width as i64;
    let height = image.height as i64;
    match &image.encoding {
        ImageEncoding::Dct { data, gray } => {
            let color_space = if *gray { "DeviceGray" } else { "DeviceRGB" };
            let mut stream = LoStream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                data.clone(),
            );
            // Already compressed; flate on top only costs time.
            stream.allows_compression = false;
            doc.add_object(stream)
        }
        ImageEncoding::Raw { rgb, alpha } => {
            let mut dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            };
            if let Some(alpha) = alpha {
                let smask_id = doc.add_object(LoStream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width,
                        "Height" => height,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    alpha.clone(),
                ));
                dict.set("SMask", smask_id);
            }
            doc.add_object(LoStream::new(dict, rgb.clone()))
        }
    }
}

fn widget_dictionary(
    field: &FormField,
    page_id: LoObjectId,
    appearance_id: LoObjectId,
    page_height: Pt,
) -> Dictionary {
    let style = &field.style;
    let rect = flipped_rect(field.rect, page_height);
    let mut mk = dictionary! {
        "BG" => color_array(style.background),
    };
    if let Some(border) = style.border_color {
        mk.set("BC", color_array(border));
    }
    let value = text_string(&field.value);
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => text_string(&field.name),
        "V" => value.clone(),
        "DV" => value,
        "Ff" => if field.multiline { FF_MULTILINE } else { 0 },
        "DA" => literal(&default_appearance(field)),
        "MK" => mk,
        "BS" => dictionary! {
            "W" => LoObject::Real(style.border_width.into()),
            "S" => "S",
        },
        "F" => ANNOT_PRINT,
        "Rect" => rect,
        "P" => page_id,
        "AP" => dictionary! { "N" => appearance_id },
    }
}

/// The `/DA` string: font resource, size and text colour, all explicit.
pub(crate) fn default_appearance(field: &FormField) -> String {
    let [r, g, b] = field.style.text_color.components();
    format!(
        "/{} {} Tf {} {} {} rg",
        field.style.font.resource_name(),
        fmt(field.style.font_size),
        fmt(r),
        fmt(g),
        fmt(b)
    )
}

struct Rendered {
    content: String,
    replaced: usize,
}

/// Builds the normal appearance stream for a field in its own box space.
fn field_appearance(field: &FormField) -> Rendered {
    let style = &field.style;
    let width = field.rect.width;
    let height = field.rect.height;
    let mut out = String::new();
    let mut replaced = 0usize;

    out.push_str(&color_to_pdf_fill(style.background));
    out.push_str(&format!("0 0 {} {} re\nf\n", fmt_pt(width), fmt_pt(height)));
    if let Some(border) = style.border_color {
        if style.border_width > 0.0 {
            let bw = Pt::from_f32(style.border_width);
            out.push_str(&color_to_pdf_stroke(border));
            out.push_str(&format!("{} w\n", fmt_pt(bw)));
            out.push_str(&format!(
                "{} {} {} {} re\nS\n",
                fmt_pt(bw / 2.0),
                fmt_pt(bw / 2.0),
                fmt_pt(width - bw),
                fmt_pt(height - bw)
            ));
        }
    }

    let size = Pt::from_f32(style.font_size);
    let pad = Pt::from_f32(FIELD_PADDING);
    let lines = field.value_lines();

    out.push_str("/Tx BMC\nq\n");
    out.push_str(&format!(
        "{} {} {} {} re\nW\nn\n",
        fmt_pt(pad / 2.0),
        fmt_pt(pad / 2.0),
        fmt_pt(width - pad),
        fmt_pt(height - pad)
    ));
    out.push_str("BT\n");
    out.push_str(&format!("{}\n", default_appearance(field)));
    let leading = size * LINE_HEIGHT;
    let mut baseline = if field.multiline {
        height - pad - size
    } else {
        // Centre the cap height in the box.
        (height - size * 0.7) / 2.0
    };
    let mut first = true;
    for line in lines {
        if baseline < Pt::ZERO {
            break;
        }
        let encoded = encode_winansi_pdf_string(line);
        replaced += encoded.replaced;
        if first {
            out.push_str(&format!("{} {} Td\n", fmt_pt(pad), fmt_pt(baseline)));
            first = false;
        } else {
            out.push_str(&format!("0 {} Td\n", fmt_pt(-leading)));
        }
        out.push_str(&format!("({}) Tj\n", encoded.text));
        baseline = baseline - leading;
    }
    out.push_str("ET\nQ\nEMC\n");
    Rendered {
        content: out,
        replaced,
    }
}

fn render_page(
    page: &Page,
    page_height: Pt,
    image_map: &BTreeMap<String, (String, LoObjectId)>,
) -> Rendered {
    let mut out = String::new();
    let mut replaced = 0usize;
    let mut current_font = BaseFont::Helvetica;
    let mut current_font_size = Pt::from_f32(12.0);

    for cmd in &page.commands {
        match cmd {
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont(font) => current_font = *font,
            Command::SetFontSize(size) => current_font_size = *size,
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
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let encoded = encode_winansi_pdf_string(text);
                replaced += encoded.replaced;
                out.push_str("BT\n");
                out.push_str(&format!(
                    "/{} {} Tf\n",
                    current_font.resource_name(),
                    fmt_pt(current_font_size)
                ));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y)
                ));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some((name, _)) = image_map.get(resource_id) {
                    let draw_y = page_height - *y - *height;
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", name));
                    out.push_str("Q\n");
                }
            }
        }
    }

    Rendered {
        content: out,
        replaced,
    }
}

/// PDF rectangle `[llx lly urx ury]` for a top-left-origin rect.
fn flipped_rect(rect: Rect, page_height: Pt) -> Vec<LoObject> {
    vec![
        real(rect.x),
        real(page_height - rect.bottom()),
        real(rect.right()),
        real(page_height - rect.y),
    ]
}

fn document_id(document: &Document) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(document.page_size.width.to_milli_i64().to_be_bytes());
    hasher.update(document.page_size.height.to_milli_i64().to_be_bytes());
    hasher.update((document.page.commands.len() as u64).to_be_bytes());
    for field in &document.page.fields {
        hasher.update(field.name.as_bytes());
        hasher.update([0]);
        hasher.update(field.value.as_bytes());
        hasher.update([0]);
    }
    hasher.finalize()[..16].to_vec()
}

fn real(value: Pt) -> LoObject {
    LoObject::Real((value.to_milli_i64() as f32 / 1000.0).into())
}

fn color_array(color: Color) -> Vec<LoObject> {
    color
        .components()
        .iter()
        .map(|c| LoObject::Real((*c).into()))
        .collect()
}

fn literal(text: &str) -> LoObject {
    LoObject::String(text.as_bytes().to_vec(), StringFormat::Literal)
}

/// PDF text string: plain ASCII stays literal, anything else is UTF-16BE with
/// a byte order mark.
pub(crate) fn text_string(text: &str) -> LoObject {
    let plain = text
        .chars()
        .all(|ch| ch.is_ascii() && (!ch.is_ascii_control() || matches!(ch, '\n' | '\r' | '\t')));
    if plain {
        return literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    LoObject::String(bytes, StringFormat::Hexadecimal)
}

/// Inverse of [`text_string`] for strings read back from a file.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            // cp1252 punctuation
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
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }

    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let mut s = format!("{sign}{int_part}.{frac_part:03}");
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    let [r, g, b] = color.components();
    format!("{} {} {} rg\n", fmt(r), fmt(g), fmt(b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    let [r, g, b] = color.components();
    format!("{} {} {} RG\n", fmt(r), fmt(g), fmt(b))
}
