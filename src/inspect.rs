use crate::pdf::decode_text_string;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEncryptedUnsupported,
    PdfEmptyOrNoPages,
    PdfFormMalformed,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
            PdfInspectErrorCode::PdfFormMalformed => "PDF_FORM_MALFORMED",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl PdfInspectError {
    fn new(code: PdfInspectErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// A text field as a reader sees it after loading the file.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedField {
    pub name: String,
    pub value: String,
    pub multiline: bool,
    // [llx, lly, urx, ury] in PDF points.
    pub rect: [f32; 4],
    pub default_appearance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub need_appearances: bool,
    pub fields: Vec<InspectedField>,
}

impl PdfInspectReport {
    pub fn field(&self, name: &str) -> Option<&InspectedField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes)
        .map_err(|err| PdfInspectError::new(PdfInspectErrorCode::PdfParseFailed, err.to_string()))?;
    if pdf.is_encrypted() {
        return Err(PdfInspectError::new(
            PdfInspectErrorCode::PdfEncryptedUnsupported,
            "encrypted pdf files are not supported",
        ));
    }

    let pages = pdf.get_pages();
    let Some(first_page_id) = pages.values().next().copied() else {
        return Err(PdfInspectError::new(
            PdfInspectErrorCode::PdfEmptyOrNoPages,
            "pdf has no pages",
        ));
    };
    let page = pdf
        .get_object(first_page_id)
        .ok()
        .and_then(|obj| as_dict(&pdf, obj))
        .ok_or_else(|| {
            PdfInspectError::new(PdfInspectErrorCode::PdfParseFailed, "first page is not a dictionary")
        })?;
    let media_box = page
        .get(b"MediaBox")
        .ok()
        .and_then(|obj| number_array(&pdf, obj))
        .unwrap_or([0.0, 0.0, 0.0, 0.0]);

    let (need_appearances, fields) = match acroform(&pdf) {
        Some(form) => (
            matches!(form.get(b"NeedAppearances"), Ok(LoObject::Boolean(true))),
            read_fields(&pdf, form)?,
        ),
        None => (false, Vec::new()),
    };

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        page_width: media_box[2] - media_box[0],
        page_height: media_box[3] - media_box[1],
        encrypted: false,
        file_size_bytes: bytes.len(),
        need_appearances,
        fields,
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path)
        .map_err(|err| PdfInspectError::new(PdfInspectErrorCode::PdfIoError, err.to_string()))?;
    inspect_pdf_bytes(&data)
}

fn resolve<'a>(pdf: &'a LoDocument, obj: &'a LoObject) -> Option<&'a LoObject> {
    match obj {
        LoObject::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dict<'a>(pdf: &'a LoDocument, obj: &'a LoObject) -> Option<&'a Dictionary> {
    match resolve(pdf, obj)? {
        LoObject::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn number(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn number_array(pdf: &LoDocument, obj: &LoObject) -> Option<[f32; 4]> {
    let LoObject::Array(items) = resolve(pdf, obj)? else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(resolve(pdf, item)?)?;
    }
    Some(out)
}

fn string_entry(pdf: &LoDocument, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(pdf, dict.get(key).ok()?)? {
        LoObject::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

fn acroform(pdf: &LoDocument) -> Option<&Dictionary> {
    let root = pdf.trailer.get(b"Root").ok()?;
    let catalog = as_dict(pdf, root)?;
    as_dict(pdf, catalog.get(b"AcroForm").ok()?)
}

fn read_fields(pdf: &LoDocument, form: &Dictionary) -> Result<Vec<InspectedField>, PdfInspectError> {
    let malformed = |message: String| PdfInspectError::new(PdfInspectErrorCode::PdfFormMalformed, message);
    let Some(LoObject::Array(entries)) = form.get(b"Fields").ok().and_then(|obj| resolve(pdf, obj))
    else {
        return Err(malformed("AcroForm has no /Fields array".to_string()));
    };

    let mut fields = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let dict = as_dict(pdf, entry)
            .ok_or_else(|| malformed(format!("field #{index} is not a dictionary")))?;
        let name = string_entry(pdf, dict, b"T")
            .ok_or_else(|| malformed(format!("field #{index} has no /T name")))?;
        let rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|obj| number_array(pdf, obj))
            .ok_or_else(|| malformed(format!("field '{name}' has no usable /Rect")))?;
        let flags = match dict.get(b"Ff").ok().and_then(|obj| resolve(pdf, obj)) {
            Some(LoObject::Integer(flags)) => *flags,
            _ => 0,
        };
        fields.push(InspectedField {
            value: string_entry(pdf, dict, b"V").unwrap_or_default(),
            multiline: flags & (1 << 12) != 0,
            rect,
            default_appearance: string_entry(pdf, dict, b"DA").unwrap_or_default(),
            name,
        });
    }
    Ok(fields)
}
