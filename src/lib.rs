mod assets;
mod canvas;
mod debug;
mod emitter;
mod error;
mod field;
mod font;
mod inspect;
mod layout;
mod page;
mod pdf;
mod perf;
mod record;
mod style;
mod template;
mod types;

pub use assets::{
    AssetLoader, DecodedImage, FsAssetLoader, ImageEncoding, LoadedAssets, MemoryAssetLoader,
    decode_image_bytes, load_image, load_page_assets,
};
pub use canvas::{Canvas, Command, Document, Page};
pub use emitter::DocumentEmitter;
pub use error::CanvasError;
pub use field::FormField;
pub use font::text_width;
pub use inspect::{
    InspectedField, PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes,
    inspect_pdf_path,
};
pub use layout::{
    BlockDefinition, CellPos, GridLayout, GridSpec, HeaderField, HeaderSlot, HeaderSpec,
    ResolvedRect, Span, resolve, resolve_header, validate_field_keys,
};
pub use page::{Orientation, PageGeometry, PaperFormat};
pub use pdf::{PdfOptions, PdfStats, document_to_pdf};
pub use record::DataRecord;
pub use style::{BaseFont, FieldStyle, StylePalette};
pub use template::{CanvasTemplate, CardMetrics, FooterSpec, LogoPlacement};
pub use types::{Color, Pt, Rect, Size, Unit};

use chrono::NaiveDateTime;
use debug::DebugLogger;
use perf::{PerfLogger, timed};
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_OUTPUT_FILE: &str = "TAP_Vexnet.pdf";

/// A configured canvas generator. Layout and header placement are resolved and
/// validated once in [`CanvasEngineBuilder::build`]; each generation then fetches
/// assets, draws, and serialises.
pub struct CanvasEngine {
    page: PageGeometry,
    template: CanvasTemplate,
    palette: StylePalette,
    layout: GridLayout,
    header: Vec<HeaderSlot>,
    background_image: Option<String>,
    logo_image: Option<String>,
    asset_loader: Arc<dyn AssetLoader>,
    output_path: PathBuf,
    generated_at: Option<NaiveDateTime>,
    pdf_options: PdfOptions,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct CanvasEngineBuilder {
    template: CanvasTemplate,
    paper_format: Option<PaperFormat>,
    orientation: Option<Orientation>,
    unit: Option<Unit>,
    palette: StylePalette,
    background_image: Option<String>,
    logo_image: Option<String>,
    asset_loader: Option<Arc<dyn AssetLoader>>,
    output_path: PathBuf,
    generated_at: Option<NaiveDateTime>,
    pdf_options: PdfOptions,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl CanvasEngine {
    pub fn builder() -> CanvasEngineBuilder {
        CanvasEngineBuilder::new()
    }

    pub fn page(&self) -> &PageGeometry {
        &self.page
    }

    pub fn template(&self) -> &CanvasTemplate {
        &self.template
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn header_slots(&self) -> &[HeaderSlot] {
        &self.header
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Renders `record` and saves the finished PDF at the configured output path.
    ///
    /// The record is only borrowed for the duration of the call. Nothing is
    /// written unless rendering succeeds, and the file appears atomically.
    pub fn generate(&self, record: &DataRecord) -> Result<PathBuf, CanvasError> {
        let result = self
            .render_pdf_inner(record)
            .and_then(|bytes| write_atomically(&self.output_path, &bytes));
        match result {
            Ok(()) => {
                if let Some(debug) = &self.debug {
                    debug.event(
                        "generate.saved",
                        json!({ "path": self.output_path.display().to_string() }),
                    );
                }
                self.emit_debug_summary("generate");
                Ok(self.output_path.clone())
            }
            Err(err) => Err(self.fail("generate", err)),
        }
    }

    pub fn render_pdf(&self, record: &DataRecord) -> Result<Vec<u8>, CanvasError> {
        match self.render_pdf_inner(record) {
            Ok(bytes) => {
                self.emit_debug_summary("render_pdf");
                Ok(bytes)
            }
            Err(err) => Err(self.fail("render_pdf", err)),
        }
    }

    /// The drawing before serialisation.
    pub fn render_document(&self, record: &DataRecord) -> Result<Document, CanvasError> {
        match self.render_document_inner(record) {
            Ok(document) => {
                self.emit_debug_summary("render_document");
                Ok(document)
            }
            Err(err) => Err(self.fail("render_document", err)),
        }
    }

    fn render_pdf_inner(&self, record: &DataRecord) -> Result<Vec<u8>, CanvasError> {
        let document = self.render_document_inner(record)?;
        let (bytes, stats) = timed(self.perf.as_ref(), "pdf", || {
            pdf::document_to_pdf_with_stats(&document, &self.pdf_options)
        })?;
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "pdf",
                &[
                    ("bytes", bytes.len() as u64),
                    ("objects", stats.objects as u64),
                    ("images", stats.images as u64),
                    ("fields", stats.fields as u64),
                    ("content_bytes", stats.content_bytes as u64),
                ],
            );
        }
        if stats.replaced_chars > 0 {
            if let Some(debug) = &self.debug {
                debug.event(
                    "pdf.replaced_chars",
                    json!({ "count": stats.replaced_chars }),
                );
            }
        }
        Ok(bytes)
    }

    fn render_document_inner(&self, record: &DataRecord) -> Result<Document, CanvasError> {
        let assets = timed(self.perf.as_ref(), "assets", || {
            load_page_assets(
                self.asset_loader.as_ref(),
                self.background_image.as_deref(),
                self.logo_image.as_deref(),
            )
        })?;
        if let Some(debug) = &self.debug {
            let loaded = [
                (self.background_image.as_deref(), &assets.background),
                (self.logo_image.as_deref(), &assets.logo),
            ];
            for (url, image) in loaded {
                if let (Some(url), Some(image)) = (url, image) {
                    debug.event(
                        "assets.loaded",
                        json!({ "url": url, "width": image.width, "height": image.height }),
                    );
                }
            }
        }

        let emitter = DocumentEmitter {
            page: &self.page,
            template: &self.template,
            palette: &self.palette,
            layout: &self.layout,
            header: &self.header,
        };
        let generated_at = self
            .generated_at
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let document = timed(self.perf.as_ref(), "emit", || {
            emitter.emit_with_log(record, &assets, generated_at, self.debug.as_ref())
        })?;
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "emit",
                &[
                    ("commands", document.command_count() as u64),
                    ("fields", document.page.fields.len() as u64),
                ],
            );
        }
        Ok(document)
    }

    fn fail(&self, context: &str, err: CanvasError) -> CanvasError {
        if let Some(debug) = &self.debug {
            debug.event(
                "generate.failed",
                json!({ "context": context, "kind": err.kind(), "message": err.to_string() }),
            );
        }
        self.emit_debug_summary(context);
        err
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = &self.debug {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), CanvasError> {
    write_atomically_with(path, |file| file.write_all(bytes))
}

/// Writes through a fresh sibling temp file and renames it over `path`. The temp
/// file is removed on every failure, so either `path` is complete or untouched.
fn write_atomically_with(
    path: &Path,
    write: impl FnOnce(&mut File) -> std::io::Result<()>,
) -> Result<(), CanvasError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial)?;
    let written = write(&mut file).and_then(|_| file.sync_all());
    drop(file);
    if let Err(err) = written.and_then(|_| std::fs::rename(&partial, path)) {
        let _ = std::fs::remove_file(&partial);
        return Err(err.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}-{nanos}.partial", std::process::id()))
}

impl Default for CanvasEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasEngineBuilder {
    pub fn new() -> Self {
        Self {
            template: CanvasTemplate::project_charter(),
            paper_format: None,
            orientation: None,
            unit: None,
            palette: StylePalette::slate(),
            background_image: None,
            logo_image: None,
            asset_loader: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            generated_at: None,
            pdf_options: PdfOptions::default(),
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn template(mut self, template: CanvasTemplate) -> Self {
        self.template = template;
        self
    }

    /// Overrides the template's paper format.
    pub fn paper_format(mut self, format: PaperFormat) -> Self {
        self.paper_format = Some(format);
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Overrides the unit the template's measurements are read in.
    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn palette(mut self, palette: StylePalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn background_image(mut self, url: impl Into<String>) -> Self {
        self.background_image = Some(url.into());
        self
    }

    pub fn logo_image(mut self, url: impl Into<String>) -> Self {
        self.logo_image = Some(url.into());
        self
    }

    pub fn asset_loader(mut self, loader: Arc<dyn AssetLoader>) -> Self {
        self.asset_loader = Some(loader);
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Pins the footer timestamp. Defaults to the local time of each generation.
    pub fn generated_at(mut self, at: NaiveDateTime) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.pdf_options.title = Some(title.into());
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CanvasEngine, CanvasError> {
        let mut template = self.template;
        if let Some(format) = self.paper_format {
            template.paper_format = format;
        }
        if let Some(orientation) = self.orientation {
            template.orientation = orientation;
        }
        if let Some(unit) = self.unit {
            template.unit = unit;
        }
        template.validate()?;
        if self.output_path.as_os_str().is_empty() {
            return Err(CanvasError::Configuration(
                "output path cannot be empty".to_string(),
            ));
        }

        let perf = match self.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        let page = PageGeometry::query(template.paper_format, template.orientation, template.unit);
        let (layout, header) = timed(perf.as_ref(), "layout", || {
            let layout =
                resolve(&page, &template.grid, template.header.grid_top(), &template.blocks)?;
            let header = resolve_header(&page, template.grid.outer_margin, &template.header)?;
            Ok::<_, CanvasError>((layout, header))
        })?;

        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        if let Some(debug) = &debug {
            debug.event(
                "layout.resolved",
                json!({
                    "template": template.name,
                    "unit": template.unit.as_str(),
                    "page": [page.width, page.height],
                    "cell_width": layout.cell_width,
                    "cell_height": layout.cell_height,
                    "grid_top": layout.grid_top,
                    "blocks": layout.len(),
                    "header_fields": header.len(),
                }),
            );
        }

        let pdf_options = PdfOptions {
            title: self.pdf_options.title.or_else(|| Some(template.header.title.clone())),
            producer: self.pdf_options.producer,
        };
        Ok(CanvasEngine {
            page,
            template,
            palette: self.palette,
            layout,
            header,
            background_image: self.background_image,
            logo_image: self.logo_image,
            asset_loader: self
                .asset_loader
                .unwrap_or_else(|| Arc::new(FsAssetLoader::new())),
            output_path: self.output_path,
            generated_at: self.generated_at,
            pdf_options,
            debug,
            perf,
        })
    }
}
