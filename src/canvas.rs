use crate::assets::DecodedImage;
use crate::error::CanvasError;
use crate::field::FormField;
use crate::style::BaseFont;
use crate::types::{Color, Pt, Rect, Size};
use std::collections::BTreeMap;
use std::sync::Arc;

// Cubic Bezier control distance for quarter circles.
const KAPPA: f32 = 0.552_284_75;

/// Drawing operations in top-left-origin page space. Text `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Non-rendered marker recorded for inspection. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont(BaseFont),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    FillStroke,
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
    pub fields: Vec<FormField>,
}

/// A finished single-page drawing ready for serialisation.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub page: Page,
    pub images: BTreeMap<String, Arc<DecodedImage>>,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.page.fields.iter().find(|field| field.name == name)
    }

    pub fn command_count(&self) -> usize {
        self.page.commands.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: BaseFont,
    font_size: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: BaseFont::Helvetica,
            font_size: Pt::from_f32(12.0),
        }
    }
}

/// Single-page drawing surface. Redundant state changes are dropped so the
/// command list only records what actually changes.
pub struct Canvas {
    page_size: Size,
    page: Page,
    images: BTreeMap<String, Arc<DecodedImage>>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            page: Page::default(),
            images: BTreeMap::new(),
            current_state: GraphicsState::default(),
        }
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.page.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.page.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.page.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.page.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, font: BaseFont, size: Pt) {
        if self.current_state.font != font {
            self.current_state.font = font;
            self.page.commands.push(Command::SetFont(font));
        }
        if self.current_state.font_size != size {
            self.current_state.font_size = size;
            self.page.commands.push(Command::SetFontSize(size));
        }
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.page.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.page.commands.push(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.page.commands.push(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.page.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.page.commands.push(Command::Fill);
    }

    pub fn fill_stroke(&mut self) {
        self.page.commands.push(Command::FillStroke);
    }

    pub fn draw_rect(&mut self, rect: Rect) {
        self.page.commands.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.page.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn rounded_rect_path(&mut self, rect: Rect, radius: Pt) {
        let Rect {
            x,
            y,
            width,
            height,
        } = rect;
        let max_r = (width / 2.0).min(height / 2.0);
        let r = radius.min(max_r);
        if r <= Pt::ZERO {
            self.move_to(x, y);
            self.line_to(x + width, y);
            self.line_to(x + width, y + height);
            self.line_to(x, y + height);
            self.close_path();
            return;
        }
        let c = r * KAPPA;
        let right = x + width;
        let bottom = y + height;

        self.move_to(x + r, y);
        self.line_to(right - r, y);
        self.curve_to(right - r + c, y, right, y + r - c, right, y + r);
        self.line_to(right, bottom - r);
        self.curve_to(right, bottom - r + c, right - r + c, bottom, right - r, bottom);
        self.line_to(x + r, bottom);
        self.curve_to(x + r - c, bottom, x, bottom - r + c, x, bottom - r);
        self.line_to(x, y + r);
        self.curve_to(x, y + r - c, x + r - c, y, x + r, y);
        self.close_path();
    }

    pub fn fill_rounded_rect(&mut self, rect: Rect, radius: Pt, color: Color) {
        self.set_fill_color(color);
        self.rounded_rect_path(rect, radius);
        self.fill();
    }

    /// Fills and strokes one rounded path, stroke painted over the fill.
    pub fn fill_stroke_rounded_rect(
        &mut self,
        rect: Rect,
        radius: Pt,
        fill: Color,
        stroke: Color,
        width: Pt,
    ) {
        self.set_fill_color(fill);
        self.set_stroke_color(stroke);
        self.set_line_width(width);
        self.rounded_rect_path(rect, radius);
        self.fill_stroke();
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.set_fill_color(color);
        self.draw_rect(rect);
    }

    pub fn fill_circle(&mut self, cx: Pt, cy: Pt, radius: Pt, color: Color) {
        self.set_fill_color(color);
        let k = radius * KAPPA;
        self.move_to(cx + radius, cy);
        self.curve_to(cx + radius, cy + k, cx + k, cy + radius, cx, cy + radius);
        self.curve_to(cx - k, cy + radius, cx - radius, cy + k, cx - radius, cy);
        self.curve_to(cx - radius, cy - k, cx - k, cy - radius, cx, cy - radius);
        self.curve_to(cx + k, cy - radius, cx + radius, cy - k, cx + radius, cy);
        self.close_path();
        self.fill();
    }

    pub fn add_image(&mut self, resource_id: impl Into<String>, image: Arc<DecodedImage>) {
        self.images.insert(resource_id.into(), image);
    }

    pub fn draw_image(&mut self, rect: Rect, resource_id: &str) -> Result<(), CanvasError> {
        if !self.images.contains_key(resource_id) {
            return Err(CanvasError::emission(
                Some(resource_id),
                "image resource was never added to the canvas",
            ));
        }
        if !rect.is_well_formed() {
            return Err(CanvasError::emission(
                Some(resource_id),
                "image placement has an empty rectangle",
            ));
        }
        self.page.commands.push(Command::DrawImage {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            resource_id: resource_id.to_string(),
        });
        Ok(())
    }

    /// Registers a fillable field. Names are unique per page and the rectangle
    /// must be non-empty and lie on the page.
    pub fn register_field(&mut self, field: FormField) -> Result<(), CanvasError> {
        let key = Some(field.name.as_str());
        if field.name.is_empty() {
            return Err(CanvasError::emission(None, "field name cannot be empty"));
        }
        if self.page.fields.iter().any(|f| f.name == field.name) {
            return Err(CanvasError::emission(key, "field name already registered"));
        }
        if !field.rect.is_well_formed() {
            return Err(CanvasError::emission(
                key,
                format!(
                    "field rectangle is empty ({} x {})",
                    field.rect.width.to_f32(),
                    field.rect.height.to_f32()
                ),
            ));
        }
        let on_page = field.rect.x >= Pt::ZERO
            && field.rect.y >= Pt::ZERO
            && field.rect.right() <= self.page_size.width
            && field.rect.bottom() <= self.page_size.height;
        if !on_page {
            return Err(CanvasError::emission(key, "field rectangle lies outside the page"));
        }
        if !(field.style.font_size > 0.0) {
            return Err(CanvasError::emission(key, "field font size must be positive"));
        }
        self.page.fields.push(field);
        Ok(())
    }

    pub fn finish(self) -> Document {
        Document {
            page_size: self.page_size,
            page: self.page,
            images: self.images,
        }
    }
}
