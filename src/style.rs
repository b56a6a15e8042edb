use crate::types::Color;
use serde::{Deserialize, Serialize};

/// Every colour the emitter paints with. All roles are required fields, so a
/// palette can never be missing one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StylePalette {
    pub background: Color,
    pub header_fill: Color,
    pub title_text: Color,
    pub muted_text: Color,
    pub input_fill: Color,
    pub card_fill: Color,
    pub card_border: Color,
    pub card_header_fill: Color,
    pub card_title: Color,
    pub badge_fill: Color,
    pub badge_text: Color,
    pub field_fill: Color,
    pub field_text: Color,
    pub footer_text: Color,
    pub footer_mark: Color,
}

impl StylePalette {
    /// Dark slate theme of the shipped charter.
    pub fn slate() -> Self {
        Self {
            background: Color::rgb8(15, 23, 42),
            header_fill: Color::rgb8(30, 41, 59),
            title_text: Color::WHITE,
            muted_text: Color::rgb8(203, 213, 225),
            input_fill: Color::rgb8(51, 65, 85),
            card_fill: Color::rgb8(51, 65, 85),
            card_border: Color::rgb8(71, 85, 105),
            card_header_fill: Color::rgb8(30, 41, 59),
            card_title: Color::WHITE,
            badge_fill: Color::rgb8(59, 130, 246),
            badge_text: Color::WHITE,
            field_fill: Color::rgb8(30, 41, 59),
            field_text: Color::WHITE,
            footer_text: Color::rgb8(148, 163, 184),
            footer_mark: Color::rgb8(100, 116, 139),
        }
    }

    /// Light print-friendly theme.
    pub fn paper() -> Self {
        Self {
            background: Color::WHITE,
            header_fill: Color::rgb8(241, 245, 249),
            title_text: Color::rgb8(15, 23, 42),
            muted_text: Color::rgb8(71, 85, 105),
            input_fill: Color::rgb8(226, 232, 240),
            card_fill: Color::rgb8(248, 250, 252),
            card_border: Color::rgb8(203, 213, 225),
            card_header_fill: Color::rgb8(226, 232, 240),
            card_title: Color::rgb8(15, 23, 42),
            badge_fill: Color::rgb8(37, 99, 235),
            badge_text: Color::WHITE,
            field_fill: Color::WHITE,
            field_text: Color::rgb8(15, 23, 42),
            footer_text: Color::rgb8(100, 116, 139),
            footer_mark: Color::rgb8(148, 163, 184),
        }
    }

    pub fn header_field_style(&self, font_size: f32) -> FieldStyle {
        FieldStyle {
            font: BaseFont::Helvetica,
            font_size,
            text_color: self.field_text,
            background: self.input_fill,
            border_color: None,
            border_width: 0.0,
        }
    }

    pub fn block_field_style(&self, font_size: f32) -> FieldStyle {
        FieldStyle {
            font: BaseFont::Helvetica,
            font_size,
            text_color: self.field_text,
            background: self.field_fill,
            border_color: Some(self.card_border),
            border_width: 1.0,
        }
    }
}

impl Default for StylePalette {
    fn default() -> Self {
        Self::slate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BaseFont {
    Helvetica,
    HelveticaBold,
}

impl BaseFont {
    pub fn postscript_name(&self) -> &'static str {
        match self {
            BaseFont::Helvetica => "Helvetica",
            BaseFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Resource name used in page and form resources.
    pub fn resource_name(&self) -> &'static str {
        match self {
            BaseFont::Helvetica => "Helv",
            BaseFont::HelveticaBold => "HeBo",
        }
    }
}

/// Appearance of a fillable field. Every property is set explicitly when the
/// field is registered, never inherited from document-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStyle {
    pub font: BaseFont,
    pub font_size: f32,
    pub text_color: Color,
    pub background: Color,
    pub border_color: Option<Color>,
    pub border_width: f32,
}
