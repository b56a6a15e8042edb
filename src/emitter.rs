//! The ordered draw pass: background, header band, one card per block, footer.
//!
//! Later draws paint over earlier ones, so the order of calls in [`DocumentEmitter::emit`]
//! is part of its contract. Every fillable field gets an explicit
//! [`FieldStyle`](crate::style::FieldStyle)
//! from the palette at registration time.

use crate::assets::LoadedAssets;
use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::error::CanvasError;
use crate::field::FormField;
use crate::font;
use crate::layout::{BlockDefinition, GridLayout, HeaderSlot, ResolvedRect};
use crate::page::PageGeometry;
use crate::record::DataRecord;
use crate::style::{BaseFont, StylePalette};
use crate::template::CanvasTemplate;
use crate::types::{Pt, Rect, Unit};
use chrono::NaiveDateTime;
use serde_json::json;

const BACKGROUND_ID: &str = "background";
const LOGO_ID: &str = "logo";

pub struct DocumentEmitter<'a> {
    pub page: &'a PageGeometry,
    pub template: &'a CanvasTemplate,
    pub palette: &'a StylePalette,
    pub layout: &'a GridLayout,
    pub header: &'a [HeaderSlot],
}

impl DocumentEmitter<'_> {
    pub fn emit(
        &self,
        record: &DataRecord,
        assets: &LoadedAssets,
        generated_at: NaiveDateTime,
    ) -> Result<Document, CanvasError> {
        self.emit_with_log(record, assets, generated_at, None)
    }

    pub(crate) fn emit_with_log(
        &self,
        record: &DataRecord,
        assets: &LoadedAssets,
        generated_at: NaiveDateTime,
        debug: Option<&DebugLogger>,
    ) -> Result<Document, CanvasError> {
        let mut canvas = Canvas::new(self.page.size_pt());
        self.paint_background(&mut canvas, assets)?;
        self.paint_header(&mut canvas, record, assets, debug)?;
        for block in &self.template.blocks {
            self.paint_block(&mut canvas, block, record, debug)?;
        }
        self.paint_footer(&mut canvas, generated_at);
        Ok(canvas.finish())
    }

    fn unit(&self) -> Unit {
        self.page.unit
    }

    fn pt(&self, value: f32) -> Pt {
        self.unit().to_pt(value)
    }

    fn rect(&self, rect: ResolvedRect) -> Rect {
        rect.to_pt(self.unit())
    }

    fn paint_background(
        &self,
        canvas: &mut Canvas,
        assets: &LoadedAssets,
    ) -> Result<(), CanvasError> {
        let full = ResolvedRect::new(0.0, 0.0, self.page.width, self.page.height);
        canvas.meta("section", "background");
        match &assets.background {
            Some(image) => {
                canvas.add_image(BACKGROUND_ID, image.clone());
                canvas.draw_image(self.rect(full), BACKGROUND_ID)
            }
            None => {
                canvas.fill_rect(self.rect(full), self.palette.background);
                Ok(())
            }
        }
    }

    fn paint_header(
        &self,
        canvas: &mut Canvas,
        record: &DataRecord,
        assets: &LoadedAssets,
        debug: Option<&DebugLogger>,
    ) -> Result<(), CanvasError> {
        let header = &self.template.header;
        let margin = self.template.grid.outer_margin;
        canvas.meta("section", "header");
        canvas.fill_rect(
            self.rect(ResolvedRect::new(0.0, 0.0, self.page.width, header.band_height)),
            self.palette.header_fill,
        );

        canvas.set_fill_color(self.palette.title_text);
        canvas.set_font(BaseFont::HelveticaBold, Pt::from_f32(self.template.header_title_size));
        canvas.draw_string(self.pt(margin), self.pt(header.title_baseline), header.title.as_str());

        if let Some(logo) = &assets.logo {
            let slot = &self.template.logo;
            let (width, height) = fit_within(logo.aspect_ratio(), slot.max_width, slot.max_height);
            let placed = ResolvedRect::new(
                self.page.width - slot.x_from_right,
                slot.y + (slot.max_height - height) / 2.0,
                width,
                height,
            );
            canvas.add_image(LOGO_ID, logo.clone());
            canvas.draw_image(self.rect(placed), LOGO_ID)?;
        }

        let style = self
            .palette
            .header_field_style(self.template.header_field_font_size);
        for slot in self.header {
            canvas.set_fill_color(self.palette.muted_text);
            canvas.set_font(BaseFont::Helvetica, Pt::from_f32(self.template.header_label_size));
            canvas.draw_string(self.pt(slot.label_x), self.pt(slot.label_baseline), slot.label.as_str());
            canvas.fill_rounded_rect(
                self.rect(slot.background),
                self.pt(self.template.header_field_radius),
                self.palette.input_fill,
            );
            let field = FormField::single_line(
                slot.key.as_str(),
                record.get(&slot.key),
                self.rect(slot.field),
                style,
            );
            register(canvas, field, debug)?;
        }
        Ok(())
    }

    fn paint_block(
        &self,
        canvas: &mut Canvas,
        block: &BlockDefinition,
        record: &DataRecord,
        debug: Option<&DebugLogger>,
    ) -> Result<(), CanvasError> {
        let card = &self.template.card;
        let key = block.key.as_str();
        let rect = self.layout.rect(key).ok_or_else(|| {
            CanvasError::emission(Some(key), "block has no resolved rectangle")
        })?;
        canvas.meta("block", key);

        let radius = self.pt(card.radius);
        canvas.fill_stroke_rounded_rect(
            self.rect(rect),
            radius,
            self.palette.card_fill,
            self.palette.card_border,
            self.pt(card.border_width),
        );

        // Header strip: rounded on top, squared off where it meets the body.
        let strip = ResolvedRect::new(rect.x, rect.y, rect.width, card.header_height);
        canvas.fill_rounded_rect(self.rect(strip), radius, self.palette.card_header_fill);
        canvas.fill_rect(
            self.rect(ResolvedRect::new(
                rect.x,
                rect.y + card.header_height - card.radius,
                rect.width,
                card.radius,
            )),
            self.palette.card_header_fill,
        );

        canvas.set_fill_color(self.palette.card_title);
        canvas.set_font(BaseFont::HelveticaBold, Pt::from_f32(card.title_size));
        canvas.draw_string(
            self.pt(rect.x + card.title_inset_x),
            self.pt(rect.y + card.title_baseline),
            block.title.as_str(),
        );

        let cx = self.pt(rect.right() - card.badge_inset_right);
        let cy = self.pt(rect.y + card.badge_center_y);
        canvas.fill_circle(cx, cy, self.pt(card.badge_radius), self.palette.badge_fill);
        let number = block.badge_number.to_string();
        let number_size = Pt::from_f32(card.badge_text_size);
        let number_width = font::text_width(BaseFont::HelveticaBold, number_size, &number);
        canvas.set_fill_color(self.palette.badge_text);
        canvas.set_font(BaseFont::HelveticaBold, number_size);
        canvas.draw_string(
            cx - number_width / 2.0,
            cy + self.pt(card.badge_baseline_offset),
            number,
        );

        let text_area = rect.inset(
            card.text_area_side,
            card.text_area_top,
            card.text_area_side,
            card.text_area_bottom,
        );
        let field_rect = text_area.inset(
            card.field_inset,
            card.field_inset,
            card.field_inset,
            card.field_inset,
        );
        if !(field_rect.width > 0.0 && field_rect.height > 0.0) {
            return Err(CanvasError::emission(
                Some(key),
                format!(
                    "card of {:.2}x{:.2} leaves no room for its text area",
                    rect.width, rect.height
                ),
            ));
        }
        canvas.fill_rounded_rect(
            self.rect(text_area),
            self.pt(card.text_area_radius),
            self.palette.field_fill,
        );
        let field = FormField::multi_line(
            key,
            record.get(key),
            self.rect(field_rect),
            self.palette.block_field_style(card.field_font_size),
        );
        register(canvas, field, debug)
    }

    fn paint_footer(&self, canvas: &mut Canvas, generated_at: NaiveDateTime) {
        let footer = &self.template.footer;
        let baseline = self.pt(self.page.height - footer.baseline_from_bottom);
        canvas.meta("section", "footer");

        let stamp = format!(
            "{} {}",
            footer.timestamp_label,
            generated_at.format(&footer.timestamp_format)
        );
        canvas.set_fill_color(self.palette.footer_text);
        canvas.set_font(BaseFont::Helvetica, Pt::from_f32(footer.text_size));
        canvas.draw_string(self.pt(self.template.grid.outer_margin), baseline, stamp);

        canvas.set_fill_color(self.palette.footer_mark);
        canvas.set_font(BaseFont::Helvetica, Pt::from_f32(footer.mark_size));
        canvas.draw_string(
            self.pt(self.page.width - footer.mark_from_right),
            baseline,
            footer.mark.as_str(),
        );
    }
}

fn register(
    canvas: &mut Canvas,
    field: FormField,
    debug: Option<&DebugLogger>,
) -> Result<(), CanvasError> {
    if let Some(debug) = debug {
        debug.event(
            "field.registered",
            json!({
                "name": field.name,
                "multiline": field.multiline,
                "rect": [
                    field.rect.x.to_f32(),
                    field.rect.y.to_f32(),
                    field.rect.width.to_f32(),
                    field.rect.height.to_f32(),
                ],
                "font_size": field.style.font_size,
            }),
        );
        debug.increment("fields", 1);
    }
    canvas.register_field(field)
}

/// Largest box with the given aspect ratio that fits inside `max_w` x `max_h`.
fn fit_within(aspect: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    if !(aspect > 0.0) {
        return (max_w, max_h);
    }
    if max_w / aspect <= max_h {
        (max_w, max_w / aspect)
    } else {
        (max_h * aspect, max_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::layout::{resolve, resolve_header};
    use crate::types::Color;
    use chrono::NaiveDate;
    use std::sync::Arc;

    struct Fixture {
        page: PageGeometry,
        template: CanvasTemplate,
        palette: StylePalette,
        layout: GridLayout,
        header: Vec<HeaderSlot>,
    }

    impl Fixture {
        fn charter() -> Self {
            let template = CanvasTemplate::project_charter();
            let page = PageGeometry::query(template.paper_format, template.orientation, template.unit);
            let layout = resolve(&page, &template.grid, template.header.grid_top(), &template.blocks)
                .expect("layout");
            let header = resolve_header(&page, template.grid.outer_margin, &template.header)
                .expect("header");
            Self {
                page,
                template,
                palette: StylePalette::slate(),
                layout,
                header,
            }
        }

        fn emitter(&self) -> DocumentEmitter<'_> {
            DocumentEmitter {
                page: &self.page,
                template: &self.template,
                palette: &self.palette,
                layout: &self.layout,
                header: &self.header,
            }
        }

        fn emit(&self, record: &DataRecord, assets: &LoadedAssets) -> Result<Document, CanvasError> {
            self.emitter().emit(record, assets, stamp())
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 5, 7))
            .expect("timestamp")
    }

    fn markers(doc: &Document) -> Vec<(String, String)> {
        doc.page
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Meta { key, value } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    fn position_of_text(doc: &Document, needle: &str) -> usize {
        doc.page
            .commands
            .iter()
            .position(|cmd| matches!(cmd, Command::DrawString { text, .. } if text == needle))
            .unwrap_or_else(|| panic!("no text {needle:?}"))
    }

    #[test]
    fn sections_and_blocks_are_painted_in_order() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        let markers = markers(&doc);
        let mut expected = vec![
            ("section".to_string(), "background".to_string()),
            ("section".to_string(), "header".to_string()),
        ];
        expected.extend(
            fixture
                .template
                .blocks
                .iter()
                .map(|b| ("block".to_string(), b.key.clone())),
        );
        expected.push(("section".to_string(), "footer".to_string()));
        assert_eq!(markers, expected);

        assert!(position_of_text(&doc, "Justificativa") < position_of_text(&doc, "Produto"));
        assert!(position_of_text(&doc, "Restrições") < position_of_text(&doc, "Custos"));
    }

    fn font_of_text(doc: &Document, needle: &str) -> BaseFont {
        let mut font = BaseFont::Helvetica;
        for cmd in &doc.page.commands {
            match cmd {
                Command::SetFont(next) => font = *next,
                Command::DrawString { text, .. } if text == needle => return font,
                _ => {}
            }
        }
        panic!("no text {needle:?}")
    }

    #[test]
    fn header_labels_use_the_regular_face() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        assert_eq!(
            font_of_text(&doc, &fixture.template.header.title),
            BaseFont::HelveticaBold
        );
        assert_eq!(font_of_text(&doc, "GP:"), BaseFont::Helvetica);
        assert_eq!(font_of_text(&doc, "Projeto:"), BaseFont::Helvetica);
        assert_eq!(font_of_text(&doc, "Justificativa"), BaseFont::HelveticaBold);
    }

    #[test]
    fn every_key_gets_a_field_with_record_value_or_empty() {
        let fixture = Fixture::charter();
        let record = DataRecord::new()
            .with("projeto", "Acme")
            .with("riscos", "Atraso\nCusto");
        let doc = fixture.emit(&record, &LoadedAssets::default()).expect("emit");
        assert_eq!(doc.page.fields.len(), 15);
        assert_eq!(doc.field("gp").expect("gp").value, "");
        assert_eq!(doc.field("projeto").expect("projeto").value, "Acme");
        assert_eq!(doc.field("riscos").expect("riscos").value, "Atraso\nCusto");
        assert_eq!(doc.field("custos").expect("custos").value, "");

        let names: Vec<&str> = doc.page.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(&names[..3], &["gp", "projeto", "justificativa"]);
    }

    #[test]
    fn header_fields_match_their_backgrounds_and_are_single_line() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        for slot in &fixture.header {
            let field = doc.field(&slot.key).expect("header field");
            assert!(!field.multiline);
            assert_eq!(field.rect, slot.background.to_pt(Unit::Mm));
            assert_eq!(field.style.font_size, 12.0);
        }
    }

    #[test]
    fn block_fields_sit_inside_the_text_area_with_explicit_style() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        let card = fixture.layout.rect("requisitos").expect("rect");
        let field = doc.field("requisitos").expect("field");
        assert!(field.multiline);
        let expected = card
            .inset(10.0, 55.0, 10.0, 10.0)
            .inset(5.0, 5.0, 5.0, 5.0)
            .to_pt(Unit::Mm);
        assert_eq!(field.rect, expected);
        assert_eq!(field.style.text_color, Color::WHITE);
        assert_eq!(field.style.background, fixture.palette.field_fill);
        assert_eq!(field.style.border_color, Some(fixture.palette.card_border));
        assert_eq!(field.style.font_size, 11.0);
    }

    #[test]
    fn badge_number_is_centred_on_the_circle() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        let card = fixture.layout.rect("custos").expect("rect");
        let cx = Unit::Mm.to_pt(card.right() - 25.0);
        let width = font::text_width(BaseFont::HelveticaBold, Pt::from_f32(12.0), "13");
        let drawn = doc.page.commands.iter().find_map(|cmd| match cmd {
            Command::DrawString { x, text, .. } if text == "13" => Some(*x),
            _ => None,
        });
        assert_eq!(drawn, Some(cx - width / 2.0));
    }

    #[test]
    fn footer_carries_formatted_timestamp() {
        let fixture = Fixture::charter();
        let doc = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect("emit");
        position_of_text(&doc, "Gerado em: 09/03/2026 às 14:05:07");
        position_of_text(&doc, "VEXNET Telecom - Sistema de Gestão de Projetos");
    }

    #[test]
    fn background_image_replaces_solid_fill() {
        let fixture = Fixture::charter();
        let bytes = crate::assets::tests::png_bytes(4, 3, 255);
        let image = Arc::new(crate::assets::decode_image_bytes("bg", &bytes).expect("decode"));
        let assets = LoadedAssets {
            background: Some(image.clone()),
            logo: Some(image),
        };
        let doc = fixture.emit(&DataRecord::new(), &assets).expect("emit");
        let first_draw = doc
            .page
            .commands
            .iter()
            .find(|cmd| !matches!(cmd, Command::Meta { .. }));
        match first_draw {
            Some(Command::DrawImage {
                width,
                height,
                resource_id,
                ..
            }) => {
                assert_eq!(resource_id, BACKGROUND_ID);
                assert_eq!(*width, fixture.page.size_pt().width);
                assert_eq!(*height, fixture.page.size_pt().height);
            }
            other => panic!("expected background image first, got {other:?}"),
        }
        assert_eq!(doc.images.len(), 2);
    }

    #[test]
    fn logo_keeps_its_aspect_ratio() {
        assert_eq!(fit_within(2.0, 200.0, 70.0), (140.0, 70.0));
        assert_eq!(fit_within(4.0, 200.0, 70.0), (200.0, 50.0));
    }

    #[test]
    fn cramped_cards_fail_with_the_block_key() {
        let mut fixture = Fixture::charter();
        fixture.template.card.text_area_top = 10_000.0;
        let err = fixture
            .emit(&DataRecord::new(), &LoadedAssets::default())
            .expect_err("no room");
        assert!(matches!(err, CanvasError::Emission { key: Some(ref k), .. } if k == "justificativa"));
    }
}
