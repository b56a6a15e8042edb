use crate::error::CanvasError;
use crate::layout::{self, BlockDefinition, GridSpec, HeaderField, HeaderSpec};
use crate::page::{Orientation, PaperFormat};
use crate::types::Unit;
use serde::{Deserialize, Serialize};

/// Offsets used to draw one card, relative to its resolved rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardMetrics {
    pub radius: f32,
    pub border_width: f32,
    pub header_height: f32,
    pub title_inset_x: f32,
    pub title_baseline: f32,
    pub title_size: f32,
    pub badge_inset_right: f32,
    pub badge_center_y: f32,
    pub badge_radius: f32,
    pub badge_text_size: f32,
    pub badge_baseline_offset: f32,
    pub text_area_top: f32,
    pub text_area_side: f32,
    pub text_area_bottom: f32,
    pub text_area_radius: f32,
    pub field_inset: f32,
    pub field_font_size: f32,
}

impl CardMetrics {
    /// Card offsets of the A0 charter, in millimetres.
    pub fn charter() -> Self {
        Self {
            radius: 8.0,
            border_width: 0.5,
            header_height: 45.0,
            title_inset_x: 20.0,
            title_baseline: 25.0,
            title_size: 16.0,
            badge_inset_right: 25.0,
            badge_center_y: 22.0,
            badge_radius: 12.0,
            badge_text_size: 12.0,
            badge_baseline_offset: 4.0,
            text_area_top: 55.0,
            text_area_side: 10.0,
            text_area_bottom: 10.0,
            text_area_radius: 5.0,
            field_inset: 5.0,
            field_font_size: 11.0,
        }
    }

    fn scaled(&self, factor: f32) -> Self {
        Self {
            radius: self.radius * factor,
            border_width: self.border_width,
            header_height: self.header_height * factor,
            title_inset_x: self.title_inset_x * factor,
            title_baseline: self.title_baseline * factor,
            title_size: self.title_size,
            badge_inset_right: self.badge_inset_right * factor,
            badge_center_y: self.badge_center_y * factor,
            badge_radius: self.badge_radius * factor,
            badge_text_size: self.badge_text_size,
            badge_baseline_offset: self.badge_baseline_offset * factor,
            text_area_top: self.text_area_top * factor,
            text_area_side: self.text_area_side * factor,
            text_area_bottom: self.text_area_bottom * factor,
            text_area_radius: self.text_area_radius * factor,
            field_inset: self.field_inset * factor,
            field_font_size: self.field_font_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterSpec {
    // Distance of the footer baseline from the page bottom.
    pub baseline_from_bottom: f32,
    pub timestamp_label: String,
    pub timestamp_format: String,
    pub text_size: f32,
    pub mark: String,
    pub mark_size: f32,
    // Distance of the mark's left edge from the page's right edge.
    pub mark_from_right: f32,
}

/// Logo box relative to the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogoPlacement {
    pub x_from_right: f32,
    pub y: f32,
    pub max_width: f32,
    pub max_height: f32,
}

/// Everything that distinguishes one canvas variant from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasTemplate {
    pub name: String,
    pub paper_format: PaperFormat,
    pub orientation: Orientation,
    pub unit: Unit,
    pub grid: GridSpec,
    pub header: HeaderSpec,
    pub header_title_size: f32,
    pub header_label_size: f32,
    pub header_field_font_size: f32,
    pub header_field_radius: f32,
    pub logo: LogoPlacement,
    pub card: CardMetrics,
    pub footer: FooterSpec,
    pub blocks: Vec<BlockDefinition>,
}

fn charter_blocks() -> Vec<BlockDefinition> {
    vec![
        BlockDefinition::new("justificativa", "Justificativa", 1, (0, 0), (1, 1)),
        BlockDefinition::new("produto", "Produto", 4, (1, 0), (1, 1)),
        BlockDefinition::new("stakeholders", "Stakeholders", 6, (2, 0), (1, 1)),
        BlockDefinition::new("premissas", "Premissas", 8, (3, 0), (1, 1)),
        BlockDefinition::new("riscos", "Riscos", 11, (4, 0), (1, 1)),
        BlockDefinition::new("objSmart", "Obj. SMART", 2, (0, 1), (1, 1)),
        BlockDefinition::new("requisitos", "Requisitos", 5, (1, 1), (1, 2)),
        BlockDefinition::new("equipe", "Equipe", 7, (2, 1), (1, 1)),
        BlockDefinition::new("fases", "Fases", 9, (3, 1), (1, 1)),
        BlockDefinition::new("linhaTempo", "Linha do Tempo", 12, (4, 1), (1, 1)),
        BlockDefinition::new("beneficios", "Benefícios", 3, (0, 2), (1, 1)),
        BlockDefinition::new("restricoes", "Restrições", 10, (2, 2), (2, 1)),
        BlockDefinition::new("custos", "Custos", 13, (4, 2), (1, 1)),
    ]
}

impl CanvasTemplate {
    /// The 13-block project charter on A0 landscape, measured in millimetres.
    pub fn project_charter() -> Self {
        Self {
            name: "project-charter".to_string(),
            paper_format: PaperFormat::A0,
            orientation: Orientation::Landscape,
            unit: Unit::Mm,
            grid: GridSpec {
                columns: 5,
                rows: 3,
                outer_margin: 40.0,
                cell_gap: 15.0,
            },
            header: HeaderSpec {
                band_height: 100.0,
                grid_offset: 30.0,
                title: "VEXNET - TAP (Termo de Abertura do Projeto)".to_string(),
                title_baseline: 35.0,
                field_top: 60.0,
                field_height: 20.0,
                field_width: 250.0,
                entry_gap: 50.0,
                field_inset_x: 0.0,
                field_inset_y: 0.0,
                label_baseline_offset: 15.0,
                entries: vec![
                    HeaderField::new("gp", "GP:", 50.0),
                    HeaderField::new("projeto", "Projeto:", 80.0),
                ],
            },
            header_title_size: 28.0,
            header_label_size: 14.0,
            header_field_font_size: 12.0,
            header_field_radius: 3.0,
            logo: LogoPlacement {
                x_from_right: 240.0,
                y: 15.0,
                max_width: 200.0,
                max_height: 70.0,
            },
            card: CardMetrics::charter(),
            footer: FooterSpec {
                baseline_from_bottom: 30.0,
                timestamp_label: "Gerado em:".to_string(),
                timestamp_format: "%d/%m/%Y às %H:%M:%S".to_string(),
                text_size: 12.0,
                mark: "VEXNET Telecom - Sistema de Gestão de Projetos".to_string(),
                mark_size: 10.0,
                mark_from_right: 300.0,
            },
            blocks: charter_blocks(),
        }
    }

    /// The same charter shrunk onto A3 landscape. Offsets scale with the page;
    /// font sizes are points and stay readable.
    pub fn compact_charter() -> Self {
        let base = Self::project_charter();
        let factor = 420.0 / 1189.0;
        let s = |v: f32| v * factor;
        Self {
            name: "project-charter-a3".to_string(),
            paper_format: PaperFormat::A3,
            grid: GridSpec {
                columns: base.grid.columns,
                rows: base.grid.rows,
                outer_margin: s(base.grid.outer_margin),
                cell_gap: s(base.grid.cell_gap),
            },
            header: HeaderSpec {
                band_height: s(base.header.band_height),
                grid_offset: s(base.header.grid_offset),
                title_baseline: s(base.header.title_baseline),
                field_top: s(base.header.field_top),
                field_height: s(base.header.field_height),
                field_width: s(base.header.field_width),
                entry_gap: s(base.header.entry_gap),
                field_inset_x: s(base.header.field_inset_x),
                field_inset_y: s(base.header.field_inset_y),
                label_baseline_offset: s(base.header.label_baseline_offset),
                entries: base
                    .header
                    .entries
                    .iter()
                    .map(|e| HeaderField::new(e.key.clone(), e.label.clone(), s(e.label_width)))
                    .collect(),
                title: base.header.title.clone(),
            },
            header_title_size: 14.0,
            header_label_size: 9.0,
            header_field_font_size: 8.0,
            header_field_radius: s(base.header_field_radius),
            logo: LogoPlacement {
                x_from_right: s(base.logo.x_from_right),
                y: s(base.logo.y),
                max_width: s(base.logo.max_width),
                max_height: s(base.logo.max_height),
            },
            card: CardMetrics {
                title_size: 9.0,
                badge_text_size: 7.0,
                field_font_size: 7.0,
                ..base.card.scaled(factor)
            },
            footer: FooterSpec {
                baseline_from_bottom: s(base.footer.baseline_from_bottom),
                text_size: 7.0,
                mark_size: 6.0,
                mark_from_right: s(base.footer.mark_from_right),
                ..base.footer.clone()
            },
            ..base
        }
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.header
            .entries
            .iter()
            .map(|e| e.key.as_str())
            .chain(self.blocks.iter().map(|b| b.key.as_str()))
    }

    /// Checks the parts of the template that do not depend on page geometry.
    pub fn validate(&self) -> Result<(), CanvasError> {
        if self.blocks.is_empty() {
            return Err(CanvasError::Configuration(format!(
                "template '{}' has no blocks",
                self.name
            )));
        }
        layout::validate_field_keys(self.field_keys())?;
        let sizes = [
            ("header title size", self.header_title_size),
            ("header label size", self.header_label_size),
            ("header field font size", self.header_field_font_size),
            ("card title size", self.card.title_size),
            ("badge text size", self.card.badge_text_size),
            ("field font size", self.card.field_font_size),
        ];
        for (name, value) in sizes {
            if !(value > 0.0) || !value.is_finite() {
                return Err(CanvasError::Configuration(format!(
                    "{name} must be positive (got {value})"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CanvasTemplate {
    fn default() -> Self {
        Self::project_charter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::resolve;
    use crate::page::PageGeometry;

    #[test]
    fn charter_has_thirteen_blocks_and_two_header_fields() {
        let template = CanvasTemplate::project_charter();
        assert_eq!(template.blocks.len(), 13);
        assert_eq!(template.field_keys().count(), 15);
        let mut badges: Vec<u32> = template.blocks.iter().map(|b| b.badge_number).collect();
        badges.sort_unstable();
        assert_eq!(badges, (1..=13).collect::<Vec<_>>());
        template.validate().expect("valid");
    }

    #[test]
    fn charter_matches_a0_landscape_grid() {
        let template = CanvasTemplate::project_charter();
        let page = PageGeometry::query(template.paper_format, template.orientation, template.unit);
        let layout = resolve(&page, &template.grid, template.header.grid_top(), &template.blocks)
            .expect("layout");
        let expected_width = (page.width - 80.0 - 60.0) / 5.0;
        assert_eq!(layout.cell_width, expected_width);
        assert!(layout.free_cells().is_empty());
    }

    #[test]
    fn compact_variant_resolves_on_a3() {
        let template = CanvasTemplate::compact_charter();
        template.validate().expect("valid");
        let page = PageGeometry::query(template.paper_format, template.orientation, template.unit);
        let layout = resolve(&page, &template.grid, template.header.grid_top(), &template.blocks)
            .expect("layout");
        assert!(layout.cell_height > template.card.text_area_top);
        assert_eq!(template.blocks, CanvasTemplate::project_charter().blocks);
    }

    #[test]
    fn header_keys_may_not_collide_with_blocks() {
        let mut template = CanvasTemplate::project_charter();
        template.header.entries[0].key = "riscos".to_string();
        let err = template.validate().expect_err("collision");
        assert!(err.to_string().contains("duplicate field key 'riscos'"));
    }

    #[test]
    fn template_without_blocks_is_rejected() {
        let mut template = CanvasTemplate::project_charter();
        template.blocks.clear();
        assert!(matches!(
            template.validate(),
            Err(CanvasError::Configuration(_))
        ));
    }
}
