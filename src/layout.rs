//! Grid topology to absolute page rectangles.
//!
//! All values here are in the caller's page unit with a top-left origin. The
//! resolver is a pure function of its inputs: the same page, grid and block list
//! always produce the same [`GridLayout`], whatever order the blocks come in.

use crate::error::CanvasError;
use crate::page::PageGeometry;
use crate::types::{Rect, Unit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub outer_margin: f32,
    pub cell_gap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub col: u32,
    pub row: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub cols: u32,
    pub rows: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub key: String,
    pub title: String,
    pub badge_number: u32,
    pub cell: CellPos,
    pub span: Span,
}

impl BlockDefinition {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        badge_number: u32,
        cell: (u32, u32),
        span: (u32, u32),
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            badge_number,
            cell: CellPos {
                col: cell.0,
                row: cell.1,
            },
            span: Span {
                cols: span.0,
                rows: span.1,
            },
        }
    }

    fn covered_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.cell.row..self.cell.row + self.span.rows).flat_map(move |row| {
            (self.cell.col..self.cell.col + self.span.cols).map(move |col| (col, row))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ResolvedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Shrinks the rectangle by the given edge offsets.
    pub fn inset(&self, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: self.x + left,
            y: self.y + top,
            width: self.width - left - right,
            height: self.height - top - bottom,
        }
    }

    pub fn to_pt(&self, unit: Unit) -> Rect {
        Rect {
            x: unit.to_pt(self.x),
            y: unit.to_pt(self.y),
            width: unit.to_pt(self.width),
            height: unit.to_pt(self.height),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub grid_top: f32,
    rects: BTreeMap<String, ResolvedRect>,
    occupancy: Vec<Option<String>>,
}

impl GridLayout {
    pub fn rect(&self, key: &str) -> Option<ResolvedRect> {
        self.rects.get(key).copied()
    }

    pub fn rects(&self) -> &BTreeMap<String, ResolvedRect> {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Key of the block covering `(col, row)`, if any.
    pub fn occupant(&self, col: u32, row: u32) -> Option<&str> {
        if col >= self.columns || row >= self.rows {
            return None;
        }
        self.occupancy
            .get((row * self.columns + col) as usize)
            .and_then(|slot| slot.as_deref())
    }

    pub fn free_cells(&self) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.columns {
                if self.occupant(col, row).is_none() {
                    out.push((col, row));
                }
            }
        }
        out
    }
}

fn config_err(message: impl Into<String>) -> CanvasError {
    CanvasError::Configuration(message.into())
}

fn validate_grid(page: &PageGeometry, grid: &GridSpec, grid_top: f32) -> Result<(), CanvasError> {
    if grid.columns == 0 || grid.rows == 0 {
        return Err(config_err(format!(
            "grid must have at least one column and one row (got {}x{})",
            grid.columns, grid.rows
        )));
    }
    let numbers = [
        ("page width", page.width),
        ("page height", page.height),
        ("outer margin", grid.outer_margin),
        ("cell gap", grid.cell_gap),
        ("grid top", grid_top),
    ];
    for (name, value) in numbers {
        if !value.is_finite() || value < 0.0 {
            return Err(config_err(format!(
                "{name} must be a finite non-negative number (got {value})"
            )));
        }
    }
    Ok(())
}

/// Checks that every key is non-empty and unique across header fields and blocks.
pub fn validate_field_keys<'a>(
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<(), CanvasError> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if key.trim().is_empty() {
            return Err(config_err("field key cannot be empty"));
        }
        if !seen.insert(key) {
            return Err(config_err(format!("duplicate field key '{key}'")));
        }
    }
    Ok(())
}

pub fn resolve(
    page: &PageGeometry,
    grid: &GridSpec,
    grid_top: f32,
    blocks: &[BlockDefinition],
) -> Result<GridLayout, CanvasError> {
    validate_grid(page, grid, grid_top)?;
    validate_field_keys(blocks.iter().map(|block| block.key.as_str()))?;

    let columns = grid.columns as f32;
    let rows = grid.rows as f32;
    let cell_width =
        (page.width - 2.0 * grid.outer_margin - (columns - 1.0) * grid.cell_gap) / columns;
    if !(cell_width > 0.0) {
        return Err(config_err(format!(
            "cell width is not positive ({cell_width:.3}): margins and gaps exceed page width {}",
            page.width
        )));
    }
    let content_height = page.height - grid_top - grid.outer_margin;
    let cell_height = (content_height - (rows - 1.0) * grid.cell_gap) / rows;
    if !(cell_height > 0.0) {
        return Err(config_err(format!(
            "cell height is not positive ({cell_height:.3}): header band and gaps exceed page height {}",
            page.height
        )));
    }

    let cell_count = grid.columns.checked_mul(grid.rows).ok_or_else(|| {
        config_err(format!(
            "grid of {}x{} cells is too large",
            grid.columns, grid.rows
        ))
    })?;
    let mut occupancy: Vec<Option<String>> = vec![None; cell_count as usize];
    for block in blocks {
        if block.span.cols == 0 || block.span.rows == 0 {
            return Err(config_err(format!(
                "block '{}' has an empty span ({}x{})",
                block.key, block.span.cols, block.span.rows
            )));
        }
        let col_end = block.cell.col.checked_add(block.span.cols);
        let row_end = block.cell.row.checked_add(block.span.rows);
        let in_bounds = matches!(col_end, Some(end) if end <= grid.columns)
            && matches!(row_end, Some(end) if end <= grid.rows);
        if !in_bounds {
            return Err(config_err(format!(
                "block '{}' at ({}, {}) spanning {}x{} exceeds the {}x{} grid",
                block.key,
                block.cell.col,
                block.cell.row,
                block.span.cols,
                block.span.rows,
                grid.columns,
                grid.rows
            )));
        }
        for (col, row) in block.covered_cells() {
            let slot = &mut occupancy[(row * grid.columns + col) as usize];
            if let Some(other) = slot.as_deref() {
                return Err(config_err(format!(
                    "blocks '{}' and '{}' overlap at cell ({col}, {row})",
                    other, block.key
                )));
            }
            *slot = Some(block.key.clone());
        }
    }

    let mut rects = BTreeMap::new();
    for block in blocks {
        let col = block.cell.col as f32;
        let row = block.cell.row as f32;
        let span_cols = block.span.cols as f32;
        let span_rows = block.span.rows as f32;
        rects.insert(
            block.key.clone(),
            ResolvedRect {
                x: grid.outer_margin + col * (cell_width + grid.cell_gap),
                y: grid_top + row * (cell_height + grid.cell_gap),
                width: span_cols * cell_width + (span_cols - 1.0) * grid.cell_gap,
                height: span_rows * cell_height + (span_rows - 1.0) * grid.cell_gap,
            },
        );
    }

    Ok(GridLayout {
        columns: grid.columns,
        rows: grid.rows,
        cell_width,
        cell_height,
        grid_top,
        rects,
        occupancy,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderField {
    pub key: String,
    pub label: String,
    pub label_width: f32,
}

impl HeaderField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, label_width: f32) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            label_width,
        }
    }
}

/// Fixed-height band above the grid holding the title and single-line fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSpec {
    pub band_height: f32,
    // Space between the band and the first grid row.
    pub grid_offset: f32,
    pub title: String,
    pub title_baseline: f32,
    pub field_top: f32,
    pub field_height: f32,
    pub field_width: f32,
    pub entry_gap: f32,
    pub field_inset_x: f32,
    pub field_inset_y: f32,
    pub label_baseline_offset: f32,
    pub entries: Vec<HeaderField>,
}

impl HeaderSpec {
    pub fn grid_top(&self) -> f32 {
        self.band_height + self.grid_offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSlot {
    pub key: String,
    pub label: String,
    pub label_x: f32,
    pub label_baseline: f32,
    pub background: ResolvedRect,
    pub field: ResolvedRect,
}

/// Lays header entries out left to right starting at the outer margin.
pub fn resolve_header(
    page: &PageGeometry,
    outer_margin: f32,
    header: &HeaderSpec,
) -> Result<Vec<HeaderSlot>, CanvasError> {
    if !(header.band_height >= 0.0) || header.field_top + header.field_height > header.band_height
    {
        return Err(config_err(format!(
            "header fields (top {}, height {}) do not fit the {} header band",
            header.field_top, header.field_height, header.band_height
        )));
    }
    let mut slots = Vec::with_capacity(header.entries.len());
    let mut cursor = outer_margin;
    for entry in &header.entries {
        let background = ResolvedRect::new(
            cursor + entry.label_width,
            header.field_top,
            header.field_width,
            header.field_height,
        );
        if background.right() > page.width - outer_margin {
            return Err(config_err(format!(
                "header field '{}' ends at {:.3}, past the right margin at {:.3}",
                entry.key,
                background.right(),
                page.width - outer_margin
            )));
        }
        let field = background.inset(
            header.field_inset_x,
            header.field_inset_y,
            header.field_inset_x,
            header.field_inset_y,
        );
        if !(field.width > 0.0 && field.height > 0.0) {
            return Err(config_err(format!(
                "header field '{}' has no room inside its inset",
                entry.key
            )));
        }
        slots.push(HeaderSlot {
            key: entry.key.clone(),
            label: entry.label.clone(),
            label_x: cursor,
            label_baseline: header.field_top + header.label_baseline_offset,
            background,
            field,
        });
        cursor = background.right() + header.entry_gap;
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_page() -> PageGeometry {
        PageGeometry::custom(1000.0, 700.0, Unit::Pt)
    }

    fn scenario_grid() -> GridSpec {
        GridSpec {
            columns: 5,
            rows: 3,
            outer_margin: 15.0,
            cell_gap: 10.0,
        }
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

    fn expect_config_err(result: Result<GridLayout, CanvasError>, needle: &str) {
        match result {
            Err(CanvasError::Configuration(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            Err(other) => panic!("expected configuration error, got {other}"),
            Ok(_) => panic!("expected configuration error containing '{needle}'"),
        }
    }

    #[test]
    fn scenario_cell_metrics_and_tall_block() {
        let grid_top = 130.0;
        let layout =
            resolve(&scenario_page(), &scenario_grid(), grid_top, &charter_blocks()).expect("layout");
        assert_eq!(layout.cell_width, 186.0);
        let expected_cell_height = ((700.0f32 - grid_top - 15.0) - 2.0 * 10.0) / 3.0;
        assert_eq!(layout.cell_height, expected_cell_height);

        let requisitos = layout.rect("requisitos").expect("requisitos");
        assert_eq!(requisitos.x, 15.0 + 186.0 + 10.0);
        assert_eq!(requisitos.y, grid_top + (layout.cell_height + 10.0));
        assert_eq!(requisitos.width, 186.0);
        assert_eq!(requisitos.height, 2.0 * layout.cell_height + 10.0);
    }

    #[test]
    fn horizontal_span_includes_swallowed_gap() {
        let layout = resolve(&scenario_page(), &scenario_grid(), 130.0, &charter_blocks())
            .expect("layout");
        let restricoes = layout.rect("restricoes").expect("restricoes");
        assert_eq!(restricoes.width, 2.0 * 186.0 + 10.0);
        assert_eq!(restricoes.height, layout.cell_height);
        let custos = layout.rect("custos").expect("custos");
        assert_eq!(custos.x, restricoes.right() + 10.0);
    }

    #[test]
    fn coverage_matches_declared_cells_without_overlap() {
        let blocks = charter_blocks();
        let layout = resolve(&scenario_page(), &scenario_grid(), 130.0, &blocks).expect("layout");
        let declared: usize = blocks
            .iter()
            .map(|b| (b.span.cols * b.span.rows) as usize)
            .sum();
        let occupied = (layout.columns * layout.rows) as usize - layout.free_cells().len();
        assert_eq!(declared, occupied);
        // Requisitos reaches into the last row; Restrições takes two of its columns.
        assert_eq!(layout.occupant(1, 2), Some("requisitos"));
        assert_eq!(layout.occupant(3, 2), Some("restricoes"));
        assert!(layout.free_cells().is_empty());

        for block in &blocks {
            let rect = layout.rect(&block.key).expect("rect");
            for other in &blocks {
                if other.key == block.key {
                    continue;
                }
                let o = layout.rect(&other.key).expect("rect");
                let disjoint = rect.right() <= o.x
                    || o.right() <= rect.x
                    || rect.bottom() <= o.y
                    || o.bottom() <= rect.y;
                assert!(disjoint, "{} overlaps {}", block.key, other.key);
            }
        }
    }

    #[test]
    fn resolve_is_idempotent_and_order_independent() {
        let blocks = charter_blocks();
        let a = resolve(&scenario_page(), &scenario_grid(), 130.0, &blocks).expect("a");
        let b = resolve(&scenario_page(), &scenario_grid(), 130.0, &blocks).expect("b");
        assert_eq!(a, b);
        for (key, rect) in a.rects() {
            let other = b.rect(key).expect("same key");
            assert_eq!(rect.x.to_bits(), other.x.to_bits());
            assert_eq!(rect.height.to_bits(), other.height.to_bits());
        }

        let mut reversed = blocks.clone();
        reversed.reverse();
        let c = resolve(&scenario_page(), &scenario_grid(), 130.0, &reversed).expect("c");
        assert_eq!(a.rects(), c.rects());
    }

    #[test]
    fn margins_that_consume_page_width_are_rejected() {
        let grid = GridSpec {
            columns: 5,
            rows: 3,
            outer_margin: 480.0,
            cell_gap: 10.0,
        };
        // 2*480 + 4*10 == 1000 == page width.
        expect_config_err(
            resolve(&scenario_page(), &grid, 130.0, &[]),
            "cell width is not positive",
        );
        let grid = GridSpec {
            outer_margin: 500.0,
            ..grid
        };
        expect_config_err(
            resolve(&scenario_page(), &grid, 130.0, &[]),
            "cell width is not positive",
        );
    }

    #[test]
    fn huge_grids_are_rejected_before_allocating() {
        let grid = GridSpec {
            columns: 70_000,
            rows: 70_000,
            outer_margin: 15.0,
            cell_gap: 10.0,
        };
        expect_config_err(
            resolve(&scenario_page(), &grid, 130.0, &[]),
            "cell width is not positive",
        );

        // Cells have room here, but 70_000 * 70_000 does not fit a u32.
        let page = PageGeometry::custom(1.0e9, 1.0e9, Unit::Pt);
        let grid = GridSpec {
            outer_margin: 0.0,
            cell_gap: 0.0,
            ..grid
        };
        expect_config_err(resolve(&page, &grid, 0.0, &[]), "too large");
    }

    #[test]
    fn header_band_that_consumes_page_height_is_rejected() {
        expect_config_err(
            resolve(&scenario_page(), &scenario_grid(), 680.0, &charter_blocks()),
            "cell height is not positive",
        );
    }

    #[test]
    fn invalid_topologies_are_rejected() {
        let page = scenario_page();
        let grid = scenario_grid();

        let mut dup = charter_blocks();
        dup[1].key = "justificativa".to_string();
        expect_config_err(resolve(&page, &grid, 130.0, &dup), "duplicate field key");

        let out_of_bounds = vec![BlockDefinition::new("wide", "Wide", 1, (4, 0), (2, 1))];
        expect_config_err(resolve(&page, &grid, 130.0, &out_of_bounds), "exceeds");

        let too_tall = vec![BlockDefinition::new("tall", "Tall", 1, (0, 2), (1, 2))];
        expect_config_err(resolve(&page, &grid, 130.0, &too_tall), "exceeds");

        let empty_span = vec![BlockDefinition::new("none", "None", 1, (0, 0), (0, 1))];
        expect_config_err(resolve(&page, &grid, 130.0, &empty_span), "empty span");

        let overlap = vec![
            BlockDefinition::new("a", "A", 1, (0, 0), (2, 2)),
            BlockDefinition::new("b", "B", 2, (1, 1), (1, 1)),
        ];
        expect_config_err(resolve(&page, &grid, 130.0, &overlap), "'a' and 'b' overlap");

        let zero_grid = GridSpec {
            columns: 0,
            ..grid
        };
        expect_config_err(resolve(&page, &zero_grid, 130.0, &[]), "at least one column");

        let negative_gap = GridSpec {
            cell_gap: -1.0,
            ..grid
        };
        expect_config_err(resolve(&page, &negative_gap, 130.0, &[]), "cell gap");
    }

    #[test]
    fn header_slots_follow_label_and_inset_rules() {
        let page = PageGeometry::custom(1189.0, 841.0, Unit::Mm);
        let header = HeaderSpec {
            band_height: 100.0,
            grid_offset: 30.0,
            title: "Title".to_string(),
            title_baseline: 35.0,
            field_top: 60.0,
            field_height: 20.0,
            field_width: 250.0,
            entry_gap: 50.0,
            field_inset_x: 5.0,
            field_inset_y: 3.0,
            label_baseline_offset: 15.0,
            entries: vec![
                HeaderField::new("gp", "GP:", 50.0),
                HeaderField::new("projeto", "Projeto:", 80.0),
            ],
        };
        let slots = resolve_header(&page, 40.0, &header).expect("header");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].background, ResolvedRect::new(90.0, 60.0, 250.0, 20.0));
        assert_eq!(slots[0].field, ResolvedRect::new(95.0, 63.0, 240.0, 14.0));
        assert_eq!(slots[1].label_x, 390.0);
        assert_eq!(slots[1].background.x, 470.0);
        assert_eq!(slots[1].label_baseline, 75.0);
        assert_eq!(header.grid_top(), 130.0);

        let narrow = PageGeometry::custom(500.0, 841.0, Unit::Mm);
        match resolve_header(&narrow, 40.0, &header) {
            Err(CanvasError::Configuration(message)) => assert!(message.contains("projeto")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
