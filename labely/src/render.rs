//! Rendering a filled in sheet as a printable page.
use barcoders::{generators::svg::SVG, sym::code128::Code128};
use handlebars::{Handlebars, RenderError};
use label_api_types::{LabelSheetResponse, LabelSlot, SHEET_COLUMNS, SHEET_ROWS};
use log::debug;
use serde::Serialize;

/// The height in pixels of a rendered barcode.
const BARCODE_HEIGHT: u32 = 48;

/// Sheet of 3 x 8 labels. Slot cells keep their size whether filled or not so
/// the printed labels line up with the physical sheet.
static TEMPLATE_LABEL_SHEET: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
@page { size: A4; margin: 0; }
body { margin: 0; font-family: sans-serif; }
table.sheet { width: 210mm; border-collapse: collapse; table-layout: fixed; }
td.label { width: 70mm; height: 37mm; padding: 2mm; text-align: center; vertical-align: middle; overflow: hidden; }
td.label svg { max-width: 100%; height: 14mm; }
td.empty { color: #ccc; }
.name { font-size: 10pt; font-weight: bold; }
.code { font-size: 8pt; font-family: monospace; }
</style>
</head>
<body>
<table class="sheet">
{{#each rows}}
<tr>
{{#each cells}}
{{#if empty}}
<td class="label empty" data-slot="{{slot}}"></td>
{{else}}
<td class="label" data-slot="{{slot}}">
{{#if barcode}}{{{barcode}}}{{/if}}
<div class="name">{{name}}</div>
<div class="code">{{id}}</div>
</td>
{{/if}}
{{/each}}
</tr>
{{/each}}
</table>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct SheetView {
    title: String,
    rows: Vec<RowView>,
}

#[derive(Debug, Serialize)]
struct RowView {
    cells: Vec<CellView>,
}

#[derive(Debug, Default, Serialize)]
struct CellView {
    /// 1-based, as printed on the sheet.
    slot: usize,
    empty: bool,
    id: String,
    name: String,
    barcode: Option<String>,
}

/// The 0-based (row, column) of a slot on the sheet.
pub fn slot_position(index: usize) -> (usize, usize) {
    (index / SHEET_COLUMNS, index % SHEET_COLUMNS)
}

/// Generate a Code 128 barcode for an id as SVG.
///
/// The id is encoded as is in character set B, so case is kept and the bars
/// scan back to the printed id. Returns `None` for ids with characters outside
/// printable ASCII.
pub fn barcode_svg(id: &str) -> Option<String> {
    let data = id.trim();
    if data.is_empty() {
        return None;
    }
    if !data.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
        debug!("cannot encode `{}` as a code 128 barcode: not printable ascii", id);
        return None;
    }

    let barcode = match Code128::new(format!("\u{0181}{}", data)) {
        Ok(b) => b,
        Err(e) => {
            debug!("cannot encode `{}` as a code 128 barcode: {}", id, e);
            return None;
        }
    };
    let encoded = barcode.encode();

    let svg = SVG::new(BARCODE_HEIGHT);
    svg.generate(&encoded[..]).ok()
}

fn cell(index: usize, slot: &LabelSlot) -> CellView {
    match slot {
        LabelSlot::Filled(item) => CellView {
            slot: index + 1,
            empty: false,
            id: item.id.to_string(),
            name: item.name.to_string(),
            barcode: barcode_svg(&item.id),
        },
        LabelSlot::Empty => CellView {
            slot: index + 1,
            empty: true,
            ..Default::default()
        },
    }
}

/// Render a sheet as an HTML page of 3 columns by 8 rows of labels.
pub fn render_sheet_html(sheet: &LabelSheetResponse) -> Result<String, RenderError> {
    let mut rows: Vec<RowView> = (0..SHEET_ROWS).map(|_| RowView { cells: vec![] }).collect();
    for (index, slot) in sheet.slots.iter().enumerate() {
        let (row, _) = slot_position(index);
        rows[row].cells.push(cell(index, slot));
    }

    let view = SheetView {
        title: format!("{} labels", sheet.item_type),
        rows,
    };

    let handlebars = Handlebars::new();
    handlebars.render_template(TEMPLATE_LABEL_SHEET, &view)
}
