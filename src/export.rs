//! PDF export of the filtered and sorted document view.
//!
//! Building the report (columns, rows, totals) is separate from drawing it.
//! [`PdfRenderer`] is the only seam that knows about PDF.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, info};

use crate::documents::{find_column, value_of};
use crate::domain::BoardError;
use crate::table::DocumentTable;

pub const TITLE: &str = "Direction de la Trésorerie Générale";
pub const TOTAL_DUE_COLUMN: &str = "total-à-payer";
pub const MONTHLY_COLUMN: &str = "Montant par Mois";
pub const CURRENCY: &str = "DJF";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub total_due: f64,
    pub monthly: f64,
}

impl Totals {
    pub fn total_due_line(&self) -> String {
        format!("Total à payer: {} {CURRENCY}", format_amount(self.total_due))
    }

    pub fn monthly_line(&self) -> String {
        format!("Total à payer ce mois: {} {CURRENCY}", format_amount(self.monthly))
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub title: String,
    pub subtitle: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub include_expired: bool,
    pub today: NaiveDate,
}

/// Every visible row (all pages, current filter and sort order).
pub fn build_report(table: &DocumentTable, options: &ExportOptions) -> ExportReport {
    let columns = table.display_columns().to_vec();
    let total_column = find_column(table.columns(), TOTAL_DUE_COLUMN);
    let monthly_column = find_column(table.columns(), MONTHLY_COLUMN);

    let mut totals = Totals {
        total_due: 0.0,
        monthly: 0.0,
    };
    let mut rows = Vec::with_capacity(table.visible_len());
    for document in table.visible() {
        if !options.include_expired && table.is_expired(document, options.today) {
            continue;
        }
        if let Some(column) = total_column {
            totals.total_due += parse_amount(value_of(document, column));
        }
        if let Some(column) = monthly_column {
            totals.monthly += parse_amount(value_of(document, column));
        }
        rows.push(
            columns
                .iter()
                .map(|c| value_of(document, c).to_string())
                .collect(),
        );
    }
    debug!(
        "Export report: {} rows, {} columns, totals {:?}",
        rows.len(),
        columns.len(),
        totals
    );

    ExportReport {
        title: TITLE.to_string(),
        subtitle: format!(
            "Liste de beneficiaire de la pension alimentaire et la date ({})",
            options.today.format("%d/%m/%Y")
        ),
        columns,
        rows,
        totals,
    }
}

/// Blanks and commas are separators, anything else that is not a digit or
/// the first decimal point is dropped. Unusable text counts as zero.
pub fn parse_amount(raw: &str) -> f64 {
    let mut cleaned = String::with_capacity(raw.len());
    let mut seen_point = false;
    for c in raw.chars() {
        if c.is_ascii_digit() {
            cleaned.push(c);
        } else if c == '.' {
            if seen_point {
                break;
            }
            seen_point = true;
            cleaned.push(c);
        }
    }
    cleaned.parse().unwrap_or(0.0)
}

/// French grouping: `1234567.5` becomes `1 234 567,5`, at most three decimals.
pub fn format_amount(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let text = format!("{:.3}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, digit) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*digit);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{fraction}")
    }
}

pub trait PdfRenderer {
    fn render(&self, report: &ExportReport) -> Result<Vec<u8>, BoardError>;
}

/// Renders, expands `~`/env vars in `path` and writes the file.
pub fn export_to_file(
    report: &ExportReport,
    renderer: &dyn PdfRenderer,
    path: &Path,
) -> Result<PathBuf, BoardError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| BoardError::Config(format!("Cannot expand export path {raw}: {e}")))?;
    let target = PathBuf::from(expanded.as_ref());

    let bytes = renderer.render(report)?;
    fs::write(&target, &bytes)
        .map_err(|e| BoardError::Export(format!("Cannot write {}: {e}", target.display())))?;
    info!("Exported {} rows to {}", report.rows.len(), target.display());
    Ok(target)
}

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 40.0;
const TABLE_TOP_FIRST: f32 = 100.0;
const TABLE_TOP_NEXT: f32 = 40.0;
const HEADER_HEIGHT: f32 = 20.0;
const ROW_HEIGHT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;
const BODY_FONT: f32 = 10.0;
const TOTALS_FONT: f32 = 12.0;
const TOTALS_RESERVED: f32 = 80.0;
const HEADER_FILL: [f32; 3] = [22.0 / 255.0, 119.0 / 255.0, 199.0 / 255.0];
const STRIPE_FILL: [f32; 3] = [240.0 / 255.0, 240.0 / 255.0, 240.0 / 255.0];

/// Landscape A4 grid table drawn with the standard Helvetica fonts.
#[derive(Debug, Default)]
pub struct TablePdf;

struct Page {
    ops: Vec<Operation>,
}

impl Page {
    fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn fill_color(&mut self, rgb: [f32; 3]) {
        self.ops.push(Operation::new(
            "rg",
            rgb.iter().map(|&c| Object::Real(c)).collect(),
        ));
    }

    /// `top` is measured from the top edge like the rest of the layout.
    fn rect(&mut self, x: f32, top: f32, width: f32, height: f32, paint: &str) {
        self.ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(PAGE_HEIGHT - top - height),
                Object::Real(width),
                Object::Real(height),
            ],
        ));
        self.ops.push(Operation::new(paint, vec![]));
    }

    fn text(&mut self, font: &str, size: f32, x: f32, baseline_top: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Real(size)],
        ));
        self.ops.push(Operation::new(
            "Td",
            vec![Object::Real(x), Object::Real(PAGE_HEIGHT - baseline_top)],
        ));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }
}

impl TablePdf {
    fn draw_row(page: &mut Page, top: f32, height: f32, cells: &[String], column_width: f32, font: &str) {
        let max_chars = ((column_width - 2.0 * CELL_PADDING) / (BODY_FONT * 0.5)).max(1.0) as usize;
        for (idx, cell) in cells.iter().enumerate() {
            let x = MARGIN + idx as f32 * column_width;
            page.rect(x, top, column_width, height, "S");
            let baseline = top + height / 2.0 + BODY_FONT * 0.35;
            page.text(font, BODY_FONT, x + CELL_PADDING, baseline, &clip(cell, max_chars));
        }
    }

    fn draw_header(page: &mut Page, top: f32, columns: &[String], column_width: f32) {
        page.fill_color(HEADER_FILL);
        page.rect(MARGIN, top, column_width * columns.len() as f32, HEADER_HEIGHT, "f");
        page.fill_color([1.0, 1.0, 1.0]);
        Self::draw_row(page, top, HEADER_HEIGHT, columns, column_width, "F2");
        page.fill_color([0.0, 0.0, 0.0]);
    }

    fn layout(report: &ExportReport) -> Vec<Page> {
        let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / report.columns.len().max(1) as f32;
        let bottom = PAGE_HEIGHT - MARGIN;

        let mut pages = Vec::new();
        let mut page = Page::new();
        page.ops.push(Operation::new(
            "RG",
            vec![Object::Real(0.75), Object::Real(0.75), Object::Real(0.75)],
        ));
        page.text("F2", 16.0, MARGIN, 50.0, &report.title);
        page.text("F1", 13.0, MARGIN, 75.0, &report.subtitle);

        let mut top = TABLE_TOP_FIRST;
        if !report.columns.is_empty() {
            Self::draw_header(&mut page, top, &report.columns, column_width);
            top += HEADER_HEIGHT;

            for (idx, row) in report.rows.iter().enumerate() {
                if top + ROW_HEIGHT > bottom {
                    pages.push(page);
                    page = Page::new();
                    page.ops.push(Operation::new(
                        "RG",
                        vec![Object::Real(0.75), Object::Real(0.75), Object::Real(0.75)],
                    ));
                    top = TABLE_TOP_NEXT;
                    Self::draw_header(&mut page, top, &report.columns, column_width);
                    top += HEADER_HEIGHT;
                }
                if idx % 2 == 1 {
                    page.fill_color(STRIPE_FILL);
                    page.rect(MARGIN, top, column_width * report.columns.len() as f32, ROW_HEIGHT, "f");
                    page.fill_color([0.0, 0.0, 0.0]);
                }
                Self::draw_row(&mut page, top, ROW_HEIGHT, row, column_width, "F1");
                top += ROW_HEIGHT;
            }
        }

        // The totals sit near the bottom edge and need free space below the table.
        if top > PAGE_HEIGHT - TOTALS_RESERVED {
            pages.push(page);
            page = Page::new();
        }
        page.text("F2", TOTALS_FONT, 500.0, PAGE_HEIGHT - 60.0, &report.totals.total_due_line());
        page.text("F2", TOTALS_FONT, 470.0, PAGE_HEIGHT - 30.0, &report.totals.monthly_line());
        pages.push(page);
        pages
    }
}

impl PdfRenderer for TablePdf {
    fn render(&self, report: &ExportReport) -> Result<Vec<u8>, BoardError> {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in Self::layout(report) {
            let content = Content {
                operations: page.ops,
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(PAGE_WIDTH),
                    Object::Real(PAGE_HEIGHT),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        debug!("Rendered PDF with {count} pages, {} bytes", bytes.len());
        Ok(bytes)
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    clipped.push_str("..");
    clipped
}

/// The standard fonts use WinAnsiEncoding. Characters outside it become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{202f}' => b' ',
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}
