//! A small PDF 1.4 writer for the finance report.
//!
//! Pages are A4 with the built-in Helvetica fonts, so no font data is embedded.
//! Text is limited to printable ASCII; other characters are replaced with '?'.

use super::report::{Align, Column, FinanceReport, ReportSection};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;
const HEADER_BAND_HEIGHT: f32 = 64.0;
const FOOTER_HEIGHT: f32 = 30.0;

const TITLE_SIZE: f32 = 16.0;
const SECTION_TITLE_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 14.0;
const CELL_PADDING: f32 = 4.0;

/// Regular and bold Helvetica, as named in each page's resources.
const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Render `report` as a PDF document.
pub fn render_report(report: &FinanceReport) -> Vec<u8> {
    let mut layout = PageLayout::new(report);

    layout.text(
        BOLD,
        TITLE_SIZE,
        MARGIN,
        "Finance report",
        (0.1, 0.1, 0.1),
    );
    layout.advance(TITLE_SIZE + 4.0);
    layout.text(
        REGULAR,
        BODY_SIZE,
        MARGIN,
        &format!(
            "{} | generated {} {:02}:{:02}",
            report.range_label,
            report.generated_at.date(),
            report.generated_at.hour(),
            report.generated_at.minute()
        ),
        (0.35, 0.35, 0.35),
    );
    layout.advance(ROW_HEIGHT + 6.0);

    for section in report.sections() {
        layout.table(&section);
    }

    assemble(layout.finish())
}

/// Lays out content top to bottom, starting a new page when the current one is full.
struct PageLayout {
    pages: Vec<String>,
    current: String,
    /// The baseline of the next line of text.
    y: f32,
    marketplace_name: String,
    contact_lines: Vec<String>,
}

impl PageLayout {
    fn new(report: &FinanceReport) -> Self {
        let mut layout = Self {
            pages: Vec::new(),
            current: String::new(),
            y: 0.0,
            marketplace_name: report.marketplace_name.clone(),
            contact_lines: report.contact_lines.clone(),
        };
        layout.start_page();
        layout
    }

    fn start_page(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }

        let band_bottom = PAGE_HEIGHT - HEADER_BAND_HEIGHT;
        self.current.push_str(&format!(
            "0.18 0.42 0.24 rg 0 {band_bottom:.2} {PAGE_WIDTH:.2} {HEADER_BAND_HEIGHT:.2} re f\n"
        ));
        self.y = PAGE_HEIGHT - 30.0;
        let name = self.marketplace_name.clone();
        self.text(BOLD, 18.0, MARGIN, &name, (1.0, 1.0, 1.0));

        // Contact details go in the right of the band.
        let mut contact_y = PAGE_HEIGHT - 22.0;
        for line in self.contact_lines.clone() {
            let x = PAGE_WIDTH - MARGIN - text_width(&line, 8.0);
            self.current.push_str(&text_op(REGULAR, 8.0, x, contact_y, &line, (1.0, 1.0, 1.0)));
            contact_y -= 10.0;
        }

        self.y = band_bottom - 28.0;
    }

    fn advance(&mut self, amount: f32) {
        self.y -= amount;
    }

    /// Start a new page unless `needed` points fit above the footer.
    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y - needed < MARGIN + FOOTER_HEIGHT {
            self.start_page();
            true
        } else {
            false
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, text: &str, color: (f32, f32, f32)) {
        self.current
            .push_str(&text_op(font, size, x, self.y, text, color));
    }

    fn table(&mut self, section: &ReportSection) {
        // Keep the title with the header and at least one row.
        self.ensure_space(SECTION_TITLE_SIZE + 3.0 * ROW_HEIGHT);
        self.text(
            BOLD,
            SECTION_TITLE_SIZE,
            MARGIN,
            &section.title,
            (0.18, 0.42, 0.24),
        );
        self.advance(ROW_HEIGHT + 4.0);

        let widths = column_widths(&section.columns);
        self.table_header(&section.columns, &widths);

        if section.rows.is_empty() {
            self.text(
                REGULAR,
                BODY_SIZE,
                MARGIN + CELL_PADDING,
                section.empty_message,
                (0.4, 0.4, 0.4),
            );
            self.advance(ROW_HEIGHT);
        }

        for row in &section.rows {
            if self.ensure_space(ROW_HEIGHT) {
                self.text(
                    BOLD,
                    BODY_SIZE,
                    MARGIN,
                    &format!("{} (continued)", section.title),
                    (0.18, 0.42, 0.24),
                );
                self.advance(ROW_HEIGHT);
                self.table_header(&section.columns, &widths);
            }

            self.table_row(REGULAR, &section.columns, &widths, row);
        }

        self.advance(ROW_HEIGHT);
    }

    fn table_header(&mut self, columns: &[Column], widths: &[f32]) {
        let titles: Vec<String> = columns.iter().map(|column| column.title.to_owned()).collect();
        self.table_row(BOLD, columns, widths, &titles);

        let rule_y = self.y + ROW_HEIGHT - 3.0;
        self.current.push_str(&format!(
            "0.6 G 0.5 w {:.2} {rule_y:.2} m {:.2} {rule_y:.2} l S\n",
            MARGIN,
            PAGE_WIDTH - MARGIN
        ));
    }

    fn table_row(&mut self, font: &str, columns: &[Column], widths: &[f32], cells: &[String]) {
        let mut x = MARGIN;

        for ((column, width), cell) in columns.iter().zip(widths).zip(cells) {
            let available = width - 2.0 * CELL_PADDING;
            let cell = fit_text(cell, BODY_SIZE, available);
            let cell_x = match column.align {
                Align::Left => x + CELL_PADDING,
                Align::Right => x + width - CELL_PADDING - text_width(&cell, BODY_SIZE),
            };

            self.current
                .push_str(&text_op(font, BODY_SIZE, cell_x, self.y, &cell, (0.1, 0.1, 0.1)));
            x += width;
        }

        self.advance(ROW_HEIGHT);
    }

    /// Finish the last page and add the page numbers.
    fn finish(mut self) -> Vec<String> {
        self.pages.push(std::mem::take(&mut self.current));
        let page_count = self.pages.len();

        self.pages
            .into_iter()
            .enumerate()
            .map(|(index, mut content)| {
                let footer = format!("Page {} of {page_count}", index + 1);
                let x = PAGE_WIDTH - MARGIN - text_width(&footer, 8.0);
                content.push_str(&text_op(REGULAR, 8.0, x, MARGIN, &footer, (0.4, 0.4, 0.4)));
                content
            })
            .collect()
    }
}

fn column_widths(columns: &[Column]) -> Vec<f32> {
    let total_weight: f32 = columns.iter().map(|column| column.weight).sum();
    let usable = PAGE_WIDTH - 2.0 * MARGIN;

    columns
        .iter()
        .map(|column| usable * column.weight / total_weight)
        .collect()
}

fn text_op(font: &str, size: f32, x: f32, y: f32, text: &str, color: (f32, f32, f32)) -> String {
    let (r, g, b) = color;
    format!(
        "BT {r:.2} {g:.2} {b:.2} rg /{font} {size:.1} Tf {x:.2} {y:.2} Td ({}) Tj ET\n",
        escape_text(text)
    )
}

/// Escape a string for a PDF literal string.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            _ => escaped.push('?'),
        }
    }

    escaped
}

/// The approximate width of `text` in Helvetica at `size` points.
fn text_width(text: &str, size: f32) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' => 0.556,
            '.' | ',' | ' ' | 'i' | 'l' | 'j' | '!' | '\'' => 0.278,
            '-' | '(' | ')' => 0.333,
            'f' | 't' | 'r' => 0.333,
            'm' | 'w' => 0.833,
            'M' | 'W' => 0.9,
            'A'..='Z' => 0.68,
            _ => 0.52,
        })
        .sum();

    em * size
}

/// Shorten `text` with "..." so that it fits in `width` points.
fn fit_text(text: &str, size: f32, width: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_owned();
    }

    let mut fitted: String = text.to_owned();
    while !fitted.is_empty() && text_width(&fitted, size) + text_width("...", size) > width {
        fitted.pop();
    }

    fitted.push_str("...");
    fitted
}

/// Write the page content streams into a complete PDF file.
fn assemble(pages: Vec<String>) -> Vec<u8> {
    // Objects 1 to 4 are the catalog, page tree and fonts, then each page is
    // followed by its content stream.
    let page_object_ids: Vec<usize> = (0..pages.len()).map(|index| 5 + 2 * index).collect();
    let kids = page_object_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_owned(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_owned(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_owned(),
    ];

    for (content, page_id) in pages.iter().zip(&page_object_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /{REGULAR} 3 0 R /{BOLD} 4 0 R >> >> \
             /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());

    for (index, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", index + 1).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );

    pdf
}
