use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use engine_logging::engine_debug;
use postharvest_core::Item;
use rust_xlsxwriter::{Workbook, XlsxError};
use url::Url;

use crate::filename::derive_filename;
use crate::persist::PersistError;
use crate::store::{HistoryRecord, StoreError};

/// Column order shared by CSV and XLSX.
pub const COLUMNS: [&str; 10] = [
    "URL",
    "Author",
    "Caption",
    "Thumbnail URL",
    "Likes",
    "Comments",
    "Created At",
    "Views",
    "Type",
    "Page Source",
];

const MAX_SHEET_NAME: usize = 31;
const DEFAULT_SHEET_NAME: &str = "Posts";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown export format {0:?}")]
    UnknownFormat(String),
    #[error("no history record with id {0}")]
    RecordNotFound(u64),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    CsvBuffer(String),
    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),
    #[error("history unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("download failed: {0}")]
    Download(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// How `RenderedExport::content` encodes the file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Utf8,
    /// Binary formats travel as base64 text.
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedExport {
    pub content: String,
    pub encoding: PayloadEncoding,
    pub mime_type: &'static str,
    pub file_name: String,
}

impl RenderedExport {
    /// The file bytes to materialize.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        match self.encoding {
            PayloadEncoding::Utf8 => Ok(self.content.clone().into_bytes()),
            PayloadEncoding::Base64 => Ok(BASE64.decode(&self.content)?),
        }
    }
}

/// Renders a stored record. `file_name` defaults to `<username>_<id>.<ext>`.
pub fn render(
    record: &HistoryRecord,
    format: ExportFormat,
    file_name: Option<&str>,
) -> Result<RenderedExport, ExportError> {
    let (content, encoding) = match format {
        ExportFormat::Json => (serde_json::to_string_pretty(record)?, PayloadEncoding::Utf8),
        ExportFormat::Csv => (render_csv(record)?, PayloadEncoding::Utf8),
        ExportFormat::Xlsx => (BASE64.encode(render_xlsx(record)?), PayloadEncoding::Base64),
    };
    let file_name = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| derive_filename(&record.username, record.id, format.extension()));

    engine_debug!(
        "rendered record {} as {:?} ({} bytes) -> {}",
        record.id,
        format,
        content.len(),
        file_name
    );

    Ok(RenderedExport {
        content,
        encoding,
        mime_type: format.mime_type(),
        file_name,
    })
}

/// Replaces each run of line breaks with one space so a field never spans rows.
fn single_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}

/// One spreadsheet cell. CSV writes every cell as text, XLSX keeps numbers
/// numeric and leaves blanks empty.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cell {
    Text(String),
    Number(u64),
    Blank,
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text(single_line(value))
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Blank => String::new(),
        }
    }
}

/// An item's cells in [`COLUMNS`] order.
fn item_cells(item: &Item) -> [Cell; 10] {
    [
        Cell::text(&item.url),
        Cell::text(&item.author),
        Cell::text(&item.caption),
        Cell::text(item.thumbnail_url.as_deref().unwrap_or_default()),
        Cell::Number(item.likes),
        Cell::Number(item.comments),
        Cell::text(&item.created_at),
        item.views.map_or(Cell::Blank, Cell::Number),
        Cell::text(item.kind.as_str()),
        Cell::text(item.page_source.as_str()),
    ]
}

fn render_csv(record: &HistoryRecord) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if record.has_item_metadata() {
        writer.write_record(COLUMNS)?;
        for item in &record.items {
            writer.write_record(item_cells(item).iter().map(Cell::to_field))?;
        }
    } else {
        writer.write_record(["URL"])?;
        for link in record.link_list() {
            writer.write_record([single_line(&link)])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::CsvBuffer(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::CsvBuffer(err.to_string()))
}

/// Sheet named after the record's source domain, within Excel's limits.
fn sheet_name(record: &HistoryRecord) -> String {
    let host = record
        .link_list()
        .first()
        .and_then(|link| Url::parse(link).ok())
        .and_then(|url| url.host_str().map(|h| h.trim_start_matches("www.").to_string()));
    let cleaned: String = host
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    if cleaned.is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        cleaned
    }
}

fn render_xlsx(record: &HistoryRecord) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(record))?;

        if record.has_item_metadata() {
            for (col, header) in COLUMNS.iter().enumerate() {
                sheet.write_string(0, col as u16, *header)?;
            }
            for (idx, item) in record.items.iter().enumerate() {
                let row = idx as u32 + 1;
                for (col, cell) in item_cells(item).into_iter().enumerate() {
                    let col = col as u16;
                    match cell {
                        Cell::Text(text) => {
                            sheet.write_string(row, col, text)?;
                        }
                        Cell::Number(n) => {
                            sheet.write_number(row, col, n as f64)?;
                        }
                        Cell::Blank => {}
                    }
                }
            }
        } else {
            sheet.write_string(0, 0, "URL")?;
            for (idx, link) in record.link_list().iter().enumerate() {
                sheet.write_string(idx as u32 + 1, 0, link.as_str())?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use postharvest_core::{ItemKind, PageSource};

    fn record(items: Vec<Item>, links: Vec<&str>) -> HistoryRecord {
        HistoryRecord {
            id: 1,
            date: "2024-05-01".to_string(),
            username: "natgeo".to_string(),
            count: items.len().max(links.len()),
            items,
            links: links.into_iter().map(ToOwned::to_owned).collect(),
        }
    }

    #[test]
    fn sheet_is_named_after_the_source_domain() {
        let item = Item::bare("https://www.instagram.com/p/A/", "natgeo", "t");
        assert_eq!(sheet_name(&record(vec![item], vec![])), "instagram.com");

        let legacy = record(vec![], vec!["https://m.example.org/p/L1/"]);
        assert_eq!(sheet_name(&legacy), "m.example.org");
    }

    #[test]
    fn long_hosts_are_cut_to_the_sheet_limit() {
        let host = format!("{}.example.com", "a".repeat(40));
        let item = Item::bare(format!("https://{host}/p/A/"), "natgeo", "t");
        let name = sheet_name(&record(vec![item], vec![]));
        assert_eq!(name.chars().count(), MAX_SHEET_NAME);
        assert_eq!(name, "a".repeat(31));
    }

    #[test]
    fn sheet_without_a_parsable_link_is_named_posts() {
        assert_eq!(sheet_name(&record(vec![], vec![])), DEFAULT_SHEET_NAME);
        assert_eq!(
            sheet_name(&record(vec![], vec!["not a url"])),
            DEFAULT_SHEET_NAME
        );
    }

    #[test]
    fn item_cells_follow_column_order() {
        let mut item = Item::bare("https://www.instagram.com/reel/R/", "natgeo", "2024-05-01");
        item.caption = "line one\nline two".to_string();
        item.thumbnail_url = Some("https://cdn.example.com/r.jpg".to_string());
        item.likes = 12;
        item.comments = 3;
        item.views = Some(4_500);
        item.page_source = PageSource::ReelsTab;
        assert_eq!(item.kind, ItemKind::Reel);

        let cells: Vec<(&str, Cell)> = COLUMNS.into_iter().zip(item_cells(&item)).collect();
        assert_eq!(
            cells,
            vec![
                ("URL", Cell::text("https://www.instagram.com/reel/R/")),
                ("Author", Cell::text("natgeo")),
                ("Caption", Cell::text("line one line two")),
                ("Thumbnail URL", Cell::text("https://cdn.example.com/r.jpg")),
                ("Likes", Cell::Number(12)),
                ("Comments", Cell::Number(3)),
                ("Created At", Cell::text("2024-05-01")),
                ("Views", Cell::Number(4_500)),
                ("Type", Cell::text("reel")),
                ("Page Source", Cell::text("reels_tab")),
            ]
        );

        item.views = None;
        assert_eq!(item_cells(&item)[7], Cell::Blank);
    }

    #[test]
    fn csv_header_is_the_shared_column_list() {
        let item = Item::bare("https://www.instagram.com/p/A/", "natgeo", "t");
        let csv = render_csv(&record(vec![item], vec![])).unwrap();
        let header = csv.lines().next().unwrap();
        let expected: Vec<String> = COLUMNS.iter().map(|c| format!("\"{c}\"")).collect();
        assert_eq!(header, expected.join(","));
    }

    #[test]
    fn line_break_runs_collapse_to_one_space() {
        assert_eq!(single_line("a\r\n\nb\nc"), "a b c");
        assert_eq!(single_line("plain"), "plain");
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(name)) if name == "pdf"
        ));
    }
}
