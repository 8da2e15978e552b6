use postharvest_core::{Item, ItemKind, PageSource};
use postharvest_engine::{
    render, ExportError, ExportFormat, HistoryRecord, PayloadEncoding, COLUMNS,
};
use pretty_assertions::assert_eq;

fn item(code: &str, caption: &str) -> Item {
    let mut item = Item::bare(
        format!("https://www.instagram.com/p/{code}/"),
        "u1",
        "2024-05-01T12:00:00.000Z",
    );
    item.caption = caption.to_string();
    item
}

fn record(items: Vec<Item>) -> HistoryRecord {
    HistoryRecord {
        id: 1_714_564_800_000,
        date: "2024-05-01T12:00:00.000Z".to_string(),
        username: "u1".to_string(),
        count: items.len(),
        items,
        links: Vec::new(),
    }
}

#[test]
fn json_render_round_trips_the_record() {
    let mut reel = item("R1", "reel");
    reel.kind = ItemKind::Reel;
    reel.views = Some(25_500);
    reel.page_source = PageSource::ReelsTab;
    let record = record(vec![item("A", "first"), reel]);

    let rendered = render(&record, ExportFormat::Json, None).unwrap();

    assert_eq!(rendered.encoding, PayloadEncoding::Utf8);
    assert_eq!(rendered.mime_type, "application/json");
    assert_eq!(rendered.file_name, "u1_1714564800000.json");
    let parsed: HistoryRecord = serde_json::from_str(&rendered.content).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn csv_escapes_quotes_and_collapses_line_breaks() {
    let record = record(vec![item("A", "He said \"hi\"\nline2")]);

    let rendered = render(&record, ExportFormat::Csv, Some("custom.csv")).unwrap();

    assert_eq!(rendered.file_name, "custom.csv");
    let lines: Vec<&str> = rendered.content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(
        lines[1].contains(r#""He said ""hi"" line2""#),
        "row was {}",
        lines[1]
    );

    let mut reader = csv::Reader::from_reader(rendered.content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(headers, COLUMNS.map(str::to_string).to_vec());
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][2], "He said \"hi\" line2");
    assert_eq!(&rows[0][4], "0");
    assert_eq!(&rows[0][7], "");
    assert_eq!(&rows[0][8], "post");
}

#[test]
fn csv_for_legacy_records_is_a_single_url_column() {
    let legacy = HistoryRecord {
        id: 7,
        date: "2023-01-01T00:00:00.000Z".to_string(),
        username: "old".to_string(),
        count: 2,
        items: Vec::new(),
        links: vec![
            "https://www.instagram.com/p/L1/".to_string(),
            "https://www.instagram.com/p/L2/".to_string(),
        ],
    };

    let rendered = render(&legacy, ExportFormat::Csv, None).unwrap();

    assert_eq!(rendered.file_name, "old_7.csv");
    assert_eq!(
        rendered.content,
        "\"URL\"\n\"https://www.instagram.com/p/L1/\"\n\"https://www.instagram.com/p/L2/\"\n"
    );
}

#[test]
fn xlsx_is_delivered_as_base64_workbook() {
    let record = record(vec![item("A", "first"), item("B", "second")]);

    let rendered = render(&record, ExportFormat::Xlsx, None).unwrap();

    assert_eq!(rendered.encoding, PayloadEncoding::Base64);
    assert_eq!(rendered.file_name, "u1_1714564800000.xlsx");
    assert!(rendered.content.starts_with("UEsDB"));
    let bytes = rendered.to_bytes().unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn unknown_format_is_rejected() {
    assert!(matches!(
        "pdf".parse::<ExportFormat>(),
        Err(ExportError::UnknownFormat(_))
    ));
    assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
}
