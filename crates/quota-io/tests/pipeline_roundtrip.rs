use std::io::{Cursor, Read, Write};

use pretty_assertions::assert_eq;
use quota_io::{
    load_bytes, process_upload, CellScalar, InfeasibleMode, LoadOptions, ProcessError,
    ProcessorConfig, RowOrder,
};
use quota_reduce::{ReductionError, ReductionStatus};
use rust_xlsxwriter::{Format, Workbook};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const HEADERS: [&str; 5] = [
    "Veículos",
    "Data",
    "URL Veiculada",
    "Impressões Totais",
    "Categoria",
];

/// Build a campaign sheet; `impressions` become rows `vehicle-<i>`.
fn campaign_xlsx(impressions: &[f64]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let date = Format::new().set_num_format("dd/mm/yyyy");

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (idx, value) in impressions.iter().enumerate() {
        let row = (idx + 1) as u32;
        worksheet
            .write_string(row, 0, &format!("vehicle-{idx}"))
            .unwrap();
        // 2024-03-01 + idx days.
        worksheet
            .write_number_with_format(row, 1, 45352.0 + idx as f64, &date)
            .unwrap();
        worksheet
            .write_string(row, 2, &format!("https://example.com/{idx}"))
            .unwrap();
        worksheet.write_number(row, 3, *value).unwrap();
        worksheet.write_string(row, 4, "news").unwrap();
    }

    workbook.save_to_buffer().unwrap()
}

fn zip_bytes(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);

    for (name, bytes) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

fn read_part(xlsx: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(xlsx)).expect("output is a zip package");
    let mut part = archive.by_name(name).expect("part exists");
    let mut out = String::new();
    part.read_to_string(&mut out).expect("utf-8 part");
    out
}

fn column(table: &quota_io::Table, idx: usize) -> Vec<CellScalar> {
    table.column(idx).cloned().collect()
}

#[test]
fn reduces_an_uploaded_workbook() {
    let input = campaign_xlsx(&[10.0, 5.0, 3.0]);

    let processed =
        process_upload("campanha.xlsx", input, 12, &ProcessorConfig::default()).unwrap();
    assert_eq!(processed.file_name, "campanha.xlsx");
    assert_eq!(processed.summary.original_total, 18);
    assert_eq!(processed.summary.achieved_total, 12);
    assert_eq!(processed.summary.status, ReductionStatus::Reduced);

    let output = load_bytes("out.xlsx", processed.bytes, &LoadOptions::default()).unwrap();
    let table = output.table;
    assert_eq!(table.sheet_name, "Sheet1");
    assert_eq!(table.headers, HEADERS.map(String::from).to_vec());
    assert_eq!(
        column(&table, 3),
        vec![
            CellScalar::Number(4.0),
            CellScalar::Number(5.0),
            CellScalar::Number(3.0),
        ]
    );
    assert_eq!(
        column(&table, 0),
        vec![
            CellScalar::Text("vehicle-0".into()),
            CellScalar::Text("vehicle-1".into()),
            CellScalar::Text("vehicle-2".into()),
        ]
    );
    assert_eq!(column(&table, 1)[2], CellScalar::DateTime(45354.0));
}

#[test]
fn output_is_styled() {
    let input = campaign_xlsx(&[10.0, 5.0]);
    let processed = process_upload("c.xlsx", input, 15, &ProcessorConfig::default()).unwrap();

    let styles = read_part(&processed.bytes, "xl/styles.xml");
    assert!(styles.contains("47A432"), "header fill missing:\n{styles}");
    assert!(styles.contains("<b/>"), "bold header font missing:\n{styles}");

    let sheet = read_part(&processed.bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("customWidth=\"1\""), "column widths missing:\n{sheet}");
}

#[test]
fn reads_the_first_spreadsheet_inside_an_archive() {
    let inner = campaign_xlsx(&[0.0, 7.0]);
    let archive = zip_bytes(&[
        ("__MACOSX/exports/._campanha.xlsx", b"junk"),
        ("exports/campanha.xlsx", inner.as_slice()),
    ]);

    let processed = process_upload("upload.zip", archive, 7, &ProcessorConfig::default()).unwrap();
    assert_eq!(processed.file_name, "campanha.xlsx");
    assert_eq!(processed.summary.source_name, "exports/campanha.xlsx");
    assert_eq!(processed.summary.status, ReductionStatus::Unchanged);
    assert_eq!(processed.summary.rows_dropped, 1);

    let output = load_bytes("out.xlsx", processed.bytes, &LoadOptions::default()).unwrap();
    assert_eq!(column(&output.table, 3), vec![CellScalar::Number(7.0)]);
}

#[test]
fn infeasible_targets_follow_the_configured_policy() {
    let input = campaign_xlsx(&[2.0, 2.0]);

    let err = process_upload("c.xlsx", input.clone(), 0, &ProcessorConfig::default()).unwrap_err();
    assert!(
        matches!(
            err,
            ProcessError::Reduce(ReductionError::Infeasible {
                required: 4,
                available: 2
            })
        ),
        "{err:?}"
    );

    let config = ProcessorConfig {
        on_infeasible: InfeasibleMode::LeaveUnchanged,
        ..ProcessorConfig::default()
    };
    let processed = process_upload("c.xlsx", input, 0, &config).unwrap();
    assert_eq!(
        processed.summary.status,
        ReductionStatus::Infeasible { shortfall: 4 }
    );
    assert_eq!(processed.summary.achieved_total, 4);
}

#[test]
fn original_order_keeps_input_positions() {
    let input = campaign_xlsx(&[3.0, 10.0, 5.0]);
    let config = ProcessorConfig {
        order: RowOrder::Original,
        ..ProcessorConfig::default()
    };

    let processed = process_upload("c.xlsx", input, 12, &config).unwrap();
    let output = load_bytes("out.xlsx", processed.bytes, &LoadOptions::default()).unwrap();
    assert_eq!(
        column(&output.table, 3),
        vec![
            CellScalar::Number(3.0),
            CellScalar::Number(4.0),
            CellScalar::Number(5.0),
        ]
    );
}

#[test]
fn missing_columns_are_reported_with_what_was_found() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, " Veículos ").unwrap();
    worksheet.write_string(0, 1, "Impressões").unwrap();
    let input = workbook.save_to_buffer().unwrap();

    let err = process_upload("c.xlsx", input, 0, &ProcessorConfig::default()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("\"url veiculada\""), "{message}");
    assert!(message.contains("\"impressões\""), "{message}");
}

#[test]
fn unsupported_upload_is_rejected_before_parsing() {
    let err = process_upload("c.csv", b"a,b\n".to_vec(), 0, &ProcessorConfig::default())
        .unwrap_err();
    assert!(
        matches!(err, ProcessError::Load(quota_io::LoadError::UnsupportedFormat { .. })),
        "{err:?}"
    );
}
