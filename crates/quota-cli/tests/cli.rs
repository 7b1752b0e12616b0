use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use calamine::{open_workbook_auto, Data, Reader};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;

fn write_campaign(dir: &Path, name: &str, impressions: &[f64]) -> PathBuf {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let headers = [
        "Veículos",
        "Data",
        "URL Veiculada",
        "Impressões Totais",
        "Categoria",
    ];
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (idx, value) in impressions.iter().enumerate() {
        let row = (idx + 1) as u32;
        worksheet.write_string(row, 0, &format!("vehicle-{idx}")).unwrap();
        worksheet.write_number(row, 1, 45352.0).unwrap();
        worksheet
            .write_string(row, 2, &format!("https://example.com/{idx}"))
            .unwrap();
        worksheet.write_number(row, 3, *value).unwrap();
        worksheet.write_string(row, 4, "news").unwrap();
    }

    let path = dir.join(name);
    workbook.save(&path).unwrap();
    path
}

fn run(input: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quota_trim"))
        .arg(input)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn quota_trim")
}

fn impressions(path: &Path) -> Vec<f64> {
    let mut workbook = open_workbook_auto(path).expect("open output workbook");
    let range = workbook
        .worksheet_range("Sheet1")
        .expect("output has Sheet1");
    range
        .rows()
        .skip(1)
        .map(|row| match &row[3] {
            Data::Float(value) => *value,
            Data::Int(value) => *value as f64,
            other => panic!("unexpected quantity cell {other:?}"),
        })
        .collect()
}

#[test]
fn writes_the_reduced_workbook_next_to_the_input() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_campaign(tmp.path(), "campanha.xlsx", &[10.0, 5.0, 3.0]);

    let output = run(&input, &["--target", "12"]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total: 18 -> 12 (target 12)"), "{stdout}");
    assert!(stdout.contains("Status: reduced"), "{stdout}");

    // The input is never overwritten.
    assert_eq!(impressions(&input), vec![10.0, 5.0, 3.0]);
    assert_eq!(
        impressions(&tmp.path().join("campanha-reduced.xlsx")),
        vec![4.0, 5.0, 3.0]
    );
}

#[test]
fn json_summary_and_explicit_output() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_campaign(tmp.path(), "in.xlsx", &[1.0, 1.0, 0.0]);
    let dest = tmp.path().join("out.xlsx");

    let output = run(
        &input,
        &["-t", "2", "-o", dest.to_str().unwrap(), "--format", "json"],
    );
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["status"], "unchanged");
    assert_eq!(summary["rows_in"], 3);
    assert_eq!(summary["rows_dropped"], 1);
    assert_eq!(summary["achieved_total"], 2);
    assert_eq!(impressions(&dest), vec![1.0, 1.0]);
}

#[test]
fn target_above_total_fails_without_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_campaign(tmp.path(), "in.xlsx", &[4.0, 2.0]);
    let dest = tmp.path().join("out.xlsx");

    let output = run(&input, &["--target", "100", "--output", dest.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("target (100) is greater than the table total (6)"),
        "{stderr}"
    );
    assert!(!dest.exists());
}

#[test]
fn infeasible_target_can_be_clamped_from_the_command_line() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_campaign(tmp.path(), "in.xlsx", &[5.0, 5.0]);
    let dest = tmp.path().join("out.xlsx");

    let rejected = run(&input, &["--target", "1", "-o", dest.to_str().unwrap()]);
    assert!(!rejected.status.success());

    let clamped = run(
        &input,
        &[
            "--target",
            "1",
            "-o",
            dest.to_str().unwrap(),
            "--on-infeasible",
            "clamp-to-floor",
        ],
    );
    assert!(
        clamped.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&clamped.stderr)
    );
    let stdout = String::from_utf8_lossy(&clamped.stdout);
    assert!(stdout.contains("infeasible (output is 1 above the target)"), "{stdout}");
    assert_eq!(impressions(&dest), vec![1.0, 1.0]);
}

#[test]
fn missing_input_reports_the_path() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("nope.xlsx");

    let output = run(&input, &["--target", "1"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope.xlsx"), "{stderr}");
}

#[test]
fn summary_does_not_panic_on_broken_pipe() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_campaign(tmp.path(), "in.xlsx", &[3.0, 3.0]);

    for format in ["text", "json"] {
        // Simulate a downstream consumer exiting early (e.g. `quota_trim ... | head -0`).
        let mut child = Command::new(env!("CARGO_BIN_EXE_quota_trim"))
            .arg(&input)
            .args(["--target", "4", "--format", format])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn quota_trim");
        drop(child.stdout.take());

        let output = child.wait_with_output().expect("wait for quota_trim");
        assert!(
            output.status.success(),
            "expected success even when stdout is closed ({format})\nstderr:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
