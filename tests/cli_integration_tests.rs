//! CLI Integration Tests
//!
//! Tests the csvfill binary directly using assert_cmd to exercise main.rs code paths.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use calamine::{open_workbook, Data, Reader, Xlsx};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SHEET: &str = "貼り付け用";

fn csvfill() -> Command {
    let mut cmd = Command::cargo_bin("csvfill").unwrap();
    cmd.env_remove("CSVFILL_TEMPLATE");
    cmd
}

fn init_template(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("template.xlsx");
    csvfill()
        .arg("init-template")
        .arg(&path)
        .assert()
        .success();
    path
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    csvfill()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("csvfill"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    csvfill()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("csvfill"));
}

#[test]
fn test_convert_help() {
    csvfill()
        .args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--template"));
}

// ═══════════════════════════════════════════════════════════════════════════
// INIT-TEMPLATE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_init_template_creates_target_sheet() {
    let dir = TempDir::new().unwrap();
    let path = init_template(dir.path());

    let workbook: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec![SHEET.to_string()]);
}

#[test]
fn test_init_template_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = init_template(dir.path());

    csvfill()
        .arg("init-template")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    csvfill()
        .args(["init-template", "--force"])
        .arg(&path)
        .assert()
        .success();
}

// ═══════════════════════════════════════════════════════════════════════════
// CONVERT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_convert_writes_converted_file() {
    let dir = TempDir::new().unwrap();
    let template = init_template(dir.path());
    let input = dir.path().join("people.csv");
    fs::write(&input, "名前,年齢\n太郎,30\n花子,25\n").unwrap();

    csvfill()
        .arg("convert")
        .arg(&input)
        .arg("--template")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversion Complete"))
        .stdout(predicate::str::contains("3 rows × 2 columns"));

    let output = dir.path().join("people_converted.xlsx");
    let mut workbook: Xlsx<_> = open_workbook(&output).unwrap();
    let range = workbook.worksheet_range(SHEET).unwrap();
    assert_eq!(range.get_size(), (3, 2));
    assert_eq!(
        range.get_value((1, 0)),
        Some(&Data::String("太郎".to_string()))
    );
}

#[test]
fn test_convert_explicit_output_and_env_template() {
    let dir = TempDir::new().unwrap();
    let template = init_template(dir.path());
    let input = dir.path().join("data.csv");
    fs::write(&input, "a,b\n").unwrap();
    let output = dir.path().join("out").join("result.xlsx");
    fs::create_dir_all(output.parent().unwrap()).unwrap();

    Command::cargo_bin("csvfill")
        .unwrap()
        .env("CSVFILL_TEMPLATE", &template)
        .arg("convert")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert!(output.exists());
    assert!(!dir.path().join("data_converted.xlsx").exists());
}

#[test]
fn test_convert_reports_skipped_rows() {
    let dir = TempDir::new().unwrap();
    let template = init_template(dir.path());
    let input = dir.path().join("wide.csv");
    fs::write(&input, "a,b\n1,2,3\n4,5\n").unwrap();

    csvfill()
        .arg("convert")
        .arg(&input)
        .arg("-t")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 row(s) skipped"));
}

#[test]
fn test_convert_missing_template_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("data.csv");
    fs::write(&input, "a,b\n").unwrap();

    csvfill()
        .current_dir(dir.path())
        .arg("convert")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template not found"))
        .stderr(predicate::str::contains("template.xlsx"));

    assert!(!dir.path().join("data_converted.xlsx").exists());
}

#[test]
fn test_convert_undecodable_file_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    let template = init_template(dir.path());
    let input = dir.path().join("binary.csv");
    fs::write(&input, [0x82u8, 0xFF, 0xFE, 0x00, 0xFD]).unwrap();

    csvfill()
        .arg("convert")
        .arg(&input)
        .arg("-t")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("any supported encoding"))
        .stderr(predicate::str::contains("encoding"));
}

#[test]
fn test_convert_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let template = init_template(dir.path());

    csvfill()
        .arg("convert")
        .arg(dir.path().join("nope.csv"))
        .arg("-t")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

// ═══════════════════════════════════════════════════════════════════════════
// PREVIEW TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_preview_shows_rows_and_encoding() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sjis.csv");
    // 名前,年齢 / 太郎,30 in Shift_JIS
    fs::write(
        &input,
        b"\x96\xBC\x91\x4F,\x94\x4E\x97\xEE\r\n\x91\xBE\x98\x59,30\r\n",
    )
    .unwrap();

    csvfill()
        .arg("preview")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 rows × 2 columns"))
        .stdout(predicate::str::contains("shift_jis"))
        .stdout(predicate::str::contains("太郎"))
        .stdout(predicate::str::contains("sjis_converted.xlsx"));
}

#[test]
fn test_preview_limits_rows() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("many.csv");
    let csv: String = (1..=30).map(|i| format!("row{},x\n", i)).collect();
    fs::write(&input, csv).unwrap();

    csvfill()
        .args(["preview", "-n", "3"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("row3"))
        .stdout(predicate::str::contains("row4").not())
        .stdout(predicate::str::contains("27 more"));
}

#[test]
fn test_preview_needs_no_template() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("a.csv");
    fs::write(&input, "x\n").unwrap();

    csvfill()
        .current_dir(dir.path())
        .arg("preview")
        .arg(&input)
        .assert()
        .success();
}
