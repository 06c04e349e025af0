use crate::convert::{self, Converter};
use crate::error::{ConvertError, ConvertResult};
use crate::excel::write_starter_template;
use crate::types::{converted_filename, CellValue, RawInput, TARGET_SHEET};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Longest cell shown in a preview row before it is cut off
const PREVIEW_CELL_WIDTH: usize = 24;

/// Execute the convert command
pub fn convert(
    input: PathBuf,
    output: Option<PathBuf>,
    template: PathBuf,
    verbose: bool,
) -> ConvertResult<()> {
    println!("{}", "📄 csvfill - CSV to Excel".bold().green());
    println!("   Input:    {}", input.display());
    println!("   Template: {}", template.display());
    println!();

    // Template first: nothing is decoded if it is missing
    let converter = Converter::new(&template)?;

    if verbose {
        println!("{}", "📖 Reading CSV file...".cyan());
    }
    let bytes = fs::read(&input)?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let artifact = converter.convert(RawInput::new(bytes, filename))?;
    let summary = &artifact.summary;

    if verbose {
        println!(
            "   Encoding: {}",
            summary.encoding.unwrap_or("-").bright_blue()
        );
        println!(
            "   Sheet:    {} ({})",
            converter.sheet_name(),
            if summary.sheet_existed {
                "cleared"
            } else {
                "created"
            }
        );
    }

    let output = output.unwrap_or_else(|| default_output(&input, &artifact.filename));
    fs::write(&output, &artifact.bytes)?;

    println!("{}", "✅ Conversion Complete!".bold().green());
    println!(
        "   {} rows × {} columns written to '{}'",
        summary.rows, summary.columns, TARGET_SHEET
    );
    if summary.skipped_rows > 0 {
        println!(
            "   {}",
            format!(
                "⚠️  {} row(s) skipped: more fields than the first row",
                summary.skipped_rows
            )
            .yellow()
        );
    }
    println!("   Excel file: {}\n", output.display());

    Ok(())
}

/// Output next to the input file, named `{stem}_converted.xlsx`
fn default_output(input: &Path, filename: &str) -> PathBuf {
    match input.parent() {
        Some(dir) => dir.join(filename),
        None => PathBuf::from(filename),
    }
}

/// Execute the preview command
pub fn preview(input: PathBuf, rows: usize) -> ConvertResult<()> {
    println!("{}", "🔍 csvfill - Preview".bold().green());
    println!("   File: {}\n", input.display());

    let bytes = fs::read(&input)?;
    let preview = convert::preview(&bytes, rows)?;

    println!(
        "   {} rows × {} columns ({})",
        preview.rows,
        preview.columns,
        preview.encoding.unwrap_or("-").bright_blue()
    );
    println!();

    for (idx, row) in preview.head.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(display_cell).collect();
        println!("   {:>4} │ {}", idx + 1, cells.join(" │ "));
    }
    if preview.rows > preview.head.len() {
        println!("        … {} more", preview.rows - preview.head.len());
    }

    for skipped in &preview.skipped {
        println!(
            "   {}",
            format!(
                "⚠️  line {}: {} fields, expected {} (skipped)",
                skipped.line, skipped.fields, skipped.expected
            )
            .yellow()
        );
    }
    println!(
        "\n   Converting will produce: {}\n",
        converted_filename(&input.to_string_lossy())
    );

    Ok(())
}

fn display_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => {
            let flat = s.replace(['\r', '\n'], " ");
            if flat.chars().count() > PREVIEW_CELL_WIDTH {
                let cut: String = flat.chars().take(PREVIEW_CELL_WIDTH - 1).collect();
                format!("{}…", cut)
            } else {
                flat
            }
        }
    }
}

/// Execute the init-template command
pub fn init_template(path: PathBuf, force: bool) -> ConvertResult<()> {
    if path.exists() && !force {
        return Err(ConvertError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }

    write_starter_template(&path)?;

    println!("{}", "✅ Template created".bold().green());
    println!("   File:  {}", path.display());
    println!("   Sheet: {}\n", TARGET_SHEET);

    Ok(())
}
