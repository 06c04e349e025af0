use clap::{Parser, Subcommand};
use colored::Colorize;
use csvfill::cli;
use csvfill::convert::DEFAULT_PREVIEW_ROWS;
use csvfill::error::ConvertResult;
use csvfill::DEFAULT_TEMPLATE_PATH;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "csvfill")]
#[command(about = "Write a CSV file into the 貼り付け用 sheet of an Excel template")]
#[command(long_about = "csvfill - CSV to Excel template converter

Decodes a CSV file (UTF-8, Shift_JIS, CP932, ISO-2022-JP or EUC-JP, tried
in that order), clears the '貼り付け用' sheet of the template and writes
every row into it starting at A1. All other sheets are left untouched.

COMMANDS:
  convert        - CSV to {name}_converted.xlsx
  preview        - Show the first rows and the detected encoding
  init-template  - Create a blank template containing the paste sheet

EXAMPLES:
  csvfill convert sales.csv                   # → sales_converted.xlsx
  csvfill convert sales.csv -o out.xlsx -t /srv/template.xlsx
  csvfill preview sales.csv -n 20
  csvfill init-template")]
#[command(version)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file into a copy of the template
    Convert {
        /// CSV file to convert
        input: PathBuf,

        /// Output path (default: {input stem}_converted.xlsx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Template workbook
        #[arg(short, long, default_value = DEFAULT_TEMPLATE_PATH, env = "CSVFILL_TEMPLATE")]
        template: PathBuf,
    },

    /// Decode a CSV file and print its first rows
    Preview {
        /// CSV file to inspect
        input: PathBuf,

        /// Number of rows to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        rows: usize,
    },

    /// Create a blank template workbook
    InitTemplate {
        /// Where to write the template
        #[arg(default_value = DEFAULT_TEMPLATE_PATH)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "csvfill=debug" } else { "csvfill=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> ConvertResult<()> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            template,
        } => cli::convert(input, output, template, cli.verbose),

        Commands::Preview { input, rows } => cli::preview(input, rows),

        Commands::InitTemplate { path, force } => cli::init_template(path, force),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "❌ Error:".bold().red(), e);
            eprintln!("   {}", e.remediation_hint().yellow());
            ExitCode::FAILURE
        }
    }
}
