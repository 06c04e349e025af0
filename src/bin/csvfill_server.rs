//! csvfill API server binary
//!
//! Browser upload page plus preview/convert endpoints.

use std::path::PathBuf;

use clap::Parser;
use csvfill::api::{run_api_server, server::DEFAULT_MAX_UPLOAD_BYTES, ApiConfig};
use csvfill::DEFAULT_TEMPLATE_PATH;

#[derive(Parser, Debug)]
#[command(name = "csvfill-server")]
#[command(version)]
#[command(about = "csvfill server - upload a CSV in the browser, download the filled template")]
#[command(long_about = r#"
csvfill server - CSV to Excel in the browser

Endpoints:
  - GET  /                 - Upload page
  - POST /api/v1/preview   - Decode a CSV (multipart field "file"), return the first rows
  - POST /api/v1/convert   - Write a CSV into the template, return the .xlsx
  - GET  /health           - Health check
  - GET  /version          - Server version info

The template must exist at startup; the server refuses to start otherwise.

Example usage:
  csvfill-server                                   # localhost:8080, ./template.xlsx
  csvfill-server --host 0.0.0.0 --port 3000 -t /srv/template.xlsx

  curl -F file=@data.csv http://localhost:8080/api/v1/convert -o data_converted.xlsx
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "CSVFILL_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "CSVFILL_PORT")]
    port: u16,

    /// Template workbook
    #[arg(short, long, default_value = DEFAULT_TEMPLATE_PATH, env = "CSVFILL_TEMPLATE")]
    template: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "CSVFILL_MAX_UPLOAD")]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        template_path: args.template,
        max_upload_bytes: args.max_upload_bytes,
    };

    run_api_server(config).await
}
