//! Excel template handling
//!
//! - Template: load an .xlsx package and track part edits
//! - Transcriber: clear/create the target sheet and write a table into it
//! - Starter: generate a blank template

pub mod cell_ref;
mod sheet;
mod starter;
mod template;
mod transcriber;
mod xml;

pub use sheet::used_range;
pub use starter::{starter_template, write_starter_template};
pub use template::{SheetEntry, TemplateWorkbook};
pub use transcriber::{TranscribeReport, Transcriber};
