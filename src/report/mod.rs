//! Report assembly and export.

pub mod generator;
pub mod layout;
pub mod xlsx;

pub use generator::{generate_json_report, generate_markdown_report};
pub use layout::{assemble, LayoutOptions};
pub use xlsx::write_workbook;
