//! File plumbing around the core pipeline.

mod discovery;
mod loader;
mod writer;

pub use discovery::find_latest_file;
pub use loader::{load_csv, rename_columns};
pub use writer::{DATETIME_FORMAT, output_filename, save_csv, timestamped_output_path};
