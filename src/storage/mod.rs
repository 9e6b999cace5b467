pub mod flat_file;

pub use flat_file::{load_table, save_report, save_table};
