//! Input loading and timestamp normalization

pub mod csv_loader;
pub mod timestamp;

// Re-export commonly used items
pub use csv_loader::{load_actuals, load_predictions, parse_outcome, DEFAULT_DECIMAL_ODDS};
pub use timestamp::{parse_utc, utc_day};
