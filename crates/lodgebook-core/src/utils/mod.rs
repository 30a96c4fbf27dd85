//! Display formatting shared by front ends.

pub mod format;

pub use format::{format_currency, format_percent, format_timestamp, truncate_string};
