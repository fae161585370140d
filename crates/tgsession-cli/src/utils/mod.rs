//! Utility functions for string formatting and operator input parsing.

pub mod format;

pub use format::{
    format_optional, format_size, format_timestamp, is_yes, parse_selection, truncate_string,
};
