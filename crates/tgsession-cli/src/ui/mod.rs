//! Terminal output: styled messages, menus and session listings.

pub mod render;
pub mod styles;
