use std::fmt::Display;

use crossterm::style::{style, Color, StyledContent, Stylize};

// Color palette
pub const PRIMARY: Color = Color::Rgb { r: 64, g: 128, b: 192 };
pub const SECONDARY: Color = Color::Rgb { r: 96, g: 160, b: 96 };
pub const ACCENT: Color = Color::Rgb { r: 192, g: 160, b: 64 };
pub const ERROR: Color = Color::Rgb { r: 192, g: 64, b: 64 };
pub const MUTED: Color = Color::Rgb { r: 128, g: 128, b: 128 };

// Styles
pub fn title<D: Display>(text: D) -> StyledContent<D> {
    style(text).with(PRIMARY).bold()
}

pub fn muted<D: Display>(text: D) -> StyledContent<D> {
    style(text).with(MUTED)
}

pub fn highlight<D: Display>(text: D) -> StyledContent<D> {
    style(text).with(ACCENT)
}

pub fn success<D: Display>(text: D) -> StyledContent<D> {
    style(text).with(SECONDARY)
}

pub fn error<D: Display>(text: D) -> StyledContent<D> {
    style(text).with(ERROR).bold()
}
