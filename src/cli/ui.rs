use chrono::Local;
use console::style;

use crate::core::display::Display;
use crate::core::rate::FAILURE_TEXT;

/// Defines different styles for text elements.
pub enum StyleType {
    Rate,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Rate => style(text).green().bold(),
        StyleType::Error => style(text).red().bold(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Styles panel text: the failure marker in red, a rate in green.
pub fn render_panel_text(text: &str) -> String {
    if text == FAILURE_TEXT {
        style_text(text, StyleType::Error)
    } else {
        style_text(text, StyleType::Rate)
    }
}

/// Prints each update as a timestamped line on stdout.
#[derive(Debug, Default)]
pub struct TerminalDisplay;

impl Display for TerminalDisplay {
    fn set_text(&self, text: &str) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        println!(
            "{} {}",
            style_text(&timestamp, StyleType::Subtle),
            render_panel_text(text)
        );
    }
}
