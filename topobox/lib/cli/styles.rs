use std::{fmt::Write, sync::LazyLock};

use clap::builder::styling::{AnsiColor, Effects, Style, Styles};

use crate::{models::SandboxStatus, utils::term};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Whether stdout is an ANSI-capable interactive terminal.
static IS_ANSI_TERMINAL: LazyLock<bool> = LazyLock::new(term::is_ansi_interactive_terminal);

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns a `Styles` object with the default styles for the CLI.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// Styles a sandbox status: green when active, red when in error, plain otherwise.
pub fn status(status: SandboxStatus) -> String {
    match status {
        SandboxStatus::Active => status.to_string().valid(),
        SandboxStatus::Error => status.to_string().error(),
        _ => status.to_string(),
    }
}

fn apply_style(text: String, style: &Style, enabled: bool) -> String {
    if !enabled {
        return text;
    }

    let mut styled = String::with_capacity(text.len() + 20);
    let _ = write!(styled, "{}", style);
    styled.push_str(&text);
    let _ = write!(styled, "{}", style.render_reset());
    styled
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A trait for applying Styles defined in [`styles`] to text.
///
/// Text is left untouched when stdout is not an ANSI-capable terminal.
pub trait AnsiStyles {
    /// Apply header style to text
    fn header(&self) -> String;

    /// Apply literal style to text
    fn literal(&self) -> String;

    /// Apply placeholder style to text
    fn placeholder(&self) -> String;

    /// Apply error style to text
    fn error(&self) -> String;

    /// Apply valid style to text
    fn valid(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl AnsiStyles for String {
    fn header(&self) -> String {
        apply_style(self.clone(), styles().get_header(), *IS_ANSI_TERMINAL)
    }

    fn literal(&self) -> String {
        apply_style(self.clone(), styles().get_literal(), *IS_ANSI_TERMINAL)
    }

    fn placeholder(&self) -> String {
        apply_style(self.clone(), styles().get_placeholder(), *IS_ANSI_TERMINAL)
    }

    fn error(&self) -> String {
        apply_style(self.clone(), styles().get_error(), *IS_ANSI_TERMINAL)
    }

    fn valid(&self) -> String {
        apply_style(self.clone(), styles().get_valid(), *IS_ANSI_TERMINAL)
    }
}

impl AnsiStyles for &str {
    fn header(&self) -> String {
        self.to_string().header()
    }

    fn literal(&self) -> String {
        self.to_string().literal()
    }

    fn placeholder(&self) -> String {
        self.to_string().placeholder()
    }

    fn error(&self) -> String {
        self.to_string().error()
    }

    fn valid(&self) -> String {
        self.to_string().valid()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
