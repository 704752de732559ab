//! Colour theme for the loglens TUI.
//!
//! Themes are defined as TOML files embedded via [`include_str!`] so the
//! application works without any files on disk.
//!
//! Service names are hashed to a stable index into the palette so the same
//! service always gets the same colour within a session.

use config::{Config, File, FileFormat};
use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

const DEFAULT_THEME_SRC: &str = include_str!("themes/default.toml");
const GRUVBOX_DARK_THEME_SRC: &str = include_str!("themes/gruvbox_dark.toml");

// ---------------------------------------------------------------------------
// Raw (serde) types: mirror the TOML structure
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawStyle {
    fg: Option<String>,
    bg: Option<String>,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    dim: bool,
    #[serde(default)]
    italic: bool,
}

impl RawStyle {
    fn into_style(self) -> Style {
        let mut style = Style::default();
        if let Some(c) = self.fg.as_deref().and_then(parse_color) {
            style = style.fg(c);
        }
        if let Some(c) = self.bg.as_deref().and_then(parse_color) {
            style = style.bg(c);
        }
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.dim {
            style = style.add_modifier(Modifier::DIM);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }
}

#[derive(Debug, Deserialize)]
struct RawLevels {
    debug: RawStyle,
    info: RawStyle,
    warning: RawStyle,
    error: RawStyle,
    critical: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawBorders {
    focused: RawStyle,
    unfocused: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    error: RawStyle,
    notice: RawStyle,
    waiting: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawServices {
    palette: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    levels: RawLevels,
    borders: RawBorders,
    status: RawStatus,
    services: RawServices,
}

// ---------------------------------------------------------------------------
// Public Theme type
// ---------------------------------------------------------------------------

/// Application colour theme. All styles are resolved at load time.
#[derive(Debug, Clone)]
pub struct Theme {
    pub level_debug: Style,
    pub level_info: Style,
    pub level_warning: Style,
    pub level_error: Style,
    pub level_critical: Style,

    pub border_focused: Style,
    pub border_unfocused: Style,

    /// Feed error badges and failed-action messages.
    pub status_error: Style,
    /// Successful-action messages.
    pub status_notice: Style,
    /// "Waiting for ..." placeholders.
    pub status_waiting: Style,

    service_palette: Vec<Color>,
}

impl Theme {
    /// Load and parse the embedded default theme.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    pub fn load_default() -> Self {
        Self::from_toml_str(DEFAULT_THEME_SRC).expect("embedded default theme must be valid TOML")
    }

    /// Load and parse the embedded Gruvbox Dark theme.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    pub fn load_gruvbox_dark() -> Self {
        Self::from_toml_str(GRUVBOX_DARK_THEME_SRC)
            .expect("embedded gruvbox dark theme must be valid TOML")
    }

    /// Theme by name; unknown names fall back to the default.
    pub fn by_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "gruvbox" | "gruvbox_dark" | "gruvbox-dark" => Self::load_gruvbox_dark(),
            _ => Self::load_default(),
        }
    }

    /// Parse a theme from a TOML string. Unknown keys are ignored.
    pub fn from_toml_str(src: &str) -> anyhow::Result<Self> {
        let raw: RawTheme = Config::builder()
            .add_source(File::from_str(src, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            level_debug: raw.levels.debug.into_style(),
            level_info: raw.levels.info.into_style(),
            level_warning: raw.levels.warning.into_style(),
            level_error: raw.levels.error.into_style(),
            level_critical: raw.levels.critical.into_style(),
            border_focused: raw.borders.focused.into_style(),
            border_unfocused: raw.borders.unfocused.into_style(),
            status_error: raw.status.error.into_style(),
            status_notice: raw.status.notice.into_style(),
            status_waiting: raw.status.waiting.into_style(),
            service_palette: raw
                .services
                .palette
                .iter()
                .filter_map(|s| parse_color(s))
                .collect(),
        })
    }

    /// Style for a display level as produced by the normalizer (uppercase).
    /// Unrecognised levels, including `UNKNOWN`, get the default style.
    pub fn level_style(&self, level: &str) -> Style {
        match level {
            "TRACE" | "DEBUG" => self.level_debug,
            "INFO" => self.level_info,
            "WARN" | "WARNING" => self.level_warning,
            "ERROR" => self.level_error,
            "CRITICAL" | "FATAL" => self.level_critical,
            _ => Style::default(),
        }
    }

    pub fn border(&self, focused: bool) -> Style {
        if focused {
            self.border_focused
        } else {
            self.border_unfocused
        }
    }

    /// Stable colour for a service name.
    pub fn service_style(&self, service: &str) -> Style {
        if self.service_palette.is_empty() {
            return Style::default();
        }
        let idx = stable_hash(service) % self.service_palette.len();
        Style::default().fg(self.service_palette[idx])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// djb2-style hash, stable across Rust versions and process restarts.
fn stable_hash(s: &str) -> usize {
    s.bytes().fold(5381usize, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(b as usize)
    })
}

/// Parse a colour name into a ratatui [`Color`].
///
/// Accepts named terminal colours (case-insensitive), `#rrggbb` and
/// `indexed:N`.
fn parse_color(s: &str) -> Option<Color> {
    match s.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "gray" | "grey" => Some(Color::Gray),
        "dark_gray" | "darkgray" | "dark_grey" | "darkgrey" => Some(Color::DarkGray),
        "light_red" => Some(Color::LightRed),
        "light_green" => Some(Color::LightGreen),
        "light_yellow" => Some(Color::LightYellow),
        "light_blue" => Some(Color::LightBlue),
        "light_magenta" => Some(Color::LightMagenta),
        "light_cyan" => Some(Color::LightCyan),
        "white" => Some(Color::White),
        s if s.starts_with('#') && s.len() == 7 => {
            let r = u8::from_str_radix(&s[1..3], 16).ok()?;
            let g = u8::from_str_radix(&s[3..5], 16).ok()?;
            let b = u8::from_str_radix(&s[5..7], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        s if s.starts_with("indexed:") => {
            let n: u8 = s["indexed:".len()..].parse().ok()?;
            Some(Color::Indexed(n))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
