// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

use loglens_core::export::{ExportFormat, ExportOptions};
use loglens_core::{FilterSpec, SourceSpec};

/// Filter form field edited by a `:level`, `:user`... command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Level,
    User,
    Service,
    Keyword,
    Since,
    Until,
}

impl FilterField {
    /// Write `value` into `filter`. An empty value clears the field.
    pub fn apply(self, filter: &mut FilterSpec, value: &str) {
        let time = (!value.is_empty()).then(|| value.to_string());
        match self {
            FilterField::Level => filter.level = value.to_uppercase(),
            FilterField::User => filter.user = value.to_string(),
            FilterField::Service => filter.service = value.to_string(),
            FilterField::Keyword => filter.keyword = value.to_string(),
            FilterField::Since => filter.start_time = time,
            FilterField::Until => filter.end_time = time,
        }
    }
}

/// A parsed, validated command ready to be executed by the app shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    // Toggle display of timestamps
    Timestamps,
    // Jump to the newest record
    Newest,
    Theme(String),
    Filter(FilterField, String),
    // Reset every filter field
    ClearFilter,
    Source(SourceSpec),
    Export {
        format: ExportFormat,
        options: ExportOptions,
    },
    // Delete the selected record
    Delete,
    // Restart all feeds
    Restart,
}

impl Command {
    /// Parse a raw command string (the text after the `:` prefix).
    ///
    /// Returns `Ok(cmd)` on success, `Err(message)` on failure. An empty
    /// string returns `Err("")` as a sentinel meaning "close without acting".
    pub fn parse(input: &str) -> Result<Command, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(String::new());
        }

        let (word, rest) = input
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((input, ""));

        let filter = |field: FilterField| -> Result<Command, String> {
            Ok(Command::Filter(field, rest.to_string()))
        };

        match word {
            "q" | "quit" => Ok(Command::Quit),
            "help" => Ok(Command::Help),
            "ts" | "timestamps" => Ok(Command::Timestamps),
            "tail" | "newest" => Ok(Command::Newest),
            "theme" => {
                if rest.is_empty() {
                    Err("usage: theme <default|gruvbox>".to_string())
                } else {
                    Ok(Command::Theme(rest.to_string()))
                }
            }
            "level" => filter(FilterField::Level),
            "user" => filter(FilterField::User),
            "service" => filter(FilterField::Service),
            "keyword" | "k" => filter(FilterField::Keyword),
            "since" => filter(FilterField::Since),
            "until" => filter(FilterField::Until),
            "clear" => Ok(Command::ClearFilter),
            "source" => SourceSpec::parse(rest).map(Command::Source),
            "export" => parse_export(rest),
            "delete" => Ok(Command::Delete),
            "restart" => Ok(Command::Restart),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// `export [csv|json] [patterns] [trends] [raw]`
fn parse_export(rest: &str) -> Result<Command, String> {
    let mut words = rest.split_whitespace();
    let format = match words.next() {
        None => ExportFormat::Csv,
        Some(w) => ExportFormat::parse(w).ok_or_else(|| format!("unknown export format: {w}"))?,
    };
    let mut options = ExportOptions::default();
    for word in words {
        match word {
            "patterns" => options.include_patterns = true,
            "trends" => options.include_trends = true,
            "raw" => options.include_raw_data = true,
            other => return Err(format!("unknown export option: {other}")),
        }
    }
    if format == ExportFormat::Csv && options != ExportOptions::default() {
        return Err("export options only apply to json".to_string());
    }
    Ok(Command::Export { format, options })
}
