use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

pub const DEFAULT_EXPORT_FILE: &str = "liste_de_beneficiaires_de_la_pension_alimentaire.pdf";

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected")]
    Authentication,

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Export failed: {0}")]
    Export(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Sort,
    Filter,
    FilterColumn,
    ClearFilters,
    Export,
    ToggleExportExpired,
    Refresh,
    Enter,
    Exit,
    Logout,
    Help,
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmdMode {
    Username,
    Password,
    FilterTable,
    FilterColumn,
}

impl CmdMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CmdMode::Username => "User: ",
            CmdMode::Password => "Password: ",
            CmdMode::FilterTable => "Filter: ",
            CmdMode::FilterColumn => "Column filter: ",
        }
    }
}

pub const HELP_TEXT: &str = "\
Navigation
  arrows / hjkl     move the selection
  n / PageDown      next page
  p / PageUp        previous page
  g / G             first / last page
  Enter             show the full record
  Esc               close record or popup

Table
  s                 sort by selected column (again to reverse)
  /                 filter all columns
  f                 filter the selected column
  c                 clear all filters
  e                 export the filtered rows to PDF
  x                 include / exclude expired rows in exports
  r                 fetch documents again

Session
  L                 log out
  q                 quit
  ?                 this help";

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct BoardConfig {
    pub event_poll_time: u64,
    #[setters(into)]
    pub relay_url: String,
    pub page_size: usize,
    pub export_path: PathBuf,
    pub expiry_fields: Vec<String>,
    pub include_expired: bool,
    pub max_column_width: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            relay_url: "http://localhost:5000/".to_string(),
            page_size: 5,
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            expiry_fields: vec![
                "date-fin".to_string(),
                "expiry_date".to_string(),
                "fin".to_string(),
            ],
            include_expired: true,
            max_column_width: 32,
        }
    }
}
