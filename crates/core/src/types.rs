use serde::{Deserialize, Serialize};

/// Shared record naming the agent that currently owns keep-alive duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRecord {
    #[serde(alias = "tabId")]
    pub owner_id: String,
    /// Wall-clock milliseconds of the owner's latest heartbeat write.
    pub last_heartbeat: i64,
}

impl ElectionRecord {
    pub fn new(owner_id: impl Into<String>, last_heartbeat: i64) -> Self {
        Self {
            owner_id: owner_id.into(),
            last_heartbeat,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_heartbeat
    }

    /// Strictly older than the threshold. A record exactly at the threshold is still fresh.
    pub fn is_stale(&self, now_ms: i64, threshold_ms: i64) -> bool {
        self.age_ms(now_ms) > threshold_ms
    }
}

pub const DEFAULT_FONT_SIZE: u32 = 18;
pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 36;
pub const DEFAULT_LINE_HEIGHT: f64 = 1.5;
pub const MIN_LINE_HEIGHT: f64 = 1.0;
pub const MAX_LINE_HEIGHT: f64 = 3.0;
pub const LINE_HEIGHT_STEP: f64 = 0.1;
pub const DEFAULT_MARGIN: u32 = 50;
pub const MAX_MARGIN: u32 = 300;
pub const MARGIN_STEP: u32 = 10;

/// Presentation settings, persisted separately for every target domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSettings {
    pub font_size: u32,
    pub line_height: f64,
    pub left_margin: u32,
    pub right_margin: u32,
    pub sidebar_hidden: bool,
    pub focus_mode: bool,
    pub keep_alive: bool,
    pub killswitch: bool,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            line_height: DEFAULT_LINE_HEIGHT,
            left_margin: DEFAULT_MARGIN,
            right_margin: DEFAULT_MARGIN,
            sidebar_hidden: false,
            focus_mode: false,
            keep_alive: false,
            killswitch: false,
        }
    }
}

fn normalize_line_height(value: f64) -> f64 {
    ((value * 10.0).round() / 10.0).clamp(MIN_LINE_HEIGHT, MAX_LINE_HEIGHT)
}

impl DomainSettings {
    pub fn increase_font_size(&mut self) {
        self.font_size = (self.font_size + 1).min(MAX_FONT_SIZE);
    }

    pub fn decrease_font_size(&mut self) {
        self.font_size = self.font_size.saturating_sub(1).max(MIN_FONT_SIZE);
    }

    pub fn reset_font_size(&mut self) {
        self.font_size = DEFAULT_FONT_SIZE;
    }

    pub fn increase_line_height(&mut self) {
        self.line_height = normalize_line_height(self.line_height + LINE_HEIGHT_STEP);
    }

    pub fn decrease_line_height(&mut self) {
        self.line_height = normalize_line_height(self.line_height - LINE_HEIGHT_STEP);
    }

    pub fn reset_line_height(&mut self) {
        self.line_height = DEFAULT_LINE_HEIGHT;
    }

    pub fn increase_margins(&mut self) {
        self.left_margin = (self.left_margin + MARGIN_STEP).min(MAX_MARGIN);
        self.right_margin = (self.right_margin + MARGIN_STEP).min(MAX_MARGIN);
    }

    pub fn decrease_margins(&mut self) {
        self.left_margin = self.left_margin.saturating_sub(MARGIN_STEP);
        self.right_margin = self.right_margin.saturating_sub(MARGIN_STEP);
    }

    /// Shift the text column left: narrower left margin, wider right margin.
    pub fn move_left(&mut self) {
        self.left_margin = self.left_margin.saturating_sub(MARGIN_STEP);
        self.right_margin = (self.right_margin + MARGIN_STEP).min(MAX_MARGIN);
    }

    pub fn move_right(&mut self) {
        self.left_margin = (self.left_margin + MARGIN_STEP).min(MAX_MARGIN);
        self.right_margin = self.right_margin.saturating_sub(MARGIN_STEP);
    }

    pub fn reset_margins(&mut self) {
        self.left_margin = DEFAULT_MARGIN;
        self.right_margin = DEFAULT_MARGIN;
    }
}

/// A captured quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub quotation: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub url: String,
    /// RFC 3339.
    pub timestamp: String,
}
