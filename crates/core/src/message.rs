use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DomainSettings;

/// Request sent from a controller surface to a tab agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AgentCommand {
    IncreaseFontSize,
    DecreaseFontSize,
    ResetFontSize,
    IncreaseLineHeight,
    DecreaseLineHeight,
    ResetLineHeight,
    IncreaseMargins,
    DecreaseMargins,
    MoveLeft,
    MoveRight,
    ResetMargins,
    ToggleSidebar,
    ToggleFocusMode,
    ToggleKeepAlive,
    ToggleKillswitch,
    GetStatus,
    /// Page content changed; settings are re-applied after a debounce.
    ContentChanged,
    /// Save selected text to the shared notes, cited with the agent's page.
    SaveQuotation { text: String },
}

impl AgentCommand {
    /// Accepts either a JSON object (`{"action":"moveLeft"}`) or a bare action name.
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::Validation("empty command".to_string()));
        }
        if line.starts_with('{') {
            return Ok(serde_json::from_str(line)?);
        }
        let value = serde_json::json!({ "action": line });
        serde_json::from_value(value)
            .map_err(|_| Error::Validation(format!("unknown action '{}'", line)))
    }

    /// Whether the command is a plain presentation adjustment (font, spacing,
    /// margins, sidebar, focus). Toggles with side effects are not.
    pub fn mutates_settings(&self) -> bool {
        !matches!(
            self,
            AgentCommand::GetStatus
                | AgentCommand::ContentChanged
                | AgentCommand::ToggleKeepAlive
                | AgentCommand::ToggleKillswitch
                | AgentCommand::SaveQuotation { .. }
        )
    }
}

/// Snapshot returned for every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub domain: String,
    #[serde(flatten)]
    pub settings: DomainSettings,
    pub owner_id: String,
    pub is_owner: bool,
    pub keep_alive_running: bool,
    pub version: String,
}

impl AgentStatus {
    /// Human-readable keep-alive state, e.g. `ON (delegated to other tab)`.
    pub fn keep_alive_label(&self) -> String {
        match (self.settings.keep_alive, self.is_owner) {
            (false, _) => "OFF".to_string(),
            (true, true) => "ON".to_string(),
            (true, false) => "ON (delegated to other tab)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_and_bare_commands() {
        assert_eq!(
            AgentCommand::parse_line(r#"{"action":"toggleKeepAlive"}"#).unwrap(),
            AgentCommand::ToggleKeepAlive
        );
        assert_eq!(AgentCommand::parse_line("  moveLeft \n").unwrap(), AgentCommand::MoveLeft);
        assert_eq!(AgentCommand::parse_line("getStatus").unwrap(), AgentCommand::GetStatus);
    }

    #[test]
    fn test_parse_save_quotation() {
        assert_eq!(
            AgentCommand::parse_line(r#"{"action":"saveQuotation","text":"held: affirmed"}"#).unwrap(),
            AgentCommand::SaveQuotation {
                text: "held: affirmed".to_string()
            }
        );
        // Needs its text, so the bare form is rejected.
        assert!(AgentCommand::parse_line("saveQuotation").is_err());
    }

    #[test]
    fn test_mutates_settings_only_for_adjustments() {
        assert!(AgentCommand::IncreaseFontSize.mutates_settings());
        assert!(AgentCommand::ToggleSidebar.mutates_settings());
        assert!(!AgentCommand::ToggleKeepAlive.mutates_settings());
        assert!(!AgentCommand::ToggleKillswitch.mutates_settings());
        assert!(!AgentCommand::GetStatus.mutates_settings());
        assert!(!AgentCommand::ContentChanged.mutates_settings());
        assert!(!AgentCommand::SaveQuotation { text: "x".into() }.mutates_settings());
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        assert!(AgentCommand::parse_line("reloadExtension").is_err());
        assert!(AgentCommand::parse_line(r#"{"action":"nope"}"#).is_err());
        assert!(AgentCommand::parse_line("   ").is_err());
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = AgentStatus {
            domain: "example.com".to_string(),
            settings: DomainSettings::default(),
            owner_id: "abc".to_string(),
            is_owner: false,
            keep_alive_running: false,
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["fontSize"], 18);
        assert_eq!(json["isOwner"], false);
        assert_eq!(json["keepAliveRunning"], false);
    }

    #[test]
    fn test_keep_alive_label() {
        let mut status = AgentStatus {
            domain: String::new(),
            settings: DomainSettings::default(),
            owner_id: String::new(),
            is_owner: false,
            keep_alive_running: false,
            version: String::new(),
        };
        assert_eq!(status.keep_alive_label(), "OFF");
        status.settings.keep_alive = true;
        assert_eq!(status.keep_alive_label(), "ON (delegated to other tab)");
        status.is_owner = true;
        assert_eq!(status.keep_alive_label(), "ON");
    }
}
