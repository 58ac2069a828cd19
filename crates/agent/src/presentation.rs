use lawlens_core::DomainSettings;
use lawlens_scheduler::ActivityFallback;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// The page-facing side of an agent: where settings become styling.
pub trait Presentation: Send + Sync {
    fn apply(&self, settings: &DomainSettings);
    /// Drop every modification (killswitch).
    fn remove_all(&self);
    fn notify(&self, message: &str);
    /// Synthetic user activity, used when a keep-alive ping fails.
    fn simulate_activity(&self);
    /// Accept a pending "join session" prompt if the page shows one.
    fn auto_join_session(&self) -> bool;
}

/// Lets the keep-alive service fall back to a presentation's activity signal.
pub struct PresentationActivity(pub Arc<dyn Presentation>);

impl ActivityFallback for PresentationActivity {
    fn simulate_activity(&self) {
        self.0.simulate_activity();
    }
}

pub fn render_style(settings: &DomainSettings) -> String {
    let mut rules = vec![
        format!("font-size: {}px", settings.font_size),
        format!("line-height: {:.1}", settings.line_height),
        format!("margin-left: {}px", settings.left_margin),
        format!("margin-right: {}px", settings.right_margin),
    ];
    if settings.sidebar_hidden {
        rules.push("sidebar: hidden".to_string());
    }
    if settings.focus_mode {
        rules.push("focus: on".to_string());
    }
    rules.join("; ")
}

/// Headless presentation: keeps the rendered style in memory and logs changes.
#[derive(Default)]
pub struct LogPresentation {
    current: Mutex<Option<String>>,
}

impl LogPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_style(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

impl Presentation for LogPresentation {
    fn apply(&self, settings: &DomainSettings) {
        let style = render_style(settings);
        debug!(style = %style, "Applying presentation");
        if let Ok(mut current) = self.current.lock() {
            *current = Some(style);
        }
    }

    fn remove_all(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        debug!("Removed all modifications");
    }

    fn notify(&self, message: &str) {
        info!("{}", message);
    }

    fn simulate_activity(&self) {
        debug!("Simulated user activity");
    }

    fn auto_join_session(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_style() {
        let mut s = DomainSettings::default();
        assert_eq!(
            render_style(&s),
            "font-size: 18px; line-height: 1.5; margin-left: 50px; margin-right: 50px"
        );
        s.sidebar_hidden = true;
        s.focus_mode = true;
        assert!(render_style(&s).ends_with("sidebar: hidden; focus: on"));
    }

    #[test]
    fn test_log_presentation_tracks_current_style() {
        let p = LogPresentation::new();
        assert!(p.current_style().is_none());
        p.apply(&DomainSettings::default());
        assert!(p.current_style().unwrap().starts_with("font-size: 18px"));
        p.remove_all();
        assert!(p.current_style().is_none());
        assert!(!p.auto_join_session());
    }
}
