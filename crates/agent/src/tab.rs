//! One agent per open page.
//!
//! The agent owns all of its state: settings, its view of the election and
//! the timers. Nothing is shared with other agents except the store.

use lawlens_core::{
    AgentCommand, AgentStatus, Clock, Config, DomainSettings, Error, Result, VERSION,
};
use lawlens_scheduler::{Election, KeepAlivePinger, KeepAliveService};
use lawlens_storage::{KvStore, NotesStore, SettingsStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::presentation::{Presentation, PresentationActivity};

pub struct CommandRequest {
    pub command: AgentCommand,
    pub reply: oneshot::Sender<AgentStatus>,
}

/// Controller-side handle for sending commands to a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<CommandRequest>,
}

impl AgentHandle {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<CommandRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn send(&self, command: AgentCommand) -> Result<AgentStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CommandRequest { command, reply })
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;
        rx.await.map_err(|e| Error::Channel(e.to_string()))
    }
}

pub struct AgentState {
    pub settings: DomainSettings,
    pub election: Election,
    ping_timer: Option<JoinHandle<()>>,
    auto_join: Option<JoinHandle<()>>,
    /// Pending debounced re-application of settings.
    apply_deadline: Option<Instant>,
}

pub struct TabAgent {
    domain: String,
    page_url: String,
    page_title: String,
    config: Config,
    settings_store: SettingsStore,
    notes: NotesStore,
    presentation: Arc<dyn Presentation>,
    keep_alive: Arc<KeepAliveService>,
    state: AgentState,
}

impl TabAgent {
    pub fn new(
        domain: impl Into<String>,
        config: Config,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        pinger: Arc<dyn KeepAlivePinger>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        let election = Election::new(store.clone(), clock, config.election.stale_threshold_ms);
        let keep_alive = Arc::new(KeepAliveService::new(
            pinger,
            Arc::new(PresentationActivity(presentation.clone())),
            config.keep_alive.interval(),
        ));
        let domain = domain.into();
        Self {
            page_url: format!("https://{}/", domain),
            page_title: domain.clone(),
            domain,
            config,
            settings_store: SettingsStore::new(store.clone()),
            notes: NotesStore::new(store),
            presentation,
            keep_alive,
            state: AgentState {
                settings: DomainSettings::default(),
                election,
                ping_timer: None,
                auto_join: None,
                apply_deadline: None,
            },
        }
    }

    /// The page this agent sits on; saved quotations cite it.
    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.page_url = url.into();
        self.page_title = title.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            domain: self.domain.clone(),
            settings: self.state.settings.clone(),
            owner_id: self.state.election.owner_id().to_string(),
            is_owner: self.state.election.is_owner(),
            keep_alive_running: self.state.ping_timer.is_some(),
            version: VERSION.to_string(),
        }
    }

    /// Load settings, join the election and bring the page up to date.
    pub async fn start(&mut self) {
        self.state.settings = self.settings_store.load(&self.domain).await;
        self.state.election.claim_or_verify_ownership().await;
        self.apply_all();
        self.reconcile_keep_alive();
        self.schedule_auto_join();
        info!(
            domain = %self.domain,
            owner_id = %self.state.election.owner_id(),
            is_owner = self.state.election.is_owner(),
            killswitch = self.state.settings.killswitch,
            "Tab agent started"
        );
    }

    fn apply_all(&self) {
        if self.state.settings.killswitch {
            return;
        }
        self.presentation.apply(&self.state.settings);
    }

    async fn persist(&self) {
        self.settings_store
            .save_logged(&self.domain, &self.state.settings)
            .await;
    }

    /// Start or stop the ping timer so it runs exactly when this agent is the
    /// owner, keep-alive is on and the killswitch is off. A running timer is
    /// left alone so periodic checks don't push its next ping back.
    fn reconcile_keep_alive(&mut self) {
        let s = &self.state.settings;
        let wanted = !s.killswitch && s.keep_alive && self.state.election.is_owner();
        match (wanted, self.state.ping_timer.is_some()) {
            (true, false) => {
                self.state.ping_timer = Some(self.keep_alive.clone().spawn());
                info!(
                    interval_secs = self.keep_alive.interval().as_secs(),
                    "Keep-alive started (master tab)"
                );
            }
            (false, true) => self.stop_keep_alive(),
            _ => {}
        }
    }

    fn stop_keep_alive(&mut self) {
        if let Some(handle) = self.state.ping_timer.take() {
            handle.abort();
            info!("Keep-alive stopped");
        }
    }

    fn schedule_auto_join(&mut self) {
        let delays = self.config.agent.auto_join_delays_ms.clone();
        if self.state.settings.killswitch || delays.is_empty() {
            return;
        }
        let presentation = self.presentation.clone();
        let started = Instant::now();
        self.state.auto_join = Some(tokio::spawn(async move {
            for delay_ms in delays {
                tokio::time::sleep_until(started + Duration::from_millis(delay_ms)).await;
                if presentation.auto_join_session() {
                    presentation.notify("Auto-joined session");
                }
            }
        }));
    }

    fn schedule_reapply(&mut self) {
        if self.state.settings.killswitch {
            return;
        }
        let debounce = Duration::from_millis(self.config.agent.debounce_ms);
        self.state.apply_deadline = Some(Instant::now() + debounce);
    }

    fn adjust(&mut self, command: AgentCommand) {
        let s = &mut self.state.settings;
        match command {
            AgentCommand::IncreaseFontSize => s.increase_font_size(),
            AgentCommand::DecreaseFontSize => s.decrease_font_size(),
            AgentCommand::ResetFontSize => s.reset_font_size(),
            AgentCommand::IncreaseLineHeight => s.increase_line_height(),
            AgentCommand::DecreaseLineHeight => s.decrease_line_height(),
            AgentCommand::ResetLineHeight => s.reset_line_height(),
            AgentCommand::IncreaseMargins => s.increase_margins(),
            AgentCommand::DecreaseMargins => s.decrease_margins(),
            AgentCommand::MoveLeft => s.move_left(),
            AgentCommand::MoveRight => s.move_right(),
            AgentCommand::ResetMargins => s.reset_margins(),
            AgentCommand::ToggleSidebar => s.sidebar_hidden = !s.sidebar_hidden,
            AgentCommand::ToggleFocusMode => s.focus_mode = !s.focus_mode,
            AgentCommand::ToggleKeepAlive
            | AgentCommand::ToggleKillswitch
            | AgentCommand::GetStatus
            | AgentCommand::ContentChanged
            | AgentCommand::SaveQuotation { .. } => {}
        }
    }

    async fn save_quotation(&self, text: &str) {
        match self.notes.capture(text, &self.page_title, &self.page_url).await {
            Ok(_) => self.presentation.notify("Saved to notes"),
            Err(e) => {
                warn!(domain = %self.domain, error = %e, "Quotation not saved");
                self.presentation.notify(&format!("Not saved: {}", e));
            }
        }
    }

    async fn toggle_keep_alive(&mut self) {
        self.state.settings.keep_alive = !self.state.settings.keep_alive;
        // A freshly enabled agent may win ownership if nobody else holds it.
        self.state.election.claim_or_verify_ownership().await;
        if self.state.settings.killswitch {
            info!("Keep-alive blocked by killswitch");
        }
        self.reconcile_keep_alive();
        self.persist().await;

        let label = self.status().keep_alive_label();
        self.presentation.notify(&format!("Keep Session Alive: {}", label));
    }

    async fn toggle_killswitch(&mut self) {
        self.state.settings.killswitch = !self.state.settings.killswitch;
        self.persist().await;

        if self.state.settings.killswitch {
            self.stop_keep_alive();
            self.state.apply_deadline = None;
            self.presentation.remove_all();
            self.presentation.notify("All modifications disabled");
        } else {
            self.apply_all();
            self.reconcile_keep_alive();
            self.presentation.notify("All modifications enabled");
        }
    }

    pub async fn handle_command(&mut self, command: AgentCommand) -> AgentStatus {
        debug!(domain = %self.domain, command = ?command, "Handling command");
        match command {
            AgentCommand::ContentChanged => self.schedule_reapply(),
            AgentCommand::ToggleKeepAlive => self.toggle_keep_alive().await,
            AgentCommand::ToggleKillswitch => self.toggle_killswitch().await,
            AgentCommand::SaveQuotation { text } => self.save_quotation(&text).await,
            other if other.mutates_settings() => {
                self.adjust(other);
                self.persist().await;
                self.apply_all();
            }
            _ => {}
        }
        self.status()
    }

    pub async fn on_heartbeat(&mut self) {
        self.state.election.heartbeat().await;
    }

    pub async fn on_staleness_check(&mut self) {
        self.state.election.check_staleness().await;
        self.reconcile_keep_alive();
    }

    /// Clean teardown: timers first, then hand the election back.
    pub async fn shutdown(&mut self) {
        self.stop_keep_alive();
        if let Some(handle) = self.state.auto_join.take() {
            handle.abort();
        }
        self.state.election.release_ownership().await;
        info!(domain = %self.domain, "Tab agent stopped");
    }

    pub async fn run_loop(
        &mut self,
        mut commands: mpsc::Receiver<CommandRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        self.start().await;

        let heartbeat_every = self.config.election.heartbeat_interval();
        let check_every = self.config.election.staleness_check_interval();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + heartbeat_every, heartbeat_every);
        let mut staleness = tokio::time::interval_at(Instant::now() + check_every, check_every);

        loop {
            let apply_deadline = self.state.apply_deadline;
            tokio::select! {
                _ = shutdown.recv() => {
                    break;
                }
                request = commands.recv() => {
                    match request {
                        Some(request) => {
                            let status = self.handle_command(request.command).await;
                            let _ = request.reply.send(status);
                        }
                        None => break, // controller gone
                    }
                }
                _ = heartbeat.tick() => {
                    self.on_heartbeat().await;
                }
                _ = staleness.tick() => {
                    self.on_staleness_check().await;
                }
                _ = async {
                    match apply_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.state.apply_deadline = None;
                    self.apply_all();
                }
            }
        }

        self.shutdown().await;
    }
}

impl Drop for TabAgent {
    /// Abrupt teardown: timers die with the agent, ownership is left to go stale.
    fn drop(&mut self) {
        if let Some(handle) = self.state.ping_timer.take() {
            handle.abort();
        }
        if let Some(handle) = self.state.auto_join.take() {
            handle.abort();
        }
    }
}
