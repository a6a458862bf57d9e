//! Transient status notifications ("alerts") shown to a client session.
//!
//! An alert is queued with [`AlertBoard::push`] and becomes eligible for
//! automatic dismissal the first time it is rendered. Dismissal, manual or
//! automatic, fades the alert out and then removes it. States are computed
//! from instants on demand, so no timer task is needed per alert and both
//! triggers can fire in any order without racing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Success => "success",
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Visible,
    Fading,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTimings {
    /// Delay between first render and the start of the automatic fade.
    pub auto_dismiss: Duration,
    pub manual_fade: Duration,
    pub auto_fade: Duration,
}

impl Default for AlertTimings {
    fn default() -> Self {
        Self {
            auto_dismiss: Duration::from_millis(5000),
            manual_fade: Duration::from_millis(200),
            auto_fade: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertView {
    pub id: Uuid,
    pub level: AlertLevel,
    pub message: String,
    pub state: AlertState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Alert {
    id: Uuid,
    level: AlertLevel,
    message: String,
    created_at: DateTime<Utc>,
    rendered_at: Option<Instant>,
    dismissed_at: Option<Instant>,
}

impl Alert {
    /// Fade window `(start, end)` of whichever trigger fires first.
    fn fade_window(&self, timings: &AlertTimings) -> Option<(Instant, Instant)> {
        let manual = self
            .dismissed_at
            .map(|at| (at, at + timings.manual_fade));
        let auto = self.rendered_at.map(|at| {
            let start = at + timings.auto_dismiss;
            (start, start + timings.auto_fade)
        });

        match (manual, auto) {
            (Some(m), Some(a)) => Some(if m.0 <= a.0 { m } else { a }),
            (m, a) => m.or(a),
        }
    }

    fn state_at(&self, now: Instant, timings: &AlertTimings) -> AlertState {
        match self.fade_window(timings) {
            None => AlertState::Visible,
            Some((start, _)) if now < start => AlertState::Visible,
            Some((_, end)) if now < end => AlertState::Fading,
            Some(_) => AlertState::Removed,
        }
    }

    fn view(&self, state: AlertState) -> AlertView {
        AlertView {
            id: self.id,
            level: self.level,
            message: self.message.clone(),
            state,
            created_at: self.created_at,
        }
    }
}

/// Alerts belonging to one client session.
#[derive(Debug, Clone)]
pub struct AlertBoard {
    alerts: Vec<Alert>,
    timings: AlertTimings,
    last_touched: Instant,
}

impl Default for AlertBoard {
    fn default() -> Self {
        Self::new(AlertTimings::default())
    }
}

impl AlertBoard {
    pub fn new(timings: AlertTimings) -> Self {
        Self {
            alerts: Vec::new(),
            timings,
            last_touched: Instant::now(),
        }
    }

    pub fn push(&mut self, level: AlertLevel, message: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.alerts.push(Alert {
            id,
            level,
            message: message.into(),
            created_at: Utc::now(),
            rendered_at: None,
            dismissed_at: None,
        });
        self.last_touched = Instant::now();
        id
    }

    /// Returns the alerts still on screen and starts the auto-dismiss clock
    /// of every alert rendered for the first time.
    pub fn render(&mut self) -> Vec<AlertView> {
        let now = Instant::now();
        self.last_touched = now;

        let timings = self.timings;
        self.alerts
            .iter_mut()
            .filter_map(|alert| {
                if alert.rendered_at.is_none() {
                    alert.rendered_at = Some(now);
                }
                match alert.state_at(now, &timings) {
                    AlertState::Removed => None,
                    state => Some(alert.view(state)),
                }
            })
            .collect()
    }

    /// Starts the manual fade. Returns `false` when the alert is unknown,
    /// already fading or already removed; nothing changes in that case.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let now = Instant::now();
        self.last_touched = now;

        let timings = self.timings;
        match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) if alert.state_at(now, &timings) == AlertState::Visible => {
                alert.dismissed_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Unknown ids report `Removed`.
    pub fn state(&self, id: Uuid) -> AlertState {
        let now = Instant::now();
        self.alerts
            .iter()
            .find(|alert| alert.id == id)
            .map(|alert| alert.state_at(now, &self.timings))
            .unwrap_or(AlertState::Removed)
    }

    /// Drops alerts whose fade has completed and returns how many were dropped.
    pub fn purge(&mut self) -> usize {
        let now = Instant::now();
        let timings = self.timings;
        let before = self.alerts.len();
        self.alerts
            .retain(|alert| alert.state_at(now, &timings) != AlertState::Removed);
        before - self.alerts.len()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.duration_since(self.last_touched)
    }
}

/// Alert boards for every client session, keyed by an opaque session key.
#[derive(Debug)]
pub struct AlertCenter {
    boards: RwLock<HashMap<String, AlertBoard>>,
    timings: AlertTimings,
    idle_ttl: Duration,
}

impl Default for AlertCenter {
    fn default() -> Self {
        Self::new(AlertTimings::default())
    }
}

impl AlertCenter {
    pub fn new(timings: AlertTimings) -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            timings,
            idle_ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn timings(&self) -> AlertTimings {
        self.timings
    }

    pub async fn push(&self, key: &str, level: AlertLevel, message: impl Into<String>) -> Uuid {
        let mut boards = self.boards.write().await;
        boards
            .entry(key.to_string())
            .or_insert_with(|| AlertBoard::new(self.timings))
            .push(level, message)
    }

    pub async fn success(&self, key: &str, message: impl Into<String>) -> Uuid {
        self.push(key, AlertLevel::Success, message).await
    }

    pub async fn info(&self, key: &str, message: impl Into<String>) -> Uuid {
        self.push(key, AlertLevel::Info, message).await
    }

    pub async fn warning(&self, key: &str, message: impl Into<String>) -> Uuid {
        self.push(key, AlertLevel::Warning, message).await
    }

    pub async fn error(&self, key: &str, message: impl Into<String>) -> Uuid {
        self.push(key, AlertLevel::Error, message).await
    }

    pub async fn render(&self, key: &str) -> Vec<AlertView> {
        let mut boards = self.boards.write().await;
        match boards.get_mut(key) {
            Some(board) => board.render(),
            None => Vec::new(),
        }
    }

    pub async fn dismiss(&self, key: &str, id: Uuid) -> bool {
        let mut boards = self.boards.write().await;
        let dismissed = boards
            .get_mut(key)
            .map(|board| board.dismiss(id))
            .unwrap_or(false);
        if !dismissed {
            tracing::debug!("Ignoring dismissal of alert {} for session {}", id, key);
        }
        dismissed
    }

    pub async fn state(&self, key: &str, id: Uuid) -> AlertState {
        let boards = self.boards.read().await;
        boards
            .get(key)
            .map(|board| board.state(id))
            .unwrap_or(AlertState::Removed)
    }

    /// Purges finished alerts and drops boards idle longer than the TTL,
    /// together with any alerts they still hold undelivered.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut boards = self.boards.write().await;
        let purged: usize = boards.values_mut().map(|board| board.purge()).sum();
        let idle_ttl = self.idle_ttl;
        let before = boards.len();
        boards.retain(|_, board| board.idle_for(now) < idle_ttl);
        let dropped = before - boards.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} idle alert boards", dropped);
        }
        purged
    }

    pub async fn session_count(&self) -> usize {
        self.boards.read().await.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = self.sweep().await;
                if purged > 0 {
                    tracing::debug!("Purged {} dismissed alerts", purged);
                }
            }
        })
    }
}
