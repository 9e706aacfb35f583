//! Poll orchestrator: owns one `TargetState` per configured target, scrapes
//! every target on a fixed cadence and publishes the resulting `Board`.
//!
//! Each target scrapes independently, so a slow host never delays the others.
//! A target never has more than one scrape in flight. A finished scrape is
//! committed only if its slot still exists with the generation it started
//! under; responses for removed (or removed and re-added) targets are dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::parser::{parse_with, ParseOptions};
use crate::rates::TargetState;
use crate::types::{Board, TargetView};

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_UPTIME_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HISTORY_LEN: usize = 60;

/// Wall clock in unix millis. Swappable so rate math can be driven by tests.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub scrape_every: Duration,
    pub uptime_every: Duration,
    /// Upper bound on one fetch; releases the single-flight guard of a hung target.
    pub fetch_timeout: Duration,
    pub history_len: usize,
    pub parse: ParseOptions,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            scrape_every: DEFAULT_SCRAPE_INTERVAL,
            uptime_every: DEFAULT_UPTIME_INTERVAL,
            fetch_timeout: DEFAULT_SCRAPE_INTERVAL,
            history_len: DEFAULT_HISTORY_LEN,
            parse: ParseOptions::default(),
        }
    }
}

struct Slot {
    url: String,
    host: String,
    generation: u64,
    in_flight: bool,
    state: TargetState,
}

impl Slot {
    fn view(&self) -> TargetView {
        TargetView {
            url: self.url.clone(),
            host: self.host.clone(),
            metrics: self.state.derived().clone(),
            series: self.state.series(),
        }
    }
}

#[derive(Default)]
struct Registry {
    // configured order
    slots: Vec<Slot>,
    next_generation: u64,
}

impl Registry {
    fn slot_mut(&mut self, url: &str, generation: u64) -> Option<&mut Slot> {
        self.slots
            .iter_mut()
            .find(|s| s.url == url && s.generation == generation)
    }

    fn board(&self) -> Board {
        self.slots.iter().map(Slot::view).collect()
    }
}

struct Shared {
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    registry: Mutex<Registry>,
    board_tx: watch::Sender<Board>,
}

impl Shared {
    fn publish(&self, reg: &Registry) {
        self.board_tx.send_replace(reg.board());
    }

    /// Claim every idle target for a new scrape.
    async fn begin_round(&self) -> Vec<(String, u64)> {
        let mut reg = self.registry.lock().await;
        let mut claimed = Vec::with_capacity(reg.slots.len());
        for slot in reg.slots.iter_mut() {
            if slot.in_flight {
                debug!(target_url = %slot.url, "previous scrape still in flight, skipping tick");
                continue;
            }
            slot.in_flight = true;
            claimed.push((slot.url.clone(), slot.generation));
        }
        claimed
    }

    async fn scrape(&self, url: String, generation: u64) {
        let fetched = match timeout(self.settings.fetch_timeout, self.fetcher.fetch(&url)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Transport(format!(
                "timed out after {:?}",
                self.settings.fetch_timeout
            ))),
        };
        let parsed = fetched.map(|text| parse_with(&text, &self.settings.parse));
        let now = self.clock.now_millis();

        let mut reg = self.registry.lock().await;
        let Some(slot) = reg.slot_mut(&url, generation) else {
            debug!(target_url = %url, "target removed while scraping, discarding response");
            return;
        };
        slot.in_flight = false;
        match parsed {
            Ok(snapshot) => {
                slot.state.observe(snapshot, now);
                debug!(target_url = %url, "scrape committed");
            }
            Err(e) => {
                warn!(target_url = %url, error = %e, "scrape failed");
                slot.state.record_error(e.to_string());
            }
        }
        self.publish(&reg);
    }

    async fn advance_uptime(&self, now: std::time::Instant) {
        let mut reg = self.registry.lock().await;
        let mut changed = false;
        for slot in reg.slots.iter_mut() {
            changed |= slot.state.advance_uptime(now);
        }
        if changed {
            self.publish(&reg);
        }
    }
}

/// Host part of a target URL, used as the card title.
pub fn display_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// One dashboard session's worth of polling state.
pub struct Poller {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl Poller {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: PollSettings) -> Self {
        Self::with_clock(fetcher, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        settings: PollSettings,
    ) -> Self {
        let (board_tx, _) = watch::channel(Board::new());
        Self {
            shared: Arc::new(Shared {
                fetcher,
                clock,
                settings,
                registry: Mutex::new(Registry::default()),
                board_tx,
            }),
            tasks: Vec::new(),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.shared.settings
    }

    /// Receiver that observes every published board.
    pub fn subscribe(&self) -> watch::Receiver<Board> {
        self.shared.board_tx.subscribe()
    }

    /// Latest published board.
    pub fn board(&self) -> Board {
        self.shared.board_tx.borrow().clone()
    }

    pub async fn targets(&self) -> Vec<String> {
        let reg = self.shared.registry.lock().await;
        reg.slots.iter().map(|s| s.url.clone()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Replace the target set. Kept targets keep their rate state; removed
    /// ones lose it immediately; new ones start empty. Duplicate URLs collapse
    /// to their first occurrence.
    pub async fn set_targets(&self, urls: &[String]) {
        let mut reg = self.shared.registry.lock().await;
        let mut old = std::mem::take(&mut reg.slots);
        let mut next: Vec<Slot> = Vec::with_capacity(urls.len());
        for url in urls {
            if next.iter().any(|s| &s.url == url) {
                continue;
            }
            match old.iter().position(|s| &s.url == url) {
                Some(pos) => next.push(old.swap_remove(pos)),
                None => {
                    reg.next_generation += 1;
                    next.push(Slot {
                        url: url.clone(),
                        host: display_host(url),
                        generation: reg.next_generation,
                        in_flight: false,
                        state: TargetState::new(self.shared.settings.history_len),
                    });
                }
            }
        }
        for gone in &old {
            info!(target_url = %gone.url, "target removed");
        }
        reg.slots = next;
        self.shared.publish(&reg);
    }

    /// Run one scrape round over every idle target and wait for all of them.
    pub async fn scrape_all(&self) {
        let claimed = self.shared.begin_round().await;
        join_all(
            claimed
                .into_iter()
                .map(|(url, generation)| self.shared.scrape(url, generation)),
        )
        .await;
    }

    /// Spawn the scrape and uptime timers. Any timers from an earlier start are
    /// cancelled first. The first scrape round fires immediately.
    pub fn start(&mut self) {
        self.stop();
        let settings = &self.shared.settings;
        info!(
            scrape_every = ?settings.scrape_every,
            uptime_every = ?settings.uptime_every,
            "poller starting"
        );

        let shared = self.shared.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut tick = interval(shared.settings.scrape_every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                for (url, generation) in shared.begin_round().await {
                    let shared = shared.clone();
                    tokio::spawn(async move { shared.scrape(url, generation).await });
                }
            }
        }));

        let shared = self.shared.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut tick = interval(shared.settings.uptime_every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tick.tick().await;
                shared.advance_uptime(std::time::Instant::now()).await;
            }
        }));
    }

    /// Cancel both timers. Scrapes already in flight finish on their own and
    /// still commit if their target is configured.
    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for t in self.tasks.drain(..) {
            t.abort();
        }
        info!("poller stopped");
    }

    /// Tear down timers, swap the target set and start again.
    pub async fn reconfigure(&mut self, urls: &[String]) {
        self.stop();
        self.set_targets(urls).await;
        self.start();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        for t in self.tasks.drain(..) {
            t.abort();
        }
    }
}
