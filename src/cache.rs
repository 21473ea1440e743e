//! Single-entry weather cache.
//!
//! Reads are served from memory. A cold cache fetches before answering; a
//! stale one keeps serving the last reading while one background task
//! refreshes it. At most one fetch is ever outstanding, and a failed attempt
//! pushes the next one out by a full refresh interval unless the retry policy
//! says otherwise. Fetch errors are logged here and never reach callers.
//!
//! Every fetch runs in its own task, so a caller that goes away mid-fetch
//! cannot leave the in-flight flag set.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{FetchError, FetchErrorKind};
use crate::settings::{RetryPolicy, Settings};
use crate::weather::{WeatherFetcher, WeatherSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub state: CacheState,
    pub provider: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub refreshing: bool,
    pub last_error: Option<FetchErrorKind>,
    pub refresh_interval_seconds: u64,
}

#[derive(Debug, Default)]
struct CacheEntry {
    settings: Arc<Settings>,
    snapshot: Option<WeatherSnapshot>,
    last_attempt: Option<DateTime<Utc>>,
    in_flight: bool,
    last_error: Option<FetchErrorKind>,
    // Set by a configuration failure; cleared only by `reconfigure`.
    blocked: bool,
    generation: u64,
}

/// Claim on the in-flight slot, tied to the settings of its generation.
#[derive(Debug, Clone)]
struct Ticket {
    generation: u64,
    settings: Arc<Settings>,
}

enum Plan {
    Serve(WeatherSnapshot),
    Revalidate(WeatherSnapshot, Ticket),
    Fetch(Ticket),
    Wait(watch::Receiver<u64>),
    Unavailable,
}

pub struct WeatherCache {
    fetcher: Arc<dyn WeatherFetcher>,
    clock: Arc<dyn Clock>,
    entry: Mutex<CacheEntry>,
    // Bumped whenever a refresh finishes or the entry is reset.
    completions: watch::Sender<u64>,
}

impl WeatherCache {
    pub fn new(fetcher: Arc<dyn WeatherFetcher>, clock: Arc<dyn Clock>, settings: Settings) -> Self {
        let (completions, _) = watch::channel(0);
        Self {
            fetcher,
            clock,
            entry: Mutex::new(CacheEntry {
                settings: Arc::new(settings),
                ..CacheEntry::default()
            }),
            completions,
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.entry.lock().settings)
    }

    /// Returns the current weather. Only waits on the network when nothing
    /// has been cached yet.
    pub async fn get(self: &Arc<Self>) -> WeatherSnapshot {
        let now = self.clock.now();

        match self.plan(now) {
            Plan::Serve(snapshot) => snapshot,
            Plan::Revalidate(snapshot, ticket) => {
                debug!("♻️  Serving stale weather while refreshing");
                self.spawn_refresh(ticket);
                snapshot
            }
            Plan::Fetch(ticket) => match self.spawn_refresh(ticket).await {
                Ok(Some(snapshot)) => snapshot,
                _ => self.current_or_unavailable(now),
            },
            Plan::Wait(mut completions) => {
                // The sender lives as long as `self`, so this only ends on a bump.
                let _ = completions.changed().await;
                self.current_or_unavailable(now)
            }
            Plan::Unavailable => WeatherSnapshot::unavailable(now),
        }
    }

    /// Starts a background refresh when one is due. Returns whether it did.
    pub fn refresh_if_due(self: &Arc<Self>) -> bool {
        let now = self.clock.now();

        let ticket = {
            let mut entry = self.entry.lock();
            Self::begin_refresh(&mut entry, now)
        };

        match ticket {
            Some(ticket) => {
                self.spawn_refresh(ticket);
                true
            }
            None => false,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.entry.lock().in_flight
    }

    pub fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        let entry = self.entry.lock();

        let state = match &entry.snapshot {
            None => CacheState::Empty,
            Some(snapshot) if Self::is_expired(snapshot, &entry.settings, now) => CacheState::Stale,
            Some(_) => CacheState::Fresh,
        };

        CacheStatus {
            state,
            provider: self.fetcher.name().to_string(),
            captured_at: entry.snapshot.as_ref().map(|snapshot| snapshot.captured_at),
            last_attempt: entry.last_attempt,
            refreshing: entry.in_flight,
            last_error: entry.last_error,
            refresh_interval_seconds: entry.settings.refresh_interval_secs,
        }
    }

    /// Installs new settings and drops everything cached under the old ones.
    /// A refresh still running for the old settings is discarded on arrival.
    pub fn reconfigure(&self, settings: Settings) {
        {
            let mut entry = self.entry.lock();
            let generation = entry.generation.wrapping_add(1);
            *entry = CacheEntry {
                settings: Arc::new(settings),
                generation,
                ..CacheEntry::default()
            };
        }
        self.notify_waiters();
        info!("🔧 Weather settings reloaded, cache cleared");
    }

    fn plan(&self, now: DateTime<Utc>) -> Plan {
        let mut entry = self.entry.lock();

        match entry.snapshot.clone() {
            Some(snapshot) if !Self::is_expired(&snapshot, &entry.settings, now) => {
                Plan::Serve(snapshot)
            }
            Some(snapshot) => match Self::begin_refresh(&mut entry, now) {
                Some(ticket) => Plan::Revalidate(snapshot, ticket),
                None => Plan::Serve(snapshot),
            },
            None => match Self::begin_refresh(&mut entry, now) {
                Some(ticket) => Plan::Fetch(ticket),
                None if entry.in_flight => Plan::Wait(self.completions.subscribe()),
                None => Plan::Unavailable,
            },
        }
    }

    fn spawn_refresh(self: &Arc<Self>, ticket: Ticket) -> JoinHandle<Option<WeatherSnapshot>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let result = cache.run_fetch(&ticket.settings).await;
            cache.complete(&ticket, result)
        })
    }

    async fn run_fetch(&self, settings: &Settings) -> Result<WeatherSnapshot, FetchError> {
        match tokio::time::timeout(settings.request_timeout(), self.fetcher.fetch(settings)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Claims the in-flight slot if a fetch is due, recording the attempt.
    fn begin_refresh(entry: &mut CacheEntry, now: DateTime<Utc>) -> Option<Ticket> {
        if entry.in_flight || entry.blocked {
            return None;
        }

        let due = match entry.last_attempt {
            None => true,
            Some(_) if entry.last_error.is_some() && entry.settings.retry_policy == RetryPolicy::Immediate => true,
            Some(at) => now.signed_duration_since(at) >= entry.settings.refresh_interval(),
        };
        if !due {
            return None;
        }

        entry.in_flight = true;
        entry.last_attempt = Some(now);
        Some(Ticket {
            generation: entry.generation,
            settings: Arc::clone(&entry.settings),
        })
    }

    /// Records the outcome of a refresh, returning the snapshot it installed.
    fn complete(&self, ticket: &Ticket, result: Result<WeatherSnapshot, FetchError>) -> Option<WeatherSnapshot> {
        let installed = {
            let mut entry = self.entry.lock();
            if entry.generation == ticket.generation {
                entry.in_flight = false;
                self.record(&mut entry, result)
            } else {
                debug!("Discarding weather fetched under replaced settings");
                None
            }
        };

        self.notify_waiters();
        installed
    }

    fn record(&self, entry: &mut CacheEntry, result: Result<WeatherSnapshot, FetchError>) -> Option<WeatherSnapshot> {
        match result {
            Ok(snapshot) => {
                // Staleness is judged against this cache's clock only.
                let snapshot = WeatherSnapshot {
                    captured_at: self.clock.now(),
                    ..snapshot
                };
                info!(
                    "💾 Cached weather: {} {}",
                    snapshot.temperature, snapshot.condition_text
                );
                entry.last_error = None;
                entry.snapshot = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(err) => {
                match &err {
                    FetchError::Configuration(_) => {
                        warn!("⚠️  Weather disabled until settings reload: {}", err)
                    }
                    FetchError::MalformedResponse(_) => {
                        error!("❌ Weather provider response did not match the expected schema, its API may have changed: {}", err)
                    }
                    _ => warn!("❌ Weather refresh failed: {}", err),
                }
                entry.blocked = !err.is_retryable();
                entry.last_error = Some(err.kind());
                None
            }
        }
    }

    fn current_or_unavailable(&self, now: DateTime<Utc>) -> WeatherSnapshot {
        self.entry
            .lock()
            .snapshot
            .clone()
            .unwrap_or_else(|| WeatherSnapshot::unavailable(now))
    }

    fn notify_waiters(&self) {
        self.completions.send_modify(|count| *count = count.wrapping_add(1));
    }

    fn is_expired(snapshot: &WeatherSnapshot, settings: &Settings, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.captured_at) >= settings.refresh_interval()
    }
}
