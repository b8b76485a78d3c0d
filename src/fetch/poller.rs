//! Single-flight request scheduling for polled quotes, one-shot snapshots and
//! daily history.
//!
//! Each request kind owns one slot. A slot holds at most one in-flight task,
//! tagged with a ticket; completions are applied only while their ticket
//! still owns the slot, under the same lock that cancellation takes. Results
//! are published on an unbounded channel of [`FeedEvent`]s.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{FeedConfig, InstrumentRules, QuoteFormat};
use crate::error::{AppError, ParseError};
use crate::quote::Sample;

use super::decode::{self, HistoryBatch};
use super::instrument::InstrumentId;
use super::request::HistoryQuery;
use super::source::QuoteSource;
use super::FetchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Requesting,
}

/// How the most recent request of a slot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Poll,
    Snapshot,
    History,
}

#[derive(Debug)]
pub enum FeedEvent {
    /// A polled quote.
    Quote(Sample),
    /// A one-shot quote used to prime descriptive fields.
    Snapshot(Sample),
    /// A history request was issued; earlier bars are now stale.
    HistoryStarted(HistoryQuery),
    History {
        query: HistoryQuery,
        batch: HistoryBatch,
    },
    /// One historical record was dropped; the batch continues.
    RecordSkipped(ParseError),
    Failed {
        kind: RequestKind,
        error: AppError,
    },
}

pub type FeedEvents = UnboundedReceiver<FeedEvent>;

struct InFlight {
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    in_flight: Option<InFlight>,
    last_outcome: Option<Outcome>,
}

impl Slot {
    fn state(&self) -> FetchState {
        if self.in_flight.is_some() {
            FetchState::Requesting
        } else {
            FetchState::Idle
        }
    }

    fn owns(&self, ticket: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.ticket == ticket)
    }

    fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.handle.abort();
                true
            }
            None => false,
        }
    }
}

struct PollSession {
    instrument: InstrumentId,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct FetcherState {
    next_ticket: u64,
    polling: Option<PollSession>,
    poll: Slot,
    snapshot: Slot,
    history: Slot,
}

impl FetcherState {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn slot(&self, kind: RequestKind) -> &Slot {
        match kind {
            RequestKind::Poll => &self.poll,
            RequestKind::Snapshot => &self.snapshot,
            RequestKind::History => &self.history,
        }
    }

    fn slot_mut(&mut self, kind: RequestKind) -> &mut Slot {
        match kind {
            RequestKind::Poll => &mut self.poll,
            RequestKind::Snapshot => &mut self.snapshot,
            RequestKind::History => &mut self.history,
        }
    }

    fn stop_timer(&mut self) -> Option<InstrumentId> {
        self.polling.take().map(|session| {
            session.timer.abort();
            session.instrument
        })
    }
}

impl Drop for FetcherState {
    fn drop(&mut self) {
        self.stop_timer();
        self.poll.cancel();
        self.snapshot.cancel();
        self.history.cancel();
    }
}

struct Shared {
    source: Arc<dyn QuoteSource>,
    format: QuoteFormat,
    day_key: String,
    rules: InstrumentRules,
    state: Mutex<FetcherState>,
    events: UnboundedSender<FeedEvent>,
}

/// Cheaply cloneable handle; all clones drive the same slots.
#[derive(Clone)]
pub struct Fetcher {
    shared: Arc<Shared>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn QuoteSource>, config: &FeedConfig) -> (Self, FeedEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            source,
            format: config.realtime.format,
            day_key: config.history.day_list_key(),
            rules: config.instrument.clone(),
            state: Mutex::new(FetcherState::default()),
            events,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            rx,
        )
    }

    pub fn validate(&self, raw_code: &str) -> FetchResult<InstrumentId> {
        InstrumentId::parse(raw_code, &self.shared.rules)
    }

    /// Poll `raw_code` every `interval`, replacing any running session.
    ///
    /// The first tick fires immediately. Invalid codes fail before anything
    /// is armed or torn down.
    pub fn start_polling(&self, raw_code: &str, interval: Duration) -> FetchResult<()> {
        let instrument = self.validate(raw_code)?;
        if interval.is_zero() {
            return Err(AppError::validation("polling interval must be non-zero"));
        }

        let mut state = self.lock();
        if let Some(previous) = state.stop_timer() {
            debug!("replacing poll session for {previous}");
        }
        state.poll.cancel();

        let weak = Arc::downgrade(&self.shared);
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                Fetcher { shared }.tick();
            }
        });

        debug!("polling {instrument} every {interval:?}");
        state.polling = Some(PollSession { instrument, timer });
        Ok(())
    }

    /// One poll tick. Returns whether a request was issued; a tick while the
    /// previous request is outstanding, or with no session, does nothing.
    pub fn tick(&self) -> bool {
        let mut state = self.lock();
        let Some(session) = &state.polling else {
            return false;
        };
        if state.poll.in_flight.is_some() {
            debug!("poll tick skipped, request outstanding");
            return false;
        }

        let instrument = session.instrument.clone();
        let source = Arc::clone(&self.shared.source);
        let format = self.shared.format;
        let ticket = state.issue_ticket();
        let handle = self.spawn_request(RequestKind::Poll, ticket, async move {
            let raw = source.fetch_realtime(&instrument).await?;
            let sample = decode::parse_realtime(&raw, format)?;
            Ok(vec![FeedEvent::Quote(sample)])
        });
        state.poll.in_flight = Some(InFlight { ticket, handle });
        true
    }

    /// Disarm the timer and abort any outstanding poll request.
    pub fn stop_polling(&self) {
        let mut state = self.lock();
        if let Some(instrument) = state.stop_timer() {
            debug!("stopped polling {instrument}");
        }
        if state.poll.cancel() {
            debug!("aborted in-flight poll request");
        }
    }

    /// Request daily bars for `[start, end]`, superseding any history
    /// request still outstanding.
    pub fn fetch_historical(
        &self,
        raw_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchResult<()> {
        let instrument = self.validate(raw_code)?;
        let query = HistoryQuery::new(instrument, start, end)?;

        let mut state = self.lock();
        if state.history.cancel() {
            debug!("superseded in-flight history request");
        }
        self.emit(FeedEvent::HistoryStarted(query.clone()));

        let source = Arc::clone(&self.shared.source);
        let day_key = self.shared.day_key.clone();
        let ticket = state.issue_ticket();
        let handle = self.spawn_request(RequestKind::History, ticket, async move {
            let body = source.fetch_history(&query).await?;
            let batch = decode::parse_history_payload(&body, &query.instrument, &day_key)?;
            let mut events: Vec<FeedEvent> = batch
                .skipped
                .iter()
                .cloned()
                .map(FeedEvent::RecordSkipped)
                .collect();
            events.push(FeedEvent::History { query, batch });
            Ok(events)
        });
        state.history.in_flight = Some(InFlight { ticket, handle });
        Ok(())
    }

    /// Fetch one quote outside the polling session.
    pub fn fetch_realtime_once(&self, raw_code: &str) -> FetchResult<()> {
        let instrument = self.validate(raw_code)?;

        let mut state = self.lock();
        state.snapshot.cancel();

        let source = Arc::clone(&self.shared.source);
        let format = self.shared.format;
        let ticket = state.issue_ticket();
        let handle = self.spawn_request(RequestKind::Snapshot, ticket, async move {
            let raw = source.fetch_realtime(&instrument).await?;
            let sample = decode::parse_realtime(&raw, format)?;
            Ok(vec![FeedEvent::Snapshot(sample)])
        });
        state.snapshot.in_flight = Some(InFlight { ticket, handle });
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.lock().polling.is_some()
    }

    pub fn polled_instrument(&self) -> Option<InstrumentId> {
        self.lock()
            .polling
            .as_ref()
            .map(|session| session.instrument.clone())
    }

    pub fn state(&self, kind: RequestKind) -> FetchState {
        self.lock().slot(kind).state()
    }

    pub fn last_outcome(&self, kind: RequestKind) -> Option<Outcome> {
        self.lock().slot(kind).last_outcome
    }

    fn spawn_request<F>(&self, kind: RequestKind, ticket: u64, work: F) -> JoinHandle<()>
    where
        F: Future<Output = FetchResult<Vec<FeedEvent>>> + Send + 'static,
    {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        debug!("{kind:?} request #{ticket} issued");
        tokio::spawn(async move {
            let outcome = work.await;
            if let Some(shared) = weak.upgrade() {
                Fetcher { shared }.complete(kind, ticket, outcome);
            }
        })
    }

    fn complete(&self, kind: RequestKind, ticket: u64, outcome: FetchResult<Vec<FeedEvent>>) {
        let mut state = self.lock();
        let slot = state.slot_mut(kind);
        if !slot.owns(ticket) {
            debug!("dropping stale {kind:?} completion #{ticket}");
            return;
        }
        slot.in_flight = None;

        match outcome {
            Ok(events) => {
                slot.last_outcome = Some(Outcome::Completed);
                debug!("{kind:?} request #{ticket} completed");
                for event in events {
                    self.emit(event);
                }
            }
            Err(error) => {
                slot.last_outcome = Some(Outcome::Failed);
                warn!("{kind:?} request #{ticket} failed: {error}");
                self.emit(FeedEvent::Failed { kind, error });
            }
        }
    }

    fn emit(&self, event: FeedEvent) {
        if self.shared.events.send(event).is_err() {
            debug!("feed event dropped, no receiver");
        }
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
