//! Registry of in-flight secured trades
//!
//! `TradeSessionRegistry` owns every unresolved [`SecuredTradeSession`] and
//! enforces that an unordered pair of users has at most one of them at a time.
//!
//! # Locking
//!
//! Sessions sit behind their own `Mutex` in a `DashMap<SessionId, _>`; a
//! second map from the sorted user pair to the session id guards uniqueness.
//! `propose` holds the pair entry for the whole check-and-insert, so two
//! concurrent proposals for one pair cannot both succeed. The order is always
//! pair entry, then session mutex, then account mutexes. Resolved sessions are
//! removed from both maps only after their mutex has been released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{Clock, SecuredTradeSession, TransferEngine};
use crate::types::{CardSet, SessionId, TradeError, TradeOutcome, UserId};

type SessionHandle = Arc<Mutex<SecuredTradeSession>>;

fn lock(handle: &SessionHandle) -> MutexGuard<'_, SecuredTradeSession> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pair_key(a: UserId, b: UserId) -> (UserId, UserId) {
    (a.min(b), a.max(b))
}

/// Process-wide store of secured trade sessions
#[derive(Debug)]
pub struct TradeSessionRegistry {
    engine: TransferEngine,
    sessions: DashMap<SessionId, SessionHandle>,
    pairs: DashMap<(UserId, UserId), SessionId>,
    next_id: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TradeSessionRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `engine` - Executes confirmed trades
    /// * `ttl` - How long a session may wait for confirmation
    /// * `clock` - Time source for expiry
    pub fn new(engine: TransferEngine, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            sessions: DashMap::new(),
            pairs: DashMap::new(),
            next_id: AtomicU64::new(1),
            ttl,
            clock,
        }
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Open a secured trade and publish it to the counterparty
    ///
    /// An overdue session still occupying the pair is expired in place and
    /// replaced. Session ids are unique for the lifetime of the registry but
    /// not necessarily contiguous.
    ///
    /// # Errors
    ///
    /// - `SessionAlreadyActive` if the pair has an unresolved session
    /// - Any proposal validation error from [`SecuredTradeSession::propose`]
    pub fn propose(
        &self,
        initiator: UserId,
        counterparty: UserId,
        initiator_cards: CardSet,
        counterparty_cards: CardSet,
    ) -> Result<SessionId, TradeError> {
        let now = self.clock.now();
        let entry = self.pairs.entry(pair_key(initiator, counterparty));

        let stale = match &entry {
            Entry::Occupied(occupied) => {
                let existing = *occupied.get();
                if self.still_active(existing) {
                    return Err(TradeError::session_already_active(
                        initiator,
                        counterparty,
                        existing,
                    ));
                }
                Some(existing)
            }
            Entry::Vacant(_) => None,
        };

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let proposed = SecuredTradeSession::propose(
            id,
            initiator,
            counterparty,
            initiator_cards,
            counterparty_cards,
            self.engine.ledger(),
            now,
        );

        let result = match proposed {
            Ok(mut session) => {
                session.publish();
                self.sessions.insert(id, Arc::new(Mutex::new(session)));
                entry.insert(id);
                debug!(session = %id, initiator, counterparty, "trade proposed");
                Ok(id)
            }
            Err(err) => {
                if let Entry::Occupied(occupied) = entry {
                    occupied.remove();
                }
                Err(err)
            }
        };

        if let Some(old) = stale {
            self.sessions.remove(&old);
        }
        result
    }

    /// Route a confirmation to its session
    ///
    /// A session that resolves (executed or rejected) is removed from the
    /// registry. A wrong confirmer leaves it in place.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no such session is registered
    /// - `SessionExpired` if the session is overdue; it is removed
    /// - `WrongConfirmer` from the session
    pub fn confirm(
        &self,
        session: SessionId,
        confirmer: UserId,
    ) -> Result<TradeOutcome, TradeError> {
        self.resolve(session, |trade| trade.confirm(confirmer, &self.engine))
    }

    /// Route a decline to its session
    ///
    /// # Errors
    ///
    /// As for [`confirm`](Self::confirm), with `NotParticipant` in place of
    /// `WrongConfirmer`.
    pub fn decline(&self, session: SessionId, user: UserId) -> Result<TradeOutcome, TradeError> {
        self.resolve(session, |trade| trade.decline(user))
    }

    /// Expire and remove every overdue session
    ///
    /// # Returns
    ///
    /// The ids of the sessions that were expired, in ascending order.
    pub fn expire_overdue(&self) -> Vec<SessionId> {
        let now = self.clock.now();
        let handles: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in handles {
            let pair = {
                let mut session = lock(&handle);
                if session.is_overdue(now, self.ttl) && session.expire() {
                    Some(pair_key(session.initiator(), session.counterparty()))
                } else {
                    None
                }
            };
            if let Some(pair) = pair {
                self.remove(id, pair);
                expired.push(id);
            }
        }

        expired.sort();
        expired
    }

    /// Snapshot of a registered session
    pub fn session(&self, id: SessionId) -> Option<SecuredTradeSession> {
        self.handle(id).ok().map(|handle| lock(&handle).clone())
    }

    /// The unresolved session between two users, in either role
    pub fn active_session_for(&self, a: UserId, b: UserId) -> Option<SessionId> {
        let id = self.pairs.get(&pair_key(a, b)).map(|entry| *entry.value())?;
        self.still_active(id).then_some(id)
    }

    /// Run [`expire_overdue`](Self::expire_overdue) every `period` on the
    /// current tokio runtime
    ///
    /// The task runs until it is aborted or the runtime shuts down.
    pub fn spawn_expiry_sweeper(registry: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let expired = registry.expire_overdue();
                if !expired.is_empty() {
                    debug!(count = expired.len(), "expired overdue trades");
                }
            }
        })
    }

    fn resolve<F>(&self, id: SessionId, step: F) -> Result<TradeOutcome, TradeError>
    where
        F: FnOnce(&mut SecuredTradeSession) -> Result<TradeOutcome, TradeError>,
    {
        let handle = self.handle(id)?;
        let now = self.clock.now();

        let (result, finished, pair) = {
            let mut session = lock(&handle);
            let pair = pair_key(session.initiator(), session.counterparty());
            if session.is_overdue(now, self.ttl) {
                session.expire();
                (Err(TradeError::session_expired(id)), true, pair)
            } else {
                let result = step(&mut session);
                (result, session.state().is_terminal(), pair)
            }
        };

        if finished {
            self.remove(id, pair);
        }
        result
    }

    /// Whether `id` names an open session that is not overdue
    ///
    /// An overdue session is expired on the way.
    fn still_active(&self, id: SessionId) -> bool {
        let Ok(handle) = self.handle(id) else {
            return false;
        };
        let mut session = lock(&handle);
        if session.is_overdue(self.clock.now(), self.ttl) {
            session.expire();
            return false;
        }
        session.state().is_open()
    }

    fn remove(&self, id: SessionId, pair: (UserId, UserId)) {
        self.sessions.remove(&id);
        self.pairs.remove_if(&pair, |_, current| *current == id);
    }

    fn handle(&self, id: SessionId) -> Result<SessionHandle, TradeError> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TradeError::session_not_found(id))
    }
}
