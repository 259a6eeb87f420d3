//! Scripted chain reader for testing without network calls.

use super::{AccountData, ChainReadError, ChainReader, ReserveInfo, UserReserve};
use crate::domain::Address;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted `getUserAccountData` response.
#[derive(Debug, Clone)]
struct ScriptedAccount {
    data: AccountData,
    delay: Duration,
}

/// Mock chain reader that returns predefined account and reserve data.
///
/// Account reads for a user first consume any queued responses (in call
/// order), then fall back to the fixed response for that user.
#[derive(Debug, Default)]
pub struct MockChainReader {
    accounts: HashMap<Address, AccountData>,
    queued: Mutex<HashMap<Address, VecDeque<ScriptedAccount>>>,
    reserves: Vec<ReserveInfo>,
    user_reserves: HashMap<Address, Vec<UserReserve>>,
    failing: HashSet<Address>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    account_calls: AtomicUsize,
}

impl MockChainReader {
    /// Create a new mock reader with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed account data returned for a user.
    pub fn with_account(mut self, user: Address, data: AccountData) -> Self {
        self.accounts.insert(user, data);
        self
    }

    /// Queue an account response served once, after `delay`.
    pub fn with_queued_account(self, user: Address, data: AccountData, delay: Duration) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued
                .entry(user)
                .or_default()
                .push_back(ScriptedAccount { data, delay });
        }
        self
    }

    /// Add a listed reserve.
    pub fn with_reserve(mut self, reserve: ReserveInfo) -> Self {
        self.reserves.push(reserve);
        self
    }

    /// Add a reserve balance for a user.
    pub fn with_user_reserve(mut self, user: Address, reserve: UserReserve) -> Self {
        self.user_reserves.entry(user).or_default().push(reserve);
        self
    }

    /// Make every read for this user fail with an RPC error.
    pub fn with_failing_user(mut self, user: Address) -> Self {
        self.failing.insert(user);
        self
    }

    /// Delay every account read that has no queued response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of concurrent account reads observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total number of account reads issued.
    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    fn next_queued(&self, user: &Address) -> Option<ScriptedAccount> {
        self.queued
            .lock()
            .ok()
            .and_then(|mut queued| queued.get_mut(user).and_then(|q| q.pop_front()))
    }

    fn check_failing(&self, user: &Address) -> Result<(), ChainReadError> {
        if self.failing.contains(user) {
            return Err(ChainReadError::Rpc {
                code: -32000,
                message: format!("scripted failure for {}", user),
            });
        }
        Ok(())
    }
}

/// Decrements the in-flight counter when a read finishes or is cancelled.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn get_user_account_data(&self, user: &Address) -> Result<AccountData, ChainReadError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let (data, delay) = match self.next_queued(user) {
            Some(scripted) => (Some(scripted.data), scripted.delay),
            None => (self.accounts.get(user).cloned(), self.delay),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_failing(user)?;

        Ok(data.unwrap_or_default())
    }

    async fn get_reserves(&self) -> Result<Vec<ReserveInfo>, ChainReadError> {
        Ok(self.reserves.clone())
    }

    async fn get_user_reserves(&self, user: &Address) -> Result<Vec<UserReserve>, ChainReadError> {
        self.check_failing(user)?;
        Ok(self.user_reserves.get(user).cloned().unwrap_or_default())
    }
}
