//! # Random Number Oracle
//!
//! Two-phase randomness. A request returns an id right away; the numbers
//! arrive in a later, separate fulfilment. Once fulfilled a request is
//! immutable.
//!
//! ```text
//!   request(count) ──► RequestId        (numbers unavailable)
//!        ...
//!   fulfill(id, numbers) ──► stored ──► consumer.on_random_ready()
//!                                          │ error or panic
//!                                          ▼
//!                                   CallbackFailed event
//! ```
//!
//! Only the operator chosen at construction may fulfil. Consumer failures
//! never undo the fulfilment.

use crate::error::OracleError;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use stakelot_core::Address;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Opaque handle of a randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single request and, once completed, its numbers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomRequest {
    pub requester: Address,
    pub count: usize,
    /// Consumer to notify on completion
    pub callback: Option<Address>,
    pub completed: bool,
    pub numbers: Vec<U256>,
}

/// Receiver of fulfilled randomness
pub trait RandomnessConsumer {
    fn on_random_ready(&mut self, id: RequestId, numbers: &[U256]) -> Result<(), String>;
}

/// Requesting side of the oracle
pub trait RandomSource {
    fn request(
        &mut self,
        requester: Address,
        count: usize,
        callback: Option<Address>,
    ) -> Result<RequestId, OracleError>;

    fn is_complete(&self, id: RequestId) -> bool;

    /// Numbers of a completed request; `NotReady` before completion
    fn numbers(&self, id: RequestId) -> Result<&[U256], OracleError>;
}

/// Oracle event log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OracleEvent {
    Requested { id: RequestId, requester: Address, count: usize },
    Fulfilled { id: RequestId },
    CallbackFailed { id: RequestId, reason: String },
}

/// In-memory oracle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomNumberOracle {
    /// Sole account allowed to deliver numbers
    operator: Address,
    next_id: u64,
    requests: BTreeMap<RequestId, RandomRequest>,
    events: Vec<OracleEvent>,
}

impl RandomNumberOracle {
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            next_id: 0,
            requests: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn request_of(&self, id: RequestId) -> Option<&RandomRequest> {
        self.requests.get(&id)
    }

    pub fn events(&self) -> &[OracleEvent] {
        &self.events
    }

    /// Requests still waiting for numbers, oldest first
    pub fn pending(&self) -> Vec<(RequestId, usize)> {
        self.requests
            .iter()
            .filter(|(_, r)| !r.completed)
            .map(|(id, r)| (*id, r.count))
            .collect()
    }

    /// Complete `id` with `numbers` and notify the consumer.
    ///
    /// The consumer is only invoked when the request registered a callback.
    /// Its errors and panics are recorded as `CallbackFailed`; the
    /// fulfilment itself stands.
    pub fn fulfill<C>(
        &mut self,
        sender: &Address,
        id: RequestId,
        numbers: Vec<U256>,
        consumer: Option<&mut C>,
    ) -> Result<(), OracleError>
    where
        C: RandomnessConsumer + ?Sized,
    {
        if *sender != self.operator {
            return Err(OracleError::NotOperator(*sender));
        }
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(OracleError::UnknownRequest(id))?;
        if request.completed {
            return Err(OracleError::AlreadyFulfilled(id));
        }
        if numbers.len() != request.count {
            return Err(OracleError::WrongCount {
                expected: request.count,
                got: numbers.len(),
            });
        }

        request.completed = true;
        request.numbers = numbers;
        let has_callback = request.callback.is_some();
        self.events.push(OracleEvent::Fulfilled { id });
        info!(request = %id, "randomness fulfilled");

        if !has_callback {
            return Ok(());
        }
        let Some(consumer) = consumer else {
            debug!(request = %id, "no consumer supplied for callback");
            return Ok(());
        };

        let numbers = &self.requests[&id].numbers;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| consumer.on_random_ready(id, numbers)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(reason),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(reason) = failure {
            warn!(request = %id, %reason, "randomness callback failed");
            self.events.push(OracleEvent::CallbackFailed { id, reason });
        }
        Ok(())
    }
}

impl RandomSource for RandomNumberOracle {
    fn request(
        &mut self,
        requester: Address,
        count: usize,
        callback: Option<Address>,
    ) -> Result<RequestId, OracleError> {
        if count == 0 {
            return Err(OracleError::ZeroCount);
        }
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.requests.insert(
            id,
            RandomRequest {
                requester,
                count,
                callback,
                completed: false,
                numbers: Vec::new(),
            },
        );
        self.events.push(OracleEvent::Requested {
            id,
            requester,
            count,
        });
        info!(request = %id, %requester, count, "randomness requested");
        Ok(id)
    }

    fn is_complete(&self, id: RequestId) -> bool {
        self.requests.get(&id).map(|r| r.completed).unwrap_or(false)
    }

    fn numbers(&self, id: RequestId) -> Result<&[U256], OracleError> {
        let request = self.requests.get(&id).ok_or(OracleError::UnknownRequest(id))?;
        if !request.completed {
            return Err(OracleError::NotReady(id));
        }
        Ok(&request.numbers)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
