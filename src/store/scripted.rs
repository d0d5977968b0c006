//! A counter store that replays a script of expected calls.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CounterStore, StoreError, StoreResult};

#[derive(Debug)]
enum Expected {
    Get(String, Result<Option<String>, String>),
    Incr(String, Result<i64, String>),
    Expire(String, Duration, Result<bool, String>),
    SetEx(String, String, Duration, Result<(), String>),
}

/// Test double that checks each call against a queue of expectations.
///
/// Errors are scripted as strings and surface as `StoreError::Unavailable`.
/// Any unexpected call panics, naming the call that arrived.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStore {
    expected: Mutex<VecDeque<Expected>>,
    calls: Mutex<usize>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn expect_get(&self, key: &str, reply: Result<Option<&str>, &str>) -> &Self {
        let reply = reply
            .map(|value| value.map(str::to_string))
            .map_err(str::to_string);
        self.push(Expected::Get(key.to_string(), reply))
    }

    pub(crate) fn expect_incr(&self, key: &str, reply: Result<i64, &str>) -> &Self {
        self.push(Expected::Incr(key.to_string(), reply.map_err(str::to_string)))
    }

    pub(crate) fn expect_expire(
        &self,
        key: &str,
        ttl: Duration,
        reply: Result<bool, &str>,
    ) -> &Self {
        self.push(Expected::Expire(
            key.to_string(),
            ttl,
            reply.map_err(str::to_string),
        ))
    }

    pub(crate) fn expect_set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        reply: Result<(), &str>,
    ) -> &Self {
        self.push(Expected::SetEx(
            key.to_string(),
            value.to_string(),
            ttl,
            reply.map_err(str::to_string),
        ))
    }

    /// Total calls received so far, expected or not.
    pub(crate) fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Panic if any scripted call was never made.
    pub(crate) fn assert_done(&self) {
        let expected = self.expected.lock();
        assert!(expected.is_empty(), "unmet store expectations: {:?}", *expected);
    }

    fn push(&self, expected: Expected) -> &Self {
        self.expected.lock().push_back(expected);
        self
    }

    fn next(&self, call: String) -> Expected {
        *self.calls.lock() += 1;
        self.expected
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected store call: {}", call))
    }
}

fn reply<T>(result: Result<T, String>) -> StoreResult<T> {
    result.map_err(StoreError::Unavailable)
}

#[async_trait]
impl CounterStore for ScriptedStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        match self.next(format!("INCR {}", key)) {
            Expected::Incr(want, result) if want == key => reply(result),
            other => panic!("expected {:?}, got INCR {}", other, key),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        match self.next(format!("EXPIRE {} {:?}", key, ttl)) {
            Expected::Expire(want, want_ttl, result) if want == key && want_ttl == ttl => {
                reply(result)
            }
            other => panic!("expected {:?}, got EXPIRE {} {:?}", other, key, ttl),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        match self.next(format!("SET {} {} {:?}", key, value, ttl)) {
            Expected::SetEx(want, want_value, want_ttl, result)
                if want == key && want_value == value && want_ttl == ttl =>
            {
                reply(result)
            }
            other => panic!("expected {:?}, got SET {} {} {:?}", other, key, value, ttl),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.next(format!("GET {}", key)) {
            Expected::Get(want, result) if want == key => reply(result),
            other => panic!("expected {:?}, got GET {}", other, key),
        }
    }
}
