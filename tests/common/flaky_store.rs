//! Store wrapper that fails selected connection attempts

#![allow(dead_code)]

use async_trait::async_trait;
use reviewit::error::{Error, Result};
use reviewit::store::{Connection, Store};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

/// Delegates to an inner store, except that the connects numbered in
/// `failing` (counting from 1) return a store error
pub struct FlakyStore {
    inner: Arc<dyn Store>,
    failing: Mutex<HashSet<usize>>,
    attempts: Mutex<usize>,
}

impl FlakyStore {
    /// Wrap `inner` with no failures scheduled
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            attempts: Mutex::new(0),
        }
    }

    /// Make the `n`-th connect from now on fail
    pub fn fail_connect(&self, n: usize) {
        let attempts = *self.attempts.lock().unwrap();
        self.failing.lock().unwrap().insert(attempts + n);
    }

    /// Number of connects made so far
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if self.failing.lock().unwrap().contains(&attempt) {
            return Err(Error::Store("connection pool exhausted".to_string()));
        }
        self.inner.connect().await
    }
}
