//! Periodic price polling
//!
//! [`PricePoller`] keeps at most one polling task per token id. Each task
//! fetches the token's price once per interval and hands the result to the
//! subscriber's handler. The first fetch happens one interval after
//! subscribing. A failed fetch is logged and skipped; the next tick tries
//! again. Tasks are aborted on unsubscribe and when the poller is dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rayswap_core::config::ApiSettings;
//! use rayswap_dapp::price::PricePoller;
//! use rayswap_dapp::raydium::RaydiumClient;
//!
//! # async fn run() -> rayswap_dapp::Result<()> {
//! let client = Arc::new(RaydiumClient::new(&ApiSettings::default())?);
//! let mut poller = PricePoller::new(client, Duration::from_secs(1));
//!
//! poller.subscribe(
//!     "So11111111111111111111111111111111111111112",
//!     |tick| println!("{} = {}", tick.token_id, tick.price),
//!     None,
//! );
//! tokio::time::sleep(Duration::from_secs(10)).await;
//! poller.unsubscribe("So11111111111111111111111111111111111111112");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::protocol::{PriceSource, PriceTick};

/// Callback invoked with every successful price observation
pub type PriceHandler = Arc<dyn Fn(PriceTick) + Send + Sync>;

/// Shortest accepted polling interval
const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct Subscription {
    interval: Duration,
    handle: JoinHandle<()>,
}

/// Registry of per-token polling tasks
pub struct PricePoller {
    source: Arc<dyn PriceSource>,
    default_interval: Duration,
    subscriptions: HashMap<String, Subscription>,
}

impl PricePoller {
    /// Create a poller fetching from `source`
    pub fn new(source: Arc<dyn PriceSource>, default_interval: Duration) -> Self {
        Self {
            source,
            default_interval,
            subscriptions: HashMap::new(),
        }
    }

    /// Start polling `token_id`, every `interval` or the default interval.
    ///
    /// Returns `false` and changes nothing when the token is already
    /// subscribed.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<F>(&mut self, token_id: impl Into<String>, handler: F, interval: Option<Duration>) -> bool
    where
        F: Fn(PriceTick) + Send + Sync + 'static,
    {
        let token_id = token_id.into();
        if self.subscriptions.contains_key(&token_id) {
            warn!(token = %token_id, "Already subscribed, ignoring");
            return false;
        }

        let interval = interval.unwrap_or(self.default_interval).max(MIN_INTERVAL);
        let handle = tokio::spawn(poll(
            token_id.clone(),
            Arc::clone(&self.source),
            Arc::new(handler),
            interval,
        ));

        debug!(token = %token_id, interval_ms = interval.as_millis() as u64, "Price subscription started");
        self.subscriptions
            .insert(token_id, Subscription { interval, handle });
        true
    }

    /// Stop polling `token_id`. Returns `false` when it was not subscribed.
    pub fn unsubscribe(&mut self, token_id: &str) -> bool {
        match self.subscriptions.remove(token_id) {
            Some(subscription) => {
                subscription.handle.abort();
                debug!(token = %token_id, "Price subscription stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every subscription
    pub fn unsubscribe_all(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.handle.abort();
        }
    }

    /// Whether `token_id` is being polled
    pub fn is_subscribed(&self, token_id: &str) -> bool {
        self.subscriptions.contains_key(token_id)
    }

    /// Polling interval of `token_id`
    pub fn interval_of(&self, token_id: &str) -> Option<Duration> {
        self.subscriptions.get(token_id).map(|s| s.interval)
    }

    /// Token ids being polled, sorted
    pub fn active_subscriptions(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.subscriptions.keys().cloned().collect();
        tokens.sort();
        tokens
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

async fn poll(token_id: String, source: Arc<dyn PriceSource>, handler: PriceHandler, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match source.price(&token_id).await {
            Ok(price) => handler(PriceTick {
                token_id: token_id.clone(),
                price,
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            }),
            Err(err) => warn!(token = %token_id, error = %err, "Price fetch failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DappError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn price(&self, token_id: &str) -> Result<f64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DappError::PriceUnavailable(format!("no price for {}", token_id)));
            }
            Ok(100.0 + call as f64)
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<PriceTick>>>, impl Fn(PriceTick) + Send + Sync + 'static) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        (ticks, move |tick| sink.lock().unwrap().push(tick))
    }

    fn count(ticks: &Arc<Mutex<Vec<PriceTick>>>) -> usize {
        ticks.lock().unwrap().len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let mut poller = PricePoller::new(Arc::new(CountingSource::default()), Duration::from_millis(1000));
        let (ticks, handler) = recorder();

        assert!(poller.subscribe("SOL", handler, None));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(count(&ticks), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count(&ticks), 1);
        assert_eq!(ticks.lock().unwrap()[0].token_id, "SOL");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_subscribe_keeps_single_task() {
        let source = Arc::new(CountingSource::default());
        let mut poller = PricePoller::new(source.clone(), Duration::from_millis(1000));
        let (ticks, handler) = recorder();
        let (other_ticks, other_handler) = recorder();

        assert!(poller.subscribe("SOL", handler, None));
        assert!(!poller.subscribe("SOL", other_handler, Some(Duration::from_millis(10))));

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(poller.active_subscriptions(), vec!["SOL".to_string()]);
        assert_eq!(poller.interval_of("SOL"), Some(Duration::from_millis(1000)));
        assert_eq!(count(&ticks), 3);
        assert_eq!(count(&other_ticks), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_do_not_stop_polling() {
        let source = Arc::new(CountingSource {
            failures: 2,
            ..CountingSource::default()
        });
        let mut poller = PricePoller::new(source, Duration::from_millis(500));
        let (ticks, handler) = recorder();

        poller.subscribe("BONK", handler, None);
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].price, 102.0);
        assert_eq!(ticks[1].price, 103.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_ticks() {
        let mut poller = PricePoller::new(Arc::new(CountingSource::default()), Duration::from_millis(1000));
        let (ticks, handler) = recorder();

        poller.subscribe("SOL", handler, None);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(poller.unsubscribe("SOL"));
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(count(&ticks), 1);
        assert!(!poller.is_subscribed("SOL"));
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_is_noop() {
        let mut poller = PricePoller::new(Arc::new(CountingSource::default()), Duration::from_millis(1000));

        assert!(!poller.unsubscribe("never-subscribed"));
        assert!(poller.active_subscriptions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_intervals_and_drop() {
        let mut poller = PricePoller::new(Arc::new(CountingSource::default()), Duration::from_millis(1000));
        let (fast, fast_handler) = recorder();
        let (slow, slow_handler) = recorder();

        poller.subscribe("FAST", fast_handler, Some(Duration::from_millis(250)));
        poller.subscribe("SLOW", slow_handler, None);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(count(&fast), 4);
        assert_eq!(count(&slow), 1);

        drop(poller);
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(count(&fast), 4);
        assert_eq!(count(&slow), 1);
    }
}
