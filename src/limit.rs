//! Sliding-window admission control for outbound batch sub-requests.
//!
//! The remote service limits sub-requests over a trailing window, and every entry of a
//! batch counts against that budget individually. [`RateLimiter::admit`] is the gate
//! callers pass through before issuing a batch: it blocks (back-pressure, never
//! rejection) until the requested count fits under the quota, then records the
//! admission in the same critical section so two callers can never jointly race past
//! the threshold.

// std
use std::{
	collections::BTreeMap,
	time::{Duration as StdDuration, Instant},
};
// self
use crate::_prelude::*;

/// Interval the gate sleeps between admission checks while blocked.
///
/// Deliberately conservative; the contract is only "block until admitted", not an
/// exact wake time computed from the soonest-expiring record.
pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Blocking sliding-window admission controller shared by every dispatcher in a process.
pub struct RateLimiter {
	quota: u64,
	window: StdDuration,
	poll_interval: StdDuration,
	ledger: Mutex<WindowLedger>,
}
impl RateLimiter {
	/// Creates a gate permitting `quota` sub-requests per trailing `window`.
	pub fn new(quota: u64, window: StdDuration) -> Self {
		Self {
			quota,
			window,
			poll_interval: DEFAULT_POLL_INTERVAL,
			ledger: Mutex::new(WindowLedger::default()),
		}
	}

	/// Overrides the sleep interval used while an admission is blocked.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Configured window quota.
	pub fn quota(&self) -> u64 {
		self.quota
	}

	/// Blocks until it is safe to issue `count` more remote calls, then records the admission.
	///
	/// Fails immediately with [`Error::QuotaExceeded`] when `count` can never be
	/// admitted: the window check requires strict headroom, so a request of the full
	/// quota would wait forever even against an empty ledger. There is no deadline
	/// parameter: a caller contending for scarce capacity waits until enough usage
	/// ages out of the window.
	pub async fn admit(&self, count: u64) -> Result<()> {
		if count >= self.quota {
			return Err(Error::QuotaExceeded { requested: count, quota: self.quota });
		}

		loop {
			// Purge, check, and record under one lock so admission is atomic.
			{
				let mut ledger = self.ledger.lock();
				let now = Instant::now();

				ledger.purge(now, self.window);

				if ledger.usage() + count < self.quota {
					ledger.record(now, count);

					return Ok(());
				}
			}

			tracing::warn!(count, "waiting for the admission window to free up");
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	/// Sum of admissions still inside the trailing window.
	pub fn current_usage(&self) -> u64 {
		let mut ledger = self.ledger.lock();

		ledger.purge(Instant::now(), self.window);
		ledger.usage()
	}

	/// Diagnostic hook for an externally observed throttle (e.g. an HTTP 429).
	///
	/// Logging only; the local accounting is not tightened.
	pub fn throttle_observed(&self) {
		tracing::warn!("remote service reported a rate limit rejection");
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("quota", &self.quota)
			.field("window", &self.window)
			.field("poll_interval", &self.poll_interval)
			.finish()
	}
}

/// Admissions recorded inside the trailing window, keyed by timestamp.
///
/// Admissions landing on the same instant coalesce into one record; expired records
/// are purged lazily on each check rather than by a background timer.
#[derive(Debug, Default)]
struct WindowLedger {
	records: BTreeMap<Instant, u64>,
}
impl WindowLedger {
	fn record(&mut self, at: Instant, count: u64) {
		*self.records.entry(at).or_insert(0) += count;
	}

	fn usage(&self) -> u64 {
		self.records.values().sum()
	}

	fn purge(&mut self, now: Instant, window: StdDuration) {
		// `now - window` underflows while the process is younger than the window.
		if let Some(horizon) = now.checked_sub(window) {
			self.records = self.records.split_off(&horizon);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const WINDOW: StdDuration = StdDuration::from_millis(200);
	const POLL: StdDuration = StdDuration::from_millis(10);

	#[test]
	fn ledger_coalesces_same_instant_admissions() {
		let mut ledger = WindowLedger::default();
		let base = Instant::now();

		ledger.record(base, 2);
		ledger.record(base, 3);

		assert_eq!(ledger.usage(), 5);
		assert_eq!(ledger.records.len(), 1);
	}

	#[test]
	fn ledger_purges_records_older_than_the_window() {
		let mut ledger = WindowLedger::default();
		let base = Instant::now();

		ledger.record(base, 2);
		ledger.record(base + StdDuration::from_millis(150), 3);
		ledger.purge(base + StdDuration::from_millis(250), WINDOW);

		assert_eq!(ledger.usage(), 3, "The record from `base` should have aged out.");

		ledger.purge(base + StdDuration::from_millis(400), WINDOW);

		assert_eq!(ledger.usage(), 0);
	}

	#[tokio::test]
	async fn oversized_request_fails_immediately() {
		let limiter = RateLimiter::new(5, WINDOW);
		let started = Instant::now();
		let result = limiter.admit(6).await;

		assert!(matches!(result, Err(Error::QuotaExceeded { requested: 6, quota: 5 })));
		assert!(
			started.elapsed() < WINDOW,
			"Oversized admissions must fail without blocking on the window."
		);
		assert_eq!(limiter.current_usage(), 0, "A rejected admission must not be recorded.");
	}

	#[tokio::test]
	async fn request_equal_to_quota_fails_instead_of_blocking() {
		let limiter = RateLimiter::new(5, WINDOW).with_poll_interval(POLL);
		let started = Instant::now();
		let result = limiter.admit(5).await;

		// The strict headroom check makes a full-quota request unsatisfiable even
		// against an empty ledger, so it must be rejected up front.
		assert!(matches!(result, Err(Error::QuotaExceeded { requested: 5, quota: 5 })));
		assert!(
			started.elapsed() < WINDOW,
			"A full-quota admission must fail without waiting on the window."
		);
		assert_eq!(limiter.current_usage(), 0, "A rejected admission must not be recorded.");
	}

	#[tokio::test]
	async fn admissions_below_quota_return_immediately() {
		let limiter = RateLimiter::new(5, WINDOW);

		limiter.admit(2).await.expect("First admission should fit under the quota.");
		limiter.admit(2).await.expect("Second admission should fit under the quota.");

		assert_eq!(limiter.current_usage(), 4);
	}

	#[tokio::test]
	async fn contended_admission_blocks_until_usage_ages_out() {
		let limiter = RateLimiter::new(5, WINDOW).with_poll_interval(POLL);

		limiter.admit(2).await.expect("Seed admission should fit under the quota.");
		limiter.admit(2).await.expect("Second seed admission should fit under the quota.");

		let started = Instant::now();

		limiter.admit(2).await.expect("Blocked admission should eventually be granted.");

		assert!(
			started.elapsed() >= WINDOW - POLL,
			"Third admission should have waited for the seed records to expire."
		);
		assert!(
			limiter.current_usage() <= 4,
			"At most one seed record may still be live alongside the final admission."
		);
	}

	#[tokio::test]
	async fn concurrent_admissions_never_jointly_exceed_the_quota() {
		let limiter = Arc::new(RateLimiter::new(5, WINDOW).with_poll_interval(POLL));
		let mut tasks = Vec::new();

		for _ in 0..4 {
			let limiter = limiter.clone();

			tasks.push(tokio::spawn(async move {
				limiter.admit(2).await.expect("Concurrent admission should eventually succeed.");

				assert!(
					limiter.current_usage() <= 5,
					"Live usage must never exceed the quota once recorded."
				);
			}));
		}

		for task in tasks {
			task.await.expect("Admission task should not panic.");
		}
	}
}
