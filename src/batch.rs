//! FIFO queueing and bounded-chunk dispatch of batch sub-requests.
//!
//! Callers enqueue (payload, callback) pairs one at a time and call
//! [`BatchDispatcher::drain`] once. The dispatcher pops chunks of at most
//! `max_chunk_size` items off the front of the queue, clears each chunk through the
//! shared [`RateLimiter`], executes it as a single network batch, and hands every
//! sub-reply back to the callback at the same position. A dispatcher is sequential:
//! it never has two batches in flight at once.

// std
use std::time::Instant;
// self
use crate::{_prelude::*, limit::RateLimiter};

/// Default number of sub-requests bundled into one network batch.
///
/// The service accepts larger batches, but bigger chunks burn through the admission
/// window faster for no latency benefit.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 100;

/// Per-sub-request error object returned by the batch service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Sub-request failed with code {code}: {message}.")]
pub struct SubError {
	/// Service-defined error code.
	pub code: i64,
	/// Human-readable error payload.
	pub message: String,
}

/// Outcome delivered to a callback: the sub-reply body or the service's per-item error.
pub type SubReply = Result<Value, SubError>;

/// Completion callback invoked exactly once with the sub-reply matching its request.
pub type BatchCallback = Box<dyn FnOnce(SubReply) + Send>;

/// Boxed future returned by [`BatchTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SubReply>>> + 'a + Send>>;

/// One network round trip bundling several independent sub-requests.
///
/// Implementations must return exactly one reply per payload, in payload order; the
/// dispatcher relies on position to match replies back to callbacks.
pub trait BatchTransport
where
	Self: Send + Sync,
{
	/// Executes the payloads as a single batch call.
	fn execute(&self, payloads: Vec<Value>) -> TransportFuture<'_>;
}

/// A queued (payload, callback) pair awaiting dispatch.
///
/// Exists only until it is placed into a chunk; once dispatched it is never
/// re-queued, so each item is sent at most once.
struct QueuedRequest {
	payload: Value,
	callback: BatchCallback,
}

/// Ordered queue of sub-requests drained in bounded, rate-limited chunks.
pub struct BatchDispatcher {
	transport: Arc<dyn BatchTransport>,
	limiter: Arc<RateLimiter>,
	max_chunk_size: usize,
	queue: VecDeque<QueuedRequest>,
}
impl BatchDispatcher {
	/// Creates a dispatcher bound to a transport and the process-wide admission gate.
	pub fn new(
		transport: Arc<dyn BatchTransport>,
		limiter: Arc<RateLimiter>,
		max_chunk_size: usize,
	) -> Self {
		Self { transport, limiter, max_chunk_size, queue: VecDeque::new() }
	}

	/// Appends a sub-request and its completion callback to the queue.
	pub fn enqueue(&mut self, payload: Value, callback: impl FnOnce(SubReply) + Send + 'static) {
		self.queue.push_back(QueuedRequest { payload, callback: Box::new(callback) });
	}

	/// Number of sub-requests still waiting to be dispatched.
	pub fn len(&self) -> usize {
		self.queue.len()
	}

	/// Returns `true` when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	/// Drains the queue, one admitted batch at a time, until it is empty.
	///
	/// An empty queue returns immediately without contacting the service. A
	/// batch-level failure aborts the drain and propagates; the failed chunk's items
	/// have already left the queue and are not re-queued, while items behind them
	/// remain queued for a later drain.
	pub async fn drain(&mut self) -> Result<()> {
		while !self.queue.is_empty() {
			self.dispatch_next_chunk().await?;
		}

		Ok(())
	}

	async fn dispatch_next_chunk(&mut self) -> Result<()> {
		let take = self.queue.len().min(self.max_chunk_size);
		let (payloads, callbacks): (Vec<_>, Vec<_>) = self
			.queue
			.drain(..take)
			.map(|queued| (queued.payload, queued.callback))
			.unzip();

		self.limiter.admit(payloads.len() as u64).await?;

		tracing::info!(size = payloads.len(), "executing batch");

		let started = Instant::now();
		let expected = payloads.len();
		let replies = self.transport.execute(payloads).await?;

		if replies.len() != expected {
			return Err(crate::error::NetworkError::ReplyCountMismatch {
				expected,
				received: replies.len(),
			}
			.into());
		}

		tracing::info!(
			size = expected,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"batch finished"
		);

		for (callback, reply) in callbacks.into_iter().zip(replies) {
			callback(reply);
		}

		Ok(())
	}
}
impl Debug for BatchDispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BatchDispatcher")
			.field("max_chunk_size", &self.max_chunk_size)
			.field("queued", &self.queue.len())
			.finish()
	}
}
