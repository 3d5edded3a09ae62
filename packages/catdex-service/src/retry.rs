use std::{future::Future, time::Duration};

use crate::Result;

/// Bounded exponential backoff applied to each individual collaborator call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &catdex_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			base_delay: Duration::from_millis(cfg.base_delay_ms),
			max_delay: Duration::from_millis(cfg.max_delay_ms),
		}
	}

	/// Single attempt, no waiting.
	pub fn none() -> Self {
		Self { max_attempts: 1, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
	}

	/// Delay after the given failed attempt (1-based).
	pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(16);

		self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
	}

	pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 1;

		loop {
			match call().await {
				Ok(value) => return Ok(value),
				Err(err) if err.is_retryable() && attempt < self.max_attempts => {
					let delay = self.delay_for_attempt(attempt);

					tracing::warn!(
						error = %err,
						operation,
						attempt,
						delay_ms = delay.as_millis() as u64,
						"Remote call failed. Retrying."
					);
					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(err) => return Err(err),
			}
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from_config(&catdex_config::Retry::default())
	}
}
