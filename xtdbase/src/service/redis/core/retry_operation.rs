use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// 지수 백오프 + 지터 재시도
#[derive(Debug, Clone, Copy)]
pub struct RetryOperation {
    pub retries: u8,
    pub delay_ms: u64,
    pub backoff: f64,
    pub jitter_ms: u64,
}

pub const RETRY_OPT: RetryOperation = RetryOperation {
    retries: 3,
    delay_ms: 100,
    backoff: 2.0,
    jitter_ms: 50,
};

impl RetryOperation {
    /// `attempt` 번째 실패 뒤 대기 시간 (지터 제외)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.delay_ms as f64 * factor).round() as u64)
    }

    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = u32::from(self.retries.max(1));
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(val) => return Ok(val),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    // 지터 추가
                    let jitter = if self.jitter_ms > 0 {
                        rand::thread_rng().gen_range(0..self.jitter_ms)
                    } else {
                        0
                    };
                    let delay = self.base_delay(attempt) + Duration::from_millis(jitter);
                    warn!("시도 {}/{} 실패, {:?} 후 재시도: {}", attempt, max_attempts, delay, e);
                    sleep(delay).await;
                }
            }
        }
    }
}
