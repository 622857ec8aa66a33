use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Runs `tick` immediately, then sleeps `period + uniform[0, 1s)` between
/// iterations forever. A tick that errors is logged and does not stop
/// the loop.
pub async fn run_periodic<F, Fut>(label: &'static str, period: Duration, mut tick: F) -> !
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
{
    loop {
        if let Err(err) = tick().await {
            tracing::error!(loop_name = label, error = %err, "background loop iteration failed");
        }
        let jitter_ms = rand::rng().random_range(0..1000);
        tokio::time::sleep(period + Duration::from_millis(jitter_ms)).await;
    }
}
