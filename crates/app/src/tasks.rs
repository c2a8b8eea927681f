//! Background Tasks
//!
//! Interval loops that run until the shutdown flag flips.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    domain::{carts::ValidationCache, orders::OrdersService},
    shutdown,
};

/// Longest period a loop waits between runs.
const MAX_PERIOD: Duration = Duration::from_secs(60 * 60 * 24 * 365);

fn ticker(period: Duration) -> time::Interval {
    let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
    let mut interval = time::interval_at(Instant::now() + period, period);

    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    interval
}

/// Periodically drop expired validation cache entries.
pub fn spawn_cache_sweeper(
    cache: Arc<ValidationCache>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = ticker(period);

        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                _ = interval.tick() => {
                    let removed = cache.sweep();

                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "swept validation cache");
                    }
                }
            }
        }

        debug!("validation cache sweeper stopped");
    })
}

/// Periodically settle compensations that failed or were never attempted.
pub fn spawn_compensation_retrier(
    orders: Arc<dyn OrdersService>,
    period: Duration,
    batch_size: u32,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = ticker(period);

        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                _ = interval.tick() => {
                    match orders.retry_compensations(batch_size).await {
                        Ok(report) if report.settled > 0 || report.failed > 0 => {
                            info!(
                                settled = report.settled,
                                failed = report.failed,
                                "retried pending compensations"
                            );
                        }
                        Ok(_) => {}
                        Err(error) => warn!(%error, "compensation retry failed"),
                    }
                }
            }
        }

        debug!("compensation retrier stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use testresult::TestResult;

    use super::*;
    use crate::domain::{
        catalog::records::ProductUuid,
        orders::{CompensationReport, MockOrdersService},
        stock::{VariantSnapshot, VariantStock},
    };

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_entries_until_shutdown() -> TestResult {
        let cache = Arc::new(ValidationCache::new(Duration::from_secs(5)));
        let (notify, receiver) = shutdown::channel();

        cache.put(
            ProductUuid::new(),
            None,
            VariantSnapshot {
                active: true,
                unit_price: 100,
                stock: VariantStock::Untracked,
            },
        );

        let handle = spawn_cache_sweeper(Arc::clone(&cache), Duration::from_secs(10), receiver);

        time::sleep(Duration::from_secs(11)).await;

        assert!(cache.is_empty(), "expired entry should be swept");

        notify.send_replace(true);
        handle.await?;

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn retrier_runs_on_every_tick() -> TestResult {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut orders = MockOrdersService::new();

        orders
            .expect_retry_compensations()
            .withf(|limit| *limit == 25)
            .returning(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);

                Ok(CompensationReport {
                    settled: 1,
                    failed: 0,
                })
            });

        let (notify, receiver) = shutdown::channel();
        let handle =
            spawn_compensation_retrier(Arc::new(orders), Duration::from_secs(30), 25, receiver);

        time::sleep(Duration::from_secs(95)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3, "one retry per elapsed period");

        notify.send_replace(true);
        handle.await?;

        Ok(())
    }

    #[tokio::test]
    async fn dropping_the_sender_stops_tasks() -> TestResult {
        let cache = Arc::new(ValidationCache::new(Duration::from_secs(5)));
        let (notify, receiver) = shutdown::channel();

        let handle = spawn_cache_sweeper(cache, Duration::from_secs(3600), receiver);

        drop(notify);
        handle.await?;

        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_periods_are_clamped() -> TestResult {
        let cache = Arc::new(ValidationCache::new(Duration::from_secs(5)));
        let (notify, receiver) = shutdown::channel();

        let idle = spawn_cache_sweeper(Arc::clone(&cache), Duration::MAX, receiver.clone());
        let busy = spawn_cache_sweeper(cache, Duration::ZERO, receiver);

        time::sleep(Duration::from_millis(20)).await;

        notify.send_replace(true);
        idle.await?;
        busy.await?;

        Ok(())
    }
}
