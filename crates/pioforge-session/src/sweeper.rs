//! Background expiry sweep shared by both token registries.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A registry that can drop its expired entries.
pub trait Sweep: Send + Sync + 'static {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Removes expired entries and returns how many were removed.
    fn sweep_expired(&self) -> usize;
}

/// Sweeps `target` immediately and then every `every`.
///
/// Holds only a `Weak` reference: the loop ends when the registry is
/// dropped or `cancel` fires, whichever comes first.
pub fn spawn_sweeper<S: Sweep>(
    target: Weak<S>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let Some(registry) = target.upgrade() else {
                break;
            };
            let removed = registry.sweep_expired();
            if removed > 0 {
                tracing::debug!(registry = registry.name(), removed, "expired entries swept");
            }
        }
    })
}
