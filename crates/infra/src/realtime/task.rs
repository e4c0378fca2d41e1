//! Timer-driven control loop

use super::EqController;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

/// Shortest tick interval the control task accepts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Run [`EqController::tick`] every `interval` on the tokio runtime
///
/// The task ends on its own once the renderer has been dropped; abort the
/// handle to stop it earlier.
pub fn spawn_control_task(mut controller: EqController, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = interval.as_millis() as u64,
            "Control task started"
        );

        loop {
            ticker.tick().await;
            controller.tick();

            if controller.is_disconnected() {
                info!("Renderer dropped, stopping control task");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::split;
    use bellcurve_core::domain::{ChainUpdate, ParameterId, ParameterSource, ParameterStore};
    use std::sync::Arc;
    use tokio::time::timeout;

    const SAMPLE_RATE: f64 = 48000.0;

    #[tokio::test]
    async fn test_control_task_publishes_changes() {
        let store = Arc::new(ParameterStore::new());
        let (controller, mut renderer) = split(store.clone(), SAMPLE_RATE, 64, 4).unwrap();
        let mut updates = controller.subscribe();
        let handle = spawn_control_task(controller, Duration::from_millis(5));

        store.set(ParameterId::PeakFreq, 2000.0);
        store.set(ParameterId::PeakGain, -6.0);

        timeout(Duration::from_secs(2), updates.changed())
            .await
            .expect("no snapshot published")
            .unwrap();

        // Let a follow-up tick pick up anything that raced the first one
        time::sleep(Duration::from_millis(30)).await;
        let expected = ChainUpdate::compute(&store.chain_settings(), SAMPLE_RATE);
        assert_eq!(*updates.borrow(), expected);

        let mut left = vec![0.0_f32; 64];
        renderer.process_block(&mut [left.as_mut_slice()], 64);
        assert_eq!(renderer.current(), expected);

        handle.abort();
    }

    #[tokio::test]
    async fn test_control_task_stops_when_renderer_dropped() {
        let store = Arc::new(ParameterStore::new());
        let (controller, renderer) = split(store.clone(), SAMPLE_RATE, 64, 4).unwrap();
        let handle = spawn_control_task(controller, Duration::from_millis(5));

        drop(renderer);
        store.set(ParameterId::HighCutFreq, 10000.0);

        let finished = timeout(Duration::from_secs(2), handle).await;
        assert!(finished.is_ok());
    }
}
