use crate::Coordinator;

use std::sync::Arc;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

///
/// A background task that runs `Coordinator::update` on every tick of the
/// scheduler interval, until it is shut down.
///
pub struct Scheduler {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Spawns the scheduler for the given coordinator on the current runtime.
pub fn spawn(coordinator: Arc<Coordinator>) -> Scheduler {
    let (shutdown, mut shutdown_signal) = oneshot::channel();
    let period = coordinator.environment().scheduler_interval();

    let handle = tokio::spawn(async move {
        info!("Starting the scheduler with an interval of {:?}", period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    debug!("The scheduler received a shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    // Queue maintenance only locks the queue, so it is cheap enough to run inline.
                    if let Err(update_error) = coordinator.update() {
                        error!("The scheduler failed to update the coordinator: {}", update_error);
                    }
                }
            }
        }

        info!("The scheduler has stopped");
    });

    Scheduler { handle, shutdown }
}

impl Scheduler {
    /// Stops the scheduler and waits for its last tick to finish.
    pub async fn shutdown(self) {
        // The receiver is gone only if the task already ended.
        let _ = self.shutdown.send(());
        if let Err(join_error) = self.handle.await {
            error!("The scheduler task failed: {}", join_error);
        }
    }
}
