use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SETTLED_CAPACITY: usize = 16;

/// Sending half of a debounce task.
///
/// Every value pushed within `quiet` of the previous one replaces it. Once no
/// value arrived for `quiet`, the last one is delivered to the receiver that
/// [`Debouncer::spawn`] returned.
#[derive(Debug)]
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn(quiet: Duration, token: CancellationToken) -> (Self, mpsc::Receiver<T>) {
        let (input, pushed) = mpsc::unbounded_channel();
        let (settled, output) = mpsc::channel(SETTLED_CAPACITY);
        let task = tokio::spawn(run(quiet, pushed, settled, token));

        (Self { input, task }, output)
    }

    /// Returns `false` once the task has stopped.
    pub fn push(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run<T>(
    quiet: Duration,
    mut pushed: mpsc::UnboundedReceiver<T>,
    settled: mpsc::Sender<T>,
    token: CancellationToken,
) {
    let mut pending: Option<T> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!("Debouncer cancelled");
                return;
            }
            value = pushed.recv() => match value {
                Some(value) => {
                    pending = Some(value);
                    deadline = Instant::now() + quiet;
                }
                None => break,
            },
            () = time::sleep_until(deadline), if pending.is_some() => {
                if let Some(value) = pending.take()
                    && settled.send(value).await.is_err()
                {
                    return;
                }
            }
        }
    }

    // Every sender is gone; deliver what is left once it has settled.
    if let Some(value) = pending {
        tokio::select! {
            () = token.cancelled() => {}
            () = time::sleep_until(deadline) => {
                let _ = settled.send(value).await;
            }
        }
    }
}
