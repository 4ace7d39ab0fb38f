//! Cooperative cancellation for coordinator runs

use appset_errors::Error;
use std::future::Future;
use tokio::sync::watch;

/// Drive `work` until it finishes or `cancel` turns true
///
/// Cancellation drops `work` at its current await point and returns
/// `Error::Cancelled`, leaving the caller free to clean up. A closed
/// channel never cancels.
pub(crate) async fn until_cancelled<T, F>(
    cancel: Option<&watch::Receiver<bool>>,
    work: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    let Some(cancel) = cancel else {
        return work.await;
    };
    let mut cancel = cancel.clone();
    tokio::select! {
        biased;
        () = requested(&mut cancel) => {
            tracing::debug!("run cancelled");
            Err(Error::Cancelled)
        }
        result = work => result,
    }
}

async fn requested(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
