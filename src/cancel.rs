use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};

/// Run `fut` until it completes or `cancel` fires, whichever comes first.
///
/// An already-cancelled token wins without polling `fut`, so no request leaves the process.
pub async fn run_cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    let Some(cancel) = cancel else {
        return fut.await;
    };

    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }

    tokio::select! {
        // Poll the token first so a cancel that lands with the result still wins.
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn pre_cancelled_token_skips_the_future() {
        let token = CancellationToken::new();
        token.cancel();

        let mut polled = false;
        let result: ClientResult<()> = run_cancellable(Some(&token), async {
            polled = true;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert!(!polled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_flight_returns_cancelled() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });

        let result: ClientResult<u8> = run_cancellable(Some(&token), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn no_token_just_awaits() {
        let result = run_cancellable(None, async { Ok::<_, ClientError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
