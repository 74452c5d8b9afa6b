//! Completion future returned by every storage operation

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// The deferred result of a storage operation
///
/// The value is computed when the operation is called; the completion only resolves
/// once the dispatcher has reached the turn scheduled for it. Awaiting it is the
/// equivalent of a completion callback, dropping it means "no callback".
pub struct Completion<T> {
    value: Option<T>,
    turn: oneshot::Receiver<()>,
}

impl<T> Completion<T> {
    /// Create a completion that yields `value` once `turn` fires
    ///
    /// A closed `turn` channel also resolves the completion, so a backend that is
    /// torn down never leaves a caller waiting forever.
    pub fn new(value: T, turn: oneshot::Receiver<()>) -> Self {
        Completion {
            value: Some(value),
            turn,
        }
    }
}

// The value is never pinned, only moved out on resolution.
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = &mut *self;
        match Pin::new(&mut this.turn).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(_) => Poll::Ready(
                this.value
                    .take()
                    .expect("Completion polled after it resolved"),
            ),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_pending_until_turn() {
        let (tx, rx) = oneshot::channel();
        let mut completion = task::spawn(Completion::new(7, rx));

        assert_pending!(completion.poll());

        tx.send(()).unwrap();
        assert!(completion.is_woken());
        assert_ready_eq!(completion.poll(), 7);
    }

    #[test]
    fn test_closed_turn_still_resolves() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut completion = task::spawn(Completion::new("value", rx));

        drop(tx);
        assert_ready_eq!(completion.poll(), "value");
    }
}
