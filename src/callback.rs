//! Callback-style completion
//!
//! Store operations are plain futures returning `Result`. Callers that want
//! the callback convention attach an observer here; it runs exactly once with
//! the operation's result, on success and on every error path.

use std::future::Future;

/// Await `operation`, hand its result to `callback` (if any), then return it
pub async fn with_callback<T, E, Fut, F>(operation: Fut, callback: Option<F>) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    F: FnOnce(&Result<T, E>),
{
    let result = operation.await;
    if let Some(callback) = callback {
        callback(&result);
    }
    result
}
