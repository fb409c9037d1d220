use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a job and whoever may stop it.
pub type CancellationToken = Arc<AtomicBool>;

pub fn new_token() -> CancellationToken {
    Arc::new(AtomicBool::new(false))
}

/// Checks if the cancellation token has been triggered.
#[inline]
pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(Ordering::SeqCst)
}

pub fn cancel(token: &CancellationToken) {
    token.store(true, Ordering::SeqCst);
}

/// Clear a previous cancellation so the token can guard the next job.
pub fn reset(token: &CancellationToken) {
    token.store(false, Ordering::SeqCst);
}
