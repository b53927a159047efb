//! Cooperative cancellation (spec §5, §9 "Cooperative cancellation").
//!
//! The granularity sweep (§4.C.1) and every O(n²) inner loop in post-
//! optimization (§4.C.5) poll an [`InterruptionToken`] at well-defined
//! points. On a positive poll the caller completes the current atomic step
//! and returns its best-so-far partition; no thread-local state, no
//! deadlines -- callers that want a wall-clock budget wrap the call
//! externally and flip the token from another thread or signal handler.

/// Injectable cancellation observer, replacing the teacher's progress-bar
/// style polling (`src/clustering/progress.rs`) with something the optimizer
/// can check mid-loop without owning a UI.
pub trait InterruptionToken: Send + Sync {
    /// true once cancellation has been requested; never becomes false again.
    fn is_requested(&self) -> bool;

    /// some callers only want to re-check every `freshness` polls (e.g. to
    /// avoid an atomic load every iteration of a tight loop); the default
    /// always says yes, so the check happens every time unless a caller
    /// opts into throttling.
    fn is_refresh_necessary(&self, _freshness: u64) -> bool {
        true
    }
}

/// a token that never fires; used where a caller has no cancellation source.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverInterrupted;

impl InterruptionToken for NeverInterrupted {
    fn is_requested(&self) -> bool {
        false
    }
}

/// an atomic flag-backed token, settable from any thread (e.g. a signal
/// handler or a UI "cancel" button living outside this crate).
#[derive(Debug, Default)]
pub struct FlagToken(std::sync::atomic::AtomicBool);

impl FlagToken {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicBool::new(false))
    }

    pub fn request(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl InterruptionToken for FlagToken {
    fn is_requested(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_interrupted_never_fires() {
        let token = NeverInterrupted;
        assert!(!token.is_requested());
    }

    #[test]
    fn flag_token_latches_once_requested() {
        let token = FlagToken::new();
        assert!(!token.is_requested());
        token.request();
        assert!(token.is_requested());
    }
}
