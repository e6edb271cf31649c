// Panic isolation around executor dispatch
// A panicking executor must not take the queue runner down with it
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Result of a panic-guarded call
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Call returned normally
    Returned(T),
    /// Call panicked; payload rendered as text
    Panicked(String),
}

/// Run `f`, converting a panic into `PanicGuardResult::Panicked`.
///
/// The closure is wrapped in `AssertUnwindSafe`: the engine discards the
/// dispatch entirely after a panic, so no half-updated state is observed.
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => PanicGuardResult::Returned(value),
        Err(payload) => {
            let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            error!(panic_msg = %panic_msg, "Import executor panicked during dispatch");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}
