//! Supporting utility types and logging macros.

/// Trace at `trace` level. No-op cost when the subscriber drops the level.
macro_rules! trace {
    ($($tt:tt)*) => {
        tracing::trace!($($tt)*)
    };
}

/// Create and enter a `Span` for the duration of the current scope.
macro_rules! span {
    ($($tt:tt)*) => {
        let s = tracing::trace_span!($($tt)*);
        let _s = s.enter();
    };
}

pub(crate) use trace;
pub(crate) use span;
