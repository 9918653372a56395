//! Configuration-merge plumbing shared by `AppSettings`'s assembly step.

/// Assign to `dst` only if `src` is `Some`, leaving `dst` untouched
/// otherwise.
#[macro_export]
macro_rules! assign_if_some {
    ( $dst:expr, $src:expr ) => {{
        if let Some(x) = $src {
            $dst = x.into();
        };
    }};
}

/// Merge a fragment of configuration (CLI flags, a file, ...) into
/// already-defaulted runtime settings.
///
/// Implementations only overlay populated values from `options`, leaving
/// unset ones as whatever `self` already held.
pub trait MergeOptions<T> {
    /// Merge `options` into `self`.
    fn try_merge(&mut self, options: T) -> Result<(), crate::DpatchError>;
}
