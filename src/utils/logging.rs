//! Logging macros that can be silenced per module.
//!
//! A module opts in by declaring `const ENABLE_LOGS: bool` and importing the
//! macros from the crate root:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_warn!("{source} page {cursor} failed: {err}");
//! ```
//!
//! With the flag off the calls compile to nothing, so noisy loops such as
//! pagination can be muted without touching the global `RUST_LOG` filter.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    mod muted {
        const ENABLE_LOGS: bool = false;

        pub fn emit(counter: &mut u32) {
            crate::log_info!("{}", {
                *counter += 1;
                *counter
            });
        }
    }

    #[test]
    fn muted_module_skips_argument_evaluation() {
        let mut counter = 0;
        muted::emit(&mut counter);
        assert_eq!(counter, 0);
    }
}
