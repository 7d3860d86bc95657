//! Cycle-accurate stimulus and handshake driver for a block-cipher core, on top of a small
//! event-driven simulation kernel with an async testbench executor.

mod busy_core;
mod dut;
mod error;
mod executor;
mod junit;
mod kernel;
pub mod prelude;
pub mod runner;
pub mod scenario;
mod shared;
mod signal;
mod sim;
pub mod testbench;
mod trigger;
pub mod utils;
mod value;

#[doc(hidden)]
pub use log;

/// Installs the `env_logger` backend; `RUST_LOG` overrides the default `info` filter.
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init();
}

/// Generates a `main` that runs the listed `async fn(Sim) -> SimResult<String>` tests
/// against fresh instances of `$model` and exits non-zero if any of them failed.
#[macro_export]
macro_rules! run_with_model {
    ($model:expr, $( $i:ident ),+) => {
        fn main() {
            $crate::init_logging();
            let runner = $crate::runner::Runner::new(std::module_path!(), || $model)
                $(.test(stringify!($i), $i))+;
            match runner.run() {
                Ok(outcomes) if $crate::runner::all_passed(&outcomes) => {}
                Ok(_) => std::process::exit(1),
                Err(e) => {
                    $crate::log::error!("{}", e);
                    std::process::exit(2);
                }
            }
        }
    };
}
