#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! Macros for use with forkpool.

mod entry;
mod parse;

/// Runs a test body on a freshly built `ThreadPool`.
///
/// The body executes on one of the pool's workers, so `forkpool::join` and
/// `forkpool::submit` fork onto the pool without an explicit handle. The pool
/// is shut down once the body returns.
///
/// # Options
///
/// - `worker_threads = N`: number of workers, defaults to the number of cores.
/// - `thread_name = "name"`: name given to every worker thread.
///
/// # Usage
///
/// ```no_run
/// #[forkpool::test(worker_threads = 2)]
/// fn my_test() {
///     let (a, b) = forkpool::join(|| 1, || 2);
///     assert_eq!(a + b, 3);
/// }
/// ```
///
/// Equivalent code not using `#[forkpool::test]`
///
/// ```no_run
/// #[test]
/// fn my_test() {
///     let pool = forkpool::runtime::Builder::new()
///         .worker_threads(2)
///         .try_build()
///         .unwrap();
///
///     pool.install(|| {
///         let (a, b) = forkpool::join(|| 1, || 2);
///         assert_eq!(a + b, 3);
///     })
///     .unwrap();
///
///     pool.shutdown().unwrap();
/// }
/// ```
///
/// The test function may return a value, typically `anyhow::Result<()>`, which
/// is handed back to the test harness.
#[proc_macro_attribute]
pub fn test(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    entry::test(args.into(), item.into()).into()
}
