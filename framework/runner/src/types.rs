/// Recommended error type for the stress runner's `main` function and any wiring code around the
/// runner. Compatible with [anyhow] so you can use `?` to propagate errors.
pub type StressResult<T> = anyhow::Result<T>;
