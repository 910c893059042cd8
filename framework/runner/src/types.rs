/// Recommended error type for your scenario `main` function. This is what [crate::run::run]
/// returns so you can use `?` to propagate errors.
pub type ChaosLiteResult<T> = anyhow::Result<T>;
