use crate::error::Rejection;

/// How the output of an `implement` executor settles a promise.
///
/// A bare value resolves, `Result` resolves or rejects, and `Option` rejects
/// on `None`.
pub trait ExecutionResult<V> {
    fn into_outcome(self) -> Result<V, Rejection>;
}

impl<V> ExecutionResult<V> for V {
    fn into_outcome(self) -> Result<V, Rejection> {
        Ok(self)
    }
}

impl<V, E> ExecutionResult<V> for Result<V, E>
where
    E: Into<Rejection>,
{
    fn into_outcome(self) -> Result<V, Rejection> {
        self.map_err(Into::into)
    }
}

impl<V> ExecutionResult<V> for Option<V> {
    fn into_outcome(self) -> Result<V, Rejection> {
        self.ok_or_else(|| Rejection::msg("executor returned None"))
    }
}
