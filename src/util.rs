use std::fmt;

/// Wraps a formatting closure as a `fmt::Display` value, used by the
/// `display(&Grammar)` accessors that need grammar context to render IDs.
pub struct FmtWith<F>(pub F);

impl<F> fmt::Display for FmtWith<F>
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.0)(f)
    }
}
