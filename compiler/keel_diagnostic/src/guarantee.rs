use std::fmt;

/// Proof that at least one error diagnostic was emitted.
///
/// The private field keeps construction inside this crate: the only ways to
/// get one are [`DiagnosticQueue::emit_error`](crate::DiagnosticQueue::emit_error)
/// and [`ErrorGuaranteed::from_error_count`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) fn new() -> Self {
        ErrorGuaranteed(())
    }

    /// Recover a guarantee from an error count collected elsewhere.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then(Self::new)
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error(s) emitted")
    }
}
