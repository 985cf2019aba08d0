use std::fmt;

/// Error codes for all front-end diagnostics.
///
/// Format: E#### where the first digit is the phase:
/// - E2xxx: binding errors
/// - E4xxx: reference-safety errors
/// - E5xxx: platform support errors
/// - W2xxx: binding warnings
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ErrorCode {
    // Binding Errors (E2xxx)
    /// Cannot apply indexing to an expression of this type
    E2001,
    /// Named argument in an element access
    E2002,
    /// Element access argument passed with `ref`, `in` or `out`
    E2003,
    /// Member cannot be initialized with an element initializer
    E2004,
    /// Type used where a value is expected
    E2005,
    /// Ambiguous user-defined conversions
    E2006,
    /// No conversion exists between the types
    E2007,
    /// Left-hand side of an assignment is not a variable
    E2008,
    /// Member is obsolete (error form)
    E2009,

    // Reference-Safety Errors (E4xxx)
    /// Cannot assign to a read-only variable
    E4001,
    /// Cannot take a mutable reference to a read-only variable
    E4002,
    /// A `ref` or `out` value must be an assignable variable
    E4003,
    /// Expression cannot be used in this context because it may not be passed or returned by reference
    E4004,
    /// Cannot initialize a by-reference variable with a value
    E4005,
    /// Cannot return a by-value parameter by reference
    E4006,
    /// Cannot return a member of `this` by reference in a value type
    E4007,
    /// Cannot return a ref local by reference; it refers to storage that does not outlive the call
    E4008,
    /// Variable may expose referenced storage outside of its declaration scope
    E4009,
    /// Cannot return a local by reference
    E4010,

    // Platform Errors (E5xxx)
    /// Missing required platform primitive
    E5001,

    // Binding Warnings (W2xxx)
    /// Member is obsolete
    W2001,
}

impl ErrorCode {
    /// The code as written in output (e.g. `"E4006"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            ErrorCode::E4008 => "E4008",
            ErrorCode::E4009 => "E4009",
            ErrorCode::E4010 => "E4010",
            ErrorCode::E5001 => "E5001",
            ErrorCode::W2001 => "W2001",
        }
    }

    /// Reference-safety codes (E4xxx), shared by every reference-like
    /// construct rather than specific to buffers.
    pub fn is_ref_safety(&self) -> bool {
        self.as_str().starts_with("E4")
    }

    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
