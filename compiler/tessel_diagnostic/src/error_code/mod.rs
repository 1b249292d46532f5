use std::fmt;

/// Error codes for all model-construction diagnostics.
///
/// Format: E#### / W#### where the first digit indicates the layer:
/// - E1xxx: Type system errors
/// - E2xxx: Specialization model errors
/// - W2xxx: Specialization model warnings
/// - E9xxx: Internal errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Type System Errors (E1xxx)
    /// Type declared twice
    E1001,
    /// Unknown type referenced
    E1002,
    /// No implicit cast between two types
    E1003,
    /// Cycle in the implicit-cast relation
    E1004,

    // Model Errors (E2xxx)
    /// Duplicate specialization name
    E2001,
    /// Expression references an unbound name
    E2002,
    /// Expression calls an unknown host function
    E2003,
    /// Signature arity mismatch
    E2004,
    /// `contains` references an unknown specialization
    E2005,
    /// `contains` references a specialization declared later
    E2006,
    /// Cycle in `contains`
    E2007,
    /// More than one fallback
    E2008,
    /// Fallback declares guards, caches, assumptions, or non-generic types
    E2009,
    /// Limit expression is not a constant expression
    E2010,
    /// Guard references an adopted (child node) cache
    E2011,
    /// Cache initializer references a cache declared after it
    E2012,
    /// Name bound twice in one specialization
    E2013,
    /// Unreachable specialization (when configured as an error)
    E2014,

    // Model Warnings (W2xxx)
    /// Unreachable specialization
    W2001,
    /// Limit declared on a specialization without caches
    W2002,

    // Internal Errors (E9xxx)
    /// Internal error
    E9001,
}

impl ErrorCode {
    /// Get the code as a string (e.g., "E2005").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E2010 => "E2010",
            ErrorCode::E2011 => "E2011",
            ErrorCode::E2012 => "E2012",
            ErrorCode::E2013 => "E2013",
            ErrorCode::E2014 => "E2014",
            ErrorCode::W2001 => "W2001",
            ErrorCode::W2002 => "W2002",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Check if this is a type system error (E1xxx range).
    pub fn is_type_system_error(&self) -> bool {
        self.as_str().starts_with("E1")
    }

    /// Check if this is a warning code (Wxxxx range).
    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::E1003.to_string(), "E1003");
        assert_eq!(ErrorCode::W2001.as_str(), "W2001");
    }

    #[test]
    fn error_code_ranges() {
        assert!(ErrorCode::E1004.is_type_system_error());
        assert!(!ErrorCode::E2004.is_type_system_error());
        assert!(ErrorCode::W2002.is_warning());
        assert!(!ErrorCode::E9001.is_warning());
    }
}
