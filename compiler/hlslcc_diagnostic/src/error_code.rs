use std::fmt;

/// Error codes for all cross-compiler diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E0xxx: Lexer
/// - E1xxx: Parser
/// - E2xxx: Semantic analysis (lowering to IR)
/// - E3xxx: Metal platform restrictions
/// - E9xxx: Internal compiler errors
///
/// W#### codes are warnings and never fail a compilation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Lexer Warnings (W0xxx)
    /// Unrecognized character skipped
    W0001,

    // Parser Errors (E1xxx)
    /// Unexpected token
    E1001,
    /// Expected expression
    E1002,
    /// Unclosed delimiter
    E1003,
    /// Expected identifier
    E1004,
    /// Expected type
    E1005,
    /// Qualifier given more than once
    E1006,
    /// `in`/`out` combined with `inout`
    E1007,
    /// Second `default` label in a switch
    E1008,
    /// Array dimension required here
    E1009,
    /// No rule of a required category matched
    E1010,
    /// Malformed attribute list
    E1011,
    /// Qualifier not allowed in this context
    E1012,

    // Semantic Errors (E2xxx)
    /// Unknown identifier
    E2001,
    /// Unknown type
    E2002,
    /// Invalid swizzle
    E2003,
    /// Wrong number of arguments
    E2004,
    /// Entry point not found
    E2005,
    /// Type mismatch
    E2006,
    /// Unknown struct field
    E2007,
    /// Unsupported construct
    E2008,
    /// Assignment target is not an lvalue
    E2009,
    /// No matching function
    E2010,
    /// Array dimension is not a constant
    E2011,
    /// Missing or invalid semantic on an entry point input or output
    E2012,
    /// Unknown method on a texture or buffer object
    E2013,
    /// Recursive function call
    E2014,

    // Platform Restrictions (E3xxx)
    /// Too many buffers bound
    E3001,
    /// Too many textures bound
    E3002,
    /// Too many samplers bound
    E3003,
    /// Double precision is not supported by Metal
    E3004,
    /// Shader stage not supported by Metal
    E3005,

    // Internal Errors (E9xxx)
    /// Code generator received IR it cannot print
    E9001,
    /// Lowering or optimizer invariant violated
    E9002,
}

impl ErrorCode {
    pub fn is_parser_error(&self) -> bool {
        self.as_str().starts_with("E1")
    }

    pub fn is_platform_restriction(&self) -> bool {
        self.as_str().starts_with("E3")
    }

    pub fn is_internal(&self) -> bool {
        self.as_str().starts_with("E9")
    }

    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::W0001 => "W0001",
            // Parser
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E1008 => "E1008",
            ErrorCode::E1009 => "E1009",
            ErrorCode::E1010 => "E1010",
            ErrorCode::E1011 => "E1011",
            ErrorCode::E1012 => "E1012",
            // Semantic
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
            // Platform
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            // Internal
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
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
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E1001.to_string(), "E1001");
        assert!(ErrorCode::E1008.is_parser_error());
        assert!(ErrorCode::E3002.is_platform_restriction());
        assert!(ErrorCode::E9001.is_internal());
        assert!(ErrorCode::W0001.is_warning());
        assert!(!ErrorCode::E2001.is_warning());
    }
}
