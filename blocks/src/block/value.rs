use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Boolean,
}

impl ValueKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
        }
    }
}

/// A literal leaf. Both payload fields always exist; `kind` says which one
/// is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBlock {
    pub kind: ValueKind,
    pub integer_value: i64,
    pub boolean_value: bool,
}

impl ValueBlock {
    pub fn integer(value: i64) -> Self {
        ValueBlock {
            kind: ValueKind::Integer,
            integer_value: value,
            boolean_value: false,
        }
    }

    pub fn boolean(value: bool) -> Self {
        ValueBlock {
            kind: ValueKind::Boolean,
            integer_value: 0,
            boolean_value: value,
        }
    }

    /// The integer payload, or `None` for a boolean literal.
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Integer => Some(self.integer_value),
            ValueKind::Boolean => None,
        }
    }
}

impl fmt::Display for ValueBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Integer => write!(f, "{}", self.integer_value),
            ValueKind::Boolean => write!(f, "{}", self.boolean_value),
        }
    }
}
