// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The closed set of Solar types.

use std::fmt;
use std::str::FromStr;

/// A Solar type. Integers are 64-bit signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Void,
    Integer,
    Decimal,
    Text,
    Boolean,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Decimal)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "vazio",
            Type::Integer => "inteiro",
            Type::Decimal => "decimal",
            Type::Text => "texto",
            Type::Boolean => "booleano",
        };
        f.write_str(name)
    }
}

impl FromStr for Type {
    type Err = ();

    /// Parses a type annotation as it appears in source.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vazio" => Ok(Type::Void),
            "inteiro" => Ok(Type::Integer),
            "decimal" => Ok(Type::Decimal),
            "texto" => Ok(Type::Text),
            "booleano" => Ok(Type::Boolean),
            _ => Err(()),
        }
    }
}
