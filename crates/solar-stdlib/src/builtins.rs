//! The standard built-in set: `imprime`, `soma`, `abs`.

use solar_ast::Type;

use crate::registry::{ArgRule, Builtin, BuiltinKind, BuiltinRegistry};

fn soma(args: &[i64]) -> i64 {
    args.iter().sum()
}

fn abs(args: &[i64]) -> i64 {
    args[0].wrapping_abs()
}

/// Builds the registry every compilation starts from.
pub fn default_builtins() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::empty();

    registry.register(Builtin {
        name: "imprime",
        min_args: 1,
        max_args: None,
        args: ArgRule::IntegerOrBoolean,
        ret: Type::Integer,
        kind: BuiltinKind::Print,
    });

    registry.register(Builtin {
        name: "soma",
        min_args: 2,
        max_args: None,
        args: ArgRule::Integer,
        ret: Type::Integer,
        kind: BuiltinKind::Pure(soma),
    });

    registry.register(Builtin {
        name: "abs",
        min_args: 1,
        max_args: Some(1),
        args: ArgRule::Integer,
        ret: Type::Integer,
        kind: BuiltinKind::Pure(abs),
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_is_registered() {
        let registry = default_builtins();
        assert!(registry.is_builtin("imprime"));
        assert!(registry.is_builtin("soma"));
        assert!(registry.is_builtin("abs"));
        assert!(!registry.is_builtin("quadrado"));
        assert_eq!(registry.names(), vec!["abs", "imprime", "soma"]);
    }

    #[test]
    fn pure_implementations() {
        assert_eq!(soma(&[1, 2, 3]), 6);
        assert_eq!(abs(&[-7]), 7);
        assert_eq!(abs(&[7]), 7);
    }

    #[test]
    fn imprime_accepts_booleans() {
        let registry = default_builtins();
        let imprime = registry.get("imprime").unwrap();
        assert!(imprime.args.accepts(Type::Boolean));
        assert!(imprime.args.accepts(Type::Integer));
        assert!(!imprime.args.accepts(Type::Text));

        let soma = registry.get("soma").unwrap();
        assert!(!soma.args.accepts(Type::Boolean));
    }
}
