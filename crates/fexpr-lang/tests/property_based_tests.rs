//! Property-based tests for the fexpr grammar.
use fexpr_lang::{Context, NoLookup, Record, Value};
use proptest::prelude::*;

mod strategies {
    use super::*;

    /// Generates attribute names that do not collide with keywords.
    pub fn field_name() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,8}".prop_filter("Avoid keywords", |s| {
            !matches!(
                s.as_str(),
                "and" | "or" | "not" | "like" | "true" | "false" | "null"
            )
        })
    }

    pub fn literal() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..10_000).prop_map(|n| n.to_string()),
            (0u32..10_000, 1u32..10_000_000).prop_map(|(i, f)| format!("{}.{}", i, f)),
            "[a-zA-Z0-9 ]{0,8}".prop_map(|s| format!("'{}'", s)),
            Just("true".to_string()),
            Just("null".to_string()),
        ]
    }

    pub fn leaf() -> impl Strategy<Value = String> {
        prop_oneof![
            literal(),
            field_name().prop_map(|name| format!("{{{}}}", name)),
        ]
    }

    /// Generates syntactically valid expressions.
    pub fn expr() -> impl Strategy<Value = String> {
        leaf().prop_recursive(4, 32, 3, |inner| {
            let op = prop::sample::select(vec![
                "+", "-", "*", "/", "%", "=", "!=", "<", "<=", ">", ">=", "and", "or", "like",
            ]);
            prop_oneof![
                (inner.clone(), op, inner.clone())
                    .prop_map(|(lhs, op, rhs)| format!("{} {} {}", lhs, op, rhs)),
                inner.clone().prop_map(|e| format!("({})", e)),
                inner.clone().prop_map(|e| format!("not {}", e)),
                prop::collection::vec(inner.clone(), 1..3)
                    .prop_map(|args| format!("coalesce({})", args.join(", "))),
                (inner.clone(), field_name())
                    .prop_map(|(e, name)| format!("getFeature('ds', 'id', {}).{}", e, name)),
            ]
        })
    }
}

proptest! {
    #[test]
    fn tokenize_and_parse_never_panic(code in "\\PC{0,40}") {
        let _ = fexpr_lang::parse(&code);
    }

    #[test]
    fn generated_expressions_parse(code in strategies::expr()) {
        prop_assert!(fexpr_lang::parse(&code).is_ok(), "failed to parse {}", code);
    }

    #[test]
    fn printed_tree_reparses_to_same_tree(code in strategies::expr()) {
        let printed = fexpr_lang::parse(&code).unwrap().to_string();
        prop_assert_eq!(fexpr_lang::parse(&printed).unwrap().to_string(), printed);
    }

    #[test]
    fn number_text_parses_back_to_same_number(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let number = fexpr_lang::Number::new(n);
        prop_assert_eq!(fexpr_lang::Number::parse(&number.to_string()), Some(number));
    }

    #[test]
    fn evaluation_without_lookup_never_fails(code in strategies::expr(), quantity in 0i64..100) {
        let record = Record::new().with("quantity", quantity);
        let mut lookup = NoLookup;
        let mut ctx = Context::new(&record, &mut lookup);

        prop_assert!(fexpr_lang::eval(&code, &mut ctx).is_ok());
    }

    #[test]
    fn missing_lookups_are_none(name in strategies::field_name()) {
        let record = Record::new();
        let mut lookup = NoLookup;
        let mut ctx = Context::new(&record, &mut lookup);
        let code = format!("getFeature('ds', 'id', 1).{}", name);

        prop_assert_eq!(fexpr_lang::eval(&code, &mut ctx).unwrap(), Value::None);
    }
}
