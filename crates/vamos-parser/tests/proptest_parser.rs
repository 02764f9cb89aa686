//! Property-based tests for the VAMOS parser.
//!
//! Verifies that the parser never panics on arbitrary input and that
//! parsing is deterministic.

use proptest::prelude::*;

/// Strategy that generates random strings of printable ASCII + whitespace.
fn arbitrary_source() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\x00', '\x7f'), 0..512)
        .prop_map(|chars| chars.into_iter().collect::<String>())
}

/// Strategy that generates syntactically plausible VAMOS programs.
fn plausible_vamos() -> impl Strategy<Value = String> {
    // lowercase prefix keeps generated names clear of keywords
    let type_name = "T[A-Za-z0-9]{0,12}";
    let source_name = "s_[a-z0-9]{0,8}";
    let guard = prop_oneof![
        Just("where x > 0".to_string()),
        Just("where x == 1 and x < 100".to_string()),
        Just("".to_string()),
    ];
    let bufsize = prop_oneof![Just(8usize), Just(64), Just(1024)];

    (type_name, source_name, guard, bufsize).prop_map(|(ty, src, guard, bufsize)| {
        format!(
            r#"
            stream type {ty} {{ Ev(x : int); }}
            event source {src} : {ty} buffer size {bufsize};
            arbiter : {ty} {{
                rule set rs {{
                    on {src} : Ev(x) {guard} {{
                        yield Ev(x);
                        drop 1 from {src};
                    }}
                }}
            }}
            monitor {{
                on Ev(x) $$ printf("%d\n", x); $$
            }}
            "#
        )
    })
}

proptest! {
    /// The parser must never panic on arbitrary input.
    #[test]
    fn parser_never_panics(source in arbitrary_source()) {
        // We only care that this doesn't panic — errors are fine.
        let _ = vamos_parser::parse(&source);
    }

    /// Plausible VAMOS programs should parse successfully.
    #[test]
    fn plausible_vamos_parses(source in plausible_vamos()) {
        let result = vamos_parser::parse(&source);
        prop_assert!(
            result.is_ok(),
            "Expected plausible VAMOS to parse successfully, got error on input:\n{}\nError: {:?}",
            source,
            result.err()
        );
    }

    /// Parsing should be deterministic: same input -> same result.
    #[test]
    fn parsing_is_deterministic(source in arbitrary_source()) {
        let r1 = vamos_parser::parse(&source);
        let r2 = vamos_parser::parse(&source);
        match (r1, r2) {
            (Ok(p1), Ok(p2)) => {
                prop_assert_eq!(
                    format!("{:?}", p1),
                    format!("{:?}", p2),
                    "Same input should produce identical AST"
                );
            }
            (Err(_), Err(_)) => {} // Both failed — consistent
            _ => prop_assert!(false, "Determinism violation: one parse succeeded, the other failed"),
        }
    }

    /// Substitution happens on whole tokens only, before lexing.
    #[test]
    fn substitution_never_rewrites_identifier_tails(n in 1u32..100_000) {
        let mut values = std::collections::HashMap::new();
        values.insert("BUFSIZE".to_string(), n.to_string());
        let source = "buffer size @BUFSIZE; # @BUFSIZED stays";
        let out = vamos_parser::substitute_placeholders(source, &values);
        let expected = format!("buffer size {};", n);
        prop_assert!(out.contains(&expected));
        prop_assert!(out.contains("@BUFSIZED"));
    }
}
