//! Semantic validation for VAMOS programs.
//!
//! Two-pass validation:
//! - **Pass 1**: Collect declarations, detect duplicates and reserved
//!   names, reject empty stream types.
//! - **Pass 2**: Validate references and shapes across sources,
//!   processors, buffer groups, arbiter rules and the monitor.
//!
//! Every error class of the compiler surfaces here with a stable code;
//! the emitter runs only on programs that validated without errors.

mod checks;
mod scope;

use crate::ast::Program;
use crate::span::Span;
use scope::SymbolTable;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A related source location (e.g. "previously declared here").
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub message: String,
}

/// A single diagnostic produced by semantic validation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub code: Option<&'static str>,
    pub hint: Option<String>,
    pub related: Vec<RelatedSpan>,
}

/// Result of semantic validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK).
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Format all diagnostics into a human-readable string.
    pub fn format(&self, source: &str) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            let (line, col) = d.span.line_col(source);
            let prefix = match d.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            let code_str = d.code.map(|c| format!("[{}] ", c)).unwrap_or_default();
            out.push_str(&format!(
                "{}:{}: {} {}{}\n",
                line, col, prefix, code_str, d.message
            ));
            if let Some(ref hint) = d.hint {
                out.push_str(&format!("  hint: {}\n", hint));
            }
            for rel in &d.related {
                let (rl, rc) = rel.span.line_col(source);
                out.push_str(&format!("  {}:{}: {}\n", rl, rc, rel.message));
            }
        }
        out
    }
}

/// Convert byte offset to 1-indexed line:column.
pub fn diagnostic_position(source: &str, position: usize) -> (usize, usize) {
    crate::span::offset_to_line_col(source, position)
}

/// Internal validator state.
struct Validator {
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    /// Capacity backing sources without a `buffer size` clause.
    default_buffer_size: usize,
}

impl Validator {
    fn new(default_buffer_size: usize) -> Self {
        Self {
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            default_buffer_size,
        }
    }

    fn emit(&mut self, severity: Severity, span: Span, code: &'static str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            span,
            message,
            code: Some(code),
            hint: None,
            related: Vec::new(),
        });
    }

    fn emit_with_hint(
        &mut self,
        severity: Severity,
        span: Span,
        code: &'static str,
        message: String,
        hint: String,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            span,
            message,
            code: Some(code),
            hint: Some(hint),
            related: Vec::new(),
        });
    }

    fn emit_with_related(
        &mut self,
        severity: Severity,
        span: Span,
        code: &'static str,
        message: String,
        related: Vec<RelatedSpan>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            span,
            message,
            code: Some(code),
            hint: None,
            related,
        });
    }
}

/// Validate a parsed VAMOS program.
///
/// `default_buffer_size` is the `--bufsize` value; it only affects the
/// head-longer-than-buffer warning for sources without an explicit
/// capacity.
pub fn validate(program: &Program, default_buffer_size: usize) -> ValidationResult {
    let mut v = Validator::new(default_buffer_size);

    // Pass 1: collect declarations, detect duplicates and reserved names
    checks::pass1_declarations(&mut v, program);

    // Pass 2: reference and shape checks
    checks::pass2_semantic(&mut v, program);

    ValidationResult {
        diagnostics: v.diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::span::Spanned;
    use crate::types::FieldType;

    fn stream_type(name: &str, events: Vec<EventDecl>) -> Component {
        Component::StreamType(StreamTypeDecl {
            name: name.to_string(),
            shared_args: vec![],
            events,
        })
    }

    fn event(name: &str, fields: &[&str]) -> EventDecl {
        EventDecl {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|f| Field {
                    name: f.to_string(),
                    ty: FieldType::Int,
                })
                .collect(),
        }
    }

    fn source(name: &str) -> Component {
        Component::EventSource(EventSourceDecl {
            name: name.to_string(),
            count: None,
            stream_type: "S".to_string(),
            processor: None,
            connection: None,
            with_args: vec![],
            buffer_size: None,
        })
    }

    fn rule(source: &str, event: &str, binders: &[&str]) -> MatchRule {
        MatchRule {
            chooser: None,
            patterns: vec![HeadPattern {
                source: source.to_string(),
                events: vec![EventPattern {
                    event: event.to_string(),
                    binders: binders.iter().map(|b| b.to_string()).collect(),
                }],
            }],
            guard: None,
            actions: vec![
                Action::Yield {
                    event: event.to_string(),
                    args: binders.iter().map(|b| Expr::Ident(b.to_string())).collect(),
                },
                Action::Drop {
                    count: 1,
                    source: source.to_string(),
                },
            ],
        }
    }

    fn program(components: Vec<Component>, rules: Vec<MatchRule>) -> Program {
        Program {
            components: components.into_iter().map(Spanned::dummy).collect(),
            arbiter: Spanned::dummy(Arbiter {
                output_type: "S".to_string(),
                rule_sets: vec![RuleSet {
                    name: "rs".to_string(),
                    rules,
                }],
            }),
            monitor: Spanned::dummy(Monitor {
                buffer_size: None,
                rules: vec![],
            }),
        }
    }

    fn base_program() -> Program {
        program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![rule("s", "A", &["x"])],
        )
    }

    fn has_code(result: &ValidationResult, code: &str) -> bool {
        result.diagnostics.iter().any(|d| d.code == Some(code))
    }

    #[test]
    fn test_valid_program_clean() {
        let result = validate(&base_program(), 64);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_stream_type() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                stream_type("S", vec![event("B", &["y"])]),
                source("s"),
            ],
            vec![rule("s", "A", &["x"])],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E001"));
    }

    #[test]
    fn test_reserved_keyword_as_name() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["while"])]),
                source("s"),
            ],
            vec![rule("s", "A", &["x"])],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E002"));
    }

    #[test]
    fn test_zero_event_stream_type_rejected() {
        let prog = program(
            vec![stream_type("S", vec![]), source("s")],
            vec![],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E020"));
    }

    #[test]
    fn test_unknown_stream_type_in_source() {
        let mut prog = base_program();
        if let Component::EventSource(decl) = &mut prog.components[1].node {
            decl.stream_type = "Missing".to_string();
        }
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E010"));
    }

    #[test]
    fn test_unknown_event_in_pattern() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![rule("s", "Nope", &[])],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E012"));
    }

    #[test]
    fn test_unknown_buffer_group_in_chooser() {
        let mut r = rule("s", "A", &["x"]);
        r.chooser = Some(Chooser {
            order: ChooseOrder::First,
            count: 1,
            group: "Ghost".to_string(),
            aliases: vec![],
        });
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![r],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E013"));
    }

    #[test]
    fn test_pattern_arity_mismatch() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![rule("s", "A", &["x", "y"])],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E021"));
    }

    #[test]
    fn test_source_participating_twice() {
        let mut r = rule("s", "A", &["x"]);
        r.patterns.push(HeadPattern {
            source: "s".to_string(),
            events: vec![EventPattern {
                event: "A".to_string(),
                binders: vec!["y".to_string()],
            }],
        });
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![r],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E023"));
    }

    #[test]
    fn test_drop_from_non_participant() {
        let mut r = rule("s", "A", &["x"]);
        r.actions.push(Action::Drop {
            count: 1,
            source: "other".to_string(),
        });
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
                source("other"),
            ],
            vec![r],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E024"));
    }

    #[test]
    fn test_rule_must_yield_exactly_once() {
        let mut r = rule("s", "A", &["x"]);
        r.actions.retain(|a| matches!(a, Action::Drop { .. }));
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![r],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E025"));
    }

    #[test]
    fn test_yield_outside_output_type() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                stream_type("T", vec![event("B", &["y"])]),
                source("s"),
            ],
            vec![MatchRule {
                chooser: None,
                patterns: vec![HeadPattern {
                    source: "s".to_string(),
                    events: vec![EventPattern {
                        event: "A".to_string(),
                        binders: vec!["x".to_string()],
                    }],
                }],
                guard: None,
                actions: vec![Action::Yield {
                    event: "B".to_string(),
                    args: vec![Expr::Ident("x".to_string())],
                }],
            }],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E030"));
    }

    #[test]
    fn test_monitor_pattern_outside_output_type() {
        let mut prog = base_program();
        prog.monitor = Spanned::dummy(Monitor {
            buffer_size: None,
            rules: vec![MonitorRule {
                pattern: EventPattern {
                    event: "Ghost".to_string(),
                    binders: vec![],
                },
                guard: None,
                action: String::new(),
            }],
        });
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E031"));
    }

    #[test]
    fn test_order_field_missing_from_event() {
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"]), event("B", &["y"])]),
                source("s"),
                Component::BufferGroup(BufferGroupDecl {
                    name: "G".to_string(),
                    stream_type: "S".to_string(),
                    order: OrderExpr::Field {
                        name: "x".to_string(),
                        descending: false,
                    },
                    members: vec!["s".to_string()],
                }),
            ],
            vec![rule("s", "A", &["x"])],
        );
        let result = validate(&prog, 64);
        // `x` is missing from event B
        assert!(has_code(&result, "E032"));
    }

    #[test]
    fn test_capacity_warning_is_not_fatal() {
        let mut r = rule("s", "A", &["x"]);
        r.patterns[0].events = vec![
            EventPattern {
                event: "A".to_string(),
                binders: vec!["x".to_string()],
            },
            EventPattern {
                event: "A".to_string(),
                binders: vec!["y".to_string()],
            },
        ];
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![r],
        );
        // duplicate binder set avoided: y is a fresh name
        let result = validate(&prog, 1);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(has_code(&result, "W001"));
    }

    #[test]
    fn test_unknown_guard_name() {
        let mut r = rule("s", "A", &["x"]);
        r.guard = Some(Guard::Expr(Expr::Ident("missing".to_string())));
        let prog = program(
            vec![
                stream_type("S", vec![event("A", &["x"])]),
                source("s"),
            ],
            vec![r],
        );
        let result = validate(&prog, 64);
        assert!(has_code(&result, "E040"));
    }

    #[test]
    fn test_format_renders_line_and_column() {
        let prog = program(
            vec![stream_type("S", vec![]), source("s")],
            vec![],
        );
        let result = validate(&prog, 64);
        let formatted = result.format("stream type S { }\n");
        assert!(formatted.contains("error"));
        assert!(formatted.contains("E020"));
        assert!(formatted.contains("1:1"));
    }
}
