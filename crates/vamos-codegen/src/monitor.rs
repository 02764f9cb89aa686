//! Monitor loop lowering.
//!
//! The monitor runs on the process main thread: it drains the arbiter's
//! output ring and dispatches each record through the rule table.
//! First match wins; a record no rule matches is consumed silently.

use crate::cexpr::{lower_expr, ExprCtx};
use vamos_core::ast::{Guard, Monitor};
use vamos_core::env::Environment;

/// The monitor loop body spliced into `main`.
pub fn monitor_code(monitor: &Monitor, env: &Environment) -> String {
    let ty = &env.arbiter_output_type;
    let mut out = format!(
        "  // monitor\n  STREAM_{ty}_out *received_event;\n  while (true) {{\n    received_event = (STREAM_{ty}_out *)shm_monitor_buffer_fetch(monitor_buffer);\n    if (received_event == NULL) {{\n      break;\n    }}\n    do {{\n",
        ty = ty
    );

    for rule in &monitor.rules {
        out.push_str(&format!(
            "      if (received_event->head.kind == VAMOS_EVENT_{}) {{\n",
            rule.pattern.event
        ));
        let fields = env
            .event_decl(&rule.pattern.event)
            .map(|e| e.fields.clone())
            .unwrap_or_default();
        for (binder, field) in rule.pattern.binders.iter().zip(fields.iter()) {
            out.push_str(&format!(
                "        {} {} = received_event->cases.{}.{};\n",
                field.ty.c_name(),
                binder,
                rule.pattern.event,
                field.name
            ));
        }
        let guard = match &rule.guard {
            Some(Guard::Expr(expr)) => {
                let ctx = ExprCtx::new(env);
                Some(lower_expr(expr, &ctx))
            }
            Some(Guard::Raw(code)) => Some(code.trim().to_string()),
            None => None,
        };
        match guard {
            Some(cond) => {
                out.push_str(&format!("        if ({}) {{\n", cond));
                out.push_str("          {\n");
                out.push_str(&indent_user_code(&rule.action, "            "));
                out.push_str("          }\n");
                out.push_str("          break;\n        }\n");
            }
            None => {
                out.push_str("        {\n");
                out.push_str(&indent_user_code(&rule.action, "          "));
                out.push_str("        }\n");
                out.push_str("        break;\n");
            }
        }
        out.push_str("      }\n");
    }

    out.push_str("    } while (0);\n");
    out.push_str("    shm_monitor_buffer_consume(monitor_buffer, 1);\n");
    out.push_str("  }");
    out
}

/// Re-indent a verbatim user block so the emitted file stays readable.
fn indent_user_code(code: &str, indent: &str) -> String {
    let mut out = String::new();
    for line in code.trim().lines() {
        out.push_str(indent);
        out.push_str(line.trim());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vamos_core::ast::*;
    use vamos_core::span::Spanned;
    use vamos_core::types::FieldType;

    fn env_and_monitor() -> (Environment, Monitor) {
        let monitor = Monitor {
            buffer_size: None,
            rules: vec![MonitorRule {
                pattern: EventPattern {
                    event: "Out".into(),
                    binders: vec!["x".into()],
                },
                guard: Some(Guard::Expr(Expr::Binary {
                    op: BinOp::Gt,
                    left: Box::new(Expr::Ident("x".into())),
                    right: Box::new(Expr::Int(10)),
                })),
                action: "printf(\"%d\\n\", x);".into(),
            }],
        };
        let program = Program {
            components: vec![Spanned::dummy(Component::StreamType(StreamTypeDecl {
                name: "O".into(),
                shared_args: vec![],
                events: vec![EventDecl {
                    name: "Out".into(),
                    fields: vec![Field {
                        name: "x".into(),
                        ty: FieldType::Int,
                    }],
                }],
            }))],
            arbiter: Spanned::dummy(Arbiter {
                output_type: "O".into(),
                rule_sets: vec![],
            }),
            monitor: Spanned::dummy(monitor.clone()),
        };
        (Environment::build(&program, 64), monitor)
    }

    #[test]
    fn monitor_dispatches_on_kind_and_guard() {
        let (env, monitor) = env_and_monitor();
        let text = monitor_code(&monitor, &env);
        assert!(text.contains("shm_monitor_buffer_fetch(monitor_buffer)"));
        assert!(text.contains("received_event->head.kind == VAMOS_EVENT_Out"));
        assert!(text.contains("int x = received_event->cases.Out.x;"));
        assert!(text.contains("if ((x > 10))"));
        assert!(text.contains("printf(\"%d\\n\", x);"));
        assert!(text.contains("shm_monitor_buffer_consume(monitor_buffer, 1);"));
    }
}
