//! Buffer group lowering: order expressions and group objects.

use crate::cexpr::{lower_expr, ExprCtx};
use vamos_core::ast::{BufferGroupDecl, OrderExpr};
use vamos_core::env::Environment;

/// Order expression functions and group globals, in declaration order.
pub fn buffer_group_decls(env: &Environment) -> String {
    let mut parts = Vec::new();
    for group in &env.index.buffer_groups {
        parts.push(order_expression(env, group));
        parts.push(format!("buffer_group BG_{};", group.name));
    }
    parts.join("\n\n")
}

/// `ORDER_EXP_G(a, b)` returns true iff stream `a` precedes stream `b`.
///
/// A stream whose buffer has no head sorts last, and ties keep the
/// earlier-inserted stream first, so declaration order breaks them.
fn order_expression(env: &Environment, group: &BufferGroupDecl) -> String {
    let ty = &group.stream_type;
    let cmp = match &group.order {
        OrderExpr::Field { name, descending } => {
            let op = if *descending { ">=" } else { "<=" };
            format!(
                "STREAM_{ty}_head_{f}(ev_a) {op} STREAM_{ty}_head_{f}(ev_b)",
                ty = ty,
                f = name,
                op = op
            )
        }
        OrderExpr::Compare(expr) => {
            let mut ctx = ExprCtx::new(env);
            ctx.head_access = Some((ty.as_str(), "ev_a", "ev_b"));
            lower_expr(expr, &ctx)
        }
    };

    format!(
        r#"bool ORDER_EXP_{name}(dll_node *a, dll_node *b) {{
  STREAM_{ty}_out *ev_a = (STREAM_{ty}_out *)bg_head_event(a);
  STREAM_{ty}_out *ev_b = (STREAM_{ty}_out *)bg_head_event(b);
  if (ev_a == NULL) {{
    return false;
  }}
  if (ev_b == NULL) {{
    return true;
  }}
  return {cmp};
}}"#,
        name = group.name,
        ty = ty,
        cmp = cmp,
    )
}

/// Group initialization and membership (for `main`). Members are
/// inserted in declaration order; the runtime keeps insertion order for
/// equal elements, which is the declared tie-break.
pub fn buffer_group_init_code(env: &Environment) -> String {
    let mut out = String::new();
    for group in &env.index.buffer_groups {
        out.push_str(&format!(
            "  init_buffer_group(&BG_{}, &ORDER_EXP_{}, {});\n",
            group.name,
            group.name,
            group.members.len()
        ));
        for member in &group.members {
            out.push_str(&format!(
                "  bg_insert(&BG_{}, EV_SOURCE_{}, BUFFER_{});\n",
                group.name, member, member
            ));
        }
    }
    out.trim_end().to_string()
}

/// Group teardown (for `main`'s cleanup path).
pub fn buffer_group_destroy_code(env: &Environment) -> String {
    let mut out = String::new();
    for group in env.index.buffer_groups.iter().rev() {
        out.push_str(&format!("  destroy_buffer_group(&BG_{});\n", group.name));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vamos_core::ast::*;
    use vamos_core::span::Spanned;
    use vamos_core::types::FieldType;

    fn group_env(order: OrderExpr) -> Environment {
        let program = Program {
            components: vec![
                Spanned::dummy(Component::StreamType(StreamTypeDecl {
                    name: "S".into(),
                    shared_args: vec![],
                    events: vec![EventDecl {
                        name: "T".into(),
                        fields: vec![Field {
                            name: "ts".into(),
                            ty: FieldType::Long,
                        }],
                    }],
                })),
                Spanned::dummy(Component::EventSource(EventSourceDecl {
                    name: "a".into(),
                    count: None,
                    stream_type: "S".into(),
                    processor: None,
                    connection: None,
                    with_args: vec![],
                    buffer_size: None,
                })),
                Spanned::dummy(Component::EventSource(EventSourceDecl {
                    name: "b".into(),
                    count: None,
                    stream_type: "S".into(),
                    processor: None,
                    connection: None,
                    with_args: vec![],
                    buffer_size: None,
                })),
                Spanned::dummy(Component::BufferGroup(BufferGroupDecl {
                    name: "G".into(),
                    stream_type: "S".into(),
                    order,
                    members: vec!["a".into(), "b".into()],
                })),
            ],
            arbiter: Spanned::dummy(Arbiter {
                output_type: "S".into(),
                rule_sets: vec![],
            }),
            monitor: Spanned::dummy(Monitor {
                buffer_size: None,
                rules: vec![],
            }),
        };
        Environment::build(&program, 64)
    }

    #[test]
    fn field_order_compares_heads() {
        let env = group_env(OrderExpr::Field {
            name: "ts".into(),
            descending: false,
        });
        let text = buffer_group_decls(&env);
        assert!(text.contains("ORDER_EXP_G"));
        assert!(text.contains("STREAM_S_head_ts(ev_a) <= STREAM_S_head_ts(ev_b)"));
    }

    #[test]
    fn descending_flips_comparison() {
        let env = group_env(OrderExpr::Field {
            name: "ts".into(),
            descending: true,
        });
        let text = buffer_group_decls(&env);
        assert!(text.contains(">= STREAM_S_head_ts(ev_b)"));
    }

    #[test]
    fn compare_order_lowers_left_right() {
        let env = group_env(OrderExpr::Compare(Expr::Binary {
            op: BinOp::Lt,
            left: Box::new(Expr::Member {
                expr: Box::new(Expr::Ident("left".into())),
                member: "ts".into(),
            }),
            right: Box::new(Expr::Member {
                expr: Box::new(Expr::Ident("right".into())),
                member: "ts".into(),
            }),
        }));
        let text = buffer_group_decls(&env);
        assert!(text.contains("(STREAM_S_head_ts(ev_a) < STREAM_S_head_ts(ev_b))"));
    }

    #[test]
    fn init_inserts_members_in_declaration_order() {
        let env = group_env(OrderExpr::Field {
            name: "ts".into(),
            descending: false,
        });
        let text = buffer_group_init_code(&env);
        let a = text.find("bg_insert(&BG_G, EV_SOURCE_a").unwrap();
        let b = text.find("bg_insert(&BG_G, EV_SOURCE_b").unwrap();
        assert!(a < b);
    }
}
