//! Event structs, the kind table and per-stream-type payload unions.

use indexmap::IndexSet;
use vamos_core::ast::{EventDecl, OrderExpr, Expr};
use vamos_core::env::{Environment, HOLE_KIND};

/// The synthetic `hole` event every program owns: one run of filtered-out
/// events coalesced into a count.
pub fn hole_struct() -> String {
    "\
struct _EVENT_hole {
  uint64_t n;
};
typedef struct _EVENT_hole EVENT_hole;"
        .to_string()
}

/// Program-wide event kind table. `hole` takes the reserved id; user
/// kinds follow in declaration order.
fn event_kind_enum(env: &Environment) -> String {
    let mut out = String::from("enum vamos_event_kind {\n");
    out.push_str(&format!("  VAMOS_EVENT_hole = {},\n", HOLE_KIND));
    for (event, kind) in &env.events_to_kinds {
        out.push_str(&format!("  VAMOS_EVENT_{} = {},\n", event, kind));
    }
    out.push_str("};");
    out
}

fn event_struct(event: &EventDecl) -> Option<String> {
    if event.fields.is_empty() {
        // Payload-free events carry only the shm_event header; ISO C has
        // no empty structs, so no struct is emitted for them.
        return None;
    }
    let mut out = format!("struct _EVENT_{} {{\n", event.name);
    for field in &event.fields {
        out.push_str(&format!("  {} {};\n", field.ty.c_name(), field.name));
    }
    out.push_str(&format!(
        "}};\ntypedef struct _EVENT_{} EVENT_{};",
        event.name, event.name
    ));
    Some(out)
}

fn stream_type_union(env: &Environment, stream_type: &str, suffix: &str) -> String {
    let events = env
        .stream_events
        .get(stream_type)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);
    let mut out = format!("struct _STREAM_{}_{} {{\n", stream_type, suffix);
    out.push_str("  shm_event head;\n");
    out.push_str("  union {\n");
    for event in events {
        if !event.fields.is_empty() {
            out.push_str(&format!("    EVENT_{} {};\n", event.name, event.name));
        }
    }
    out.push_str("    EVENT_hole hole;\n");
    out.push_str("  } cases;\n");
    out.push_str(&format!(
        "}};\ntypedef struct _STREAM_{st}_{sfx} STREAM_{st}_{sfx};",
        st = stream_type,
        sfx = suffix
    ));
    out
}

/// All event structs, the kind enum, the per-type payload unions and the
/// shared-args structs, in declaration order.
pub fn stream_type_structs(env: &Environment) -> String {
    let mut parts: Vec<String> = vec![event_kind_enum(env)];

    for st in &env.index.stream_types {
        for event in &st.events {
            if let Some(text) = event_struct(event) {
                parts.push(text);
            }
        }
        // The `in` shape is what drainers read from producers, the `out`
        // shape is what they hand the arbiter; both carry the same
        // payload union.
        parts.push(stream_type_union(env, &st.name, "in"));
        parts.push(stream_type_union(env, &st.name, "out"));

        if !st.shared_args.is_empty() {
            let mut args = format!("struct _STREAM_{}_ARGS {{\n", st.name);
            for field in &st.shared_args {
                args.push_str(&format!("  {} {};\n", field.ty.c_name(), field.name));
            }
            args.push_str(&format!(
                "}};\ntypedef struct _STREAM_{st}_ARGS STREAM_{st}_ARGS;",
                st = st.name
            ));
            parts.push(args);
        }
    }

    parts.join("\n\n")
}

/// Fields referenced by buffer group order expressions, as
/// (stream type, field name) pairs in group declaration order.
pub fn order_fields(env: &Environment) -> IndexSet<(String, String)> {
    let mut fields = IndexSet::new();
    for group in &env.index.buffer_groups {
        match &group.order {
            OrderExpr::Field { name, .. } => {
                fields.insert((group.stream_type.clone(), name.clone()));
            }
            OrderExpr::Compare(expr) => {
                collect_head_fields(expr, &group.stream_type, &mut fields);
            }
        }
    }
    fields
}

fn collect_head_fields(expr: &Expr, stream_type: &str, out: &mut IndexSet<(String, String)>) {
    match expr {
        Expr::Member { expr, member } => {
            if matches!(expr.as_ref(), Expr::Ident(base) if base == "left" || base == "right") {
                out.insert((stream_type.to_string(), member.clone()));
            }
        }
        Expr::Unary { expr, .. } => collect_head_fields(expr, stream_type, out),
        Expr::Binary { left, right, .. } => {
            collect_head_fields(left, stream_type, out);
            collect_head_fields(right, stream_type, out);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_head_fields(arg, stream_type, out);
            }
        }
        _ => {}
    }
}

/// One accessor per (stream type, field) an order expression touches.
/// The accessor dispatches on the head kind so the order expression can
/// read "the" field regardless of which event is at the head.
pub fn head_field_accessors(env: &Environment) -> String {
    let mut parts = Vec::new();
    for (stream_type, field) in order_fields(env) {
        let Some(events) = env.stream_events.get(&stream_type) else {
            continue;
        };
        let field_ty = events
            .iter()
            .flat_map(|e| e.fields.iter())
            .find(|f| f.name == field)
            .map(|f| f.ty.c_name())
            .unwrap_or("long");

        let mut body = format!(
            "static {} STREAM_{}_head_{}(STREAM_{}_out *e) {{\n  switch (e->head.kind) {{\n",
            field_ty, stream_type, field, stream_type
        );
        for event in events {
            if event.fields.iter().any(|f| f.name == field) {
                body.push_str(&format!(
                    "  case VAMOS_EVENT_{}:\n    return e->cases.{}.{};\n",
                    event.name, event.name, field
                ));
            }
        }
        body.push_str("  default: /* hole */\n    return 0;\n  }\n}");
        parts.push(body);
    }
    parts.join("\n\n")
}
