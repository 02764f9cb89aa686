//! Per-source lowering: `should_keep` predicates, globals and the
//! drainer threads that move producer events into arbiter buffers.

use crate::cexpr::{lower_expr, ExprCtx};
use vamos_core::ast::EventSourceDecl;
use vamos_core::env::Environment;

/// (declaration, instance name, instance index) for every expanded
/// source instance, in declaration order.
pub fn instances(env: &Environment) -> Vec<(&EventSourceDecl, String, u32)> {
    let mut out = Vec::new();
    for decl in &env.index.event_sources {
        for (i, name) in decl.instance_names().into_iter().enumerate() {
            out.push((decl, name, i as u32));
        }
    }
    out
}

/// One `should_keep` per source declaration. A source without a
/// processor keeps every kind its stream type declares; with a
/// processor, an event survives iff some rewrite rule matches its kind.
pub fn should_keep_functions(env: &Environment) -> String {
    let mut parts = Vec::new();
    for decl in &env.index.event_sources {
        let kept: Vec<&str> = match &decl.processor {
            Some(p) => env
                .stream_processors_data
                .get(p)
                .map(|sp| sp.rules.iter().map(|r| r.from_event.as_str()).collect())
                .unwrap_or_default(),
            None => env
                .streams_to_events_map
                .get(&decl.stream_type)
                .map(|evs| evs.iter().map(|e| e.as_str()).collect())
                .unwrap_or_default(),
        };

        let mut body = format!(
            "bool SHOULD_KEEP_{}(shm_stream *stream, shm_event *ev) {{\n  (void)stream;\n  switch (ev->kind) {{\n",
            decl.name
        );
        for event in kept {
            body.push_str(&format!("  case VAMOS_EVENT_{}:\n", event));
        }
        body.push_str("    return true;\n  default:\n    return false;\n  }\n}");
        parts.push(body);
    }
    parts.join("\n\n")
}

/// Per-instance globals: initialized args, stream handle, arbiter buffer
/// pointer and thread handle.
pub fn source_globals(env: &Environment) -> String {
    let mut out = String::new();
    for (decl, instance, _) in instances(env) {
        out.push_str(&format!("// event source {}\n", instance));
        let has_args = env
            .stream_args
            .get(&decl.stream_type)
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if has_args {
            out.push_str(&format!(
                "STREAM_{}_ARGS stream_args_{};\n",
                decl.stream_type, instance
            ));
        }
        out.push_str(&format!("shm_stream *EV_SOURCE_{};\n", instance));
        out.push_str(&format!("shm_arbiter_buffer *BUFFER_{};\n", instance));
        out.push_str(&format!("thrd_t THREAD_{};\n", instance));
    }
    out.trim_end().to_string()
}

/// The live-source counter, the arbiter thread handle and one drainer
/// body per instance.
pub fn source_threads(env: &Environment) -> String {
    let count = instances(env).len();
    let mut parts = vec![
        format!("atomic_int count_event_streams = {};", count),
        "thrd_t ARBITER_THREAD;".to_string(),
    ];
    for (decl, instance, _) in instances(env) {
        parts.push(drainer_function(env, decl, &instance));
    }
    parts.join("\n\n")
}

fn drainer_function(env: &Environment, decl: &EventSourceDecl, instance: &str) -> String {
    let (input, output) = env
        .stream_types
        .get(instance)
        .cloned()
        .unwrap_or_else(|| (decl.stream_type.clone(), decl.stream_type.clone()));

    let forward = match &decl.processor {
        Some(p) => rewrite_switch(env, p),
        None => format!(
            "    memcpy(outevent, inevent, sizeof(STREAM_{}_out));",
            output
        ),
    };

    format!(
        r#"int PERF_LAYER_{instance}(void *arg) {{
  (void)arg;
  shm_stream *stream = EV_SOURCE_{instance};
  shm_arbiter_buffer *buffer = BUFFER_{instance};
  STREAM_{input}_in *inevent;
  STREAM_{output}_out *outevent;
  uint64_t hole_n = 0;
  while (true) {{
    inevent = (STREAM_{input}_in *)stream_fetch(stream);
    if (inevent == NULL) {{
      break;
    }}
    if (!SHOULD_KEEP_{decl_name}(stream, &inevent->head)) {{
      // consecutive drops coalesce into one hole
      ++hole_n;
      shm_stream_consume(stream, 1);
      continue;
    }}
    if (hole_n > 0) {{
      outevent = (STREAM_{output}_out *)shm_arbiter_buffer_write_ptr(buffer);
      outevent->head.kind = VAMOS_EVENT_hole;
      outevent->head.id = inevent->head.id;
      outevent->cases.hole.n = hole_n;
      shm_arbiter_buffer_write_finish(buffer);
      hole_n = 0;
    }}
    outevent = (STREAM_{output}_out *)shm_arbiter_buffer_write_ptr(buffer);
{forward}
    shm_arbiter_buffer_write_finish(buffer);
    shm_stream_consume(stream, 1);
  }}
  if (hole_n > 0) {{
    // trailing drops still surface as one hole
    outevent = (STREAM_{output}_out *)shm_arbiter_buffer_write_ptr(buffer);
    outevent->head.kind = VAMOS_EVENT_hole;
    outevent->head.id = 0;
    outevent->cases.hole.n = hole_n;
    shm_arbiter_buffer_write_finish(buffer);
  }}
  atomic_fetch_sub(&count_event_streams, 1);
  return 0;
}}"#,
        instance = instance,
        input = input,
        output = output,
        decl_name = decl.name,
        forward = forward,
    )
}

/// The kept-path body of a processor source: rewrite the input kind into
/// the output kind, projecting fields through the rule expressions.
fn rewrite_switch(env: &Environment, processor: &str) -> String {
    let Some(sp) = env.stream_processors_data.get(processor) else {
        return String::new();
    };
    let mut out = String::from("    switch (inevent->head.kind) {\n");
    for rule in &sp.rules {
        out.push_str(&format!("    case VAMOS_EVENT_{}: {{\n", rule.from_event));
        let from_fields = env
            .event_decl(&rule.from_event)
            .map(|e| e.fields.clone())
            .unwrap_or_default();
        for (binder, field) in rule.binders.iter().zip(from_fields.iter()) {
            out.push_str(&format!(
                "      {} {} = inevent->cases.{}.{};\n",
                field.ty.c_name(),
                binder,
                rule.from_event,
                field.name
            ));
        }
        out.push_str(&format!(
            "      outevent->head.kind = VAMOS_EVENT_{};\n",
            rule.to_event
        ));
        out.push_str("      outevent->head.id = inevent->head.id;\n");
        let to_fields = env
            .event_decl(&rule.to_event)
            .map(|e| e.fields.clone())
            .unwrap_or_default();
        let ctx = ExprCtx::new(env);
        for (arg, field) in rule.args.iter().zip(to_fields.iter()) {
            out.push_str(&format!(
                "      outevent->cases.{}.{} = {};\n",
                rule.to_event,
                field.name,
                lower_expr(arg, &ctx)
            ));
        }
        out.push_str("      break;\n    }\n");
    }
    out.push_str("    default:\n      break;\n    }");
    out
}

/// Connection and buffer creation, one block per instance (for `main`).
pub fn connect_code(env: &Environment) -> String {
    let mut out = String::new();
    for (decl, instance, _) in instances(env) {
        let (_, output) = env
            .stream_types
            .get(&instance)
            .cloned()
            .unwrap_or_else(|| (decl.stream_type.clone(), decl.stream_type.clone()));
        match &decl.connection {
            Some(conn) => out.push_str(&format!(
                "  EV_SOURCE_{} = shm_stream_create_from_spec(\"{}\", \"{}\", \"{}\");\n",
                instance, conn.kind, conn.arg, instance
            )),
            None => out.push_str(&format!(
                "  EV_SOURCE_{} = shm_stream_create(\"{}\", argc, argv);\n",
                instance, instance
            )),
        }
        let capacity = env
            .source_buffer_sizes
            .get(&instance)
            .copied()
            .unwrap_or(64);
        out.push_str(&format!(
            "  BUFFER_{} = shm_arbiter_buffer_create(EV_SOURCE_{}, sizeof(STREAM_{}_out), {});\n",
            instance, instance, output, capacity
        ));
    }
    out.trim_end().to_string()
}

/// Buffer activation, after every source is connected.
pub fn activate_code(env: &Environment) -> String {
    let mut out = String::new();
    for (_, instance, _) in instances(env) {
        out.push_str(&format!(
            "  shm_arbiter_buffer_set_active(BUFFER_{}, true);\n",
            instance
        ));
    }
    out.trim_end().to_string()
}

/// Shared-args initialization (for `main`), with `index` bound per
/// array instance.
pub fn args_init_code(env: &Environment) -> String {
    let mut out = String::new();
    for (decl, instance, index) in instances(env) {
        let fields = env
            .stream_args
            .get(&decl.stream_type)
            .cloned()
            .unwrap_or_default();
        if fields.is_empty() {
            continue;
        }
        let ctx = ExprCtx::new(env).with_substitution("index", &index.to_string());
        for (arg, field) in decl.with_args.iter().zip(fields.iter()) {
            out.push_str(&format!(
                "  stream_args_{}.{} = {};\n",
                instance,
                field.name,
                lower_expr(arg, &ctx)
            ));
        }
    }
    out.trim_end().to_string()
}

/// Drainer thread creation (for `main`).
pub fn spawn_code(env: &Environment) -> String {
    let mut out = String::new();
    for (_, instance, _) in instances(env) {
        out.push_str(&format!(
            "  thrd_create(&THREAD_{}, PERF_LAYER_{}, 0);\n",
            instance, instance
        ));
    }
    out.trim_end().to_string()
}
