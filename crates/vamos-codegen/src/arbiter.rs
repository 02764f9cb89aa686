//! Arbiter lowering: peek helpers, rule-set evaluation functions and the
//! arbiter thread's main loop.

use crate::cexpr::{lower_expr, ExprCtx};
use crate::sources::instances;
use vamos_core::ast::{Action, Arbiter, ChooseOrder, Guard, MatchRule};
use vamos_core::env::Environment;

/// Fixed helpers every emitted arbiter uses, parameterized only by the
/// set of arbiter buffers and the event-kind table.
pub fn arbiter_helpers(env: &Environment) -> String {
    let mut parts = Vec::new();

    parts.push(
        "\
// variables used to debug the arbiter
int no_consecutive_matches_limit = 1000000000;
int no_matches_count = 0;"
            .to_string(),
    );

    parts.push(
        "\
bool are_there_events(shm_arbiter_buffer *b) {
  // used to determine if the arbiter is done
  void *e1;
  size_t i1;
  void *e2;
  size_t i2;
  return shm_arbiter_buffer_peek(b, 0, &e1, &i1, &e2, &i2) > 0;
}"
        .to_string(),
    );

    let mut empties = String::from("bool are_buffers_empty(void) {\n");
    for (_, instance, _) in instances(env) {
        empties.push_str(&format!(
            "  if (are_there_events(BUFFER_{})) {{\n    return false;\n  }}\n",
            instance
        ));
    }
    empties.push_str("  return true;\n}");
    parts.push(empties);

    parts.push(
        "\
bool are_streams_done(void) {
  assert(count_event_streams >= 0);
  return count_event_streams == 0 && are_buffers_empty();
}"
        .to_string(),
    );

    parts.push(
        "\
bool check_n_events(size_t count, size_t n) {
  // count is the result of shm_arbiter_buffer_peek
  return count == n;
}"
        .to_string(),
    );

    parts.push(
        "\
bool are_events_in_head(char *e1, size_t i1, char *e2, size_t i2, int count,
                        size_t ev_size, const int event_kinds[], int n_events) {
  if (count < n_events) {
    return false;
  }

  size_t i = 0;
  while (i < i1) {
    shm_event *ev = (shm_event *)e1;
    if ((int)ev->kind != event_kinds[i]) {
      return false;
    }
    i += 1;
    e1 += ev_size;
  }

  size_t j = 0;
  while (j < i2) {
    shm_event *ev = (shm_event *)e2;
    if ((int)ev->kind != event_kinds[i1 + j]) {
      return false;
    }
    j += 1;
    e2 += ev_size;
  }

  return true;
}"
        .to_string(),
    );

    parts.push(
        "\
shm_event *get_event_at_index(char *e1, size_t i1, char *e2, size_t i2,
                              size_t size_event, int element_index) {
  if ((size_t)element_index < i1) {
    return (shm_event *)(e1 + (element_index * size_event));
  }
  element_index -= i1;
  return (shm_event *)(e2 + (element_index * size_event));
}"
        .to_string(),
    );

    // Printers used by the no-match diagnostic.
    let mut names = String::from(
        "const char *get_event_name(int kind) {\n  switch (kind) {\n  case VAMOS_EVENT_hole:\n    return \"hole\";\n",
    );
    for event in env.events_to_kinds.keys() {
        names.push_str(&format!(
            "  case VAMOS_EVENT_{}:\n    return \"{}\";\n",
            event, event
        ));
    }
    names.push_str("  default:\n    return \"<unknown>\";\n  }\n}");
    parts.push(names);

    parts.push(
        "\
int get_event_at_head(shm_arbiter_buffer *b) {
  void *e1;
  size_t i1;
  void *e2;
  size_t i2;
  int count = shm_arbiter_buffer_peek(b, 1, &e1, &i1, &e2, &i2);
  if (count == 0) {
    return -1;
  }
  return (int)((shm_event *)(i1 > 0 ? e1 : e2))->kind;
}"
        .to_string(),
    );

    let mut printer = String::from("void print_buffers_state(void) {\n");
    for (_, instance, _) in instances(env) {
        printer.push_str(&format!(
            "  fprintf(stderr, \"buffer {inst}: head %s\\n\", get_event_name(get_event_at_head(BUFFER_{inst})));\n",
            inst = instance
        ));
    }
    printer.push_str("}");
    parts.push(printer);

    parts.push(format!(
        "// arbiter outevent\nSTREAM_{}_out *arbiter_outevent;",
        env.arbiter_output_type
    ));

    parts.join("\n\n")
}

/// One evaluation function per rule set; returns 1 on match so the
/// arbiter loop can track consecutive no-match rounds.
pub fn rule_set_functions(arbiter: &Arbiter, env: &Environment) -> String {
    let mut parts = Vec::new();
    for rule_set in &arbiter.rule_sets {
        let mut body = format!("int RULE_SET_{}(void) {{\n", rule_set.name);
        for (idx, rule) in rule_set.rules.iter().enumerate() {
            body.push_str(&format!("  // rule {}\n  {{\n", idx + 1));
            body.push_str(&lower_rule(rule, env));
            body.push_str("  }\n");
        }
        body.push_str("  return 0;\n}");
        parts.push(body);
    }
    parts.join("\n\n")
}

/// The stream type observed on one participating source (alias sources
/// carry the chooser group's type).
fn source_stream_type<'a>(rule: &'a MatchRule, env: &'a Environment, source: &str) -> String {
    if let Some(chooser) = &rule.chooser {
        if chooser.aliases.iter().any(|a| a == source) {
            if let Some(group) = env
                .index
                .buffer_groups
                .iter()
                .find(|g| g.name == chooser.group)
            {
                return group.stream_type.clone();
            }
        }
    }
    env.output_type_of(source)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn lower_rule(rule: &MatchRule, env: &Environment) -> String {
    let mut out = String::new();
    let mut closing_braces = 0;

    // Chooser prologue: recompute the group order and commit a selection
    // before the rule body peeks any alias buffer.
    if let Some(chooser) = &rule.chooser {
        let select_fn = match chooser.order {
            ChooseOrder::First => "bg_get_first_n",
            ChooseOrder::Last => "bg_get_last_n",
        };
        out.push_str(&format!(
            "    is_selection_successful = {}(&BG_{}, {}, &chosen_streams);\n",
            select_fn, chooser.group, chooser.count
        ));
        out.push_str("    if (is_selection_successful) {\n");
        closing_braces += 1;
        for (i, alias) in chooser.aliases.iter().enumerate() {
            out.push_str(&format!(
                "    shm_arbiter_buffer *b_{} = chosen_streams[{}]->buffer;\n",
                alias, i
            ));
        }
    }

    // Peek every participating buffer.
    for pattern in &rule.patterns {
        let source = &pattern.source;
        let is_alias = rule
            .chooser
            .as_ref()
            .map(|c| c.aliases.iter().any(|a| a == source))
            .unwrap_or(false);
        if !is_alias {
            out.push_str(&format!(
                "    shm_arbiter_buffer *b_{src} = BUFFER_{src};\n",
                src = source
            ));
        }
        let n = pattern.events.len();
        out.push_str(&format!(
            "    char *e1_{src};\n    size_t i1_{src};\n    char *e2_{src};\n    size_t i2_{src};\n",
            src = source
        ));
        out.push_str(&format!(
            "    int count_{src} = shm_arbiter_buffer_peek(b_{src}, {n}, (void **)&e1_{src}, &i1_{src}, (void **)&e2_{src}, &i2_{src});\n",
            src = source,
            n = n
        ));
        let kinds: Vec<String> = pattern
            .events
            .iter()
            .map(|e| format!("VAMOS_EVENT_{}", e.event))
            .collect();
        out.push_str(&format!(
            "    const int kinds_{src}[{n}] = {{{kinds}}};\n",
            src = source,
            n = n,
            kinds = kinds.join(", ")
        ));
    }

    // Head test over all participating buffers.
    let conds: Vec<String> = rule
        .patterns
        .iter()
        .map(|p| {
            let ty = source_stream_type(rule, env, &p.source);
            format!(
                "are_events_in_head(e1_{src}, i1_{src}, e2_{src}, i2_{src}, count_{src}, sizeof(STREAM_{ty}_out), kinds_{src}, {n})",
                src = p.source,
                ty = ty,
                n = p.events.len()
            )
        })
        .collect();
    out.push_str(&format!(
        "    if ({}) {{\n",
        conds.join("\n        && ")
    ));
    closing_braces += 1;

    // Bind pattern fields to locals named after the binders.
    for pattern in &rule.patterns {
        let ty = source_stream_type(rule, env, &pattern.source);
        for (i, event_pattern) in pattern.events.iter().enumerate() {
            if event_pattern.binders.is_empty() {
                continue;
            }
            let ev_var = format!("ev_{}_{}", pattern.source, i);
            out.push_str(&format!(
                "      STREAM_{ty}_out *{ev} = (STREAM_{ty}_out *)get_event_at_index(e1_{src}, i1_{src}, e2_{src}, i2_{src}, sizeof(STREAM_{ty}_out), {i});\n",
                ty = ty,
                ev = ev_var,
                src = pattern.source,
                i = i
            ));
            let fields = env
                .event_decl(&event_pattern.event)
                .map(|e| e.fields.clone())
                .unwrap_or_default();
            for (binder, field) in event_pattern.binders.iter().zip(fields.iter()) {
                out.push_str(&format!(
                    "      {} {} = {}->cases.{}.{};\n",
                    field.ty.c_name(),
                    binder,
                    ev_var,
                    event_pattern.event,
                    field.name
                ));
            }
        }
    }

    // Guard.
    match &rule.guard {
        Some(Guard::Expr(expr)) => {
            let ctx = ExprCtx::new(env);
            out.push_str(&format!("      if ({}) {{\n", lower_expr(expr, &ctx)));
            closing_braces += 1;
        }
        Some(Guard::Raw(code)) => {
            out.push_str(&format!("      if ({}) {{\n", code.trim()));
            closing_braces += 1;
        }
        None => {}
    }

    // Action: enqueue the output event, then drop consumed prefixes.
    for action in &rule.actions {
        if let Action::Yield { event, args } = action {
            let ty = &env.arbiter_output_type;
            out.push_str(&format!(
                "        arbiter_outevent = (STREAM_{ty}_out *)shm_monitor_buffer_write_ptr(monitor_buffer);\n",
                ty = ty
            ));
            out.push_str(&format!(
                "        arbiter_outevent->head.kind = VAMOS_EVENT_{};\n",
                event
            ));
            out.push_str("        arbiter_outevent->head.id = (*arbiter_counter)++;\n");
            let fields = env
                .event_decl(event)
                .map(|e| e.fields.clone())
                .unwrap_or_default();
            let ctx = ExprCtx::new(env);
            for (arg, field) in args.iter().zip(fields.iter()) {
                out.push_str(&format!(
                    "        arbiter_outevent->cases.{}.{} = {};\n",
                    event,
                    field.name,
                    lower_expr(arg, &ctx)
                ));
            }
            out.push_str("        shm_monitor_buffer_write_finish(monitor_buffer);\n");
        }
    }
    for action in &rule.actions {
        if let Action::Drop { count, source } = action {
            out.push_str(&format!(
                "        shm_arbiter_buffer_drop(b_{}, {});\n",
                source, count
            ));
        }
    }
    out.push_str("        return 1;\n");

    for _ in 0..closing_braces {
        out.push_str("    }\n");
    }
    out
}

/// The arbiter thread: evaluate rule sets in declaration order until all
/// sources are done and every buffer has drained.
pub fn arbiter_main(arbiter: &Arbiter) -> String {
    let mut out = String::from(
        "int arbiter(void *arg) {\n  (void)arg;\n  while (!are_streams_done()) {\n    int matched = 0;\n",
    );
    for rule_set in &arbiter.rule_sets {
        out.push_str(&format!(
            "    if (!matched) {{\n      matched = RULE_SET_{}();\n    }}\n",
            rule_set.name
        ));
    }
    out.push_str(
        "    if (matched) {
      no_matches_count = 0;
    } else {
      ++no_matches_count;
      if (no_matches_count == no_consecutive_matches_limit) {
        fprintf(stderr, \"arbiter: no rule matched in %d consecutive rounds\\n\",
                no_matches_count);
        print_buffers_state();
        no_matches_count = 0;
      }
    }
  }
  // tearing down the monitor buffer after the last produce ends the
  // monitor loop
  shm_monitor_buffer_set_finished(monitor_buffer);
  return 0;
}",
    );
    out
}
