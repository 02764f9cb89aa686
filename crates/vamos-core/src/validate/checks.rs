//! Semantic check implementations for Pass 1 and Pass 2.

use crate::ast::*;
use crate::env::RESERVED_KEYWORDS;
use crate::span::Span;
use std::collections::{HashMap, HashSet};

use super::scope::*;
use super::{RelatedSpan, Severity, Validator};

// ---------------------------------------------------------------------------
// Pass 1: Declaration Collection
// ---------------------------------------------------------------------------

pub fn pass1_declarations(v: &mut Validator, program: &Program) {
    for component in &program.components {
        let span = component.span;
        match &component.node {
            Component::StreamType(decl) => collect_stream_type(v, decl, span),
            Component::StreamProcessor(decl) => collect_processor(v, decl, span),
            Component::EventSource(decl) => collect_source(v, decl, span),
            Component::BufferGroup(decl) => collect_group(v, decl, span),
            Component::MatchFun(decl) => collect_match_fun(v, decl, span),
            Component::Raw(_) => {}
        }
    }

    // Rule set names share one namespace inside the arbiter.
    let arbiter_span = program.arbiter.span;
    let mut seen = HashMap::new();
    for rs in &program.arbiter.node.rule_sets {
        check_reserved(v, &rs.name, arbiter_span, "rule set");
        if let Some(prev) = seen.insert(rs.name.clone(), arbiter_span) {
            v.emit_with_related(
                Severity::Error,
                arbiter_span,
                "E001",
                format!("duplicate rule set '{}'", rs.name),
                vec![RelatedSpan {
                    span: prev,
                    message: "previously declared here".to_string(),
                }],
            );
        }
    }
}

fn check_reserved(v: &mut Validator, name: &str, span: Span, what: &str) {
    if RESERVED_KEYWORDS.contains(&name) {
        v.emit(
            Severity::Error,
            span,
            "E002",
            format!("reserved keyword '{}' used as {} name", name, what),
        );
    }
}

fn collect_stream_type(v: &mut Validator, decl: &StreamTypeDecl, span: Span) {
    check_reserved(v, &decl.name, span, "stream type");
    if let Some(prev) = v.symbols.stream_types.get(&decl.name) {
        let prev_span = prev.span;
        v.emit_with_related(
            Severity::Error,
            span,
            "E001",
            format!("duplicate stream type '{}'", decl.name),
            vec![RelatedSpan {
                span: prev_span,
                message: "previously declared here".to_string(),
            }],
        );
        return;
    }

    // An event source of this type must be able to push at least one
    // real kind besides `hole`.
    if decl.events.is_empty() {
        v.emit_with_hint(
            Severity::Error,
            span,
            "E020",
            format!("stream type '{}' declares no events", decl.name),
            "declare at least one event shape".to_string(),
        );
    }

    for field in &decl.shared_args {
        check_reserved(v, &field.name, span, "shared argument");
    }

    for event in &decl.events {
        check_reserved(v, &event.name, span, "event");
        let mut field_seen = HashSet::new();
        for field in &event.fields {
            check_reserved(v, &field.name, span, "field");
            if !field_seen.insert(field.name.as_str()) {
                v.emit(
                    Severity::Error,
                    span,
                    "E001",
                    format!(
                        "duplicate field '{}' in event '{}'",
                        field.name, event.name
                    ),
                );
            }
        }
        // Event kinds are assigned from one program-wide table, so event
        // names share one namespace across stream types.
        if let Some(prev) = v.symbols.events.get(&event.name) {
            let prev_span = prev.span;
            v.emit_with_related(
                Severity::Error,
                span,
                "E001",
                format!("duplicate event '{}'", event.name),
                vec![RelatedSpan {
                    span: prev_span,
                    message: "previously declared here".to_string(),
                }],
            );
        } else {
            v.symbols.events.insert(
                event.name.clone(),
                EventInfo {
                    span,
                    stream_type: decl.name.clone(),
                    field_count: event.fields.len(),
                    field_names: event.fields.iter().map(|f| f.name.clone()).collect(),
                },
            );
        }
    }

    v.symbols.stream_types.insert(
        decl.name.clone(),
        StreamTypeInfo {
            span,
            event_names: decl.events.iter().map(|e| e.name.clone()).collect(),
            shared_arg_count: decl.shared_args.len(),
        },
    );
}

fn collect_processor(v: &mut Validator, decl: &StreamProcessorDecl, span: Span) {
    check_reserved(v, &decl.name, span, "stream processor");
    if let Some(prev) = v.symbols.processors.get(&decl.name) {
        let prev_span = prev.span;
        v.emit_with_related(
            Severity::Error,
            span,
            "E001",
            format!("duplicate stream processor '{}'", decl.name),
            vec![RelatedSpan {
                span: prev_span,
                message: "previously declared here".to_string(),
            }],
        );
        return;
    }
    v.symbols.processors.insert(
        decl.name.clone(),
        ProcessorInfo {
            span,
            input: decl.input.clone(),
            output: decl.output.clone(),
        },
    );
}

fn collect_source(v: &mut Validator, decl: &EventSourceDecl, span: Span) {
    check_reserved(v, &decl.name, span, "event source");
    if let Some(count) = decl.count {
        if count == 0 {
            v.emit(
                Severity::Error,
                span,
                "E021",
                format!("event source array '{}' has zero instances", decl.name),
            );
        }
    }
    if let Some(prev) = v.symbols.source_decls.get(&decl.name) {
        let prev_span = *prev;
        v.emit_with_related(
            Severity::Error,
            span,
            "E001",
            format!("duplicate event source '{}'", decl.name),
            vec![RelatedSpan {
                span: prev_span,
                message: "previously declared here".to_string(),
            }],
        );
        return;
    }
    v.symbols.source_decls.insert(decl.name.clone(), span);

    // The processor output is resolved in Pass 2; record the raw stream
    // type for now and fix it up there.
    for instance in decl.instance_names() {
        if let Some(prev) = v.symbols.sources.get(&instance) {
            let prev_span = prev.span;
            v.emit_with_related(
                Severity::Error,
                span,
                "E001",
                format!("event source instance '{}' collides", instance),
                vec![RelatedSpan {
                    span: prev_span,
                    message: "previously declared here".to_string(),
                }],
            );
            continue;
        }
        v.symbols.sources.insert(
            instance,
            SourceInfo {
                span,
                output_type: decl.stream_type.clone(),
                buffer_size: decl.buffer_size,
            },
        );
    }
}

fn collect_group(v: &mut Validator, decl: &BufferGroupDecl, span: Span) {
    check_reserved(v, &decl.name, span, "buffer group");
    if let Some(prev) = v.symbols.groups.get(&decl.name) {
        let prev_span = prev.span;
        v.emit_with_related(
            Severity::Error,
            span,
            "E001",
            format!("duplicate buffer group '{}'", decl.name),
            vec![RelatedSpan {
                span: prev_span,
                message: "previously declared here".to_string(),
            }],
        );
        return;
    }
    v.symbols.groups.insert(
        decl.name.clone(),
        GroupInfo {
            span,
            stream_type: decl.stream_type.clone(),
            members: decl.members.clone(),
        },
    );
}

fn collect_match_fun(v: &mut Validator, decl: &MatchFunDecl, span: Span) {
    check_reserved(v, &decl.name, span, "match fun");
    for param in &decl.params {
        check_reserved(v, param, span, "parameter");
    }
    if let Some(prev) = v.symbols.match_funs.get(&decl.name) {
        let prev_span = prev.span;
        v.emit_with_related(
            Severity::Error,
            span,
            "E001",
            format!("duplicate match fun '{}'", decl.name),
            vec![RelatedSpan {
                span: prev_span,
                message: "previously declared here".to_string(),
            }],
        );
        return;
    }
    v.symbols.match_funs.insert(
        decl.name.clone(),
        MatchFunInfo {
            span,
            param_count: decl.params.len(),
        },
    );
}

// ---------------------------------------------------------------------------
// Pass 2: Reference and Shape Checks
// ---------------------------------------------------------------------------

pub fn pass2_semantic(v: &mut Validator, program: &Program) {
    for component in &program.components {
        let span = component.span;
        match &component.node {
            Component::EventSource(decl) => check_source(v, decl, span),
            Component::StreamProcessor(decl) => check_processor(v, decl, span),
            Component::BufferGroup(decl) => check_group(v, decl, span),
            Component::MatchFun(decl) => {
                let scope: Vec<&str> = decl.params.iter().map(|p| p.as_str()).collect();
                check_expr(v, &decl.body, &scope, &[], span, "match fun body");
            }
            _ => {}
        }
    }

    check_arbiter(v, program);
    check_monitor(v, program);
}

fn check_source(v: &mut Validator, decl: &EventSourceDecl, span: Span) {
    let stream_type = match v.symbols.stream_types.get(&decl.stream_type) {
        Some(info) => Some(info.shared_arg_count),
        None => {
            let suggestion = v
                .symbols
                .did_you_mean(SymbolKind::StreamType, &decl.stream_type);
            v.emit(
                Severity::Error,
                span,
                "E010",
                format!(
                    "unknown stream type '{}' in event source '{}'{}",
                    decl.stream_type, decl.name, suggestion
                ),
            );
            None
        }
    };

    if let Some(processor) = &decl.processor {
        let processor_io = v
            .symbols
            .processors
            .get(processor)
            .map(|info| (info.input.clone(), info.output.clone()));
        match processor_io {
            Some((input, output)) => {
                if input != decl.stream_type {
                    v.emit(
                        Severity::Error,
                        span,
                        "E022",
                        format!(
                            "stream processor '{}' expects input '{}' but source '{}' has type '{}'",
                            processor, input, decl.name, decl.stream_type
                        ),
                    );
                }
                // Downstream stages observe the processor output.
                for instance in decl.instance_names() {
                    if let Some(src) = v.symbols.sources.get_mut(&instance) {
                        src.output_type = output.clone();
                    }
                }
            }
            None => {
                let suggestion = v.symbols.did_you_mean(SymbolKind::Processor, processor);
                v.emit(
                    Severity::Error,
                    span,
                    "E014",
                    format!(
                        "unknown stream processor '{}' in event source '{}'{}",
                        processor, decl.name, suggestion
                    ),
                );
            }
        }
    }

    if let Some(shared_arg_count) = stream_type {
        if decl.with_args.len() != shared_arg_count {
            v.emit(
                Severity::Error,
                span,
                "E021",
                format!(
                    "event source '{}' provides {} argument(s) but stream type '{}' declares {}",
                    decl.name,
                    decl.with_args.len(),
                    decl.stream_type,
                    shared_arg_count
                ),
            );
        }
    }
    // Array instances may refer to their own index in arg initializers.
    let extra: &[&str] = if decl.count.is_some() { &["index"] } else { &[] };
    for arg in &decl.with_args {
        check_expr(v, arg, &[], extra, span, "source argument");
    }

    if decl.buffer_size == Some(0) {
        v.emit(
            Severity::Error,
            span,
            "E021",
            format!("event source '{}' declares a zero-sized buffer", decl.name),
        );
    }
}

fn check_processor(v: &mut Validator, decl: &StreamProcessorDecl, span: Span) {
    for ty in [&decl.input, &decl.output] {
        if !v.symbols.stream_types.contains_key(ty) {
            let suggestion = v.symbols.did_you_mean(SymbolKind::StreamType, ty);
            v.emit(
                Severity::Error,
                span,
                "E010",
                format!(
                    "unknown stream type '{}' in stream processor '{}'{}",
                    ty, decl.name, suggestion
                ),
            );
        }
    }

    for rule in &decl.rules {
        check_event_in_type(v, &rule.from_event, &decl.input, span, "rewrite rule");
        check_event_in_type(v, &rule.to_event, &decl.output, span, "rewrite rule");

        if let Some(info) = v.symbols.events.get(&rule.from_event) {
            if info.field_count != rule.binders.len() {
                let expected = info.field_count;
                v.emit(
                    Severity::Error,
                    span,
                    "E021",
                    format!(
                        "rewrite of '{}' binds {} name(s) but the event has {} field(s)",
                        rule.from_event,
                        rule.binders.len(),
                        expected
                    ),
                );
            }
        }
        if let Some(info) = v.symbols.events.get(&rule.to_event) {
            if info.field_count != rule.args.len() {
                let expected = info.field_count;
                v.emit(
                    Severity::Error,
                    span,
                    "E021",
                    format!(
                        "rewrite into '{}' gives {} expression(s) but the event has {} field(s)",
                        rule.to_event,
                        rule.args.len(),
                        expected
                    ),
                );
            }
        }

        let mut seen = HashSet::new();
        for binder in &rule.binders {
            check_reserved(v, binder, span, "binder");
            if !seen.insert(binder.as_str()) {
                v.emit(
                    Severity::Error,
                    span,
                    "E001",
                    format!("duplicate binder '{}' in rewrite rule", binder),
                );
            }
        }
        let scope: Vec<&str> = rule.binders.iter().map(|b| b.as_str()).collect();
        for arg in &rule.args {
            check_expr(v, arg, &scope, &[], span, "rewrite expression");
        }
    }
}

fn check_group(v: &mut Validator, decl: &BufferGroupDecl, span: Span) {
    if !v.symbols.stream_types.contains_key(&decl.stream_type) {
        let suggestion = v
            .symbols
            .did_you_mean(SymbolKind::StreamType, &decl.stream_type);
        v.emit(
            Severity::Error,
            span,
            "E010",
            format!(
                "unknown stream type '{}' in buffer group '{}'{}",
                decl.stream_type, decl.name, suggestion
            ),
        );
    }

    let mut seen = HashSet::new();
    for member in &decl.members {
        if !seen.insert(member.as_str()) {
            v.emit(
                Severity::Error,
                span,
                "E001",
                format!(
                    "source '{}' listed twice in buffer group '{}'",
                    member, decl.name
                ),
            );
        }
        match v.symbols.sources.get(member) {
            Some(info) => {
                if info.output_type != decl.stream_type {
                    let output_type = info.output_type.clone();
                    v.emit(
                        Severity::Error,
                        span,
                        "E022",
                        format!(
                            "source '{}' feeds '{}' but buffer group '{}' holds '{}'",
                            member, output_type, decl.name, decl.stream_type
                        ),
                    );
                }
            }
            None => {
                let suggestion = v.symbols.did_you_mean(SymbolKind::SourceInstance, member);
                v.emit(
                    Severity::Error,
                    span,
                    "E011",
                    format!(
                        "unknown event source '{}' in buffer group '{}'{}",
                        member, decl.name, suggestion
                    ),
                );
            }
        }
    }

    check_order_expr(v, &decl.order, &decl.stream_type, span);
}

/// The order expression must be computable for every head event, so any
/// field it touches has to exist in each event of the group's type.
fn check_order_expr(v: &mut Validator, order: &OrderExpr, stream_type: &str, span: Span) {
    match order {
        OrderExpr::Field { name, .. } => {
            check_field_in_all_events(v, name, stream_type, span);
        }
        OrderExpr::Compare(expr) => {
            check_head_compare_expr(v, expr, stream_type, span);
        }
    }
}

fn check_field_in_all_events(v: &mut Validator, field: &str, stream_type: &str, span: Span) {
    let Some(event_names) = v.symbols.events_of(stream_type) else {
        return;
    };
    let missing: Vec<String> = event_names
        .iter()
        .filter(|ev| {
            v.symbols
                .events
                .get(*ev)
                .map(|info| !info.field_names.iter().any(|f| f == field))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        v.emit(
            Severity::Error,
            span,
            "E032",
            format!(
                "order field '{}' is missing from event(s) {} of stream type '{}'",
                field,
                missing.join(", "),
                stream_type
            ),
        );
    }
}

fn check_head_compare_expr(v: &mut Validator, expr: &Expr, stream_type: &str, span: Span) {
    match expr {
        Expr::Member { expr: base, member } => match base.as_ref() {
            Expr::Ident(name) if name == "left" || name == "right" => {
                check_field_in_all_events(v, member, stream_type, span);
            }
            _ => {
                v.emit(
                    Severity::Error,
                    span,
                    "E040",
                    "order expressions may only access fields of 'left' and 'right'".to_string(),
                );
            }
        },
        Expr::Ident(name) => {
            if name != "left" && name != "right" {
                let suggestion = did_you_mean_among(name, ["left", "right"]);
                v.emit(
                    Severity::Error,
                    span,
                    "E040",
                    format!("unknown name '{}' in order expression{}", name, suggestion),
                );
            }
        }
        Expr::Unary { expr, .. } => check_head_compare_expr(v, expr, stream_type, span),
        Expr::Binary { left, right, .. } => {
            check_head_compare_expr(v, left, stream_type, span);
            check_head_compare_expr(v, right, stream_type, span);
        }
        Expr::Call { func, args } => {
            check_call(v, func, args.len(), span);
            for arg in args {
                check_head_compare_expr(v, arg, stream_type, span);
            }
        }
        Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {}
    }
}

fn check_event_in_type(v: &mut Validator, event: &str, stream_type: &str, span: Span, ctx: &str) {
    let Some(event_names) = v.symbols.events_of(stream_type).map(|e| e.to_vec()) else {
        return; // unknown type already reported
    };
    if !event_names.iter().any(|e| e == event) {
        let suggestion = did_you_mean_among(event, event_names.iter().map(|s| s.as_str()));
        v.emit(
            Severity::Error,
            span,
            "E012",
            format!(
                "event '{}' is not declared in stream type '{}' ({}){}",
                event, stream_type, ctx, suggestion
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Arbiter
// ---------------------------------------------------------------------------

fn check_arbiter(v: &mut Validator, program: &Program) {
    let arbiter = &program.arbiter.node;
    let span = program.arbiter.span;

    if !v.symbols.stream_types.contains_key(&arbiter.output_type) {
        let suggestion = v
            .symbols
            .did_you_mean(SymbolKind::StreamType, &arbiter.output_type);
        v.emit(
            Severity::Error,
            span,
            "E010",
            format!(
                "unknown arbiter output stream type '{}'{}",
                arbiter.output_type, suggestion
            ),
        );
    }

    for rule_set in &arbiter.rule_sets {
        for (rule_idx, rule) in rule_set.rules.iter().enumerate() {
            check_match_rule(v, rule, rule_set, rule_idx, &arbiter.output_type, span);
        }
    }
}

fn check_match_rule(
    v: &mut Validator,
    rule: &MatchRule,
    rule_set: &RuleSet,
    rule_idx: usize,
    output_type: &str,
    span: Span,
) {
    let where_ = format!("rule {} of rule set '{}'", rule_idx + 1, rule_set.name);

    // Aliases introduced by the chooser act as stream names inside the rule.
    let mut aliases: Vec<&str> = Vec::new();
    if let Some(chooser) = &rule.chooser {
        let member_count = v
            .symbols
            .groups
            .get(&chooser.group)
            .map(|g| g.members.len());
        match member_count {
            Some(member_count) => {
                if chooser.count as usize > member_count {
                    // Never satisfiable, but still a valid program: the
                    // arbiter simply never matches this rule.
                    v.emit(
                        Severity::Warning,
                        span,
                        "W002",
                        format!(
                            "{} chooses {} streams from '{}' which has only {} member(s)",
                            where_, chooser.count, chooser.group, member_count
                        ),
                    );
                }
            }
            None => {
                let suggestion = v.symbols.did_you_mean(SymbolKind::Group, &chooser.group);
                v.emit(
                    Severity::Error,
                    span,
                    "E013",
                    format!(
                        "unknown buffer group '{}' in {}{}",
                        chooser.group, where_, suggestion
                    ),
                );
            }
        }
        if chooser.count == 0 {
            v.emit(
                Severity::Error,
                span,
                "E021",
                format!("{} chooses zero streams", where_),
            );
        }
        if !chooser.aliases.is_empty() && chooser.aliases.len() != chooser.count as usize {
            v.emit(
                Severity::Error,
                span,
                "E021",
                format!(
                    "{} chooses {} streams but names {} alias(es)",
                    where_,
                    chooser.count,
                    chooser.aliases.len()
                ),
            );
        }
        for alias in &chooser.aliases {
            check_reserved(v, alias, span, "chooser alias");
            aliases.push(alias.as_str());
        }
    }

    // Resolve every head pattern to its stream type; collect binders.
    let mut binders: Vec<String> = Vec::new();
    let mut seen_sources: HashSet<&str> = HashSet::new();
    for pattern in &rule.patterns {
        // A stream cannot be matched twice in one rule.
        if !seen_sources.insert(pattern.source.as_str()) {
            v.emit(
                Severity::Error,
                span,
                "E023",
                format!(
                    "source '{}' participates twice in {}",
                    pattern.source, where_
                ),
            );
            continue;
        }

        let stream_type: Option<String> = if aliases.contains(&pattern.source.as_str()) {
            rule.chooser
                .as_ref()
                .and_then(|c| v.symbols.groups.get(&c.group))
                .map(|g| g.stream_type.clone())
        } else {
            match v.symbols.sources.get(&pattern.source) {
                Some(info) => Some(info.output_type.clone()),
                None => {
                    // chooser aliases are stream names inside the rule
                    let suggestion = did_you_mean_among(
                        &pattern.source,
                        v.symbols
                            .sources
                            .keys()
                            .map(|s| s.as_str())
                            .chain(aliases.iter().copied()),
                    );
                    v.emit(
                        Severity::Error,
                        span,
                        "E011",
                        format!(
                            "unknown event source '{}' in {}{}",
                            pattern.source, where_, suggestion
                        ),
                    );
                    None
                }
            }
        };

        for event_pattern in &pattern.events {
            if let Some(ty) = &stream_type {
                check_event_in_type(v, &event_pattern.event, ty, span, &where_);
            }
            check_pattern_binders(v, event_pattern, &mut binders, span, &where_);
        }

        // Matching more events than the buffer can ever hold is legal but
        // dead; surface it instead of silently emitting a no-op rule.
        let capacity = v
            .symbols
            .sources
            .get(&pattern.source)
            .map(|info| info.buffer_size.unwrap_or(v.default_buffer_size));
        if let Some(capacity) = capacity {
            if pattern.events.len() > capacity {
                v.emit(
                    Severity::Warning,
                    span,
                    "W001",
                    format!(
                        "{} needs {} head events from '{}' whose buffer holds {}; it can never match",
                        where_,
                        pattern.events.len(),
                        pattern.source,
                        capacity
                    ),
                );
            }
        }
    }

    let binder_scope: Vec<&str> = binders.iter().map(|b| b.as_str()).collect();
    if let Some(Guard::Expr(expr)) = &rule.guard {
        check_expr(v, expr, &binder_scope, &[], span, "guard");
    }

    // Actions: exactly one yield, drops only on participating streams.
    let yields = rule
        .actions
        .iter()
        .filter(|a| matches!(a, Action::Yield { .. }))
        .count();
    if yields != 1 {
        v.emit(
            Severity::Error,
            span,
            "E025",
            format!("{} must yield exactly one event, found {}", where_, yields),
        );
    }

    for action in &rule.actions {
        match action {
            Action::Yield { event, args } => {
                check_event_in_type_code(v, event, output_type, span, &where_, "E030");
                if let Some(info) = v.symbols.events.get(event) {
                    if info.field_count != args.len() {
                        let expected = info.field_count;
                        v.emit(
                            Severity::Error,
                            span,
                            "E021",
                            format!(
                                "{} yields '{}' with {} argument(s) but the event has {} field(s)",
                                where_,
                                event,
                                args.len(),
                                expected
                            ),
                        );
                    }
                }
                for arg in args {
                    check_expr(v, arg, &binder_scope, &[], span, "yield argument");
                }
            }
            Action::Drop { count, source } => {
                if !seen_sources.contains(source.as_str()) {
                    v.emit(
                        Severity::Error,
                        span,
                        "E024",
                        format!(
                            "{} drops from '{}' which does not participate in the rule",
                            where_, source
                        ),
                    );
                }
                if *count == 0 {
                    v.emit(
                        Severity::Error,
                        span,
                        "E021",
                        format!("{} drops zero events from '{}'", where_, source),
                    );
                }
            }
        }
    }
}

fn check_pattern_binders(
    v: &mut Validator,
    pattern: &EventPattern,
    binders: &mut Vec<String>,
    span: Span,
    where_: &str,
) {
    if let Some(info) = v.symbols.events.get(&pattern.event) {
        if info.field_count != pattern.binders.len() {
            let expected = info.field_count;
            v.emit(
                Severity::Error,
                span,
                "E021",
                format!(
                    "pattern '{}' in {} binds {} name(s) but the event has {} field(s)",
                    pattern.event,
                    where_,
                    pattern.binders.len(),
                    expected
                ),
            );
        }
    }
    for binder in &pattern.binders {
        check_reserved(v, binder, span, "binder");
        if binders.iter().any(|b| b == binder) {
            v.emit(
                Severity::Error,
                span,
                "E001",
                format!("duplicate binder '{}' in {}", binder, where_),
            );
        } else {
            binders.push(binder.clone());
        }
    }
}

fn check_event_in_type_code(
    v: &mut Validator,
    event: &str,
    stream_type: &str,
    span: Span,
    ctx: &str,
    code: &'static str,
) {
    let Some(event_names) = v.symbols.events_of(stream_type).map(|e| e.to_vec()) else {
        return;
    };
    if !event_names.iter().any(|e| e == event) {
        let suggestion = did_you_mean_among(event, event_names.iter().map(|s| s.as_str()));
        v.emit(
            Severity::Error,
            span,
            code,
            format!(
                "event '{}' is not part of the arbiter output stream type '{}' ({}){}",
                event, stream_type, ctx, suggestion
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

fn check_monitor(v: &mut Validator, program: &Program) {
    let monitor = &program.monitor.node;
    let span = program.monitor.span;
    let output_type = &program.arbiter.node.output_type;

    for (idx, rule) in monitor.rules.iter().enumerate() {
        let where_ = format!("monitor rule {}", idx + 1);
        check_event_in_type_code(v, &rule.pattern.event, output_type, span, &where_, "E031");

        let mut binders = Vec::new();
        check_pattern_binders(v, &rule.pattern, &mut binders, span, &where_);

        let scope: Vec<&str> = binders.iter().map(|b| b.as_str()).collect();
        if let Some(Guard::Expr(expr)) = &rule.guard {
            check_expr(v, expr, &scope, &[], span, "monitor guard");
        }
    }
}

// ---------------------------------------------------------------------------
// Expression checks
// ---------------------------------------------------------------------------

fn check_call(v: &mut Validator, func: &str, arg_count: usize, span: Span) {
    match v.symbols.match_funs.get(func) {
        Some(info) => {
            if info.param_count != arg_count {
                let expected = info.param_count;
                v.emit(
                    Severity::Error,
                    span,
                    "E021",
                    format!(
                        "match fun '{}' takes {} parameter(s), called with {}",
                        func, expected, arg_count
                    ),
                );
            }
        }
        None => {
            let suggestion = v.symbols.did_you_mean(SymbolKind::MatchFun, func);
            v.emit(
                Severity::Error,
                span,
                "E015",
                format!("unknown match fun '{}'{}", func, suggestion),
            );
        }
    }
}

/// Check that every identifier in `expr` resolves to a bound name.
fn check_expr(
    v: &mut Validator,
    expr: &Expr,
    scope: &[&str],
    extra: &[&str],
    span: Span,
    ctx: &str,
) {
    match expr {
        Expr::Ident(name) => {
            if !scope.contains(&name.as_str()) && !extra.contains(&name.as_str()) {
                let suggestion = did_you_mean_among(name, scope.iter().copied());
                v.emit(
                    Severity::Error,
                    span,
                    "E040",
                    format!("unknown name '{}' in {}{}", name, ctx, suggestion),
                );
            }
        }
        Expr::Member { .. } => {
            // Binders are scalars; head-field access is only meaningful
            // in buffer group order expressions.
            v.emit(
                Severity::Error,
                span,
                "E040",
                format!("member access is not allowed in {}", ctx),
            );
        }
        Expr::Unary { expr, .. } => check_expr(v, expr, scope, extra, span, ctx),
        Expr::Binary { left, right, .. } => {
            check_expr(v, left, scope, extra, span, ctx);
            check_expr(v, right, scope, extra, span, ctx);
        }
        Expr::Call { func, args } => {
            check_call(v, func, args.len(), span);
            for arg in args {
                check_expr(v, arg, scope, extra, span, ctx);
            }
        }
        Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {}
    }
}
