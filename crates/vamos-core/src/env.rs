//! The symbol environment threaded through parse -> analyze -> emit.
//!
//! One `Environment` value per compilation. Construction seeds the
//! reserved-keyword set; `Environment::build` populates every table in a
//! single deterministic walk over the AST. The emitter treats the
//! environment as frozen: it is built only after validation has passed.

use crate::ast::*;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;

/// Kind id reserved for the synthetic `hole` event. User event kinds are
/// assigned contiguously from `HOLE_KIND + 1` in declaration order.
pub const HOLE_KIND: u32 = 0;

/// Default capacity of per-source arbiter buffers and the monitor buffer
/// when the program does not override them.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Identifiers of the target host language plus names the emitted
/// program claims for itself. Using any of these as a user identifier is
/// rejected during validation.
pub const RESERVED_KEYWORDS: &[&str] = &[
    // C keywords
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while",
    // emitted globals and locals
    "hole", "monitor_buffer", "chosen_streams", "arbiter_counter",
    "is_selection_successful", "count_event_streams", "arbiter",
    "main", "left", "right", "index", "inevent", "outevent", "hole_n",
    "received_event", "matched",
];

/// The AST partitioned by component kind, preserving source order.
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    pub stream_types: Vec<StreamTypeDecl>,
    pub stream_processors: Vec<StreamProcessorDecl>,
    pub event_sources: Vec<EventSourceDecl>,
    pub buffer_groups: Vec<BufferGroupDecl>,
    pub match_funs: Vec<MatchFunDecl>,
    pub globals: Vec<String>,
    pub startup: Vec<String>,
    pub cleanup: Vec<String>,
}

impl ComponentIndex {
    /// Walk the components block exactly once, dispatching on kind.
    pub fn build(program: &Program) -> Self {
        let mut index = ComponentIndex::default();
        for component in &program.components {
            match &component.node {
                Component::StreamType(d) => index.stream_types.push(d.clone()),
                Component::StreamProcessor(d) => index.stream_processors.push(d.clone()),
                Component::EventSource(d) => index.event_sources.push(d.clone()),
                Component::BufferGroup(d) => index.buffer_groups.push(d.clone()),
                Component::MatchFun(d) => index.match_funs.push(d.clone()),
                Component::Raw(b) => match b.kind {
                    RawKind::Globals => index.globals.push(b.code.clone()),
                    RawKind::Startup => index.startup.push(b.code.clone()),
                    RawKind::Cleanup => index.cleanup.push(b.code.clone()),
                },
            }
        }
        index
    }
}

/// Frozen symbol tables of one compilation.
#[derive(Debug, Clone)]
pub struct Environment {
    pub reserved_keywords: FxHashSet<&'static str>,
    /// Event name -> kind id, assigned in declaration order from 1.
    pub events_to_kinds: IndexMap<String, u32>,
    /// Stream type name -> ordered event declarations.
    pub stream_events: IndexMap<String, Vec<EventDecl>>,
    /// Stream type name -> shared-args fields.
    pub stream_args: IndexMap<String, Vec<Field>>,
    /// Stream processor name -> rewrite rules.
    pub stream_processors_data: IndexMap<String, StreamProcessorDecl>,
    /// Instance names for which arbiter buffers are emitted.
    pub existing_buffers: IndexSet<String>,
    /// The single stream type every arbiter rule yields into.
    pub arbiter_output_type: String,
    /// Capacity of the arbiter -> monitor ring.
    pub monitor_buffer_size: usize,
    /// Stream type name -> ordered event names (post-processor view is
    /// resolved through `stream_types`, which maps instances to types).
    pub streams_to_events_map: IndexMap<String, Vec<String>>,
    /// Source instance name -> (input stream type, output stream type).
    pub stream_types: IndexMap<String, (String, String)>,
    /// Source instance name -> arbiter buffer capacity.
    pub source_buffer_sizes: IndexMap<String, usize>,
    pub index: ComponentIndex,
}

impl Environment {
    /// Build the environment from a validated program.
    ///
    /// `default_buffer_size` backs sources without a `buffer size`
    /// clause (the CLI injects its `--bufsize` value here).
    pub fn build(program: &Program, default_buffer_size: usize) -> Self {
        let index = ComponentIndex::build(program);

        let mut events_to_kinds = IndexMap::new();
        let mut stream_events = IndexMap::new();
        let mut stream_args = IndexMap::new();
        let mut streams_to_events_map = IndexMap::new();
        let mut next_kind = HOLE_KIND + 1;
        for st in &index.stream_types {
            for ev in &st.events {
                events_to_kinds.insert(ev.name.clone(), next_kind);
                next_kind += 1;
            }
            stream_events.insert(st.name.clone(), st.events.clone());
            stream_args.insert(st.name.clone(), st.shared_args.clone());
            streams_to_events_map.insert(
                st.name.clone(),
                st.events.iter().map(|e| e.name.clone()).collect(),
            );
        }

        let mut stream_processors_data = IndexMap::new();
        for sp in &index.stream_processors {
            stream_processors_data.insert(sp.name.clone(), sp.clone());
        }

        let mut stream_types = IndexMap::new();
        let mut existing_buffers = IndexSet::new();
        let mut source_buffer_sizes = IndexMap::new();
        for src in &index.event_sources {
            let input = src.stream_type.clone();
            let output = match &src.processor {
                Some(p) => stream_processors_data
                    .get(p)
                    .map(|sp| sp.output.clone())
                    .unwrap_or_else(|| input.clone()),
                None => input.clone(),
            };
            let capacity = src.buffer_size.unwrap_or(default_buffer_size);
            for instance in src.instance_names() {
                stream_types.insert(instance.clone(), (input.clone(), output.clone()));
                existing_buffers.insert(instance.clone());
                source_buffer_sizes.insert(instance, capacity);
            }
        }

        let arbiter_output_type = program.arbiter.node.output_type.clone();
        let monitor_buffer_size = program
            .monitor
            .node
            .buffer_size
            .unwrap_or(DEFAULT_BUFFER_SIZE);

        Environment {
            reserved_keywords: RESERVED_KEYWORDS.iter().copied().collect(),
            events_to_kinds,
            stream_events,
            stream_args,
            stream_processors_data,
            existing_buffers,
            arbiter_output_type,
            monitor_buffer_size,
            streams_to_events_map,
            stream_types,
            source_buffer_sizes,
            index,
        }
    }

    /// Kind id of a declared event.
    pub fn kind_of(&self, event: &str) -> Option<u32> {
        self.events_to_kinds.get(event).copied()
    }

    /// Output stream type observed downstream of a source instance.
    pub fn output_type_of(&self, instance: &str) -> Option<&str> {
        self.stream_types.get(instance).map(|(_, out)| out.as_str())
    }

    /// Event declaration looked up by name across all stream types.
    pub fn event_decl(&self, event: &str) -> Option<&EventDecl> {
        self.stream_events
            .values()
            .flat_map(|evs| evs.iter())
            .find(|e| e.name == event)
    }

    /// Events of the stream type a source instance feeds the arbiter.
    pub fn instance_events(&self, instance: &str) -> Option<&[EventDecl]> {
        let (_, out) = self.stream_types.get(instance)?;
        self.stream_events.get(out).map(|v| v.as_slice())
    }
}
