//! Symbol table for tracking declarations during validation.

use crate::span::Span;
use std::collections::HashMap;

/// Information about a declared stream type.
#[derive(Debug, Clone)]
pub struct StreamTypeInfo {
    pub span: Span,
    pub event_names: Vec<String>,
    pub shared_arg_count: usize,
}

/// Information about a declared event shape (program-wide namespace).
#[derive(Debug, Clone)]
pub struct EventInfo {
    pub span: Span,
    pub stream_type: String,
    pub field_count: usize,
    pub field_names: Vec<String>,
}

/// Information about a declared stream processor.
#[derive(Debug, Clone)]
pub struct ProcessorInfo {
    pub span: Span,
    pub input: String,
    pub output: String,
}

/// Information about one event-source instance.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub span: Span,
    /// Stream type observed downstream (the processor output if any).
    pub output_type: String,
    /// Explicit `buffer size` override, if declared.
    pub buffer_size: Option<usize>,
}

/// Information about a declared buffer group.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub span: Span,
    pub stream_type: String,
    pub members: Vec<String>,
}

/// Information about a declared match fun.
#[derive(Debug, Clone)]
pub struct MatchFunInfo {
    pub span: Span,
    pub param_count: usize,
}

/// Symbol table built during Pass 1.
#[derive(Debug)]
pub struct SymbolTable {
    pub stream_types: HashMap<String, StreamTypeInfo>,
    pub events: HashMap<String, EventInfo>,
    pub processors: HashMap<String, ProcessorInfo>,
    /// Keyed by expanded instance name (`s`, or `s_0`..`s_{N-1}`).
    pub sources: HashMap<String, SourceInfo>,
    /// Base names of source declarations (for duplicate detection).
    pub source_decls: HashMap<String, Span>,
    pub groups: HashMap<String, GroupInfo>,
    pub match_funs: HashMap<String, MatchFunInfo>,
}

/// Namespace a misspelled reference is matched against when building a
/// "did you mean?" suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    StreamType,
    SourceInstance,
    Group,
    Processor,
    MatchFun,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            stream_types: HashMap::new(),
            events: HashMap::new(),
            processors: HashMap::new(),
            sources: HashMap::new(),
            source_decls: HashMap::new(),
            groups: HashMap::new(),
            match_funs: HashMap::new(),
        }
    }

    /// Event names declared by one stream type, if it exists.
    pub fn events_of(&self, stream_type: &str) -> Option<&[String]> {
        self.stream_types
            .get(stream_type)
            .map(|info| info.event_names.as_slice())
    }

    fn names_of(&self, kind: SymbolKind) -> Vec<&str> {
        let keys: Vec<&String> = match kind {
            SymbolKind::StreamType => self.stream_types.keys().collect(),
            SymbolKind::SourceInstance => self.sources.keys().collect(),
            SymbolKind::Group => self.groups.keys().collect(),
            SymbolKind::Processor => self.processors.keys().collect(),
            SymbolKind::MatchFun => self.match_funs.keys().collect(),
        };
        keys.into_iter().map(|s| s.as_str()).collect()
    }

    /// "; did you mean 'X'?" drawn from one declaration namespace, or
    /// empty when nothing declared is close enough.
    pub fn did_you_mean(&self, kind: SymbolKind, name: &str) -> String {
        did_you_mean_among(name, self.names_of(kind))
    }
}

/// Render the suggestion suffix for the closest candidate, if any.
pub(super) fn did_you_mean_among<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> String {
    match closest_match(name, candidates) {
        Some(found) => format!("; did you mean '{}'?", found),
        None => String::new(),
    }
}

/// Pick the candidate with the smallest edit distance to `name`, if one
/// lands within the relevance cap. Earlier candidates win ties, so the
/// declaration maps' iteration feeds a stable-enough ranking.
pub(super) fn closest_match<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let cap = distance_cap(name.len());
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        if let Some(dist) = edit_distance_within(name, candidate, cap) {
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, candidate));
            }
        }
    }
    best.map(|(_, found)| found.to_string())
}

/// How far off a reference may be and still earn a suggestion.
fn distance_cap(name_len: usize) -> usize {
    match name_len {
        0..=3 => 1,
        4..=7 => 2,
        _ => 3,
    }
}

/// Case-insensitive edit distance, abandoned as soon as it provably
/// exceeds `cap` (one DP row; every candidate in the table is scanned,
/// so the cutoff matters).
fn edit_distance_within(a: &str, b: &str, cap: usize) -> Option<usize> {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len().abs_diff(b.len()) > cap {
        return None;
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];
        for (j, &cb) in b.iter().enumerate() {
            let substituted = if ca.eq_ignore_ascii_case(&cb) {
                diag
            } else {
                diag + 1
            };
            diag = row[j + 1];
            row[j + 1] = substituted.min(diag + 1).min(row[j] + 1);
            row_min = row_min.min(row[j + 1]);
        }
        if row_min > cap {
            return None;
        }
    }

    let dist = row[b.len()];
    (dist <= cap).then_some(dist)
}
