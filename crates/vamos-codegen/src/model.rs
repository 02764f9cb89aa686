//! The emission model: typed sections with explicit dependencies.
//!
//! Every lowering pass contributes one section of text. Sections name the
//! sections they reference, and the pretty-printer orders them with a
//! stable topological sort: among sections whose dependencies are met,
//! insertion order wins. The fixed layout of the emitted file is encoded
//! in the order the driver inserts sections, while the dependency edges
//! keep reorderings honest.

use indexmap::IndexMap;

/// Identity of one section of the emitted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// `#include` lines.
    Includes,
    /// The synthetic `hole` event struct.
    HoleEvent,
    /// Event structs, kind enum, per-type unions, args structs.
    EventStructs,
    /// Head-field accessors used by buffer group order expressions.
    HeadAccessors,
    /// Per-source globals: args, stream, buffer and thread handles.
    SourceGlobals,
    /// `arbiter_counter`, `monitor_buffer`, selection globals.
    ArbiterGlobals,
    /// User `globals` blocks.
    UserGlobals,
    /// Extern monitor-handler declarations (Tessla flavor only).
    MonitorHandlers,
    /// `should_keep` predicates.
    ShouldKeep,
    /// Live-stream counter, arbiter thread handle, drainer bodies.
    SourceThreads,
    /// Buffer group order expressions and group objects.
    BufferGroups,
    /// `are_streams_done`, peek helpers, printers.
    ArbiterHelpers,
    /// One evaluation function per rule set.
    RuleSets,
    /// The arbiter thread main loop.
    ArbiterMain,
    /// `main`.
    MainFn,
}

/// One write-once text fragment of the output.
#[derive(Debug, Clone)]
pub struct Section {
    pub id: SectionId,
    pub deps: Vec<SectionId>,
    pub text: String,
}

/// Ordered collection of sections forming one output file.
#[derive(Debug, Default)]
pub struct EmissionModel {
    sections: IndexMap<SectionId, Section>,
}

impl EmissionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a section. Sections are write-once; inserting the same id
    /// twice is a bug in the driver.
    pub fn push(&mut self, id: SectionId, deps: &[SectionId], text: String) {
        let prev = self.sections.insert(
            id,
            Section {
                id,
                deps: deps.to_vec(),
                text,
            },
        );
        debug_assert!(prev.is_none(), "section {:?} emitted twice", id);
    }

    /// Render all sections in dependency order.
    ///
    /// Stable: among ready sections the earliest-inserted is emitted
    /// first, so the driver's insertion order is the layout order
    /// whenever the dependencies allow it.
    pub fn render(&self) -> String {
        let mut emitted: Vec<SectionId> = Vec::with_capacity(self.sections.len());
        let mut done: Vec<SectionId> = Vec::new();

        while emitted.len() < self.sections.len() {
            let mut progressed = false;
            for section in self.sections.values() {
                if done.contains(&section.id) {
                    continue;
                }
                let ready = section
                    .deps
                    .iter()
                    .all(|d| done.contains(d) || !self.sections.contains_key(d));
                if ready {
                    emitted.push(section.id);
                    done.push(section.id);
                    progressed = true;
                }
            }
            // A dependency cycle would be a driver bug; fall back to
            // insertion order rather than loop forever.
            if !progressed {
                for section in self.sections.values() {
                    if !done.contains(&section.id) {
                        emitted.push(section.id);
                        done.push(section.id);
                    }
                }
            }
        }

        let mut out = String::new();
        for id in emitted {
            let text = &self.sections[&id].text;
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}
