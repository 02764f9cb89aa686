//! VAMOS code emitter.
//!
//! Lowers a validated program + frozen environment into one C source
//! file targeting the shamon/mmlib/monitor runtime ABI. Emission is a
//! pure function of its inputs: identical (AST, environment) pairs
//! produce byte-identical output.

pub mod cexpr;
pub mod model;
pub mod tessla;

mod arbiter;
mod events;
mod groups;
mod main_fn;
mod monitor;
mod sources;

use model::{EmissionModel, SectionId};
use vamos_core::ast::Program;
use vamos_core::env::Environment;

const INCLUDES: &str = r#"#include "shamon.h"
#include "mmlib.h"
#include "monitor.h"
#include <assert.h>
#include <stdatomic.h>
#include <stdbool.h>
#include <stdint.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <threads.h>"#;

const ARBITER_GLOBALS: &str = "\
int *arbiter_counter;
// monitor buffer
shm_monitor_buffer *monitor_buffer;

bool is_selection_successful;
dll_node **chosen_streams; // used by rule sets choosing from buffer groups";

/// Build the emission model for the C backend.
///
/// Sections are inserted in the fixed output layout; the dependency
/// edges document which earlier globals each section references.
pub fn build_model(program: &Program, env: &Environment) -> EmissionModel {
    let monitor_body = monitor::monitor_code(&program.monitor.node, env);
    build_model_with_monitor(program, env, monitor_body, None)
}

/// Shared model assembly; the backends differ only in the monitor body
/// and an optional extern-handler section.
pub(crate) fn build_model_with_monitor(
    program: &Program,
    env: &Environment,
    monitor_body: String,
    handler_decls: Option<String>,
) -> EmissionModel {
    let mut model = EmissionModel::new();

    model.push(SectionId::Includes, &[], INCLUDES.to_string());
    model.push(
        SectionId::HoleEvent,
        &[SectionId::Includes],
        events::hole_struct(),
    );
    model.push(
        SectionId::EventStructs,
        &[SectionId::HoleEvent],
        events::stream_type_structs(env),
    );
    model.push(
        SectionId::SourceGlobals,
        &[SectionId::EventStructs],
        sources::source_globals(env),
    );
    model.push(
        SectionId::ArbiterGlobals,
        &[SectionId::Includes],
        ARBITER_GLOBALS.to_string(),
    );

    let user_globals = env.index.globals.join("\n\n");
    if !user_globals.is_empty() {
        model.push(
            SectionId::UserGlobals,
            &[SectionId::ArbiterGlobals],
            format!("// globals code\n{}", user_globals),
        );
    }

    if let Some(decls) = handler_decls {
        model.push(
            SectionId::MonitorHandlers,
            &[SectionId::EventStructs],
            decls,
        );
    }

    model.push(
        SectionId::ShouldKeep,
        &[SectionId::EventStructs],
        sources::should_keep_functions(env),
    );
    model.push(
        SectionId::SourceThreads,
        &[SectionId::SourceGlobals, SectionId::ShouldKeep],
        sources::source_threads(env),
    );

    let accessors = events::head_field_accessors(env);
    if !accessors.is_empty() {
        model.push(
            SectionId::HeadAccessors,
            &[SectionId::EventStructs],
            accessors,
        );
    }

    let groups = groups::buffer_group_decls(env);
    if !groups.is_empty() {
        model.push(
            SectionId::BufferGroups,
            &[SectionId::HeadAccessors, SectionId::SourceGlobals],
            groups,
        );
    }

    model.push(
        SectionId::ArbiterHelpers,
        &[SectionId::SourceThreads],
        arbiter::arbiter_helpers(env),
    );
    model.push(
        SectionId::RuleSets,
        &[SectionId::ArbiterHelpers, SectionId::BufferGroups],
        arbiter::rule_set_functions(&program.arbiter.node, env),
    );
    model.push(
        SectionId::ArbiterMain,
        &[SectionId::RuleSets],
        arbiter::arbiter_main(&program.arbiter.node),
    );
    model.push(
        SectionId::MainFn,
        &[SectionId::ArbiterMain],
        main_fn::main_function(env, &monitor_body),
    );

    model
}

/// Emit the complete C program.
pub fn emit_c(program: &Program, env: &Environment) -> String {
    build_model(program, env).render()
}
