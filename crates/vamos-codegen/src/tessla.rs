//! Tessla backend: instead of inlining monitor actions as C blocks, the
//! monitor loop dispatches into `#[no_mangle]` Rust handlers living in a
//! companion crate. Emits the C side at the requested output path and
//! maintains a managed region in `<dir>/src/monitor.rs`.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vamos_core::ast::Program;
use vamos_core::env::Environment;
use vamos_core::types::FieldType;

/// Start-of-region sentinel. Everything from this line to end of file is
/// owned by the emitter and replaced on every compilation; the region
/// body consists of the `#[no_mangle]` monitor exports.
pub const GENERATED_MARKER: &str =
    "// vamos:generated-monitor exports — regenerated on every compile, do not edit";

#[derive(Debug, Error)]
pub enum TesslaError {
    #[error("tessla project directory not found: {0}")]
    MissingDir(PathBuf),

    #[error("tessla project manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn rust_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Int => "i32",
        FieldType::Long => "i64",
        FieldType::Float => "f32",
        FieldType::Double => "f64",
        FieldType::Bool => "bool",
        FieldType::Str => "*const std::os::raw::c_char",
    }
}

fn c_handler_params(env: &Environment, event: &str) -> Vec<(String, String)> {
    env.event_decl(event)
        .map(|decl| {
            decl.fields
                .iter()
                .map(|f| (f.name.clone(), f.ty.c_name().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// The extern handler declarations prepended to the C program, plus a
/// monitor loop that forwards each output event to its handler.
fn handler_decls(env: &Environment) -> String {
    let mut out = String::from("// monitor handlers implemented in the companion crate\n");
    for event in env
        .streams_to_events_map
        .get(&env.arbiter_output_type)
        .cloned()
        .unwrap_or_default()
    {
        let params = c_handler_params(env, &event);
        let sig: Vec<String> = params
            .iter()
            .map(|(name, ty)| format!("{} {}", ty, name))
            .collect();
        let sig = if sig.is_empty() {
            "void".to_string()
        } else {
            sig.join(", ")
        };
        out.push_str(&format!("extern void vamos_monitor_{}({});\n", event, sig));
    }
    out.trim_end().to_string()
}

fn dispatch_loop(env: &Environment) -> String {
    let ty = &env.arbiter_output_type;
    let mut out = format!(
        "  // monitor: forward each output event to its handler\n  STREAM_{ty}_out *received_event;\n  while (true) {{\n    received_event = (STREAM_{ty}_out *)shm_monitor_buffer_fetch(monitor_buffer);\n    if (received_event == NULL) {{\n      break;\n    }}\n    switch (received_event->head.kind) {{\n",
        ty = ty
    );
    for event in env
        .streams_to_events_map
        .get(&env.arbiter_output_type)
        .cloned()
        .unwrap_or_default()
    {
        let params = c_handler_params(env, &event);
        let args: Vec<String> = params
            .iter()
            .map(|(name, _)| format!("received_event->cases.{}.{}", event, name))
            .collect();
        out.push_str(&format!(
            "    case VAMOS_EVENT_{}:\n      vamos_monitor_{}({});\n      break;\n",
            event,
            event,
            args.join(", ")
        ));
    }
    out.push_str("    default:\n      break;\n    }\n");
    out.push_str("    shm_monitor_buffer_consume(monitor_buffer, 1);\n  }");
    out
}

/// Generated Rust exports appended after the marker.
fn rust_exports(env: &Environment) -> String {
    let mut out = format!("{}\n", GENERATED_MARKER);
    for event in env
        .streams_to_events_map
        .get(&env.arbiter_output_type)
        .cloned()
        .unwrap_or_default()
    {
        let fields = env
            .event_decl(&event)
            .map(|d| d.fields.clone())
            .unwrap_or_default();
        let params: Vec<String> = fields
            .iter()
            .map(|f| format!("{}: {}", f.name, rust_type(f.ty)))
            .collect();
        let fmt_args: Vec<String> = fields
            .iter()
            .filter(|f| f.ty != FieldType::Str)
            .map(|f| f.name.clone())
            .collect();
        let fmt = vec!["{:?}"; fmt_args.len()].join(", ");
        out.push_str(&format!(
            "\n#[no_mangle]\npub extern \"C\" fn vamos_monitor_{}({}) {{\n    println!(\"{}({})\", {});\n}}\n",
            event,
            params.join(", "),
            event,
            fmt,
            fmt_args.join(", ")
        ));
    }
    out
}

/// Remove a previously generated region: everything from the marker line
/// to end of file.
pub fn strip_generated_region(source: &str) -> String {
    match source.find(GENERATED_MARKER) {
        Some(pos) => source[..pos].trim_end().to_string() + "\n",
        None => {
            let trimmed = source.trim_end();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{}\n", trimmed)
            }
        }
    }
}

/// Ensure the companion manifest builds a static library the C side can
/// link against.
fn ensure_staticlib(manifest: &str) -> String {
    if manifest.contains("crate-type") {
        return manifest.to_string();
    }
    format!(
        "{}\n[lib]\ncrate-type = [\"staticlib\"]\n",
        manifest.trim_end()
    )
}

/// Emit the Tessla flavor: C program at `out_path`, managed region in
/// `<dir>/src/monitor.rs`, manifest kept linkable.
pub fn emit_tessla(
    program: &Program,
    env: &Environment,
    out_path: &Path,
    dir: &Path,
) -> Result<(), TesslaError> {
    if !dir.is_dir() {
        return Err(TesslaError::MissingDir(dir.to_path_buf()));
    }
    let manifest_path = dir.join("Cargo.toml");
    if !manifest_path.is_file() {
        return Err(TesslaError::MissingManifest(manifest_path));
    }

    // C side: the regular program with the monitor loop swapped for
    // extern dispatch.
    fs::write(out_path, emit_c_interface(program, env))?;

    // Rust side: strip any previous region, then append the fresh one.
    let monitor_path = dir.join("src").join("monitor.rs");
    let existing = if monitor_path.is_file() {
        fs::read_to_string(&monitor_path)?
    } else {
        String::new()
    };
    let mut next = strip_generated_region(&existing);
    if !next.is_empty() {
        next.push('\n');
    }
    next.push_str(&rust_exports(env));
    if let Some(parent) = monitor_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&monitor_path, next)?;

    // Manifest: the interface links as a static library.
    let manifest = fs::read_to_string(&manifest_path)?;
    let updated = ensure_staticlib(&manifest);
    if updated != manifest {
        fs::write(&manifest_path, updated)?;
    }

    Ok(())
}

/// The C program of the Tessla flavor (pure, for tests).
pub fn emit_c_interface(program: &Program, env: &Environment) -> String {
    crate::build_model_with_monitor(program, env, dispatch_loop(env), Some(handler_decls(env)))
        .render()
}
