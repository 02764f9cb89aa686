//! `main` synthesis: acquisition, thread startup, the monitor loop and
//! teardown in reverse acquisition order.

use crate::groups::{buffer_group_destroy_code, buffer_group_init_code};
use crate::sources::{activate_code, args_init_code, connect_code, instances, spawn_code};
use vamos_core::env::Environment;

/// `monitor_body` is the already-lowered monitor loop: the inline rule
/// dispatch of the C backend, or the extern dispatch of the Tessla one.
pub fn main_function(env: &Environment, monitor_body: &str) -> String {
    let source_count = instances(env).len();
    let mut out = String::from("int main(int argc, char **argv) {\n");
    out.push_str("  (void)argc;\n  (void)argv;\n");
    out.push_str("  initialize_events(); // always call this first\n");
    out.push_str(&format!(
        "  chosen_streams = (dll_node **)malloc(sizeof(dll_node *) * {});\n",
        source_count.max(1)
    ));
    out.push_str("  arbiter_counter = malloc(sizeof(int));\n");
    out.push_str("  *arbiter_counter = 10;\n");

    for block in &env.index.startup {
        out.push_str("\n  // startup code\n  {\n");
        for line in block.trim().lines() {
            out.push_str("    ");
            out.push_str(line.trim());
            out.push('\n');
        }
        out.push_str("  }\n");
    }

    let args_init = args_init_code(env);
    if !args_init.is_empty() {
        out.push_str("\n  // initialize stream args\n");
        out.push_str(&args_init);
        out.push('\n');
    }

    out.push_str("\n  // connect to event sources\n");
    out.push_str(&connect_code(env));
    out.push('\n');

    out.push_str("\n  // activate buffers\n");
    out.push_str(&activate_code(env));
    out.push('\n');

    out.push_str(&format!(
        "\n  monitor_buffer = shm_monitor_buffer_create(sizeof(STREAM_{}_out), {});\n",
        env.arbiter_output_type, env.monitor_buffer_size
    ));

    let bg_init = buffer_group_init_code(env);
    if !bg_init.is_empty() {
        out.push_str("\n  // init buffer groups\n");
        out.push_str(&bg_init);
        out.push('\n');
    }

    out.push_str("\n  // create source-events threads\n");
    out.push_str(&spawn_code(env));
    out.push('\n');

    out.push_str("\n  // create arbiter thread\n");
    out.push_str("  thrd_create(&ARBITER_THREAD, arbiter, 0);\n\n");

    out.push_str(monitor_body);
    out.push('\n');

    out.push_str("\n  // destroy everything in reverse acquisition order\n");
    let bg_destroy = buffer_group_destroy_code(env);
    if !bg_destroy.is_empty() {
        out.push_str(&bg_destroy);
        out.push('\n');
    }
    out.push_str("  shm_monitor_buffer_destroy(monitor_buffer);\n");
    for (_, instance, _) in instances(env).iter().rev() {
        out.push_str(&format!("  shm_arbiter_buffer_destroy(BUFFER_{});\n", instance));
    }
    for (_, instance, _) in instances(env).iter().rev() {
        out.push_str(&format!("  shm_stream_destroy(EV_SOURCE_{});\n", instance));
    }
    out.push_str("  free(arbiter_counter);\n");
    out.push_str("  free(chosen_streams);\n");

    for block in &env.index.cleanup {
        out.push_str("\n  // cleanup code\n  {\n");
        for line in block.trim().lines() {
            out.push_str("    ");
            out.push_str(line.trim());
            out.push('\n');
        }
        out.push_str("  }\n");
    }

    out.push_str("\n  return 0;\n}");
    out
}
