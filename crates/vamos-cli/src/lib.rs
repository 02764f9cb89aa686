//! VAMOS CLI library - testable compilation entry points.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

use vamos_core::env::Environment;
use vamos_core::validate::{diagnostic_position, validate};
use vamos_parser::{parse, substitute_placeholders};

/// Result of one successful compilation.
#[derive(Debug)]
pub struct CompileOutput {
    /// The emitted C program.
    pub code: String,
    /// Formatted warning diagnostics (already line:col rendered).
    pub warnings: Vec<String>,
}

/// Substitute build-time placeholders (`@BUFSIZE`) before lexing.
pub fn preprocess(source: &str, bufsize: usize) -> String {
    let mut values = HashMap::new();
    values.insert("BUFSIZE".to_string(), bufsize.to_string());
    values.insert("ARBITER_BUFSIZE".to_string(), bufsize.to_string());
    substitute_placeholders(source, &values)
}

/// Parse and validate only; used by `--check`-style tooling and tests.
pub fn check_syntax(source: &str, bufsize: usize) -> Result<()> {
    let substituted = preprocess(source, bufsize);
    let program = parse(&substituted).map_err(|e| parse_error(&substituted, e))?;
    let result = validate(&program, bufsize);
    if result.has_errors() {
        bail!("{}", result.format(&substituted).trim_end());
    }
    Ok(())
}

/// Compile VAMOS source to the C runtime program.
pub fn compile_source(source: &str, bufsize: usize) -> Result<CompileOutput> {
    let substituted = preprocess(source, bufsize);
    let program = parse(&substituted).map_err(|e| parse_error(&substituted, e))?;

    let result = validate(&program, bufsize);
    if result.has_errors() {
        bail!("{}", result.format(&substituted).trim_end());
    }
    let warnings = result
        .warnings()
        .map(|d| {
            let (line, col) = diagnostic_position(&substituted, d.span.start);
            format!("{}:{}: warning: {}", line, col, d.message)
        })
        .collect();

    let env = Environment::build(&program, bufsize);
    let code = vamos_codegen::emit_c(&program, &env);
    Ok(CompileOutput { code, warnings })
}

/// Compile with the Tessla backend: C interface at `out_path`, managed
/// region in `<dir>/src/monitor.rs`, manifest update.
pub fn compile_source_tessla(
    source: &str,
    bufsize: usize,
    out_path: &Path,
    dir: &Path,
) -> Result<Vec<String>> {
    let substituted = preprocess(source, bufsize);
    let program = parse(&substituted).map_err(|e| parse_error(&substituted, e))?;

    let result = validate(&program, bufsize);
    if result.has_errors() {
        bail!("{}", result.format(&substituted).trim_end());
    }
    let warnings = result
        .warnings()
        .map(|d| {
            let (line, col) = diagnostic_position(&substituted, d.span.start);
            format!("{}:{}: warning: {}", line, col, d.message)
        })
        .collect();

    let env = Environment::build(&program, bufsize);
    vamos_codegen::tessla::emit_tessla(&program, &env, out_path, dir)
        .context("tessla backend failed")?;
    Ok(warnings)
}

fn parse_error(source: &str, err: vamos_parser::ParseError) -> anyhow::Error {
    match err.position() {
        Some(pos) => {
            let (line, col) = diagnostic_position(source, pos);
            anyhow::anyhow!("{}:{}: syntax error: {}", line, col, err)
        }
        None => anyhow::anyhow!("syntax error: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        stream type S { A(x : int); }
        event source s : S buffer size @BUFSIZE;
        arbiter : S {
            rule set rs {
                on s : A(x) { yield A(x); drop 1 from s; }
            }
        }
        monitor {
            on A(x) $$ printf("%d\n", x); $$
        }
    "#;

    #[test]
    fn test_compile_valid_program() {
        let output = compile_source(VALID, 64).expect("should compile");
        assert!(output.code.contains("int main(int argc, char **argv)"));
        assert!(output.code.contains("sizeof(STREAM_S_out), 64"));
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_bufsize_flows_into_emission() {
        let output = compile_source(VALID, 128).expect("should compile");
        assert!(output.code.contains("sizeof(STREAM_S_out), 128"));
    }

    #[test]
    fn test_check_syntax_valid() {
        assert!(check_syntax(VALID, 64).is_ok());
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = compile_source("stream type { }", 64).unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("syntax error"));
        assert!(message.contains("1:"));
    }

    #[test]
    fn test_unknown_source_is_reported() {
        let source = r#"
            stream type S { A(x : int); }
            event source s : S;
            arbiter : S {
                rule set rs { on t : A(x) { yield A(x); } }
            }
            monitor { }
        "#;
        let err = compile_source(source, 64).unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("E011"));
        assert!(message.contains("unknown event source 't'"));
    }

    #[test]
    fn test_empty_stream_type_rejected() {
        let source = r#"
            stream type S { }
            event source s : S;
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor { }
        "#;
        let err = compile_source(source, 64).unwrap_err();
        assert!(format!("{}", err).contains("E020"));
    }

    #[test]
    fn test_capacity_warning_surfaces() {
        let source = r#"
            stream type S { A(x : int); B(y : int); }
            event source s : S buffer size 1;
            arbiter : S {
                rule set rs {
                    on s : A(x) B(y) { yield A(x); drop 2 from s; }
                }
            }
            monitor { }
        "#;
        let output = compile_source(source, 64).expect("warning is not fatal");
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("can never match"));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let source = r#"
            stream type S { A(while : int); }
            event source s : S;
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor { }
        "#;
        let err = compile_source(source, 64).unwrap_err();
        assert!(format!("{}", err).contains("E002"));
    }
}
