//! Lowering of VAMOS expressions to C expression text.
//!
//! Binders lower to the C locals the rule prologue declared under the
//! same names, `match fun` calls are inlined by substitution, and head
//! member access (order expressions only) goes through the per-type
//! field accessors emitted alongside the buffer groups.

use rustc_hash::FxHashMap;
use vamos_core::ast::{BinOp, Expr, UnaryOp};
use vamos_core::env::Environment;

/// Context for one expression lowering.
pub struct ExprCtx<'a> {
    pub env: &'a Environment,
    /// Name -> C text substitutions (match fun inlining, `index`).
    pub substitutions: FxHashMap<String, String>,
    /// When lowering an order expression: (stream type, C variable
    /// holding the `left` head, C variable holding the `right` head).
    pub head_access: Option<(&'a str, &'a str, &'a str)>,
}

impl<'a> ExprCtx<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self {
            env,
            substitutions: FxHashMap::default(),
            head_access: None,
        }
    }

    pub fn with_substitution(mut self, name: &str, text: &str) -> Self {
        self.substitutions.insert(name.to_string(), text.to_string());
        self
    }
}

/// Lower one expression to C text.
pub fn lower_expr(expr: &Expr, ctx: &ExprCtx) -> String {
    match expr {
        Expr::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Expr::Int(n) => format!("{}", n),
        Expr::Float(f) => {
            let text = format!("{}", f);
            if text.contains('.') || text.contains('e') {
                text
            } else {
                format!("{}.0", text)
            }
        }
        Expr::Str(s) => format!("\"{}\"", escape_c(s)),
        Expr::Ident(name) => ctx
            .substitutions
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.clone()),
        Expr::Member { expr, member } => match (expr.as_ref(), ctx.head_access) {
            (Expr::Ident(base), Some((stream_type, left_var, right_var)))
                if base == "left" || base == "right" =>
            {
                let var = if base == "left" { left_var } else { right_var };
                format!("STREAM_{}_head_{}({})", stream_type, member, var)
            }
            _ => {
                // Validation rejects member access everywhere else.
                format!("{}.{}", lower_expr(expr, ctx), member)
            }
        },
        Expr::Unary { op, expr } => match op {
            UnaryOp::Neg => format!("(-{})", lower_expr(expr, ctx)),
            UnaryOp::Not => format!("(!{})", lower_expr(expr, ctx)),
        },
        Expr::Binary { op, left, right } => format!(
            "({} {} {})",
            lower_expr(left, ctx),
            lower_binop(*op),
            lower_expr(right, ctx)
        ),
        Expr::Call { func, args } => inline_match_fun(func, args, ctx),
    }
}

fn lower_binop(op: BinOp) -> &'static str {
    op.c_str()
}

/// Inline a `match fun` body with its arguments substituted.
fn inline_match_fun(func: &str, args: &[Expr], ctx: &ExprCtx) -> String {
    let Some(decl) = ctx.env.index.match_funs.iter().find(|f| f.name == func) else {
        // Unknown funs are a validation error; emit a call so the C
        // compiler rejects the program instead of silently dropping it.
        let args: Vec<String> = args.iter().map(|a| lower_expr(a, ctx)).collect();
        return format!("{}({})", func, args.join(", "));
    };

    let mut inner = ExprCtx {
        env: ctx.env,
        substitutions: FxHashMap::default(),
        head_access: ctx.head_access,
    };
    for (param, arg) in decl.params.iter().zip(args.iter()) {
        inner
            .substitutions
            .insert(param.clone(), lower_expr(arg, ctx));
    }
    format!("({})", lower_expr(&decl.body, &inner))
}

fn escape_c(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
