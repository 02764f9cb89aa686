//! Abstract Syntax Tree for VAMOS programs

use crate::span::Spanned;
use crate::types::FieldType;
use serde::{Deserialize, Serialize};

/// A complete VAMOS program: components, one arbiter, one monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub components: Vec<Spanned<Component>>,
    pub arbiter: Spanned<Arbiter>,
    pub monitor: Spanned<Monitor>,
}

/// Top-level component declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// `stream type T(shared...) { Ev(f: ty); ... }`
    StreamType(StreamTypeDecl),
    /// `stream processor P : In -> Out { on A(x) -> B(x); ... }`
    StreamProcessor(StreamProcessorDecl),
    /// `event source s : T ...;`
    EventSource(EventSourceDecl),
    /// `buffer group G : T order by ... includes a, b;`
    BufferGroup(BufferGroupDecl),
    /// `match fun f(x) = expr;`
    MatchFun(MatchFunDecl),
    /// `globals $$...$$`, `startup $$...$$`, `cleanup $$...$$`
    Raw(RawBlock),
}

/// A declared stream type: a tagged union of event shapes plus optional
/// shared arguments available in every event of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTypeDecl {
    pub name: String,
    pub shared_args: Vec<Field>,
    pub events: Vec<EventDecl>,
}

/// One event shape inside a stream type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub fields: Vec<Field>,
}

/// Field in an event or shared-args declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// A declarative rewrite from one stream type to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProcessorDecl {
    pub name: String,
    pub input: String,
    pub output: String,
    pub rules: Vec<RewriteRule>,
}

/// `on From(binders...) -> To(exprs...)` — events whose kind matches no
/// rule are dropped by the source's drainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from_event: String,
    pub binders: Vec<String>,
    pub to_event: String,
    pub args: Vec<Expr>,
}

/// An event source instance (or array of instances).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceDecl {
    pub name: String,
    /// `event source s[N] : T` declares N instances `s_0 .. s_{N-1}`.
    pub count: Option<u32>,
    pub stream_type: String,
    pub processor: Option<String>,
    pub connection: Option<Connection>,
    /// Initializers for the stream type's shared args; in array
    /// declarations the identifier `index` names the instance index.
    pub with_args: Vec<Expr>,
    /// Per-source arbiter buffer capacity override.
    pub buffer_size: Option<usize>,
}

impl EventSourceDecl {
    /// Names of the concrete instances this declaration expands to.
    pub fn instance_names(&self) -> Vec<String> {
        match self.count {
            None => vec![self.name.clone()],
            Some(n) => (0..n).map(|i| format!("{}_{}", self.name, i)).collect(),
        }
    }
}

/// How the emitted program connects to the source's producer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub kind: String,
    pub arg: String,
}

/// A named set of sources with a total order over their head events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferGroupDecl {
    pub name: String,
    pub stream_type: String,
    pub order: OrderExpr,
    pub members: Vec<String>,
}

/// Order expression of a buffer group. Either a field ordering
/// (`order by ts asc`) or a full comparison over `left`/`right` heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderExpr {
    /// Compare the named field of both heads; `descending` flips it.
    Field { name: String, descending: bool },
    /// Arbitrary boolean comparison over `left.f` / `right.f`.
    Compare(Expr),
}

/// A named boolean helper usable in guards and order expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFunDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawKind {
    Globals,
    Startup,
    Cleanup,
}

/// Verbatim host-language code spliced into the emitted program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub kind: RawKind,
    pub code: String,
}

/// The arbiter: output stream type plus ordered rule sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arbiter {
    pub output_type: String,
    pub rule_sets: Vec<RuleSet>,
}

/// Named ordered list of match rules; first match wins within a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<MatchRule>,
}

/// Head patterns + guard + action, optionally prefixed by a chooser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    pub chooser: Option<Chooser>,
    pub patterns: Vec<HeadPattern>,
    pub guard: Option<Guard>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChooseOrder {
    First,
    Last,
}

/// `choose first k from G as a, b` — selects k streams from a buffer
/// group; aliases name the chosen streams inside the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chooser {
    pub order: ChooseOrder,
    pub count: u32,
    pub group: String,
    pub aliases: Vec<String>,
}

/// Expected head prefix of one participating stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadPattern {
    /// Source instance name, or a chooser alias.
    pub source: String,
    pub events: Vec<EventPattern>,
}

/// One event kind with bound field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPattern {
    pub event: String,
    pub binders: Vec<String>,
}

/// Rule guard: a DSL expression or verbatim host code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Guard {
    Expr(Expr),
    Raw(String),
}

/// Arbiter rule action statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Produce one arbiter-output event.
    Yield { event: String, args: Vec<Expr> },
    /// Drop `count` events from the head of a participating buffer.
    Drop { count: u32, source: String },
}

/// The monitor: buffer size plus rules over the arbiter's output type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub buffer_size: Option<usize>,
    pub rules: Vec<MonitorRule>,
}

/// Pattern + guard + verbatim action over one arbiter-output event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRule {
    pub pattern: EventPattern,
    pub guard: Option<Guard>,
    pub action: String,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    Member {
        expr: Box<Expr>,
        member: String,
    },

    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Call of a declared `match fun`.
    Call {
        func: String,
        args: Vec<Expr>,
    },
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    /// The C spelling of the operator in emitted code.
    pub fn c_str(&self) -> &'static str {
        match self {
            BinOp::And => "&&",
            BinOp::Or => "||",
            other => other.as_str(),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }

    pub fn c_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl MatchRule {
    /// Source names this rule peeks (pattern sources and chooser aliases
    /// resolve to the same namespace at evaluation time).
    pub fn participating_sources(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.source.as_str()).collect()
    }

    /// The single `yield` action, if the rule is well-formed.
    pub fn yield_action(&self) -> Option<(&str, &[Expr])> {
        self.actions.iter().find_map(|a| match a {
            Action::Yield { event, args } => Some((event.as_str(), args.as_slice())),
            Action::Drop { .. } => None,
        })
    }
}
