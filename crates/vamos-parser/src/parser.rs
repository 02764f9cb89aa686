//! Recursive descent parser for VAMOS
//!
//! Hand-written recursive descent over the logos token stream; the
//! grammar is small enough that a generator would cost more than it
//! saves, and error positions stay precise.

use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, SpannedToken, Token};
use vamos_core::ast::*;
use vamos_core::span::{Span, Spanned};
use vamos_core::types::FieldType;

/// Parse a VAMOS source string into a Program AST
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(source);
    parser.parse_program()
}

/// Parser state
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: SpannedToken,
    previous: SpannedToken,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next().unwrap_or(SpannedToken {
            token: Token::Eof,
            start: 0,
            end: 0,
        });
        Self {
            lexer,
            current: current.clone(),
            previous: current,
        }
    }

    fn span(&self) -> Span {
        Span::new(self.current.start, self.current.end)
    }

    fn prev_span(&self) -> Span {
        Span::new(self.previous.start, self.previous.end)
    }

    fn advance(&mut self) {
        self.previous = self.current.clone();
        self.current = self.lexer.next().unwrap_or(SpannedToken {
            token: Token::Eof,
            start: self.previous.end,
            end: self.previous.end,
        });
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.current.token) == std::mem::discriminant(token)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.token, Token::Eof)
    }

    fn consume(&mut self, expected: &Token, msg: &str) -> ParseResult<SpannedToken> {
        if self.check(expected) {
            let tok = self.current.clone();
            self.advance();
            Ok(tok)
        } else {
            Err(self.unexpected(msg))
        }
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if let Token::Placeholder(name) = &self.current.token {
            return ParseError::UnsubstitutedPlaceholder {
                position: self.current.start,
                name: name.clone(),
            };
        }
        ParseError::UnexpectedToken {
            position: self.current.start,
            expected: expected.to_string(),
            found: format!("{}", self.current.token),
        }
    }

    // ========================================================================
    // Program
    // ========================================================================

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut components = Vec::new();
        while !self.check(&Token::Arbiter) {
            if self.is_at_end() {
                return Err(self.unexpected("component declaration or arbiter"));
            }
            components.push(self.parse_component()?);
        }

        let arbiter_start = self.span();
        let arbiter = self.parse_arbiter()?;
        let arbiter_span = arbiter_start.merge(self.prev_span());

        let monitor_start = self.span();
        let monitor = self.parse_monitor()?;
        let monitor_span = monitor_start.merge(self.prev_span());

        if !self.is_at_end() {
            return Err(self.unexpected("end of input"));
        }

        Ok(Program {
            components,
            arbiter: Spanned::new(arbiter, arbiter_span),
            monitor: Spanned::new(monitor, monitor_span),
        })
    }

    // ========================================================================
    // Components
    // ========================================================================

    fn parse_component(&mut self) -> ParseResult<Spanned<Component>> {
        let start = self.span();
        let component = match &self.current.token {
            Token::Stream => {
                self.advance();
                if self.match_token(&Token::Type) {
                    Component::StreamType(self.parse_stream_type()?)
                } else if self.match_token(&Token::Processor) {
                    Component::StreamProcessor(self.parse_stream_processor()?)
                } else {
                    return Err(self.unexpected("'type' or 'processor' after 'stream'"));
                }
            }
            Token::Event => {
                self.advance();
                self.consume(&Token::Source, "'source' after 'event'")?;
                Component::EventSource(self.parse_event_source()?)
            }
            Token::Buffer => {
                self.advance();
                self.consume(&Token::Group, "'group' after 'buffer'")?;
                Component::BufferGroup(self.parse_buffer_group()?)
            }
            Token::Match => {
                self.advance();
                self.consume(&Token::Fun, "'fun' after 'match'")?;
                Component::MatchFun(self.parse_match_fun()?)
            }
            Token::Globals => {
                self.advance();
                Component::Raw(self.parse_raw_block(RawKind::Globals)?)
            }
            Token::Startup => {
                self.advance();
                Component::Raw(self.parse_raw_block(RawKind::Startup)?)
            }
            Token::Cleanup => {
                self.advance();
                Component::Raw(self.parse_raw_block(RawKind::Cleanup)?)
            }
            _ => return Err(self.unexpected("component declaration")),
        };
        let end = self.prev_span();
        Ok(Spanned::new(component, start.merge(end)))
    }

    fn parse_stream_type(&mut self) -> ParseResult<StreamTypeDecl> {
        let name = self.parse_identifier()?;

        let shared_args = if self.match_token(&Token::LParen) {
            let fields = self.parse_field_list()?;
            self.consume(&Token::RParen, ")")?;
            fields
        } else {
            Vec::new()
        };

        self.consume(&Token::LBrace, "{")?;
        let mut events = Vec::new();
        while !self.check(&Token::RBrace) {
            events.push(self.parse_event_decl()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(StreamTypeDecl {
            name,
            shared_args,
            events,
        })
    }

    fn parse_event_decl(&mut self) -> ParseResult<EventDecl> {
        let name = self.parse_identifier()?;
        self.consume(&Token::LParen, "(")?;
        let fields = if !self.check(&Token::RParen) {
            self.parse_field_list()?
        } else {
            Vec::new()
        };
        self.consume(&Token::RParen, ")")?;
        self.consume(&Token::Semi, ";")?;
        Ok(EventDecl { name, fields })
    }

    fn parse_field_list(&mut self) -> ParseResult<Vec<Field>> {
        let mut fields = vec![self.parse_field()?];
        while self.match_token(&Token::Comma) {
            fields.push(self.parse_field()?);
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> ParseResult<Field> {
        let name = self.parse_identifier()?;
        self.consume(&Token::Colon, ":")?;
        let ty = self.parse_type()?;
        Ok(Field { name, ty })
    }

    fn parse_type(&mut self) -> ParseResult<FieldType> {
        let ty = match &self.current.token {
            Token::IntType => FieldType::Int,
            Token::LongType => FieldType::Long,
            Token::FloatType => FieldType::Float,
            Token::DoubleType => FieldType::Double,
            Token::BoolType => FieldType::Bool,
            Token::StringType => FieldType::Str,
            _ => return Err(self.unexpected("field type")),
        };
        self.advance();
        Ok(ty)
    }

    fn parse_stream_processor(&mut self) -> ParseResult<StreamProcessorDecl> {
        let name = self.parse_identifier()?;
        self.consume(&Token::Colon, ":")?;
        let input = self.parse_identifier()?;
        self.consume(&Token::Arrow, "->")?;
        let output = self.parse_identifier()?;

        self.consume(&Token::LBrace, "{")?;
        let mut rules = Vec::new();
        while !self.check(&Token::RBrace) {
            rules.push(self.parse_rewrite_rule()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(StreamProcessorDecl {
            name,
            input,
            output,
            rules,
        })
    }

    fn parse_rewrite_rule(&mut self) -> ParseResult<RewriteRule> {
        self.consume(&Token::On, "on")?;
        let from_event = self.parse_identifier()?;
        self.consume(&Token::LParen, "(")?;
        let binders = if !self.check(&Token::RParen) {
            self.parse_identifier_list()?
        } else {
            Vec::new()
        };
        self.consume(&Token::RParen, ")")?;
        self.consume(&Token::Arrow, "->")?;
        let to_event = self.parse_identifier()?;
        self.consume(&Token::LParen, "(")?;
        let args = if !self.check(&Token::RParen) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        self.consume(&Token::RParen, ")")?;
        self.consume(&Token::Semi, ";")?;

        Ok(RewriteRule {
            from_event,
            binders,
            to_event,
            args,
        })
    }

    fn parse_event_source(&mut self) -> ParseResult<EventSourceDecl> {
        let name = self.parse_identifier()?;

        let count = if self.match_token(&Token::LBracket) {
            let n = self.parse_integer()?;
            self.consume(&Token::RBracket, "]")?;
            Some(n as u32)
        } else {
            None
        };

        self.consume(&Token::Colon, ":")?;
        let stream_type = self.parse_identifier()?;

        let with_args = if self.match_token(&Token::With) {
            self.consume(&Token::LParen, "(")?;
            let args = if !self.check(&Token::RParen) {
                self.parse_expr_list()?
            } else {
                Vec::new()
            };
            self.consume(&Token::RParen, ")")?;
            args
        } else {
            Vec::new()
        };

        let processor = if self.match_token(&Token::Process) {
            self.consume(&Token::Using, "'using' after 'process'")?;
            Some(self.parse_identifier()?)
        } else {
            None
        };

        let connection = if self.match_token(&Token::Connect) {
            self.consume(&Token::Via, "'via' after 'connect'")?;
            let kind = self.parse_identifier()?;
            self.consume(&Token::LParen, "(")?;
            let arg = match &self.current.token {
                Token::String(s) => {
                    let s = s.clone();
                    self.advance();
                    s
                }
                _ => return Err(self.unexpected("connection argument string")),
            };
            self.consume(&Token::RParen, ")")?;
            Some(Connection { kind, arg })
        } else {
            None
        };

        let buffer_size = if self.match_token(&Token::Buffer) {
            self.consume(&Token::Size, "'size' after 'buffer'")?;
            Some(self.parse_integer()? as usize)
        } else {
            None
        };

        self.consume(&Token::Semi, ";")?;

        Ok(EventSourceDecl {
            name,
            count,
            stream_type,
            processor,
            connection,
            with_args,
            buffer_size,
        })
    }

    fn parse_buffer_group(&mut self) -> ParseResult<BufferGroupDecl> {
        let name = self.parse_identifier()?;
        self.consume(&Token::Colon, ":")?;
        let stream_type = self.parse_identifier()?;
        self.consume(&Token::Order, "order")?;
        self.consume(&Token::By, "by")?;
        let order = self.parse_order_expr()?;
        self.consume(&Token::Includes, "includes")?;
        let members = self.parse_identifier_list()?;
        self.consume(&Token::Semi, ";")?;

        Ok(BufferGroupDecl {
            name,
            stream_type,
            order,
            members,
        })
    }

    /// `order by ts asc` orders by one head field; anything more complex
    /// is a full comparison over `left` / `right`.
    fn parse_order_expr(&mut self) -> ParseResult<OrderExpr> {
        let expr = self.parse_expr()?;
        match expr {
            Expr::Ident(name) => {
                let descending = if self.match_token(&Token::Desc) {
                    true
                } else {
                    self.match_token(&Token::Asc);
                    false
                };
                Ok(OrderExpr::Field { name, descending })
            }
            other => Ok(OrderExpr::Compare(other)),
        }
    }

    fn parse_match_fun(&mut self) -> ParseResult<MatchFunDecl> {
        let name = self.parse_identifier()?;
        self.consume(&Token::LParen, "(")?;
        let params = if !self.check(&Token::RParen) {
            self.parse_identifier_list()?
        } else {
            Vec::new()
        };
        self.consume(&Token::RParen, ")")?;
        self.consume(&Token::Eq, "=")?;
        let body = self.parse_expr()?;
        self.consume(&Token::Semi, ";")?;

        Ok(MatchFunDecl { name, params, body })
    }

    fn parse_raw_block(&mut self, kind: RawKind) -> ParseResult<RawBlock> {
        let code = self.parse_ccode()?;
        Ok(RawBlock { kind, code })
    }

    fn parse_ccode(&mut self) -> ParseResult<String> {
        match &self.current.token {
            Token::CCode(code) => {
                let code = code.clone();
                self.advance();
                Ok(code)
            }
            _ => Err(self.unexpected("$$ code block $$")),
        }
    }

    // ========================================================================
    // Arbiter
    // ========================================================================

    fn parse_arbiter(&mut self) -> ParseResult<Arbiter> {
        self.consume(&Token::Arbiter, "arbiter")?;
        self.consume(&Token::Colon, ":")?;
        let output_type = self.parse_identifier()?;
        self.consume(&Token::LBrace, "{")?;

        let mut rule_sets = Vec::new();
        while !self.check(&Token::RBrace) {
            rule_sets.push(self.parse_rule_set()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(Arbiter {
            output_type,
            rule_sets,
        })
    }

    fn parse_rule_set(&mut self) -> ParseResult<RuleSet> {
        self.consume(&Token::Rule, "rule")?;
        self.consume(&Token::Set, "'set' after 'rule'")?;
        let name = self.parse_identifier()?;
        self.consume(&Token::LBrace, "{")?;

        let mut rules = Vec::new();
        while !self.check(&Token::RBrace) {
            rules.push(self.parse_match_rule()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(RuleSet { name, rules })
    }

    fn parse_match_rule(&mut self) -> ParseResult<MatchRule> {
        let chooser = if self.check(&Token::Choose) {
            Some(self.parse_chooser()?)
        } else {
            None
        };

        self.consume(&Token::On, "on")?;
        let mut patterns = vec![self.parse_head_pattern()?];
        while self.match_token(&Token::Comma) {
            patterns.push(self.parse_head_pattern()?);
        }

        let guard = if self.match_token(&Token::Where) {
            Some(self.parse_guard()?)
        } else {
            None
        };

        self.consume(&Token::LBrace, "{")?;
        let mut actions = Vec::new();
        while !self.check(&Token::RBrace) {
            actions.push(self.parse_action()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(MatchRule {
            chooser,
            patterns,
            guard,
            actions,
        })
    }

    fn parse_chooser(&mut self) -> ParseResult<Chooser> {
        self.consume(&Token::Choose, "choose")?;
        let order = if self.match_token(&Token::First) {
            ChooseOrder::First
        } else if self.match_token(&Token::Last) {
            ChooseOrder::Last
        } else {
            return Err(self.unexpected("'first' or 'last' after 'choose'"));
        };
        let count = self.parse_integer()? as u32;
        self.consume(&Token::From, "from")?;
        let group = self.parse_identifier()?;

        let aliases = if self.match_token(&Token::With) {
            // `choose ... with a, b` names the chosen streams
            self.parse_identifier_list()?
        } else {
            Vec::new()
        };

        Ok(Chooser {
            order,
            count,
            group,
            aliases,
        })
    }

    fn parse_head_pattern(&mut self) -> ParseResult<HeadPattern> {
        let source = self.parse_identifier()?;
        self.consume(&Token::Colon, ":")?;
        let mut events = vec![self.parse_event_pattern()?];
        // juxtaposed patterns extend the expected head prefix
        while matches!(&self.current.token, Token::Ident(_)) {
            events.push(self.parse_event_pattern()?);
        }
        Ok(HeadPattern { source, events })
    }

    fn parse_event_pattern(&mut self) -> ParseResult<EventPattern> {
        let event = self.parse_identifier()?;
        self.consume(&Token::LParen, "(")?;
        let binders = if !self.check(&Token::RParen) {
            self.parse_identifier_list()?
        } else {
            Vec::new()
        };
        self.consume(&Token::RParen, ")")?;
        Ok(EventPattern { event, binders })
    }

    fn parse_guard(&mut self) -> ParseResult<Guard> {
        if let Token::CCode(code) = &self.current.token {
            let code = code.clone();
            self.advance();
            return Ok(Guard::Raw(code));
        }
        Ok(Guard::Expr(self.parse_expr()?))
    }

    fn parse_action(&mut self) -> ParseResult<Action> {
        if self.match_token(&Token::Yield) {
            let event = self.parse_identifier()?;
            self.consume(&Token::LParen, "(")?;
            let args = if !self.check(&Token::RParen) {
                self.parse_expr_list()?
            } else {
                Vec::new()
            };
            self.consume(&Token::RParen, ")")?;
            self.consume(&Token::Semi, ";")?;
            return Ok(Action::Yield { event, args });
        }
        if self.match_token(&Token::Drop) {
            let count = self.parse_integer()? as u32;
            self.consume(&Token::From, "from")?;
            let source = self.parse_identifier()?;
            self.consume(&Token::Semi, ";")?;
            return Ok(Action::Drop { count, source });
        }
        Err(self.unexpected("'yield' or 'drop'"))
    }

    // ========================================================================
    // Monitor
    // ========================================================================

    fn parse_monitor(&mut self) -> ParseResult<Monitor> {
        self.consume(&Token::Monitor, "monitor")?;

        let buffer_size = if self.match_token(&Token::LParen) {
            self.consume(&Token::Buffer, "'buffer' in monitor head")?;
            self.consume(&Token::Size, "'size' after 'buffer'")?;
            let n = self.parse_integer()? as usize;
            self.consume(&Token::RParen, ")")?;
            Some(n)
        } else {
            None
        };

        self.consume(&Token::LBrace, "{")?;
        let mut rules = Vec::new();
        while !self.check(&Token::RBrace) {
            rules.push(self.parse_monitor_rule()?);
        }
        self.consume(&Token::RBrace, "}")?;

        Ok(Monitor { buffer_size, rules })
    }

    fn parse_monitor_rule(&mut self) -> ParseResult<MonitorRule> {
        self.consume(&Token::On, "on")?;
        let pattern = self.parse_event_pattern()?;
        let guard = if self.match_token(&Token::Where) {
            Some(self.parse_guard()?)
        } else {
            None
        };
        let action = self.parse_ccode()?;
        Ok(MonitorRule {
            pattern,
            guard,
            action,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.match_token(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.match_token(&Token::And) {
            let right = self.parse_not_expr()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> ParseResult<Expr> {
        if self.match_token(&Token::Not) {
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> ParseResult<Expr> {
        let left = self.parse_additive_expr()?;

        let op = match &self.current.token {
            Token::EqEq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::NotEq),
            Token::Lt => Some(BinOp::Lt),
            Token::Le => Some(BinOp::Le),
            Token::Gt => Some(BinOp::Gt),
            Token::Ge => Some(BinOp::Ge),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive_expr()?;
            Ok(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    fn parse_additive_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match &self.current.token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match &self.current.token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> ParseResult<Expr> {
        if self.match_token(&Token::Minus) {
            let expr = self.parse_unary_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_expr()?;

        loop {
            if self.match_token(&Token::Dot) {
                let member = self.parse_identifier()?;
                expr = Expr::Member {
                    expr: Box::new(expr),
                    member,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        match &self.current.token {
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Integer(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Int(n))
            }
            Token::Float(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Float(n))
            }
            Token::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                if self.check(&Token::LParen) {
                    self.advance();
                    let args = if !self.check(&Token::RParen) {
                        self.parse_expr_list()?
                    } else {
                        Vec::new()
                    };
                    self.consume(&Token::RParen, ")")?;
                    return Ok(Expr::Call { func: name, args });
                }
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.consume(&Token::RParen, ")")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.match_token(&Token::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_identifier_list(&mut self) -> ParseResult<Vec<String>> {
        let mut names = vec![self.parse_identifier()?];
        while self.match_token(&Token::Comma) {
            names.push(self.parse_identifier()?);
        }
        Ok(names)
    }

    fn parse_identifier(&mut self) -> ParseResult<String> {
        match &self.current.token {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_integer(&mut self) -> ParseResult<i64> {
        match &self.current.token {
            Token::Integer(n) => {
                let n = *n;
                self.advance();
                if n < 0 {
                    return Err(ParseError::InvalidInteger(n.to_string()));
                }
                Ok(n)
            }
            _ => Err(self.unexpected("integer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        stream type S { A(x : int); }
        event source s : S;
        arbiter : S {
            rule set rs {
                on s : A(x) where x > 0 {
                    yield A(x);
                    drop 1 from s;
                }
            }
        }
        monitor {
            on A(x) $$ printf("%d\n", x); $$
        }
    "#;

    #[test]
    fn test_parse_minimal_program() {
        let program = parse(MINIMAL).unwrap();
        assert_eq!(program.components.len(), 2);
        assert_eq!(program.arbiter.node.rule_sets.len(), 1);
        assert_eq!(program.monitor.node.rules.len(), 1);
    }

    #[test]
    fn test_parse_stream_type_with_shared_args() {
        let program = parse(
            r#"
            stream type S(tid : long) { A(x : int); }
            event source s : S with (0);
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[0].node {
            Component::StreamType(decl) => {
                assert_eq!(decl.shared_args.len(), 1);
                assert_eq!(decl.shared_args[0].name, "tid");
            }
            other => panic!("expected stream type, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_source_array() {
        let program = parse(
            r#"
            stream type S { A(x : int); }
            event source s[4] : S buffer size 8;
            arbiter : S { rule set rs { on s_0 : A(x) { yield A(x); } } }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[1].node {
            Component::EventSource(decl) => {
                assert_eq!(decl.count, Some(4));
                assert_eq!(decl.buffer_size, Some(8));
                assert_eq!(decl.instance_names(), vec!["s_0", "s_1", "s_2", "s_3"]);
            }
            other => panic!("expected event source, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_processor() {
        let program = parse(
            r#"
            stream type Raws { Raw(k : int, v : int); }
            stream type Tags { Tagged(v : int); }
            stream processor TagP : Raws -> Tags {
                on Raw(k, v) -> Tagged(v);
            }
            event source s : Raws process using TagP;
            arbiter : Tags { rule set rs { on s : Tagged(v) { yield Tagged(v); } } }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[2].node {
            Component::StreamProcessor(decl) => {
                assert_eq!(decl.input, "Raws");
                assert_eq!(decl.output, "Tags");
                assert_eq!(decl.rules.len(), 1);
                assert_eq!(decl.rules[0].binders, vec!["k", "v"]);
            }
            other => panic!("expected stream processor, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_buffer_group_field_order() {
        let program = parse(
            r#"
            stream type S { T(ts : long, v : int); }
            event source a : S;
            event source b : S;
            buffer group G : S order by ts asc includes a, b;
            arbiter : S {
                rule set rs {
                    choose first 1 from G with f
                    on f : T(ts, v) { yield T(ts, v); drop 1 from f; }
                }
            }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[3].node {
            Component::BufferGroup(decl) => {
                assert_eq!(decl.members, vec!["a", "b"]);
                assert_eq!(
                    decl.order,
                    OrderExpr::Field {
                        name: "ts".to_string(),
                        descending: false
                    }
                );
            }
            other => panic!("expected buffer group, got {:?}", other),
        }
        let rule = &program.arbiter.node.rule_sets[0].rules[0];
        let chooser = rule.chooser.as_ref().unwrap();
        assert_eq!(chooser.order, ChooseOrder::First);
        assert_eq!(chooser.count, 1);
        assert_eq!(chooser.aliases, vec!["f"]);
    }

    #[test]
    fn test_parse_buffer_group_compare_order() {
        let program = parse(
            r#"
            stream type S { T(ts : long); }
            event source a : S;
            event source b : S;
            buffer group G : S order by left.ts < right.ts includes a, b;
            arbiter : S { rule set rs { on a : T(ts) { yield T(ts); } } }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[3].node {
            Component::BufferGroup(decl) => {
                assert!(matches!(decl.order, OrderExpr::Compare(_)));
            }
            other => panic!("expected buffer group, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_match_fun() {
        let program = parse(
            r#"
            stream type S { A(x : int); }
            event source s : S;
            match fun positive(v) = v > 0;
            arbiter : S { rule set rs { on s : A(x) where positive(x) { yield A(x); } } }
            monitor { }
        "#,
        )
        .unwrap();
        match &program.components[2].node {
            Component::MatchFun(decl) => {
                assert_eq!(decl.name, "positive");
                assert_eq!(decl.params, vec!["v"]);
            }
            other => panic!("expected match fun, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_raw_blocks() {
        let program = parse(
            r#"
            stream type S { A(x : int); }
            event source s : S;
            globals $$ int total = 0; $$
            startup $$ total = 1; $$
            cleanup $$ printf("%d\n", total); $$
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor { }
        "#,
        )
        .unwrap();
        let kinds: Vec<_> = program
            .components
            .iter()
            .filter_map(|c| match &c.node {
                Component::Raw(b) => Some(b.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![RawKind::Globals, RawKind::Startup, RawKind::Cleanup]);
    }

    #[test]
    fn test_parse_multi_event_head() {
        let program = parse(
            r#"
            stream type S { A(x : int); B(y : int); }
            event source s : S;
            arbiter : S {
                rule set rs {
                    on s : A(x) B(y) where x == y { yield A(x); drop 2 from s; }
                }
            }
            monitor { }
        "#,
        )
        .unwrap();
        let rule = &program.arbiter.node.rule_sets[0].rules[0];
        assert_eq!(rule.patterns[0].events.len(), 2);
    }

    #[test]
    fn test_parse_monitor_bufsize() {
        let program = parse(
            r#"
            stream type S { A(x : int); }
            event source s : S;
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor (buffer size 128) {
                on A(x) where x > 10 $$ printf("big\n"); $$
            }
        "#,
        )
        .unwrap();
        assert_eq!(program.monitor.node.buffer_size, Some(128));
        assert!(matches!(
            program.monitor.node.rules[0].guard,
            Some(Guard::Expr(_))
        ));
    }

    #[test]
    fn test_parse_raw_guard() {
        let program = parse(
            r#"
            stream type S { A(x : int); }
            event source s : S;
            arbiter : S {
                rule set rs { on s : A(x) where $$ x % 2 == 0 $$ { yield A(x); } }
            }
            monitor { }
        "#,
        )
        .unwrap();
        let rule = &program.arbiter.node.rule_sets[0].rules[0];
        assert!(matches!(rule.guard, Some(Guard::Raw(_))));
    }

    #[test]
    fn test_unsubstituted_placeholder_is_error() {
        let err = parse(
            r#"
            stream type S { A(x : int); }
            event source s : S buffer size @BUFSIZE;
            arbiter : S { rule set rs { on s : A(x) { yield A(x); } } }
            monitor { }
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnsubstitutedPlaceholder { .. }));
    }

    #[test]
    fn test_error_position_reported() {
        let err = parse("stream type { }").unwrap_err();
        match err {
            ParseError::UnexpectedToken { position, .. } => assert!(position > 0),
            other => panic!("expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_garbage_is_error() {
        let err = parse(&format!("{} extra", MINIMAL)).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
