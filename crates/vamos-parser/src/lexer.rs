//! Lexer for VAMOS source using Logos

use logos::Logos;
use std::fmt;

/// Token type for VAMOS
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token {
    // === Keywords ===
    #[token("stream")]
    Stream,
    #[token("type")]
    Type,
    #[token("processor")]
    Processor,
    #[token("event")]
    Event,
    #[token("source")]
    Source,
    #[token("buffer")]
    Buffer,
    #[token("group")]
    Group,
    #[token("match")]
    Match,
    #[token("fun")]
    Fun,
    #[token("arbiter")]
    Arbiter,
    #[token("monitor")]
    Monitor,

    #[token("on")]
    On,
    #[token("where")]
    Where,
    #[token("yield")]
    Yield,
    #[token("drop")]
    Drop,
    #[token("from")]
    From,
    #[token("choose")]
    Choose,
    #[token("first")]
    First,
    #[token("last")]
    Last,
    #[token("order")]
    Order,
    #[token("by")]
    By,
    #[token("includes")]
    Includes,
    #[token("asc")]
    Asc,
    #[token("desc")]
    Desc,
    #[token("rule")]
    Rule,
    #[token("set")]
    Set,

    #[token("globals")]
    Globals,
    #[token("startup")]
    Startup,
    #[token("cleanup")]
    Cleanup,

    #[token("process")]
    Process,
    #[token("using")]
    Using,
    #[token("connect")]
    Connect,
    #[token("via")]
    Via,
    #[token("with")]
    With,
    #[token("size")]
    Size,

    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // Type keywords
    #[token("int")]
    IntType,
    #[token("long")]
    LongType,
    #[token("float")]
    FloatType,
    #[token("double")]
    DoubleType,
    #[token("bool")]
    BoolType,
    #[token("string")]
    StringType,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[token("=")]
    Eq,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,

    // === Literals ===
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    String(String),

    /// Verbatim host-language code between `$$` delimiters.
    #[regex(r"\$\$([^$]|\$[^$])*\$\$", |lex| {
        let s = lex.slice();
        Some(s[2..s.len()-2].to_string())
    })]
    CCode(String),

    /// Build-time placeholder that survived substitution.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*", |lex| Some(lex.slice()[1..].to_string()))]
    Placeholder(String),

    // === Identifier ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Some(lex.slice().to_string()))]
    Ident(String),

    // === Special ===
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Stream => write!(f, "stream"),
            Token::Type => write!(f, "type"),
            Token::Processor => write!(f, "processor"),
            Token::Event => write!(f, "event"),
            Token::Source => write!(f, "source"),
            Token::Buffer => write!(f, "buffer"),
            Token::Group => write!(f, "group"),
            Token::Match => write!(f, "match"),
            Token::Fun => write!(f, "fun"),
            Token::Arbiter => write!(f, "arbiter"),
            Token::Monitor => write!(f, "monitor"),
            Token::On => write!(f, "on"),
            Token::Where => write!(f, "where"),
            Token::Yield => write!(f, "yield"),
            Token::Drop => write!(f, "drop"),
            Token::From => write!(f, "from"),
            Token::Choose => write!(f, "choose"),
            Token::First => write!(f, "first"),
            Token::Last => write!(f, "last"),
            Token::Order => write!(f, "order"),
            Token::By => write!(f, "by"),
            Token::Includes => write!(f, "includes"),
            Token::Asc => write!(f, "asc"),
            Token::Desc => write!(f, "desc"),
            Token::Rule => write!(f, "rule"),
            Token::Set => write!(f, "set"),
            Token::Globals => write!(f, "globals"),
            Token::Startup => write!(f, "startup"),
            Token::Cleanup => write!(f, "cleanup"),
            Token::Process => write!(f, "process"),
            Token::Using => write!(f, "using"),
            Token::Connect => write!(f, "connect"),
            Token::Via => write!(f, "via"),
            Token::With => write!(f, "with"),
            Token::Size => write!(f, "size"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::IntType => write!(f, "int"),
            Token::LongType => write!(f, "long"),
            Token::FloatType => write!(f, "float"),
            Token::DoubleType => write!(f, "double"),
            Token::BoolType => write!(f, "bool"),
            Token::StringType => write!(f, "string"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Eq => write!(f, "="),
            Token::Arrow => write!(f, "->"),
            Token::Dot => write!(f, "."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semi => write!(f, ";"),
            Token::Float(n) => write!(f, "{}", n),
            Token::Integer(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::CCode(_) => write!(f, "$$...$$"),
            Token::Placeholder(name) => write!(f, "@{}", name),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Spanned token with position information
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Lexer wrapper that produces spanned tokens
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<SpannedToken>,
    eof_emitted: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            peeked: None,
            eof_emitted: false,
        }
    }

    pub fn peek(&mut self) -> Option<&SpannedToken> {
        if self.peeked.is_none() {
            self.peeked = self.next_token();
        }
        self.peeked.as_ref()
    }

    fn next_token(&mut self) -> Option<SpannedToken> {
        match self.inner.next() {
            Some(Ok(token)) => {
                let span = self.inner.span();
                Some(SpannedToken {
                    token,
                    start: span.start,
                    end: span.end,
                })
            }
            Some(Err(_)) => {
                let span = self.inner.span();
                Some(SpannedToken {
                    token: Token::Ident(self.inner.slice().to_string()),
                    start: span.start,
                    end: span.end,
                })
            }
            None if !self.eof_emitted => {
                self.eof_emitted = true;
                let pos = self.inner.span().end;
                Some(SpannedToken {
                    token: Token::Eof,
                    start: pos,
                    end: pos,
                })
            }
            None => None,
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        self.next_token()
    }
}

/// Tokenize a source string into a vector of spanned tokens
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        let tokens: Vec<_> = tokenize("stream type event source arbiter monitor")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Stream,
                Token::Type,
                Token::Event,
                Token::Source,
                Token::Arbiter,
                Token::Monitor,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_rule_keywords() {
        let tokens: Vec<_> = tokenize("on where yield drop choose first last from")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::On,
                Token::Where,
                Token::Yield,
                Token::Drop,
                Token::Choose,
                Token::First,
                Token::Last,
                Token::From,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens: Vec<_> = tokenize("42 3.14 \"hello\" true false")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Integer(42),
                Token::Float(3.14),
                Token::String("hello".to_string()),
                Token::True,
                Token::False,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_ccode_block() {
        let tokens: Vec<_> = tokenize("where $$ x > 0 && y < 10 $$")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(tokens[0], Token::Where);
        assert!(matches!(&tokens[1], Token::CCode(code) if code.trim() == "x > 0 && y < 10"));
    }

    #[test]
    fn test_ccode_keeps_single_dollars() {
        let tokens: Vec<_> = tokenize("$$ price in US$ $$")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert!(matches!(&tokens[0], Token::CCode(code) if code.contains("US$")));
    }

    #[test]
    fn test_placeholder() {
        let tokens: Vec<_> = tokenize("buffer size @BUFSIZE")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Buffer,
                Token::Size,
                Token::Placeholder("BUFSIZE".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_event_decl() {
        let tokens: Vec<_> = tokenize("Prime(n : int, p : int);")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Prime".to_string()),
                Token::LParen,
                Token::Ident("n".to_string()),
                Token::Colon,
                Token::IntType,
                Token::Comma,
                Token::Ident("p".to_string()),
                Token::Colon,
                Token::IntType,
                Token::RParen,
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens: Vec<_> = tokenize("# line\nstream /* inline */ type // trailing\n")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(tokens, vec![Token::Stream, Token::Type, Token::Eof]);
    }

    #[test]
    fn test_operators() {
        let tokens: Vec<_> = tokenize("-> == != <= >= + - * / %")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Arrow,
                Token::EqEq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_peek() {
        let mut lexer = Lexer::new("a b c");
        assert_eq!(lexer.peek().unwrap().token, Token::Ident("a".to_string()));
        assert_eq!(lexer.peek().unwrap().token, Token::Ident("a".to_string()));
        assert_eq!(lexer.next().unwrap().token, Token::Ident("a".to_string()));
        assert_eq!(lexer.peek().unwrap().token, Token::Ident("b".to_string()));
    }

    #[test]
    fn test_lexer_empty() {
        let tokens: Vec<_> = tokenize("").into_iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec![Token::Eof]);
    }

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token::Stream), "stream");
        assert_eq!(format!("{}", Token::Arrow), "->");
        assert_eq!(format!("{}", Token::Integer(42)), "42");
        assert_eq!(format!("{}", Token::Placeholder("BUFSIZE".into())), "@BUFSIZE");
        assert_eq!(format!("{}", Token::Ident("foo".to_string())), "foo");
        assert_eq!(format!("{}", Token::Eof), "EOF");
    }

    #[test]
    fn test_spanned_token_positions() {
        let tokens: Vec<_> = tokenize("ab cd").into_iter().collect();
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 2);
        assert_eq!(tokens[1].start, 3);
        assert_eq!(tokens[1].end, 5);
    }
}
