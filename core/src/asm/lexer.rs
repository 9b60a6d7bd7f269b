use core::fmt;
use core::ops::Range;

use logos::Logos;

use super::error::{AsmError, AsmErrorKind};

pub type Span = Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("FUNC")]
    Func,

    /// `R <count>`: register count of the enclosing function.
    #[token("R", priority = 3)]
    Registers,

    #[token("PARAM")]
    Param,

    /// `K <literal>`: appends to the constant pool.
    #[token("K", priority = 3)]
    Const,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token("\n")]
    Newline,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Strict Double Quote String (must end with ")
    #[regex(r#""(?:[^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Func => write!(f, "FUNC"),
            Token::Registers => write!(f, "R"),
            Token::Param => write!(f, "PARAM"),
            Token::Const => write!(f, "K"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Newline => write!(f, "newline"),
            Token::Int(i) => write!(f, "int {i}"),
            Token::Float(x) => write!(f, "float {x:?}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Ident(name) => write!(f, "ident {name}"),
        }
    }
}

/// Strips the quotes and resolves `\n`, `\t`, `\\` and `\"`.
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

/// Splits assembly source into tokens with their byte spans.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, AsmError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(AsmError::new(
                    AsmErrorKind::InvalidToken(lexer.slice().to_string()),
                    lexer.span(),
                ));
            }
        }
    }
    Ok(tokens)
}
