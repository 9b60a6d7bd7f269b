//! Recursive-descent parser from tokens to [`Function`]s.
//!
//! ```text
//! program := NL* (func NL*)*
//! func    := FUNC ident '{' NL* (stmt (NL+ | &'}'))* '}'
//! stmt    := R int | PARAM int | K (int | float | string)
//!          | mnemonic (int (',' int)*)?
//! ```

use hashbrown::HashSet;

use super::error::{AsmError, AsmErrorKind};
use super::lexer::{Span, Token};
use crate::vm::{Constant, Function, Instruction, MAX_NAME_LEN, OpCode, OperandMode};

pub struct Parser<'t> {
    tokens: &'t [(Token, Span)],
    pos: usize,
    /// Span used for errors at end of input.
    eof: Span,
}

/// Function body collected while parsing.
#[derive(Default)]
struct Body {
    registers: u16,
    params: u16,
    constants: Vec<Constant>,
    instructions: Vec<Instruction>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [(Token, Span)], source_len: usize) -> Self {
        Parser {
            tokens,
            pos: 0,
            eof: source_len..source_len,
        }
    }

    pub fn program(mut self) -> Result<Vec<Function>, AsmError> {
        let mut functions = Vec::new();
        let mut names = HashSet::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => break,
                Some(Token::Func) => {
                    let (function, span) = self.function()?;
                    if !names.insert(function.name.clone()) {
                        return Err(AsmError::new(
                            AsmErrorKind::DuplicateFunction(function.name),
                            span,
                        ));
                    }
                    functions.push(function);
                }
                Some(_) => return Err(self.unexpected("FUNC")),
            }
        }
        Ok(functions)
    }

    fn function(&mut self) -> Result<(Function, Span), AsmError> {
        self.expect(Token::Func, "FUNC")?;
        let (name, name_span) = self.ident("function name")?;
        if name.len() > MAX_NAME_LEN {
            return Err(AsmError::new(
                AsmErrorKind::NameTooLong {
                    name,
                    max: MAX_NAME_LEN,
                },
                name_span,
            ));
        }
        self.expect(Token::LBrace, "`{`")?;

        let mut body = Body::default();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.unexpected("`}`")),
                Some(_) => {
                    self.statement(&mut body)?;
                    if !matches!(self.peek(), Some(Token::Newline | Token::RBrace)) {
                        return Err(self.unexpected("end of line"));
                    }
                }
            }
        }

        if body.params > body.registers {
            return Err(AsmError::new(
                AsmErrorKind::ParamCount {
                    params: body.params,
                    registers: body.registers,
                },
                name_span,
            ));
        }
        let function = Function::new(
            name,
            body.params,
            body.registers,
            body.constants,
            body.instructions,
        );
        Ok((function, name_span))
    }

    fn statement(&mut self, body: &mut Body) -> Result<(), AsmError> {
        let Some((token, span)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.unexpected("statement"));
        };
        self.pos += 1;
        match token {
            Token::Registers => body.registers = self.u16()?,
            Token::Param => body.params = self.u16()?,
            Token::Const => {
                let constant = match self.peek() {
                    Some(Token::Int(_)) => Constant::Int(self.i32()?),
                    Some(Token::Float(x)) => {
                        let x = *x as f32;
                        self.pos += 1;
                        Constant::Float(x)
                    }
                    Some(Token::Str(s)) => {
                        let s = s.clone();
                        self.pos += 1;
                        Constant::Str(s)
                    }
                    _ => return Err(self.unexpected("constant")),
                };
                body.constants.push(constant);
            }
            Token::Ident(mnemonic) => {
                let op = OpCode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AsmError::new(AsmErrorKind::UnknownMnemonic(mnemonic.clone()), span.clone())
                })?;
                body.instructions.push(self.instruction(op, span)?);
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("statement"));
            }
        }
        Ok(())
    }

    fn instruction(&mut self, op: OpCode, start: Span) -> Result<Instruction, AsmError> {
        let mut operands = Vec::new();
        if matches!(self.peek(), Some(Token::Int(_))) {
            operands.push(self.i32()?);
            while matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                operands.push(self.i32()?);
            }
        }
        let span = start.start..self.previous_end();

        let modes = op.modes();
        if operands.len() != modes.arity() {
            return Err(AsmError::new(
                AsmErrorKind::Arity {
                    op,
                    expected: modes.arity(),
                    found: operands.len(),
                },
                span,
            ));
        }

        // Operands fill the used fields in A, B, C order.
        let mut values = operands.into_iter();
        let mut field = |mode: OperandMode| {
            if mode.is_used() {
                values.next().unwrap_or(0)
            } else {
                0
            }
        };
        let (a, b, c) = (field(modes.a), field(modes.b), field(modes.c));
        Instruction::new(op, a, b, c).map_err(|e| AsmError::new(AsmErrorKind::Operand(e), span))
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.eof.clone(), |(_, span)| span.clone())
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(self.eof.end, |(_, span)| span.end)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, expected: &'static str) -> AsmError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), |token| token.to_string());
        AsmError::new(AsmErrorKind::Unexpected { expected, found }, self.span())
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), AsmError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self, expected: &'static str) -> Result<(String, Span), AsmError> {
        match self.tokens.get(self.pos) {
            Some((Token::Ident(name), span)) => {
                self.pos += 1;
                Ok((name.clone(), span.clone()))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn int(&mut self) -> Result<(i64, Span), AsmError> {
        match self.tokens.get(self.pos) {
            Some((Token::Int(value), span)) => {
                self.pos += 1;
                Ok((*value, span.clone()))
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    fn i32(&mut self) -> Result<i32, AsmError> {
        let (value, span) = self.int()?;
        i32::try_from(value).map_err(|_| {
            AsmError::new(
                AsmErrorKind::IntegerRange {
                    value,
                    target: "i32",
                },
                span,
            )
        })
    }

    fn u16(&mut self) -> Result<u16, AsmError> {
        let (value, span) = self.int()?;
        u16::try_from(value).map_err(|_| {
            AsmError::new(
                AsmErrorKind::IntegerRange {
                    value,
                    target: "u16",
                },
                span,
            )
        })
    }
}
