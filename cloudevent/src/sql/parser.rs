//! Recursive-descent parser.
//!
//! Precedence, loosest first: `OR`, `XOR`, `AND`, `NOT`, comparisons
//! together with `LIKE` and `IN`, `+ -`, `* / %`, unary minus.

use super::ast::{BinaryOp, Expression, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::like::Pattern;
use super::value::SqlValue;
use super::Error;

pub fn parse(input: &str) -> Result<Expression, Error> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        end: input.len(),
    };
    if parser.tokens.is_empty() {
        return Err(Error::parse(0, "empty expression"));
    }
    let expression = parser.or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(Error::parse(extra.position, format!("unexpected {:?}", extra.token)));
    }
    Ok(expression)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), Error> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(Error::parse(
                self.position(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn binary_chain(
        &mut self,
        operators: &[(Token, BinaryOp)],
        next: fn(&mut Parser) -> Result<Expression, Error>,
    ) -> Result<Expression, Error> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in operators {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expression::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expression, Error> {
        self.binary_chain(&[(Token::Or, BinaryOp::Or)], Parser::xor)
    }

    fn xor(&mut self) -> Result<Expression, Error> {
        self.binary_chain(&[(Token::Xor, BinaryOp::Xor)], Parser::and)
    }

    fn and(&mut self) -> Result<Expression, Error> {
        self.binary_chain(&[(Token::And, BinaryOp::And)], Parser::not)
    }

    fn not(&mut self) -> Result<Expression, Error> {
        if self.eat(&Token::Not) {
            let operand = self.not()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression, Error> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => Some(BinaryOp::Equal),
                Some(Token::NotEqual) => Some(BinaryOp::NotEqual),
                Some(Token::Less) => Some(BinaryOp::Less),
                Some(Token::LessOrEqual) => Some(BinaryOp::LessOrEqual),
                Some(Token::Greater) => Some(BinaryOp::Greater),
                Some(Token::GreaterOrEqual) => Some(BinaryOp::GreaterOrEqual),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let right = self.additive()?;
                left = Expression::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            let negated = self.peek() == Some(&Token::Not)
                && matches!(self.peek_second(), Some(Token::Like | Token::In));
            if negated {
                self.pos += 1;
            }
            if self.eat(&Token::Like) {
                left = self.like(left, negated)?;
            } else if self.eat(&Token::In) {
                left = self.in_set(left, negated)?;
            } else {
                return Ok(left);
            }
        }
    }

    fn like(&mut self, operand: Expression, negated: bool) -> Result<Expression, Error> {
        let position = self.position();
        match self.next() {
            Some(Token::String(raw)) => {
                let pattern = Pattern::compile(&raw).map_err(|message| Error::parse(position, message))?;
                Ok(Expression::Like {
                    operand: Box::new(operand),
                    pattern,
                    negated,
                })
            }
            other => Err(Error::parse(
                position,
                format!("LIKE needs a string pattern, found {other:?}"),
            )),
        }
    }

    fn in_set(&mut self, operand: Expression, negated: bool) -> Result<Expression, Error> {
        self.expect(Token::LeftParen)?;
        let mut set = vec![self.or()?];
        while self.eat(&Token::Comma) {
            set.push(self.or()?);
        }
        self.expect(Token::RightParen)?;
        Ok(Expression::In {
            operand: Box::new(operand),
            set,
            negated,
        })
    }

    fn additive(&mut self) -> Result<Expression, Error> {
        self.binary_chain(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Subtract)],
            Parser::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expression, Error> {
        self.binary_chain(
            &[
                (Token::Star, BinaryOp::Multiply),
                (Token::Slash, BinaryOp::Divide),
                (Token::Percent, BinaryOp::Modulo),
            ],
            Parser::unary,
        )
    }

    fn unary(&mut self) -> Result<Expression, Error> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, Error> {
        let position = self.position();
        match self.next() {
            Some(Token::Integer(i)) => Ok(Expression::Literal(SqlValue::Integer(i))),
            Some(Token::String(s)) => Ok(Expression::Literal(SqlValue::String(s))),
            Some(Token::Boolean(b)) => Ok(Expression::Literal(SqlValue::Boolean(b))),
            Some(Token::Exists) => match self.next() {
                Some(Token::Identifier(name)) => Ok(Expression::Exists(name.to_ascii_lowercase())),
                other => Err(Error::parse(
                    self.position(),
                    format!("EXISTS needs an attribute name, found {other:?}"),
                )),
            },
            Some(Token::Identifier(name)) if self.peek() == Some(&Token::LeftParen) => {
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RightParen) {
                    args.push(self.or()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.or()?);
                    }
                    self.expect(Token::RightParen)?;
                }
                Ok(Expression::Call {
                    name: name.to_ascii_uppercase(),
                    args,
                })
            }
            Some(Token::Identifier(name)) => Ok(Expression::Identifier(name.to_ascii_lowercase())),
            Some(Token::LeftParen) => {
                let inner = self.or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Some(other) => Err(Error::parse(position, format!("unexpected {other:?}"))),
            None => Err(Error::parse(position, "unexpected end of expression")),
        }
    }
}
