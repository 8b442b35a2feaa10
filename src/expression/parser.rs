use crate::expression::ast::{BinaryOp, Expr, UnaryOp};
use crate::expression::error::ExprError;
use crate::expression::lexer::{Span, Token, TokenKind, lex};

/// Deepest nesting, and tallest expression tree, the parser accepts.
pub(crate) const MAX_DEPTH: usize = 128;

pub(crate) fn parse_expr(src: &str) -> Result<Expr, ExprError> {
    let tokens = lex(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if p.peek().kind == TokenKind::Eof {
        return Err(ExprError::new(0, "expected an expression, found nothing"));
    }
    let (expr, _) = p.parse_sum()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

/// A parsed subtree and its height.
type Node = (Expr, usize);

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn too_deep(span: Span) -> ExprError {
    ExprError::spanning(
        span.start,
        span.len(),
        format!("expression nested too deeply (limit {MAX_DEPTH})"),
    )
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExprError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            let span = self.span();
            Err(ExprError::spanning(
                span.start,
                span.len(),
                format!(
                    "expected {}, found {}",
                    describe(&kind),
                    describe(&self.peek().kind)
                ),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn enter(&mut self, span: Span) -> Result<(), ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep(span));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn binary(
        op: BinaryOp,
        (left, lh): Node,
        (right, rh): Node,
        span: Span,
    ) -> Result<Node, ExprError> {
        let height = lh.max(rh) + 1;
        if height > MAX_DEPTH {
            return Err(too_deep(span));
        }
        let e = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok((e, height))
    }

    fn parse_sum(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_product()?;
        loop {
            let span = self.span();
            let op = if self.consume(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.consume(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let r = self.parse_product()?;
            node = Self::binary(op, node, r, span)?;
        }
        Ok(node)
    }

    fn parse_product(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_unary()?;
        loop {
            let span = self.span();
            let op = if self.consume(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.consume(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.consume(TokenKind::Percent) {
                BinaryOp::Rem
            } else {
                break;
            };
            let r = self.parse_unary()?;
            node = Self::binary(op, node, r, span)?;
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        let span = self.span();
        if self.consume(TokenKind::Minus) {
            self.enter(span)?;
            let inner = self.parse_unary();
            self.leave();
            let (e, h) = inner?;
            if h + 1 > MAX_DEPTH {
                return Err(too_deep(span));
            }
            let e = Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(e),
            };
            return Ok((e, h + 1));
        }
        if self.consume(TokenKind::Plus) {
            self.enter(span)?;
            let inner = self.parse_unary();
            self.leave();
            return inner;
        }
        self.parse_primary()
    }

    fn parse_args(&mut self) -> Result<(Vec<Expr>, usize), ExprError> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.consume(TokenKind::RParen) {
            return Ok((args, height));
        }
        loop {
            let (arg, h) = self.parse_sum()?;
            args.push(arg);
            height = height.max(h);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok((args, height));
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let t = self.bump();
        match t.kind {
            TokenKind::Number(v) => Ok((Expr::Num(v), 1)),
            TokenKind::Ident(name) => {
                if self.consume(TokenKind::LParen) {
                    self.enter(t.span)?;
                    let parsed = self.parse_args();
                    self.leave();
                    let (args, h) = parsed?;
                    if h + 1 > MAX_DEPTH {
                        return Err(too_deep(t.span));
                    }
                    let e = Expr::Call {
                        func: name,
                        args,
                        span: t.span,
                    };
                    Ok((e, h + 1))
                } else {
                    Ok((Expr::Var { name, span: t.span }, 1))
                }
            }
            TokenKind::LParen => {
                self.enter(t.span)?;
                let inner = self.parse_sum();
                self.leave();
                let node = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            }
            other => Err(ExprError::spanning(
                t.span.start,
                t.span.len(),
                format!("expected an operand, found {}", describe(&other)),
            )),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(s) => format!("identifier '{s}'"),
        TokenKind::Number(v) => format!("number {v}"),
        TokenKind::LParen => "'('".to_owned(),
        TokenKind::RParen => "')'".to_owned(),
        TokenKind::Comma => "','".to_owned(),
        TokenKind::Plus => "'+'".to_owned(),
        TokenKind::Minus => "'-'".to_owned(),
        TokenKind::Star => "'*'".to_owned(),
        TokenKind::Slash => "'/'".to_owned(),
        TokenKind::Percent => "'%'".to_owned(),
        TokenKind::Eof => "end of expression".to_owned(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/expression/parser.rs"]
mod tests;
