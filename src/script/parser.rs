//! Recursive-descent parser producing the AST from a token stream.

use crate::script::ast::*;
use crate::script::lexer::Token;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.is_eof() {
            statements.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(Program { statements })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        match self.peek() {
            Token::Op(o) if *o == op => {
                self.advance();
                Ok(())
            }
            other => Err(self.err(format!("expected '{}', found {:?}", op, other))),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<()> {
        match self.peek() {
            Token::Keyword(k) if *k == kw => {
                self.advance();
                Ok(())
            }
            other => Err(self.err(format!("expected keyword '{}', found {:?}", kw, other))),
        }
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Token::Op(o) if *o == op)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(self.err(format!("expected identifier, found {:?}", other))),
        }
    }

    fn err(&self, message: String) -> ParseError {
        ParseError { message }
    }

    fn expect_block_start(&mut self) -> PResult<()> {
        self.expect_op(":")?;
        self.skip_newlines_to_indent()?;
        Ok(())
    }

    fn skip_newlines_to_indent(&mut self) -> PResult<()> {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
        match self.peek() {
            Token::Indent => {
                self.advance();
                Ok(())
            }
            other => Err(self.err(format!("expected indented block, found {:?}", other))),
        }
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_block_start()?;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.peek(), Token::Dedent) {
                self.advance();
                break;
            }
            if self.is_eof() {
                break;
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Token::Keyword("def") => self.parse_function_def(),
            Token::Keyword("if") => self.parse_if(),
            Token::Keyword("for") => self.parse_for(),
            Token::Keyword("while") => self.parse_while(),
            Token::Keyword("return") => self.parse_return(),
            Token::Keyword("import") => self.parse_import(),
            Token::Keyword("raise") => self.parse_raise(),
            Token::Keyword("break") => {
                self.advance();
                self.end_simple_stmt()?;
                Ok(Stmt::Break)
            }
            Token::Keyword("continue") => {
                self.advance();
                self.end_simple_stmt()?;
                Ok(Stmt::Continue)
            }
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn end_simple_stmt(&mut self) -> PResult<()> {
        if matches!(self.peek(), Token::Newline) {
            self.advance();
        }
        Ok(())
    }

    fn parse_function_def(&mut self) -> PResult<Stmt> {
        self.expect_keyword("def")?;
        let name = self.expect_ident()?;
        self.expect_op("(")?;
        let mut params = Vec::new();
        if !self.at_op(")") {
            params.push(self.expect_ident()?);
            while self.at_op(",") {
                self.advance();
                params.push(self.expect_ident()?);
            }
        }
        self.expect_op(")")?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDef { name, params, body })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));
        let mut orelse = Vec::new();
        loop {
            if self.at_keyword("elif") {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else if self.at_keyword("else") {
                self.advance();
                orelse = self.parse_block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect_keyword("for")?;
        let target = self.parse_target()?;
        self.expect_keyword("in")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For { target, iter, body })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.expect_keyword("while")?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        self.expect_keyword("return")?;
        if matches!(self.peek(), Token::Newline) || self.is_eof() {
            self.end_simple_stmt()?;
            return Ok(Stmt::Return(None));
        }
        let value = self.parse_expr()?;
        self.end_simple_stmt()?;
        Ok(Stmt::Return(Some(value)))
    }

    fn parse_raise(&mut self) -> PResult<Stmt> {
        self.expect_keyword("raise")?;
        let value = self.parse_expr()?;
        self.end_simple_stmt()?;
        Ok(Stmt::Raise(value))
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        self.expect_keyword("import")?;
        let mut module = self.expect_ident()?;
        while self.at_op(".") {
            self.advance();
            module.push('.');
            module.push_str(&self.expect_ident()?);
        }
        self.end_simple_stmt()?;
        Ok(Stmt::Import { module })
    }

    fn parse_target(&mut self) -> PResult<Target> {
        let first = self.parse_target_atom()?;
        if self.at_op(",") {
            let mut items = vec![first];
            while self.at_op(",") {
                self.advance();
                items.push(self.parse_target_atom()?);
            }
            return Ok(Target::Tuple(items));
        }
        Ok(first)
    }

    fn parse_target_atom(&mut self) -> PResult<Target> {
        let name = self.expect_ident()?;
        let mut target = Target::Name(name.clone());
        let mut base_expr = Expr::Name(name);
        while self.at_op("[") {
            self.advance();
            let index = self.parse_expr()?;
            self.expect_op("]")?;
            target = Target::Index {
                base: Box::new(base_expr.clone()),
                index: Box::new(index.clone()),
            };
            base_expr = Expr::Index {
                base: Box::new(base_expr),
                index: Box::new(index),
            };
        }
        Ok(target)
    }

    fn parse_expr_or_assign_stmt(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expr()?;
        if let Some(op) = self.aug_assign_op() {
            self.advance();
            let value = self.parse_expr()?;
            self.end_simple_stmt()?;
            let target = expr_to_target(expr).map_err(|e| self.err(e))?;
            return Ok(Stmt::AugAssign { target, op, value });
        }
        if self.at_op("=") {
            self.advance();
            let value = self.parse_expr()?;
            self.end_simple_stmt()?;
            let target = expr_to_target(expr).map_err(|e| self.err(e))?;
            return Ok(Stmt::Assign { target, value });
        }
        self.end_simple_stmt()?;
        Ok(Stmt::Expr(expr))
    }

    fn aug_assign_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Op("+=") => Some(BinOp::Add),
            Token::Op("-=") => Some(BinOp::Sub),
            Token::Op("*=") => Some(BinOp::Mul),
            Token::Op("/=") => Some(BinOp::Div),
            _ => None,
        }
    }

    // Expression grammar, lowest to highest precedence:
    // or -> and -> not -> comparison -> additive -> multiplicative -> unary -> power -> postfix -> atom
    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        let mut values = vec![];
        while self.at_keyword("or") {
            self.advance();
            if values.is_empty() {
                values.push(left.clone());
            }
            values.push(self.parse_and()?);
        }
        if values.len() > 1 {
            left = Expr::BoolOp {
                op: BoolOp::Or,
                values,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        let mut values = vec![];
        while self.at_keyword("and") {
            self.advance();
            if values.is_empty() {
                values.push(left.clone());
            }
            values.push(self.parse_not()?);
        }
        if values.len() > 1 {
            left = Expr::BoolOp {
                op: BoolOp::And,
                values,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.at_keyword("not") {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let left = self.parse_additive()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Op("==") => CompareOp::Eq,
                Token::Op("!=") => CompareOp::NotEq,
                Token::Op("<") => CompareOp::Lt,
                Token::Op("<=") => CompareOp::LtE,
                Token::Op(">") => CompareOp::Gt,
                Token::Op(">=") => CompareOp::GtE,
                Token::Keyword("in") => CompareOp::In,
                Token::Keyword("not") => {
                    // lookahead for `not in`
                    let save = self.pos;
                    self.advance();
                    if self.at_keyword("in") {
                        self.advance();
                        comparators.push(self.parse_additive()?);
                        ops.push(CompareOp::NotIn);
                        continue;
                    } else {
                        self.pos = save;
                        break;
                    }
                }
                _ => break,
            };
            self.advance();
            comparators.push(self.parse_additive()?);
            ops.push(op);
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Op("+") => BinOp::Add,
                Token::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Op("*") => BinOp::Mul,
                Token::Op("/") => BinOp::Div,
                Token::Op("//") => BinOp::FloorDiv,
                Token::Op("%") => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.at_op("-") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let left = self.parse_postfix()?;
        if self.at_op("**") {
            self.advance();
            let right = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.at_op("(") {
                self.advance();
                let args = self.parse_args()?;
                self.expect_op(")")?;
                expr = match expr {
                    Expr::Attribute { base, attr } => Expr::MethodCall {
                        base,
                        method: attr,
                        args,
                    },
                    other => Expr::Call {
                        func: Box::new(other),
                        args,
                    },
                };
            } else if self.at_op("[") {
                self.advance();
                let index = self.parse_expr()?;
                self.expect_op("]")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.at_op(".") {
                self.advance();
                let attr = self.expect_ident()?;
                expr = Expr::Attribute {
                    base: Box::new(expr),
                    attr,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.at_op(")") {
            args.push(self.parse_expr()?);
            while self.at_op(",") {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        Ok(args)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        match self.advance() {
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Keyword("True") => Ok(Expr::Bool(true)),
            Token::Keyword("False") => Ok(Expr::Bool(false)),
            Token::Keyword("None") => Ok(Expr::None),
            Token::Ident(name) => Ok(Expr::Name(name)),
            Token::Op("(") => {
                if self.at_op(")") {
                    self.advance();
                    return Ok(Expr::Tuple(vec![]));
                }
                let first = self.parse_expr()?;
                if self.at_op(",") {
                    let mut items = vec![first];
                    while self.at_op(",") {
                        self.advance();
                        if self.at_op(")") {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect_op(")")?;
                    return Ok(Expr::Tuple(items));
                }
                self.expect_op(")")?;
                Ok(first)
            }
            Token::Op("[") => {
                let mut items = Vec::new();
                if !self.at_op("]") {
                    items.push(self.parse_expr()?);
                    while self.at_op(",") {
                        self.advance();
                        if self.at_op("]") {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                }
                self.expect_op("]")?;
                Ok(Expr::List(items))
            }
            Token::Op("{") => {
                let mut pairs = Vec::new();
                if !self.at_op("}") {
                    let k = self.parse_expr()?;
                    self.expect_op(":")?;
                    let v = self.parse_expr()?;
                    pairs.push((k, v));
                    while self.at_op(",") {
                        self.advance();
                        if self.at_op("}") {
                            break;
                        }
                        let k = self.parse_expr()?;
                        self.expect_op(":")?;
                        let v = self.parse_expr()?;
                        pairs.push((k, v));
                    }
                }
                self.expect_op("}")?;
                Ok(Expr::Dict(pairs))
            }
            other => Err(self.err(format!("unexpected token {:?}", other))),
        }
    }
}

fn expr_to_target(expr: Expr) -> Result<Target, String> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Index { base, index } => Ok(Target::Index { base, index }),
        Expr::Tuple(items) => {
            let targets: Result<Vec<Target>, String> =
                items.into_iter().map(expr_to_target).collect();
            Ok(Target::Tuple(targets?))
        }
        other => Err(format!("cannot assign to {:?}", other)),
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
    Parser::new(tokens).parse_program()
}
