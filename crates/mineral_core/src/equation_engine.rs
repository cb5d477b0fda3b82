use crate::error::ParseError;
use std::collections::HashMap;

/// OpCodes for the stack-based virtual machine.
/// Loads are typed by the kind of quantity they read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a literal onto the stack.
    LoadLiteral(f64),
    /// Pushes a stock value from the current snapshot.
    LoadStock(usize),
    /// Pushes a flow value already computed for this step.
    LoadFlow(usize),
    /// Pushes a per-run constant.
    LoadConstant(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Abs,
    Exp,
    Sqrt,
    Ln,
}

/// A compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    ops: Vec<OpCode>,
}

impl Bytecode {
    pub fn literal(value: f64) -> Self {
        Self {
            ops: vec![OpCode::LoadLiteral(value)],
        }
    }

    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    /// Flow indices read by this bytecode, deduplicated, in first-use order.
    pub fn flow_dependencies(&self) -> Vec<usize> {
        let mut deps = Vec::new();
        for op in &self.ops {
            if let OpCode::LoadFlow(idx) = op {
                if !deps.contains(idx) {
                    deps.push(*idx);
                }
            }
        }
        deps
    }
}

/// Stack-based virtual machine for evaluating compiled equations.
///
/// The VM is stateless; `execute` receives every input it reads:
/// - `stocks`: stock snapshot (or initial values when evaluating constants).
/// - `flows`: flow values resolved so far in the current step.
/// - `constants`: the per-run constant table.
/// - `stack`: a reusable buffer for intermediate values.
pub struct VM;

impl VM {
    pub fn execute(
        bytecode: &Bytecode,
        stocks: &[f64],
        flows: &[f64],
        constants: &[f64],
        stack: &mut Vec<f64>,
    ) -> f64 {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadLiteral(val) => stack.push(val),
                OpCode::LoadStock(idx) => stack.push(stocks[idx]),
                OpCode::LoadFlow(idx) => stack.push(flows[idx]),
                OpCode::LoadConstant(idx) => stack.push(constants[idx]),
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a * b),
                OpCode::Div => binary(stack, |a, b| a / b),
                OpCode::Pow => binary(stack, f64::powf),
                OpCode::Neg => unary(stack, |a| -a),
                OpCode::Abs => unary(stack, f64::abs),
                OpCode::Exp => unary(stack, f64::exp),
                OpCode::Sqrt => unary(stack, f64::sqrt),
                OpCode::Ln => unary(stack, f64::ln),
            }
        }

        // Compiler output always leaves exactly one value.
        stack.pop().unwrap_or(f64::NAN)
    }
}

fn binary(stack: &mut Vec<f64>, f: impl Fn(f64, f64) -> f64) {
    let b = stack.pop().unwrap_or(f64::NAN);
    let a = stack.pop().unwrap_or(f64::NAN);
    stack.push(f(a, b));
}

fn unary(stack: &mut Vec<f64>, f: impl Fn(f64) -> f64) {
    let a = stack.pop().unwrap_or(f64::NAN);
    stack.push(f(a));
}

// --- AST & Compiler ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Exp,
    Sqrt,
    Ln,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Function::Abs),
            "exp" => Some(Function::Exp),
            "sqrt" => Some(Function::Sqrt),
            "ln" => Some(Function::Ln),
            _ => None,
        }
    }
}

/// Abstract syntax tree of an equation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Every identifier the expression reads, in first-use order.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Binary(left, _, right) => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_references(out),
        }
    }
}

/// What a name resolves to inside compiled bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Stock(usize),
    Flow(usize),
    Constant(usize),
}

/// Compiles an `Expr` into `Bytecode`, resolving names through a symbol table.
pub struct Compiler<'a> {
    symbols: &'a HashMap<String, Operand>,
}

impl<'a> Compiler<'a> {
    pub fn new(symbols: &'a HashMap<String, Operand>) -> Self {
        Self { symbols }
    }

    /// Fails with the first name missing from the symbol table.
    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, String> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), String> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadLiteral(*n)),
            Expr::Variable(name) => match self.symbols.get(name) {
                Some(Operand::Stock(idx)) => ops.push(OpCode::LoadStock(*idx)),
                Some(Operand::Flow(idx)) => ops.push(OpCode::LoadFlow(*idx)),
                Some(Operand::Constant(idx)) => ops.push(OpCode::LoadConstant(*idx)),
                None => return Err(name.clone()),
            },
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Neg(operand) => {
                self.compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, ops)?;
                ops.push(match func {
                    Function::Abs => OpCode::Abs,
                    Function::Exp => OpCode::Exp,
                    Function::Sqrt => OpCode::Sqrt,
                    Function::Ln => OpCode::Ln,
                });
            }
        }
        Ok(())
    }
}

// --- Parser ---

/// Parses equation text into an AST.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::TrailingInput(format!("{token:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&(_, d)) = chars.peek() {
                let exponent_sign =
                    (d == '-' || d == '+') && num_str.ends_with(|e: char| e == 'e' || e == 'E');
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| ParseError::MalformedNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => return Err(ParseError::UnexpectedCharacter { ch: c, offset }),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_product()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_product()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Unary minus binds looser than '^': -a^2 == -(a^2).
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            // Right-associative.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    let func = Function::from_name(&name)
                        .ok_or_else(|| ParseError::UnknownFunction(name.clone()))?;
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(ParseError::UnexpectedToken(format!("{token:?}"))),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ParseError::UnclosedParen),
        }
    }
}
