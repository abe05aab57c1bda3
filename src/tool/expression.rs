//! Arithmetic expressions used by `expression` tool manifests.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := '-' unary | primary
//! primary := number | identifier | '(' expr ')'
//! ```

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &src[start..end];
                let n = literal
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(src[start..end].to_string()));
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            other => return Err(format!("unexpected character '{}'", other)),
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

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinOp::Add } else { BinOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/' | '%'))) = self.peek() {
            let op = match *c {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                _ => BinOp::Rem,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

impl Expr {
    /// Parses `src` into an expression tree.
    pub fn parse(src: &str) -> Result<Self, String> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(format!("trailing input at {:?}", token));
        }
        Ok(expr)
    }

    /// Names of all variables the expression reads.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Neg(inner) => inner.collect_vars(out),
            Expr::Binary(lhs, _, rhs) => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }

    /// Evaluates the expression against bound arguments.
    pub fn eval(&self, args: &Map<String, Value>) -> Result<f64, String> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => args
                .get(name)
                .ok_or_else(|| format!("'{}' was not provided", name))?
                .as_f64()
                .ok_or_else(|| format!("'{}' is not a number", name)),
            Expr::Neg(inner) => Ok(-inner.eval(args)?),
            Expr::Binary(lhs, op, rhs) => {
                let (a, b) = (lhs.eval(args)?, rhs.eval(args)?);
                let n = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div | BinOp::Rem if b == 0.0 => return Err("division by zero".to_string()),
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                };
                if n.is_finite() {
                    Ok(n)
                } else {
                    Err("result is out of range".to_string())
                }
            }
        }
    }
}

/// Converts a float to a JSON number, using an integer when the value is whole.
pub fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn respects_precedence_and_parentheses() {
        let empty = Map::new();
        assert_eq!(Expr::parse("2 + 3 * 4").unwrap().eval(&empty).unwrap(), 14.0);
        assert_eq!(Expr::parse("(2 + 3) * 4").unwrap().eval(&empty).unwrap(), 20.0);
        assert_eq!(Expr::parse("-2 * -3").unwrap().eval(&empty).unwrap(), 6.0);
        assert_eq!(Expr::parse("7 % 4 - 1").unwrap().eval(&empty).unwrap(), 2.0);
    }

    #[test]
    fn overflow_is_an_error() {
        let expr = Expr::parse("num1 * num2").unwrap();
        let err = expr.eval(&args(json!({ "num1": 1e200, "num2": 1e200 }))).unwrap_err();
        assert!(err.contains("out of range"));

        let huge = "9".repeat(400);
        assert!(Expr::parse(&huge).is_err());
    }

    #[test]
    fn reads_variables() {
        let expr = Expr::parse("num1 * num2").unwrap();
        assert_eq!(expr.variables(), ["num1", "num2"]);
        let value = expr.eval(&args(json!({ "num1": 5, "num2": 3 }))).unwrap();
        assert_eq!(number_to_json(value), json!(15));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Expr::parse("1 +").is_err());
        assert!(Expr::parse("(1 + 2").is_err());
        assert!(Expr::parse("1 2").is_err());
        assert!(Expr::parse("a ^ b").is_err());
    }

    #[test]
    fn division_by_zero_fails() {
        let err = Expr::parse("a / b")
            .unwrap()
            .eval(&args(json!({ "a": 1, "b": 0 })))
            .unwrap_err();
        assert!(err.contains("division by zero"));
    }

    #[test]
    fn fractional_results_stay_floats() {
        assert_eq!(number_to_json(7.5), json!(7.5));
    }
}
