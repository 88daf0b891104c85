//! Arithmetic-only expression evaluator.
//!
//! Input is checked against a character whitelist, tokenized, and evaluated by a
//! recursive-descent parser over numeric literals and `+ - * / // % ** ^ ( )`.
//! There are no names, functions or any other way out of plain arithmetic.
//! Nesting deeper than `MAX_DEPTH` levels is rejected.

/// Deepest nesting of parentheses and unary operators the parser accepts.
const MAX_DEPTH: usize = 64;

/// Characters an expression may contain. Anything else rejects the whole input.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_whitespace() || "+-*/()%^.".contains(c)
}

/// Evaluate an arithmetic expression, returning `None` for anything that is not a
/// well-formed expression with a finite result.
pub fn evaluate(expr: &str) -> Option<f64> {
    if !expr.chars().all(is_allowed_char) {
        return None;
    }

    let tokens = tokenize(expr).ok()?;
    if tokens.is_empty() {
        return None;
    }

    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = match parser.parse_expr() {
        Ok(v) => v,
        Err(e) => {
            log::debug!("Calculator rejected '{}': {}", expr.trim(), e);
            return None;
        }
    };
    if parser.pos != tokens.len() {
        log::debug!("Calculator rejected '{}': trailing tokens", expr.trim());
        return None;
    }

    value.is_finite().then_some(value)
}

/// Render a result the way a person would write it: `100` rather than `100.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        num_str.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Power);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    tokens.push(Token::DoubleSlash);
                } else {
                    tokens.push(Token::Slash);
                }
            }
            '^' => {
                chars.next();
                tokens.push(Token::Power);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            _ => return Err(format!("Unexpected character: '{}'", ch)),
        }
    }

    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("Expression nested too deeply".to_string());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    left += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    left *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".to_string());
                    }
                    left /= right;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".to_string());
                    }
                    left = (left / right).floor();
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Modulo by zero".to_string());
                    }
                    // Floored modulo: the result takes the sign of the divisor.
                    left -= right * (left / right).floor();
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = ('+' | '-') unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        self.enter()?;
        let value = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.parse_unary().map(|v| -v)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        };
        self.leave();
        value
    }

    // power = primary ('**' unary)?
    // Right-associative, binds tighter than a unary minus on its left.
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Power) = self.peek() {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            if base == 0.0 && exponent < 0.0 {
                return Err("Zero raised to a negative power".to_string());
            }
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = number | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                self.enter()?;
                let value = self.parse_expr();
                self.leave();
                let value = value?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("Missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("Unexpected token: {:?}", token)),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}
