//! Local arithmetic fast path.
//!
//! Spoken phrasing ("5 plus 10", "20% of 400", "square root of 16") is rewritten
//! into a small arithmetic language, tokenized, and evaluated by a
//! recursive-descent parser:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+' | 'sqrt') unary | power
//! power   := primary ('**' unary)?
//! primary := number | '(' expr ')'
//! ```
//!
//! Anything outside that language is "not a math query" and yields `None`.

use once_cell::sync::Lazy;
use regex::Regex;

static FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"what is|calculate|find|result of|solve").expect("valid filler regex")
});

/// Phrase rewrites applied in order. Longer phrases come before their prefixes.
static OPERATOR_PHRASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"to the power of|power of", " ** "),
        (r"square root of", " sqrt "),
        (r"multiplied by|multiply|times|into", " * "),
        (r"divided by|divide|over", " / "),
        (r"plus", " + "),
        (r"minus", " - "),
        (r"%\s*of", " *0.01* "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid operator regex"),
            replacement,
        )
    })
    .collect()
});

const DECIMAL_PLACES: i32 = 4;

/// Rewrite a spoken question into the arithmetic language.
pub fn normalize(command: &str) -> String {
    let lowered = command.to_lowercase();
    let trimmed = lowered
        .trim()
        .trim_end_matches(['?', '!', '.'])
        .trim();

    let mut expr = FILLER.replace_all(trimmed, "").into_owned();
    for (pattern, replacement) in OPERATOR_PHRASES.iter() {
        expr = pattern.replace_all(&expr, *replacement).into_owned();
    }
    expr
}

/// Evaluate `command` as arithmetic, rounded to 4 decimal places.
///
/// Returns `None` for anything that is not a well-formed expression or whose
/// value is not finite.
pub fn evaluate(command: &str) -> Option<f64> {
    let expr = normalize(command);
    let tokens = tokenize(&expr).ok()?;
    let value = Parser::new(&tokens).parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(round(value))
}

/// Render a result the way it should be spoken: no trailing `.0`.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMAL_PLACES);
    let scaled = value * factor;
    // Past 2^52 there is no fractional part left, and scaling may overflow
    if !scaled.is_finite() || value.abs() >= 4_503_599_627_370_496.0 {
        return value;
    }
    let rounded = scaled.round() / factor;
    // -0 reads badly
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    Sqrt,
    LParen,
    RParen,
}

#[derive(Debug, PartialEq)]
enum CalcError {
    UnexpectedChar(char),
    BadNumber(String),
    UnexpectedToken,
    UnexpectedEnd,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &expr[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::BadNumber(literal.to_string()))?;
                tokens.push(Token::Number(value));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '*' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '*'))) {
                    chars.next();
                    tokens.push(Token::Pow);
                } else {
                    tokens.push(Token::Star);
                }
            }
            's' if expr[start..].starts_with("sqrt") => {
                for _ in 0.."sqrt".len() {
                    chars.next();
                }
                tokens.push(Token::Sqrt);
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> Result<f64, CalcError> {
        let value = self.expr()?;
        if self.pos != self.tokens.len() {
            return Err(CalcError::UnexpectedToken);
        }
        Ok(value)
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    value /= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Sqrt) => {
                self.pos += 1;
                Ok(self.unary()?.sqrt())
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(CalcError::UnexpectedToken),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(_) => Err(CalcError::UnexpectedToken),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}
