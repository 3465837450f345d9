//! Sample query parsing for selecting fitting subsets.
//!
//! Queries select the rows a scaler or filter is fit on, e.g.
//! `Metadata_treatment == 'control' and Metadata_plate != 'p3'`. The grammar
//! supports `==`/`!=` against quoted strings or numbers, numeric ordering
//! comparisons (`<`, `<=`, `>`, `>=`), `and`/`or` (or `&`/`|`) conjunctions,
//! and parentheses. `and` binds tighter than `or`.

use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};

/// Which rows an operation fits its parameters on.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleQuery {
    /// Fit on every row.
    All,
    /// Fit on the rows matching a parsed query expression.
    Expr(QueryExpr),
}

impl SampleQuery {
    /// Parse a query string; the literal `all` selects every row.
    pub fn parse(query: &str) -> Result<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() || trimmed == "all" {
            return Ok(SampleQuery::All);
        }
        let tokens = tokenize(trimmed)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(ProfileError::QueryParse(format!(
                "Unexpected trailing input in query '{}'",
                trimmed
            )));
        }
        Ok(SampleQuery::Expr(expr))
    }

    /// Check if this query selects every row.
    pub fn is_all(&self) -> bool {
        matches!(self, SampleQuery::All)
    }

    /// Indices of the rows matching the query, in row order.
    pub fn matching_rows(&self, table: &ProfileTable) -> Result<Vec<usize>> {
        match self {
            SampleQuery::All => Ok((0..table.n_rows()).collect()),
            SampleQuery::Expr(expr) => {
                let mask = expr.mask(table)?;
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter(|(_, &m)| m)
                    .map(|(i, _)| i)
                    .collect())
            }
        }
    }
}

impl std::fmt::Display for SampleQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleQuery::All => write!(f, "all"),
            SampleQuery::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

/// A parsed query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Compare {
        column: String,
        op: CompareOp,
        value: QueryValue,
    },
    And(Box<QueryExpr>, Box<QueryExpr>),
    Or(Box<QueryExpr>, Box<QueryExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(f64),
}

impl QueryValue {
    fn canonical(&self) -> String {
        match self {
            QueryValue::Text(s) => s.clone(),
            QueryValue::Number(v) => format!("{}", v),
        }
    }
}

impl QueryExpr {
    /// Per-row match mask.
    ///
    /// Equality compares the cell's canonical string form, so `== '2'`
    /// matches the numeric value 2.0; missing cells compare unequal to every
    /// literal. Ordering comparisons require a numeric column and literal;
    /// missing cells never match.
    pub fn mask(&self, table: &ProfileTable) -> Result<Vec<bool>> {
        match self {
            QueryExpr::Compare { column, op, value } => compare_mask(table, column, *op, value),
            QueryExpr::And(a, b) => {
                let (ma, mb) = (a.mask(table)?, b.mask(table)?);
                Ok(ma.iter().zip(mb.iter()).map(|(&x, &y)| x && y).collect())
            }
            QueryExpr::Or(a, b) => {
                let (ma, mb) = (a.mask(table)?, b.mask(table)?);
                Ok(ma.iter().zip(mb.iter()).map(|(&x, &y)| x || y).collect())
            }
        }
    }
}

impl std::fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryExpr::Compare { column, op, value } => match value {
                QueryValue::Text(s) => write!(f, "{} {} '{}'", column, op.symbol(), s),
                QueryValue::Number(v) => write!(f, "{} {} {}", column, op.symbol(), v),
            },
            QueryExpr::And(a, b) => write!(f, "({} and {})", a, b),
            QueryExpr::Or(a, b) => write!(f, "({} or {})", a, b),
        }
    }
}

fn compare_mask(
    table: &ProfileTable,
    column: &str,
    op: CompareOp,
    value: &QueryValue,
) -> Result<Vec<bool>> {
    let col = table.column(column)?;
    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let target = value.canonical();
            let mask = (0..table.n_rows())
                .map(|row| {
                    let eq = col.cell_key(row).as_deref() == Some(target.as_str());
                    if op == CompareOp::Eq {
                        eq
                    } else {
                        !eq
                    }
                })
                .collect();
            Ok(mask)
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let target = match value {
                QueryValue::Number(v) => *v,
                QueryValue::Text(_) => {
                    return Err(ProfileError::QueryParse(format!(
                        "Ordering comparison on '{}' requires a numeric value",
                        column
                    )));
                }
            };
            let values = col.as_numbers()?;
            let mask = values
                .iter()
                .map(|&x| match op {
                    CompareOp::Lt => x < target,
                    CompareOp::Le => x <= target,
                    CompareOp::Gt => x > target,
                    CompareOp::Ge => x >= target,
                    _ => unreachable!(),
                })
                .collect();
            Ok(mask)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(CompareOp),
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '&' {
            tokens.push(Token::And);
            i += 1;
        } else if c == '|' {
            tokens.push(Token::Or);
            i += 1;
        } else if c == '=' || c == '!' || c == '<' || c == '>' {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            let (op, len) = match two.as_str() {
                "==" => (CompareOp::Eq, 2),
                "!=" => (CompareOp::Ne, 2),
                "<=" => (CompareOp::Le, 2),
                ">=" => (CompareOp::Ge, 2),
                _ if c == '<' => (CompareOp::Lt, 1),
                _ if c == '>' => (CompareOp::Gt, 1),
                _ => {
                    return Err(ProfileError::QueryParse(format!(
                        "Invalid operator '{}' in query",
                        c
                    )));
                }
            };
            tokens.push(Token::Op(op));
            i += len;
        } else if c == '\'' || c == '"' {
            let quote = c;
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != quote {
                end += 1;
            }
            if end >= chars.len() {
                return Err(ProfileError::QueryParse(
                    "Unterminated string literal".to_string(),
                ));
            }
            tokens.push(Token::Str(chars[start..end].iter().collect()));
            i = end + 1;
        } else if c.is_ascii_digit()
            || ((c == '-' || c == '.') && i + 1 < chars.len() && chars[i + 1].is_ascii_digit())
        {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'e'
                    || chars[i] == 'E'
                    || ((chars[i] == '-' || chars[i] == '+')
                        && (chars[i - 1] == 'e' || chars[i - 1] == 'E')))
            {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| {
                ProfileError::QueryParse(format!("Invalid numeric literal '{}'", text))
            })?;
            tokens.push(Token::Num(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "and" => tokens.push(Token::And),
                "or" => tokens.push(Token::Or),
                _ => tokens.push(Token::Ident(word)),
            }
        } else {
            return Err(ProfileError::QueryParse(format!(
                "Unexpected character '{}' in query",
                c
            )));
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

    fn parse_or(&mut self) -> Result<QueryExpr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = QueryExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryExpr> {
        let mut left = self.parse_atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_atom()?;
            left = QueryExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_atom(&mut self) -> Result<QueryExpr> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(ProfileError::QueryParse(
                        "Missing closing parenthesis".to_string(),
                    ));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Ident(column)) => {
                self.pos += 1;
                let op = match self.peek() {
                    Some(Token::Op(op)) => *op,
                    _ => {
                        return Err(ProfileError::QueryParse(format!(
                            "Expected a comparison operator after '{}'",
                            column
                        )));
                    }
                };
                self.pos += 1;
                let value = match self.peek().cloned() {
                    Some(Token::Str(s)) => QueryValue::Text(s),
                    Some(Token::Num(v)) => QueryValue::Number(v),
                    _ => {
                        return Err(ProfileError::QueryParse(format!(
                            "Expected a quoted string or number after '{} {}'",
                            column,
                            op.symbol()
                        )));
                    }
                };
                self.pos += 1;
                Ok(QueryExpr::Compare { column, op, value })
            }
            _ => Err(ProfileError::QueryParse(
                "Expected a column comparison or parenthesized expression".to_string(),
            )),
        }
    }
}
