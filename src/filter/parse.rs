use crate::error::FilterError;

use super::criteria::{flag_token, Flag, SearchCriteria};
use super::lex::{lex, Lexeme, Token};

/// Filter expression tree. The shape mirrors the textual expression; no
/// normalization happens at parse time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterNode {
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
    Not(Box<FilterNode>),
    /// `negated` marks `UN`-prefixed flag tokens, which assert absence.
    Flag { flag: Flag, negated: bool },
    /// `negated` marks `!=` comparisons.
    Header {
        key: String,
        value: String,
        negated: bool,
    },
    Body { text: String, negated: bool },
    Text { text: String, negated: bool },
}

/// Parse a filter expression into its tree form.
///
/// Precedence, highest first: `!`, `&&`, `||`; both binary operators are
/// left-associative and parentheses override.
pub fn parse(input: &str) -> Result<FilterNode, FilterError> {
    let lexemes = lex(input)?;
    let mut parser = Parser {
        lexemes,
        pos: 0,
        input_len: input.len(),
    };

    let node = parser.expression()?;
    match parser.peek() {
        None => Ok(node),
        Some(Lexeme {
            token: Token::RParen,
            pos,
        }) => Err(FilterError::UnbalancedParen(*pos)),
        Some(lexeme) => Err(FilterError::Expected(lexeme.pos, "operator")),
    }
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn expression(&mut self) -> Result<FilterNode, FilterError> {
        let mut node = self.term()?;

        while matches!(self.peek(), Some(l) if l.token == Token::Or) {
            self.pos += 1;
            let rhs = self.term()?;
            node = FilterNode::Or(Box::new(node), Box::new(rhs));
        }

        Ok(node)
    }

    fn term(&mut self) -> Result<FilterNode, FilterError> {
        let mut node = self.primary()?;

        while matches!(self.peek(), Some(l) if l.token == Token::And) {
            self.pos += 1;
            let rhs = self.primary()?;
            node = FilterNode::And(Box::new(node), Box::new(rhs));
        }

        Ok(node)
    }

    fn primary(&mut self) -> Result<FilterNode, FilterError> {
        let Some(lexeme) = self.next() else {
            return Err(FilterError::UnexpectedEnd);
        };

        match lexeme.token {
            Token::Bang => {
                let inner = self.primary()?;
                Ok(FilterNode::Not(Box::new(inner)))
            }
            Token::LParen => {
                let node = self.expression()?;
                match self.next() {
                    Some(Lexeme {
                        token: Token::RParen,
                        ..
                    }) => Ok(node),
                    _ => Err(FilterError::UnbalancedParen(lexeme.pos)),
                }
            }
            Token::Ident(name) => self.operand(name, lexeme.pos),
            other => Err(FilterError::Expected(lexeme.pos, other.describe())),
        }
    }

    /// A bare identifier must be a flag token; followed by a comparison
    /// operator it becomes a header, body or text predicate instead.
    fn operand(&mut self, name: String, pos: usize) -> Result<FilterNode, FilterError> {
        let negated = match self.peek().map(|l| &l.token) {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => {
                return match flag_token(&name.to_uppercase()) {
                    Some((flag, negated)) => Ok(FilterNode::Flag { flag, negated }),
                    None => Err(FilterError::UnknownFlag(pos, name)),
                };
            }
        };
        self.pos += 1;

        let value = match self.next() {
            Some(Lexeme {
                token: Token::Str(value),
                ..
            }) => value,
            Some(lexeme) => return Err(FilterError::ExpectedString(lexeme.pos)),
            None => return Err(FilterError::ExpectedString(self.input_len)),
        };

        Ok(match name.to_uppercase().as_str() {
            "BODY" => FilterNode::Body {
                text: value,
                negated,
            },
            "TEXT" => FilterNode::Text {
                text: value,
                negated,
            },
            _ => FilterNode::Header {
                key: name,
                value,
                negated,
            },
        })
    }
}

/// Translate a filter tree into the IMAP search predicate it denotes.
pub fn lower(node: &FilterNode) -> SearchCriteria {
    let mut criteria = SearchCriteria::default();

    match node {
        FilterNode::Flag { flag, negated } => {
            if *negated {
                criteria.not_flag.push(*flag);
            } else {
                criteria.flag.push(*flag);
            }
        }
        FilterNode::Header {
            key,
            value,
            negated,
        } => {
            let mut eq = SearchCriteria::default();
            eq.header.push((key.clone(), value.clone()));
            if *negated {
                criteria.not.push(eq);
            } else {
                criteria = eq;
            }
        }
        FilterNode::Body { text, negated } => {
            let mut eq = SearchCriteria::default();
            eq.body.push(text.clone());
            if *negated {
                criteria.not.push(eq);
            } else {
                criteria = eq;
            }
        }
        FilterNode::Text { text, negated } => {
            let mut eq = SearchCriteria::default();
            eq.text.push(text.clone());
            if *negated {
                criteria.not.push(eq);
            } else {
                criteria = eq;
            }
        }
        FilterNode::Not(inner) => {
            criteria.not.push(lower(inner));
        }
        FilterNode::And(left, right) => {
            criteria = lower(left);
            criteria.and(lower(right));
        }
        FilterNode::Or(left, right) => {
            criteria.or.push((lower(left), lower(right)));
        }
    }

    criteria
}
