use std::ops::Range;

use crate::block::{BlockKind, Direction};
use crate::parser::error::ParseError;

const ITEM_NOTE: &str = "expected `move <direction> [value]`, `loop [start]..[end]` or `end loop`";

/// A literal written after a move or inside loop bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
}

impl Literal {
    pub fn into_kind(self) -> BlockKind {
        match self {
            Literal::Integer(n) => BlockKind::integer(n),
            Literal::Boolean(b) => BlockKind::boolean(b),
        }
    }
}

/// What a single list item asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShape {
    Move {
        direction: Direction,
        operand: Option<Literal>,
    },
    Loop {
        start: Option<Literal>,
        end: Option<Literal>,
    },
    EndLoop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItem {
    pub shape: ItemShape,
    pub label: Option<String>,
}

/// Parse the text of one list item, e.g. `move right 3 @first`.
pub fn parse_item(
    text: &str,
    span: Range<usize>,
    file_id: usize,
) -> Result<ParsedItem, ParseError> {
    let mut words: Vec<&str> = text.split_whitespace().collect();

    let label = match words.last() {
        Some(last) if last.starts_with('@') => {
            let label = &last[1..];
            if label.is_empty() {
                return Err(ParseError::error("empty block label", span, file_id));
            }
            let label = label.to_string();
            words.pop();
            Some(label)
        }
        _ => None,
    };

    let Some((head, rest)) = words.split_first() else {
        return Err(ParseError::error("empty list item", span, file_id).with_note(ITEM_NOTE));
    };

    let shape = match head.to_ascii_lowercase().as_str() {
        "move" => parse_move(rest, &span, file_id)?,
        "loop" => parse_loop(rest, &span, file_id)?,
        "end" => match rest {
            [] => ItemShape::EndLoop,
            [word] if word.eq_ignore_ascii_case("loop") => ItemShape::EndLoop,
            _ => return Err(trailing(rest, &span, file_id)),
        },
        other => {
            return Err(
                ParseError::error(format!("unknown block '{}'", other), span, file_id)
                    .with_note(ITEM_NOTE),
            );
        }
    };

    Ok(ParsedItem { shape, label })
}

fn parse_move(
    words: &[&str],
    span: &Range<usize>,
    file_id: usize,
) -> Result<ItemShape, ParseError> {
    let Some((direction, rest)) = words.split_first() else {
        return Err(
            ParseError::error("move block needs a direction", span.clone(), file_id)
                .with_note(ITEM_NOTE),
        );
    };
    let direction: Direction = direction
        .parse()
        .map_err(|msg: String| ParseError::error(msg, span.clone(), file_id))?;

    let operand = match rest {
        [] => None,
        [literal] => Some(parse_literal(literal, span, file_id)?),
        _ => return Err(trailing(&rest[1..], span, file_id)),
    };

    Ok(ItemShape::Move { direction, operand })
}

fn parse_loop(
    words: &[&str],
    span: &Range<usize>,
    file_id: usize,
) -> Result<ItemShape, ParseError> {
    match words {
        [] => Ok(ItemShape::Loop {
            start: None,
            end: None,
        }),
        [range] => {
            let Some((start, end)) = range.split_once("..") else {
                return Err(ParseError::error(
                    format!("invalid loop range '{}'", range),
                    span.clone(),
                    file_id,
                )
                .with_note("loop bounds are written `start..end`; either side may be left out"));
            };
            let bound = |text: &str| -> Result<Option<Literal>, ParseError> {
                if text.is_empty() {
                    Ok(None)
                } else {
                    parse_literal(text, span, file_id).map(Some)
                }
            };
            Ok(ItemShape::Loop {
                start: bound(start)?,
                end: bound(end)?,
            })
        }
        _ => Err(trailing(&words[1..], span, file_id)),
    }
}

fn parse_literal(
    text: &str,
    span: &Range<usize>,
    file_id: usize,
) -> Result<Literal, ParseError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Literal::Integer(n));
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => Ok(Literal::Boolean(true)),
        "false" => Ok(Literal::Boolean(false)),
        _ => Err(ParseError::error(
            format!("invalid value '{}' (expected an integer, true or false)", text),
            span.clone(),
            file_id,
        )),
    }
}

fn trailing(words: &[&str], span: &Range<usize>, file_id: usize) -> ParseError {
    ParseError::error(
        format!("unexpected '{}' after block", words.join(" ")),
        span.clone(),
        file_id,
    )
    .with_note(ITEM_NOTE)
}
