//! JSONPath resolution against `serde_json` values.
//!
//! The engine uses two operations: [`get`] to read a value referenced by a
//! path expression, and [`set`] to graft a value into a document at a
//! reference path (member names and indices only). The return shape of
//! [`get`] is part of the engine contract: slice selectors always produce a
//! list, even when they match zero or one elements, while a plain path that
//! matches nothing is an error the caller decides how to absorb.

use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

/// Errors surfaced by path evaluation.
#[derive(Debug, Error)]
pub enum PathError {
    /// The expression matched nothing in the document.
    #[error("'{0}' was not found")]
    NotFound(String),

    /// The expression is not parseable as a path.
    #[error("invalid path expression '{expr}' at offset {offset}")]
    Invalid { expr: String, offset: usize },

    /// The expression parses but uses a selector [`set`] cannot write through,
    /// or one the evaluator does not implement (filters).
    #[error("unsupported selector in '{0}'")]
    Unsupported(String),
}

/// One step of a parsed path expression.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// `.name` or `['name']`
    Member(String),
    /// `[3]` or `[-1]`
    Index(i64),
    /// `[a:b]` or `[a:b:c]`; omitted bounds are `None`.
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// `.*` or `[*]`
    Wildcard,
    /// `..name`
    Descendant(String),
    /// `[0,2]` or `['a','b']`
    Union(Vec<UnionMember>),
}

#[derive(Debug, Clone, PartialEq)]
enum UnionMember {
    Name(String),
    Index(i64),
}

/// Resolve `expr` against `data`.
///
/// Return shape:
/// - expression ends in a slice selector: always a `Value::Array`, possibly
///   empty;
/// - multiple matches: a `Value::Array` of the matches;
/// - exactly one match on a non-slice path: the matched value itself;
/// - no match on a non-slice path: [`PathError::NotFound`].
pub fn get(data: &Value, expr: &str) -> Result<Value, PathError> {
    let segments = parse(expr)?;
    let ends_in_slice = matches!(segments.last(), Some(Segment::Slice { .. }));

    let mut matches: Vec<&Value> = vec![data];
    for segment in &segments {
        matches = apply_segment(&matches, segment);
    }

    if ends_in_slice {
        return Ok(Value::Array(matches.into_iter().cloned().collect()));
    }

    match matches.len() {
        0 => Err(PathError::NotFound(expr.to_string())),
        1 => Ok(matches[0].clone()),
        _ => Ok(Value::Array(matches.into_iter().cloned().collect())),
    }
}

/// Write `new_value` into `data` at the reference path `expr`.
///
/// Only member and index segments are writable; wildcard, slice, descendant,
/// and union selectors return [`PathError::Unsupported`]. When
/// `create_if_missing` is set, missing intermediate members are created as
/// empty objects (a non-object intermediate is replaced). The root path `$`
/// replaces the whole document.
pub fn set(data: &mut Value, new_value: Value, expr: &str, create_if_missing: bool) -> Result<(), PathError> {
    let segments = parse(expr)?;

    if segments.is_empty() {
        *data = new_value;
        return Ok(());
    }

    let mut current = data;
    for segment in &segments[..segments.len() - 1] {
        current = descend_mut(current, segment, expr, create_if_missing)?;
    }

    match segments.last().expect("non-empty segments") {
        Segment::Member(name) => {
            if !current.is_object() {
                if !create_if_missing {
                    return Err(PathError::NotFound(expr.to_string()));
                }
                *current = Value::Object(JsonMap::new());
            }
            let object = current.as_object_mut().expect("object ensured above");
            object.insert(name.clone(), new_value);
            Ok(())
        }
        Segment::Index(index) => {
            let array = current.as_array_mut().ok_or_else(|| PathError::NotFound(expr.to_string()))?;
            let resolved = resolve_index(*index, array.len()).ok_or_else(|| PathError::NotFound(expr.to_string()))?;
            array[resolved] = new_value;
            Ok(())
        }
        _ => Err(PathError::Unsupported(expr.to_string())),
    }
}

fn descend_mut<'a>(
    current: &'a mut Value,
    segment: &Segment,
    expr: &str,
    create_if_missing: bool,
) -> Result<&'a mut Value, PathError> {
    match segment {
        Segment::Member(name) => {
            if !current.is_object() {
                if !create_if_missing {
                    return Err(PathError::NotFound(expr.to_string()));
                }
                *current = Value::Object(JsonMap::new());
            }
            let object = current.as_object_mut().expect("object ensured above");
            if !object.contains_key(name) {
                if !create_if_missing {
                    return Err(PathError::NotFound(expr.to_string()));
                }
                object.insert(name.clone(), Value::Object(JsonMap::new()));
            }
            Ok(object.get_mut(name).expect("inserted above"))
        }
        Segment::Index(index) => {
            let len = current.as_array().map(Vec::len).ok_or_else(|| PathError::NotFound(expr.to_string()))?;
            let resolved = resolve_index(*index, len).ok_or_else(|| PathError::NotFound(expr.to_string()))?;
            let array = current.as_array_mut().expect("array checked above");
            Ok(&mut array[resolved])
        }
        _ => Err(PathError::Unsupported(expr.to_string())),
    }
}

fn apply_segment<'a>(matches: &[&'a Value], segment: &Segment) -> Vec<&'a Value> {
    let mut next: Vec<&'a Value> = Vec::new();

    for value in matches {
        match segment {
            Segment::Member(name) => {
                if let Some(found) = value.as_object().and_then(|object| object.get(name)) {
                    next.push(found);
                }
            }
            Segment::Index(index) => {
                if let Some(array) = value.as_array()
                    && let Some(resolved) = resolve_index(*index, array.len())
                {
                    next.push(&array[resolved]);
                }
            }
            Segment::Slice { start, end, step } => {
                if let Some(array) = value.as_array() {
                    next.extend(slice_indices(array.len(), *start, *end, *step).map(|index| &array[index]));
                }
            }
            Segment::Wildcard => match value {
                Value::Array(items) => next.extend(items.iter()),
                Value::Object(object) => next.extend(object.values()),
                _ => {}
            },
            Segment::Descendant(name) => collect_descendants(value, name, &mut next),
            Segment::Union(members) => {
                for member in members {
                    match member {
                        UnionMember::Name(name) => {
                            if let Some(found) = value.as_object().and_then(|object| object.get(name)) {
                                next.push(found);
                            }
                        }
                        UnionMember::Index(index) => {
                            if let Some(array) = value.as_array()
                                && let Some(resolved) = resolve_index(*index, array.len())
                            {
                                next.push(&array[resolved]);
                            }
                        }
                    }
                }
            }
        }
    }

    next
}

fn collect_descendants<'a>(value: &'a Value, name: &str, output: &mut Vec<&'a Value>) {
    match value {
        Value::Object(object) => {
            for (key, nested) in object {
                if key == name {
                    output.push(nested);
                }
                collect_descendants(nested, name, output);
            }
        }
        Value::Array(items) => {
            for nested in items {
                collect_descendants(nested, name, output);
            }
        }
        _ => {}
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    if resolved < 0 || resolved >= len {
        return None;
    }
    Some(resolved as usize)
}

/// Normalized, clamped iteration over a python-style slice.
fn slice_indices(len: usize, start: Option<i64>, end: Option<i64>, step: Option<i64>) -> impl Iterator<Item = usize> {
    let len = len as i64;
    let step = step.unwrap_or(1).max(1);
    let clamp = |bound: i64| -> i64 {
        let resolved = if bound < 0 { len + bound } else { bound };
        resolved.clamp(0, len)
    };
    let start = clamp(start.unwrap_or(0));
    let end = clamp(end.unwrap_or(len));

    (start..end).step_by(step as usize).map(|index| index as usize)
}

/// Parse an expression into segments.
///
/// The accepted grammar is the reference subset the engine relies on: a `$`
/// root followed by dot members, descendant members (`..name`), wildcards
/// (`.*` / `[*]`), and bracket selectors holding an index, a quoted name, a
/// slice, or a comma-separated union. Whitespace between segments and inside
/// brackets is tolerated. Filter selectors (`[?...]`) are recognized but
/// unsupported.
fn parse(expr: &str) -> Result<Vec<Segment>, PathError> {
    let bytes = expr.as_bytes();
    let invalid = |offset: usize| PathError::Invalid {
        expr: expr.to_string(),
        offset,
    };

    let mut cursor = 0usize;
    skip_whitespace(bytes, &mut cursor);
    if cursor >= bytes.len() || bytes[cursor] != b'$' {
        return Err(invalid(cursor));
    }
    cursor += 1;

    let mut segments = Vec::new();
    loop {
        skip_whitespace(bytes, &mut cursor);
        if cursor >= bytes.len() {
            break;
        }
        match bytes[cursor] {
            b'.' => {
                cursor += 1;
                if cursor < bytes.len() && bytes[cursor] == b'.' {
                    cursor += 1;
                    let name = read_member_name(expr, &mut cursor).ok_or_else(|| invalid(cursor))?;
                    segments.push(Segment::Descendant(name));
                } else if cursor < bytes.len() && bytes[cursor] == b'*' {
                    cursor += 1;
                    segments.push(Segment::Wildcard);
                } else {
                    let name = read_member_name(expr, &mut cursor).ok_or_else(|| invalid(cursor))?;
                    segments.push(Segment::Member(name));
                }
            }
            b'[' => {
                cursor += 1;
                let close = find_closing_bracket(bytes, cursor).ok_or_else(|| invalid(cursor))?;
                let inner = expr[cursor..close].trim();
                segments.push(parse_bracket(expr, inner, cursor)?);
                cursor = close + 1;
            }
            _ => return Err(invalid(cursor)),
        }
    }

    Ok(segments)
}

fn parse_bracket(expr: &str, inner: &str, offset: usize) -> Result<Segment, PathError> {
    let invalid = || PathError::Invalid {
        expr: expr.to_string(),
        offset,
    };

    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if inner.starts_with('?') {
        return Err(PathError::Unsupported(expr.to_string()));
    }
    if inner.contains(':') {
        let mut bounds = inner.split(':');
        let start = parse_optional_int(bounds.next()).map_err(|_| invalid())?;
        let end = parse_optional_int(bounds.next()).map_err(|_| invalid())?;
        let step = parse_optional_int(bounds.next()).map_err(|_| invalid())?;
        if bounds.next().is_some() {
            return Err(invalid());
        }
        return Ok(Segment::Slice { start, end, step });
    }
    if inner.contains(',') {
        let members = inner
            .split(',')
            .map(|member| parse_union_member(member.trim()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        return Ok(Segment::Union(members));
    }
    match parse_union_member(inner).ok_or_else(invalid)? {
        UnionMember::Index(index) => Ok(Segment::Index(index)),
        UnionMember::Name(name) => Ok(Segment::Member(name)),
    }
}

fn parse_union_member(raw: &str) -> Option<UnionMember> {
    if let Some(quoted) = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')))
    {
        return Some(UnionMember::Name(quoted.to_string()));
    }
    raw.parse::<i64>().ok().map(UnionMember::Index)
}

fn parse_optional_int(raw: Option<&str>) -> Result<Option<i64>, ()> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<i64>().map(Some).map_err(|_| ()),
    }
}

/// Member names mirror the dot-selector ABNF: first char is a letter,
/// underscore, or non-ASCII; later chars additionally allow digits.
fn read_member_name(expr: &str, cursor: &mut usize) -> Option<String> {
    let rest = &expr[*cursor..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if !is_name_first(first) {
        return None;
    }
    let mut end = first.len_utf8();
    for (index, character) in chars {
        if is_name_char(character) {
            end = index + character.len_utf8();
        } else {
            break;
        }
    }
    let name = rest[..end].to_string();
    *cursor += end;
    Some(name)
}

fn is_name_first(character: char) -> bool {
    character.is_ascii_alphabetic() || character == '_' || !character.is_ascii()
}

fn is_name_char(character: char) -> bool {
    is_name_first(character) || character.is_ascii_digit()
}

fn find_closing_bracket(bytes: &[u8], mut cursor: usize) -> Option<usize> {
    let mut in_quote: Option<u8> = None;
    while cursor < bytes.len() {
        let byte = bytes[cursor];
        match in_quote {
            Some(quote) => {
                if byte == quote {
                    in_quote = None;
                }
            }
            None => match byte {
                b'\'' | b'"' => in_quote = Some(byte),
                b']' => return Some(cursor),
                _ => {}
            },
        }
        cursor += 1;
    }
    None
}

fn skip_whitespace(bytes: &[u8], cursor: &mut usize) {
    while *cursor < bytes.len() && bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
}
