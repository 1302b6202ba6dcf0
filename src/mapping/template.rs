use crate::error::SqlMapperError;

/// How a statement's placeholders expect to be fed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterShape {
    /// The statement takes no parameters.
    #[default]
    None,
    /// `#{name}` placeholders, in the order they appear (repeats included).
    Named(Vec<String>),
    /// `?` / `?N` placeholders; the value is the number of distinct slots.
    Positional(usize),
}

impl ParameterShape {
    /// Number of values the driver expects.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match self {
            ParameterShape::None => 0,
            ParameterShape::Named(names) => names.len(),
            ParameterShape::Positional(count) => *count,
        }
    }
}

/// SQL ready for the driver plus the parameter shape it was parsed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub sql: String,
    pub shape: ParameterShape,
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

/// Rewrite `#{name}` placeholders to `?` and record their names.
///
/// Quoted literals and comments are copied untouched. Anything after a comma in
/// a placeholder (`#{id,jdbcType=INTEGER}`) is ignored.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` for an unterminated or empty placeholder,
/// or when named and positional placeholders are mixed.
pub fn parse_template(template: &str) -> Result<ParsedTemplate, SqlMapperError> {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut names: Vec<String> = Vec::new();
    let mut positional_max = 0usize;
    let mut saw_positional = false;
    let mut state = State::Normal;
    let mut idx = 0;
    // Start of the not-yet-copied run of input.
    let mut copied = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'#' if bytes.get(idx + 1) == Some(&b'{') => {
                    let close = template[idx + 2..].find('}').ok_or_else(|| {
                        SqlMapperError::ConfigError(format!(
                            "unterminated placeholder at byte {idx} in `{template}`"
                        ))
                    })?;
                    let body = &template[idx + 2..idx + 2 + close];
                    let name = body.split(',').next().unwrap_or_default().trim();
                    if name.is_empty() {
                        return Err(SqlMapperError::ConfigError(format!(
                            "empty placeholder at byte {idx} in `{template}`"
                        )));
                    }
                    out.push_str(&template[copied..idx]);
                    out.push('?');
                    names.push(name.to_owned());
                    idx += close + 3;
                    copied = idx;
                    continue;
                }
                b'?' => {
                    saw_positional = true;
                    let (end, number) = scan_digits(bytes, idx + 1);
                    match number {
                        Some(n) => positional_max = positional_max.max(n),
                        None => positional_max += 1,
                    }
                    idx = end;
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    out.push_str(&template[copied..]);

    if saw_positional && !names.is_empty() {
        return Err(SqlMapperError::ConfigError(format!(
            "cannot mix #{{}} and ? placeholders in `{template}`"
        )));
    }

    let shape = if !names.is_empty() {
        ParameterShape::Named(names)
    } else if saw_positional {
        ParameterShape::Positional(positional_max)
    } else {
        ParameterShape::None
    };
    Ok(ParsedTemplate { sql: out, shape })
}

fn scan_digits(bytes: &[u8], start: usize) -> (usize, Option<usize>) {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let number = std::str::from_utf8(&bytes[start..idx])
        .ok()
        .and_then(|digits| digits.parse().ok());
    (idx, number)
}
