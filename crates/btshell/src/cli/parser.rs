//! Command-line tokenizer
//!
//! Splits a console line on spaces, tabs, CR and LF. The first token is the
//! command name, the rest become [`Parameter`]s. Each parameter keeps its text
//! and a tolerant integer reading: `0x`/`0X` selects hexadecimal, otherwise
//! decimal, and reading stops at the first character that is not a digit.

use std::fmt;
use std::ops::Index;

const SEPARATORS: &[char] = &[' ', '\t', '\r', '\n'];

/// A single command parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    text: String,
    value: Option<u32>,
}

impl Parameter {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            value: string_to_unsigned(text),
        }
    }

    /// The parameter as typed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Unsigned reading, `None` when the token has no leading digits
    pub fn value(&self) -> Option<u32> {
        self.value
    }

    /// Unsigned reading with the console's historical fallback of zero
    ///
    /// A literal `0` and an unparsable token both read as zero here. Use
    /// [`Parameter::value`] where the difference matters.
    pub fn int_value(&self) -> u32 {
        self.value.unwrap_or(0)
    }

    /// Signed reading accepting a leading minus sign
    pub fn signed_value(&self) -> Option<i32> {
        string_to_signed(&self.text)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered parameters of one command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterList {
    params: Vec<Parameter>,
    raw: String,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: Parameter) {
        self.params.push(param);
    }

    /// Number of parameters that were parsed
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    /// Everything typed after the command name, spacing kept, without the
    /// line terminator
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Index<usize> for ParameterList {
    type Output = Parameter;

    fn index(&self, index: usize) -> &Parameter {
        &self.params[index]
    }
}

impl<'a> IntoIterator for &'a ParameterList {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// A tokenized command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCommand {
    /// Command name folded to upper case
    pub command: String,
    pub parameters: ParameterList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line was empty or only whitespace
    NoCommand,
    /// More parameter tokens than the capacity allows
    ///
    /// Carries the command with the parameters parsed up to capacity.
    TooManyParameters(UserCommand),
}

/// Tokenize `line` into a command and at most `max_parameters` parameters
pub fn parse_command_line(line: &str, max_parameters: usize) -> Result<UserCommand, ParseError> {
    let mut tokens = line.split(SEPARATORS).filter(|token| !token.is_empty());

    let command = match tokens.next() {
        Some(token) => token.to_ascii_uppercase(),
        None => return Err(ParseError::NoCommand),
    };

    let mut parameters = ParameterList::new();
    parameters.raw = raw_parameters(line).to_string();
    for token in tokens {
        if parameters.len() == max_parameters {
            return Err(ParseError::TooManyParameters(UserCommand {
                command,
                parameters,
            }));
        }
        parameters.push(Parameter::new(token));
    }

    Ok(UserCommand {
        command,
        parameters,
    })
}

/// Text following the command token
fn raw_parameters(line: &str) -> &str {
    let line = line.trim_start_matches(SEPARATORS);
    let rest = line.find(SEPARATORS).map_or("", |end| &line[end..]);
    rest.trim_start_matches(SEPARATORS)
        .trim_end_matches(&['\r', '\n'][..])
}

/// Read an unsigned integer, decimal or `0x`-prefixed hexadecimal
///
/// Trailing characters after the digits are ignored. Returns `None` when no
/// digit is present or the value does not fit in 32 bits.
pub fn string_to_unsigned(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(rest) => (rest, 16),
        None => (text, 10),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    u32::from_str_radix(&digits[..end], radix).ok()
}

/// Read a signed integer: an optional leading `-` followed by what
/// [`string_to_unsigned`] accepts
pub fn string_to_signed(text: &str) -> Option<i32> {
    let text = text.trim_start();
    match text.strip_prefix('-') {
        Some(rest) => {
            let magnitude = i64::from(string_to_unsigned(rest)?);
            i32::try_from(-magnitude).ok()
        }
        None => i32::try_from(string_to_unsigned(text)?).ok(),
    }
}
