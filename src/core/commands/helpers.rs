// src/core/commands/helpers.rs

//! Provides helper functions for parsing command arguments from `RespFrame`s,
//! plus the glob matcher used by `KEYS` and `CONFIG GET`.

use crate::core::PeridotError;
use crate::core::protocol::RespFrame;
use bytes::Bytes;
use std::str::FromStr;

/// A helper struct to parse command arguments sequentially.
/// This simplifies parsing optional flags and value pairs.
pub struct ArgParser<'a> {
    args: &'a [RespFrame],
    cursor: usize,
}

impl<'a> ArgParser<'a> {
    /// Creates a new parser over a slice of arguments.
    pub fn new(args: &'a [RespFrame]) -> Self {
        Self { args, cursor: 0 }
    }

    /// Checks if the next argument matches a specific flag (case-insensitively).
    /// If it matches, consumes the argument and returns true.
    pub fn match_flag(&mut self, flag_name: &str) -> bool {
        if let Some(arg_str) = self.peek_str()
            && arg_str.eq_ignore_ascii_case(flag_name)
        {
            self.cursor += 1;
            return true;
        }
        false
    }

    /// Checks if the next argument matches an option name.
    /// If it matches, consumes both the option name and its value,
    /// then parses the value into the specified type `T`.
    pub fn match_option<T>(&mut self, opt_name: &str) -> Result<Option<T>, PeridotError>
    where
        T: FromStr,
        PeridotError: From<<T as FromStr>::Err>,
    {
        if let Some(arg_str) = self.peek_str()
            && arg_str.eq_ignore_ascii_case(opt_name)
        {
            if self.cursor + 1 >= self.args.len() {
                return Err(PeridotError::SyntaxError);
            }
            let value_str = extract_string(&self.args[self.cursor + 1])?;
            let parsed_value = value_str.parse::<T>()?;
            self.cursor += 2; // Consume both the option name and its value
            return Ok(Some(parsed_value));
        }
        Ok(None)
    }

    /// Returns the remaining arguments that have not been consumed.
    pub fn remaining_args(&self) -> &'a [RespFrame] {
        &self.args[self.cursor..]
    }

    /// Peeks at the next argument as a string without consuming it.
    fn peek_str(&self) -> Option<String> {
        self.args
            .get(self.cursor)
            .and_then(|frame| extract_string(frame).ok())
    }
}

/// Extracts a `String` from a `RespFrame::BulkString`.
/// Returns a `WrongType` error if the frame is not a BulkString or not valid UTF-8.
pub fn extract_string(frame: &RespFrame) -> Result<String, PeridotError> {
    if let RespFrame::BulkString(bs) = frame {
        String::from_utf8(bs.to_vec()).map_err(|_| PeridotError::WrongType)
    } else {
        Err(PeridotError::WrongType)
    }
}

/// Extracts `Bytes` from a `RespFrame::BulkString`.
/// Returns a `WrongType` error if the frame is not a BulkString.
pub fn extract_bytes(frame: &RespFrame) -> Result<Bytes, PeridotError> {
    match frame {
        RespFrame::BulkString(bs) => Ok(bs.clone()),
        _ => Err(PeridotError::WrongType),
    }
}

/// Validates that the number of arguments matches an exact expected count.
pub fn validate_arg_count(
    args: &[RespFrame],
    expected: usize,
    cmd: &str,
) -> Result<(), PeridotError> {
    if args.len() != expected {
        Err(PeridotError::WrongArgumentCount(cmd.to_string()))
    } else {
        Ok(())
    }
}

/// Parses arguments for commands that follow the pattern `COMMAND key value1 [value2 ...]`.
pub fn parse_key_and_values(
    args: &[RespFrame],
    min_args: usize,
    cmd: &str,
) -> Result<(Bytes, Vec<Bytes>), PeridotError> {
    if args.len() < min_args {
        return Err(PeridotError::WrongArgumentCount(cmd.to_string()));
    }
    let key = extract_bytes(&args[0])?;
    let values = args[1..]
        .iter()
        .map(extract_bytes)
        .collect::<Result<_, _>>()?;
    Ok((key, values))
}

/// Formats a sorted-set score the way the wire protocol expects: integral
/// scores print without a fractional part, everything else as the shortest
/// round-trip representation.
pub fn format_score(score: f64) -> String {
    if score.is_finite() && score == score.trunc() && score.abs() < 1e17 {
        let mut buf = itoa::Buffer::new();
        buf.format(score as i64).to_string()
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(score).to_string()
    }
}

/// Glob-style pattern matching over raw bytes, supporting `*`, `?`, character
/// classes `[...]` (with `a-b` ranges and a leading `^` for negation), and
/// `\` escaping.
pub fn glob_match(pattern: &[u8], string: &[u8]) -> bool {
    let mut p_idx = 0;
    let mut s_idx = 0;
    let mut star_p_idx = None; // Index in pattern after the last '*'
    let mut star_s_idx = None; // Index in string to backtrack to on mismatch

    while s_idx < string.len() {
        let matched = match pattern.get(p_idx) {
            Some(b'?') => Some(1),
            Some(b'*') => {
                star_p_idx = Some(p_idx + 1);
                star_s_idx = Some(s_idx);
                p_idx += 1;
                continue;
            }
            Some(b'[') => parse_char_set(&pattern[p_idx..], string[s_idx]),
            Some(b'\\') if p_idx + 1 < pattern.len() => {
                (pattern[p_idx + 1] == string[s_idx]).then_some(2)
            }
            Some(&p_char) => (p_char == string[s_idx]).then_some(1),
            None => None,
        };

        match matched {
            Some(consumed) => {
                p_idx += consumed;
                s_idx += 1;
            }
            None => {
                // Mismatch: backtrack to the last star if available.
                if let (Some(p), Some(s)) = (star_p_idx, star_s_idx) {
                    p_idx = p;
                    s_idx = s + 1;
                    star_s_idx = Some(s + 1);
                } else {
                    return false;
                }
            }
        }
    }

    // After exhausting the string, consume any trailing stars in the pattern.
    while p_idx < pattern.len() && pattern[p_idx] == b'*' {
        p_idx += 1;
    }

    // Match is successful only if the entire pattern is consumed.
    p_idx == pattern.len()
}

/// Matches one character against a `[...]` class starting at `pattern[0]`.
/// Returns the full length of the class in the pattern if the character
/// matches, `None` otherwise. An unterminated class never matches.
fn parse_char_set(pattern: &[u8], ch: u8) -> Option<usize> {
    let mut idx = 1;
    let negated = pattern.get(idx) == Some(&b'^');
    if negated {
        idx += 1;
    }

    let mut found = false;
    let mut closed = false;
    while idx < pattern.len() {
        match pattern[idx] {
            b']' => {
                closed = true;
                idx += 1;
                break;
            }
            b'\\' if idx + 1 < pattern.len() => {
                if pattern[idx + 1] == ch {
                    found = true;
                }
                idx += 2;
            }
            lo if idx + 2 < pattern.len() && pattern[idx + 1] == b'-' && pattern[idx + 2] != b']' => {
                let hi = pattern[idx + 2];
                if (lo.min(hi)..=lo.max(hi)).contains(&ch) {
                    found = true;
                }
                idx += 3;
            }
            c => {
                if c == ch {
                    found = true;
                }
                idx += 1;
            }
        }
    }

    if !closed {
        return None;
    }
    (found != negated).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_basics() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h*llo", b"heeeello"));
        assert!(!glob_match(b"h?llo", b"hllo"));
    }

    #[test]
    fn glob_char_classes() {
        assert!(glob_match(b"h[ae]llo", b"hello"));
        assert!(glob_match(b"h[a-z]llo", b"hxllo"));
        assert!(!glob_match(b"h[a-z]llo", b"hXllo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
    }

    #[test]
    fn glob_escapes() {
        assert!(glob_match(b"h\\*llo", b"h*llo"));
        assert!(!glob_match(b"h\\*llo", b"hxllo"));
        assert!(glob_match(b"h[\\]]llo", b"h]llo"));
    }

    #[test]
    fn score_formatting() {
        assert_eq!(format_score(1.0), "1");
        assert_eq!(format_score(-3.0), "-3");
        assert_eq!(format_score(1.5), "1.5");
    }
}
