use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::CanonicalError;

static FUNCTION_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\w+)\((.*)\)").expect("function call regex"));

/// A `name(args)` call found in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFunction {
    pub name: String,
    pub args: Option<String>,
}

/// Extract a `name(args)` call from model text, for backends or prompts that
/// describe calls inline instead of through native function calling.
///
/// Returns `Ok(None)` when the text holds no call. `args` is `None` when the
/// parentheses are empty.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] when a call shape matched but its
/// name is blank.
pub fn parse_function(value: &str) -> Result<Option<ParsedFunction>, CanonicalError> {
    let Some(caps) = FUNCTION_CALL_RE.captures(value) else {
        return Ok(None);
    };
    let name = caps.get(1).map_or("", |m| m.as_str().trim());
    if name.is_empty() {
        return Err(CanonicalError::validation(
            "function",
            None,
            format!("invalid function format: {value}"),
        ));
    }
    let args = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|args| !args.is_empty())
        .map(str::to_owned);
    Ok(Some(ParsedFunction {
        name: name.to_owned(),
        args,
    }))
}
