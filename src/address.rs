//! Address extraction for `MAIL FROM:` and `RCPT TO:` arguments.

/// Strips `keyword` (matched case-insensitively) from the front of
/// `argument` and unwraps an optional `<...>` around the address.
///
/// Returns `None` when the keyword is missing or nothing is left once the
/// brackets and surrounding whitespace are removed.
pub fn extract<'a>(keyword: &str, argument: &'a str) -> Option<&'a str> {
    let prefix = argument.get(..keyword.len())?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return None;
    }

    let rest = &argument[keyword.len()..];
    let address = match (rest.find('<'), rest.rfind('>')) {
        (Some(open), Some(close)) if open < close => &rest[open + 1..close],
        _ => rest,
    };

    let address = address.trim();
    (!address.is_empty()).then_some(address)
}
