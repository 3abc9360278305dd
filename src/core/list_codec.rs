// Conversion between comma-delimited list attributes and item sequences.
//
// Both directions trim items and drop blanks, so inter-item whitespace and
// stray delimiters are not preserved.

pub const SEPARATOR: &str = ", ";

/// Joins the trimmed, non-empty items with `", "`. Nothing left yields `""`.
pub fn encode<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut out = String::new();
    for item in items.into_iter().flatten() {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(SEPARATOR);
        }
        out.push_str(item);
    }
    out
}

pub fn to_json_array(delimited: &str) -> Vec<String> {
    delimited
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
