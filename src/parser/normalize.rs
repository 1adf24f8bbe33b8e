//! Expansion of legacy grouping and top-level filter unions
//!
//! Two pieces of predecessor syntax are rewritten at the string level before
//! parsing: `.(a,b,c)` / `..(a,b,c)` grouping, and bracket unions that mix
//! filters with other members. Both expand one source string into several;
//! the parser then produces a multi-branch [`crate::ast::Path`].

use super::utils::take_paren_group;

/// Expand a path source into its list of simple path sources
///
/// Returns the input itself when nothing needs expanding. Expansion is
/// applied repeatedly, so several constructs in one path multiply out in
/// source order.
pub(crate) fn expand(source: &str) -> Vec<String> {
    match expand_first(source) {
        Some(alternatives) => alternatives.iter().flat_map(|s| expand(s)).collect(),
        None => vec![source.to_owned()],
    }
}

// Find the leftmost expandable construct at path nesting level and expand
// it, or return None when the source is already a simple path.
fn expand_first(source: &str) -> Option<Vec<String>> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(source, i),
            b'.' => {
                let dots = if bytes.get(i + 1) == Some(&b'.') { 2 } else { 1 };
                if bytes.get(i + dots) == Some(&b'(') {
                    return expand_grouping(source, i, dots);
                }
                i += dots;
            }
            b'[' => {
                let (body, end) = bracket_body(source, i)?;
                if let Some(expanded) = expand_filter_union(source, i, body, end) {
                    return Some(expanded);
                }
                i = end + 1;
            }
            _ => i += 1,
        }
    }
    None
}

// `.(a,b,c)` at `dot`: substitute each alternative behind the dot(s).
fn expand_grouping(source: &str, dot: usize, dots: usize) -> Option<Vec<String>> {
    let group_start = dot + dots;
    let (rest, body) = take_paren_group(&source[group_start..]).ok()?;
    let prefix = &source[..dot];
    let lead = &source[dot..group_start];
    let suffix = rest;
    let alternatives = split_top_level(body)
        .into_iter()
        .map(|item| {
            let item = item.trim();
            let step = if is_bare_ident(item) {
                format!("{lead}{item}")
            } else if item.parse::<isize>().is_ok() {
                format!("{lead_index}[{item}]", lead_index = recursive_lead(lead))
            } else {
                format!(
                    "{lead_index}['{escaped}']",
                    lead_index = recursive_lead(lead),
                    escaped = escape_name(item)
                )
            };
            format!("{prefix}{step}{suffix}")
        })
        .collect();
    Some(alternatives)
}

// Bracket members become `[n]` / `['…']`; under `..` the recursion marker
// is kept in front of the bracket.
fn recursive_lead(lead: &str) -> &str {
    if lead == ".." {
        ".."
    } else {
        ""
    }
}

// A bracket whose members include at least one filter splits into one path
// per member.
fn expand_filter_union(source: &str, open: usize, body: &str, end: usize) -> Option<Vec<String>> {
    let items = split_top_level(body);
    if items.len() < 2 || !items.iter().any(|item| item.trim_start().starts_with('?')) {
        return None;
    }
    let prefix = &source[..open];
    let suffix = &source[end + 1..];
    Some(
        items
            .into_iter()
            .map(|item| format!("{prefix}[{item}]{suffix}", item = item.trim()))
            .collect(),
    )
}

// Content of the bracket opening at `open`, with the index of its `]`.
fn bracket_body(source: &str, open: usize) -> Option<(&str, usize)> {
    let inner = &source[open + 1..];
    let mut squares: usize = 0;
    let mut parens: usize = 0;
    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_quoted(inner, i);
                continue;
            }
            b'[' => squares += 1,
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b']' => {
                if squares == 0 && parens == 0 {
                    return Some((&inner[..i], open + 1 + i));
                }
                squares = squares.saturating_sub(1);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

// Split on commas that sit outside quotes, brackets, and parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut squares: usize = 0;
    let mut parens: usize = 0;
    let mut start = 0;
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_quoted(body, i);
                continue;
            }
            b'[' => squares += 1,
            b']' => squares = squares.saturating_sub(1),
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b',' if squares == 0 && parens == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(&body[start..]);
    items
}

// Returns the index just past the closing quote.
fn skip_quoted(source: &str, open: usize) -> usize {
    let quote = source.as_bytes()[open];
    let bytes = source.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_bare_ident(item: &str) -> bool {
    let mut chars = item.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' || c >= '\u{0080}' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c >= '\u{0080}')
}

fn escape_name(item: &str) -> String {
    item.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::expand;

    #[test]
    fn plain_paths_pass_through() {
        assert_eq!(expand("$.store.book[*]"), vec!["$.store.book[*]"]);
        assert_eq!(expand("$..book[?(@.price)]"), vec!["$..book[?(@.price)]"]);
    }

    #[test]
    fn grouping_expands() {
        assert_eq!(
            expand("$.store.(book,bicycle).price"),
            vec!["$.store.book.price", "$.store.bicycle.price"]
        );
        assert_eq!(
            expand("$..(a,1,odd name)"),
            vec!["$..a", "$..[1]", "$..['odd name']"]
        );
    }

    #[test]
    fn nested_grouping_multiplies() {
        assert_eq!(
            expand("$.(a,b).(c,d)"),
            vec!["$.a.c", "$.a.d", "$.b.c", "$.b.d"]
        );
    }

    #[test]
    fn filter_unions_split() {
        assert_eq!(
            expand("$.book[?(@.a),?(@.b)]"),
            vec!["$.book[?(@.a)]", "$.book[?(@.b)]"]
        );
        assert_eq!(
            expand("$.book[0,?(@.b)].title"),
            vec!["$.book[0].title", "$.book[?(@.b)].title"]
        );
    }

    #[test]
    fn plain_unions_stay_intact() {
        assert_eq!(expand("$.book[0,1]"), vec!["$.book[0,1]"]);
    }

    #[test]
    fn quoted_commas_do_not_split() {
        assert_eq!(expand("$.book['a,b',0]"), vec!["$.book['a,b',0]"]);
        assert_eq!(
            expand("$.book[?(@.t == ',?'),0]"),
            vec!["$.book[?(@.t == ',?')]", "$.book[0]"]
        );
    }
}
