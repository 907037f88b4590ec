//! SQL Identifier Handling
//!
//! Every catalog name that reaches generated SQL goes through [`quote_ident`].
//! Identifiers are never bound as parameters and never interpolated raw: the
//! quoting rule (wrap in double quotes, double every embedded double quote)
//! is the single mechanism that makes catalog names safe in statement text.
//!
//! This module also owns the route-segment scheme that maps an entity to its
//! URL-safe address: tables in the `public` namespace are addressed by bare
//! table name, everything else as `{namespace}__{name}`.

// ============================================================================
// QUOTING
// ============================================================================

/// Quote a catalog name for use as a SQL identifier.
///
/// Wraps the name in double quotes and doubles any embedded double quote,
/// which is sufficient to neutralize any byte sequence Postgres accepts as
/// a name.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Build the two-part qualified identifier `"namespace"."name"`.
pub fn qualify(namespace: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(namespace), quote_ident(name))
}

/// Reparse a qualified identifier produced by [`qualify`] back into its
/// `(namespace, name)` pair.
///
/// Returns `None` for strings that are not in the exact two-part quoted
/// form. Used by tests to assert the identifier round-trip invariant and by
/// the model to key entities without a second source of truth.
pub fn parse_qualified(qualified: &str) -> Option<(String, String)> {
    let (namespace, rest) = parse_quoted_part(qualified)?;
    let rest = rest.strip_prefix('.')?;
    let (name, tail) = parse_quoted_part(rest)?;
    if !tail.is_empty() {
        return None;
    }
    Some((namespace, name))
}

/// Parse one `"..."` part, un-doubling embedded quotes.
/// Returns the decoded part and the remaining input.
fn parse_quoted_part(input: &str) -> Option<(String, &str)> {
    let rest = input.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch != '"' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            // Doubled quote: literal quote character inside the name.
            Some(&(_, '"')) => {
                chars.next();
                out.push('"');
            }
            // Closing quote.
            _ => return Some((out, &rest[idx + 1..])),
        }
    }
    None
}

// ============================================================================
// ROUTE SEGMENTS
// ============================================================================

/// Namespace whose tables are addressed by bare name.
pub const DEFAULT_NAMESPACE: &str = "public";

/// Separator between namespace and table name in route segments.
///
/// Catalog names containing this sequence are rejected at introspection so
/// that [`parse_route_segment`] stays injective.
pub const ROUTE_SEPARATOR: &str = "__";

/// Derive the URL-safe route segment for an entity.
pub fn route_segment(namespace: &str, name: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        name.to_string()
    } else {
        format!("{namespace}{ROUTE_SEPARATOR}{name}")
    }
}

/// Reverse a route segment into its `(namespace, name)` pair.
pub fn parse_route_segment(segment: &str) -> (String, String) {
    match segment.split_once(ROUTE_SEPARATOR) {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (DEFAULT_NAMESPACE.to_string(), segment.to_string()),
    }
}

/// Whether a catalog name would break route-segment reverse mapping.
pub fn breaks_route_mapping(name: &str) -> bool {
    name.contains(ROUTE_SEPARATOR)
}

// ============================================================================
// TESTS
// ============================================================================
