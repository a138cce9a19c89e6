//! Symbol normalization.
//!
//! Hook table entries are sorted by a canonical form of their symbol, and
//! lookups compare in that same form. The canonical form is internal: it is
//! only ever used for ordering and search.

/// Marker preceding a vendored dependency's own path.
pub const VENDOR_MARKER: &str = "/vendor/";

/// Strips the build-path prefix of a vendored dependency.
///
/// Everything up to and including the last [`VENDOR_MARKER`] is dropped, so
/// `a/vendor/b/vendor/pkg.F` becomes `pkg.F`. Symbols without the marker
/// are returned unchanged.
#[must_use]
pub fn unvendor(symbol: &str) -> &str {
    symbol
        .rfind(VENDOR_MARKER)
        .map_or(symbol, |start| &symbol[start + VENDOR_MARKER.len()..])
}

/// Maps a symbol to its comparison key.
///
/// Removes spaces, `*`, `(` and `)`, then replaces `/`, `.`, `-` and `@`
/// with `_`. Total and idempotent.
#[must_use]
pub fn normalize(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, ' ' | '*' | '(' | ')'))
        .map(|c| match c {
            '/' | '.' | '-' | '@' => '_',
            c => c,
        })
        .collect()
}

/// Returns the key a symbol is sorted and searched by.
#[must_use]
pub fn key(symbol: &str) -> String {
    normalize(unvendor(symbol))
}
