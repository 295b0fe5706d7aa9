//! Record type name to table name mapping.

/// Convert a PascalCase record type name to its snake_case table name.
///
/// A word boundary is placed before an uppercase letter that follows a
/// lowercase letter or digit, and before the last capital of an acronym run
/// when a lowercase letter follows it (`HTTPReport` -> `http_report`).
pub fn table_name(type_name: &str) -> String {
    let chars: Vec<char> = type_name.chars().collect();
    let mut out = String::with_capacity(type_name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}
