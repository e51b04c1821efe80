//! Literal `{{ .Secrets.X }}` / `{{ raw .Secrets.X }}` substitution.
//!
//! No other template syntax is supported — this is a string scan, not a template
//! engine, by design.

/// Replace every placeholder in `text` with the UTF-8 (lossy) rendering of the
/// named secret's private bytes. Both `{{ .Secrets.X }}` and
/// `{{ raw .Secrets.X }}` resolve to the same bytes; the `raw` form exists only so
/// manifest authors can mark intent (e.g. "do not shell-escape this"), since this
/// substitution layer makes no distinction between the two at the byte level.
pub fn substitute(text: &str, lookup: impl Fn(&str) -> Option<Vec<u8>>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let Some(end_rel) = rest[start..].find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let whole = &rest[start..start + end_rel + 2];
        let inner = rest[start + 2..start + end_rel].trim();
        let inner = inner.strip_prefix("raw").map(str::trim_start).unwrap_or(inner);

        if let Some(name) = inner.strip_prefix(".Secrets.") {
            let name = name.trim();
            match lookup(name) {
                Some(bytes) => out.push_str(&String::from_utf8_lossy(&bytes)),
                None => out.push_str(whole),
            }
        } else {
            out.push_str(whole);
        }

        rest = &rest[start + end_rel + 2..];
    }
    out.push_str(rest);
    out
}
