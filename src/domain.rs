/// Turns whatever Cold Turkey recorded as a domain into a lowercase hostname.
///
/// Cold Turkey stores hosts without a scheme and sometimes with a path attached, so both
/// `Example.com/watch` and `https://example.com:443/` end up as `example.com`. Returns an empty
/// string when nothing resembling a host is left. Never panics, and normalizing an already
/// normalized value returns it unchanged.
pub fn normalize_domain(raw: &str) -> String {
    let candidate = strip_scheme(raw.trim());

    let host = candidate
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    let host = match host.rfind('@') {
        Some(index) => &host[index + 1..],
        None => host,
    };

    let Some(host) = strip_port(host) else {
        return String::new();
    };

    host.to_lowercase().trim().to_string()
}

/// Removes `scheme://` or a bare `//`. Anything else is treated as host + path.
fn strip_scheme(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix("//") {
        return rest;
    }
    let Some((scheme, rest)) = value.split_once("://") else {
        return value;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid_scheme {
        rest
    } else {
        value
    }
}

/// Removes a `:port` suffix. Bracketed IPv6 literals are kept as is, unbalanced brackets can't
/// be a host.
fn strip_port(host: &str) -> Option<&str> {
    if host.starts_with('[') {
        let end = host.find(']')?;
        return Some(&host[..=end]);
    }
    if host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host.split(':').next().unwrap_or_default())
}
