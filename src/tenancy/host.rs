use crate::config::normalize_root_domain;

/// DNS caps a single label at 63 octets.
const MAX_LABEL_LEN: usize = 63;

/// How an incoming `Host` header relates to the platform's root domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClass {
    Root,
    WwwAlias,
    Tenant(String),
    Malformed,
}

impl HostClass {
    pub fn tenant(&self) -> Option<&str> {
        match self {
            HostClass::Tenant(slug) => Some(slug),
            _ => None,
        }
    }
}

/// Classifies `host_header` against `root_domain`.
///
/// Total over every input: an unusable root domain makes every host `Root`,
/// and anything that is not exactly one slug-shaped label in front of the root
/// domain is never reported as a tenant.
pub fn classify(host_header: &str, root_domain: &str) -> HostClass {
    let Some(root) = normalize_root_domain(root_domain) else {
        return HostClass::Root;
    };
    let root = strip_port(&root);
    let host = strip_port(host_header.trim())
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if host == root {
        return HostClass::Root;
    }

    let suffix = format!(".{}", root);
    let Some(candidate) = host.strip_suffix(suffix.as_str()) else {
        return HostClass::Root;
    };

    if candidate == "www" {
        return HostClass::WwwAlias;
    }
    if candidate.starts_with('_') {
        return HostClass::Root;
    }
    if is_slug_label(candidate) {
        HostClass::Tenant(candidate.to_string())
    } else {
        HostClass::Malformed
    }
}

fn is_slug_label(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_LABEL_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Drops a trailing `:port`. Bracketed IPv6 literals keep their colons.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
