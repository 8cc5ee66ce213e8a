use irrigation_types::Priority;

/// C8's output: what priority a request should enter the pipeline at, how
/// long it's expected to take, and whether it needs an authenticated
/// session.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub priority: Priority,
    pub estimated_ms: u32,
    pub requires_auth: bool,
    pub is_emergency: bool,
    pub reason: &'static str,
}

/// URI-pattern-first classification with a method-based fallback. Patterns
/// are tried in order; the first match wins.
pub fn classify(method: &str, uri: &str) -> Classification {
    let rule = URI_RULES
        .iter()
        .find(|rule| (rule.matches)(uri))
        .map(|rule| (rule.priority, rule.estimated_ms, rule.reason, rule.requires_auth));

    let (priority, estimated_ms, reason, requires_auth) = match rule {
        Some(found) => found,
        None => method_fallback(method),
    };

    Classification {
        priority,
        estimated_ms,
        requires_auth,
        is_emergency: priority == Priority::Emergency,
        reason,
    }
}

struct UriRule {
    matches: fn(&str) -> bool,
    priority: Priority,
    estimated_ms: u32,
    requires_auth: bool,
    reason: &'static str,
}

const STATIC_EXTENSIONS: [&str; 6] = [".css", ".js", ".html", ".png", ".jpg", ".ico"];

const URI_RULES: &[UriRule] = &[
    UriRule {
        matches: |u| u.contains("/api/emergency") || u.contains("/emergency-stop"),
        priority: Priority::Emergency,
        estimated_ms: 50,
        requires_auth: true,
        reason: "emergency endpoint",
    },
    UriRule {
        matches: |u| u.contains("/api/io/points") && u.ends_with("/set"),
        priority: Priority::IoCritical,
        estimated_ms: 100,
        requires_auth: true,
        reason: "io point set",
    },
    UriRule {
        matches: |u| u.contains("/api/irrigation/zones") && u.ends_with("/activate"),
        priority: Priority::IoCritical,
        estimated_ms: 200,
        requires_auth: true,
        reason: "zone activation",
    },
    UriRule {
        matches: |u| u.contains("/api/auth/"),
        priority: Priority::Authentication,
        estimated_ms: 500,
        requires_auth: false,
        reason: "auth endpoint",
    },
    UriRule {
        matches: |u| u.contains("/api/status") || u.contains("/api/dashboard"),
        priority: Priority::UiCritical,
        estimated_ms: 300,
        requires_auth: true,
        reason: "dashboard/status endpoint",
    },
    UriRule {
        matches: |u| u.contains("/api/io/points"),
        priority: Priority::UiCritical,
        estimated_ms: 200,
        requires_auth: true,
        reason: "io point read",
    },
    UriRule {
        matches: |u| u.contains("/api/logs") || u.contains("/api/statistics"),
        priority: Priority::Background,
        estimated_ms: 2000,
        requires_auth: true,
        reason: "logs/statistics endpoint",
    },
    UriRule {
        matches: |u| STATIC_EXTENSIONS.iter().any(|ext| u.ends_with(ext)),
        priority: Priority::Normal,
        estimated_ms: 100,
        requires_auth: false,
        reason: "static asset",
    },
];

fn method_fallback(method: &str) -> (Priority, u32, &'static str, bool) {
    match method {
        "POST" => (Priority::UiCritical, 800, "post fallback", true),
        "PUT" => (Priority::UiCritical, 600, "put fallback", true),
        "DELETE" => (Priority::Normal, 400, "delete fallback", true),
        "GET" => (Priority::Normal, 300, "get fallback", true),
        _ => (Priority::Normal, 1000, "unrecognized method fallback", true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_stop_classifies_as_emergency() {
        let c = classify("POST", "/emergency-stop");
        assert_eq!(c.priority, Priority::Emergency);
        assert!(c.is_emergency);
    }

    #[test]
    fn point_set_is_io_critical() {
        let c = classify("POST", "/api/io/points/R0/set");
        assert_eq!(c.priority, Priority::IoCritical);
    }

    #[test]
    fn point_read_without_set_is_ui_critical() {
        let c = classify("GET", "/api/io/points");
        assert_eq!(c.priority, Priority::UiCritical);
    }

    #[test]
    fn auth_endpoint_is_authentication_priority() {
        let c = classify("POST", "/api/auth/login");
        assert_eq!(c.priority, Priority::Authentication);
    }

    #[test]
    fn static_asset_is_normal() {
        let c = classify("GET", "/dashboard/app.js");
        assert_eq!(c.priority, Priority::Normal);
    }

    #[test]
    fn unmatched_post_falls_back_to_ui_critical() {
        let c = classify("POST", "/api/unused/thing");
        assert_eq!(c.priority, Priority::UiCritical);
        assert_eq!(c.estimated_ms, 800);
    }
}
