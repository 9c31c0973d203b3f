//! Environment overrides for connection settings.
//!
//! Secrets are not handled here; see [`crate::secrets`].

use crate::types::{GraphConfig, TicketwiseConfig, TrackerConfig};

/// Tracker instance URL.
pub const JIRA_INSTANCE_URL: &str = "JIRA_INSTANCE_URL";
/// Tracker account name.
pub const JIRA_USERNAME: &str = "JIRA_USERNAME";
/// Relationship-store toggle.
pub const GRAPH_DB_ENABLED: &str = "GRAPH_DB_ENABLED";
/// Relationship-store URI.
pub const NEO4J_URI: &str = "NEO4J_URI";
/// Relationship-store account name.
pub const NEO4J_USERNAME: &str = "NEO4J_USERNAME";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut TicketwiseConfig) {
    apply_overrides_with(config, |var| std::env::var(var).ok());
}

/// Apply overrides using an explicit lookup. Empty values are ignored.
pub fn apply_overrides_with(config: &mut TicketwiseConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    let url = get(JIRA_INSTANCE_URL);
    let username = get(JIRA_USERNAME);
    if url.is_some() || username.is_some() {
        let tracker = config.tracker.get_or_insert_with(TrackerConfig::default);
        if url.is_some() {
            tracker.url = url;
        }
        if username.is_some() {
            tracker.username = username;
        }
    }

    let enabled = get(GRAPH_DB_ENABLED).map(|v| parse_toggle(&v));
    let uri = get(NEO4J_URI);
    let graph_user = get(NEO4J_USERNAME);
    if enabled.is_some() || uri.is_some() || graph_user.is_some() {
        let graph = config.graph.get_or_insert_with(GraphConfig::default);
        if let Some(enabled) = enabled {
            graph.enabled = enabled;
        }
        if let Some(uri) = uri {
            graph.uri = uri;
        }
        if let Some(user) = graph_user {
            graph.username = user;
        }
    }
}

/// Only an explicit "true"/"1"/"yes"/"on" enables.
fn parse_toggle(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_no_env_leaves_config_untouched() {
        let mut config = TicketwiseConfig::new();
        apply_overrides_with(&mut config, lookup(&[]));
        assert_eq!(config, TicketwiseConfig::new());
    }

    #[test]
    fn test_tracker_overrides() {
        let mut config = TicketwiseConfig::from_toml(
            r#"
[tracker]
url = "https://old.example.com"
default_project = "OPS"
"#,
        )
        .unwrap();
        apply_overrides_with(
            &mut config,
            lookup(&[
                ("JIRA_INSTANCE_URL", "https://acme.atlassian.net"),
                ("JIRA_USERNAME", "me@acme.io"),
            ]),
        );

        let tracker = config.tracker();
        assert_eq!(tracker.url.as_deref(), Some("https://acme.atlassian.net"));
        assert_eq!(tracker.username.as_deref(), Some("me@acme.io"));
        assert_eq!(tracker.default_project.as_deref(), Some("OPS"));
    }

    #[test]
    fn test_graph_toggle() {
        let mut config = TicketwiseConfig::new();
        apply_overrides_with(&mut config, lookup(&[("GRAPH_DB_ENABLED", "False")]));
        assert!(!config.graph().enabled);

        apply_overrides_with(
            &mut config,
            lookup(&[("GRAPH_DB_ENABLED", "TRUE"), ("NEO4J_URI", "bolt://graph:7687")]),
        );
        assert!(config.graph().enabled);
        assert_eq!(config.graph().uri, "bolt://graph:7687");
    }

    #[test]
    fn test_blank_values_ignored() {
        let mut config = TicketwiseConfig::new();
        apply_overrides_with(&mut config, lookup(&[("NEO4J_URI", "  ")]));
        assert!(config.graph.is_none());
    }
}
