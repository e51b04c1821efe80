//! Directional TLS allow-list evaluation.
//!
//! Default-open wherever the manifest is silent: no config at all, or no policy
//! entries for the target marble. This is a deliberate migration aid, not an
//! oversight — it lets a manifest add TLS policy incrementally without breaking
//! marbles it hasn't gotten to yet.

use manifest::{TlsConfig, TlsPolicy};

pub fn is_allowed(
    config: &TlsConfig,
    from_marble: &str,
    to_marble: &str,
    port: &str,
    incoming: bool,
) -> bool {
    let directional = if incoming { &config.incoming } else { &config.outgoing };

    let Some(policies) = directional.get(to_marble) else {
        return true;
    };

    let matching: Vec<&TlsPolicy> = policies
        .iter()
        .filter(|p| p.port == port || p.port == "*")
        .collect();

    if matching.is_empty() {
        return false;
    }

    matching.iter().any(|policy| {
        policy.allowed_marbles.is_empty()
            || policy
                .allowed_marbles
                .iter()
                .any(|m| m == from_marble || m == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_policy_config_allows_everything() {
        let config = TlsConfig::default();
        assert!(is_allowed(&config, "a", "b", "443", true));
    }

    #[test]
    fn no_policy_for_target_marble_is_default_open() {
        let mut config = TlsConfig::default();
        config.incoming.insert("other".into(), vec![]);
        assert!(is_allowed(&config, "a", "b", "443", true));
    }

    #[test]
    fn explicit_policy_denies_unlisted_caller() {
        let mut config = TlsConfig::default();
        config.incoming.insert(
            "b".into(),
            vec![TlsPolicy {
                port: "443".into(),
                allowed_marbles: vec!["c".into()],
            }],
        );
        assert!(!is_allowed(&config, "a", "b", "443", true));
        assert!(is_allowed(&config, "c", "b", "443", true));
    }

    #[test]
    fn empty_allowed_marbles_allows_all_for_that_policy() {
        let mut config = TlsConfig::default();
        config.outgoing.insert(
            "b".into(),
            vec![TlsPolicy {
                port: "*".into(),
                allowed_marbles: vec![],
            }],
        );
        assert!(is_allowed(&config, "anything", "b", "8080", false));
    }
}
