//! Rules that stop a failure from being tracked at all.

use config::TrackingConfig;
use observability::IgnoreReason;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Checked before any context is extracted from the request.
#[derive(Debug, Clone, Default)]
pub struct IgnorePolicy {
    exceptions: HashSet<String>,
    path_prefixes: Vec<String>,
    user_agents: Vec<Regex>
}

impl IgnorePolicy {
    pub fn new(config: &TrackingConfig) -> Self {
        let user_agents = config
            .ignored_user_agents
            .iter()
            .filter_map(|pattern| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid user agent pattern");
                        None
                    }
                }
            })
            .collect();

        Self {
            exceptions: config.ignored_exceptions.iter().cloned().collect(),
            path_prefixes: config
                .ignore_paths
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            user_agents
        }
    }

    pub fn ignores_exception(&self, exception_class: &str) -> bool {
        self.exceptions.contains(exception_class)
    }

    pub fn ignores_path(&self, path: &str) -> bool {
        self.path_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn ignores_user_agent(&self, user_agent: &str) -> bool {
        self.user_agents.iter().any(|re| re.is_match(user_agent))
    }

    /// First rule that matches, if any.
    pub fn check(
        &self,
        exception_class: &str,
        path: Option<&str>,
        user_agent: Option<&str>
    ) -> Option<IgnoreReason> {
        if self.ignores_exception(exception_class) {
            return Some(IgnoreReason::ExceptionClass);
        }
        if path.is_some_and(|p| self.ignores_path(p)) {
            return Some(IgnoreReason::Path);
        }
        if user_agent.is_some_and(|ua| self.ignores_user_agent(ua)) {
            return Some(IgnoreReason::UserAgent);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> IgnorePolicy {
        IgnorePolicy::new(&TrackingConfig {
            ignored_exceptions: vec!["shop::errors::RoutingError".to_string()],
            ignore_paths: vec!["/health".to_string(), "/assets/".to_string()],
            ignored_user_agents: vec!["googlebot".to_string(), "^curl/".to_string()],
            ..TrackingConfig::default()
        })
    }

    #[test]
    fn test_ignores_configured_exceptions() {
        assert_eq!(
            policy().check("shop::errors::RoutingError", None, None),
            Some(IgnoreReason::ExceptionClass)
        );
    }

    #[test]
    fn test_ignores_path_prefixes() {
        let policy = policy();
        assert_eq!(
            policy.check("RuntimeError", Some("/health/live"), None),
            Some(IgnoreReason::Path)
        );
        assert_eq!(
            policy.check("RuntimeError", Some("/assets/app.js"), None),
            Some(IgnoreReason::Path)
        );
        assert_eq!(policy.check("RuntimeError", Some("/orders"), None), None);
    }

    #[test]
    fn test_ignores_user_agents_case_insensitively() {
        let policy = policy();
        assert_eq!(
            policy.check(
                "RuntimeError",
                Some("/orders"),
                Some("Mozilla/5.0 (compatible; Googlebot/2.1)")
            ),
            Some(IgnoreReason::UserAgent)
        );
        assert_eq!(
            policy.check("RuntimeError", None, Some("curl/8.4.0")),
            Some(IgnoreReason::UserAgent)
        );
        assert_eq!(
            policy.check("RuntimeError", Some("/orders"), Some("Mozilla/5.0 (Macintosh)")),
            None
        );
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let policy = IgnorePolicy::new(&TrackingConfig {
            ignored_user_agents: vec!["(unclosed".to_string(), "bot".to_string()],
            ..TrackingConfig::default()
        });
        assert!(policy.ignores_user_agent("SomeBot/1.0"));
    }
}
