//! Per-resolver caching configuration.

use serde::{Deserialize, Serialize};

const ARGUMENTS: &str = "$context.arguments.";
const IDENTITY_ROOTS: [&str; 2] = ["$context.identity", "$ctx.identity"];

/// Cache hint as authored: a TTL and unqualified key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Time to live in seconds.
    pub ttl: u32,
    /// Argument names or identity paths.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Cache configuration attached to a compiled resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachingConfig {
    /// Time to live in seconds.
    pub ttl: u32,
    /// Fully-qualified caching keys.
    pub caching_keys: Vec<String>,
}

/// Qualify one key: identity paths pass through, everything else becomes an
/// argument reference.
pub fn qualify_key(key: &str) -> String {
    if key.starts_with(ARGUMENTS) || IDENTITY_ROOTS.iter().any(|root| key.starts_with(root)) {
        key.to_string()
    } else {
        format!("{ARGUMENTS}{key}")
    }
}

impl CacheSpec {
    /// Qualified configuration for this hint.
    pub fn resolve(&self) -> CachingConfig {
        CachingConfig {
            ttl: self.ttl,
            caching_keys: self.keys.iter().map(|key| qualify_key(key)).collect(),
        }
    }
}

/// Caching for a field; the API-level override wins over the field's hint.
pub fn caching_for(
    field: Option<&CacheSpec>,
    api_override: Option<&CacheSpec>,
) -> Option<CachingConfig> {
    api_override.or(field).map(CacheSpec::resolve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_qualified() {
        assert_eq!(qualify_key("id"), "$context.arguments.id");
        assert_eq!(qualify_key("$context.identity.sub"), "$context.identity.sub");
        assert_eq!(qualify_key("$ctx.identity.username"), "$ctx.identity.username");
        assert_eq!(qualify_key("$context.arguments.id"), "$context.arguments.id");
    }

    #[test]
    fn override_takes_precedence() {
        let field = CacheSpec {
            ttl: 60,
            keys: vec!["id".into()],
        };
        let api = CacheSpec {
            ttl: 5,
            keys: vec!["$context.identity.sub".into()],
        };
        let config = caching_for(Some(&field), Some(&api)).unwrap();
        assert_eq!(config.ttl, 5);
        assert_eq!(config.caching_keys, vec!["$context.identity.sub"]);
        assert_eq!(caching_for(Some(&field), None).unwrap().ttl, 60);
        assert!(caching_for(None, None).is_none());
    }
}
