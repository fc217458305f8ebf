use serde::{Deserialize, Serialize};

use crate::compiler::cache::CacheSpec;

/// Authorization mode for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    /// API key.
    ApiKey,
    /// IAM signature.
    Iam,
    /// OpenID Connect.
    Oidc,
    /// User-pool groups.
    UserPools {
        /// Allowed groups; empty admits every pool user.
        #[serde(default)]
        groups: Vec<String>,
    },
}

impl AuthMode {
    /// Schema directive for this mode.
    pub fn directive(&self) -> String {
        match self {
            AuthMode::ApiKey => "@aws_api_key".to_string(),
            AuthMode::Iam => "@aws_iam".to_string(),
            AuthMode::Oidc => "@aws_oidc".to_string(),
            AuthMode::UserPools { groups } if groups.is_empty() => {
                "@aws_cognito_user_pools".to_string()
            }
            AuthMode::UserPools { groups } => {
                format!("@aws_cognito_user_pools(cognito_groups: {})", string_list(groups))
            }
        }
    }
}

/// Subscription trigger: the mutations whose results are pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    /// Mutation field names.
    pub mutations: Vec<String>,
}

/// Per-field metadata supplied alongside the resolver program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMetadata {
    /// Authorization modes.
    pub auth: Vec<AuthMode>,
    /// Cache hint.
    pub cache: Option<CacheSpec>,
    /// Subscription trigger.
    pub subscribe: Option<SubscriptionSpec>,
}

impl FieldMetadata {
    /// Schema directives for the field, in a stable order.
    pub fn directives(&self) -> Vec<String> {
        let mut directives: Vec<String> = self.auth.iter().map(AuthMode::directive).collect();
        if let Some(subscribe) = &self.subscribe {
            directives.push(format!(
                "@aws_subscribe(mutations: {})",
                string_list(&subscribe.mutations)
            ));
        }
        directives
    }
}

fn string_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("\"{item}\"")).collect();
    format!("[{}]", quoted.join(", "))
}
