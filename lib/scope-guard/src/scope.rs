use std::fmt;

use ahash::HashSet;

use crate::{arguments::ScopeValue, error::ConfigurationError, policy::AccessPolicy};

/// An entity kind a value is checked against, e.g. "this id is a `User` id".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeTarget(String);

impl ScopeTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names one of possibly several policies for the same scope target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule(String);

impl Rule {
    pub fn new(rule: impl Into<String>) -> Self {
        Rule(rule.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered entity kinds. A [`ScopeTarget`] can only be obtained through
/// [`ScopeTargetRegistry::resolve`].
#[derive(Debug, Default)]
pub struct ScopeTargetRegistry {
    targets: HashSet<String>,
}

impl ScopeTargetRegistry {
    pub fn new(targets: impl IntoIterator<Item = String>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains(target)
    }

    pub fn resolve(&self, target: &str, site: &str) -> Result<ScopeTarget, ConfigurationError> {
        if self.contains(target) {
            Ok(ScopeTarget(target.to_string()))
        } else {
            Err(ConfigurationError::UnknownScopeTarget {
                target: target.to_string(),
                site: site.to_string(),
            })
        }
    }
}

/// Runs the access policy over extracted values.
pub struct ScopeEvaluator<'a, P: AccessPolicy> {
    policy: &'a P,
    principal: &'a P::Principal,
}

impl<'a, P: AccessPolicy> ScopeEvaluator<'a, P> {
    pub fn new(policy: &'a P, principal: &'a P::Principal) -> Self {
        Self { policy, principal }
    }

    /// Calls the policy once per extracted scalar. All of them must pass,
    /// evaluation stops at the first refusal.
    pub async fn check(&self, target: &ScopeTarget, rule: &Rule, value: &ScopeValue) -> bool {
        for (field, leaf) in value.entries() {
            if !self
                .policy
                .has_access(self.principal, target, field, leaf, rule)
                .await
            {
                tracing::debug!(
                    scope_target = %target,
                    rule = %rule,
                    field,
                    value = %leaf,
                    "scope check refused"
                );
                return false;
            }
        }

        true
    }
}
