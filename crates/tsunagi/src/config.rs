//! Engine configuration.

use serde::{Deserialize, Serialize};

/// How the fork combinator waits for its two branches.
///
/// # Examples
///
/// ```
/// use tsunagi::JoinPolicy;
///
/// assert_eq!(JoinPolicy::default(), JoinPolicy::AwaitAll);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Wait for both branches to finish, even after one has failed.
    ///
    /// The first branch's failure takes precedence over the second's.
    #[default]
    AwaitAll,
    /// As soon as either branch fails, abort the other and return that
    /// failure. The aborted branch is awaited until it has stopped.
    FailFast,
}

/// Configuration shared by a workflow and the flows it spawns.
///
/// Deserializes from any serde format; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use tsunagi::{JoinPolicy, WorkflowConfig};
///
/// let config = WorkflowConfig::default().with_join_policy(JoinPolicy::FailFast);
/// assert_eq!(config.join_policy, JoinPolicy::FailFast);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Join behavior of the fork combinator. Default: [`JoinPolicy::AwaitAll`].
    pub join_policy: JoinPolicy,
}

impl WorkflowConfig {
    /// Sets the join policy.
    pub fn with_join_policy(mut self, join_policy: JoinPolicy) -> Self {
        self.join_policy = join_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.join_policy, JoinPolicy::AwaitAll);
    }

    #[test]
    fn test_deserialize_config() {
        let config: WorkflowConfig =
            serde_json::from_str(r#"{ "join_policy": "fail_fast" }"#).unwrap();
        assert_eq!(config.join_policy, JoinPolicy::FailFast);

        let config: WorkflowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, WorkflowConfig::default());
    }

    #[test]
    fn test_serialize_policy() {
        let json = serde_json::to_string(&JoinPolicy::AwaitAll).unwrap();
        assert_eq!(json, r#""await_all""#);
    }
}
