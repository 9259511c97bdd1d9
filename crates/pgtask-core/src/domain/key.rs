//! QueueKey - the only datum carried across the work queue boundary.

use std::fmt;
use std::str::FromStr;

use super::TaskResource;
use super::errors::KeyError;

/// `namespace/name` identity of a task resource.
///
/// Keys carry no payload. A worker re-fetches the live resource by key, so a
/// key only says "look at this resource again".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    namespace: String,
    name: String,
}

impl QueueKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, KeyError> {
        let namespace = namespace.into();
        let name = name.into();
        validate_segment("namespace", &namespace)?;
        validate_segment("name", &name)?;
        Ok(Self { namespace, name })
    }

    /// Derive the key of a resource notification.
    pub fn for_resource(task: &TaskResource) -> Result<Self, KeyError> {
        Self::new(task.namespace.as_str(), task.name.as_str())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn validate_segment(field: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty(field));
    }
    if value.contains('/') {
        return Err(KeyError::Separator(field, value.to_string()));
    }
    Ok(())
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for QueueKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s
            .split_once('/')
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        Self::new(namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use rstest::rstest;

    #[test]
    fn key_for_resource_is_namespace_slash_name() {
        let task = TaskResource::new("ns1", "taskA", TaskType::Failover);
        let key = QueueKey::for_resource(&task).unwrap();
        assert_eq!(key.to_string(), "ns1/taskA");
        assert_eq!(key.namespace(), "ns1");
        assert_eq!(key.name(), "taskA");
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let key: QueueKey = "ns1/taskA".parse().unwrap();
        assert_eq!(key, QueueKey::new("ns1", "taskA").unwrap());
    }

    #[rstest]
    #[case("no-separator")]
    #[case("/taskA")]
    #[case("ns1/")]
    #[case("ns1/a/b")]
    fn rejects_malformed_keys(#[case] raw: &str) {
        assert!(raw.parse::<QueueKey>().is_err());
    }

    #[test]
    fn resource_without_namespace_has_no_key() {
        let task = TaskResource::new("", "taskA", TaskType::Failover);
        assert!(matches!(
            QueueKey::for_resource(&task),
            Err(KeyError::Empty("namespace"))
        ));
    }
}
