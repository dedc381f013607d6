//! Operator configuration shared by the controllers

use std::collections::BTreeMap;

use camel_common::OPERATOR_ID_ANNOTATION;

/// Identity and scope of a running operator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Operator id; resources annotated with another id are ignored
    pub operator_id: Option<String>,
    /// Namespace the operator runs in, home of the global platform
    pub operator_namespace: String,
    /// Namespace to watch; empty watches the whole cluster
    pub watch_namespace: String,
}

impl OperatorConfig {
    /// Config for an operator running in `operator_namespace`
    pub fn new(operator_namespace: impl Into<String>) -> Self {
        Self {
            operator_namespace: operator_namespace.into(),
            ..Default::default()
        }
    }

    /// Set the operator id
    pub fn with_operator_id(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    /// Restrict the watch to one namespace
    pub fn with_watch_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.watch_namespace = namespace.into();
        self
    }

    /// True when the operator watches every namespace
    pub fn is_global(&self) -> bool {
        self.watch_namespace.is_empty()
    }

    /// Whether a resource with these annotations belongs to this operator.
    ///
    /// Unannotated resources belong to every operator; annotated ones only to
    /// the operator with the same id.
    pub fn is_responsible_for(&self, annotations: Option<&BTreeMap<String, String>>) -> bool {
        match annotations.and_then(|a| a.get(OPERATOR_ID_ANNOTATION)) {
            None => true,
            Some(id) => self.operator_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_watch_namespace_is_global() {
        let config = OperatorConfig::new("camel-k");
        assert!(config.is_global());
        assert!(!config.with_watch_namespace("team-a").is_global());
    }

    /// Story: two operators share a cluster and split the integrations by id
    #[test]
    fn story_operator_id_selects_resources() {
        let config = OperatorConfig::new("camel-k").with_operator_id("camel-k-2");
        let ours = BTreeMap::from([(OPERATOR_ID_ANNOTATION.to_string(), "camel-k-2".to_string())]);
        let theirs = BTreeMap::from([(OPERATOR_ID_ANNOTATION.to_string(), "camel-k".to_string())]);

        assert!(config.is_responsible_for(None));
        assert!(config.is_responsible_for(Some(&ours)));
        assert!(!config.is_responsible_for(Some(&theirs)));

        let anonymous = OperatorConfig::new("camel-k").with_operator_id("");
        assert_eq!(anonymous.operator_id, None);
        assert!(!anonymous.is_responsible_for(Some(&ours)));
    }
}
