use serde::{Deserialize, Serialize};

/// Membership test applied to a tag's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagOperator {
    In,
    NotIn,
}

/// One predicate over resource tags; several filters combine as a conjunction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: String,
    pub operator: TagOperator,
    pub values: Vec<String>,
}

/// A tag name and its distinct values within a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDetails {
    #[serde(rename = "tagName")]
    pub tag_name: String,
    pub values: Vec<Option<String>>,
}
