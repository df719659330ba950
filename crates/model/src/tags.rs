use crate::ParseError;
use crate::event::{LifecycleEvent, decode_nested};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

pub type TagSet = BTreeMap<String, String>;

/// Tags to apply and tags to drop when a tag-bearing resource changes.
///
/// A key present in both old and new tags is always added, which overwrites
/// its value, and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDelta {
    pub tags_to_be_added: TagSet,
    pub tags_to_be_removed: TagSet,
}

impl TagDelta {
    pub fn compute(new_tags: TagSet, old_tags: Option<&TagSet>) -> Self {
        let tags_to_be_removed: TagSet = old_tags
            .into_iter()
            .flatten()
            .filter(|(key, _)| !new_tags.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        TagDelta {
            tags_to_be_added: new_tags,
            tags_to_be_removed,
        }
    }

    /// `None` when the resource carries no `Tags` property.
    pub fn from_event(event: &LifecycleEvent) -> Result<Option<Self>, ParseError> {
        let Some(new_tags) = event.resource_properties.tags.as_ref() else {
            return Ok(None);
        };
        let new_tags: TagSet = parse_tags(new_tags)?;

        let old_tags: Option<TagSet> = event
            .old_resource_properties
            .as_ref()
            .and_then(|properties| properties.tags.as_ref())
            .map(parse_tags)
            .transpose()?;

        Ok(Some(TagDelta::compute(new_tags, old_tags.as_ref())))
    }

    pub fn is_empty(&self) -> bool {
        self.tags_to_be_added.is_empty() && self.tags_to_be_removed.is_empty()
    }
}

/// Later entries win when a key is repeated.
pub fn parse_tags(value: &Value) -> Result<TagSet, ParseError> {
    let tags: Vec<Tag> = decode_nested("Tags", value)?;

    Ok(tags.into_iter().map(|tag| (tag.key, tag.value)).collect())
}
