//! Shared types and constants for the Waymark platform.
//!
//! This crate provides the foundational types used across all Waymark
//! crates: post and topic classification enums, the persisted tracked-post
//! record, and the closed enumeration of administrable group attributes.
//! It sits at the bottom of the workspace graph and depends on nothing
//! internal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Post classification, stored as an integer in the `posts` table.
///
/// Only [`Regular`](PostType::Regular) and
/// [`ModeratorAction`](PostType::ModeratorAction) posts can ever be
/// tracked; the remaining variants exist so imported forum data keeps its
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i64)]
pub enum PostType {
    /// An ordinary reply written by a participant.
    Regular = 1,
    /// A post generated by a moderator action (close, archive, ...).
    ModeratorAction = 2,
    /// A small informational action entry (e.g. "split this topic").
    SmallAction = 3,
    /// A staff-only whisper, invisible to regular participants.
    Whisper = 4,
}

impl PostType {
    /// Returns the numeric code stored in the database.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Attempts to convert a stored numeric code to a `PostType`.
    ///
    /// Returns `None` if the code does not correspond to a known type.
    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Regular),
            2 => Some(Self::ModeratorAction),
            3 => Some(Self::SmallAction),
            4 => Some(Self::Whisper),
            _ => None,
        }
    }
}

/// Topic archetype, stored as text in the `topics` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// A public discussion topic.
    #[serde(rename = "regular")]
    Regular,
    /// A private message thread. Never tracked.
    #[serde(rename = "private_message")]
    PrivateMessage,
}

impl Archetype {
    /// Returns the canonical string label for this archetype.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::PrivateMessage => "private_message",
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Archetype {
    type Err = ParseArchetypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Self::Regular),
            "private_message" => Ok(Self::PrivateMessage),
            _ => Err(ParseArchetypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown archetype string.
#[derive(Debug, Clone, Error)]
#[error("unknown archetype: {0}")]
pub struct ParseArchetypeError(pub String);

/// The denormalized tracked-post record attached to topics and posts.
///
/// On a topic it names the *first* tracked post of that topic; on a post it
/// names the *next* tracked post after it in the same topic. The serialized
/// shape is a compatibility contract with existing consumers: a JSON object
/// with exactly the two fields `group` (the group's stable name, not its
/// id) and `post_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPost {
    /// Stable name of the group the referenced post's author belongs to.
    pub group: String,
    /// Post number of the referenced post within its topic.
    pub post_number: i64,
}

impl TrackedPost {
    /// Serializes the record to its stored JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a stored JSON value back into a record.
    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

/// The closed set of per-group attributes an administrator can update.
///
/// Instead of one handler per attribute, the admin surface is a single
/// generic update parameterized by this enum: each variant knows its
/// `groups` column, whether it holds a flag or an optional text value, and
/// whether changing it requires recomputing tracked posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAttribute {
    /// Whether posts by this group's members are tracked at all.
    TrackPosts,
    /// Whether this group monopolizes tracking in topics it touches.
    TrackPostsWithPriority,
    /// Whether the group is offered in the navigation bar.
    AddToNavigationBar,
    /// Icon reference shown next to tracked posts of this group.
    TrackedPostIcon,
}

impl GroupAttribute {
    /// All attributes, in the order they are exposed on the admin surface.
    pub const ALL: [GroupAttribute; 4] = [
        Self::TrackPosts,
        Self::TrackPostsWithPriority,
        Self::AddToNavigationBar,
        Self::TrackedPostIcon,
    ];

    /// Returns the attribute's canonical name, which is also its column in
    /// the `groups` table and its path segment on the admin surface.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrackPosts => "track_posts",
            Self::TrackPostsWithPriority => "track_posts_with_priority",
            Self::AddToNavigationBar => "add_to_navigation_bar",
            Self::TrackedPostIcon => "tracked_post_icon",
        }
    }

    /// Whether the attribute holds a boolean flag (as opposed to an
    /// optional text value).
    pub fn is_flag(self) -> bool {
        !matches!(self, Self::TrackedPostIcon)
    }

    /// Whether changing this attribute invalidates tracked-post state and
    /// therefore requires a full reconciliation.
    pub fn triggers_reconcile(self) -> bool {
        matches!(self, Self::TrackPosts | Self::TrackPostsWithPriority)
    }
}

impl std::fmt::Display for GroupAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupAttribute {
    type Err = ParseGroupAttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track_posts" => Ok(Self::TrackPosts),
            "track_posts_with_priority" => Ok(Self::TrackPostsWithPriority),
            "add_to_navigation_bar" => Ok(Self::AddToNavigationBar),
            "tracked_post_icon" => Ok(Self::TrackedPostIcon),
            _ => Err(ParseGroupAttributeError(s.to_string())),
        }
    }
}

/// A value assignable to a [`GroupAttribute`].
///
/// Flag attributes take booleans; the icon attribute takes a string or
/// `null` to unset it. The untagged representation lets admin payloads say
/// `{"value": true}` or `{"value": "compass"}` without a discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupAttributeValue {
    /// Boolean value for flag attributes.
    Flag(bool),
    /// Optional text value for the icon attribute.
    Text(Option<String>),
}

impl GroupAttributeValue {
    /// Whether this value's kind matches the given attribute.
    pub fn fits(&self, attribute: GroupAttribute) -> bool {
        match self {
            Self::Flag(_) => attribute.is_flag(),
            Self::Text(_) => !attribute.is_flag(),
        }
    }
}

/// Error returned when parsing an unknown group attribute name.
#[derive(Debug, Clone, Error)]
#[error("unknown group attribute: {0}")]
pub struct ParseGroupAttributeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn post_type_round_trip() {
        for pt in [
            PostType::Regular,
            PostType::ModeratorAction,
            PostType::SmallAction,
            PostType::Whisper,
        ] {
            assert_eq!(PostType::from_i64(pt.as_i64()), Some(pt));
        }
    }

    #[test]
    fn post_type_invalid() {
        assert_eq!(PostType::from_i64(0), None);
        assert_eq!(PostType::from_i64(5), None);
        assert_eq!(PostType::from_i64(-1), None);
    }

    #[test]
    fn archetype_round_trip() {
        for a in [Archetype::Regular, Archetype::PrivateMessage] {
            assert_eq!(Archetype::from_str(a.as_str()).unwrap(), a);
        }
        assert!(Archetype::from_str("banner").is_err());
    }

    #[test]
    fn tracked_post_wire_shape() {
        let record = TrackedPost {
            group: "support".to_string(),
            post_number: 3,
        };

        let json = record.to_json().unwrap();
        assert_eq!(json, r#"{"group":"support","post_number":3}"#);

        let parsed = TrackedPost::from_json(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn group_attribute_names_round_trip() {
        for attr in GroupAttribute::ALL {
            assert_eq!(GroupAttribute::from_str(attr.as_str()).unwrap(), attr);
        }
        assert!(GroupAttribute::from_str("flair_color").is_err());
    }

    #[test]
    fn group_attribute_reconcile_table() {
        assert!(GroupAttribute::TrackPosts.triggers_reconcile());
        assert!(GroupAttribute::TrackPostsWithPriority.triggers_reconcile());
        assert!(!GroupAttribute::AddToNavigationBar.triggers_reconcile());
        assert!(!GroupAttribute::TrackedPostIcon.triggers_reconcile());
    }

    #[test]
    fn group_attribute_value_kinds() {
        assert!(GroupAttribute::TrackPosts.is_flag());
        assert!(GroupAttribute::TrackPostsWithPriority.is_flag());
        assert!(GroupAttribute::AddToNavigationBar.is_flag());
        assert!(!GroupAttribute::TrackedPostIcon.is_flag());
    }

    #[test]
    fn group_attribute_value_parsing_and_fit() {
        let flag: GroupAttributeValue = serde_json::from_str("true").unwrap();
        assert_eq!(flag, GroupAttributeValue::Flag(true));
        assert!(flag.fits(GroupAttribute::TrackPosts));
        assert!(!flag.fits(GroupAttribute::TrackedPostIcon));

        let text: GroupAttributeValue = serde_json::from_str(r#""compass""#).unwrap();
        assert_eq!(text, GroupAttributeValue::Text(Some("compass".to_string())));
        assert!(text.fits(GroupAttribute::TrackedPostIcon));

        let unset: GroupAttributeValue = serde_json::from_str("null").unwrap();
        assert_eq!(unset, GroupAttributeValue::Text(None));
        assert!(unset.fits(GroupAttribute::TrackedPostIcon));
        assert!(!unset.fits(GroupAttribute::AddToNavigationBar));
    }
}
