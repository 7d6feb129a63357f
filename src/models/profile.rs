//! Profile and relationship models
//!
//! Data returned by the profile and social graph services.

use serde::{Deserialize, Serialize};

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub workout_count: u64,
}

impl Profile {
    /// Creates a profile with empty optional fields and zeroed counters.
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user_id: user_id.into(),
            display_name: username.clone(),
            username,
            avatar_url: None,
            bio: None,
            follower_count: 0,
            following_count: 0,
            workout_count: 0,
        }
    }
}

/// Relationship between two users, seen from the first one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    /// The viewer follows the target
    pub is_following: bool,
    /// The target follows the viewer
    pub is_followed_by: bool,
    /// The viewer has blocked the target
    pub is_blocked: bool,
}

impl RelationshipStatus {
    pub fn is_mutual(&self) -> bool {
        self.is_following && self.is_followed_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_new_defaults() {
        let profile = Profile::new("u1", "runner");
        assert_eq!(profile.display_name, "runner");
        assert_eq!(profile.follower_count, 0);
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn test_relationship_mutual() {
        let status = RelationshipStatus {
            is_following: true,
            is_followed_by: true,
            is_blocked: false,
        };
        assert!(status.is_mutual());
        assert!(!RelationshipStatus::default().is_mutual());
    }

    #[test]
    fn test_profile_serialization() {
        let profile = Profile::new("u1", "runner");
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["follower_count"], 0);
    }
}
