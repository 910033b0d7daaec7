// Row types for the seven relations: profiles, ideas, votes, comments, comment_votes,
// messages, friends

pub mod comment;
pub mod idea;
pub mod profile;
pub mod social;
pub mod vote;

pub use comment::Comment;
pub use idea::{
    Category, Idea, IdeaStatus, PrincipalDecision, PrincipalStatus, Priority, TeacherReview,
};
pub use profile::{Profile, SocialPlatform, UserRole};
pub use social::{FriendStatus, Friendship, Message};
pub use vote::{VoteRecord, VoteType};

/// Enums persisted and serialized as fixed strings.
///
/// One table drives `as_str`, `FromStr`, `Display` and serde, so the stored form and the
/// JSON form can never drift apart.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::error::AppError::BadRequest(format!(
                        "unknown {} value: {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use string_enum;
