use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier (UUID v4).
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Hyphen-free lowercase hex form (32 characters).
            pub fn simple(&self) -> String {
                self.0.simple().to_string()
            }

            /// Short representation (first 8 characters).
            pub fn short_id(&self) -> String {
                self.simple()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId(format!("{s:?}: {e}")))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a logical [`Content`](crate::Content).
    ContentId
);

uuid_id!(
    /// Identifier of a physical [`Object`](crate::Object).
    ///
    /// Object ids are random (v4) rather than time-ordered: sharded key
    /// strategies take their shard prefix from the leading characters.
    ObjectId
);

uuid_id!(
    /// Identifier of the tenant that owns a content.
    TenantId
);

uuid_id!(
    /// Identifier of the user or service that owns a content.
    OwnerId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(ContentId::new(), ContentId::new());
        assert_ne!(ObjectId::new(), ObjectId::new());
    }

    #[test]
    fn simple_form_has_no_dashes() {
        let id = ObjectId::new();
        let simple = id.simple();
        assert_eq!(simple.len(), 32);
        assert!(!simple.contains('-'));
    }

    #[test]
    fn display_parse_roundtrip() {
        let id = ContentId::new();
        let parsed: ContentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<TenantId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidId(_)));
    }

    #[test]
    fn short_id_is_8_chars() {
        assert_eq!(OwnerId::new().short_id().len(), 8);
    }

    #[test]
    fn serde_is_transparent() {
        let id = ObjectId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn debug_uses_type_name() {
        let id = ContentId::new();
        assert!(format!("{id:?}").starts_with("ContentId("));
    }
}
