//! Domain identifier newtypes.
//!
//! Every entity in the registry, evidence store, artifact index, and audit
//! log is addressed by one of these types rather than a bare `Uuid` or
//! `String`. That makes "passed a `FileId` where a `VersionId` was expected"
//! a compile error instead of a production incident.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(DocumentId, "document");
uuid_id!(VersionId, "version");
uuid_id!(FileId, "file");
uuid_id!(ArtifactId, "artifact");
uuid_id!(ChunkId, "chunk");
uuid_id!(SuggestionId, "suggestion");
uuid_id!(LlmRunId, "llm_run");
uuid_id!(EventId, "event");
uuid_id!(CorrelationId, "correlation");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        let id = VersionId::new();
        assert!(id.to_string().starts_with("version:"));
    }

    #[test]
    fn round_trips_through_string() {
        let id = FileId::new();
        let parsed: FileId = id.to_string().trim_start_matches("file:").parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_ids_are_not_interchangeable_types() {
        // This is a compile-time property; the test just documents it.
        let doc = DocumentId::new();
        let ver = VersionId::new();
        assert_ne!(doc.as_uuid(), ver.as_uuid());
    }
}
