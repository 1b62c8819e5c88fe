//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` / `*_kinds` table, and its wire name is
//! the snake_case string used in JSON payloads.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// The wire name used in JSON payloads.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Lifecycle status of a subject's job record.
    JobStatus {
        Idle = 1 => "idle",
        InProgress = 2 => "in_progress",
        Complete = 3 => "complete",
        Error = 4 => "error",
    }
}

define_status_enum! {
    /// Kind of a history entry.
    IterationKind {
        Create = 1 => "create",
        Edit = 2 => "edit",
    }
}

define_status_enum! {
    /// Kind of mutation a job performs.
    JobKind {
        Create = 1 => "create",
        Edit = 2 => "edit",
        PanelTexture = 3 => "panel_texture",
    }
}

impl JobStatus {
    /// `complete` and `error` end a poll loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl JobKind {
    /// The history kind recorded when a job of this kind completes.
    ///
    /// Panel textures are always fresh designs, never edits of a prior one.
    pub fn iteration_kind(self) -> IterationKind {
        match self {
            JobKind::Create | JobKind::PanelTexture => IterationKind::Create,
            JobKind::Edit => IterationKind::Edit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for status in [
            JobStatus::Idle,
            JobStatus::InProgress,
            JobStatus::Complete,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(0), None);
        assert_eq!(JobStatus::from_id(5), None);
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let kind: JobKind = serde_json::from_str("\"panel_texture\"").unwrap();
        assert_eq!(kind, JobKind::PanelTexture);
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(!JobStatus::Idle.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn panel_texture_jobs_record_create_iterations() {
        assert_eq!(JobKind::PanelTexture.iteration_kind(), IterationKind::Create);
        assert_eq!(JobKind::Edit.iteration_kind(), IterationKind::Edit);
    }
}
