use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use photo::PhotoDescriptor;
pub use settings::{DisplayConfiguration, DisplaySettingsFields};
pub use source::{PhotoSource, SourceScope};

pub type ConfigId = u64;
pub type PhotoId = u64;
pub type AlbumId = u64;
pub type TagId = u64;

/// Reasons a display configuration is rejected before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("slideDurationSeconds must be at least 1 (got {0})")]
    SlideDuration(i64),
    #[error("transitionDurationMs must not be negative (got {0})")]
    TransitionDuration(i64),
    #[error("sourceId is required when sourceScope is {0}")]
    MissingSourceId(SourceScope),
}

mod source {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SourceScope {
        #[default]
        All,
        Album,
        Tag,
    }

    impl SourceScope {
        fn as_str(&self) -> &'static str {
            match self {
                Self::All => "all",
                Self::Album => "album",
                Self::Tag => "tag",
            }
        }
    }

    impl fmt::Display for SourceScope {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Where a slideshow draws its photos from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum PhotoSource {
        All,
        Album(AlbumId),
        Tag(TagId),
    }

    impl PhotoSource {
        pub fn from_scope(
            scope: SourceScope,
            source_id: Option<u64>,
        ) -> Result<Self, ValidationError> {
            match (scope, source_id) {
                (SourceScope::All, _) => Ok(Self::All),
                (SourceScope::Album, Some(id)) => Ok(Self::Album(id)),
                (SourceScope::Tag, Some(id)) => Ok(Self::Tag(id)),
                (scope, None) => Err(ValidationError::MissingSourceId(scope)),
            }
        }

        pub fn scope(&self) -> SourceScope {
            match self {
                Self::All => SourceScope::All,
                Self::Album(_) => SourceScope::Album,
                Self::Tag(_) => SourceScope::Tag,
            }
        }
    }

    impl fmt::Display for PhotoSource {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::All => f.write_str("all"),
                Self::Album(id) => write!(f, "album:{id}"),
                Self::Tag(id) => write!(f, "tag:{id}"),
            }
        }
    }
}

mod photo {
    use super::*;

    /// What a display client needs to fetch and lay out one photo.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PhotoDescriptor {
        pub id: PhotoId,
        pub path: String,
        pub width: u32,
        pub height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub captured_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    #[default]
    Fade,
    Slide,
    Zoom,
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFit {
    #[default]
    Contain,
    Cover,
    Stretch,
}

mod settings {
    use super::*;

    /// A named set of slideshow parameters. Exactly one is active at a time.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DisplayConfiguration {
        pub id: ConfigId,
        pub name: String,
        #[serde(default)]
        pub is_active: bool,
        #[serde(default)]
        pub source_scope: SourceScope,
        #[serde(default)]
        pub source_id: Option<u64>,
        #[serde(default)]
        pub shuffle: bool,
        #[serde(default = "DisplayConfiguration::default_slide_duration_seconds")]
        pub slide_duration_seconds: i64,
        #[serde(default)]
        pub transition_kind: TransitionKind,
        #[serde(default = "DisplayConfiguration::default_transition_duration_ms")]
        pub transition_duration_ms: i64,
        #[serde(default)]
        pub image_fit: ImageFit,
    }

    /// Partial create/update payload. Unset fields keep their current (or default) value.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct DisplaySettingsFields {
        pub name: Option<String>,
        pub source_scope: Option<SourceScope>,
        pub source_id: Option<u64>,
        pub shuffle: Option<bool>,
        pub slide_duration_seconds: Option<i64>,
        pub transition_kind: Option<TransitionKind>,
        pub transition_duration_ms: Option<i64>,
        pub image_fit: Option<ImageFit>,
    }

    impl DisplayConfiguration {
        pub const DEFAULT_SLIDE_DURATION_SECONDS: i64 = 10;
        pub const DEFAULT_TRANSITION_DURATION_MS: i64 = 1000;

        const fn default_slide_duration_seconds() -> i64 {
            Self::DEFAULT_SLIDE_DURATION_SECONDS
        }

        const fn default_transition_duration_ms() -> i64 {
            Self::DEFAULT_TRANSITION_DURATION_MS
        }

        pub fn placeholder_name(id: ConfigId) -> String {
            format!("Display {id}")
        }

        /// An inactive configuration showing every photo with default timing.
        pub fn with_defaults(id: ConfigId) -> Self {
            Self {
                id,
                name: Self::placeholder_name(id),
                is_active: false,
                source_scope: SourceScope::All,
                source_id: None,
                shuffle: false,
                slide_duration_seconds: Self::DEFAULT_SLIDE_DURATION_SECONDS,
                transition_kind: TransitionKind::default(),
                transition_duration_ms: Self::DEFAULT_TRANSITION_DURATION_MS,
                image_fit: ImageFit::default(),
            }
        }

        /// Builds a configuration with `fields` applied over the defaults.
        pub fn from_fields(
            id: ConfigId,
            fields: &DisplaySettingsFields,
        ) -> Result<Self, ValidationError> {
            Self::with_defaults(id).merged(fields)
        }

        /// Returns a copy with `fields` applied, validated as a whole.
        pub fn merged(&self, fields: &DisplaySettingsFields) -> Result<Self, ValidationError> {
            let mut next = self.clone();
            if let Some(name) = &fields.name {
                next.name = name.trim().to_string();
            }
            if let Some(scope) = fields.source_scope {
                next.source_scope = scope;
            }
            if fields.source_id.is_some() {
                next.source_id = fields.source_id;
            }
            if let Some(shuffle) = fields.shuffle {
                next.shuffle = shuffle;
            }
            if let Some(seconds) = fields.slide_duration_seconds {
                next.slide_duration_seconds = seconds;
            }
            if let Some(kind) = fields.transition_kind {
                next.transition_kind = kind;
            }
            if let Some(ms) = fields.transition_duration_ms {
                next.transition_duration_ms = ms;
            }
            if let Some(fit) = fields.image_fit {
                next.image_fit = fit;
            }
            if next.name.is_empty() {
                next.name = Self::placeholder_name(next.id);
            }
            if next.source_scope == SourceScope::All {
                next.source_id = None;
            }
            next.validate()?;
            Ok(next)
        }

        pub fn validate(&self) -> Result<(), ValidationError> {
            if self.slide_duration_seconds < 1 {
                return Err(ValidationError::SlideDuration(self.slide_duration_seconds));
            }
            if self.transition_duration_ms < 0 {
                return Err(ValidationError::TransitionDuration(
                    self.transition_duration_ms,
                ));
            }
            self.source().map(|_| ())
        }

        pub fn source(&self) -> Result<PhotoSource, ValidationError> {
            PhotoSource::from_scope(self.source_scope, self.source_id)
        }
    }
}
