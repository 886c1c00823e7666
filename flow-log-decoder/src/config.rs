//! Formatter configuration types

use crate::store::fields::FieldMask;
use serde::{Deserialize, Serialize};

/// Controls which fields are rendered and in which time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Fields to render; intersected with each record's presence mask
    #[serde(default = "default_field_mask")]
    pub field_mask: FieldMask,

    /// Render absolute times in UTC instead of the local zone
    #[serde(default)]
    pub utc: bool,
}

fn default_field_mask() -> FieldMask {
    FieldMask::BRIEF
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            field_mask: default_field_mask(),
            utc: false,
        }
    }
}

impl FormatConfig {
    /// Brief fields, local time
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the field mask
    pub fn with_field_mask(mut self, mask: FieldMask) -> Self {
        self.field_mask = mask;
        self
    }

    /// Builder method: render every field
    pub fn with_all_fields(self) -> Self {
        self.with_field_mask(FieldMask::ALL)
    }

    /// Builder method: render times in UTC
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }
}
