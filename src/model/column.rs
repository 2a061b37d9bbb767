//! Column definitions

use crate::util::is_marker;

/// Role a column plays in the table's key constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRole {
    #[default]
    None,
    PrimaryKey,
    ForeignKey,
}

impl KeyRole {
    /// `PK` / `FK` markers, case-insensitive. Anything else is `None`.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(m) if is_marker(m, &["PK"]) => KeyRole::PrimaryKey,
            Some(m) if is_marker(m, &["FK"]) => KeyRole::ForeignKey,
            _ => KeyRole::None,
        }
    }
}

/// Nullability from the `Nul` marker.
///
/// An absent marker and `Y` mean nullable; any other marker means NOT NULL.
pub fn nullable_from_marker(marker: Option<&str>) -> bool {
    match marker {
        None => true,
        Some(m) => is_marker(m, &["Y"]),
    }
}

/// One normalized column of a table definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Sanitized identifier (`[A-Za-z0-9_]` only)
    pub name: String,
    /// Lower-cased source type token
    pub raw_type: String,
    /// String length or decimal precision; values <= 0 are kept as written
    pub length: Option<i64>,
    /// Decimal scale
    pub decimal_places: Option<u32>,
    pub nullable: bool,
    pub key_role: KeyRole,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_type: raw_type.into().trim().to_lowercase(),
            length: None,
            decimal_places: None,
            nullable: true,
            key_role: KeyRole::None,
            default_value: None,
            description: None,
            note: None,
        }
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = Some(places);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_key(mut self, role: KeyRole) -> Self {
        self.key_role = role;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
