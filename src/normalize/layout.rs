//! Definition sheet layouts

use serde::Deserialize;

/// A canonical column of a definition sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Back,
    Key,
    No,
    Name,
    Nul,
    Type,
    Len,
    Dec,
    Und,
    Def,
    Desc,
    Note,
    TableCode,
    TableName,
    TableDesc,
    TableNote,
}

impl Field {
    pub fn header(self) -> &'static str {
        match self {
            Field::Back => "Back",
            Field::Key => "Key",
            Field::No => "No",
            Field::Name => "Name",
            Field::Nul => "Nul",
            Field::Type => "Type",
            Field::Len => "Len",
            Field::Dec => "Dec",
            Field::Und => "Und",
            Field::Def => "Def",
            Field::Desc => "Desc",
            Field::Note => "Note",
            Field::TableCode => "TableCode",
            Field::TableName => "TableName",
            Field::TableDesc => "TableDesc",
            Field::TableNote => "TableNote",
        }
    }
}

const FULL_COLUMNS: &[Field] = &[
    Field::Back,
    Field::Key,
    Field::No,
    Field::Name,
    Field::Nul,
    Field::Type,
    Field::Len,
    Field::Dec,
    Field::Und,
    Field::Def,
    Field::Desc,
    Field::Note,
    Field::TableCode,
    Field::TableName,
    Field::TableDesc,
    Field::TableNote,
];

// Back, No, Und
const FULL_DROPPED: &[usize] = &[0, 2, 8];

const COMPACT_COLUMNS: &[Field] = &[
    Field::Key,
    Field::Name,
    Field::Nul,
    Field::Type,
    Field::Len,
    Field::Dec,
    Field::Def,
    Field::Desc,
];

/// Template a definition sheet is expected to follow.
///
/// Chosen by configuration, never detected from the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// 16 columns, with `Back`, `No` and `Und` dropped before use
    #[default]
    Full,
    /// 8 columns, no table-level cells
    Compact,
}

impl Layout {
    /// Every raw column of the template, in sheet order
    pub fn raw_columns(self) -> &'static [Field] {
        match self {
            Layout::Full => FULL_COLUMNS,
            Layout::Compact => COMPACT_COLUMNS,
        }
    }

    pub fn dropped_positions(self) -> &'static [usize] {
        match self {
            Layout::Full => FULL_DROPPED,
            Layout::Compact => &[],
        }
    }

    pub fn width(self) -> usize {
        self.raw_columns().len()
    }

    /// Columns kept after positional drops, paired with their raw position
    pub fn kept_columns(self) -> Vec<(usize, Field)> {
        let dropped = self.dropped_positions();
        self.raw_columns()
            .iter()
            .copied()
            .enumerate()
            .filter(|(pos, _)| !dropped.contains(pos))
            .collect()
    }

    pub fn raw_headers(self) -> Vec<&'static str> {
        self.raw_columns().iter().map(|f| f.header()).collect()
    }

    /// Raw position of a kept field, `None` when the layout lacks it
    pub fn position(self, field: Field) -> Option<usize> {
        self.kept_columns()
            .into_iter()
            .find(|(_, f)| *f == field)
            .map(|(pos, _)| pos)
    }
}
