use serde::{Deserialize, Serialize};

/// Semantic columns tracked for every simulation output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnId {
    Power,
    Torque,
    GenSpeed,
    Cp,
    Ct,
    Pitch1,
    Pitch2,
    Pitch3,
    WindX,
    WindY,
    WindZ,
    RotorArea,
}

impl ColumnId {
    pub const COUNT: usize = 12;

    /// All columns in slot order
    pub const ALL: [ColumnId; Self::COUNT] = [
        ColumnId::Power,
        ColumnId::Torque,
        ColumnId::GenSpeed,
        ColumnId::Cp,
        ColumnId::Ct,
        ColumnId::Pitch1,
        ColumnId::Pitch2,
        ColumnId::Pitch3,
        ColumnId::WindX,
        ColumnId::WindY,
        ColumnId::WindZ,
        ColumnId::RotorArea,
    ];

    /// Header token that identifies this column in a raw output file
    /// WHY: matched exactly, so `GenPwr_2` or `genpwr` are not recognised
    pub fn header_name(self) -> &'static str {
        match self {
            ColumnId::Power => "GenPwr",
            ColumnId::Torque => "GenTq",
            ColumnId::GenSpeed => "GenSpeed",
            ColumnId::Cp => "RtAeroCp",
            ColumnId::Ct => "RtAeroCt",
            ColumnId::Pitch1 => "BldPitch1",
            ColumnId::Pitch2 => "BldPitch2",
            ColumnId::Pitch3 => "BldPitch3",
            ColumnId::WindX => "WindHubVelX",
            ColumnId::WindY => "WindHubVelY",
            ColumnId::WindZ => "WindHubVelZ",
            ColumnId::RotorArea => "RtArea",
        }
    }

    /// Label used in exported tables
    pub fn label(self) -> &'static str {
        match self {
            ColumnId::Power => "Power",
            ColumnId::Torque => "Torque",
            ColumnId::GenSpeed => "GenSpeed",
            ColumnId::Cp => "Cp",
            ColumnId::Ct => "Ct",
            ColumnId::Pitch1 => "Pitch1",
            ColumnId::Pitch2 => "Pitch2",
            ColumnId::Pitch3 => "Pitch3",
            ColumnId::WindX => "WindX",
            ColumnId::WindY => "WindY",
            ColumnId::WindZ => "WindZ",
            ColumnId::RotorArea => "RotorArea",
        }
    }

    /// Fixed storage slot for this column
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn from_header(token: &str) -> Option<ColumnId> {
        Self::ALL.iter().copied().find(|c| c.header_name() == token)
    }
}

/// Positional lookup built once per file from its header row
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: [Option<usize>; ColumnId::COUNT],
    by_position: Vec<Option<ColumnId>>,
}

impl ColumnIndex {
    /// Resolve header tokens to column positions
    ///
    /// Unrecognised tokens are ignored. If a header repeats a recognised name the
    /// first occurrence wins.
    pub fn resolve<S: AsRef<str>>(header: &[S]) -> Self {
        let mut positions = [None; ColumnId::COUNT];
        let mut by_position = vec![None; header.len()];

        for (pos, token) in header.iter().enumerate() {
            if let Some(column) = ColumnId::from_header(token.as_ref()) {
                if positions[column.slot()].is_none() {
                    positions[column.slot()] = Some(pos);
                    by_position[pos] = Some(column);
                }
            }
        }

        Self { positions, by_position }
    }

    pub fn position(&self, column: ColumnId) -> Option<usize> {
        self.positions[column.slot()]
    }

    /// Column stored at a token position, if any
    #[inline]
    pub fn column_at(&self, pos: usize) -> Option<ColumnId> {
        self.by_position.get(pos).copied().flatten()
    }

    pub fn resolved_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_some()).count()
    }
}
