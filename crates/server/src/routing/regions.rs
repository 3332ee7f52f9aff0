//! Fixed US census region tables used by warehouse routing.

/// The four US census regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CensusRegion {
    West,
    Midwest,
    South,
    Northeast,
}

const WEST: &[&str] = &[
    "AK", "AZ", "CA", "CO", "HI", "ID", "MT", "NM", "NV", "OR", "UT", "WA", "WY",
];

const MIDWEST: &[&str] = &[
    "IA", "IL", "IN", "KS", "MI", "MN", "MO", "ND", "NE", "OH", "SD", "WI",
];

const SOUTH: &[&str] = &[
    "AL", "AR", "DE", "FL", "GA", "KY", "LA", "MD", "MS", "NC", "OK", "SC", "TN", "TX", "VA", "WV",
];

const NORTHEAST: &[&str] = &["CT", "MA", "ME", "NH", "NJ", "NY", "PA", "RI", "VT"];

impl CensusRegion {
    /// All four regions, covering the 50 states exactly once.
    pub const ALL: [Self; 4] = [Self::West, Self::Midwest, Self::South, Self::Northeast];

    /// The states belonging to this region.
    #[must_use]
    pub const fn states(self) -> &'static [&'static str] {
        match self {
            Self::West => WEST,
            Self::Midwest => MIDWEST,
            Self::South => SOUTH,
            Self::Northeast => NORTHEAST,
        }
    }

    /// Regions considered adjacent when scoring proximity.
    #[must_use]
    pub const fn neighbors(self) -> &'static [Self] {
        match self {
            Self::West => &[Self::Midwest],
            Self::Midwest => &[Self::West, Self::South, Self::Northeast],
            Self::South => &[Self::Midwest, Self::West],
            Self::Northeast => &[Self::Midwest, Self::South],
        }
    }

    /// Whether `other` is in this region's neighbor list.
    #[must_use]
    pub fn is_adjacent_to(self, other: Self) -> bool {
        self.neighbors().contains(&other)
    }

    /// The census region a state code belongs to, or `None` for anything that
    /// is not one of the 50 states.
    #[must_use]
    pub fn of_state(state: &str) -> Option<Self> {
        let code = state.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|region| region.states().contains(&code.as_str()))
    }
}
