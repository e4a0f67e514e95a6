//! U.S. states and the District of Columbia

/// A reportable U.S. jurisdiction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsState {
    /// USPS code
    pub code: &'static str,
    pub name: &'static str,
}

impl UsState {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

/// The 50 states plus DC, in report row order
pub const US_STATES: [UsState; 51] = [
    UsState::new("AL", "Alabama"),
    UsState::new("AK", "Alaska"),
    UsState::new("AZ", "Arizona"),
    UsState::new("AR", "Arkansas"),
    UsState::new("CA", "California"),
    UsState::new("CO", "Colorado"),
    UsState::new("CT", "Connecticut"),
    UsState::new("DE", "Delaware"),
    UsState::new("DC", "District of Columbia"),
    UsState::new("FL", "Florida"),
    UsState::new("GA", "Georgia"),
    UsState::new("HI", "Hawaii"),
    UsState::new("ID", "Idaho"),
    UsState::new("IL", "Illinois"),
    UsState::new("IN", "Indiana"),
    UsState::new("IA", "Iowa"),
    UsState::new("KS", "Kansas"),
    UsState::new("KY", "Kentucky"),
    UsState::new("LA", "Louisiana"),
    UsState::new("ME", "Maine"),
    UsState::new("MD", "Maryland"),
    UsState::new("MA", "Massachusetts"),
    UsState::new("MI", "Michigan"),
    UsState::new("MN", "Minnesota"),
    UsState::new("MS", "Mississippi"),
    UsState::new("MO", "Missouri"),
    UsState::new("MT", "Montana"),
    UsState::new("NE", "Nebraska"),
    UsState::new("NV", "Nevada"),
    UsState::new("NH", "New Hampshire"),
    UsState::new("NJ", "New Jersey"),
    UsState::new("NM", "New Mexico"),
    UsState::new("NY", "New York"),
    UsState::new("NC", "North Carolina"),
    UsState::new("ND", "North Dakota"),
    UsState::new("OH", "Ohio"),
    UsState::new("OK", "Oklahoma"),
    UsState::new("OR", "Oregon"),
    UsState::new("PA", "Pennsylvania"),
    UsState::new("RI", "Rhode Island"),
    UsState::new("SC", "South Carolina"),
    UsState::new("SD", "South Dakota"),
    UsState::new("TN", "Tennessee"),
    UsState::new("TX", "Texas"),
    UsState::new("UT", "Utah"),
    UsState::new("VT", "Vermont"),
    UsState::new("VA", "Virginia"),
    UsState::new("WA", "Washington"),
    UsState::new("WV", "West Virginia"),
    UsState::new("WI", "Wisconsin"),
    UsState::new("WY", "Wyoming"),
];

/// Map a provider ship-state value to a state.
///
/// Matches USPS codes and full names case-insensitively, ignoring dots and
/// repeated whitespace ("n.y.", "New  York"). Territories, military
/// addresses and unknown values return `None`.
pub fn normalize_state(raw: &str) -> Option<UsState> {
    let cleaned = raw.replace('.', "").to_uppercase();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }

    US_STATES
        .iter()
        .find(|s| s.code == cleaned || s.name.to_uppercase() == cleaned)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_fifty_states_and_dc() {
        assert_eq!(US_STATES.len(), 51);
        assert!(US_STATES.iter().any(|s| s.code == "DC"));
        let mut codes: Vec<_> = US_STATES.iter().map(|s| s.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 51);
    }

    #[test]
    fn test_normalize_codes_and_names() {
        assert_eq!(normalize_state("ca").map(|s| s.code), Some("CA"));
        assert_eq!(normalize_state("N.Y.").map(|s| s.code), Some("NY"));
        assert_eq!(normalize_state(" new  jersey ").map(|s| s.code), Some("NJ"));
        assert_eq!(
            normalize_state("District of Columbia").map(|s| s.code),
            Some("DC")
        );
    }

    #[test]
    fn test_territories_and_military_are_not_states() {
        assert_eq!(normalize_state("PR"), None);
        assert_eq!(normalize_state("AE"), None);
        assert_eq!(normalize_state("Guam"), None);
        assert_eq!(normalize_state(""), None);
    }
}
