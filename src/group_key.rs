/// Substring that separates a run's group name from its seed number
pub const SEED_MARKER: &str = "_seed";

/// Derive the grouping key for a simulation output file name
///
/// `10WS_Seed3.out` -> `10ws`; names without a seed marker drop their extension
/// instead (`12ws.out` -> `12ws`). Total for any input.
pub fn group_key(file_name: &str) -> String {
    let lowered = file_name.to_lowercase();
    if let Some(pos) = lowered.find(SEED_MARKER) {
        return lowered[..pos].to_string();
    }
    strip_extension(file_name).to_string()
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_suffix_stripped_and_lowercased() {
        assert_eq!(group_key("10ws_seed1.out"), "10ws");
        assert_eq!(group_key("10WS_Seed12.out"), "10ws");
        assert_eq!(group_key("DLC1.2_11ms_SEED3"), "dlc1.2_11ms");
    }

    #[test]
    fn test_extension_stripped_without_seed() {
        assert_eq!(group_key("12ws.out"), "12ws");
        assert_eq!(group_key("Case.A.out"), "Case.A");
        assert_eq!(group_key("noext"), "noext");
    }

    #[test]
    fn test_edge_inputs() {
        assert_eq!(group_key(""), "");
        assert_eq!(group_key(".out"), ".out");
        assert_eq!(group_key("_seed1.out"), "");
        assert_eq!(group_key("wind_seedless.out"), "wind");
    }
}
