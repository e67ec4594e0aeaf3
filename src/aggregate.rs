use crate::columns::ColumnId;
use crate::stats::{round_to_half, FileSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One row of the power curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_key: String,
    /// Mean of member file means, per column
    pub means: BTreeMap<ColumnId, f64>,
    /// Mean of member `derived_wind_speed`, rounded to the nearest 0.5
    pub wind_speed: f64,
    pub member_count: u32,
}

impl GroupSummary {
    pub fn mean(&self, column: ColumnId) -> f64 {
        self.means.get(&column).copied().unwrap_or(0.0)
    }
}

#[derive(Default)]
struct GroupTotals {
    sums: [f64; ColumnId::COUNT],
    wind_speed_sum: f64,
    members: u32,
}

/// Group file summaries by key and average their means
///
/// Only per-file means are combined, never raw rows, so every member weighs the same
/// regardless of its row count. Output is sorted by wind speed, then group key.
pub fn aggregate_groups(summaries: &[FileSummary]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<&str, GroupTotals> = BTreeMap::new();

    for summary in summaries {
        let totals = groups.entry(summary.group_key.as_str()).or_default();
        for column in ColumnId::ALL {
            totals.sums[column.slot()] += summary.mean(column);
        }
        totals.wind_speed_sum += summary.derived_wind_speed;
        totals.members += 1;
    }

    let mut result: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(key, totals)| {
            let n = f64::from(totals.members);
            let means = ColumnId::ALL
                .iter()
                .map(|&column| (column, totals.sums[column.slot()] / n))
                .collect();
            GroupSummary {
                group_key: key.to_string(),
                means,
                wind_speed: round_to_half(totals.wind_speed_sum / n),
                member_count: totals.members,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        a.wind_speed
            .total_cmp(&b.wind_speed)
            .then_with(|| a.group_key.cmp(&b.group_key))
    });

    debug!("Aggregated {} files into {} groups", summaries.len(), result.len());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(file_name: &str, key: &str, power: f64, wind_speed: f64) -> FileSummary {
        let means = ColumnId::ALL
            .iter()
            .map(|&c| (c, if c == ColumnId::Power { power } else { 0.0 }))
            .collect();
        FileSummary {
            group_key: key.to_string(),
            file_name: file_name.to_string(),
            means,
            derived_wind_speed: wind_speed,
            row_count: 10,
        }
    }

    #[test]
    fn test_mean_of_means_within_group() {
        let groups = aggregate_groups(&[
            summary("10ws_seed1.out", "10ws", 150.0, 10.0),
            summary("10ws_seed2.out", "10ws", 200.0, 10.0),
        ]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_key, "10ws");
        assert_eq!(groups[0].mean(ColumnId::Power), 175.0);
        assert_eq!(groups[0].member_count, 2);
        assert_eq!(groups[0].wind_speed, 10.0);
    }

    #[test]
    fn test_group_wind_speed_rounded() {
        let groups = aggregate_groups(&[
            summary("a_seed1", "a", 0.0, 10.0),
            summary("a_seed2", "a", 0.0, 10.5),
            summary("a_seed3", "a", 0.0, 10.5),
        ]);
        // mean 10.333.. -> 10.5
        assert_eq!(groups[0].wind_speed, 10.5);
    }

    #[test]
    fn test_sorted_by_wind_speed_then_key() {
        let groups = aggregate_groups(&[
            summary("c.out", "c", 1.0, 12.0),
            summary("b.out", "b", 1.0, 8.0),
            summary("a.out", "a", 1.0, 12.0),
            summary("d.out", "d", 1.0, 4.0),
        ]);
        let keys: Vec<&str> = groups.iter().map(|g| g.group_key.as_str()).collect();
        assert_eq!(keys, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_member_counts_sum_to_input_len() {
        let input = vec![
            summary("x1", "x", 1.0, 5.0),
            summary("y1", "y", 2.0, 6.0),
            summary("x2", "x", 3.0, 5.0),
        ];
        let groups = aggregate_groups(&input);
        let total: u32 = groups.iter().map(|g| g.member_count).sum();
        assert_eq!(total as usize, input.len());
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_groups(&[]).is_empty());
    }
}
