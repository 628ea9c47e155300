use crate::models::{RankedEntry, StudentObservation};

pub const LECTURE_TOP_N: usize = 5;
pub const DASHBOARD_TOP_N: usize = 10;

/// Highest scorers first. Ties keep their roster order.
pub fn top_n(roster: &[StudentObservation], n: usize) -> Vec<&StudentObservation> {
    if n == 0 {
        return Vec::new();
    }

    let mut ordered: Vec<&StudentObservation> = roster.iter().collect();
    ordered.sort_by(|a, b| b.points.cmp(&a.points));
    ordered.truncate(n);
    ordered
}

pub fn rank(roster: &[StudentObservation], n: usize) -> Vec<RankedEntry<'_>> {
    top_n(roster, n)
        .into_iter()
        .enumerate()
        .map(|(index, observation)| RankedEntry {
            rank: index + 1,
            observation,
        })
        .collect()
}
