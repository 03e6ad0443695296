use std::collections::HashSet;

use crate::models::Recommendation;

/// Merges recommendation result sequences into one ordered, deduplicated
/// list.
///
/// Sequences are processed strictly in caller order (taste-based results
/// before location-based results). The first occurrence of a name determines
/// both position and metadata; later duplicates are discarded even when they
/// carry richer data. Name comparison is exact and case-sensitive.
pub fn merge(sequences: Vec<Vec<Recommendation>>) -> Vec<Recommendation> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for sequence in sequences {
        for item in sequence {
            if seen.insert(item.name.clone()) {
                merged.push(item);
            }
        }
    }

    merged
}
