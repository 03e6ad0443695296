use crate::models::{ContentKind, ExplicitFilters, HistoryItem, TasteSignal};

/// Converts a plain genre name into the taste-graph tag identifier format
/// (lowercased, spaces replaced with underscores, URN prefix attached).
pub fn genre_to_tag_urn(genre: &str, kind: ContentKind) -> String {
    format!(
        "{}{}",
        kind.tag_prefix(),
        genre.to_lowercase().replace(' ', "_")
    )
}

/// Returns the most frequent genre across the given history, or `None` when
/// no item carries genre data. Ties resolve to the genre encountered first.
pub fn dominant_genre(history: &[HistoryItem]) -> Option<String> {
    // Linear scan over a Vec instead of a HashMap: the count table stays in
    // first-seen order, which is what the tie-break needs.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in history {
        for genre in &item.genres {
            match counts.iter_mut().find(|(seen, _)| *seen == genre.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((genre.as_str(), 1)),
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (genre, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((genre, count));
        }
    }
    best.map(|(genre, _)| genre.to_string())
}

/// Derives the taste signal for a recommendation request.
///
/// Explicit filters take precedence entirely: when the caller supplies a
/// genre or language, no history-derived signal is computed. Otherwise the
/// dominant genre across the history becomes the tag, falling back to the
/// configured genre when the history carries no genre data at all.
pub fn extract_signal(
    history: &[HistoryItem],
    explicit: Option<&ExplicitFilters>,
    fallback_genre: &str,
    kind: ContentKind,
) -> TasteSignal {
    if let Some(filters) = explicit {
        if !filters.is_empty() {
            return TasteSignal {
                tag_urn: filters
                    .genre
                    .as_deref()
                    .map(|genre| genre_to_tag_urn(genre, kind)),
                location: None,
                language: filters.language.clone(),
            };
        }
    }

    let genre = dominant_genre(history).unwrap_or_else(|| fallback_genre.to_string());
    TasteSignal {
        tag_urn: Some(genre_to_tag_urn(&genre, kind)),
        location: None,
        language: None,
    }
}
