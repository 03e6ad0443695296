/// What a chat turn is asking the assistant to do.
///
/// The original system let a hosted language model pick which tool to run
/// per utterance; sequencing here is deterministic keyword dispatch instead,
/// so a given message always drives the same pipeline operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Show the user's watch/listen history
    Watched,
    /// Run the recommendation pipeline
    Recommend,
    /// Narrate taste and recommendation fit
    Summarize,
    /// Recently added catalog entries
    Trending,
    /// Recently released catalog entries
    Recent,
    /// Anything unrecognized: reply with capabilities
    Help,
}

/// Classifies a chat message into an intent.
///
/// Precedence matters: "explain why these recommendations fit my taste"
/// mentions recommendations but is a summary request, and "recently watched"
/// mentions recency but is a history request. More specific intents are
/// checked first.
pub fn classify(message: &str) -> Intent {
    let text = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| text.contains(needle));

    if contains_any(&["taste", "summar", "explain", "why"]) {
        Intent::Summarize
    } else if contains_any(&["watched", "history", "played", "listened"]) {
        Intent::Watched
    } else if contains_any(&["trending", "popular"]) {
        Intent::Trending
    } else if contains_any(&["recent", "new release", "latest"]) {
        Intent::Recent
    } else if contains_any(&["recommend", "suggest", "watch next", "what should"]) {
        Intent::Recommend
    } else {
        Intent::Help
    }
}
