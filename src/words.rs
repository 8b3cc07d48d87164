// Bundled fallback corpus, grouped roughly by length so every tier has words.

pub const SHORT_WORDS: [&str; 40] = [
    "cat", "dog", "sun", "map", "hat", "cup", "bed", "fox", "pig", "red",
    "tree", "fish", "milk", "frog", "rain", "star", "book", "ship", "lamp", "kite",
    "apple", "grape", "lemon", "horse", "snake", "cloud", "bread", "chair", "plant", "smile",
    "bird", "moon", "ring", "sock", "door", "cake", "nest", "seed", "wind", "duck",
];

pub const MEDIUM_WORDS: [&str; 40] = [
    "garden", "pencil", "rocket", "bridge", "castle", "forest", "jungle", "planet", "rabbit", "winter",
    "balloon", "captain", "dolphin", "kitchen", "library", "monster", "pumpkin", "teacher", "weather", "village",
    "answer", "basket", "cousin", "dragon", "finger", "guitar", "island", "ladder", "market", "napkin",
    "orange", "parrot", "ribbon", "silver", "ticket", "velvet", "wonder", "yellow", "zipper", "spider",
];

pub const LONG_WORDS: [&str; 40] = [
    "adventure", "beautiful", "celebrate", "dangerous", "education", "furniture", "geography", "happiness", "important", "knowledge",
    "necessary", "operation", "president", "question", "remember", "separate", "telephone", "umbrella", "vacation", "yesterday",
    "calendar", "disappear", "excellent", "familiar", "grammar", "hospital", "invisible", "judgement", "laughter", "medicine",
    "neighbour", "occasion", "parallel", "receive", "schedule", "tomorrow", "universe", "vehicle", "whisper", "argument",
];

pub const HARD_WORDS: [&str; 30] = [
    "accommodate", "acknowledgment", "bureaucracy", "catastrophe", "conscientious", "embarrassment",
    "entrepreneur", "extraordinary", "hierarchical", "idiosyncrasy", "independence", "infrastructure",
    "maintenance", "mediterranean", "millennium", "mischievous", "onomatopoeia", "perseverance",
    "pronunciation", "questionnaire", "reconnaissance", "rhythmically", "surveillance", "thermometer",
    "unnecessary", "vaccination", "architecture", "circumference", "encyclopedia", "refrigerator",
];

pub fn builtin_corpus() -> Vec<String> {
    SHORT_WORDS
        .iter()
        .chain(MEDIUM_WORDS.iter())
        .chain(LONG_WORDS.iter())
        .chain(HARD_WORDS.iter())
        .map(|w| w.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_corpus_is_lowercase_alphabetic() {
        let corpus = builtin_corpus();
        assert_eq!(corpus.len(), 150);
        assert!(corpus
            .iter()
            .all(|w| w.chars().all(|c| c.is_ascii_lowercase())));
    }
}
