//! Request intent classification.
//!
//! Feedback prompts are domain-flavored, so rejected attempts are classified
//! once against the user's original request. The heuristics are fixed and
//! ordered: arithmetic is checked before weather, and anything else is
//! unclassified. Keyword tables are the whole mechanism; there is no model
//! call here.

/// Tag for the kind of request being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionIntent {
    Arithmetic,
    WeatherQuery,
    Unclassified,
}

const CALCULATION_VERBS: [&str; 6] = [
    "calculate",
    "compute",
    "evaluate",
    "sum",
    "multiply",
    "divide",
];

const WEATHER_NOUNS: [&str; 7] = [
    "weather",
    "temperature",
    "forecast",
    "rain",
    "snow",
    "humidity",
    "sunny",
];

/// Classifies `text` for feedback template choice.
pub fn classify_intent(text: &str) -> SelectionIntent {
    if has_arithmetic(text) {
        return SelectionIntent::Arithmetic;
    }
    if has_weather_query(text) {
        return SelectionIntent::WeatherQuery;
    }
    SelectionIntent::Unclassified
}

/// A calculation verb, or an operator sitting next to digits somewhere in
/// the text.
fn has_arithmetic(text: &str) -> bool {
    let lower = text.to_lowercase();
    if CALCULATION_VERBS.iter().any(|verb| lower.contains(verb)) {
        return true;
    }
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    has_digit
        && text
            .chars()
            .any(|c| matches!(c, '+' | '-' | '*' | '/' | '%' | '='))
}

/// A weather noun followed later in the text by a capitalized word, the
/// usual shape of "weather in Paris".
fn has_weather_query(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    let noun_at = words.iter().position(|word| {
        let lower = word.to_lowercase();
        WEATHER_NOUNS.iter().any(|noun| lower.contains(noun))
    });
    let Some(noun_at) = noun_at else {
        return false;
    };
    words[noun_at + 1..]
        .iter()
        .any(|word| is_capitalized_word(word))
}

fn is_capitalized_word(word: &str) -> bool {
    let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
    trimmed.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_next_to_digits_are_arithmetic() {
        assert_eq!(classify_intent("what is 2+2?"), SelectionIntent::Arithmetic);
        assert_eq!(
            classify_intent("Compute the total for me"),
            SelectionIntent::Arithmetic
        );
    }

    #[test]
    fn weather_needs_a_location_like_word() {
        assert_eq!(
            classify_intent("What's the weather in Paris?"),
            SelectionIntent::WeatherQuery
        );
        assert_eq!(
            classify_intent("is it raining"),
            SelectionIntent::Unclassified
        );
    }

    #[test]
    fn arithmetic_wins_when_both_match() {
        assert_eq!(
            classify_intent("calculate the average temperature for Oslo"),
            SelectionIntent::Arithmetic
        );
    }

    #[test]
    fn plain_requests_are_unclassified() {
        assert_eq!(
            classify_intent("find my latest invoice"),
            SelectionIntent::Unclassified
        );
        assert_eq!(classify_intent(""), SelectionIntent::Unclassified);
    }

    #[test]
    fn hyphenated_prose_without_digits_is_not_arithmetic() {
        assert_eq!(
            classify_intent("give me a well-known fact"),
            SelectionIntent::Unclassified
        );
    }
}
