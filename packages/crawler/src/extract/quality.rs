//! Heuristic extraction-quality score in [0, 1].

/// Inputs to the score that are already known by the time validation
/// has passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualitySignals<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub has_author: bool,
    pub has_date: bool,
    pub has_description: bool,
}

/// Score an extraction. Starts at 0.5 and rewards metadata presence,
/// an ideal body length, a headline-sized title and paragraph
/// structure; bodies that slipped under the minimum are punished.
pub fn score(signals: QualitySignals<'_>) -> f32 {
    let mut score: f32 = 0.5;

    if signals.has_author {
        score += 0.15;
    }
    if signals.has_date {
        score += 0.15;
    }
    if signals.has_description {
        score += 0.10;
    }

    let text_len = signals.text.chars().count();
    if (1_000..=8_000).contains(&text_len) {
        score += 0.20;
    } else if (500..=15_000).contains(&text_len) {
        score += 0.10;
    } else if text_len < 200 {
        score -= 0.20;
    }

    let title_len = signals.title.chars().count();
    if (20..=150).contains(&title_len) {
        score += 0.10;
    }

    if signals.text.matches('\n').count() >= 4 {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn body(len: usize) -> String {
        "a".repeat(len)
    }

    #[test]
    fn bare_minimum_scores_half() {
        let text = body(300);
        let signals = QualitySignals {
            title: "short",
            text: &text,
            ..Default::default()
        };
        assert!((score(signals) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn full_metadata_and_ideal_length_score_high() {
        let text = format!("{}\n{}\n{}\n{}\n{}", body(400), body(400), body(400), body(400), body(400));
        let signals = QualitySignals {
            title: "Inter wins the derby against Milan",
            text: &text,
            has_author: true,
            has_date: true,
            has_description: true,
        };
        assert!(score(signals) >= 0.95);
    }

    #[test]
    fn mid_length_body_gets_the_smaller_bonus() {
        let text = body(10_000);
        let signals = QualitySignals {
            title: "x",
            text: &text,
            ..Default::default()
        };
        assert!((score(signals) - 0.6).abs() < 0.001);
    }

    #[test]
    fn tiny_body_is_punished() {
        let text = body(150);
        let signals = QualitySignals {
            title: "x",
            text: &text,
            ..Default::default()
        };
        assert!((score(signals) - 0.3).abs() < 0.001);
    }

    proptest! {
        #[test]
        fn score_is_always_in_unit_interval(
            title in ".{0,200}",
            text in ".{0,2000}",
            has_author: bool,
            has_date: bool,
            has_description: bool,
        ) {
            let signals = QualitySignals {
                title: &title,
                text: &text,
                has_author,
                has_date,
                has_description,
            };
            let s = score(signals);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
