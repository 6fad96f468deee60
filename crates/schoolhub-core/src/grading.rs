//! Grading rules.
//!
//! Scores are percentages in `[0, 100]`. A score maps to a letter on a
//! plus/minus scale, each letter carries grade points on a 4.0 scale, and a
//! GPA is the credit-hour weighted mean of grade points.

use anyhow::anyhow;

use crate::errors::AppError;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// `(lower bound, letter, grade points)`, highest first.
const LETTER_SCALE: &[(f64, &str, f64)] = &[
    (97.0, "A+", 4.0),
    (93.0, "A", 4.0),
    (90.0, "A-", 3.7),
    (87.0, "B+", 3.3),
    (83.0, "B", 3.0),
    (80.0, "B-", 2.7),
    (77.0, "C+", 2.3),
    (73.0, "C", 2.0),
    (70.0, "C-", 1.7),
    (67.0, "D+", 1.3),
    (63.0, "D", 1.0),
    (60.0, "D-", 0.7),
];

pub fn validate_score(score: f64) -> Result<(), AppError> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(AppError::bad_request(anyhow!(
            "Score must be between {} and {}",
            MIN_SCORE,
            MAX_SCORE
        )));
    }
    Ok(())
}

pub fn letter_grade(score: f64) -> &'static str {
    LETTER_SCALE
        .iter()
        .find(|(min, _, _)| score >= *min)
        .map(|(_, letter, _)| *letter)
        .unwrap_or("F")
}

/// Grade points for a letter. Unknown letters count as zero.
pub fn grade_points(letter: &str) -> f64 {
    LETTER_SCALE
        .iter()
        .find(|(_, l, _)| *l == letter)
        .map(|(_, _, points)| *points)
        .unwrap_or(0.0)
}

pub fn grade_points_for_score(score: f64) -> f64 {
    grade_points(letter_grade(score))
}

/// Weighted mean of `(score, weight)` pairs. `None` when there is nothing to
/// average or every weight is zero.
pub fn weighted_average(entries: &[(f64, f64)]) -> Option<f64> {
    let total_weight: f64 = entries.iter().map(|(_, w)| w).sum();
    if entries.is_empty() || total_weight <= 0.0 {
        return None;
    }
    let sum: f64 = entries.iter().map(|(score, w)| score * w).sum();
    Some(round2(sum / total_weight))
}

/// GPA over `(final score, credit hours)` pairs.
pub fn gpa(courses: &[(f64, i32)]) -> f64 {
    let total_credits: i32 = courses.iter().map(|(_, c)| *c).sum();
    if total_credits <= 0 {
        return 0.0;
    }
    let quality_points: f64 = courses
        .iter()
        .map(|(score, credits)| grade_points_for_score(*score) * f64::from(*credits))
        .sum();
    round2(quality_points / f64::from(total_credits))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_grade_table() {
        let cases = [
            (100.0, "A+"),
            (97.0, "A+"),
            (96.9, "A"),
            (93.0, "A"),
            (90.0, "A-"),
            (89.99, "B+"),
            (87.0, "B+"),
            (83.0, "B"),
            (80.0, "B-"),
            (77.0, "C+"),
            (73.0, "C"),
            (70.0, "C-"),
            (67.0, "D+"),
            (63.0, "D"),
            (60.0, "D-"),
            (59.99, "F"),
            (0.0, "F"),
        ];
        for (score, expected) in cases {
            assert_eq!(letter_grade(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_grade_points() {
        assert_eq!(grade_points("A+"), 4.0);
        assert_eq!(grade_points("A"), 4.0);
        assert_eq!(grade_points("B-"), 2.7);
        assert_eq!(grade_points("D-"), 0.7);
        assert_eq!(grade_points("F"), 0.0);
        assert_eq!(grade_points("Z"), 0.0);
    }

    #[test]
    fn test_validate_score_range() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(100.0).is_ok());
        assert!(validate_score(55.5).is_ok());
        assert!(validate_score(-0.1).is_err());
        assert!(validate_score(100.01).is_err());
        assert!(validate_score(f64::NAN).is_err());
    }

    #[test]
    fn test_gpa_weighted_by_credit_hours() {
        // A (4.0) x 3 credits + C (2.0) x 1 credit = 14 / 4 = 3.5
        assert_eq!(gpa(&[(95.0, 3), (74.0, 1)]), 3.5);
    }

    #[test]
    fn test_gpa_rounds_to_two_decimals() {
        // B+ (3.3) x 3 + A- (3.7) x 4 + F x 2 = 9.9 + 14.8 = 24.7 / 9 = 2.744...
        assert_eq!(gpa(&[(88.0, 3), (91.0, 4), (10.0, 2)]), 2.74);
    }

    #[test]
    fn test_gpa_without_credits_is_zero() {
        assert_eq!(gpa(&[]), 0.0);
        assert_eq!(gpa(&[(90.0, 0)]), 0.0);
    }

    #[test]
    fn test_weighted_average() {
        assert_eq!(weighted_average(&[(80.0, 1.0), (100.0, 3.0)]), Some(95.0));
        assert_eq!(weighted_average(&[(70.0, 0.0)]), None);
        assert_eq!(weighted_average(&[]), None);
    }
}
