//! Progress aggregation over a user's logged words and completion marks.
//!
//! All numbers here are derived from `user_kanji_words` and `completed_kanji`;
//! nothing is stored. Independent aggregates run concurrently.

use serde::Serialize;
use uuid::Uuid;

use crate::db::operations::progress::{
    self, JlptLevelProgress, KanjiProgress, LearningStreak, WordProgress,
};
use crate::db::Database;

const WORD_TIERS: [(i64, AchievementLevel); 3] = [
    (1_000, AchievementLevel::Master),
    (500, AchievementLevel::Advanced),
    (100, AchievementLevel::Intermediate),
];

const KANJI_TIERS: [(i64, AchievementLevel); 3] = [
    (1_000, AchievementLevel::Master),
    (500, AchievementLevel::Advanced),
    (100, AchievementLevel::Intermediate),
];

const STREAK_TIERS: [(i64, AchievementLevel); 3] = [
    (30, AchievementLevel::Master),
    (14, AchievementLevel::Advanced),
    (7, AchievementLevel::Intermediate),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Words,
    Kanji,
    Streak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementLevel {
    Intermediate,
    Advanced,
    Master,
}

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    #[serde(rename = "type")]
    pub category: AchievementCategory,
    pub level: AchievementLevel,
    pub threshold: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub kanji_progress: KanjiProgress,
    pub word_progress: WordProgress,
    pub jlpt_progress: Vec<JlptLevelProgress>,
    pub streak: LearningStreak,
    pub achievements: Vec<Achievement>,
}

/// Highest tier reached per category, at most one achievement each.
pub fn evaluate_achievements(
    total_words: i64,
    completed_kanji: i64,
    current_streak: i64,
) -> Vec<Achievement> {
    let mut achievements = Vec::new();

    if let Some(a) = highest_tier(AchievementCategory::Words, total_words, &WORD_TIERS) {
        achievements.push(a);
    }
    if let Some(a) = highest_tier(AchievementCategory::Kanji, completed_kanji, &KANJI_TIERS) {
        achievements.push(a);
    }
    if let Some(a) = highest_tier(AchievementCategory::Streak, current_streak, &STREAK_TIERS) {
        achievements.push(a);
    }

    achievements
}

fn highest_tier(
    category: AchievementCategory,
    value: i64,
    tiers: &[(i64, AchievementLevel)],
) -> Option<Achievement> {
    tiers
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(threshold, level)| Achievement {
            category,
            level: *level,
            threshold: *threshold,
        })
}

pub async fn user_progress_overview(
    db: &Database,
    user_id: &Uuid,
) -> Result<ProgressOverview, sqlx::Error> {
    let (kanji_progress, word_progress, jlpt_progress, streak) = tokio::try_join!(
        progress::kanji_progress(db, user_id),
        progress::word_progress(db, user_id),
        progress::progress_by_jlpt_level(db, user_id),
        progress::learning_streak(db, user_id),
    )?;

    let achievements = evaluate_achievements(
        word_progress.total_words,
        kanji_progress.completed,
        streak.current_streak,
    );

    Ok(ProgressOverview {
        kanji_progress,
        word_progress,
        jlpt_progress,
        streak,
        achievements,
    })
}

pub async fn user_achievements(
    db: &Database,
    user_id: &Uuid,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let (word_progress, kanji_progress, streak) = tokio::try_join!(
        progress::word_progress(db, user_id),
        progress::kanji_progress(db, user_id),
        progress::learning_streak(db, user_id),
    )?;

    Ok(evaluate_achievements(
        word_progress.total_words,
        kanji_progress.completed,
        streak.current_streak,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_achievements_below_all_thresholds() {
        assert!(evaluate_achievements(0, 0, 0).is_empty());
        assert!(evaluate_achievements(99, 99, 6).is_empty());
    }

    #[test]
    fn threshold_boundaries_are_inclusive() {
        let achievements = evaluate_achievements(100, 0, 0);
        assert_eq!(achievements.len(), 1);
        assert_eq!(achievements[0].category, AchievementCategory::Words);
        assert_eq!(achievements[0].level, AchievementLevel::Intermediate);
        assert_eq!(achievements[0].threshold, 100);

        let achievements = evaluate_achievements(0, 0, 7);
        assert_eq!(achievements[0].category, AchievementCategory::Streak);
        assert_eq!(achievements[0].level, AchievementLevel::Intermediate);
    }

    #[test]
    fn only_highest_tier_per_category() {
        let achievements = evaluate_achievements(1_200, 0, 0);
        assert_eq!(achievements.len(), 1);
        assert_eq!(achievements[0].level, AchievementLevel::Master);
        assert_eq!(achievements[0].threshold, 1_000);
    }

    #[test]
    fn one_achievement_per_qualifying_category() {
        let achievements = evaluate_achievements(500, 100, 30);
        assert_eq!(achievements.len(), 3);
        assert_eq!(achievements[0].category, AchievementCategory::Words);
        assert_eq!(achievements[0].level, AchievementLevel::Advanced);
        assert_eq!(achievements[1].category, AchievementCategory::Kanji);
        assert_eq!(achievements[1].level, AchievementLevel::Intermediate);
        assert_eq!(achievements[2].category, AchievementCategory::Streak);
        assert_eq!(achievements[2].level, AchievementLevel::Master);
    }

    #[test]
    fn achievement_serializes_with_type_field() {
        let achievements = evaluate_achievements(100, 0, 0);
        let json = serde_json::to_value(&achievements[0]).unwrap();
        assert_eq!(json["type"], "words");
        assert_eq!(json["level"], "intermediate");
        assert_eq!(json["threshold"], 100);
    }
}
