//! Win probability normalization and leaderboard ranking.

use tracing::debug;

use crate::error::DashboardError;
use crate::features::FeatureTable;
use crate::model::WinScorer;
use crate::types::{Leaderboard, LeaderboardEntry, RaceContext};

/// Score every horse under the given race context and rank the field.
///
/// The context is broadcast onto a copy of `features`, the scorer produces a
/// raw win score per row, and the scores are normalized into a distribution
/// over winners. Ties keep input order.
pub fn score(
    features: &FeatureTable,
    context: &RaceContext,
    scorer: &dyn WinScorer,
) -> Result<Leaderboard, DashboardError> {
    if features.is_empty() {
        return Err(DashboardError::ModelInput(
            "feature table has no horses".to_string(),
        ));
    }
    context.validate()?;

    let table = features.with_context(context);
    let matrix = table.to_matrix()?;

    let raw_scores = scorer.predict_win_probability(&matrix)?;
    if raw_scores.len() != table.len() {
        return Err(DashboardError::ModelInput(format!(
            "scorer returned {} scores for {} horses",
            raw_scores.len(),
            table.len()
        )));
    }

    let probabilities = normalize(&raw_scores)?;
    let entries = rank(&table.horse_names(), &raw_scores, &probabilities);

    debug!(
        horses = entries.len(),
        favourite = entries.first().map(|e| e.horse.as_str()).unwrap_or(""),
        "leaderboard computed"
    );

    Ok(Leaderboard {
        context: *context,
        entries,
    })
}

/// Divide each score by the batch sum.
///
/// Fails when any score is negative or non-finite, or the sum is not a
/// positive finite number.
pub fn normalize(raw_scores: &[f64]) -> Result<Vec<f64>, DashboardError> {
    if let Some(bad) = raw_scores.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(DashboardError::DegenerateScore(format!(
            "raw score {} is not a non-negative finite number",
            bad
        )));
    }

    let total: f64 = raw_scores.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(DashboardError::DegenerateScore(format!(
            "sum of raw scores is {}",
            total
        )));
    }

    Ok(raw_scores.iter().map(|s| s / total).collect())
}

/// Sort descending by probability (stable) and number the rows.
pub fn rank(horses: &[String], raw_scores: &[f64], probabilities: &[f64]) -> Vec<LeaderboardEntry> {
    let mut order: Vec<usize> = (0..horses.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    order
        .into_iter()
        .enumerate()
        .map(|(pos, i)| LeaderboardEntry {
            rank: pos + 1,
            horse: horses[i].clone(),
            raw_score: raw_scores[i],
            probability: probabilities[i],
            percentage: to_percentage(probabilities[i]),
        })
        .collect()
}

/// Probability as a percentage rounded to 2 decimals, halves to even.
pub fn to_percentage(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round_ties_even() / 100.0
}
