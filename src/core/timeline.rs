use super::types::TimelineRow;

pub const DEFAULT_PERSUASION_COMPRESSION: f64 = 0.60;

// Back-loaded GOTV ramp: the final three weeks carry 25/35/20% of turnout
// votes, the remaining 20% spreads evenly across every earlier week.
const GOTV_FINAL_THREE: [f64; 3] = [0.25, 0.35, 0.20];
const GOTV_EARLY_SHARE: f64 = 0.20;

#[derive(Debug, Clone, Copy)]
pub struct TimelineInputs {
    pub weeks: u32,
    /// Fraction of the electorate expected to vote before election day.
    pub early_vote_share: f64,
    /// Persuasion weight applied at and after the early-vote cutoff week.
    pub persuasion_compression: f64,
    pub total_attempts: f64,
    pub persuasion_votes: f64,
    pub turnout_votes: f64,
}

/// Distributes the optimizer's totals across the remaining weeks.
/// Persuasion front-loads ahead of the early-vote cutoff; GOTV back-loads
/// into the final three weeks; attempts pace evenly.
pub fn compute_timeline(inputs: &TimelineInputs) -> Vec<TimelineRow> {
    let weeks = inputs.weeks as usize;
    if weeks == 0 {
        return Vec::new();
    }

    let persuasion_weights = persuasion_weights(inputs);
    let gotv_weights = gotv_weights(weeks);
    let attempts_per_week = inputs.total_attempts.max(0.0) / weeks as f64;
    let persuasion_total = inputs.persuasion_votes.max(0.0);
    let turnout_total = inputs.turnout_votes.max(0.0);

    let mut rows = Vec::with_capacity(weeks);
    let mut cumulative = 0.0;
    for week in 0..weeks {
        let persuasion = persuasion_total * persuasion_weights[week];
        let gotv = turnout_total * gotv_weights[week];
        let total = persuasion + gotv;
        cumulative += total;
        rows.push(TimelineRow {
            week: week as u32 + 1,
            attempts: attempts_per_week,
            persuasion_votes: persuasion,
            gotv_votes: gotv,
            total_votes: total,
            cumulative,
        });
    }

    rows
}

/// Week index (1-based) after which persuasion weight compresses: voters
/// who already voted early can no longer be persuaded.
pub fn early_vote_cutoff_week(weeks: u32, early_vote_share: f64) -> u32 {
    if weeks == 0 {
        return 0;
    }
    let share = early_vote_share.clamp(0.0, 1.0);
    let cutoff = (weeks as f64 * (1.0 - share)).ceil() as u32;
    cutoff.clamp(1, weeks)
}

fn persuasion_weights(inputs: &TimelineInputs) -> Vec<f64> {
    let weeks = inputs.weeks as usize;
    let cutoff = early_vote_cutoff_week(inputs.weeks, inputs.early_vote_share) as usize;
    let compression = if inputs.persuasion_compression.is_finite() {
        inputs.persuasion_compression.clamp(0.0, 1.0)
    } else {
        DEFAULT_PERSUASION_COMPRESSION
    };

    let raw: Vec<f64> = (1..=weeks)
        .map(|week| if week < cutoff { 1.0 } else { compression })
        .collect();
    normalize(raw)
}

fn gotv_weights(weeks: usize) -> Vec<f64> {
    if weeks <= 3 {
        return normalize(vec![1.0; weeks]);
    }

    let early_weeks = weeks - 3;
    let mut weights = vec![GOTV_EARLY_SHARE / early_weeks as f64; early_weeks];
    weights.extend_from_slice(&GOTV_FINAL_THREE);
    weights
}

fn normalize(weights: Vec<f64>) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        // Degenerate weighting (e.g. full compression to zero): fall back
        // to an even spread rather than dividing by zero.
        let n = weights.len();
        return vec![1.0 / n as f64; n];
    }
    weights.into_iter().map(|w| w / total).collect()
}
