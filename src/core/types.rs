use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UndecidedMode {
    Proportional,
    UserDefined,
    TowardYou,
    AgainstYou,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Volatility {
    Low,
    Medium,
    High,
}

impl Volatility {
    pub fn spread(self) -> f64 {
        match self {
            Volatility::Low => 0.10,
            Volatility::Medium => 0.20,
            Volatility::High => 0.30,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLabel {
    Safe,
    Tight,
    HighRisk,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TacticKind {
    Persuasion,
    Gotv,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingConstraint {
    Budget,
    Capacity,
    TacticsExhausted,
    NoTactics,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feasibility {
    NoGap,
    MissingRates,
    CeilingUnknown,
    Feasible,
    CapacityShortfall,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub support_pct: Option<f64>,
    /// Share of the undecided pool assigned to this candidate in
    /// user-defined split mode, as a percent of the undecided pool.
    pub undecided_share_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScenarioInputs {
    pub universe_size: Option<f64>,
    pub turnout_cycle_a_pct: Option<f64>,
    pub turnout_cycle_b_pct: Option<f64>,
    /// Overrides the two-cycle average when set.
    pub turnout_expected_pct: Option<f64>,
    pub turnout_band_pct: Option<f64>,
    pub win_buffer_pct: f64,
    pub candidates: Vec<Candidate>,
    pub your_candidate_id: Option<String>,
    pub undecided_pct: Option<f64>,
    pub undecided_mode: UndecidedMode,
    pub persuasion_pct: Option<f64>,
    pub movable_share_pct: Option<f64>,
    pub early_vote_pct: Option<f64>,
    pub contact_rate_pct: Option<f64>,
    pub persuasion_rate_pct: Option<f64>,
    pub turnout_reliability_pct: Option<f64>,
    pub gotv_universe: Option<f64>,
    pub gotv_rate_pct: Option<f64>,
    pub weeks_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoutSummary {
    pub expected_pct: Option<f64>,
    pub best_pct: Option<f64>,
    pub worst_pct: Option<f64>,
    pub votes_per_point: Option<f64>,
    pub best_votes: Option<f64>,
    pub worst_votes: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicResult {
    pub projected_turnout: Option<f64>,
    pub win_number: Option<f64>,
    pub buffered_win: Option<f64>,
    pub your_share_pct: Option<f64>,
    pub base_vote: Option<f64>,
    pub early_votes: Option<f64>,
    pub election_day_votes: Option<f64>,
    pub persuasion_universe: Option<f64>,
    pub effective_persuasion_universe: Option<f64>,
    pub persuasion_yield: Option<f64>,
    pub gotv_yield: Option<f64>,
    pub total_capacity: Option<f64>,
    pub persuasion_need: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub universe_ok: bool,
    pub turnout_ok: bool,
    pub candidate_table_ok: bool,
    pub user_split_ok: bool,
    pub persuasion_ok: bool,
    pub support_total_pct: Option<f64>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub turnout: TurnoutSummary,
    pub expected: DeterministicResult,
    pub validation: Validation,
    pub guardrails: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayTier {
    /// Cumulative-attempt boundary this tier applies below; `None` marks
    /// the unbounded final tier.
    pub upto_attempts: Option<f64>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tactic {
    pub id: String,
    pub label: String,
    pub kind: TacticKind,
    pub cost_per_attempt: f64,
    pub net_votes_per_attempt: f64,
    pub max_attempts: Option<f64>,
    pub decay_tiers: Option<Vec<DecayTier>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiRow {
    pub key: String,
    pub label: String,
    pub cost_per_attempt: Option<f64>,
    pub required_attempts: Option<f64>,
    pub cost_per_net_vote: Option<f64>,
    pub total_cost: Option<f64>,
    pub feasibility: Feasibility,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    pub id: String,
    pub attempts: f64,
    pub cost: f64,
    pub net_votes: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationTotals {
    pub cost: f64,
    pub attempts: f64,
    pub net_votes: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub allocation: Vec<AllocationEntry>,
    pub totals: OptimizationTotals,
    pub binding: BindingConstraint,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityEntry {
    pub variable: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSummary {
    pub runs: u32,
    pub win_prob_pct: f64,
    pub mean: f64,
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    pub std_dev: f64,
    pub mean_losing_margin: Option<f64>,
    pub sensitivity: Vec<SensitivityEntry>,
    pub risk: RiskLabel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRow {
    pub week: u32,
    pub attempts: f64,
    pub persuasion_votes: f64,
    pub gotv_votes: f64,
    pub total_votes: f64,
    pub cumulative: f64,
}
