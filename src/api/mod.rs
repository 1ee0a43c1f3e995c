use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AdvancedRanges, BaseRates, CapacityInputs, Candidate, ChannelConfig, GotvChannelConfig,
    GotvConfig, MixBudgetConfig, MixCapacityConfig, MonteCarloInputs, MonteCarloSummary,
    OptimizationResult, PlanResult, RoiArgs, RoiCaps, RoiRow, ScenarioInputs, SimCapacity,
    SimRates, Tactic, TacticKind, TacticsConfig, TimelineInputs, TimelineRow, TriRange,
    UndecidedMode, Variability, Volatility, build_optimization_tactics, compute_all,
    compute_capacity_contacts, compute_roi_rows, compute_timeline, derive_need_votes,
    optimize_mix_budget, optimize_mix_capacity, run_monte_carlo,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliUndecidedMode {
    Proportional,
    UserDefined,
    TowardYou,
    AgainstYou,
}

impl From<CliUndecidedMode> for UndecidedMode {
    fn from(value: CliUndecidedMode) -> Self {
        match value {
            CliUndecidedMode::Proportional => UndecidedMode::Proportional,
            CliUndecidedMode::UserDefined => UndecidedMode::UserDefined,
            CliUndecidedMode::TowardYou => UndecidedMode::TowardYou,
            CliUndecidedMode::AgainstYou => UndecidedMode::AgainstYou,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliVolatility {
    Low,
    Medium,
    High,
}

impl From<CliVolatility> for Volatility {
    fn from(value: CliVolatility) -> Self {
        match value {
            CliVolatility::Low => Volatility::Low,
            CliVolatility::Medium => Volatility::Medium,
            CliVolatility::High => Volatility::High,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliVariabilityMode {
    Basic,
    Advanced,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliOptimizeMode {
    Budget,
    Capacity,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiUndecidedMode {
    Proportional,
    #[serde(alias = "userDefined", alias = "user_defined")]
    UserDefined,
    #[serde(alias = "toward", alias = "towardYou", alias = "toward_you")]
    TowardYou,
    #[serde(alias = "against", alias = "againstYou", alias = "against_you")]
    AgainstYou,
}

impl From<ApiUndecidedMode> for CliUndecidedMode {
    fn from(value: ApiUndecidedMode) -> Self {
        match value {
            ApiUndecidedMode::Proportional => CliUndecidedMode::Proportional,
            ApiUndecidedMode::UserDefined => CliUndecidedMode::UserDefined,
            ApiUndecidedMode::TowardYou => CliUndecidedMode::TowardYou,
            ApiUndecidedMode::AgainstYou => CliUndecidedMode::AgainstYou,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiVolatility {
    Low,
    #[serde(alias = "med")]
    Medium,
    High,
}

impl From<ApiVolatility> for CliVolatility {
    fn from(value: ApiVolatility) -> Self {
        match value {
            ApiVolatility::Low => CliVolatility::Low,
            ApiVolatility::Medium => CliVolatility::Medium,
            ApiVolatility::High => CliVolatility::High,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiVariabilityMode {
    Basic,
    Advanced,
}

impl From<ApiVariabilityMode> for CliVariabilityMode {
    fn from(value: ApiVariabilityMode) -> Self {
        match value {
            ApiVariabilityMode::Basic => CliVariabilityMode::Basic,
            ApiVariabilityMode::Advanced => CliVariabilityMode::Advanced,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiOptimizeMode {
    Budget,
    Capacity,
}

impl From<ApiOptimizeMode> for CliOptimizeMode {
    fn from(value: ApiOptimizeMode) -> Self {
        match value {
            ApiOptimizeMode::Budget => CliOptimizeMode::Budget,
            ApiOptimizeMode::Capacity => CliOptimizeMode::Capacity,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fieldpath",
    about = "Field plan calculator (win number + Monte Carlo risk + budget/capacity mix optimizer)"
)]
struct Cli {
    #[arg(long, help = "Voter universe size (registered or active basis)")]
    universe_size: Option<f64>,
    #[arg(long, help = "Historical turnout for cycle A in percent")]
    turnout_cycle_a: Option<f64>,
    #[arg(long, help = "Historical turnout for cycle B in percent")]
    turnout_cycle_b: Option<f64>,
    #[arg(
        long,
        help = "Expected turnout in percent; overrides the two-cycle average"
    )]
    turnout_expected: Option<f64>,
    #[arg(long, help = "Turnout band half-width in percentage points")]
    turnout_band: Option<f64>,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Safety buffer applied to the win number in percent"
    )]
    win_buffer: f64,
    #[arg(long, help = "Your candidate's support in percent")]
    your_support: Option<f64>,
    #[arg(long, help = "Opponent support in percent")]
    opponent_support: Option<f64>,
    #[arg(long, help = "Undecided share in percent")]
    undecided: Option<f64>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliUndecidedMode::Proportional,
        help = "How the undecided pool breaks across candidates"
    )]
    undecided_mode: CliUndecidedMode,
    #[arg(long, help = "Persuasion universe as percent of the full universe")]
    persuasion_share: Option<f64>,
    #[arg(
        long,
        help = "Movable share of the persuasion universe in percent; leave unset when the universe is already movable-only"
    )]
    movable_share: Option<f64>,
    #[arg(long, help = "Expected early-vote share of turnout in percent")]
    early_vote: Option<f64>,
    #[arg(long, help = "Contact rate in percent")]
    contact_rate: Option<f64>,
    #[arg(long, help = "Persuasion conversion rate in percent")]
    persuasion_rate: Option<f64>,
    #[arg(long, help = "Turnout reliability of persuaded voters in percent")]
    turnout_reliability: Option<f64>,
    #[arg(long, help = "GOTV universe head-count")]
    gotv_universe: Option<f64>,
    #[arg(long, help = "GOTV conversion rate in percent")]
    gotv_rate: Option<f64>,
    #[arg(long, help = "Weeks remaining; overrides --election-date")]
    weeks_remaining: Option<u32>,
    #[arg(long, help = "Election date (YYYY-MM-DD) used to derive weeks remaining")]
    election_date: Option<String>,

    #[arg(long, help = "Paid organizer count")]
    organizer_count: Option<f64>,
    #[arg(long, help = "Contact hours per organizer per week")]
    organizer_hours_per_week: Option<f64>,
    #[arg(long, help = "Volunteer capacity multiplier, 1.0 = organizers only")]
    volunteer_multiplier: Option<f64>,
    #[arg(
        long,
        help = "Share of contact hours on doors in percent; the rest is phones"
    )]
    door_share: Option<f64>,
    #[arg(long, help = "Door knocks per contact hour")]
    doors_per_hour: Option<f64>,
    #[arg(long, help = "Phone calls per contact hour")]
    calls_per_hour: Option<f64>,

    #[arg(long, default_value_t = 8000, help = "Monte Carlo run count")]
    runs: u32,
    #[arg(long, help = "Seed phrase for reproducible Monte Carlo output")]
    seed: Option<String>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliVariabilityMode::Basic,
        help = "Variability input mode: one volatility knob or explicit min/mode/max triples"
    )]
    variability_mode: CliVariabilityMode,
    #[arg(
        long,
        value_enum,
        default_value_t = CliVolatility::Medium,
        help = "Basic-mode volatility: low=10%, medium=20%, high=30% spread"
    )]
    volatility: CliVolatility,
    #[arg(long, help = "Advanced: contact rate minimum in percent")]
    contact_rate_min: Option<f64>,
    #[arg(long, help = "Advanced: contact rate mode in percent")]
    contact_rate_mode: Option<f64>,
    #[arg(long, help = "Advanced: contact rate maximum in percent")]
    contact_rate_max: Option<f64>,
    #[arg(long, help = "Advanced: persuasion rate minimum in percent")]
    persuasion_rate_min: Option<f64>,
    #[arg(long, help = "Advanced: persuasion rate mode in percent")]
    persuasion_rate_mode: Option<f64>,
    #[arg(long, help = "Advanced: persuasion rate maximum in percent")]
    persuasion_rate_max: Option<f64>,
    #[arg(long, help = "Advanced: turnout reliability minimum in percent")]
    turnout_reliability_min: Option<f64>,
    #[arg(long, help = "Advanced: turnout reliability mode in percent")]
    turnout_reliability_mode: Option<f64>,
    #[arg(long, help = "Advanced: turnout reliability maximum in percent")]
    turnout_reliability_max: Option<f64>,
    #[arg(long, help = "Advanced: doors per hour minimum")]
    doors_per_hour_min: Option<f64>,
    #[arg(long, help = "Advanced: doors per hour mode")]
    doors_per_hour_mode: Option<f64>,
    #[arg(long, help = "Advanced: doors per hour maximum")]
    doors_per_hour_max: Option<f64>,
    #[arg(long, help = "Advanced: calls per hour minimum")]
    calls_per_hour_min: Option<f64>,
    #[arg(long, help = "Advanced: calls per hour mode")]
    calls_per_hour_mode: Option<f64>,
    #[arg(long, help = "Advanced: calls per hour maximum")]
    calls_per_hour_max: Option<f64>,
    #[arg(long, help = "Advanced: volunteer multiplier minimum")]
    volunteer_multiplier_min: Option<f64>,
    #[arg(long, help = "Advanced: volunteer multiplier mode")]
    volunteer_multiplier_mode: Option<f64>,
    #[arg(long, help = "Advanced: volunteer multiplier maximum")]
    volunteer_multiplier_max: Option<f64>,
    #[arg(
        long,
        help = "Vote goal for simulation/optimization; defaults to the computed persuasion need"
    )]
    need_votes: Option<f64>,

    #[arg(long, action = clap::ArgAction::Set, default_value_t = true, help = "Include the doors channel")]
    doors_enabled: bool,
    #[arg(long, default_value_t = 1.25, help = "Cost per door attempt")]
    doors_cost: f64,
    #[arg(long, help = "Doors contact rate override in percent")]
    doors_contact_rate: Option<f64>,
    #[arg(long, help = "Doors persuasion rate override in percent")]
    doors_persuasion_rate: Option<f64>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true, help = "Include the phones channel")]
    phones_enabled: bool,
    #[arg(long, default_value_t = 0.45, help = "Cost per phone attempt")]
    phones_cost: f64,
    #[arg(long, help = "Phones contact rate override in percent")]
    phones_contact_rate: Option<f64>,
    #[arg(long, help = "Phones persuasion rate override in percent")]
    phones_persuasion_rate: Option<f64>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false, help = "Include the texts channel")]
    texts_enabled: bool,
    #[arg(long, default_value_t = 0.04, help = "Cost per text attempt")]
    texts_cost: f64,
    #[arg(long, help = "Texts contact rate override in percent")]
    texts_contact_rate: Option<f64>,
    #[arg(long, help = "Texts persuasion rate override in percent")]
    texts_persuasion_rate: Option<f64>,

    #[arg(long, help = "GOTV pool base universe head-count")]
    gotv_base_universe: Option<f64>,
    #[arg(long, help = "Non-voting share of the GOTV universe in percent")]
    gotv_non_voter_share: Option<f64>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false, help = "Enable the doors GOTV pool")]
    gotv_doors_enabled: bool,
    #[arg(long, help = "Doors GOTV lift per contact in percent")]
    gotv_doors_lift: Option<f64>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false, help = "Enable the phones GOTV pool")]
    gotv_phones_enabled: bool,
    #[arg(long, help = "Phones GOTV lift per contact in percent")]
    gotv_phones_lift: Option<f64>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false, help = "Enable the texts GOTV pool")]
    gotv_texts_enabled: bool,
    #[arg(long, help = "Texts GOTV lift per contact in percent")]
    gotv_texts_lift: Option<f64>,

    #[arg(
        long,
        value_enum,
        default_value_t = CliOptimizeMode::Budget,
        help = "Optimizer constraint: budget in currency or capacity in attempts"
    )]
    optimize_mode: CliOptimizeMode,
    #[arg(long, help = "Budget ceiling for budget-mode optimization")]
    budget: Option<f64>,
    #[arg(
        long,
        help = "Attempt ceiling for capacity-mode optimization; defaults to the computed capacity"
    )]
    capacity: Option<f64>,
    #[arg(
        long,
        default_value_t = 25.0,
        help = "Attempts allocated per optimizer step"
    )]
    step: f64,
    #[arg(long, help = "Total attempt ceiling applied even in budget mode")]
    capacity_ceiling: Option<f64>,
    #[arg(
        long,
        action = clap::ArgAction::Set,
        default_value_t = false,
        help = "Apply GOTV diminishing-returns decay tiers in the optimizer"
    )]
    use_decay: bool,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Fixed overhead spread across the ROI plan"
    )]
    overhead_amount: f64,
    #[arg(
        long,
        action = clap::ArgAction::Set,
        default_value_t = false,
        help = "Spread overhead into ROI cost per attempt"
    )]
    include_overhead: bool,
    #[arg(
        long,
        default_value_t = 60.0,
        help = "Persuasion weight after the early-vote cutoff week in percent"
    )]
    persuasion_compression: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePayload {
    id: Option<String>,
    name: Option<String>,
    support_pct: Option<f64>,
    undecided_share_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    universe_size: Option<f64>,
    turnout_cycle_a: Option<f64>,
    turnout_cycle_b: Option<f64>,
    turnout_expected: Option<f64>,
    turnout_band: Option<f64>,
    win_buffer: Option<f64>,
    candidates: Option<Vec<CandidatePayload>>,
    your_candidate_id: Option<String>,
    your_support: Option<f64>,
    opponent_support: Option<f64>,
    undecided: Option<f64>,
    undecided_mode: Option<ApiUndecidedMode>,
    persuasion_share: Option<f64>,
    movable_share: Option<f64>,
    early_vote: Option<f64>,
    contact_rate: Option<f64>,
    persuasion_rate: Option<f64>,
    turnout_reliability: Option<f64>,
    gotv_universe: Option<f64>,
    gotv_rate: Option<f64>,
    weeks_remaining: Option<u32>,
    election_date: Option<String>,

    organizer_count: Option<f64>,
    organizer_hours_per_week: Option<f64>,
    volunteer_multiplier: Option<f64>,
    door_share: Option<f64>,
    doors_per_hour: Option<f64>,
    calls_per_hour: Option<f64>,

    runs: Option<u32>,
    seed: Option<String>,
    variability_mode: Option<ApiVariabilityMode>,
    volatility: Option<ApiVolatility>,
    contact_rate_min: Option<f64>,
    contact_rate_mode: Option<f64>,
    contact_rate_max: Option<f64>,
    persuasion_rate_min: Option<f64>,
    persuasion_rate_mode: Option<f64>,
    persuasion_rate_max: Option<f64>,
    turnout_reliability_min: Option<f64>,
    turnout_reliability_mode: Option<f64>,
    turnout_reliability_max: Option<f64>,
    doors_per_hour_min: Option<f64>,
    doors_per_hour_mode: Option<f64>,
    doors_per_hour_max: Option<f64>,
    calls_per_hour_min: Option<f64>,
    calls_per_hour_mode: Option<f64>,
    calls_per_hour_max: Option<f64>,
    volunteer_multiplier_min: Option<f64>,
    volunteer_multiplier_mode: Option<f64>,
    volunteer_multiplier_max: Option<f64>,
    need_votes: Option<f64>,

    doors_enabled: Option<bool>,
    doors_cost: Option<f64>,
    doors_contact_rate: Option<f64>,
    doors_persuasion_rate: Option<f64>,
    phones_enabled: Option<bool>,
    phones_cost: Option<f64>,
    phones_contact_rate: Option<f64>,
    phones_persuasion_rate: Option<f64>,
    texts_enabled: Option<bool>,
    texts_cost: Option<f64>,
    texts_contact_rate: Option<f64>,
    texts_persuasion_rate: Option<f64>,

    gotv_base_universe: Option<f64>,
    gotv_non_voter_share: Option<f64>,
    gotv_doors_enabled: Option<bool>,
    gotv_doors_lift: Option<f64>,
    gotv_phones_enabled: Option<bool>,
    gotv_phones_lift: Option<f64>,
    gotv_texts_enabled: Option<bool>,
    gotv_texts_lift: Option<f64>,

    optimize_mode: Option<ApiOptimizeMode>,
    budget: Option<f64>,
    capacity: Option<f64>,
    step: Option<f64>,
    capacity_ceiling: Option<f64>,
    use_decay: Option<bool>,
    overhead_amount: Option<f64>,
    include_overhead: Option<bool>,
    persuasion_compression: Option<f64>,
}

#[derive(Debug)]
struct ApiRequest {
    cli: Cli,
    candidates: Option<Vec<CandidatePayload>>,
    your_candidate_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    weeks_remaining: Option<u32>,
    need_votes: Option<f64>,
    plan: PlanResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    weeks_remaining: Option<u32>,
    need_votes: Option<f64>,
    summary: MonteCarloSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeResponse {
    weeks_remaining: Option<u32>,
    need_votes: Option<f64>,
    tactics: Vec<Tactic>,
    roi: Vec<RoiRow>,
    optimization: OptimizationResult,
    timeline: Vec<TimelineRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn default_cli_for_api() -> Cli {
    Cli::parse_from(["fieldpath"])
}

fn api_request_from_payload(payload: ScenarioPayload) -> ApiRequest {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.universe_size {
        cli.universe_size = Some(v);
    }
    if let Some(v) = payload.turnout_cycle_a {
        cli.turnout_cycle_a = Some(v);
    }
    if let Some(v) = payload.turnout_cycle_b {
        cli.turnout_cycle_b = Some(v);
    }
    if let Some(v) = payload.turnout_expected {
        cli.turnout_expected = Some(v);
    }
    if let Some(v) = payload.turnout_band {
        cli.turnout_band = Some(v);
    }
    if let Some(v) = payload.win_buffer {
        cli.win_buffer = v;
    }
    if let Some(v) = payload.your_support {
        cli.your_support = Some(v);
    }
    if let Some(v) = payload.opponent_support {
        cli.opponent_support = Some(v);
    }
    if let Some(v) = payload.undecided {
        cli.undecided = Some(v);
    }
    if let Some(v) = payload.undecided_mode {
        cli.undecided_mode = v.into();
    }
    if let Some(v) = payload.persuasion_share {
        cli.persuasion_share = Some(v);
    }
    if let Some(v) = payload.movable_share {
        cli.movable_share = Some(v);
    }
    if let Some(v) = payload.early_vote {
        cli.early_vote = Some(v);
    }
    if let Some(v) = payload.contact_rate {
        cli.contact_rate = Some(v);
    }
    if let Some(v) = payload.persuasion_rate {
        cli.persuasion_rate = Some(v);
    }
    if let Some(v) = payload.turnout_reliability {
        cli.turnout_reliability = Some(v);
    }
    if let Some(v) = payload.gotv_universe {
        cli.gotv_universe = Some(v);
    }
    if let Some(v) = payload.gotv_rate {
        cli.gotv_rate = Some(v);
    }
    if let Some(v) = payload.weeks_remaining {
        cli.weeks_remaining = Some(v);
    }
    if let Some(v) = payload.election_date {
        cli.election_date = Some(v);
    }

    if let Some(v) = payload.organizer_count {
        cli.organizer_count = Some(v);
    }
    if let Some(v) = payload.organizer_hours_per_week {
        cli.organizer_hours_per_week = Some(v);
    }
    if let Some(v) = payload.volunteer_multiplier {
        cli.volunteer_multiplier = Some(v);
    }
    if let Some(v) = payload.door_share {
        cli.door_share = Some(v);
    }
    if let Some(v) = payload.doors_per_hour {
        cli.doors_per_hour = Some(v);
    }
    if let Some(v) = payload.calls_per_hour {
        cli.calls_per_hour = Some(v);
    }

    if let Some(v) = payload.runs {
        cli.runs = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = Some(v);
    }
    if let Some(v) = payload.variability_mode {
        cli.variability_mode = v.into();
    }
    if let Some(v) = payload.volatility {
        cli.volatility = v.into();
    }
    if let Some(v) = payload.contact_rate_min {
        cli.contact_rate_min = Some(v);
    }
    if let Some(v) = payload.contact_rate_mode {
        cli.contact_rate_mode = Some(v);
    }
    if let Some(v) = payload.contact_rate_max {
        cli.contact_rate_max = Some(v);
    }
    if let Some(v) = payload.persuasion_rate_min {
        cli.persuasion_rate_min = Some(v);
    }
    if let Some(v) = payload.persuasion_rate_mode {
        cli.persuasion_rate_mode = Some(v);
    }
    if let Some(v) = payload.persuasion_rate_max {
        cli.persuasion_rate_max = Some(v);
    }
    if let Some(v) = payload.turnout_reliability_min {
        cli.turnout_reliability_min = Some(v);
    }
    if let Some(v) = payload.turnout_reliability_mode {
        cli.turnout_reliability_mode = Some(v);
    }
    if let Some(v) = payload.turnout_reliability_max {
        cli.turnout_reliability_max = Some(v);
    }
    if let Some(v) = payload.doors_per_hour_min {
        cli.doors_per_hour_min = Some(v);
    }
    if let Some(v) = payload.doors_per_hour_mode {
        cli.doors_per_hour_mode = Some(v);
    }
    if let Some(v) = payload.doors_per_hour_max {
        cli.doors_per_hour_max = Some(v);
    }
    if let Some(v) = payload.calls_per_hour_min {
        cli.calls_per_hour_min = Some(v);
    }
    if let Some(v) = payload.calls_per_hour_mode {
        cli.calls_per_hour_mode = Some(v);
    }
    if let Some(v) = payload.calls_per_hour_max {
        cli.calls_per_hour_max = Some(v);
    }
    if let Some(v) = payload.volunteer_multiplier_min {
        cli.volunteer_multiplier_min = Some(v);
    }
    if let Some(v) = payload.volunteer_multiplier_mode {
        cli.volunteer_multiplier_mode = Some(v);
    }
    if let Some(v) = payload.volunteer_multiplier_max {
        cli.volunteer_multiplier_max = Some(v);
    }
    if let Some(v) = payload.need_votes {
        cli.need_votes = Some(v);
    }

    if let Some(v) = payload.doors_enabled {
        cli.doors_enabled = v;
    }
    if let Some(v) = payload.doors_cost {
        cli.doors_cost = v;
    }
    if let Some(v) = payload.doors_contact_rate {
        cli.doors_contact_rate = Some(v);
    }
    if let Some(v) = payload.doors_persuasion_rate {
        cli.doors_persuasion_rate = Some(v);
    }
    if let Some(v) = payload.phones_enabled {
        cli.phones_enabled = v;
    }
    if let Some(v) = payload.phones_cost {
        cli.phones_cost = v;
    }
    if let Some(v) = payload.phones_contact_rate {
        cli.phones_contact_rate = Some(v);
    }
    if let Some(v) = payload.phones_persuasion_rate {
        cli.phones_persuasion_rate = Some(v);
    }
    if let Some(v) = payload.texts_enabled {
        cli.texts_enabled = v;
    }
    if let Some(v) = payload.texts_cost {
        cli.texts_cost = v;
    }
    if let Some(v) = payload.texts_contact_rate {
        cli.texts_contact_rate = Some(v);
    }
    if let Some(v) = payload.texts_persuasion_rate {
        cli.texts_persuasion_rate = Some(v);
    }

    if let Some(v) = payload.gotv_base_universe {
        cli.gotv_base_universe = Some(v);
    }
    if let Some(v) = payload.gotv_non_voter_share {
        cli.gotv_non_voter_share = Some(v);
    }
    if let Some(v) = payload.gotv_doors_enabled {
        cli.gotv_doors_enabled = v;
    }
    if let Some(v) = payload.gotv_doors_lift {
        cli.gotv_doors_lift = Some(v);
    }
    if let Some(v) = payload.gotv_phones_enabled {
        cli.gotv_phones_enabled = v;
    }
    if let Some(v) = payload.gotv_phones_lift {
        cli.gotv_phones_lift = Some(v);
    }
    if let Some(v) = payload.gotv_texts_enabled {
        cli.gotv_texts_enabled = v;
    }
    if let Some(v) = payload.gotv_texts_lift {
        cli.gotv_texts_lift = Some(v);
    }

    if let Some(v) = payload.optimize_mode {
        cli.optimize_mode = v.into();
    }
    if let Some(v) = payload.budget {
        cli.budget = Some(v);
    }
    if let Some(v) = payload.capacity {
        cli.capacity = Some(v);
    }
    if let Some(v) = payload.step {
        cli.step = v;
    }
    if let Some(v) = payload.capacity_ceiling {
        cli.capacity_ceiling = Some(v);
    }
    if let Some(v) = payload.use_decay {
        cli.use_decay = v;
    }
    if let Some(v) = payload.overhead_amount {
        cli.overhead_amount = v;
    }
    if let Some(v) = payload.include_overhead {
        cli.include_overhead = v;
    }
    if let Some(v) = payload.persuasion_compression {
        cli.persuasion_compression = v;
    }

    ApiRequest {
        cli,
        candidates: payload.candidates,
        your_candidate_id: payload.your_candidate_id,
    }
}

fn check_pct(name: &str, value: Option<f64>) -> Result<(), String> {
    if let Some(v) = value {
        if !v.is_finite() || !(0.0..=100.0).contains(&v) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }
    Ok(())
}

fn check_non_negative(name: &str, value: Option<f64>) -> Result<(), String> {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }
    Ok(())
}

fn derive_weeks_remaining(cli: &Cli) -> Result<Option<u32>, String> {
    if let Some(weeks) = cli.weeks_remaining {
        return Ok(Some(weeks));
    }
    let Some(date) = cli.election_date.as_deref() else {
        return Ok(None);
    };

    let election = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| "--election-date must be formatted YYYY-MM-DD".to_string())?;
    let today = chrono::Local::now().date_naive();
    let days = (election - today).num_days();
    Ok(Some((days.max(0) as f64 / 7.0).ceil() as u32))
}

fn build_scenario_inputs(request: &ApiRequest) -> Result<ScenarioInputs, String> {
    let cli = &request.cli;

    check_pct("--turnout-cycle-a", cli.turnout_cycle_a)?;
    check_pct("--turnout-cycle-b", cli.turnout_cycle_b)?;
    check_pct("--turnout-expected", cli.turnout_expected)?;
    check_pct("--turnout-band", cli.turnout_band)?;
    check_pct("--win-buffer", Some(cli.win_buffer))?;
    check_pct("--undecided", cli.undecided)?;
    check_pct("--persuasion-share", cli.persuasion_share)?;
    check_pct("--movable-share", cli.movable_share)?;
    check_pct("--early-vote", cli.early_vote)?;
    check_pct("--contact-rate", cli.contact_rate)?;
    check_pct("--persuasion-rate", cli.persuasion_rate)?;
    check_pct("--turnout-reliability", cli.turnout_reliability)?;
    check_pct("--gotv-rate", cli.gotv_rate)?;
    check_non_negative("--universe-size", cli.universe_size)?;
    check_non_negative("--gotv-universe", cli.gotv_universe)?;

    let weeks = derive_weeks_remaining(cli)?;
    let candidates = build_candidates(request)?;
    let your_candidate_id = resolve_your_candidate_id(request, &candidates);

    Ok(ScenarioInputs {
        universe_size: cli.universe_size,
        turnout_cycle_a_pct: cli.turnout_cycle_a,
        turnout_cycle_b_pct: cli.turnout_cycle_b,
        turnout_expected_pct: cli.turnout_expected,
        turnout_band_pct: cli.turnout_band,
        win_buffer_pct: cli.win_buffer,
        candidates,
        your_candidate_id,
        undecided_pct: cli.undecided,
        undecided_mode: cli.undecided_mode.into(),
        persuasion_pct: cli.persuasion_share,
        movable_share_pct: cli.movable_share,
        early_vote_pct: cli.early_vote,
        contact_rate_pct: cli.contact_rate,
        persuasion_rate_pct: cli.persuasion_rate,
        turnout_reliability_pct: cli.turnout_reliability,
        gotv_universe: cli.gotv_universe,
        gotv_rate_pct: cli.gotv_rate,
        weeks_remaining: weeks,
    })
}

fn build_candidates(request: &ApiRequest) -> Result<Vec<Candidate>, String> {
    if let Some(payload) = &request.candidates {
        let mut out = Vec::with_capacity(payload.len());
        for (index, c) in payload.iter().enumerate() {
            check_pct("candidates[].supportPct", c.support_pct)?;
            check_pct("candidates[].undecidedSharePct", c.undecided_share_pct)?;
            out.push(Candidate {
                id: c.id.clone().unwrap_or_else(|| format!("candidate-{index}")),
                name: c
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Candidate {index}")),
                support_pct: c.support_pct,
                undecided_share_pct: c.undecided_share_pct,
            });
        }
        return Ok(out);
    }

    // Flat two-candidate shortcut for query-string callers.
    let cli = &request.cli;
    check_pct("--your-support", cli.your_support)?;
    check_pct("--opponent-support", cli.opponent_support)?;
    Ok(vec![
        Candidate {
            id: "you".to_string(),
            name: "You".to_string(),
            support_pct: cli.your_support,
            undecided_share_pct: None,
        },
        Candidate {
            id: "opponent".to_string(),
            name: "Opponent".to_string(),
            support_pct: cli.opponent_support,
            undecided_share_pct: None,
        },
    ])
}

fn resolve_your_candidate_id(request: &ApiRequest, candidates: &[Candidate]) -> Option<String> {
    request
        .your_candidate_id
        .clone()
        .or_else(|| candidates.first().map(|c| c.id.clone()))
}

fn build_monte_carlo_inputs(cli: &Cli, need_votes: f64) -> Result<MonteCarloInputs, String> {
    if cli.runs == 0 {
        return Err("--runs must be > 0".to_string());
    }
    check_pct("--door-share", cli.door_share)?;
    check_non_negative("--organizer-count", cli.organizer_count)?;
    check_non_negative("--organizer-hours-per-week", cli.organizer_hours_per_week)?;
    check_non_negative("--volunteer-multiplier", cli.volunteer_multiplier)?;
    check_non_negative("--doors-per-hour", cli.doors_per_hour)?;
    check_non_negative("--calls-per-hour", cli.calls_per_hour)?;

    let weeks = derive_weeks_remaining(cli)?.unwrap_or(0);
    let rates = SimRates {
        contact: pct_fraction(cli.contact_rate),
        support: pct_fraction(cli.persuasion_rate),
        turnout_reliability: pct_fraction(cli.turnout_reliability),
    };
    let capacity = SimCapacity {
        weeks: weeks as f64,
        organizer_count: cli.organizer_count.unwrap_or(0.0),
        organizer_hours_per_week: cli.organizer_hours_per_week.unwrap_or(0.0),
        volunteer_multiplier: cli.volunteer_multiplier.unwrap_or(1.0),
        door_share: pct_fraction(cli.door_share),
        doors_per_hour: cli.doors_per_hour.unwrap_or(0.0),
        calls_per_hour: cli.calls_per_hour.unwrap_or(0.0),
    };

    let variability = match cli.variability_mode {
        CliVariabilityMode::Basic => Variability::Basic(cli.volatility.into()),
        CliVariabilityMode::Advanced => Variability::Advanced(AdvancedRanges {
            contact: pct_range(
                "--contact-rate",
                rates.contact,
                cli.contact_rate_min,
                cli.contact_rate_mode,
                cli.contact_rate_max,
            )?,
            support: pct_range(
                "--persuasion-rate",
                rates.support,
                cli.persuasion_rate_min,
                cli.persuasion_rate_mode,
                cli.persuasion_rate_max,
            )?,
            turnout_reliability: pct_range(
                "--turnout-reliability",
                rates.turnout_reliability,
                cli.turnout_reliability_min,
                cli.turnout_reliability_mode,
                cli.turnout_reliability_max,
            )?,
            doors_per_hour: raw_range(
                "--doors-per-hour",
                capacity.doors_per_hour,
                cli.doors_per_hour_min,
                cli.doors_per_hour_mode,
                cli.doors_per_hour_max,
            )?,
            calls_per_hour: raw_range(
                "--calls-per-hour",
                capacity.calls_per_hour,
                cli.calls_per_hour_min,
                cli.calls_per_hour_mode,
                cli.calls_per_hour_max,
            )?,
            volunteer_multiplier: raw_range(
                "--volunteer-multiplier",
                capacity.volunteer_multiplier,
                cli.volunteer_multiplier_min,
                cli.volunteer_multiplier_mode,
                cli.volunteer_multiplier_max,
            )?,
        }),
    };

    Ok(MonteCarloInputs {
        rates,
        capacity,
        need_votes,
        variability,
        runs: cli.runs,
        seed: cli.seed.clone(),
    })
}

fn pct_fraction(pct: Option<f64>) -> f64 {
    pct.map(|p| p.clamp(0.0, 100.0) / 100.0).unwrap_or(0.0)
}

fn pct_range(
    name: &str,
    base: f64,
    min: Option<f64>,
    mode: Option<f64>,
    max: Option<f64>,
) -> Result<TriRange, String> {
    check_pct(&format!("{name}-min"), min)?;
    check_pct(&format!("{name}-mode"), mode)?;
    check_pct(&format!("{name}-max"), max)?;
    finish_range(
        name,
        min.map(|v| v / 100.0).unwrap_or(base),
        mode.map(|v| v / 100.0).unwrap_or(base),
        max.map(|v| v / 100.0).unwrap_or(base),
    )
}

fn raw_range(
    name: &str,
    base: f64,
    min: Option<f64>,
    mode: Option<f64>,
    max: Option<f64>,
) -> Result<TriRange, String> {
    check_non_negative(&format!("{name}-min"), min)?;
    check_non_negative(&format!("{name}-mode"), mode)?;
    check_non_negative(&format!("{name}-max"), max)?;
    finish_range(
        name,
        min.unwrap_or(base),
        mode.unwrap_or(base),
        max.unwrap_or(base),
    )
}

fn finish_range(name: &str, min: f64, mode: f64, max: f64) -> Result<TriRange, String> {
    if !(min <= mode && mode <= max) {
        return Err(format!("{name} range must satisfy min <= mode <= max"));
    }
    Ok(TriRange { min, mode, max })
}

fn build_base_rates(cli: &Cli) -> BaseRates {
    BaseRates {
        contact: cli.contact_rate.map(|p| p.clamp(0.0, 100.0) / 100.0),
        support: cli.persuasion_rate.map(|p| p.clamp(0.0, 100.0) / 100.0),
        turnout_reliability: cli.turnout_reliability.map(|p| p.clamp(0.0, 100.0) / 100.0),
    }
}

fn build_tactics_config(cli: &Cli) -> Result<TacticsConfig, String> {
    for (name, cost) in [
        ("--doors-cost", cli.doors_cost),
        ("--phones-cost", cli.phones_cost),
        ("--texts-cost", cli.texts_cost),
    ] {
        if !cost.is_finite() || cost < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }
    check_pct("--doors-contact-rate", cli.doors_contact_rate)?;
    check_pct("--doors-persuasion-rate", cli.doors_persuasion_rate)?;
    check_pct("--phones-contact-rate", cli.phones_contact_rate)?;
    check_pct("--phones-persuasion-rate", cli.phones_persuasion_rate)?;
    check_pct("--texts-contact-rate", cli.texts_contact_rate)?;
    check_pct("--texts-persuasion-rate", cli.texts_persuasion_rate)?;

    Ok(TacticsConfig {
        doors: ChannelConfig {
            enabled: cli.doors_enabled,
            cost_per_attempt: Some(cli.doors_cost),
            contact_rate_pct: cli.doors_contact_rate,
            support_rate_pct: cli.doors_persuasion_rate,
        },
        phones: ChannelConfig {
            enabled: cli.phones_enabled,
            cost_per_attempt: Some(cli.phones_cost),
            contact_rate_pct: cli.phones_contact_rate,
            support_rate_pct: cli.phones_persuasion_rate,
        },
        texts: ChannelConfig {
            enabled: cli.texts_enabled,
            cost_per_attempt: Some(cli.texts_cost),
            contact_rate_pct: cli.texts_contact_rate,
            support_rate_pct: cli.texts_persuasion_rate,
        },
    })
}

fn build_gotv_config(cli: &Cli) -> Result<Option<GotvConfig>, String> {
    if !(cli.gotv_doors_enabled || cli.gotv_phones_enabled || cli.gotv_texts_enabled) {
        return Ok(None);
    }
    check_non_negative("--gotv-base-universe", cli.gotv_base_universe)?;
    check_pct("--gotv-non-voter-share", cli.gotv_non_voter_share)?;
    check_pct("--gotv-doors-lift", cli.gotv_doors_lift)?;
    check_pct("--gotv-phones-lift", cli.gotv_phones_lift)?;
    check_pct("--gotv-texts-lift", cli.gotv_texts_lift)?;

    Ok(Some(GotvConfig {
        base_universe: cli.gotv_base_universe,
        non_voter_share: cli.gotv_non_voter_share.map(|p| p / 100.0),
        doors: GotvChannelConfig {
            enabled: cli.gotv_doors_enabled,
            lift_pct: cli.gotv_doors_lift,
        },
        phones: GotvChannelConfig {
            enabled: cli.gotv_phones_enabled,
            lift_pct: cli.gotv_phones_lift,
        },
        texts: GotvChannelConfig {
            enabled: cli.gotv_texts_enabled,
            lift_pct: cli.gotv_texts_lift,
        },
    }))
}

fn capacity_inputs(cli: &Cli) -> CapacityInputs {
    CapacityInputs {
        organizer_count: cli.organizer_count,
        organizer_hours_per_week: cli.organizer_hours_per_week,
        volunteer_multiplier: cli.volunteer_multiplier,
        door_share: cli.door_share.map(|p| p.clamp(0.0, 100.0) / 100.0),
        doors_per_hour: cli.doors_per_hour,
        calls_per_hour: cli.calls_per_hour,
    }
}

fn resolve_need_votes(cli: &Cli, plan: &PlanResult) -> Option<f64> {
    match cli.need_votes {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => derive_need_votes(plan),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/plan", get(plan_get_handler).post(plan_post_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/optimize",
            get(optimize_get_handler).post(optimize_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "field plan API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plan_get_handler(Query(payload): Query<ScenarioPayload>) -> Response {
    plan_handler_impl(payload).await
}

async fn plan_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    plan_handler_impl(payload).await
}

async fn plan_handler_impl(payload: ScenarioPayload) -> Response {
    let request = api_request_from_payload(payload);
    let inputs = match build_scenario_inputs(&request) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let plan = compute_all(&inputs);
    let need_votes = resolve_need_votes(&request.cli, &plan);
    let response = PlanResponse {
        weeks_remaining: inputs.weeks_remaining,
        need_votes,
        plan,
    };
    json_response(StatusCode::OK, response)
}

async fn simulate_get_handler(Query(payload): Query<ScenarioPayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: ScenarioPayload) -> Response {
    let request = api_request_from_payload(payload);
    let inputs = match build_scenario_inputs(&request) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let plan = compute_all(&inputs);
    let need_votes = resolve_need_votes(&request.cli, &plan);

    let mc_inputs = match build_monte_carlo_inputs(&request.cli, need_votes.unwrap_or(0.0)) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let summary = match run_monte_carlo(&mc_inputs) {
        Ok(summary) => summary,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let response = SimulateResponse {
        weeks_remaining: inputs.weeks_remaining,
        need_votes,
        summary,
    };
    json_response(StatusCode::OK, response)
}

async fn optimize_get_handler(Query(payload): Query<ScenarioPayload>) -> Response {
    optimize_handler_impl(payload).await
}

async fn optimize_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    optimize_handler_impl(payload).await
}

async fn optimize_handler_impl(payload: ScenarioPayload) -> Response {
    let request = api_request_from_payload(payload);
    let inputs = match build_scenario_inputs(&request) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let cli = &request.cli;

    if !cli.step.is_finite() || cli.step <= 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "--step must be > 0");
    }
    if !cli.overhead_amount.is_finite() || cli.overhead_amount < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "--overhead-amount must be >= 0");
    }
    if !(0.0..=100.0).contains(&cli.persuasion_compression) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "--persuasion-compression must be between 0 and 100",
        );
    }

    let plan = compute_all(&inputs);
    let need_votes = resolve_need_votes(cli, &plan);

    let base_rates = build_base_rates(cli);
    let tactics_config = match build_tactics_config(cli) {
        Ok(config) => config,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let gotv_config = match build_gotv_config(cli) {
        Ok(config) => config,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let tactics = build_optimization_tactics(&base_rates, &tactics_config, gotv_config.as_ref());

    let computed_capacity =
        compute_capacity_contacts(inputs.weeks_remaining, &capacity_inputs(cli));
    let caps = RoiCaps {
        total: computed_capacity,
        ..RoiCaps::default()
    };
    let roi = compute_roi_rows(&RoiArgs {
        goal_net_votes: need_votes,
        base: &base_rates,
        config: &tactics_config,
        overhead_amount: cli.overhead_amount,
        include_overhead: cli.include_overhead,
        caps: Some(&caps),
    });

    let optimization = match cli.optimize_mode {
        CliOptimizeMode::Budget => {
            let Some(budget) = cli.budget else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "--budget is required in budget mode",
                );
            };
            if !budget.is_finite() || budget < 0.0 {
                return error_response(StatusCode::BAD_REQUEST, "--budget must be >= 0");
            }
            optimize_mix_budget(
                &tactics,
                MixBudgetConfig {
                    budget,
                    step: cli.step,
                    capacity_ceiling: cli.capacity_ceiling.or(computed_capacity),
                    use_decay: cli.use_decay,
                },
            )
        }
        CliOptimizeMode::Capacity => {
            let Some(capacity) = cli.capacity.or(computed_capacity) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "--capacity is required when capacity inputs are incomplete",
                );
            };
            if !capacity.is_finite() || capacity < 0.0 {
                return error_response(StatusCode::BAD_REQUEST, "--capacity must be >= 0");
            }
            optimize_mix_capacity(
                &tactics,
                MixCapacityConfig {
                    capacity,
                    step: cli.step,
                    use_decay: cli.use_decay,
                },
            )
        }
    };

    let timeline = build_timeline(cli, &inputs, &tactics, &optimization);

    let response = OptimizeResponse {
        weeks_remaining: inputs.weeks_remaining,
        need_votes,
        tactics,
        roi,
        optimization,
        timeline,
    };
    json_response(StatusCode::OK, response)
}

fn build_timeline(
    cli: &Cli,
    inputs: &ScenarioInputs,
    tactics: &[Tactic],
    optimization: &OptimizationResult,
) -> Vec<TimelineRow> {
    let Some(weeks) = inputs.weeks_remaining else {
        return Vec::new();
    };

    let mut persuasion_votes = 0.0;
    let mut turnout_votes = 0.0;
    for entry in &optimization.allocation {
        let kind = tactics
            .iter()
            .find(|t| t.id == entry.id)
            .map(|t| t.kind)
            .unwrap_or(TacticKind::Persuasion);
        match kind {
            TacticKind::Persuasion => persuasion_votes += entry.net_votes,
            TacticKind::Gotv => turnout_votes += entry.net_votes,
        }
    }

    compute_timeline(&TimelineInputs {
        weeks,
        early_vote_share: pct_fraction(inputs.early_vote_pct),
        persuasion_compression: cli.persuasion_compression / 100.0,
        total_attempts: optimization.totals.attempts,
        persuasion_votes,
        turnout_votes,
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ScenarioPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(api_request_from_payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BindingConstraint;

    fn sample_json() -> &'static str {
        r#"{
            "universeSize": 100000,
            "turnoutExpected": 44,
            "winBuffer": 4,
            "yourSupport": 0,
            "opponentSupport": 70,
            "undecided": 30,
            "persuasionShare": 30,
            "contactRate": 22,
            "persuasionRate": 55,
            "turnoutReliability": 80,
            "weeksRemaining": 8,
            "organizerCount": 2,
            "organizerHoursPerWeek": 20,
            "volunteerMultiplier": 1.5,
            "doorShare": 60,
            "doorsPerHour": 12,
            "callsPerHour": 30,
            "runs": 500,
            "seed": "api-test-seed"
        }"#
    }

    #[test]
    fn payload_overlays_cli_defaults() {
        let request = api_request_from_json(sample_json()).expect("json should parse");
        assert_eq!(request.cli.universe_size, Some(100_000.0));
        assert_eq!(request.cli.turnout_expected, Some(44.0));
        assert_eq!(request.cli.runs, 500);
        assert_eq!(request.cli.seed.as_deref(), Some("api-test-seed"));
        // Untouched fields keep their CLI defaults.
        assert_eq!(request.cli.win_buffer, 4.0);
        assert_eq!(request.cli.step, 25.0);
        assert!(request.cli.doors_enabled);
        assert!(!request.cli.texts_enabled);
    }

    #[test]
    fn undecided_mode_aliases_parse() {
        let request =
            api_request_from_json(r#"{ "undecidedMode": "toward" }"#).expect("must parse");
        assert_eq!(request.cli.undecided_mode, CliUndecidedMode::TowardYou);
        let request =
            api_request_from_json(r#"{ "undecidedMode": "user_defined" }"#).expect("must parse");
        assert_eq!(request.cli.undecided_mode, CliUndecidedMode::UserDefined);
    }

    #[test]
    fn scenario_inputs_reject_out_of_range_percent() {
        let request = api_request_from_json(r#"{ "contactRate": 140 }"#).expect("must parse");
        let err = build_scenario_inputs(&request).expect_err("must reject");
        assert!(err.contains("--contact-rate"));
    }

    #[test]
    fn scenario_inputs_reject_bad_election_date() {
        let request =
            api_request_from_json(r#"{ "electionDate": "next tuesday" }"#).expect("must parse");
        let err = build_scenario_inputs(&request).expect_err("must reject");
        assert!(err.contains("--election-date"));
    }

    #[test]
    fn explicit_weeks_override_election_date() {
        let request =
            api_request_from_json(r#"{ "weeksRemaining": 6, "electionDate": "2030-11-05" }"#)
                .expect("must parse");
        let weeks = derive_weeks_remaining(&request.cli).expect("must derive");
        assert_eq!(weeks, Some(6));
    }

    #[test]
    fn candidates_payload_wins_over_flat_shortcut() {
        let request = api_request_from_json(
            r#"{
                "yourSupport": 10,
                "candidates": [
                    { "id": "a", "name": "Alice", "supportPct": 40 },
                    { "id": "b", "name": "Bob", "supportPct": 30 }
                ],
                "yourCandidateId": "b",
                "undecided": 30
            }"#,
        )
        .expect("must parse");
        let inputs = build_scenario_inputs(&request).expect("must build");
        assert_eq!(inputs.candidates.len(), 2);
        assert_eq!(inputs.your_candidate_id.as_deref(), Some("b"));
        assert_eq!(inputs.candidates[0].name, "Alice");
    }

    #[test]
    fn plan_pipeline_reproduces_the_worked_scenario() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let inputs = build_scenario_inputs(&request).expect("must build");
        let plan = compute_all(&inputs);
        assert_eq!(plan.expected.projected_turnout, Some(44_000.0));
        assert_eq!(plan.expected.buffered_win, Some(22_882.0));
        assert_eq!(plan.expected.persuasion_need, Some(19_252.0));
        assert_eq!(resolve_need_votes(&request.cli, &plan), Some(19_252.0));
    }

    #[test]
    fn monte_carlo_inputs_convert_percent_to_fractions() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let mc = build_monte_carlo_inputs(&request.cli, 1_000.0).expect("must build");
        assert!((mc.rates.contact - 0.22).abs() < 1e-12);
        assert!((mc.capacity.door_share - 0.60).abs() < 1e-12);
        assert_eq!(mc.capacity.weeks, 8.0);
        assert_eq!(mc.runs, 500);
    }

    #[test]
    fn advanced_mode_defaults_missing_ranges_to_the_base_value() {
        let mut request = api_request_from_json(sample_json()).expect("must parse");
        request.cli.variability_mode = CliVariabilityMode::Advanced;
        request.cli.contact_rate_min = Some(10.0);
        request.cli.contact_rate_max = Some(40.0);

        let mc = build_monte_carlo_inputs(&request.cli, 0.0).expect("must build");
        let Variability::Advanced(ranges) = mc.variability else {
            panic!("expected advanced variability");
        };
        assert!((ranges.contact.min - 0.10).abs() < 1e-12);
        assert!((ranges.contact.mode - 0.22).abs() < 1e-12);
        assert!((ranges.contact.max - 0.40).abs() < 1e-12);
        // An untouched variable degenerates to a point range.
        assert_eq!(ranges.support.min, ranges.support.max);
    }

    #[test]
    fn advanced_mode_rejects_inverted_ranges() {
        let mut request = api_request_from_json(sample_json()).expect("must parse");
        request.cli.variability_mode = CliVariabilityMode::Advanced;
        request.cli.contact_rate_min = Some(50.0);
        request.cli.contact_rate_max = Some(10.0);

        let err = build_monte_carlo_inputs(&request.cli, 0.0).expect_err("must reject");
        assert!(err.contains("min <= mode <= max"));
    }

    #[test]
    fn simulate_summary_is_seed_stable_through_the_api_layer() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let mc = build_monte_carlo_inputs(&request.cli, 19_252.0).expect("must build");
        let a = run_monte_carlo(&mc).expect("must run");
        let b = run_monte_carlo(&mc).expect("must run");
        assert_eq!(
            serde_json::to_string(&a).expect("serializes"),
            serde_json::to_string(&b).expect("serializes")
        );
    }

    #[test]
    fn computed_capacity_matches_the_blended_formula() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let computed =
            compute_capacity_contacts(Some(8), &capacity_inputs(&request.cli)).expect("capacity");
        // 8 * 2 * 20 * 1.5 * (0.6*12 + 0.4*30) = 9216
        assert!((computed - 9_216.0).abs() < 1e-9);
    }

    #[test]
    fn optimization_pipeline_respects_budget_and_reports_binding() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let cli = &request.cli;
        let base_rates = build_base_rates(cli);
        let config = build_tactics_config(cli).expect("must build");
        let tactics = build_optimization_tactics(&base_rates, &config, None);
        assert_eq!(tactics.len(), 2);

        let result = optimize_mix_budget(
            &tactics,
            MixBudgetConfig {
                budget: 500.0,
                step: 25.0,
                capacity_ceiling: None,
                use_decay: false,
            },
        );
        assert!(result.totals.cost <= 500.0 + 1e-9);
        assert_eq!(result.binding, BindingConstraint::Budget);
    }

    #[test]
    fn timeline_splits_votes_by_tactic_kind() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let inputs = build_scenario_inputs(&request).expect("must build");
        let cli = &request.cli;

        let tactics = vec![
            Tactic {
                id: "doors".to_string(),
                label: "Doors".to_string(),
                kind: TacticKind::Persuasion,
                cost_per_attempt: 1.0,
                net_votes_per_attempt: 0.1,
                max_attempts: None,
                decay_tiers: None,
            },
            Tactic {
                id: "doors_gotv".to_string(),
                label: "Doors (GOTV)".to_string(),
                kind: TacticKind::Gotv,
                cost_per_attempt: 1.0,
                net_votes_per_attempt: 0.05,
                max_attempts: None,
                decay_tiers: None,
            },
        ];
        let optimization = optimize_mix_capacity(
            &tactics,
            MixCapacityConfig {
                capacity: 1_000.0,
                step: 100.0,
                use_decay: false,
            },
        );
        let timeline = build_timeline(cli, &inputs, &tactics, &optimization);
        assert_eq!(timeline.len(), 8);

        let persuasion: f64 = timeline.iter().map(|r| r.persuasion_votes).sum();
        let gotv: f64 = timeline.iter().map(|r| r.gotv_votes).sum();
        let expected_persuasion: f64 = optimization
            .allocation
            .iter()
            .filter(|a| a.id == "doors")
            .map(|a| a.net_votes)
            .sum();
        let expected_gotv: f64 = optimization
            .allocation
            .iter()
            .filter(|a| a.id == "doors_gotv")
            .map(|a| a.net_votes)
            .sum();
        assert!((persuasion - expected_persuasion).abs() < 1e-6);
        assert!((gotv - expected_gotv).abs() < 1e-6);
    }

    #[test]
    fn plan_response_serializes_with_expected_fields() {
        let request = api_request_from_json(sample_json()).expect("must parse");
        let inputs = build_scenario_inputs(&request).expect("must build");
        let plan = compute_all(&inputs);
        let need_votes = resolve_need_votes(&request.cli, &plan);
        let response = PlanResponse {
            weeks_remaining: inputs.weeks_remaining,
            need_votes,
            plan,
        };
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"needVotes\""));
        assert!(json.contains("\"projectedTurnout\""));
        assert!(json.contains("\"bufferedWin\""));
        assert!(json.contains("\"persuasionNeed\""));
        assert!(json.contains("\"guardrails\""));
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn unknown_quantities_serialize_as_null_not_nan() {
        let request = api_request_from_json(r#"{ "turnoutExpected": 50 }"#).expect("must parse");
        let inputs = build_scenario_inputs(&request).expect("must build");
        let plan = compute_all(&inputs);
        let json = serde_json::to_string(&plan).expect("serializes");
        assert!(json.contains("\"projectedTurnout\":null"));
        assert!(!json.contains("NaN"));
    }
}
