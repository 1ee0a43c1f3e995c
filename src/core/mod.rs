mod model;
mod monte_carlo;
mod optimizer;
mod tactics;
mod timeline;
mod types;

pub use model::{CapacityInputs, compute_all, compute_capacity_contacts, derive_need_votes};
pub use monte_carlo::{
    AdvancedRanges, DEFAULT_RUNS, MonteCarloInputs, Mulberry32, SimCapacity, SimRates, TriRange,
    Variability, risk_label, run_monte_carlo, sample_triangular,
};
pub use optimizer::{
    DEFAULT_STEP, MixBudgetConfig, MixCapacityConfig, optimize_mix_budget, optimize_mix_capacity,
};
pub use tactics::{
    BaseRates, ChannelConfig, GotvChannelConfig, GotvConfig, RoiArgs, RoiCaps, TacticsConfig,
    build_optimization_tactics, compute_roi_rows,
};
pub use timeline::{
    DEFAULT_PERSUASION_COMPRESSION, TimelineInputs, compute_timeline, early_vote_cutoff_week,
};
pub use types::{
    AllocationEntry, BindingConstraint, Candidate, DecayTier, DeterministicResult, Feasibility,
    MonteCarloSummary, OptimizationResult, OptimizationTotals, PlanResult, RiskLabel, RoiRow,
    ScenarioInputs, SensitivityEntry, Tactic, TacticKind, TimelineRow, TurnoutSummary,
    UndecidedMode, Validation, Volatility,
};
