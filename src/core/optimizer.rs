use super::types::{
    AllocationEntry, BindingConstraint, OptimizationResult, OptimizationTotals, Tactic,
};

pub const DEFAULT_STEP: f64 = 25.0;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct MixBudgetConfig {
    pub budget: f64,
    pub step: f64,
    /// Caps total attempts even in budget mode when set.
    pub capacity_ceiling: Option<f64>,
    pub use_decay: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MixCapacityConfig {
    pub capacity: f64,
    pub step: f64,
    pub use_decay: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mode {
    Budget,
    Capacity,
}

pub fn optimize_mix_budget(tactics: &[Tactic], config: MixBudgetConfig) -> OptimizationResult {
    allocate(
        tactics,
        Mode::Budget,
        config.budget,
        config.capacity_ceiling,
        config.step,
        config.use_decay,
    )
}

pub fn optimize_mix_capacity(tactics: &[Tactic], config: MixCapacityConfig) -> OptimizationResult {
    allocate(
        tactics,
        Mode::Capacity,
        config.capacity,
        None,
        config.step,
        config.use_decay,
    )
}

/// Greedy marginal-value allocation: each iteration hands one step of
/// attempts to the tactic whose next step yields the most votes per unit of
/// the constrained resource. Decay tiers lower a tactic's marginal yield as
/// its cumulative attempts grow, so allocation spreads once a tactic crosses
/// a tier boundary. Heuristic by construction; exact for non-increasing
/// marginal yields.
fn allocate(
    tactics: &[Tactic],
    mode: Mode,
    resource: f64,
    capacity_ceiling: Option<f64>,
    step: f64,
    use_decay: bool,
) -> OptimizationResult {
    let step = if step.is_finite() && step > 0.0 {
        step
    } else {
        DEFAULT_STEP
    };

    if tactics.is_empty() {
        return empty_result(tactics, BindingConstraint::NoTactics);
    }
    let resource = if resource.is_finite() { resource } else { 0.0 };
    if resource <= 0.0 {
        let binding = match mode {
            Mode::Budget => BindingConstraint::Budget,
            Mode::Capacity => BindingConstraint::Capacity,
        };
        return empty_result(tactics, binding);
    }

    let mut attempts = vec![0.0_f64; tactics.len()];
    let mut cost_spent = 0.0_f64;
    let mut votes_gained = vec![0.0_f64; tactics.len()];
    let mut total_attempts = 0.0_f64;

    let binding = loop {
        let mut best: Option<(usize, f64)> = None;
        let mut budget_blocked = false;
        let mut capacity_blocked = false;

        for (i, tactic) in tactics.iter().enumerate() {
            if let Some(cap) = tactic.max_attempts {
                if attempts[i] + step > cap + EPS {
                    continue;
                }
            }

            let marginal_per_attempt =
                tactic.net_votes_per_attempt * tier_multiplier(tactic, attempts[i], use_decay);
            if marginal_per_attempt <= 0.0 {
                continue;
            }

            match mode {
                Mode::Budget => {
                    if let Some(ceiling) = capacity_ceiling {
                        if total_attempts + step > ceiling + EPS {
                            capacity_blocked = true;
                            continue;
                        }
                    }
                    let step_cost = tactic.cost_per_attempt * step;
                    if cost_spent + step_cost > resource + EPS {
                        budget_blocked = true;
                        continue;
                    }
                    let value = if tactic.cost_per_attempt > 0.0 {
                        marginal_per_attempt / tactic.cost_per_attempt
                    } else {
                        f64::INFINITY
                    };
                    if best.is_none_or(|(_, v)| value > v) {
                        best = Some((i, value));
                    }
                }
                Mode::Capacity => {
                    if total_attempts + step > resource + EPS {
                        capacity_blocked = true;
                        continue;
                    }
                    if best.is_none_or(|(_, v)| marginal_per_attempt > v) {
                        best = Some((i, marginal_per_attempt));
                    }
                }
            }
        }

        let Some((winner, _)) = best else {
            break if budget_blocked {
                BindingConstraint::Budget
            } else if capacity_blocked {
                BindingConstraint::Capacity
            } else {
                BindingConstraint::TacticsExhausted
            };
        };

        let tactic = &tactics[winner];
        let marginal =
            tactic.net_votes_per_attempt * tier_multiplier(tactic, attempts[winner], use_decay);
        attempts[winner] += step;
        total_attempts += step;
        cost_spent += tactic.cost_per_attempt * step;
        votes_gained[winner] += marginal * step;
    };

    let allocation: Vec<AllocationEntry> = tactics
        .iter()
        .enumerate()
        .map(|(i, t)| AllocationEntry {
            id: t.id.clone(),
            attempts: attempts[i],
            cost: t.cost_per_attempt * attempts[i],
            net_votes: votes_gained[i],
        })
        .collect();

    OptimizationResult {
        totals: OptimizationTotals {
            cost: cost_spent,
            attempts: total_attempts,
            net_votes: votes_gained.iter().sum(),
        },
        allocation,
        binding,
    }
}

/// Multiplier of the decay tier the next attempt falls into. Tiers are
/// ordered; the unbounded final tier catches everything past the last
/// boundary.
fn tier_multiplier(tactic: &Tactic, current_attempts: f64, use_decay: bool) -> f64 {
    if !use_decay {
        return 1.0;
    }
    let Some(tiers) = &tactic.decay_tiers else {
        return 1.0;
    };

    for tier in tiers {
        match tier.upto_attempts {
            Some(upto) if current_attempts < upto => return tier.multiplier,
            None => return tier.multiplier,
            _ => {}
        }
    }
    tiers.last().map(|t| t.multiplier).unwrap_or(1.0)
}

fn empty_result(tactics: &[Tactic], binding: BindingConstraint) -> OptimizationResult {
    OptimizationResult {
        allocation: tactics
            .iter()
            .map(|t| AllocationEntry {
                id: t.id.clone(),
                attempts: 0.0,
                cost: 0.0,
                net_votes: 0.0,
            })
            .collect(),
        totals: OptimizationTotals {
            cost: 0.0,
            attempts: 0.0,
            net_votes: 0.0,
        },
        binding,
    }
}
