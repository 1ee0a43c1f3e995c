use super::types::{
    Candidate, DeterministicResult, PlanResult, ScenarioInputs, TurnoutSummary, UndecidedMode,
    Validation,
};

const SUPPORT_SUM_TOLERANCE: f64 = 1e-6;

// Undecided-pool share handed to your candidate in the skewed split modes.
const SKEW_TOWARD_SHARE: f64 = 0.50;
const SKEW_AGAINST_SHARE: f64 = 0.25;

pub fn compute_all(inputs: &ScenarioInputs) -> PlanResult {
    let validation = validate(inputs);
    let turnout = turnout_summary(inputs, &validation);
    let expected = deterministic(inputs, &validation, &turnout);
    let guardrails = guardrails(inputs, &expected);

    PlanResult {
        turnout,
        expected,
        validation,
        guardrails,
    }
}

/// The optimizer's vote goal: the persuasion/GOTV gap, when known.
pub fn derive_need_votes(res: &PlanResult) -> Option<f64> {
    res.expected.persuasion_need
}

#[derive(Debug, Clone, Copy)]
pub struct CapacityInputs {
    pub organizer_count: Option<f64>,
    pub organizer_hours_per_week: Option<f64>,
    pub volunteer_multiplier: Option<f64>,
    /// Fraction of contact hours spent on doors; the rest goes to phones.
    pub door_share: Option<f64>,
    pub doors_per_hour: Option<f64>,
    pub calls_per_hour: Option<f64>,
}

/// Total attempt capacity over the remaining weeks, blending the door and
/// phone channels. `None` when any required input is missing or the result
/// would be non-finite.
pub fn compute_capacity_contacts(weeks: Option<u32>, cap: &CapacityInputs) -> Option<f64> {
    let weeks = weeks? as f64;
    let orgs = positive(cap.organizer_count?)?;
    let hours = positive(cap.organizer_hours_per_week?)?;
    let mult = positive(cap.volunteer_multiplier?)?;
    let door_share = cap.door_share?.clamp(0.0, 1.0);
    let doors = cap.doors_per_hour?.max(0.0);
    let calls = cap.calls_per_hour?.max(0.0);

    let per_hour = door_share * doors + (1.0 - door_share) * calls;
    let total = weeks * orgs * hours * mult * per_hour;
    total.is_finite().then_some(total)
}

fn validate(inputs: &ScenarioInputs) -> Validation {
    let mut messages = Vec::new();

    let universe_ok = matches!(inputs.universe_size, Some(u) if u.is_finite() && u > 0.0);
    if !universe_ok {
        messages.push("Universe size missing or invalid.".to_string());
    }

    let turnout_ok = expected_turnout_pct(inputs).is_some();
    if !turnout_ok {
        messages.push(
            "Turnout baseline incomplete. Add Cycle A and Cycle B turnout %.".to_string(),
        );
    }

    let support_total_pct = support_total(&inputs.candidates);
    let candidate_table_ok = match (support_total_pct, inputs.undecided_pct) {
        (Some(support), Some(undecided)) => {
            (support + undecided - 100.0).abs() <= SUPPORT_SUM_TOLERANCE
        }
        _ => false,
    };
    if !candidate_table_ok {
        messages.push("Candidate + undecided totals must equal 100%.".to_string());
    }

    let user_split_ok = if inputs.undecided_mode == UndecidedMode::UserDefined {
        let total: f64 = inputs
            .candidates
            .iter()
            .map(|c| c.undecided_share_pct.unwrap_or(0.0))
            .sum();
        let ok = (total - 100.0).abs() <= SUPPORT_SUM_TOLERANCE;
        if !ok {
            messages.push(
                "User-defined undecided split must total 100% across candidates.".to_string(),
            );
        }
        ok
    } else {
        true
    };

    let persuasion_ok = matches!(inputs.persuasion_pct, Some(p) if p.is_finite() && p >= 0.0);
    if !persuasion_ok {
        messages.push("Persuasion % missing.".to_string());
    }

    Validation {
        universe_ok,
        turnout_ok,
        candidate_table_ok,
        user_split_ok,
        persuasion_ok,
        support_total_pct,
        messages,
    }
}

fn turnout_summary(inputs: &ScenarioInputs, validation: &Validation) -> TurnoutSummary {
    if !validation.universe_ok || !validation.turnout_ok {
        return TurnoutSummary {
            expected_pct: expected_turnout_pct(inputs),
            best_pct: None,
            worst_pct: None,
            votes_per_point: None,
            best_votes: None,
            worst_votes: None,
        };
    }

    let universe = inputs.universe_size.unwrap_or(0.0);
    let expected = expected_turnout_pct(inputs);
    let band = inputs.turnout_band_pct.map(|b| clamp_pct(b));

    let best_pct = match (expected, band) {
        (Some(e), Some(b)) => Some((e + b).min(100.0)),
        _ => None,
    };
    let worst_pct = match (expected, band) {
        (Some(e), Some(b)) => Some((e - b).max(0.0)),
        _ => None,
    };

    TurnoutSummary {
        expected_pct: expected,
        best_pct,
        worst_pct,
        votes_per_point: Some((universe / 100.0).round()),
        best_votes: best_pct.map(|p| (universe * p / 100.0).round()),
        worst_votes: worst_pct.map(|p| (universe * p / 100.0).round()),
    }
}

fn deterministic(
    inputs: &ScenarioInputs,
    validation: &Validation,
    turnout: &TurnoutSummary,
) -> DeterministicResult {
    let mut out = DeterministicResult {
        projected_turnout: None,
        win_number: None,
        buffered_win: None,
        your_share_pct: None,
        base_vote: None,
        early_votes: None,
        election_day_votes: None,
        persuasion_universe: None,
        effective_persuasion_universe: None,
        persuasion_yield: None,
        gotv_yield: None,
        total_capacity: None,
        persuasion_need: None,
    };

    if !validation.universe_ok || !validation.turnout_ok {
        return out;
    }
    let universe = inputs.universe_size.unwrap_or(0.0);
    let Some(rate) = turnout.expected_pct else {
        return out;
    };

    let projected_turnout = (universe * rate / 100.0).round();
    let win_number = (projected_turnout / 2.0).floor() + 1.0;
    // Ceiling by policy: a fractional buffer vote always rounds up so the
    // target is never under-counted.
    let buffer = inputs.win_buffer_pct.max(0.0);
    let buffered_win = (win_number * (1.0 + buffer / 100.0)).ceil();

    out.projected_turnout = Some(projected_turnout);
    out.win_number = Some(win_number);
    out.buffered_win = Some(buffered_win);

    if validation.candidate_table_ok && validation.user_split_ok {
        if let Some(share) = your_share_pct(inputs) {
            out.your_share_pct = Some(share);
            out.base_vote = Some((projected_turnout * share / 100.0).round());
        }
    }

    if let Some(early) = inputs.early_vote_pct {
        let early = clamp_pct(early);
        let early_votes = (projected_turnout * early / 100.0).round();
        out.early_votes = Some(early_votes);
        out.election_day_votes = Some(projected_turnout - early_votes);
    }

    if validation.persuasion_ok {
        let pers_pct = clamp_pct(inputs.persuasion_pct.unwrap_or(0.0));
        let persuasion_universe = (universe * pers_pct / 100.0).round();
        out.persuasion_universe = Some(persuasion_universe);

        // Movable-share override narrows the pool; applied before the rate
        // product so the order matches the ROI layer.
        let effective = match inputs.movable_share_pct {
            Some(m) => persuasion_universe * clamp_pct(m) / 100.0,
            None => persuasion_universe,
        };
        out.effective_persuasion_universe = Some(effective);

        if let (Some(contact), Some(convert)) =
            (inputs.contact_rate_pct, inputs.persuasion_rate_pct)
        {
            out.persuasion_yield =
                Some(effective * clamp_pct(contact) / 100.0 * clamp_pct(convert) / 100.0);
        }
    }

    if let (Some(gotv_universe), Some(gotv_rate)) = (inputs.gotv_universe, inputs.gotv_rate_pct) {
        if gotv_universe >= 0.0 && gotv_universe.is_finite() {
            out.gotv_yield = Some(gotv_universe * clamp_pct(gotv_rate) / 100.0);
        }
    }

    if let Some(base) = out.base_vote {
        let total =
            base + out.persuasion_yield.unwrap_or(0.0) + out.gotv_yield.unwrap_or(0.0);
        out.total_capacity = Some(total);
        out.persuasion_need = Some((buffered_win - total).max(0.0));
    }

    out
}

fn guardrails(inputs: &ScenarioInputs, expected: &DeterministicResult) -> Vec<String> {
    let mut out = Vec::new();

    if matches!(inputs.contact_rate_pct, Some(r) if r > 75.0) {
        out.push("Contact rate exceeds 75%. Verify realism.".to_string());
    }
    if matches!(inputs.persuasion_rate_pct, Some(r) if r > 20.0) {
        out.push("Persuasion conversion above 20%. Historically aggressive.".to_string());
    }
    if matches!(inputs.gotv_rate_pct, Some(r) if r > 85.0) {
        out.push("GOTV conversion above 85%. Confirm universe quality.".to_string());
    }
    if let (Some(capacity), Some(target)) = (expected.total_capacity, expected.buffered_win) {
        if capacity < target {
            out.push("Total vote capacity below buffered win target.".to_string());
        }
    }

    out
}

fn expected_turnout_pct(inputs: &ScenarioInputs) -> Option<f64> {
    if let Some(expected) = inputs.turnout_expected_pct {
        if expected.is_finite() && expected > 0.0 {
            return Some(clamp_pct(expected));
        }
        return None;
    }
    let a = inputs.turnout_cycle_a_pct?;
    let b = inputs.turnout_cycle_b_pct?;
    if !a.is_finite() || !b.is_finite() || a <= 0.0 || b <= 0.0 {
        return None;
    }
    Some((clamp_pct(a) + clamp_pct(b)) / 2.0)
}

fn support_total(candidates: &[Candidate]) -> Option<f64> {
    if candidates.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for c in candidates {
        let s = c.support_pct?;
        if !s.is_finite() || s < 0.0 {
            return None;
        }
        total += s;
    }
    Some(total)
}

fn your_share_pct(inputs: &ScenarioInputs) -> Option<f64> {
    let your_id = inputs.your_candidate_id.as_deref()?;
    let yours = inputs.candidates.iter().find(|c| c.id == your_id)?;
    let your_support = yours.support_pct?;
    let undecided = clamp_pct(inputs.undecided_pct?);

    let your_slice = match inputs.undecided_mode {
        UndecidedMode::Proportional => {
            let total = support_total(&inputs.candidates)?;
            if total > 0.0 {
                undecided * (your_support / total)
            } else {
                // Nobody has declared support; split the pool evenly.
                undecided / inputs.candidates.len() as f64
            }
        }
        UndecidedMode::UserDefined => {
            undecided * clamp_pct(yours.undecided_share_pct.unwrap_or(0.0)) / 100.0
        }
        UndecidedMode::TowardYou => undecided * SKEW_TOWARD_SHARE,
        UndecidedMode::AgainstYou => undecided * SKEW_AGAINST_SHARE,
    };

    Some((your_support + your_slice).min(100.0))
}

fn clamp_pct(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}
