use super::types::{DecayTier, Feasibility, RoiRow, Tactic, TacticKind};

/// Base conversion rates shared by all channels, as unit fractions in [0,1].
/// `None` means the rate has not been entered yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseRates {
    pub contact: Option<f64>,
    pub support: Option<f64>,
    pub turnout_reliability: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub cost_per_attempt: Option<f64>,
    /// Percent overrides; fall back to the base rate when unset.
    pub contact_rate_pct: Option<f64>,
    pub support_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TacticsConfig {
    pub doors: ChannelConfig,
    pub phones: ChannelConfig,
    pub texts: ChannelConfig,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GotvChannelConfig {
    pub enabled: bool,
    pub lift_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GotvConfig {
    pub base_universe: Option<f64>,
    /// Fraction of the targeted universe not already voting, in [0,1].
    pub non_voter_share: Option<f64>,
    pub doors: GotvChannelConfig,
    pub phones: GotvChannelConfig,
    pub texts: GotvChannelConfig,
}

const CHANNELS: [(&str, &str); 3] = [("doors", "Doors"), ("phones", "Phones"), ("texts", "Texts")];

pub fn build_optimization_tactics(
    base: &BaseRates,
    config: &TacticsConfig,
    gotv: Option<&GotvConfig>,
) -> Vec<Tactic> {
    let mut out = Vec::new();

    for (key, label) in CHANNELS {
        let channel = channel_config(config, key);
        if !channel.enabled {
            continue;
        }

        let cr = pct_override(channel.contact_rate_pct, base.contact);
        let sr = pct_override(channel.support_rate_pct, base.support);
        let tr = base.turnout_reliability;

        // A missing or zero rate yields zero, never a division or a NaN.
        let net_votes_per_attempt = match (cr, sr, tr) {
            (Some(cr), Some(sr), Some(tr)) if cr > 0.0 && sr > 0.0 && tr > 0.0 => cr * sr * tr,
            _ => 0.0,
        };

        out.push(Tactic {
            id: key.to_string(),
            label: label.to_string(),
            kind: TacticKind::Persuasion,
            cost_per_attempt: sanitize_cost(channel.cost_per_attempt),
            net_votes_per_attempt,
            max_attempts: None,
            decay_tiers: None,
        });
    }

    if let Some(gotv) = gotv {
        for (key, label) in CHANNELS {
            let pool = gotv_channel_config(gotv, key);
            if !pool.enabled {
                continue;
            }

            let channel = channel_config(config, key);
            let cr = pct_override(channel.contact_rate_pct, base.contact);
            let lift = pool.lift_pct.map(|p| p.clamp(0.0, 100.0) / 100.0);
            let non_voter_share = gotv.non_voter_share.map(|s| s.clamp(0.0, 1.0));

            let net_votes_per_attempt = match (cr, lift, non_voter_share) {
                (Some(cr), Some(lift), Some(share))
                    if cr > 0.0 && lift > 0.0 && share > 0.0 =>
                {
                    cr * lift * share
                }
                _ => 0.0,
            };

            let (max_attempts, decay_tiers) = saturation_model(gotv.base_universe, cr, lift);

            out.push(Tactic {
                id: format!("{key}_gotv"),
                label: format!("{label} (GOTV)"),
                kind: TacticKind::Gotv,
                cost_per_attempt: sanitize_cost(channel.cost_per_attempt),
                net_votes_per_attempt,
                max_attempts,
                decay_tiers,
            });
        }
    }

    out
}

/// 95%-saturation point of the random-contact model
/// `V = N * (1 - e^(-rA/N))`: solving at 95% gives `A = 3N/r` (ln 20 ≈ 3).
/// Tiers quarter the run-up with multipliers `e^(-3f)` so repeated attempts
/// at a shrinking fresh pool decay exponentially.
fn saturation_model(
    base_universe: Option<f64>,
    contact: Option<f64>,
    lift: Option<f64>,
) -> (Option<f64>, Option<Vec<DecayTier>>) {
    let (Some(universe), Some(cr), Some(lift)) = (base_universe, contact, lift) else {
        return (None, None);
    };
    if !(universe.is_finite() && universe > 0.0 && cr > 0.0 && lift > 0.0) {
        return (None, None);
    }

    let rate = cr * lift;
    let max_attempts = 3.0 * universe / rate;
    if !max_attempts.is_finite() || max_attempts <= 0.0 {
        return (None, None);
    }

    let tiers = vec![
        DecayTier {
            upto_attempts: Some(max_attempts * 0.25),
            multiplier: (-3.0 * 0.00f64).exp(),
        },
        DecayTier {
            upto_attempts: Some(max_attempts * 0.50),
            multiplier: (-3.0 * 0.25f64).exp(),
        },
        DecayTier {
            upto_attempts: Some(max_attempts * 0.75),
            multiplier: (-3.0 * 0.50f64).exp(),
        },
        DecayTier {
            upto_attempts: Some(max_attempts),
            multiplier: (-3.0 * 0.75f64).exp(),
        },
        DecayTier {
            upto_attempts: None,
            multiplier: (-3.0 * 1.00f64).exp(),
        },
    ];

    (Some(max_attempts), Some(tiers))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoiCaps {
    pub total: Option<f64>,
    pub doors: Option<f64>,
    pub phones: Option<f64>,
    pub texts: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RoiArgs<'a> {
    pub goal_net_votes: Option<f64>,
    pub base: &'a BaseRates,
    pub config: &'a TacticsConfig,
    pub overhead_amount: f64,
    pub include_overhead: bool,
    pub caps: Option<&'a RoiCaps>,
}

/// Deterministic cost lens: what closing the whole gap with one tactic
/// would require and cost. Never mutates the plan it is derived from.
pub fn compute_roi_rows(args: &RoiArgs<'_>) -> Vec<RoiRow> {
    let need = args
        .goal_net_votes
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0));

    let mut rows = Vec::new();
    for (key, label) in CHANNELS {
        let channel = channel_config(args.config, key);
        if !channel.enabled {
            continue;
        }

        let cr = pct_override(channel.contact_rate_pct, args.base.contact);
        let sr = pct_override(channel.support_rate_pct, args.base.support);
        let tr = args.base.turnout_reliability;

        let rate_product = match (cr, sr, tr) {
            (Some(cr), Some(sr), Some(tr)) if cr > 0.0 && sr > 0.0 && tr > 0.0 => {
                Some(cr * sr * tr)
            }
            _ => None,
        };

        let required_attempts = match (need, rate_product) {
            (Some(need), Some(product)) if need > 0.0 => {
                let attempts = need / product;
                (attempts.is_finite() && attempts > 0.0).then_some(attempts)
            }
            _ => None,
        };

        // Overhead is spread across the gap-closure plan, after the movable
        // pool and rate products are settled; keep this order.
        let overhead_per_attempt = match required_attempts {
            Some(attempts) if args.include_overhead && args.overhead_amount > 0.0 => {
                args.overhead_amount / attempts
            }
            _ => 0.0,
        };
        let cost_per_attempt = sanitize_cost(channel.cost_per_attempt) + overhead_per_attempt;

        let (cost_per_net_vote, total_cost) = match (rate_product, required_attempts) {
            (Some(product), Some(attempts)) if cost_per_attempt > 0.0 => (
                Some(cost_per_attempt / product),
                Some(attempts * cost_per_attempt),
            ),
            _ => (None, None),
        };

        let feasibility = match required_attempts {
            None => {
                if need == Some(0.0) {
                    Feasibility::NoGap
                } else {
                    Feasibility::MissingRates
                }
            }
            Some(attempts) => match cap_for(args.caps, key) {
                None => Feasibility::CeilingUnknown,
                Some(cap) if attempts <= cap => Feasibility::Feasible,
                Some(_) => Feasibility::CapacityShortfall,
            },
        };

        rows.push(RoiRow {
            key: key.to_string(),
            label: label.to_string(),
            cost_per_attempt: (cost_per_attempt > 0.0).then_some(cost_per_attempt),
            required_attempts,
            cost_per_net_vote,
            total_cost,
            feasibility,
        });
    }

    // Cheapest path to a net vote first; unknowns sink to the bottom.
    rows.sort_by(|a, b| {
        let av = a.cost_per_net_vote.unwrap_or(f64::INFINITY);
        let bv = b.cost_per_net_vote.unwrap_or(f64::INFINITY);
        av.total_cmp(&bv)
    });

    rows
}

fn channel_config(config: &TacticsConfig, key: &str) -> ChannelConfig {
    match key {
        "doors" => config.doors,
        "phones" => config.phones,
        _ => config.texts,
    }
}

fn gotv_channel_config(config: &GotvConfig, key: &str) -> GotvChannelConfig {
    match key {
        "doors" => config.doors,
        "phones" => config.phones,
        _ => config.texts,
    }
}

fn cap_for(caps: Option<&RoiCaps>, key: &str) -> Option<f64> {
    let caps = caps?;
    let per_channel = match key {
        "doors" => caps.doors,
        "phones" => caps.phones,
        _ => caps.texts,
    };
    per_channel.or(caps.total)
}

fn pct_override(pct: Option<f64>, fallback: Option<f64>) -> Option<f64> {
    match pct {
        Some(p) if p.is_finite() => Some(p.clamp(0.0, 100.0) / 100.0),
        _ => fallback,
    }
}

fn sanitize_cost(cost: Option<f64>) -> f64 {
    match cost {
        Some(c) if c.is_finite() => c.max(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn base_rates() -> BaseRates {
        BaseRates {
            contact: Some(0.22),
            support: Some(0.55),
            turnout_reliability: Some(0.80),
        }
    }

    fn doors_and_phones() -> TacticsConfig {
        TacticsConfig {
            doors: ChannelConfig {
                enabled: true,
                cost_per_attempt: Some(1.25),
                contact_rate_pct: None,
                support_rate_pct: None,
            },
            phones: ChannelConfig {
                enabled: true,
                cost_per_attempt: Some(0.45),
                contact_rate_pct: Some(12.0),
                support_rate_pct: None,
            },
            texts: ChannelConfig::default(),
        }
    }

    #[test]
    fn persuasion_yield_is_the_rate_product() {
        let tactics = build_optimization_tactics(&base_rates(), &doors_and_phones(), None);
        assert_eq!(tactics.len(), 2);

        let doors = &tactics[0];
        assert_eq!(doors.id, "doors");
        assert_eq!(doors.kind, TacticKind::Persuasion);
        assert_approx(doors.net_votes_per_attempt, 0.22 * 0.55 * 0.80);

        // Phones override the contact rate only.
        let phones = &tactics[1];
        assert_approx(phones.net_votes_per_attempt, 0.12 * 0.55 * 0.80);
    }

    #[test]
    fn disabled_channels_are_not_listed() {
        let mut config = doors_and_phones();
        config.phones.enabled = false;
        let tactics = build_optimization_tactics(&base_rates(), &config, None);
        assert_eq!(tactics.len(), 1);
        assert_eq!(tactics[0].id, "doors");
    }

    #[test]
    fn missing_rates_yield_zero_not_an_error() {
        let rates = BaseRates {
            contact: None,
            support: Some(0.5),
            turnout_reliability: Some(0.8),
        };
        let tactics = build_optimization_tactics(&rates, &doors_and_phones(), None);
        assert_approx(tactics[0].net_votes_per_attempt, 0.0);
    }

    #[test]
    fn gotv_tactic_uses_lift_and_non_voter_share() {
        let gotv = GotvConfig {
            base_universe: Some(10_000.0),
            non_voter_share: Some(0.45),
            doors: GotvChannelConfig {
                enabled: true,
                lift_pct: Some(8.0),
            },
            ..GotvConfig::default()
        };
        let tactics = build_optimization_tactics(&base_rates(), &doors_and_phones(), Some(&gotv));
        let pool = tactics.iter().find(|t| t.id == "doors_gotv").unwrap();
        assert_eq!(pool.kind, TacticKind::Gotv);
        assert_approx(pool.net_votes_per_attempt, 0.22 * 0.08 * 0.45);

        // 3N/r with r = cr * lift.
        let expected_max = 3.0 * 10_000.0 / (0.22 * 0.08);
        assert_approx(pool.max_attempts.unwrap(), expected_max);

        let tiers = pool.decay_tiers.as_ref().unwrap();
        assert_eq!(tiers.len(), 5);
        assert_approx(tiers[0].multiplier, 1.0);
        assert_approx(tiers[4].multiplier, (-3.0f64).exp());
        assert!(tiers[4].upto_attempts.is_none());
        for pair in tiers.windows(2) {
            assert!(pair[1].multiplier <= pair[0].multiplier);
        }
        assert_approx(tiers[0].upto_attempts.unwrap(), expected_max * 0.25);
    }

    #[test]
    fn gotv_without_universe_has_no_saturation_model() {
        let gotv = GotvConfig {
            base_universe: None,
            non_voter_share: Some(0.45),
            phones: GotvChannelConfig {
                enabled: true,
                lift_pct: Some(5.0),
            },
            ..GotvConfig::default()
        };
        let tactics = build_optimization_tactics(&base_rates(), &doors_and_phones(), Some(&gotv));
        let pool = tactics.iter().find(|t| t.id == "phones_gotv").unwrap();
        assert!(pool.max_attempts.is_none());
        assert!(pool.decay_tiers.is_none());
        assert!(pool.net_votes_per_attempt > 0.0);
    }

    #[test]
    fn roi_rows_sort_cheapest_first_and_compute_costs() {
        let base = base_rates();
        let config = doors_and_phones();
        let rows = compute_roi_rows(&RoiArgs {
            goal_net_votes: Some(1_000.0),
            base: &base,
            config: &config,
            overhead_amount: 0.0,
            include_overhead: false,
            caps: None,
        });

        assert_eq!(rows.len(), 2);
        // Phones: 0.45 / (0.12*0.55*0.80) ≈ 8.52 per net vote beats
        // doors: 1.25 / (0.22*0.55*0.80) ≈ 12.91.
        assert_eq!(rows[0].key, "phones");
        let phones_product = 0.12 * 0.55 * 0.80;
        assert_approx(rows[0].cost_per_net_vote.unwrap(), 0.45 / phones_product);
        assert_approx(rows[0].required_attempts.unwrap(), 1_000.0 / phones_product);
        assert_approx(
            rows[0].total_cost.unwrap(),
            1_000.0 / phones_product * 0.45,
        );
        assert_eq!(rows[0].feasibility, Feasibility::CeilingUnknown);
    }

    #[test]
    fn roi_overhead_spreads_across_required_attempts() {
        let base = base_rates();
        let mut config = doors_and_phones();
        config.phones.enabled = false;
        let rows = compute_roi_rows(&RoiArgs {
            goal_net_votes: Some(968.0),
            base: &base,
            config: &config,
            overhead_amount: 500.0,
            include_overhead: true,
            caps: None,
        });

        let doors = &rows[0];
        let product = 0.22 * 0.55 * 0.80;
        let required = 968.0 / product;
        let cpa = 1.25 + 500.0 / required;
        assert_approx(doors.cost_per_attempt.unwrap(), cpa);
        assert_approx(doors.total_cost.unwrap(), required * cpa);
    }

    #[test]
    fn roi_zero_gap_reports_no_gap() {
        let base = base_rates();
        let config = doors_and_phones();
        let rows = compute_roi_rows(&RoiArgs {
            goal_net_votes: Some(0.0),
            base: &base,
            config: &config,
            overhead_amount: 0.0,
            include_overhead: false,
            caps: None,
        });
        assert!(rows.iter().all(|r| r.feasibility == Feasibility::NoGap));
        assert!(rows.iter().all(|r| r.total_cost.is_none()));
    }

    #[test]
    fn roi_missing_rates_never_divide() {
        let base = BaseRates::default();
        let config = doors_and_phones();
        let rows = compute_roi_rows(&RoiArgs {
            goal_net_votes: Some(500.0),
            base: &base,
            config: &config,
            overhead_amount: 100.0,
            include_overhead: true,
            caps: None,
        });
        for row in rows {
            assert_eq!(row.feasibility, Feasibility::MissingRates);
            assert!(row.required_attempts.is_none());
            assert!(row.cost_per_net_vote.is_none());
        }
    }

    #[test]
    fn roi_caps_flag_shortfalls() {
        let base = base_rates();
        let mut config = doors_and_phones();
        config.phones.enabled = false;
        let caps = RoiCaps {
            total: Some(100.0),
            ..RoiCaps::default()
        };
        let rows = compute_roi_rows(&RoiArgs {
            goal_net_votes: Some(1_000.0),
            base: &base,
            config: &config,
            overhead_amount: 0.0,
            include_overhead: false,
            caps: Some(&caps),
        });
        assert_eq!(rows[0].feasibility, Feasibility::CapacityShortfall);
    }
}
