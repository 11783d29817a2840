use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use structured_portfolio_core::fees::{self, FeeAccrualInput};
use structured_portfolio_core::waterfall::{
    calculate_waterfall, cascade, WaterfallInput, WaterfallTrancheInput,
};
use structured_portfolio_core::{WaterfallError, SECONDS_PER_YEAR};

fn three_tranches(nominals: [Decimal; 3], fee_rates: [u32; 3]) -> Vec<WaterfallTrancheInput> {
    ["Equity", "Junior", "Senior"]
        .iter()
        .zip(nominals)
        .zip(fee_rates)
        .map(|((name, nominal_value), fee_rate)| WaterfallTrancheInput {
            name: name.to_string(),
            nominal_value,
            fee_rate,
        })
        .collect()
}

fn totals() -> Vec<Decimal> {
    vec![
        dec!(0),
        dec!(1),
        dec!(999_999),
        dec!(2_990_000),
        dec!(3_000_000),
        dec!(4_500_000),
        dec!(6_000_000),
        dec!(9_000_000),
    ]
}

// ===========================================================================
// Seniority cascade
// ===========================================================================

#[test]
fn test_senior_takes_min_of_total_and_claim() {
    let claims = [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)];
    for total in totals() {
        let out = cascade(total, &claims).unwrap();
        assert_eq!(out[2], total.min(claims[2]), "total {}", total);
        if total < claims[2] {
            assert_eq!(out[0], Decimal::ZERO, "total {}", total);
            assert_eq!(out[1], Decimal::ZERO, "total {}", total);
        }
    }
}

#[test]
fn test_cascade_conserves_total() {
    let claim_sets = [
        [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)],
        [dec!(0), dec!(0), dec!(0)],
        [dec!(5), dec!(0), dec!(7)],
        [dec!(3_000_000), dec!(2_000_000), dec!(1_000_000)],
    ];
    for claims in claim_sets {
        for total in totals() {
            let out = cascade(total, &claims).unwrap();
            let sum: Decimal = out.iter().sum();
            assert_eq!(sum, total, "claims {:?} total {}", claims, total);
            assert!(out.iter().all(|v| *v >= Decimal::ZERO));
        }
    }
}

#[test]
fn test_equity_absorbs_surplus_and_loss() {
    let claims = [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)];
    let surplus = cascade(dec!(6_600_000), &claims).unwrap();
    assert_eq!(surplus, vec![dec!(1_600_000), dec!(2_000_000), dec!(3_000_000)]);

    let loss = cascade(dec!(5_400_000), &claims).unwrap();
    assert_eq!(loss, vec![dec!(400_000), dec!(2_000_000), dec!(3_000_000)]);
}

#[test]
fn test_cascade_rejects_negative_total() {
    assert!(matches!(
        cascade(dec!(-1), &[dec!(1)]),
        Err(WaterfallError::InvalidInput { .. })
    ));
}

// ===========================================================================
// Fee application
// ===========================================================================

#[test]
fn test_fee_clamp_isolated_to_one_tranche() {
    // Two years at 100% + 1% wipes out the junior tranche only
    let elapsed = 2 * SECONDS_PER_YEAR;
    let input = WaterfallInput {
        total_value: dec!(6_000_000),
        elapsed_seconds: elapsed,
        protocol_fee_rate: 100,
        tranches: three_tranches(
            [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)],
            [0, 10_000, 0],
        ),
    };
    let out = calculate_waterfall(&input).unwrap();
    let result = out.result;

    assert_eq!(result.tranches[1].post_fee_value, Decimal::ZERO);
    assert!(result.tranches[1].uncollectible_fee > Decimal::ZERO);

    for i in [0, 2] {
        let alone = fees::accrue(result.tranches[i].pre_fee_value, elapsed, 0, 100).unwrap();
        assert_eq!(result.tranches[i].post_fee_value, alone.value_after);
    }
    assert!(out.warnings.iter().any(|w| w.contains("uncollectible")));
}

#[test]
fn test_post_fee_values_never_negative() {
    for total in totals() {
        let input = WaterfallInput {
            total_value: total,
            elapsed_seconds: 10 * SECONDS_PER_YEAR,
            protocol_fee_rate: 5_000,
            tranches: three_tranches(
                [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)],
                [10_000, 5_000, 2_500],
            ),
        };
        let result = calculate_waterfall(&input).unwrap().result;
        assert!(result.values().iter().all(|v| *v >= Decimal::ZERO));
    }
}

#[test]
fn test_zero_elapsed_is_fee_free_and_repeatable() {
    let input = WaterfallInput {
        total_value: dec!(5_000_000),
        elapsed_seconds: 0,
        protocol_fee_rate: 100,
        tranches: three_tranches(
            [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)],
            [50, 100, 200],
        ),
    };
    let first = calculate_waterfall(&input).unwrap().result;
    let second = calculate_waterfall(&input).unwrap().result;
    assert_eq!(first, second);
    assert_eq!(first.values(), first.pre_fee_values());
    assert_eq!(first.total_fees().unwrap(), Decimal::ZERO);
}

#[test]
fn test_empty_portfolio_is_all_zeros() {
    let input = WaterfallInput {
        total_value: Decimal::ZERO,
        elapsed_seconds: SECONDS_PER_YEAR,
        protocol_fee_rate: 100,
        tranches: three_tranches([Decimal::ZERO; 3], [100, 100, 100]),
    };
    let result = calculate_waterfall(&input).unwrap().result;
    assert_eq!(result.values(), vec![Decimal::ZERO; 3]);
}

#[test]
fn test_oversized_senior_claims_report_overflow() {
    let input = WaterfallInput {
        total_value: dec!(1),
        elapsed_seconds: 0,
        protocol_fee_rate: 0,
        tranches: three_tranches([Decimal::ZERO, Decimal::MAX, Decimal::MAX], [0, 0, 0]),
    };
    assert!(matches!(
        calculate_waterfall(&input),
        Err(WaterfallError::ArithmeticOverflow(_))
    ));
}

#[test]
fn test_senior_shortfall_warns() {
    let input = WaterfallInput {
        total_value: dec!(2_990_000),
        elapsed_seconds: 0,
        protocol_fee_rate: 0,
        tranches: three_tranches(
            [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)],
            [0, 0, 0],
        ),
    };
    let out = calculate_waterfall(&input).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("equity is wiped out")));
}

#[test]
fn test_fee_calculator_known_answer() {
    let out = fees::accrue_fee(&FeeAccrualInput {
        value: dec!(1_000_000),
        elapsed_seconds: SECONDS_PER_YEAR,
        tranche_fee_rate: 100,
        protocol_fee_rate: 50,
    })
    .unwrap();
    assert_eq!(out.result.total_fee, dec!(15_000));
    assert_eq!(out.result.protocol_fee, dec!(5_000));
    assert_eq!(out.result.tranche_fee, dec!(10_000));
    assert_eq!(out.result.value_after, dec!(985_000));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_fee_overflow_is_reported() {
    let result = fees::accrue(Decimal::MAX, u64::MAX, 10_000, 10_000);
    assert!(matches!(result, Err(WaterfallError::ArithmeticOverflow(_))));
}
