//! Amortization math - EMI amount, total repayable and the EMI due-date schedule.
//!
//! Everything here is pure: no store access, no clock. All money is `Decimal`,
//! rounded half-up to two fractional digits. The monthly rate is kept to ten
//! fractional digits before it enters the EMI formula.

use crate::errors::{Error, Result};
use chrono::{DateTime, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Fractional digits kept on every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Total digits of a stored monetary column, `DECIMAL(15,2)`.
pub const MONEY_PRECISION: u32 = 15;

/// Total digits of a stored rate column, `DECIMAL(5,2)`.
pub const RATE_PRECISION: u32 = 5;

/// Fractional digits of a stored rate column.
pub const RATE_SCALE: u32 = 2;

/// Fractional digits kept on the monthly interest rate.
pub const MONTHLY_RATE_SCALE: u32 = 10;

/// 12 months times 100 percent.
const MONTHS_TIMES_PERCENT: Decimal = dec!(1200);

/// Repayment amounts fixed for a loan at approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaymentTerms {
    /// Equal monthly installment
    pub emi_amount: Decimal,
    /// Principal plus flat interest over the tenure
    pub total_repayable: Decimal,
}

/// Rounds a monetary amount to two decimals, half-up.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether `value` is stored unchanged by a `DECIMAL(precision, scale)` column.
///
/// SQLite keeps decimals as 64-bit floats, so anything wider than the declared
/// column would come back altered.
#[must_use]
pub fn fits_column(value: Decimal, precision: u32, scale: u32) -> bool {
    let value = value.normalize();
    if value.scale() > scale {
        return false;
    }
    let integer_digits = precision.saturating_sub(scale);
    let limit = Decimal::from_i128_with_scale(10_i128.pow(integer_digits), 0);
    value.trunc().abs() < limit
}

/// Converts an annual percentage rate into a monthly fraction: `R / (12 * 100)`.
#[must_use]
pub fn monthly_rate(annual_rate: Decimal) -> Decimal {
    (annual_rate / MONTHS_TIMES_PERCENT)
        .round_dp_with_strategy(MONTHLY_RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `P + P * R * (N / 12) / 100`, rounded to two decimals.
pub fn total_repayable(
    principal: Decimal,
    annual_rate: Decimal,
    tenure_months: i32,
) -> Result<Decimal> {
    check_tenure(tenure_months)?;

    let interest = principal
        .checked_mul(annual_rate)
        .and_then(|v| v.checked_mul(Decimal::from(tenure_months)))
        .and_then(|v| v.checked_div(MONTHS_TIMES_PERCENT))
        .ok_or_else(|| overflow("total repayable"))?;

    principal
        .checked_add(interest)
        .map(round_money)
        .ok_or_else(|| overflow("total repayable"))
}

/// Equal monthly installment.
///
/// With a zero monthly rate the principal is split evenly. Otherwise the
/// standard annuity formula is used:
/// `EMI = r * P * (1 + r)^N / ((1 + r)^N - 1)`.
pub fn emi_amount(
    principal: Decimal,
    annual_rate: Decimal,
    tenure_months: i32,
) -> Result<Decimal> {
    check_tenure(tenure_months)?;

    let r = monthly_rate(annual_rate);
    if r.is_zero() {
        return Ok(round_money(principal / Decimal::from(tenure_months)));
    }

    let compound = compound_factor(r, tenure_months)?;
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(Error::CalculationError {
            message: format!("compound factor collapsed to one for monthly rate {r}"),
        });
    }

    r.checked_mul(principal)
        .and_then(|v| v.checked_mul(compound))
        .and_then(|v| v.checked_div(denominator))
        .map(round_money)
        .ok_or_else(|| overflow("EMI amount"))
}

/// Computes both repayment amounts for a loan.
pub fn compute_terms(
    principal: Decimal,
    annual_rate: Decimal,
    tenure_months: i32,
) -> Result<RepaymentTerms> {
    Ok(RepaymentTerms {
        emi_amount: emi_amount(principal, annual_rate, tenure_months)?,
        total_repayable: total_repayable(principal, annual_rate, tenure_months)?,
    })
}

/// Due date of the installment `offset` months after `start`.
///
/// Calendar months are added, so an approval on Jan 31 falls due on the last
/// day of February.
pub fn due_date(start: DateTime<Utc>, offset: u32) -> Result<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(offset))
        .ok_or_else(|| Error::CalculationError {
            message: format!("due date {offset} months after {start} is out of range"),
        })
}

/// Due dates for installments 1..=tenure, one calendar month apart.
pub fn schedule_due_dates(
    start: DateTime<Utc>,
    tenure_months: i32,
) -> Result<Vec<DateTime<Utc>>> {
    check_tenure(tenure_months)?;
    let months = u32::try_from(tenure_months).map_err(|_| Error::InvalidTenure {
        tenure: tenure_months,
    })?;

    (1..=months).map(|offset| due_date(start, offset)).collect()
}

/// `(1 + r)^n` by repeated multiplication.
fn compound_factor(monthly_rate: Decimal, tenure_months: i32) -> Result<Decimal> {
    let base = Decimal::ONE + monthly_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..tenure_months {
        compound = compound
            .checked_mul(base)
            .ok_or_else(|| overflow("compound factor"))?;
    }
    Ok(compound)
}

fn check_tenure(tenure_months: i32) -> Result<()> {
    if tenure_months <= 0 {
        return Err(Error::InvalidTenure {
            tenure: tenure_months,
        });
    }
    Ok(())
}

fn overflow(what: &str) -> Error {
    Error::CalculationError {
        message: format!("{what} overflowed decimal precision"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_round_money_is_half_up() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(10)), dec!(10));
    }

    #[test]
    fn test_fits_column_bounds() {
        assert!(fits_column(dec!(9999999999999.99), MONEY_PRECISION, MONEY_SCALE));
        assert!(fits_column(dec!(100000.00), MONEY_PRECISION, MONEY_SCALE));
        assert!(fits_column(dec!(2.500), MONEY_PRECISION, MONEY_SCALE));
        assert!(!fits_column(dec!(10000000000000), MONEY_PRECISION, MONEY_SCALE));
        assert!(!fits_column(dec!(1234567890123456.78), MONEY_PRECISION, MONEY_SCALE));
        assert!(!fits_column(dec!(10.005), MONEY_PRECISION, MONEY_SCALE));

        assert!(fits_column(dec!(999.99), RATE_PRECISION, RATE_SCALE));
        assert!(!fits_column(dec!(1000), RATE_PRECISION, RATE_SCALE));
        assert!(!fits_column(dec!(7.123456789), RATE_PRECISION, RATE_SCALE));
    }

    #[test]
    fn test_monthly_rate_precision() {
        assert_eq!(monthly_rate(dec!(7.5)), dec!(0.00625));
        assert_eq!(monthly_rate(dec!(10)), dec!(0.0083333333));
        assert_eq!(monthly_rate(dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn test_emi_amount_known_values() -> Result<()> {
        assert_eq!(emi_amount(dec!(100000), dec!(7.5), 24)?, dec!(4499.96));
        assert_eq!(emi_amount(dec!(120000), dec!(12), 12)?, dec!(10661.85));
        assert_eq!(emi_amount(dec!(1000), dec!(10), 7)?, dec!(147.66));
        assert_eq!(emi_amount(dec!(10000), dec!(8.5), 36)?, dec!(315.68));
        Ok(())
    }

    #[test]
    fn test_emi_amount_zero_rate_splits_principal() -> Result<()> {
        assert_eq!(emi_amount(dec!(50000), dec!(0), 12)?, dec!(4166.67));
        assert_eq!(emi_amount(dec!(100000), dec!(0), 3)?, dec!(33333.33));
        assert_eq!(emi_amount(dec!(1200), dec!(0), 12)?, dec!(100));
        Ok(())
    }

    #[test]
    fn test_total_repayable_known_values() -> Result<()> {
        assert_eq!(total_repayable(dec!(100000), dec!(7.5), 24)?, dec!(115000.00));
        assert_eq!(total_repayable(dec!(120000), dec!(12), 12)?, dec!(134400));
        assert_eq!(total_repayable(dec!(1000), dec!(10), 7)?, dec!(1058.33));
        assert_eq!(total_repayable(dec!(50000), dec!(0), 12)?, dec!(50000));
        Ok(())
    }

    #[test]
    fn test_non_positive_tenure_is_rejected() {
        assert!(matches!(
            emi_amount(dec!(1000), dec!(5), 0),
            Err(Error::InvalidTenure { tenure: 0 })
        ));
        assert!(matches!(
            total_repayable(dec!(1000), dec!(5), -3),
            Err(Error::InvalidTenure { tenure: -3 })
        ));
        assert!(matches!(
            schedule_due_dates(Utc::now(), 0),
            Err(Error::InvalidTenure { tenure: 0 })
        ));
    }

    #[test]
    fn test_zero_principal_gives_zero_emi() -> Result<()> {
        // approval treats this as a calculation failure
        assert_eq!(emi_amount(Decimal::ZERO, dec!(7.5), 12)?, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_zero_rate_emis_sum_to_total_within_rounding() -> Result<()> {
        for (principal, tenure) in [(dec!(50000), 12), (dec!(100000), 3), (dec!(999.99), 7)] {
            let terms = compute_terms(principal, Decimal::ZERO, tenure)?;
            let sum = terms.emi_amount * Decimal::from(tenure);
            let tolerance = dec!(0.005) * Decimal::from(tenure);
            assert!((sum - terms.total_repayable).abs() <= tolerance);
        }
        Ok(())
    }

    #[test]
    fn test_schedule_due_dates_are_monthly_and_increasing() -> Result<()> {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        let dates = schedule_due_dates(start, 24)?;

        assert_eq!(dates.len(), 24);
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2025, 2, 15, 10, 30, 0).unwrap());
        assert_eq!(dates[23], Utc.with_ymd_and_hms(2027, 1, 15, 10, 30, 0).unwrap());
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        Ok(())
    }

    #[test]
    fn test_due_date_clamps_to_month_end() -> Result<()> {
        let start = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let dates = schedule_due_dates(start, 3)?;

        assert_eq!((dates[0].month(), dates[0].day()), (2, 28));
        assert_eq!((dates[1].month(), dates[1].day()), (3, 31));
        assert_eq!((dates[2].month(), dates[2].day()), (4, 30));
        Ok(())
    }
}
