//! Per-project matching cap with proportional redistribution.

use rust_decimal::Decimal;

use crate::errors::Result;
use crate::types::fixed;

/// Allocations after capping.
#[derive(Debug, Clone, PartialEq)]
pub struct CapOutcome {
    pub allocations: Vec<Decimal>,
    /// `pot - Σ allocations`, zero when within rounding tolerance of the pot
    pub unallocated: Decimal,
    /// Number of redistribution passes that moved surplus
    pub passes: usize,
}

impl CapOutcome {
    pub fn is_saturated(&self) -> bool {
        self.unallocated > Decimal::ZERO
    }
}

/// Clamp each allocation to `cap` and hand the surplus to the projects still
/// under the cap, in proportion to their scores.
///
/// Repeats until no uncapped project exceeds the cap or every project is
/// capped. Each pass caps at least one more project, so this runs at most
/// `allocations.len()` passes.
///
/// The residual is measured against `pot` after the last pass. Quantized
/// redistribution can push a project over the cap by a few units of the last
/// digit; that dust is not reported as [`CapOutcome::unallocated`].
pub fn apply_cap(scores: &[Decimal], allocations: Vec<Decimal>, cap: Decimal, pot: Decimal) -> Result<CapOutcome> {
    debug_assert_eq!(scores.len(), allocations.len());

    let mut allocations = allocations;
    let mut capped = vec![false; allocations.len()];
    let mut passes = 0;

    loop {
        let mut surplus = Decimal::ZERO;
        for (allocation, is_capped) in allocations.iter_mut().zip(capped.iter_mut()) {
            if !*is_capped && *allocation > cap {
                surplus = fixed::add(surplus, fixed::sub(*allocation, cap)?)?;
                *allocation = cap;
                *is_capped = true;
            }
        }

        if surplus <= Decimal::ZERO {
            break;
        }
        passes += 1;

        let open_score = fixed::sum(
            scores
                .iter()
                .zip(&capped)
                .filter(|(_, is_capped)| !**is_capped)
                .map(|(score, _)| *score),
        )?;

        if open_score <= Decimal::ZERO {
            break;
        }

        for ((allocation, score), is_capped) in allocations.iter_mut().zip(scores).zip(&capped) {
            if !*is_capped {
                let share = fixed::div(fixed::mul(surplus, *score)?, open_score)?;
                *allocation = fixed::add(*allocation, share)?;
            }
        }
    }

    let residual = fixed::sub(pot, fixed::sum(allocations.iter().copied())?)?;
    let unallocated = if residual > fixed::epsilon() {
        residual
    } else {
        Decimal::ZERO
    };

    Ok(CapOutcome {
        allocations,
        unallocated,
        passes,
    })
}
