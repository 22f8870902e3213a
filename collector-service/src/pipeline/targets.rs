use std::{collections::BTreeSet, path::Path};

use energy_client::{
    domain::{Complex, RequestMonth},
    store::energy_queries,
};
use time::Date;

/// Inclusive month range a complex is expected to have data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetWindow {
    pub start: RequestMonth,
    pub end: RequestMonth,
}

impl TargetWindow {
    /// From the approval month up to the month before `today`; the current
    /// month is never requested since its data may still be incomplete.
    pub fn for_approval(approval: Date, today: Date) -> Self {
        Self {
            start: RequestMonth::from_date(approval),
            end: RequestMonth::from_date(today).pred(),
        }
    }

    /// No full month has passed since approval.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn months(&self) -> Vec<RequestMonth> {
        RequestMonth::range_inclusive(self.start, self.end)
    }
}

/// Months of `wanted` not in `collected`, in the order of `wanted`.
pub fn pending_months(wanted: &[RequestMonth], collected: &BTreeSet<RequestMonth>) -> Vec<RequestMonth> {
    wanted
        .iter()
        .copied()
        .filter(|m| !collected.contains(m))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The roster approval date is not a valid calendar date.
    InvalidApprovalDate(String),
    /// Nothing left to fetch for the window.
    Complete(TargetWindow),
    Pending {
        window: TargetWindow,
        months: Vec<RequestMonth>,
    },
}

/// Work out which months of `complex` still need fetching, given its energy
/// file at `file`.
///
/// Fails only when an existing file cannot be read.
pub fn resolve(complex: &Complex, today: Date, file: &Path) -> Result<Resolution, energy_client::Error> {
    let Ok(approval) = complex.approval() else {
        return Ok(Resolution::InvalidApprovalDate(complex.approval_date.clone()));
    };
    let window = TargetWindow::for_approval(approval, today);

    let collected = energy_queries::collected_months(file)?;
    let months = pending_months(&window.months(), &collected);

    if months.is_empty() {
        Ok(Resolution::Complete(window))
    } else {
        Ok(Resolution::Pending { window, months })
    }
}
