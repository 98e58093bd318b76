use std::fmt;
use std::str::FromStr;

use crate::models::{JobRecord, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }

    /// Next filter in display order, wrapping back to All. Drives the
    /// filter key in the dashboard.
    pub fn cycle(&self) -> StatusFilter {
        match self {
            StatusFilter::All => StatusFilter::Only(Status::Applied),
            StatusFilter::Only(Status::Applied) => StatusFilter::Only(Status::Interview),
            StatusFilter::Only(Status::Interview) => StatusFilter::Only(Status::Offer),
            StatusFilter::Only(Status::Offer) => StatusFilter::Only(Status::Rejected),
            StatusFilter::Only(Status::Rejected) => StatusFilter::Only(Status::Withdrawn),
            StatusFilter::Only(Status::Withdrawn) => StatusFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All Status",
            StatusFilter::Only(s) => s.label(),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(s) => f.write_str(s.as_str()),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<Status>().map(StatusFilter::Only)
    }
}

/// Summary counts over the full (unfiltered) list. Withdrawn records are in
/// `total` but get no count of their own; the dashboard does not surface one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub total: usize,
    pub applied: usize,
    pub interview: usize,
    pub offer: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    /// Records passing the search and status filter, in the order they
    /// arrived (created_at descending). Never re-sorted here.
    pub visible: Vec<JobRecord>,
    pub counts: StatusCounts,
}

/// Pure function from the synchronized list plus the two dashboard inputs
/// to what gets rendered. A record is visible iff the status filter accepts
/// it and either the search term is empty or company/role contains it
/// case-insensitively.
pub fn derive_view(records: &[JobRecord], search: &str, filter: StatusFilter) -> DerivedView {
    let needle = search.to_lowercase();

    let visible: Vec<JobRecord> = records
        .iter()
        .filter(|r| filter.matches(r.status))
        .filter(|r| {
            needle.is_empty()
                || r.company.to_lowercase().contains(&needle)
                || r.role.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();

    let mut counts = StatusCounts {
        total: records.len(),
        ..StatusCounts::default()
    };
    for r in records {
        match r.status {
            Status::Applied => counts.applied += 1,
            Status::Interview => counts.interview += 1,
            Status::Offer => counts.offer += 1,
            Status::Rejected => counts.rejected += 1,
            Status::Withdrawn => {}
        }
    }

    DerivedView { visible, counts }
}
