use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned by the backing collection on insert. Opaque and
/// stable for the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Applied,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Applied,
        Status::Interview,
        Status::Offer,
        Status::Rejected,
        Status::Withdrawn,
    ];

    /// Wire name, matching what the collection stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::Interview => "interview",
            Status::Offer => "offer",
            Status::Rejected => "rejected",
            Status::Withdrawn => "withdrawn",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::Interview => "Interview",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
            Status::Withdrawn => "Withdrawn",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "applied" => Ok(Status::Applied),
            "interview" => Ok(Status::Interview),
            "offer" => Ok(Status::Offer),
            "rejected" => Ok(Status::Rejected),
            "withdrawn" => Ok(Status::Withdrawn),
            other => Err(format!(
                "unknown status '{}' (expected applied, interview, offer, rejected, withdrawn)",
                other
            )),
        }
    }
}

/// Supported currency codes and their display symbols. Currencies are stored
/// as free text; a code outside this table is accepted and simply renders
/// without a symbol.
pub const CURRENCIES: [(&str, &str); 17] = [
    ("PHP", "₱"),
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("JPY", "¥"),
    ("CAD", "C$"),
    ("AUD", "A$"),
    ("SGD", "S$"),
    ("HKD", "HK$"),
    ("KRW", "₩"),
    ("INR", "₹"),
    ("CNY", "¥"),
    ("THB", "฿"),
    ("MYR", "RM"),
    ("IDR", "Rp"),
    ("VND", "₫"),
    ("OTHER", ""),
];

pub const DEFAULT_CURRENCY: &str = "PHP";

pub fn currency_symbol(code: &str) -> &'static str {
    CURRENCIES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, sym)| *sym)
        .unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// One job application, as mirrored from the backing collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: RecordId,
    pub owner_id: String,
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub job_url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Assigned server-side; may lag the record itself while the backend
    /// materializes its timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Draft pre-filled from this record, for edit flows that overwrite
    /// every field.
    pub fn to_draft(&self) -> JobDraft {
        JobDraft {
            company: self.company.clone(),
            role: self.role.clone(),
            location: self.location.clone(),
            salary: self.salary.clone(),
            currency: self.currency.clone(),
            status: self.status,
            job_url: self.job_url.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// User-entered fields for a create or update, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub company: String,
    pub role: String,
    pub location: String,
    pub salary: String,
    pub currency: String,
    pub status: Status,
    pub job_url: String,
    pub notes: String,
}

impl Default for JobDraft {
    fn default() -> Self {
        Self {
            company: String::new(),
            role: String::new(),
            location: String::new(),
            salary: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            status: Status::default(),
            job_url: String::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{field}' is required")]
    MissingRequiredField { field: &'static str },
}

impl JobDraft {
    /// Gate before any write. Only company and role are checked; salary,
    /// URL and currency stay free text on purpose (the tracker accepts
    /// whatever the user typed rather than second-guessing it).
    pub fn validate(self) -> Result<ValidatedDraft, ValidationError> {
        if self.company.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField { field: "company" });
        }
        if self.role.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField { field: "role" });
        }
        Ok(ValidatedDraft(self))
    }
}

/// Proof that a draft passed validation; the only thing the gateway will
/// send to the collection.
#[derive(Debug, Clone)]
pub struct ValidatedDraft(JobDraft);

impl ValidatedDraft {
    pub fn into_inner(self) -> JobDraft {
        self.0
    }
}

impl AsRef<JobDraft> for ValidatedDraft {
    fn as_ref(&self) -> &JobDraft {
        &self.0
    }
}

/// The authenticated user on whose behalf all reads and writes happen.
/// Authentication itself is someone else's problem; this is just the
/// identity threaded through the synchronizer and gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(company: &str, role: &str) -> JobDraft {
        JobDraft {
            company: company.to_string(),
            role: role.to_string(),
            ..JobDraft::default()
        }
    }

    #[test]
    fn validate_rejects_empty_company() {
        let err = draft("", "Engineer").validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredField { field: "company" }
        );
    }

    #[test]
    fn validate_rejects_whitespace_only_role() {
        let err = draft("Acme", "   \t").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingRequiredField { field: "role" });
    }

    #[test]
    fn validate_accepts_minimal_draft() {
        let validated = draft("Acme", "Engineer").validate().unwrap();
        let inner = validated.into_inner();
        assert_eq!(inner.company, "Acme");
        assert_eq!(inner.currency, "PHP");
        assert_eq!(inner.status, Status::Applied);
    }

    #[test]
    fn validate_does_not_touch_other_fields() {
        let mut d = draft("Acme", "Engineer");
        d.salary = "lots, hopefully".to_string();
        d.currency = "DOUBLOONS".to_string();
        d.job_url = "not a url".to_string();
        let inner = d.clone().validate().unwrap().into_inner();
        assert_eq!(inner, d);
    }

    #[test]
    fn currency_symbols() {
        assert_eq!(currency_symbol("PHP"), "₱");
        assert_eq!(currency_symbol("USD"), "$");
        assert_eq!(currency_symbol("OTHER"), "");
        assert_eq!(currency_symbol("DOUBLOONS"), "");
    }

    #[test]
    fn status_round_trips_through_wire_name() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("closed".parse::<Status>().is_err());
    }
}
