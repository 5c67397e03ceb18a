//! Identifier categories and detection data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier category enumeration
///
/// Covers the HIPAA Safe Harbor identifiers plus the national identifier
/// families of the supported jurisdictions. Serialized in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierCategory {
    /// Given name
    FirstName,
    /// Family name
    LastName,
    /// Full personal name
    FullName,
    /// Medical record / hospital number
    Mrn,
    /// SSN-equivalent national identifier (SSN, Aadhaar, NIN, CPF, ...)
    NationalId,
    /// Telephone number
    Phone,
    /// Fax number
    Fax,
    /// Email address
    Email,
    /// Street address
    StreetAddress,
    /// City or town
    City,
    /// State, province or region
    State,
    /// Postal / ZIP / PIN code
    PostalCode,
    /// Calendar date
    Date,
    /// Age above the Safe Harbor threshold (over 89)
    AgeOverThreshold,
    /// Device identifier or serial number
    DeviceId,
    /// Web URL
    Url,
    /// IP address
    IpAddress,
    /// Bank or billing account number
    AccountNumber,
    /// Certificate or licence number
    LicenseNumber,
    /// Health plan / insurance beneficiary number
    HealthPlanNumber,
    /// User-defined identifier
    Custom,
}

impl IdentifierCategory {
    /// Every category, in declaration order
    pub const ALL: [IdentifierCategory; 21] = [
        Self::FirstName,
        Self::LastName,
        Self::FullName,
        Self::Mrn,
        Self::NationalId,
        Self::Phone,
        Self::Fax,
        Self::Email,
        Self::StreetAddress,
        Self::City,
        Self::State,
        Self::PostalCode,
        Self::Date,
        Self::AgeOverThreshold,
        Self::DeviceId,
        Self::Url,
        Self::IpAddress,
        Self::AccountNumber,
        Self::LicenseNumber,
        Self::HealthPlanNumber,
        Self::Custom,
    ];

    /// Stable code used in config files, store keys and audit output
    pub fn code(&self) -> &'static str {
        match self {
            Self::FirstName => "FIRST_NAME",
            Self::LastName => "LAST_NAME",
            Self::FullName => "FULL_NAME",
            Self::Mrn => "MRN",
            Self::NationalId => "NATIONAL_ID",
            Self::Phone => "PHONE",
            Self::Fax => "FAX",
            Self::Email => "EMAIL",
            Self::StreetAddress => "STREET_ADDRESS",
            Self::City => "CITY",
            Self::State => "STATE",
            Self::PostalCode => "POSTAL_CODE",
            Self::Date => "DATE",
            Self::AgeOverThreshold => "AGE_OVER_THRESHOLD",
            Self::DeviceId => "DEVICE_ID",
            Self::Url => "URL",
            Self::IpAddress => "IP_ADDRESS",
            Self::AccountNumber => "ACCOUNT_NUMBER",
            Self::LicenseNumber => "LICENSE_NUMBER",
            Self::HealthPlanNumber => "HEALTH_PLAN_NUMBER",
            Self::Custom => "CUSTOM",
        }
    }

    /// Default pseudonym template
    pub fn default_template(&self) -> &'static str {
        match self {
            Self::FirstName => "[FNAME-{token}]",
            Self::LastName => "[LNAME-{token}]",
            Self::FullName => "[PATIENT-{token}]",
            Self::Mrn => "[MRN-{token}]",
            Self::NationalId => "[NID-{token}]",
            Self::Phone => "[PHONE-{token}]",
            Self::Fax => "[FAX-{token}]",
            Self::Email => "[EMAIL-{token}]",
            Self::StreetAddress => "[ADDRESS-{token}]",
            Self::City => "[CITY-{token}]",
            Self::State => "[STATE-{token}]",
            Self::PostalCode => "[POSTCODE-{token}]",
            Self::Date => "[DATE-{token}]",
            Self::AgeOverThreshold => "[AGE-{token}]",
            Self::DeviceId => "[DEVICE-{token}]",
            Self::Url => "[URL-{token}]",
            Self::IpAddress => "[IP-{token}]",
            Self::AccountNumber => "[ACCOUNT-{token}]",
            Self::LicenseNumber => "[LICENSE-{token}]",
            Self::HealthPlanNumber => "[HEALTHPLAN-{token}]",
            Self::Custom => "[ID-{token}]",
        }
    }
}

impl fmt::Display for IdentifierCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for IdentifierCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase().replace(['-', ' '], "_");
        match upper.as_str() {
            "NAME" | "PERSON" => return Ok(Self::FullName),
            "SSN" => return Ok(Self::NationalId),
            "ZIP" | "POSTCODE" => return Ok(Self::PostalCode),
            "ADDRESS" => return Ok(Self::StreetAddress),
            "AGE" | "AGE_OVER_89" => return Ok(Self::AgeOverThreshold),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == upper)
            .ok_or_else(|| format!("Unknown identifier category: {s}"))
    }
}

/// One accepted detection
///
/// Ephemeral: carries only the span and category, never the matched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionResult {
    /// Byte offset where the identifier starts
    pub span_start: usize,
    /// Byte offset one past the end of the identifier
    pub span_end: usize,
    /// Identifier category
    pub category: IdentifierCategory,
    /// Priority of the pattern that produced it
    pub priority: i32,
}

impl DetectionResult {
    /// Whether two spans share at least one byte
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.span_start < end && start < self.span_end
    }
}

/// Category tallies for one text, record or file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStats {
    /// Detections per category
    pub by_category: BTreeMap<IdentifierCategory, usize>,
    /// Dates that could not be parsed and degraded to a placeholder
    pub unparsed_dates: usize,
    /// Fields left untouched after a detection failure
    pub field_errors: usize,
}

impl DetectionStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one detection
    pub fn record(&mut self, category: IdentifierCategory) {
        *self.by_category.entry(category).or_insert(0) += 1;
    }

    /// Total detections across categories
    pub fn total(&self) -> usize {
        self.by_category.values().sum()
    }

    /// Fold another set of statistics into this one
    pub fn merge(&mut self, other: &DetectionStats) {
        for (category, count) in &other.by_category {
            *self.by_category.entry(*category).or_insert(0) += count;
        }
        self.unparsed_dates += other.unparsed_dates;
        self.field_errors += other.field_errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_one_categories() {
        assert_eq!(IdentifierCategory::ALL.len(), 21);
    }

    #[test]
    fn test_category_round_trip_through_code() {
        for category in IdentifierCategory::ALL {
            assert_eq!(category.code().parse::<IdentifierCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(
            "ssn".parse::<IdentifierCategory>().unwrap(),
            IdentifierCategory::NationalId
        );
        assert_eq!(
            "postal-code".parse::<IdentifierCategory>().unwrap(),
            IdentifierCategory::PostalCode
        );
        assert!("shoe_size".parse::<IdentifierCategory>().is_err());
    }

    #[test]
    fn test_category_serde_matches_code() {
        let json = serde_json::to_string(&IdentifierCategory::AgeOverThreshold).unwrap();
        assert_eq!(json, "\"AGE_OVER_THRESHOLD\"");
    }

    #[test]
    fn test_default_templates_have_token() {
        for category in IdentifierCategory::ALL {
            assert!(category.default_template().contains("{token}"));
        }
    }

    #[test]
    fn test_stats_merge() {
        let mut a = DetectionStats::new();
        a.record(IdentifierCategory::Mrn);
        let mut b = DetectionStats::new();
        b.record(IdentifierCategory::Mrn);
        b.record(IdentifierCategory::Email);
        b.unparsed_dates = 2;

        a.merge(&b);
        assert_eq!(a.by_category[&IdentifierCategory::Mrn], 2);
        assert_eq!(a.total(), 3);
        assert_eq!(a.unparsed_dates, 2);
    }

    #[test]
    fn test_overlap() {
        let d = DetectionResult {
            span_start: 5,
            span_end: 10,
            category: IdentifierCategory::Mrn,
            priority: 1,
        };
        assert!(d.overlaps(9, 12));
        assert!(!d.overlaps(10, 12));
        assert!(!d.overlaps(0, 5));
    }
}
