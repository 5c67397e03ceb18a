//! Country codes for regulatory pattern sets
//!
//! Each supported jurisdiction is a closed [`CountryCode`] variant mapping to a
//! fixed slice of the pattern table. [`CountrySelection`] expresses "every
//! registered country" with an explicit `All` variant.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Order in which a jurisdiction writes day and month in numeric dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentOrder {
    /// `DD/MM/YYYY`
    DayFirst,
    /// `MM/DD/YYYY`
    MonthFirst,
}

/// Supported regulatory jurisdictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountryCode {
    /// United States (HIPAA)
    US,
    /// European Union (GDPR)
    EU,
    /// United Kingdom (UK GDPR / DPA 2018)
    GB,
    /// Canada (PIPEDA)
    CA,
    /// Australia (Privacy Act 1988)
    AU,
    /// India (DPDP Act 2023)
    IN,
    /// Indonesia (PDP Law)
    ID,
    /// Brazil (LGPD)
    BR,
    /// Philippines (Data Privacy Act)
    PH,
    /// South Africa (POPIA)
    ZA,
    /// Egypt (Data Protection Law 151/2020)
    EG,
    /// Kenya (Data Protection Act 2019)
    KE,
    /// Nigeria (NDPA 2023)
    NG,
    /// Ghana (Data Protection Act 2012)
    GH,
}

impl CountryCode {
    /// Every registered country, in registration order
    pub const ALL: [CountryCode; 14] = [
        Self::US,
        Self::EU,
        Self::GB,
        Self::CA,
        Self::AU,
        Self::IN,
        Self::ID,
        Self::BR,
        Self::PH,
        Self::ZA,
        Self::EG,
        Self::KE,
        Self::NG,
        Self::GH,
    ];

    /// Two-letter code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::US => "US",
            Self::EU => "EU",
            Self::GB => "GB",
            Self::CA => "CA",
            Self::AU => "AU",
            Self::IN => "IN",
            Self::ID => "ID",
            Self::BR => "BR",
            Self::PH => "PH",
            Self::ZA => "ZA",
            Self::EG => "EG",
            Self::KE => "KE",
            Self::NG => "NG",
            Self::GH => "GH",
        }
    }

    /// Preferred numeric date order
    pub fn date_order(&self) -> ComponentOrder {
        match self {
            Self::US | Self::PH => ComponentOrder::MonthFirst,
            _ => ComponentOrder::DayFirst,
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        // "UK" is accepted as an alias for GB
        let upper = if upper == "UK" { "GB".to_string() } else { upper };
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| {
                format!(
                    "Unknown country code '{}'. Must be one of: {}",
                    s,
                    Self::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// The set of jurisdictions whose patterns are active for a run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CountrySelection {
    /// Every registered country
    #[default]
    All,
    /// An explicit list; the first entry drives date order preference
    Only(Vec<CountryCode>),
}

impl CountrySelection {
    /// Build a selection from a list, dropping duplicates while keeping order
    pub fn only(codes: impl IntoIterator<Item = CountryCode>) -> Self {
        let mut unique = Vec::new();
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self::Only(unique)
    }

    /// Whether `code` is part of the selection
    pub fn includes(&self, code: CountryCode) -> bool {
        match self {
            Self::All => true,
            Self::Only(codes) => codes.contains(&code),
        }
    }

    /// Selected codes in registration (for `All`) or listed order
    pub fn codes(&self) -> Vec<CountryCode> {
        match self {
            Self::All => CountryCode::ALL.to_vec(),
            Self::Only(codes) => codes.clone(),
        }
    }

    /// Date order preference of the primary (first listed) country
    ///
    /// `All` has no single primary jurisdiction and falls back to day-first,
    /// the majority convention across the registered countries.
    pub fn primary_date_order(&self) -> ComponentOrder {
        match self {
            Self::Only(codes) => codes
                .first()
                .map(CountryCode::date_order)
                .unwrap_or(ComponentOrder::DayFirst),
            Self::All => ComponentOrder::DayFirst,
        }
    }

    /// Returns true when no country is selected
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(codes) if codes.is_empty())
    }
}

impl fmt::Display for CountrySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "ALL"),
            Self::Only(codes) => {
                let list: Vec<&str> = codes.iter().map(CountryCode::as_str).collect();
                write!(f, "{}", list.join(","))
            }
        }
    }
}

impl FromStr for CountrySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let codes = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(CountryCode::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if codes.is_empty() {
            return Err("Country selection cannot be empty".to_string());
        }
        Ok(Self::only(codes))
    }
}

impl Serialize for CountrySelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::All => serializer.serialize_str("ALL"),
            Self::Only(codes) => codes.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CountrySelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Many(list) => list
                .iter()
                .map(|s| s.parse::<CountryCode>())
                .collect::<Result<Vec<_>, _>>()
                .map(Self::only)
                .map_err(serde::de::Error::custom),
        }
    }
}
