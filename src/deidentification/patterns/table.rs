//! Built-in detection pattern table
//!
//! One row per pattern: `(name, category, country, priority, group, regex, description)`.
//! Rows with `country = None` are international and always active. Adding a
//! pattern is a change to this table, never a runtime mutation.
//!
//! Priorities: 95+ structurally unambiguous national ids, 85-92 labelled or
//! checksummed ids, 80 dates, 70 phones, 60 postcodes, 40 bare record numbers.

use crate::deidentification::models::IdentifierCategory;
use crate::domain::CountryCode;

/// One declarative table row
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub name: &'static str,
    pub category: IdentifierCategory,
    pub country: Option<CountryCode>,
    pub priority: i32,
    /// Capture group holding the identifier; 0 means the whole match
    pub group: usize,
    pub regex: &'static str,
    pub description: &'static str,
}

const fn row(
    name: &'static str,
    category: IdentifierCategory,
    country: Option<CountryCode>,
    priority: i32,
    group: usize,
    regex: &'static str,
    description: &'static str,
) -> PatternSpec {
    PatternSpec {
        name,
        category,
        country,
        priority,
        group,
        regex,
        description,
    }
}

use CountryCode::*;
use IdentifierCategory as C;

pub const BUILTIN_PATTERNS: &[PatternSpec] = &[
    // ---------------------------------------------------------------- international
    row("labelled_mrn", C::Mrn, None, 96, 1,
        r"\b(?i:MRN|medical\s+record(?:\s+(?:no\.?|number))?|hospital\s+(?:no\.?|number)|patient\s+id|UHID)\s*[:#]?\s*((?:[A-Z]{1,4}-?)?\d[A-Z0-9-]{3,14})\b",
        "Medical record number following an MRN/hospital number label"),
    row("labelled_fax", C::Fax, None, 92, 1,
        r"\b(?i:fax)(?:\s*(?i:no\.?|number))?\s*[:#]?\s*(\+?\d[\d\s().-]{6,18}\d)",
        "Fax number following a fax label"),
    row("email", C::Email, None, 90, 0,
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        "Email address"),
    row("url", C::Url, None, 90, 0,
        r#"\b(?:https?://|www\.)[^\s<>"']*[^\s<>"'.,;:!?)]"#,
        "Web URL"),
    row("ipv4", C::IpAddress, None, 85, 0,
        r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        "IPv4 address"),
    row("labelled_device", C::DeviceId, None, 85, 1,
        r"\b(?i:device|serial|implant)(?:\s+(?i:id|no\.?|number|s/n))?\s*[:#]\s*([A-Z0-9][A-Z0-9-]{4,24})\b",
        "Device identifier or serial number following a device label"),
    row("labelled_health_plan", C::HealthPlanNumber, None, 82, 1,
        r"\b(?i:insurance|policy|member|beneficiary|health\s+plan)\s*(?i:id|no\.?|number|#)\s*[:#]?\s*([A-Z0-9][A-Z0-9-]{4,19})\b",
        "Health plan or insurance number following a label"),
    row("labelled_account", C::AccountNumber, None, 80, 1,
        r"\b(?i:account|acct|a/c)(?:\s*(?i:no\.?|number|#))?\s*[:#]?\s*(\d{6,17})\b",
        "Account number following an account label"),
    row("labelled_license", C::LicenseNumber, None, 80, 1,
        r"\b(?i:licen[cs]e|DL|permit)(?:\s*(?i:no\.?|number|#))?\s*[:#]\s*([A-Z0-9][A-Z0-9-]{4,15})\b",
        "Certificate or licence number following a label"),
    row("date_year_first", C::Date, None, 80, 0,
        r"(?<![\d.])\d{4}([-/.])\d{1,2}\1\d{1,2}(?![\d])",
        "Numeric date, year first (YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD)"),
    row("date_numeric", C::Date, None, 80, 0,
        r"(?<![\d.])\d{1,2}([-/.])\d{1,2}\1(?:\d{4}|\d{2})(?![\d])",
        "Numeric date, day or month first, with a consistent separator"),
    row("date_textual_day_first", C::Date, None, 78, 0,
        r"\b\d{1,2}(?:st|nd|rd|th)?\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?,?\s+\d{4}\b",
        "Date with a textual month, day first"),
    row("date_textual_month_first", C::Date, None, 78, 0,
        r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
        "Date with a textual month, month first"),
    row("labelled_first_name", C::FirstName, None, 76, 1,
        r"\b(?i:first\s*name|given\s*name|fname)\s*[:=]\s*([A-Z][a-z]+(?:[-'][A-Z][a-z]+)?)\b",
        "Given name following a first-name label"),
    row("labelled_last_name", C::LastName, None, 76, 1,
        r"\b(?i:last\s*name|surname|family\s*name|lname)\s*[:=]\s*([A-Z][a-z]+(?:[-'][A-Z][a-z]+)?)\b",
        "Family name following a last-name label"),
    row("labelled_full_name", C::FullName, None, 75, 1,
        r"\b(?:[Pp]atient(?:\s+[Nn]ame)?|[Nn]ame|[Mm]r\.|[Mm]rs\.|[Mm]s\.|[Dd]r\.|[Mm]other|[Ff]ather|[Ss]pouse|[Gg]uardian|[Cc]aregiver)\s*:?\s+([A-Z][a-z]+(?:[ '-][A-Z][a-z]+){1,3})\b",
        "Full name following a patient/name/title label"),
    row("age_over_89", C::AgeOverThreshold, None, 72, 0,
        r"(?i)\b(?:9\d|1[0-4]\d)[\s-]*(?:years?[\s-]*old|years?|yrs?|y/o|yo)\b",
        "Age over 89 expressed in years"),
    row("labelled_age_over_89", C::AgeOverThreshold, None, 72, 1,
        r"\b(?i:age[d]?)\s*[:=]?\s*(9\d|1[0-4]\d)\b",
        "Age over 89 following an age label"),
    row("labelled_city", C::City, None, 70, 1,
        r"\b(?i:city|town|village)\s*[:=]\s*([A-Z][A-Za-z'.-]*(?:\s[A-Z][A-Za-z'.-]*){0,3})",
        "City following a city label"),
    row("labelled_state", C::State, None, 70, 1,
        r"\b(?i:state|province|region|county|district)\s*[:=]\s*([A-Z][A-Za-z'.-]*(?:\s[A-Z][A-Za-z'.-]*){0,3})",
        "State, province or region following a label"),
    row("street_address", C::StreetAddress, None, 65, 0,
        r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl|Terrace|Close|Crescent|Highway|Hwy)\b\.?",
        "Street number, name and suffix"),
    row("international_phone", C::Phone, None, 60, 0,
        r"(?<![\w+])\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,4}(?!\d)",
        "Phone number in international +CC notation"),
    row("bare_record_number", C::Mrn, None, 40, 0,
        r"\b\d{10}\b",
        "Unlabelled 10-digit record number"),
    // ---------------------------------------------------------------- United States
    row("us_ssn", C::NationalId, Some(US), 95, 0,
        r"\b\d{3}-\d{2}-\d{4}\b",
        "US Social Security Number"),
    row("us_medicare_mbi", C::HealthPlanNumber, Some(US), 80, 0,
        r"\b[1-9][AC-HJKMNP-RT-Y][AC-HJKMNP-RT-Y0-9]\d[AC-HJKMNP-RT-Y][AC-HJKMNP-RT-Y0-9]\d[AC-HJKMNP-RT-Y]{2}\d{2}\b",
        "US Medicare Beneficiary Identifier"),
    row("us_phone", C::Phone, Some(US), 70, 0,
        r"(?<!\d)(?:\+1[\s.-]?)?(?:\(\d{3}\)\s?|\d{3}[\s.-])\d{3}[\s.-]\d{4}(?!\d)",
        "US phone number"),
    row("us_zip_labelled", C::PostalCode, Some(US), 62, 1,
        r"\b(?i:zip(?:\s*code)?)\s*[:#]?\s*(\d{5}(?:-\d{4})?)\b",
        "US ZIP code following a label"),
    row("us_zip_after_state", C::PostalCode, Some(US), 60, 1,
        r"\b(?:AL|AK|AZ|AR|CA|CO|CT|DE|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MA|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY|DC)\s+(\d{5}(?:-\d{4})?)\b",
        "US ZIP code following a state abbreviation"),
    // ---------------------------------------------------------------- European Union
    row("eu_iban", C::AccountNumber, Some(EU), 85, 0,
        r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){3,7}(?:\s?[A-Z0-9]{1,3})?\b",
        "International Bank Account Number"),
    row("eu_ehic", C::HealthPlanNumber, Some(EU), 80, 1,
        r"\b(?i:EHIC)\s*[:#]?\s*(\d{20})\b",
        "European Health Insurance Card number"),
    row("eu_phone", C::Phone, Some(EU), 68, 0,
        r"(?<![\w+])\+(?:3\d|4\d)\s?\d{1,4}(?:[\s.-]?\d{2,4}){2,4}(?!\d)",
        "European phone number"),
    // ---------------------------------------------------------------- United Kingdom
    row("gb_nhs_number", C::NationalId, Some(GB), 88, 0,
        r"\b\d{3}\s\d{3}\s\d{4}\b",
        "NHS number (3-3-4 spaced)"),
    row("gb_ni_number", C::NationalId, Some(GB), 88, 0,
        r"\b[A-CEGHJ-PR-TW-Z][A-CEGHJ-NPR-TW-Z]\s?\d{2}\s?\d{2}\s?\d{2}\s?[A-D]\b",
        "National Insurance number"),
    row("gb_phone", C::Phone, Some(GB), 70, 0,
        r"(?<!\d)(?:\+44\s?7\d{3}|07\d{3})\s?\d{3}\s?\d{3}(?!\d)",
        "UK mobile number"),
    row("gb_postcode", C::PostalCode, Some(GB), 60, 0,
        r"\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b",
        "UK postcode"),
    // ---------------------------------------------------------------- Canada
    row("ca_sin", C::NationalId, Some(CA), 85, 0,
        r"\b\d{3}[-\s]\d{3}[-\s]\d{3}\b",
        "Social Insurance Number"),
    row("ca_health_card", C::HealthPlanNumber, Some(CA), 82, 0,
        r"\b\d{4}[-\s]?\d{3}[-\s]?\d{3}[-\s]?[A-Z]{2}\b",
        "Provincial health card number with version code"),
    row("ca_postal_code", C::PostalCode, Some(CA), 60, 0,
        r"\b[ABCEGHJ-NPRSTVXY]\d[ABCEGHJ-NPRSTV-Z]\s?\d[ABCEGHJ-NPRSTV-Z]\d\b",
        "Canadian postal code"),
    // ---------------------------------------------------------------- Australia
    row("au_tfn", C::NationalId, Some(AU), 80, 0,
        r"\b\d{3}\s\d{3}\s\d{3}\b",
        "Tax File Number"),
    row("au_medicare", C::HealthPlanNumber, Some(AU), 80, 0,
        r"\b[2-6]\d{3}\s?\d{5}\s?\d(?:[-/]?\d)?\b",
        "Medicare card number"),
    row("au_phone", C::Phone, Some(AU), 70, 0,
        r"(?<!\d)(?:\+61\s?4|04)\d{2}\s?\d{3}\s?\d{3}(?!\d)",
        "Australian mobile number"),
    // ---------------------------------------------------------------- India
    row("in_aadhaar", C::NationalId, Some(IN), 90, 0,
        r"\b[2-9]\d{3}\s?\d{4}\s?\d{4}\b",
        "Aadhaar number"),
    row("in_abha", C::HealthPlanNumber, Some(IN), 88, 0,
        r"\b\d{2}-\d{4}-\d{4}-\d{4}\b",
        "Ayushman Bharat Health Account number"),
    row("in_pan", C::NationalId, Some(IN), 85, 0,
        r"\b[A-Z]{5}\d{4}[A-Z]\b",
        "Permanent Account Number"),
    row("in_phone", C::Phone, Some(IN), 70, 0,
        r"(?<!\d)(?:\+91[\s-]?|0)?[6-9]\d{9}(?!\d)",
        "Indian mobile number"),
    row("in_pin_code", C::PostalCode, Some(IN), 62, 1,
        r"\b(?i:pin(?:\s*code)?|pincode)\s*[:#-]?\s*([1-9]\d{5})\b",
        "PIN code following a label"),
    // ---------------------------------------------------------------- Indonesia
    row("id_nik", C::NationalId, Some(ID), 85, 0,
        r"\b\d{16}\b",
        "Nomor Induk Kependudukan"),
    row("id_bpjs", C::HealthPlanNumber, Some(ID), 82, 1,
        r"\b(?i:BPJS)(?:\s*(?i:no\.?|number))?\s*[:#]?\s*(\d{13})\b",
        "BPJS Kesehatan card number"),
    row("id_phone", C::Phone, Some(ID), 70, 0,
        r"(?<!\d)(?:\+62\s?|0)8\d{2}[\s-]?\d{3,4}[\s-]?\d{3,5}(?!\d)",
        "Indonesian mobile number"),
    // ---------------------------------------------------------------- Brazil
    row("br_cpf", C::NationalId, Some(BR), 95, 0,
        r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b",
        "Cadastro de Pessoas Fisicas"),
    row("br_cns", C::HealthPlanNumber, Some(BR), 82, 0,
        r"\b[12789]\d{2}\s?\d{4}\s?\d{4}\s?\d{4}\b",
        "Cartao Nacional de Saude"),
    row("br_phone", C::Phone, Some(BR), 70, 0,
        r"(?<!\d)(?:\+55\s?)?\(?\d{2}\)?\s?9\d{4}-?\d{4}(?!\d)",
        "Brazilian mobile number"),
    row("br_cep", C::PostalCode, Some(BR), 60, 0,
        r"\b\d{5}-\d{3}\b",
        "Codigo de Enderecamento Postal"),
    // ---------------------------------------------------------------- Philippines
    row("ph_philhealth", C::HealthPlanNumber, Some(PH), 88, 0,
        r"\b\d{2}-\d{9}-\d\b",
        "PhilHealth identification number"),
    row("ph_sss", C::NationalId, Some(PH), 88, 0,
        r"\b\d{2}-\d{7}-\d\b",
        "Social Security System number"),
    row("ph_tin", C::NationalId, Some(PH), 84, 0,
        r"\b\d{3}-\d{3}-\d{3}(?:-\d{3,5})?\b",
        "Tax Identification Number"),
    row("ph_phone", C::Phone, Some(PH), 70, 0,
        r"(?<!\d)(?:\+63\s?|0)9\d{2}[\s-]?\d{3}[\s-]?\d{4}(?!\d)",
        "Philippine mobile number"),
    // ---------------------------------------------------------------- South Africa
    row("za_id_number", C::NationalId, Some(ZA), 90, 0,
        r"\b\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{4}[01]\d{2}\b",
        "South African identity number"),
    row("za_phone", C::Phone, Some(ZA), 70, 0,
        r"(?<!\d)(?:\+27\s?|0)[6-8]\d\s?\d{3}\s?\d{4}(?!\d)",
        "South African mobile number"),
    // ---------------------------------------------------------------- Egypt
    row("eg_national_id", C::NationalId, Some(EG), 90, 0,
        r"\b[23]\d{13}\b",
        "Egyptian national ID number"),
    row("eg_phone", C::Phone, Some(EG), 70, 0,
        r"(?<!\d)(?:\+20\s?|0)1[0125]\d{8}(?!\d)",
        "Egyptian mobile number"),
    // ---------------------------------------------------------------- Kenya
    row("ke_national_id", C::NationalId, Some(KE), 85, 1,
        r"\b(?i:national\s+id|id\s+no\.?|id\s+number)\s*[:#]?\s*(\d{7,8})\b",
        "Kenyan national ID number following a label"),
    row("ke_kra_pin", C::NationalId, Some(KE), 85, 0,
        r"\b[AP]\d{9}[A-Z]\b",
        "KRA personal identification number"),
    row("ke_health_insurance", C::HealthPlanNumber, Some(KE), 82, 1,
        r"\b(?i:NHIF|SHIF|SHA)(?:\s*(?i:no\.?|number))?\s*[:#]?\s*(\d{6,12})\b",
        "NHIF/SHA member number following a label"),
    row("ke_phone", C::Phone, Some(KE), 70, 0,
        r"(?<!\d)(?:\+254\s?|0)[17]\d{2}\s?\d{3}\s?\d{3}(?!\d)",
        "Kenyan mobile number"),
    // ---------------------------------------------------------------- Nigeria
    row("ng_nin_bvn", C::NationalId, Some(NG), 90, 1,
        r"\b(?i:NIN|BVN)\s*[:#]?\s*(\d{11})\b",
        "National Identification Number or Bank Verification Number"),
    row("ng_phone", C::Phone, Some(NG), 70, 0,
        r"(?<!\d)(?:\+234\s?|0)[789][01]\d\s?\d{3}\s?\d{4}(?!\d)",
        "Nigerian mobile number"),
    // ---------------------------------------------------------------- Ghana
    row("gh_card", C::NationalId, Some(GH), 95, 0,
        r"\bGHA-\d{9}-\d\b",
        "Ghana Card personal ID number"),
    row("gh_nhis", C::HealthPlanNumber, Some(GH), 82, 1,
        r"\b(?i:NHIS)(?:\s*(?i:no\.?|number))?\s*[:#]?\s*(\d{8,10})\b",
        "NHIS membership number following a label"),
    row("gh_phone", C::Phone, Some(GH), 70, 0,
        r"(?<!\d)(?:\+233\s?|0)[235]\d\s?\d{3}\s?\d{4}(?!\d)",
        "Ghanaian mobile number"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_country_has_patterns() {
        for code in CountryCode::ALL {
            assert!(
                BUILTIN_PATTERNS.iter().any(|p| p.country == Some(code)),
                "no patterns for {code}"
            );
        }
    }

    #[test]
    fn test_pattern_names_unique() {
        let names: HashSet<_> = BUILTIN_PATTERNS.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), BUILTIN_PATTERNS.len());
    }

    #[test]
    fn test_zip_after_state_abbreviation() {
        let zip = BUILTIN_PATTERNS
            .iter()
            .find(|p| p.name == "us_zip_after_state")
            .unwrap();
        let re = regex::Regex::new(zip.regex).unwrap();
        let caps = re.captures("Springfield, IL 62704-1234").unwrap();
        assert_eq!(&caps[zip.group], "62704-1234");
        assert!(re.captures("Springfield, ZZ 62704").is_none());
    }
}
