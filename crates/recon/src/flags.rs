//! Document flags derived from the client file list.
//!
//! Every flag is driven by an ordered `(label, pattern)` rule table. Matching
//! is a case-insensitive substring search after apostrophe normalization.

use std::fmt;

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRule {
    pub label: &'static str,
    pub pattern: &'static str,
}

const fn rule(label: &'static str, pattern: &'static str) -> FlagRule {
    FlagRule { label, pattern }
}

pub const SSN_CARD: FlagRule = rule("SSN Card", "Social Security Card");

pub const CDL_OR_STATE_ID: FlagRule = rule(
    "CDL or State ID",
    "Driver's License/State ID Card/Photo ID/ School Identification Card",
);

pub const HOMELESSNESS_VERIFICATION: FlagRule = rule(
    "Homelessness Verification",
    "Form 6053 - Los Angeles CoC Homelessness Verification",
);

pub const DISABILITY_VERIFICATION: FlagRule = rule("Disability Verification", "Disability Verification");

/// Evaluated in order; matching labels are listed in this order.
pub const HEALTH_INSURANCE_RULES: &[FlagRule] = &[
    rule("Medicare/Medicaid", "Medicaid or Medicare Card"),
    rule("Other Health Insurance", "Health Insurance Documentation"),
];

/// Evaluated in order; matching labels are listed in this order.
pub const PROOF_OF_INCOME_RULES: &[FlagRule] = &[
    rule("Pay Stub", "Pay Stub"),
    rule("SSDI", "Supplemental Security Disability Income (SSDI) Forms"),
    rule("SSI", "Supplemental Security Income (SSI) Forms"),
    rule("GR", "General Relief (GR) Form"),
    rule("Food Stamp", "Food Stamp Card or Award Letter"),
    rule("CalWORKS", "CalWORKS Forms"),
    rule("Form 1087", "Form 1087 - Self Declaration of Income/No Income Form"),
    rule("Form 1084", "Form 1084 - 3rd Party Income Verification"),
    rule("Alimony Agreement", "Alimony Agreement"),
    rule("Social Security (NUMI) Printout", "Social Security (NUMI) Printout"),
    rule("Tax Return", "Tax Return"),
    rule("Veterans Affairs (VA) Benefits Award Letter", "Veterans Affairs (VA) Benefits Award Letter"),
    rule("Self Employment Document", "Self Employment Document"),
    rule("Other Financial Document", "Other Financial Document"),
];

pub const ALL_DOCUMENTS_PRESENT: &str = "All documents present";

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Folds curly and mis-decoded apostrophes to `'`, drops BOMs, lowercases.
pub fn normalize_for_match(text: &str) -> String {
    text.replace("â€™", "'")
        .replace("â\u{80}\u{99}", "'")
        .replace(['\u{2019}', '\u{2018}'], "'")
        .replace('\u{feff}', "")
        .to_lowercase()
}

fn matches(haystack: &str, rule: &FlagRule) -> bool {
    haystack.contains(&normalize_for_match(rule.pattern))
}

/// A multi-valued flag: absent, or the labels of every matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiFlag {
    Absent,
    Present(Vec<&'static str>),
}

impl MultiFlag {
    fn evaluate(haystack: &str, rules: &[FlagRule]) -> Self {
        let labels: Vec<&'static str> = rules.iter().filter(|r| matches(haystack, r)).map(|r| r.label).collect();
        if labels.is_empty() {
            MultiFlag::Absent
        } else {
            MultiFlag::Present(labels)
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, MultiFlag::Present(_))
    }
}

/// `"0"` when absent, else `"1 - "` followed by the comma-joined labels.
impl fmt::Display for MultiFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiFlag::Absent => f.write_str("0"),
            MultiFlag::Present(labels) => write!(f, "1 - {}", labels.join(", ")),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentFlags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFlags {
    pub ssn_card: bool,
    pub cdl_or_state_id: bool,
    pub homelessness_verification: bool,
    pub disability_verification: bool,
    pub health_insurance: MultiFlag,
    pub proof_of_income: MultiFlag,
}

impl DocumentFlags {
    /// Absent text derives the same flags as empty text.
    pub fn derive(file_list: Option<&str>) -> Self {
        let haystack = normalize_for_match(file_list.unwrap_or(""));
        Self {
            ssn_card: matches(&haystack, &SSN_CARD),
            cdl_or_state_id: matches(&haystack, &CDL_OR_STATE_ID),
            homelessness_verification: matches(&haystack, &HOMELESSNESS_VERIFICATION),
            disability_verification: matches(&haystack, &DISABILITY_VERIFICATION),
            health_insurance: MultiFlag::evaluate(&haystack, HEALTH_INSURANCE_RULES),
            proof_of_income: MultiFlag::evaluate(&haystack, PROOF_OF_INCOME_RULES),
        }
    }

    /// SSN card, photo ID and some proof of income.
    pub fn document_ready(&self) -> bool {
        self.ssn_card && self.cdl_or_state_id && self.proof_of_income.is_present()
    }

    /// Labels of absent documents in fixed order. Homelessness verification
    /// is not part of the checklist.
    pub fn missing_documents(&self) -> String {
        let checklist = [
            ("SSN Card", self.ssn_card),
            ("CDL or State ID", self.cdl_or_state_id),
            ("Disability Verification (If Applicable)", self.disability_verification),
            ("Health Insurance", self.health_insurance.is_present()),
            ("Proof of Income", self.proof_of_income.is_present()),
        ];
        let missing: Vec<&str> = checklist.iter().filter(|(_, present)| !present).map(|(label, _)| *label).collect();
        if missing.is_empty() {
            ALL_DOCUMENTS_PRESENT.to_string()
        } else {
            missing.join(", ")
        }
    }
}

pub fn flag_cell(flag: bool) -> String {
    u8::from(flag).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_valued_flags_follow_rule_order() {
        let text = "Pay Stub, Medicaid or Medicare Card, Tax Return, CalWORKS Forms";
        let flags = DocumentFlags::derive(Some(text));
        assert_eq!(flags.health_insurance.to_string(), "1 - Medicare/Medicaid");
        assert_eq!(flags.proof_of_income.to_string(), "1 - Pay Stub, CalWORKS, Tax Return");
    }

    #[test]
    fn no_patterns_means_everything_missing() {
        let flags = DocumentFlags::derive(Some("Intake Packet"));
        assert_eq!(flags.health_insurance.to_string(), "0");
        assert_eq!(flags.proof_of_income.to_string(), "0");
        assert!(!flags.document_ready());
        assert_eq!(
            flags.missing_documents(),
            "SSN Card, CDL or State ID, Disability Verification (If Applicable), Health Insurance, Proof of Income"
        );
        assert_eq!(DocumentFlags::derive(None), flags);
    }

    #[test]
    fn case_insensitive_and_apostrophe_tolerant() {
        let curly = "social security card; driver\u{2019}s license/state id card/photo id/ school identification card";
        let flags = DocumentFlags::derive(Some(curly));
        assert!(flags.ssn_card);
        assert!(flags.cdl_or_state_id);

        let mojibake = "Driverâ€™s License/State ID Card/Photo ID/ School Identification Card";
        assert!(DocumentFlags::derive(Some(mojibake)).cdl_or_state_id);

        // UTF-8 bytes read back as Latin-1 leave C1 controls instead of cp1252 glyphs
        let latin1 = "Driver\u{e2}\u{80}\u{99}s License/State ID Card/Photo ID/ School Identification Card";
        assert!(DocumentFlags::derive(Some(latin1)).cdl_or_state_id);
    }

    #[test]
    fn document_ready_needs_ssn_id_and_income() {
        let base = "Social Security Card, Driver's License/State ID Card/Photo ID/ School Identification Card";
        assert!(!DocumentFlags::derive(Some(base)).document_ready());
        let ready = DocumentFlags::derive(Some(&format!("{base}, General Relief (GR) Form")));
        assert!(ready.document_ready());
        assert_eq!(ready.proof_of_income.to_string(), "1 - GR");
    }

    #[test]
    fn all_documents_present() {
        let text = "Social Security Card | Driver's License/State ID Card/Photo ID/ School Identification Card | \
                    Disability Verification | Health Insurance Documentation | Pay Stub";
        let flags = DocumentFlags::derive(Some(text));
        assert_eq!(flags.missing_documents(), ALL_DOCUMENTS_PRESENT);
        assert!(!flags.homelessness_verification);
    }
}
