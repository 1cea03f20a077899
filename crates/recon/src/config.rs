use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Canonical vocabulary
// ---------------------------------------------------------------------------

/// Estimate columns carried into the merged table, in output order.
pub const CANONICAL_COLUMNS: [&str; 20] = [
    "Appointment date",
    "Appointment month",
    "Appointment year",
    "Vendor Name",
    "PO",
    "ROID",
    "Invoice no",
    "VIN",
    "Sub Total",
    "Tax Total",
    "AI trans Fee",
    "FMC Rebate",
    "Payable Amount",
    "Rebate AI",
    "Rebate%",
    "Amount to pay",
    "Trans fee",
    "Merch fee",
    "Status in api",
    "AP status",
];

/// Source column → canonical column for query and scraper exports.
pub const DEFAULT_RENAMES: [(&str, &str); 13] = [
    ("SubTotal (exc. Tax)", "Sub Total"),
    ("Payable Amount (inc. Tax)", "Payable Amount"),
    ("company", "Vendor Name"),
    ("transaction_fee", "Trans fee"),
    ("merch_fee", "Merch fee"),
    ("Status_in_api", "Status in api"),
    ("ap_status", "AP status"),
    ("ai_order_id", "ROID"),
    ("id", "PO"),
    ("invoice_number", "Invoice no"),
    ("vin", "VIN"),
    ("AI Transaction Fee", "AI trans Fee"),
    ("FMC Rebate Amount", "FMC Rebate"),
];

pub const BUILTIN_PROFILES: [&str; 2] = ["statement", "strict-estimates"];

// ---------------------------------------------------------------------------
// Top-level profile
// ---------------------------------------------------------------------------

/// One named variant of the reconciliation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub estimate: EstimateConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub financial: FinancialConfig,
    #[serde(default)]
    pub dispute: DisputeConfig,
    #[serde(default)]
    pub dates: DateConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_profile_name() -> String {
    "statement".into()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            keys: KeyConfig::default(),
            estimate: EstimateConfig::default(),
            enrichment: EnrichmentConfig::default(),
            financial: FinancialConfig::default(),
            dispute: DisputeConfig::default(),
            dates: DateConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Preferred join column.
    pub primary: String,
    /// Used when the primary cell is empty.
    pub fallback: String,
    /// Column holding the resolved key in outputs.
    pub common_column: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            primary: "PO".into(),
            fallback: "ROID".into(),
            common_column: "CommonID".into(),
        }
    }
}

impl KeyConfig {
    pub fn is_key_column(&self, column: &str) -> bool {
        column == self.primary || column == self.fallback
    }
}

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Attach the first estimate row and tag the statement row as duplicated.
    #[default]
    Flag,
    /// Drop duplicated keys from the lookup so the rows fall through to stage 2.
    Exclude,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag => write!(f, "flag"),
            Self::Exclude => write!(f, "exclude"),
        }
    }
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flag" => Ok(Self::Flag),
            "exclude" => Ok(Self::Exclude),
            other => Err(ReconError::ConfigValidation(format!(
                "unknown duplicate policy '{other}' (expected 'flag' or 'exclude')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    /// Allow-list of estimate columns attached to statement rows.
    pub columns: Vec<String>,
    pub duplicates: DuplicatePolicy,
    /// Appended to estimate columns that collide with statement columns.
    pub suffix: String,
    /// Estimate columns that replace statement values instead of being suffixed.
    pub overwrite: Vec<String>,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            columns: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            duplicates: DuplicatePolicy::Flag,
            suffix: "_est".into(),
            overwrite: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub rename: Vec<RenameRule>,
    /// Column the scraper table is joined on, after renaming.
    pub scraper_key: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            rename: DEFAULT_RENAMES
                .iter()
                .map(|(from, to)| RenameRule {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
            scraper_key: "ROID".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Financial + Dispute + Dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FinancialConfig {
    pub subtotal: String,
    pub total: String,
    pub payable: String,
    /// Rebate percentage, 0..=100.
    pub rebate_percent: f64,
}

impl Default for FinancialConfig {
    fn default() -> Self {
        Self {
            subtotal: "SubTotal (exc. Tax)".into(),
            total: "Total (inc. Tax)".into(),
            payable: "Payable Amount (inc. Tax)".into(),
            rebate_percent: 0.0,
        }
    }
}

impl FinancialConfig {
    pub fn source_columns(&self) -> [&str; 3] {
        [&self.subtotal, &self.total, &self.payable]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisputeConfig {
    pub statement_amount: String,
    pub amount_to_pay: String,
    pub rebate: String,
    pub disputed: String,
    pub analysis: String,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            statement_amount: "Statement amount".into(),
            amount_to_pay: "Amount to pay".into(),
            rebate: "Rebate AI".into(),
            disputed: "Disputed amount".into(),
            analysis: "Dispute analysis".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    pub primary: String,
    pub fallback: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            primary: "appointment_datetime".into(),
            fallback: "created_at".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub status_column: String,
    /// Explicit leading order for the final table.
    pub columns: Vec<String>,
    /// Drop columns not listed in `columns`.
    pub strict: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            status_column: "Match Status".into(),
            columns: Vec::new(),
            strict: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl Profile {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let profile: Profile =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Built-in named profile.
    pub fn builtin(name: &str) -> Result<Self, ReconError> {
        match name {
            "statement" => Ok(Self::default()),
            "strict-estimates" => {
                let mut profile = Self::default();
                profile.name = "strict-estimates".into();
                profile.estimate.duplicates = DuplicatePolicy::Exclude;
                Ok(profile)
            }
            other => Err(ReconError::UnknownProfile(format!(
                "{other} (available: {})",
                BUILTIN_PROFILES.join(", ")
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let rate = self.financial.rebate_percent;
        if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
            return Err(ReconError::InvalidRebateRate(rate));
        }

        if self.keys.primary.trim().is_empty() || self.keys.fallback.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "keys.primary and keys.fallback must not be empty".into(),
            ));
        }
        if self.keys.primary == self.keys.fallback {
            return Err(ReconError::ConfigValidation(format!(
                "keys.primary and keys.fallback are both '{}'",
                self.keys.primary
            )));
        }
        if self.keys.common_column.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "keys.common_column must not be empty".into(),
            ));
        }

        if self.estimate.suffix.is_empty() {
            return Err(ReconError::ConfigValidation(
                "estimate.suffix must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for col in &self.estimate.columns {
            if !seen.insert(col.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "estimate.columns lists '{col}' more than once"
                )));
            }
        }

        let mut targets = HashSet::new();
        for rule in &self.enrichment.rename {
            if rule.from.is_empty() || rule.to.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "enrichment.rename entries need both 'from' and 'to'".into(),
                ));
            }
            if !targets.insert(rule.to.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "enrichment.rename maps more than one column to '{}'",
                    rule.to
                )));
            }
        }

        if self.output.status_column.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "output.status_column must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let profile = Profile::from_toml("").unwrap();
        assert_eq!(profile.name, "statement");
        assert_eq!(profile.keys.primary, "PO");
        assert_eq!(profile.keys.fallback, "ROID");
        assert_eq!(profile.estimate.columns.len(), 20);
        assert_eq!(profile.estimate.duplicates, DuplicatePolicy::Flag);
        assert_eq!(profile.enrichment.rename.len(), 13);
        assert_eq!(profile.output.status_column, "Match Status");
    }

    #[test]
    fn parse_custom_profile() {
        let input = r#"
name = "west-region"

[estimate]
columns = ["PO", "ROID", "Payable Amount", "Amount to pay"]
duplicates = "exclude"
overwrite = ["Vendor Name"]

[enrichment]
rename = [
  { from = "id", to = "PO" },
  { from = "order_ref", to = "ROID" },
]
scraper_key = "PO"

[financial]
rebate_percent = 2.5

[output]
columns = ["CommonID", "PO", "Match Status"]
strict = true
"#;
        let profile = Profile::from_toml(input).unwrap();
        assert_eq!(profile.name, "west-region");
        assert_eq!(profile.estimate.columns.len(), 4);
        assert_eq!(profile.estimate.duplicates, DuplicatePolicy::Exclude);
        assert_eq!(profile.estimate.suffix, "_est");
        assert_eq!(profile.estimate.overwrite, vec!["Vendor Name"]);
        assert_eq!(profile.enrichment.rename[1].to, "ROID");
        assert_eq!(profile.enrichment.scraper_key, "PO");
        assert_eq!(profile.financial.rebate_percent, 2.5);
        assert_eq!(profile.financial.subtotal, "SubTotal (exc. Tax)");
        assert!(profile.output.strict);
    }

    #[test]
    fn builtin_profiles() {
        let p = Profile::builtin("statement").unwrap();
        assert_eq!(p.estimate.duplicates, DuplicatePolicy::Flag);

        let p = Profile::builtin("strict-estimates").unwrap();
        assert_eq!(p.name, "strict-estimates");
        assert_eq!(p.estimate.duplicates, DuplicatePolicy::Exclude);

        let err = Profile::builtin("nope").unwrap_err();
        assert!(err.to_string().contains("strict-estimates"));
    }

    #[test]
    fn reject_rebate_out_of_range() {
        let err = Profile::from_toml("[financial]\nrebate_percent = 120.0\n").unwrap_err();
        assert!(matches!(err, ReconError::InvalidRebateRate(_)));
        assert!(err.to_string().contains("between 0 and 100"));

        let err = Profile::from_toml("[financial]\nrebate_percent = -1.0\n").unwrap_err();
        assert!(matches!(err, ReconError::InvalidRebateRate(_)));
    }

    #[test]
    fn reject_same_key_columns() {
        let err = Profile::from_toml("[keys]\nprimary = \"PO\"\nfallback = \"PO\"\n").unwrap_err();
        assert!(err.to_string().contains("both 'PO'"));
    }

    #[test]
    fn reject_duplicate_rename_target() {
        let input = r#"
[enrichment]
rename = [
  { from = "id", to = "PO" },
  { from = "po_number", to = "PO" },
]
"#;
        let err = Profile::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("more than one column to 'PO'"));
    }

    #[test]
    fn reject_unknown_duplicate_policy() {
        let err = Profile::from_toml("[estimate]\nduplicates = \"merge\"\n");
        assert!(err.is_err(), "typo in policy should fail deserialization");
        assert!("merge".parse::<DuplicatePolicy>().is_err());
        assert_eq!("exclude".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Exclude);
    }
}
