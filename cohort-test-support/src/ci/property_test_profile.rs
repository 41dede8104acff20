//! Property-test run profile parsing for CI and local overrides.
//!
//! Every property suite in the workspace reads its case count and fork mode
//! through [`ProptestRunProfile`], so CI can scale all suites at once.

use std::{env, fmt};

/// Environment variable overriding the number of proptest cases.
pub const COHORT_PROPTEST_CASES_ENV_KEY: &str = "COHORT_PROPTEST_CASES";
/// Environment variable enabling forked proptest execution.
pub const COHORT_PBT_FORK_ENV_KEY: &str = "COHORT_PBT_FORK";

/// Runtime profile for property-test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Loads a profile from the environment, falling back to the supplied
    /// defaults for unset or malformed overrides.
    ///
    /// # Examples
    ///
    /// ```
    /// use cohort_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self {
            cases: read_override(COHORT_PROPTEST_CASES_ENV_KEY, parse_cases).unwrap_or(default_cases),
            fork: read_override(COHORT_PBT_FORK_ENV_KEY, parse_switch).unwrap_or(default_fork),
        }
    }

    /// Number of cases to run per property.
    #[rustfmt::skip]
    #[must_use]
    pub const fn cases(&self) -> u32 { self.cases }

    /// Whether to run proptest cases in forked subprocesses.
    #[rustfmt::skip]
    #[must_use]
    pub const fn fork(&self) -> bool { self.fork }
}

/// Why an override was ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
enum OverrideIssue {
    NotANumber(String),
    ZeroCases,
    NotASwitch,
}

impl fmt::Display for OverrideIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber(error) => write!(f, "parse error: {error}"),
            Self::ZeroCases => f.write_str("cases must be > 0"),
            Self::NotASwitch => f.write_str("expected one of: true/false/1/0/yes/no/on/off"),
        }
    }
}

fn read_override<T>(key: &'static str, parse: fn(&str) -> Result<T, OverrideIssue>) -> Option<T> {
    let raw = env::var(key).ok()?;
    parse(&raw)
        .inspect_err(|issue| {
            tracing::warn!(
                env = key,
                raw = %raw,
                reason = %issue,
                "invalid property-test profile override; using default",
            );
        })
        .ok()
}

fn parse_cases(raw: &str) -> Result<u32, OverrideIssue> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(OverrideIssue::ZeroCases),
        Ok(cases) => Ok(cases),
        Err(error) => Err(OverrideIssue::NotANumber(error.to_string())),
    }
}

fn parse_switch(raw: &str) -> Result<bool, OverrideIssue> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OverrideIssue::NotASwitch),
    }
}
