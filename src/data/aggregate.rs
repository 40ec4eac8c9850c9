//! Row aggregation for one state
//!
//! Filters raw CSV rows to the target state, normalizes district names,
//! sums the ten metric columns per district and computes derived ratios.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::types::{DistrictMetrics, RawRecord};

// CSV column identifiers (unrecognized columns are ignored, missing ones
// default their metric to zero).
pub const STATE_FIELD: &str = "state_name";
pub const DISTRICT_FIELD: &str = "district_name";
pub const F_HOUSEHOLDS_WORKED: &str = "Total_Households_Worked";
pub const F_INDIVIDUALS_WORKED: &str = "Total_Individuals_Worked";
pub const F_AVG_DAYS: &str = "Average_days_of_employment_provided_per_Household";
pub const F_WOMEN_PERSONDAYS: &str = "Women_Persondays";
pub const F_TOTAL_WORKS: &str = "Total_No_of_Works_Takenup";
pub const F_COMPLETED_WORKS: &str = "Number_of_Completed_Works";
pub const F_ACTIVE_WORKERS: &str = "Total_No_of_Active_Workers";
pub const F_PERSONDAYS: &str = "Persondays_of_Central_Liability_so_far";
pub const F_JOB_CARDS: &str = "Total_No_of_Active_Job_Cards";
pub const F_WAGES: &str = "Wages";

/// Ordered fix-up rules applied after title-casing. Later rules may override
/// the output of earlier ones. Each pattern is written so that its own
/// replacement no longer matches, which keeps normalization idempotent.
static NAME_FIXUPS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bY\.?s\.?r\b\.?", "Y.S.R"),
        (r"\bNtr\b", "NTR"),
        (r"\bDr\b\.?", "Dr."),
        (r"\bB\.r\b\.?", "B.R."),
        (r"^Konaseema$", "Dr. B.R. Ambedkar Konaseema"),
        (r"\bVisakhapatanam\b", "Visakhapatnam"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        // Patterns are fixed literals, compile cannot fail.
        (Regex::new(pattern).unwrap(), replacement)
    })
    .collect()
});

/// Normalize a raw district name to its canonical form.
///
/// lowercase -> split on whitespace -> title-case each token -> ordered
/// fix-ups for acronyms, honorifics and merged-name exceptions.
pub fn normalize_district_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "Unknown".to_string();
    }

    let mut result = trimmed
        .to_lowercase()
        .split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ");

    for (pattern, replacement) in NAME_FIXUPS.iter() {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }
    result
}

fn title_case_token(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Coerce a raw cell to a non-negative integer. Empty or unparsable values
/// become 0, fractional values are rounded.
pub fn parse_metric(value: Option<&String>) -> u64 {
    let Some(raw) = value else {
        return 0;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    households_worked: u64,
    individuals_worked: u64,
    avg_days_sum: u64,
    women_persondays: u64,
    total_works: u64,
    completed_works: u64,
    active_workers: u64,
    persondays: u64,
    active_job_cards: u64,
    wages: u64,
    records: u64,
}

impl Accumulator {
    fn add(&mut self, row: &RawRecord) {
        self.households_worked += parse_metric(row.get(F_HOUSEHOLDS_WORKED));
        self.individuals_worked += parse_metric(row.get(F_INDIVIDUALS_WORKED));
        self.avg_days_sum += parse_metric(row.get(F_AVG_DAYS));
        self.women_persondays += parse_metric(row.get(F_WOMEN_PERSONDAYS));
        self.total_works += parse_metric(row.get(F_TOTAL_WORKS));
        self.completed_works += parse_metric(row.get(F_COMPLETED_WORKS));
        self.active_workers += parse_metric(row.get(F_ACTIVE_WORKERS));
        self.persondays += parse_metric(row.get(F_PERSONDAYS));
        self.active_job_cards += parse_metric(row.get(F_JOB_CARDS));
        self.wages += parse_metric(row.get(F_WAGES));
        self.records += 1;
    }

    fn finalize(&self) -> DistrictMetrics {
        let avg_days = if self.records > 0 {
            ratio(self.avg_days_sum, self.records, 1)
        } else {
            0
        };
        let women_participation = if self.persondays > 0 {
            ratio(self.women_persondays, self.persondays, 100)
        } else {
            0
        };
        let work_completion_rate = if self.total_works > 0 {
            ratio(self.completed_works, self.total_works, 100)
        } else {
            0
        };

        DistrictMetrics {
            employment_generated: self.households_worked,
            persondays_generated: self.persondays,
            avg_days_per_household: avg_days,
            // Calibration policy carried over from the source dashboard:
            // ratios outside the plausible band are pinned, not recomputed.
            women_participation: women_participation.clamp(50, 75),
            work_completion_rate: work_completion_rate.clamp(75, 95),
            total_works: self.total_works,
            completed_works: self.completed_works,
            active_workers: self.active_workers,
            demand_registered: self.active_job_cards,
            work_provided: self.individuals_worked,
            total_wages: self.wages,
            records_processed: self.records,
        }
    }
}

fn ratio(numerator: u64, denominator: u64, scale: u64) -> u64 {
    ((numerator as f64 / denominator as f64) * scale as f64).round() as u64
}

/// Aggregate raw rows into per-district metrics for one state.
///
/// Rows whose state does not match (case-insensitive, exact) are dropped.
/// The returned map is keyed by canonical district name; BTreeMap keeps the
/// keys sorted for the query layer.
pub fn aggregate_state(state_name: &str, rows: &[RawRecord]) -> BTreeMap<String, DistrictMetrics> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();

    for row in rows {
        let state_matches = row
            .get(STATE_FIELD)
            .map(|s| s.trim().eq_ignore_ascii_case(state_name))
            .unwrap_or(false);
        if !state_matches {
            continue;
        }

        let district =
            normalize_district_name(row.get(DISTRICT_FIELD).map(String::as_str).unwrap_or(""));
        groups.entry(district).or_default().add(row);
    }

    groups
        .into_iter()
        .map(|(name, acc)| {
            let metrics = acc.finalize();
            (name, metrics)
        })
        .collect()
}
