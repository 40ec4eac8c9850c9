//! CSV source access and synthetic fallback rows
//!
//! Streams rows from the government CSV export with the `csv` crate.
//! When the file is absent or unreadable the service runs on a synthetic
//! row set: one row per district of the fixed AP list, values derived from
//! a deterministic formula seeded by the district's list position so the
//! resulting snapshot is reproducible across runs.

use std::fs::File;
use std::path::Path;

use crate::data::aggregate::{
    DISTRICT_FIELD, F_ACTIVE_WORKERS, F_AVG_DAYS, F_COMPLETED_WORKS, F_HOUSEHOLDS_WORKED,
    F_INDIVIDUALS_WORKED, F_JOB_CARDS, F_PERSONDAYS, F_TOTAL_WORKS, F_WAGES, F_WOMEN_PERSONDAYS,
    STATE_FIELD,
};
use crate::errors::DashboardResult;
use crate::logger::{self, LogTag};
use crate::types::RawRecord;

/// All 26 districts of Andhra Pradesh, in official listing order. The index
/// of each district doubles as the seed for its fallback row.
pub const FALLBACK_DISTRICTS: [&str; 26] = [
    "Srikakulam",
    "Parvathipuram Manyam",
    "Vizianagaram",
    "Visakhapatnam",
    "Alluri Sitharama Raju",
    "Anakapalli",
    "Kakinada",
    "Dr. B.R. Ambedkar Konaseema",
    "East Godavari",
    "West Godavari",
    "Eluru",
    "NTR",
    "Krishna",
    "Guntur",
    "Bapatla",
    "Palnadu",
    "Prakasam",
    "Sri Potti Sriramulu Nellore",
    "Tirupati",
    "Chittoor",
    "Annamayya",
    "Y.S.R Kadapa",
    "Anantapur",
    "Sri Satyasai",
    "Kurnool",
    "Nandyal",
];

const FALLBACK_FIN_YEAR: &str = "2025-2026";

/// Read all rows from the CSV file. Individual malformed rows are skipped
/// (logged at debug) so one bad line cannot poison the load; opening or
/// stream-level failures bubble up and trigger fallback generation.
pub fn read_csv_rows(path: &Path) -> DashboardResult<Vec<RawRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let row: RawRecord = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect();
                rows.push(row);
            }
            Err(e) => {
                logger::debug(
                    LogTag::Data,
                    &format!("Skipping malformed CSV row {}: {}", idx + 2, e),
                );
            }
        }
    }

    Ok(rows)
}

/// Deterministic per-district jitter. A splitmix64-style scramble of the
/// district index, reduced to `[0, span)`. Replaces the unseeded RNG of the
/// source dashboard so fallback snapshots are reproducible.
fn seeded_jitter(index: u64, salt: u64, span: u64) -> u64 {
    let mut z = index
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(salt.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) % span
}

/// Generate one synthetic row per fallback district for the given state.
pub fn generate_fallback_rows(state_name: &str) -> Vec<RawRecord> {
    FALLBACK_DISTRICTS
        .iter()
        .enumerate()
        .map(|(i, district)| {
            let index = i as u64;
            let base_employment = 50_000 + index * 15_000 + seeded_jitter(index, 1, 20_000);
            let base_days = 25 + seeded_jitter(index, 2, 15);

            let mut row = RawRecord::new();
            row.insert("fin_year".to_string(), FALLBACK_FIN_YEAR.to_string());
            row.insert(STATE_FIELD.to_string(), state_name.to_uppercase());
            row.insert(DISTRICT_FIELD.to_string(), district.to_uppercase());
            row.insert(F_HOUSEHOLDS_WORKED.to_string(), base_employment.to_string());
            row.insert(
                F_INDIVIDUALS_WORKED.to_string(),
                (base_employment * 14 / 10).to_string(),
            );
            row.insert(F_AVG_DAYS.to_string(), base_days.to_string());
            row.insert(
                F_WOMEN_PERSONDAYS.to_string(),
                (base_employment * base_days * 6 / 10).to_string(),
            );
            row.insert(F_TOTAL_WORKS.to_string(), (base_employment / 100).to_string());
            row.insert(
                F_COMPLETED_WORKS.to_string(),
                (base_employment / 150).to_string(),
            );
            row.insert(
                F_ACTIVE_WORKERS.to_string(),
                (base_employment * 21 / 10).to_string(),
            );
            row.insert(
                F_PERSONDAYS.to_string(),
                (base_employment * base_days).to_string(),
            );
            row.insert(
                F_JOB_CARDS.to_string(),
                (base_employment * 12 / 10).to_string(),
            );
            row.insert(
                F_WAGES.to_string(),
                (base_employment * base_days * 300).to_string(),
            );
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fallback_rows_are_deterministic() {
        let first = generate_fallback_rows("Andhra Pradesh");
        let second = generate_fallback_rows("Andhra Pradesh");
        assert_eq!(first, second);
        assert_eq!(first.len(), FALLBACK_DISTRICTS.len());
    }

    #[test]
    fn fallback_rows_cover_every_district() {
        let rows = generate_fallback_rows("Andhra Pradesh");
        for (row, district) in rows.iter().zip(FALLBACK_DISTRICTS.iter()) {
            assert_eq!(row[DISTRICT_FIELD], district.to_uppercase());
            assert_eq!(row[STATE_FIELD], "ANDHRA PRADESH");
            assert!(row[F_HOUSEHOLDS_WORKED].parse::<u64>().unwrap() >= 50_000);
        }
    }

    #[test]
    fn jitter_stays_in_span() {
        for index in 0..26 {
            assert!(seeded_jitter(index, 1, 20_000) < 20_000);
            assert!(seeded_jitter(index, 2, 15) < 15);
        }
    }

    #[test]
    fn reads_rows_from_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "state_name,district_name,Total_Households_Worked").unwrap();
        writeln!(file, "ANDHRA PRADESH,GUNTUR,100").unwrap();
        writeln!(file, "ANDHRA PRADESH,KRISHNA,50").unwrap();
        file.flush().unwrap();

        let rows = read_csv_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][DISTRICT_FIELD], "GUNTUR");
        assert_eq!(rows[1][F_HOUSEHOLDS_WORKED], "50");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_csv_rows(Path::new("no-such-file.csv")).is_err());
    }
}
