//! Data service: snapshot store and query API
//!
//! Owns the per-state aggregation snapshot. Loads are triggered at startup,
//! on demand (`refresh`) or lazily by the first query; each successful load
//! builds the district map off to the side and swaps it in as one atomic
//! assignment, so readers never observe a partially aggregated snapshot.

pub mod aggregate;
pub mod loader;

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::config::DataConfig;
use crate::errors::{DashboardError, DashboardResult};
use crate::logger::{self, LogTag};
use crate::types::{
    ComparativeEntry, ComparativeResponse, DataOrigin, DistrictListResponse, FileStatus,
    PerformanceMetadata, PerformanceResponse, PerformanceSummary, RefreshResponse, StateSnapshot,
};

pub struct DataService {
    csv_path: PathBuf,
    state_name: String,
    snapshot: RwLock<Option<StateSnapshot>>,
    last_modified: Mutex<Option<SystemTime>>,
    is_loading: AtomicBool,
}

impl DataService {
    pub fn new(config: &DataConfig) -> Self {
        Self {
            csv_path: PathBuf::from(&config.csv_path),
            state_name: config.state_name.clone(),
            snapshot: RwLock::new(None),
            last_modified: Mutex::new(None),
            is_loading: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    /// Load (or reload) the snapshot. CSV failures of any kind degrade to the
    /// deterministic fallback set; this never fails.
    pub async fn initialize(&self) {
        if self.csv_path.exists() {
            match self.load_from_file().await {
                Ok(()) => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Data,
                        &format!("CSV load failed ({}), using fallback data", e),
                    );
                    self.load_fallback().await;
                }
            }
        } else {
            logger::warning(LogTag::Data, "CSV file not found, using fallback data");
            self.load_fallback().await;
        }
    }

    /// Stream and aggregate the CSV file.
    ///
    /// No-op when a load is already in progress (flag, not a lock) or when
    /// the file's mtime has not advanced since the last successful load.
    async fn load_from_file(&self) -> DashboardResult<()> {
        if self.is_loading.swap(true, Ordering::SeqCst) {
            logger::debug(LogTag::Data, "Load already in progress, skipping");
            return Ok(());
        }
        let result = self.load_from_file_inner().await;
        self.is_loading.store(false, Ordering::SeqCst);
        result
    }

    async fn load_from_file_inner(&self) -> DashboardResult<()> {
        let modified = std::fs::metadata(&self.csv_path)?.modified()?;
        {
            let last = self.last_modified.lock().unwrap();
            if let Some(prev) = *last {
                if modified <= prev {
                    logger::debug(LogTag::Data, "CSV file unchanged, keeping snapshot");
                    return Ok(());
                }
            }
        }

        let rows = loader::read_csv_rows(&self.csv_path)?;
        logger::info(
            LogTag::Data,
            &format!("CSV loaded: {} records", rows.len()),
        );

        self.install_snapshot(aggregate::aggregate_state(&self.state_name, &rows), DataOrigin::CsvFile)
            .await;
        *self.last_modified.lock().unwrap() = Some(modified);
        Ok(())
    }

    async fn load_fallback(&self) {
        let rows = loader::generate_fallback_rows(&self.state_name);
        self.install_snapshot(
            aggregate::aggregate_state(&self.state_name, &rows),
            DataOrigin::FallbackData,
        )
        .await;
    }

    async fn install_snapshot(
        &self,
        districts: std::collections::BTreeMap<String, crate::types::DistrictMetrics>,
        origin: DataOrigin,
    ) {
        let count = districts.len();
        let snapshot = StateSnapshot {
            state: self.state_name.clone(),
            districts,
            loaded_at: Utc::now(),
            origin,
        };
        // Single assignment: readers see either the old or the new snapshot.
        *self.snapshot.write().await = Some(snapshot);
        logger::info(
            LogTag::Data,
            &format!("Snapshot installed: {} districts ({})", count, origin.as_str()),
        );
    }

    /// Wait until a snapshot exists, loading lazily if nobody has yet.
    async fn ensure_loaded(&self) {
        loop {
            if self.snapshot.read().await.is_some() {
                return;
            }
            if self.is_loading.load(Ordering::SeqCst) {
                // Another task is mid-load; yield until its snapshot lands.
                tokio::task::yield_now().await;
                continue;
            }
            self.initialize().await;
        }
    }

    /// Force a reload pass. The mtime check still applies, so an unchanged
    /// file keeps the current snapshot.
    pub async fn refresh(&self) -> RefreshResponse {
        self.initialize().await;
        let guard = self.snapshot.read().await;
        let (count, origin) = guard
            .as_ref()
            .map(|s| (s.districts.len(), s.origin))
            .unwrap_or((0, DataOrigin::FallbackData));
        RefreshResponse {
            success: true,
            district_count: count,
            source: origin,
            refreshed_at: Utc::now(),
        }
    }

    // =========================================================================
    // QUERY API
    // =========================================================================

    pub async fn get_districts_for_state(
        &self,
        state: &str,
    ) -> DashboardResult<DistrictListResponse> {
        self.ensure_loaded().await;
        let guard = self.snapshot.read().await;
        let snapshot = Self::match_state(&guard, state)?;

        Ok(DistrictListResponse {
            success: true,
            districts: snapshot.districts.keys().cloned().collect(),
            total: snapshot.districts.len(),
            source: snapshot.origin,
            data_source: snapshot.origin.label().to_string(),
            last_updated: snapshot.loaded_at,
            file_last_modified: self.last_modified_utc(),
        })
    }

    pub async fn get_district_performance(
        &self,
        state: &str,
        district: &str,
    ) -> DashboardResult<PerformanceResponse> {
        self.ensure_loaded().await;
        let guard = self.snapshot.read().await;
        let snapshot = Self::match_state(&guard, state)?;

        let metrics = snapshot.districts.get(district).cloned().ok_or_else(|| {
            DashboardError::DistrictNotFound {
                district: district.to_string(),
                state: state.to_string(),
            }
        })?;

        let note = match snapshot.origin {
            DataOrigin::CsvFile => format!(
                "Real-time data from government CSV file ({} records)",
                metrics.records_processed
            ),
            DataOrigin::FallbackData => "Sample government data for demonstration".to_string(),
        };

        Ok(PerformanceResponse {
            success: true,
            source: snapshot.origin,
            last_updated: snapshot.loaded_at,
            summary: PerformanceSummary {
                total_persondays: metrics.persondays_generated,
                total_households: metrics.employment_generated,
                works_completed: metrics.completed_works,
                total_works: metrics.total_works,
                note,
            },
            metadata: PerformanceMetadata {
                state: snapshot.state.clone(),
                district: district.to_string(),
                data_source: snapshot.origin.label().to_string(),
                file_last_modified: self.last_modified_utc(),
                records_processed: metrics.records_processed,
            },
            performance: metrics,
        })
    }

    pub async fn get_comparative_data(&self, state: &str) -> DashboardResult<ComparativeResponse> {
        self.ensure_loaded().await;
        let guard = self.snapshot.read().await;
        let snapshot = Self::match_state(&guard, state)?;

        // BTreeMap iteration is already ascending by district name.
        let data: Vec<ComparativeEntry> = snapshot
            .districts
            .iter()
            .map(|(district, m)| ComparativeEntry {
                district: district.clone(),
                employment_generated: m.employment_generated,
                work_completion_rate: m.work_completion_rate,
                women_participation: m.women_participation,
                avg_days_per_household: m.avg_days_per_household,
            })
            .collect();

        Ok(ComparativeResponse {
            success: true,
            total_districts: data.len(),
            data,
            state: snapshot.state.clone(),
            source: snapshot.origin,
        })
    }

    /// Read-only diagnostic surface, no side effects (does not trigger a load).
    pub async fn file_status(&self) -> FileStatus {
        let file_exists = self.csv_path.exists();
        let guard = self.snapshot.read().await;
        let source = guard.as_ref().map(|s| s.origin).unwrap_or(if file_exists {
            DataOrigin::CsvFile
        } else {
            DataOrigin::FallbackData
        });

        FileStatus {
            csv_path: self.csv_path.display().to_string(),
            file_exists,
            last_modified: self.last_modified_utc(),
            snapshot_loaded: guard.is_some(),
            district_count: guard.as_ref().map(|s| s.districts.len()).unwrap_or(0),
            source,
        }
    }

    fn match_state<'a>(
        guard: &'a Option<StateSnapshot>,
        state: &str,
    ) -> DashboardResult<&'a StateSnapshot> {
        let snapshot = guard.as_ref().ok_or_else(|| DashboardError::StateNotFound {
            state: state.to_string(),
            available: Vec::new(),
        })?;
        if !state.trim().eq_ignore_ascii_case(&snapshot.state) {
            return Err(DashboardError::StateNotFound {
                state: state.to_string(),
                available: vec![snapshot.state.clone()],
            });
        }
        Ok(snapshot)
    }

    fn last_modified_utc(&self) -> Option<DateTime<Utc>> {
        self.last_modified
            .lock()
            .unwrap()
            .map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_envelope;
    use std::io::Write;

    fn service_for(path: &str) -> DataService {
        DataService::new(&DataConfig {
            csv_path: path.to_string(),
            state_name: "Andhra Pradesh".to_string(),
        })
    }

    fn write_sample_csv(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("mgnrega_data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "state_name,district_name,Total_Households_Worked,Persondays_of_Central_Liability_so_far,Women_Persondays,Total_No_of_Works_Takenup,Number_of_Completed_Works,Average_days_of_employment_provided_per_Household"
        )
        .unwrap();
        writeln!(file, "ANDHRA PRADESH,GUNTUR,100,1000,600,100,80,30").unwrap();
        writeln!(file, "ANDHRA PRADESH,GUNTUR,50,500,300,50,40,20").unwrap();
        writeln!(file, "ANDHRA PRADESH,KRISHNA,200,2000,1200,10,8,25").unwrap();
        writeln!(file, "TELANGANA,WARANGAL,999,9,9,9,9,9").unwrap();
        path
    }

    #[tokio::test]
    async fn absent_source_serves_full_fallback_list() {
        let service = service_for("definitely-missing.csv");
        service.initialize().await;

        let status = service.file_status().await;
        assert!(!status.file_exists);
        assert!(status.snapshot_loaded);
        assert_eq!(status.source, DataOrigin::FallbackData);
        assert_eq!(status.district_count, 26);

        let districts = service
            .get_districts_for_state("Andhra Pradesh")
            .await
            .unwrap();
        assert_eq!(districts.total, 26);
        assert_eq!(districts.source, DataOrigin::FallbackData);
        assert!(districts
            .districts
            .contains(&"Dr. B.R. Ambedkar Konaseema".to_string()));
    }

    #[tokio::test]
    async fn first_query_triggers_lazy_load() {
        let service = service_for("definitely-missing.csv");
        // No initialize() call; the query itself must load.
        let districts = service
            .get_districts_for_state("Andhra Pradesh")
            .await
            .unwrap();
        assert_eq!(districts.total, 26);
    }

    #[tokio::test]
    async fn aggregates_csv_rows_per_district() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_csv(&dir);
        let service = service_for(path.to_str().unwrap());
        service.initialize().await;

        let perf = service
            .get_district_performance("Andhra Pradesh", "Guntur")
            .await
            .unwrap();
        assert_eq!(perf.performance.employment_generated, 150);
        assert_eq!(perf.performance.records_processed, 2);
        assert_eq!(perf.performance.women_participation, 60);
        assert_eq!(perf.performance.work_completion_rate, 80);
        // round((30 + 20) / 2)
        assert_eq!(perf.performance.avg_days_per_household, 25);
        assert_eq!(perf.source, DataOrigin::CsvFile);

        // Telangana row must have been dropped
        let districts = service
            .get_districts_for_state("Andhra Pradesh")
            .await
            .unwrap();
        assert_eq!(districts.districts, vec!["Guntur", "Krishna"]);
    }

    #[tokio::test]
    async fn unknown_district_yields_structured_error() {
        let service = service_for("definitely-missing.csv");
        let err = service
            .get_district_performance("Andhra Pradesh", "Unknown")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No data found for Unknown in Andhra Pradesh"
        );

        let envelope = to_envelope(
            service
                .get_district_performance("Andhra Pradesh", "Unknown")
                .await,
        );
        assert_eq!(envelope["success"], false);
        assert_eq!(
            envelope["error"],
            "No data found for Unknown in Andhra Pradesh"
        );
    }

    #[tokio::test]
    async fn unknown_state_lists_available_states() {
        let service = service_for("definitely-missing.csv");
        service.initialize().await;

        let err = service.get_districts_for_state("Kerala").await.unwrap_err();
        match err {
            DashboardError::StateNotFound { available, .. } => {
                assert_eq!(available, vec!["Andhra Pradesh"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn comparative_data_is_sorted_by_district() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_csv(&dir);
        let service = service_for(path.to_str().unwrap());

        let comparative = service
            .get_comparative_data("Andhra Pradesh")
            .await
            .unwrap();
        assert_eq!(comparative.total_districts, 2);
        for pair in comparative.data.windows(2) {
            assert!(pair[0].district < pair[1].district);
        }
    }

    #[tokio::test]
    async fn refresh_skips_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_csv(&dir);
        let service = service_for(path.to_str().unwrap());

        let first = service.refresh().await;
        assert_eq!(first.district_count, 2);
        assert_eq!(first.source, DataOrigin::CsvFile);

        // Same mtime: the second pass keeps the snapshot and still succeeds.
        let second = service.refresh().await;
        assert!(second.success);
        assert_eq!(second.district_count, 2);
    }

    #[tokio::test]
    async fn refresh_reloads_when_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_csv(&dir);
        let service = service_for(path.to_str().unwrap());

        let first = service.refresh().await;
        assert_eq!(first.district_count, 2);
        let before = service.file_status().await.last_modified.unwrap();

        // mtime granularity can be a full second on some filesystems.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "ANDHRA PRADESH,PRAKASAM,10,100,60,10,8,12").unwrap();
        file.flush().unwrap();

        let second = service.refresh().await;
        assert_eq!(second.district_count, 3);
        let after = service.file_status().await.last_modified.unwrap();
        assert!(after > before);

        let districts = service
            .get_districts_for_state("Andhra Pradesh")
            .await
            .unwrap();
        assert!(districts.districts.contains(&"Prakasam".to_string()));
    }
}
