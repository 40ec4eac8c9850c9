use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("No data available for {state}")] StateNotFound {
        state: String,
        available: Vec<String>,
    },

    #[error("No data found for {district} in {state}")] DistrictNotFound {
        district: String,
        state: String,
    },

    #[error("Database error: {0}")] Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")] Csv(#[from] csv::Error),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),
}
