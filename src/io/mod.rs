/// CSV export of simulated interval rows.
pub mod export;
/// CSV import of historical interval records.
pub mod import;
