/// Forward-only simulation clock.
pub mod clock;
/// Priority-ordered load dispatch.
pub mod dispatcher;
pub mod engine;
pub mod kpi;
/// Piecewise-linear lookup tables.
pub mod table;
pub mod types;
