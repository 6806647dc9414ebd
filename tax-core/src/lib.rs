//! Progressive marginal-rate tax and levy engine.
//!
//! Rate schedules are data: a [`BracketTable`] per jurisdiction, tax year,
//! filer category and residency class, held in a [`ScheduleRegistry`]. The
//! engine walks a table for a taxable amount, then layers on levies,
//! surtaxes, credits, surcharges and contributions declared by the year's
//! schedule.
//!
//! Nothing here performs I/O; loading reference data lives in `tax-data`.

pub mod calculations;
pub mod models;
pub mod registry;

pub use models::*;
pub use registry::{
    CategoryLimit, FallbackPolicy, RegistryError, ScheduleRegistry, SelectionError, TableKey,
    YearResolution, YearSchedule,
};
