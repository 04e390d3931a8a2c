//! Background jobs

pub mod recalc;
pub mod worker;

pub use recalc::{RecalcError, RecalcResult, Recalculator};
pub use worker::{RecalcStatus, RecalcWorker, TriggerOutcome};
