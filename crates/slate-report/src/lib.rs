//! Slate Report crate - test-suite report records.
//!
//! Record types for a JUnit-style suite report and its test cases, plus
//! [`ReportStore`], which installs their tables and saves and loads them
//! through a [`slate_store::ConnectionManager`].

pub mod records;
pub mod store;

pub use records::{register_types, SuiteReport, TestCaseResult, TestOutcome, OUTCOME};
pub use store::ReportStore;
