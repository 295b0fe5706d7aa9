use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{future, TryStreamExt};
use tracing::{debug, info};

use slate_core::error::{Result, SlateError};
use slate_core::types::StorageLocation;
use slate_store::{ConnectionManager, Record};

use crate::records::{SuiteReport, TestCaseResult};

/// Saves and loads suite reports through a shared [`ConnectionManager`].
///
/// The manager's registry must know the report column types; see
/// [`crate::register_types`].
#[derive(Debug, Clone)]
pub struct ReportStore {
    manager: Arc<ConnectionManager>,
    location: Option<StorageLocation>,
}

impl ReportStore {
    /// Store at the manager's default location.
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            location: None,
        }
    }

    pub fn at(manager: Arc<ConnectionManager>, location: impl Into<StorageLocation>) -> Self {
        Self {
            manager,
            location: Some(location.into()),
        }
    }

    pub fn location(&self) -> &StorageLocation {
        self.location
            .as_ref()
            .unwrap_or_else(|| self.manager.default_location())
    }

    /// Create the suite and case tables. Tables that already exist are kept.
    pub async fn install(&self) -> Result<()> {
        self.install_table::<SuiteReport>().await?;
        self.install_table::<TestCaseResult>().await
    }

    async fn install_table<R: Record>(&self) -> Result<()> {
        match self.manager.load_schema::<R>(self.location.as_ref()).await {
            Err(SlateError::DuplicateTableDefinition { table }) => {
                debug!(%table, "Report table already installed");
                Ok(())
            }
            other => other,
        }
    }

    /// Save a suite and its cases in one unit of work.
    ///
    /// Nothing is committed unless every row is written. A suite whose
    /// `report_path` is already stored is rejected with
    /// [`SlateError::OverwriteConflict`].
    pub async fn save(&self, suite: &SuiteReport, cases: &[TestCaseResult]) -> Result<()> {
        let handle = self.manager.session(self.location.as_ref())?;
        let scope = handle.scope().await?;

        let existing = scope
            .select::<SuiteReport>()
            .await?
            .try_filter(|stored| future::ready(stored.report_path == suite.report_path))
            .try_next()
            .await?;
        if existing.is_some() {
            return Err(SlateError::OverwriteConflict {
                path: suite.report_path.clone(),
            });
        }

        scope.add(suite).await?;
        let saved = scope.add_all(cases).await?;
        scope.finish().await?;

        info!(
            report_path = %suite.report_path.display(),
            cases = saved,
            "Saved suite report"
        );
        Ok(())
    }

    /// Every stored suite, in insertion order.
    pub async fn suites(&self) -> Result<Vec<SuiteReport>> {
        let handle = self.manager.session(self.location.as_ref())?;
        let scope = handle.scope().await?;
        let suites = scope.select_all::<SuiteReport>().await?;
        scope.finish().await?;
        Ok(suites)
    }

    /// Cases saved with the suite at `report_path`, in insertion order.
    pub async fn cases_for(&self, report_path: &Path) -> Result<Vec<TestCaseResult>> {
        let handle = self.manager.session(self.location.as_ref())?;
        let scope = handle.scope().await?;
        let cases: Vec<TestCaseResult> = scope
            .select::<TestCaseResult>()
            .await?
            .try_filter(|case| future::ready(case.report_path == report_path))
            .try_collect()
            .await?;
        scope.finish().await?;
        Ok(cases)
    }

    /// Report paths of every stored suite.
    pub async fn report_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .suites()
            .await?
            .into_iter()
            .map(|suite| suite.report_path)
            .collect())
    }
}
