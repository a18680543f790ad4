//! SciTools Understand back-end.
//!
//! Builds a throwaway project database per version, runs the analysis,
//! and exports file-level metrics to CSV.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{AnalysisOutput, AnalysisRequest, AnalyzerError, MetricsAnalyzer, run_tool};

pub const DEFAULT_PROGRAM: &str = "und";

#[derive(Debug, Clone)]
pub struct UnderstandAnalyzer {
    program: String,
    languages: Vec<String>,
}

impl UnderstandAnalyzer {
    pub fn new(program: impl Into<String>, languages: Vec<String>) -> Self {
        Self {
            program: program.into(),
            languages,
        }
    }

    /// Argument lists for each `und` invocation, in order.
    fn steps(&self, request: &AnalysisRequest<'_>, db: &str, table: &str) -> Vec<Vec<String>> {
        let mut create = vec!["create".to_string(), "-languages".to_string()];
        create.extend(self.languages.iter().cloned());
        create.push(db.to_string());

        let mut settings = vec!["settings".to_string(), "-metrics".to_string()];
        settings.extend(request.metrics.names().iter().cloned());
        settings.extend(["-metricsOutputFile".to_string(), table.to_string(), db.to_string()]);

        vec![
            create,
            vec!["add".into(), request.tree.display().to_string(), db.into()],
            settings,
            vec!["analyze".into(), db.into()],
            vec!["metrics".into(), db.into()],
        ]
    }
}

#[async_trait]
impl MetricsAnalyzer for UnderstandAnalyzer {
    fn name(&self) -> &str {
        "understand"
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisOutput, AnalyzerError> {
        let db: PathBuf = request.work_dir.join(format!("{}.und", request.version));
        let table = request.table_path();

        for args in self.steps(request, &db.display().to_string(), &table.display().to_string()) {
            run_tool(&self.program, &args, request.work_dir).await?;
        }

        Ok(AnalysisOutput {
            table,
            artifacts: vec![db],
        })
    }
}
