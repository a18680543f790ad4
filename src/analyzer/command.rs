//! Generic analyzer driven by an argument template.
//!
//! Each template argument may contain placeholders:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{tree}`    | checked-out tree root |
//! | `{output}`  | path the table should be written to |
//! | `{workdir}` | per-version scratch directory |
//! | `{version}` | version being analyzed |
//! | `{commit}`  | full commit hash |
//! | `{metrics}` | comma-separated metric names |
//!
//! When no argument mentions `{output}`, the program's stdout is taken as
//! the table.

use async_trait::async_trait;

use super::{AnalysisOutput, AnalysisRequest, AnalyzerError, MetricsAnalyzer, run_tool};

#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn writes_output_file(&self) -> bool {
        self.args.iter().any(|a| a.contains("{output}"))
    }

    fn render_args(&self, request: &AnalysisRequest<'_>) -> Vec<String> {
        let output = request.table_path().display().to_string();
        let tree = request.tree.display().to_string();
        let work_dir = request.work_dir.display().to_string();
        let version = request.version.to_string();
        let metrics = request.metrics.names().join(",");

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{tree}", &tree)
                    .replace("{output}", &output)
                    .replace("{workdir}", &work_dir)
                    .replace("{version}", &version)
                    .replace("{commit}", request.commit)
                    .replace("{metrics}", &metrics)
            })
            .collect()
    }
}

#[async_trait]
impl MetricsAnalyzer for CommandAnalyzer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisOutput, AnalyzerError> {
        let args = self.render_args(request);
        let output = run_tool(&self.program, &args, request.tree).await?;

        let table = request.table_path();
        if !self.writes_output_file() {
            tokio::fs::write(&table, &output.stdout)
                .await
                .map_err(|source| AnalyzerError::Io {
                    path: table.clone(),
                    source,
                })?;
        }

        Ok(AnalysisOutput {
            table,
            artifacts: Vec::new(),
        })
    }
}
