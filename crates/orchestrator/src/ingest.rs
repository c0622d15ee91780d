use models::{SourcePlatform, TenantSlug};
use tokio::io::AsyncBufReadExt;

/// The external ingestion adapter: an opaque producer which lands raw
/// rows in per-tenant source tables. The orchestrator only invokes it and
/// supervises its output.
#[async_trait::async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(
        &self,
        tenant: &TenantSlug,
        source: &SourcePlatform,
        days: u32,
    ) -> anyhow::Result<()>;
}

/// Runs the configured ingestion program once per source, capturing its
/// stdout and stderr line-by-line into the run log.
pub struct CommandIngestor {
    pub program: std::path::PathBuf,
    pub extra_args: Vec<String>,
}

#[async_trait::async_trait]
impl Ingestor for CommandIngestor {
    #[tracing::instrument(skip(self), fields(program = %self.program.display()))]
    async fn ingest(
        &self,
        tenant: &TenantSlug,
        source: &SourcePlatform,
        days: u32,
    ) -> anyhow::Result<()> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.extra_args)
            .arg(tenant.as_str())
            .arg(source.as_str())
            .arg("--days")
            .arg(days.to_string())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::debug!(args = ?cmd.as_std().get_args().collect::<Vec<_>>(), "invoking ingestor");
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let name = format!("ingest:{tenant}:{source}");

        let out = capture_lines(format!("{name}:1"), stdout);
        let err = capture_lines(format!("{name}:2"), stderr);
        let wait = child.wait();

        let (_, last_err, status) = tokio::try_join!(out, err, wait)?;

        if !status.success() {
            anyhow::bail!(
                "ingestor exited with {status}: {}",
                last_err.unwrap_or_else(|| "(no stderr)".to_string())
            );
        }
        Ok(())
    }
}

/// Stream newline-delimited output into the run log, returning the final
/// line for error reporting.
async fn capture_lines<R>(
    stream: String,
    reader: Option<R>,
) -> Result<Option<String>, std::io::Error>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(None);
    };

    let mut last = None;
    let mut splits = tokio::io::BufReader::new(reader).split(b'\n');
    while let Some(line) = splits.next_segment().await? {
        let line = String::from_utf8_lossy(&line).into_owned();
        tracing::info!(stream = %stream, line = %line, "ingest");
        last = Some(line);
    }
    Ok(last)
}

/// Used when ingestion runs out-of-band and rows are already landed
/// (common against the managed target, where the adapter fleet is
/// scheduled elsewhere).
pub struct NoopIngestor;

#[async_trait::async_trait]
impl Ingestor for NoopIngestor {
    async fn ingest(
        &self,
        tenant: &TenantSlug,
        source: &SourcePlatform,
        _days: u32,
    ) -> anyhow::Result<()> {
        tracing::debug!(%tenant, %source, "no ingestor configured; expecting landed tables");
        Ok(())
    }
}
