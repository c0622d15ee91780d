use super::Error;
use models::{Layer, ModelSpec, TenantSlug};
use std::path::{Path, PathBuf};

/// Persist generated models as SQL files. The path identifies tenant,
/// layer, and relation uniquely:
///
/// ```text
/// {root}/{tenant}/{layer}/{relation}.sql     tenant-scoped models
/// {root}/platform/master/{relation}.sql      shared master sinks
/// ```
///
/// Writes are full overwrites; identical inputs yield byte-identical
/// files. All path segments are ASCII by construction (slug validation).
pub fn write_artifacts(
    root: &Path,
    tenant: &TenantSlug,
    models: &[ModelSpec],
) -> Result<Vec<PathBuf>, Error> {
    let mut written = Vec::with_capacity(models.len());

    for model in models {
        let dir = match model.layer {
            Layer::MasterSink => root.join("platform").join(model.layer.as_str()),
            _ => root.join(tenant.as_str()).join(model.layer.as_str()),
        };
        let path = dir.join(format!("{}.sql", model.name));

        let io_err = |err| Error::Artifact {
            path: path.display().to_string(),
            err,
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;
        std::fs::write(&path, model.artifact_sql()).map_err(io_err)?;
        written.push(path);
    }

    tracing::debug!(tenant = %tenant, files = written.len(), "wrote generated SQL artifacts");
    Ok(written)
}
