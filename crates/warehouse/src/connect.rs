use super::{Error, SqliteWarehouse};
use std::path::PathBuf;

/// Credential required by managed-warehouse targets.
pub const CREDENTIAL_VAR: &str = "STARDECK_WAREHOUSE_TOKEN";
/// Optional override of the managed database location.
pub const MANAGED_PATH_VAR: &str = "STARDECK_WAREHOUSE_PATH";

/// Which warehouse a run talks to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Target {
    /// File-local database under the data directory.
    #[default]
    Sandbox,
    /// Managed warehouse; requires the credential env var. The managed
    /// driver is an external collaborator, so both targets dispatch
    /// through the same `Warehouse` trait.
    Dev,
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox" => Ok(Target::Sandbox),
            "dev" => Ok(Target::Dev),
            other => Err(format!("unknown target {other:?} (expected sandbox or dev)")),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Target::Sandbox => "sandbox",
            Target::Dev => "dev",
        })
    }
}

#[derive(Clone, Debug)]
pub struct ConnectOpts {
    pub target: Target,
    /// Root of file-local state (sandbox database, generated artifacts).
    pub data_dir: PathBuf,
}

/// Resolve a target into an open warehouse connection.
pub fn connect(opts: &ConnectOpts) -> Result<SqliteWarehouse, Error> {
    let path = match opts.target {
        Target::Sandbox => opts.data_dir.join("warehouse.db"),
        Target::Dev => {
            // Validate the credential before any statement is issued.
            if std::env::var(CREDENTIAL_VAR).is_err() {
                return Err(Error::MissingCredential {
                    var: CREDENTIAL_VAR,
                });
            }
            match std::env::var(MANAGED_PATH_VAR) {
                Ok(path) => PathBuf::from(path),
                Err(_) => opts.data_dir.join("managed.db"),
            }
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| Error::DataDir {
            path: parent.display().to_string(),
            err,
        })?;
    }

    tracing::debug!(target = %opts.target, path = %path.display(), "opening warehouse");
    SqliteWarehouse::open(&path)
}
