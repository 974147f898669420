//! Temporary client authentication for the restored instance
//!
//! Lets the local `postgres` user in over the unix socket without a password
//! so the superuser password can be set once recovery is over. Narrowing
//! these rules again is left to the bootstrap that runs after the restore.

use std::path::Path;

use crate::error::{RestoreError, Result};
use crate::fileutils::write_file;
use crate::names::{HBA_CONF, IDENT_CONF};

/// Peer authentication over the local socket, through the `local` user map
pub const RESTORE_HBA_RULES: &str = "local all all peer map=local\n";

/// Database role every mapped system user may connect as
const SUPERUSER: &str = "postgres";

/// Writes the HBA rules and the user map they reference
///
/// Both files are overwritten, so running this twice leaves the same content.
pub async fn write_restore_hba_conf(pgdata: &Path) -> Result<()> {
    write_file(&pgdata.join(HBA_CONF), RESTORE_HBA_RULES)
        .await
        .map_err(|e| RestoreError::io("cannot write pg_hba.conf", e))?;

    write_postgres_user_maps(pgdata).await
}

/// Writes `pg_ident.conf` with the `local` map
pub async fn write_postgres_user_maps(pgdata: &Path) -> Result<()> {
    let content = user_map(current_system_user().as_deref());
    write_file(&pgdata.join(IDENT_CONF), &content)
        .await
        .map_err(|e| RestoreError::io("cannot write pg_ident.conf", e))
}

fn user_map(system_user: Option<&str>) -> String {
    let mut content = format!("local {} {}\n", SUPERUSER, SUPERUSER);
    if let Some(user) = system_user.filter(|user| *user != SUPERUSER) {
        content.push_str(&format!("local {} {}\n", user, SUPERUSER));
    }
    content
}

#[cfg(unix)]
fn current_system_user() -> Option<String> {
    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Cannot look up the current system user: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn current_system_user() -> Option<String> {
    None
}
