// SPDX-License-Identifier: GPL-2.0

//! Seed persistence.
//!
//! A program state round-trips through a self-describing blob so seeds can
//! be reloaded and mutated across runs. Seed files follow the
//! `prog_<hexnanos>_<progTypeName>` convention; the program type is
//! recovered from the file name on restore.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::catalog::Catalog;
use crate::core::error::{GenError, Result};
use crate::state::BpfProgState;

impl BpfProgState {
    /// Serialize the state to `path`.
    pub fn write_state(&self, path: &Path) -> Result<()> {
        let blob = serde_json::to_vec_pretty(self)?;
        fs::write(path, blob)?;
        Ok(())
    }

    /// Deserialize a state from `path`.
    pub fn read_state(path: &Path) -> Result<BpfProgState> {
        let blob = fs::read(path)?;
        Ok(serde_json::from_slice(&blob)?)
    }
}

/// Seed base path for a program type: `<dir>/prog_<hexnanos>_<name>`.
/// The caller appends `.c`, `.o` or `.json`.
pub fn seed_base_path(dir: &Path, prog_type_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!("prog_{nanos:x}_{prog_type_name}"))
}

/// Extract the program type name from a seed path.
pub fn prog_type_from_path(path: &Path) -> Result<String> {
    let bad = || GenError::BadSeedPath(path.display().to_string());
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad)?;
    let rest = stem.strip_prefix("prog_").ok_or_else(bad)?;
    let (_nanos, name) = rest.split_once('_').ok_or_else(bad)?;
    if name.is_empty() {
        return Err(bad());
    }
    Ok(name.to_string())
}

/// Reload a seed program, validating its program type against the
/// catalogue. An unknown program type aborts with the missing key.
pub fn restore_seed_prog(cat: &Catalog, path: &Path) -> Result<BpfProgState> {
    let name = prog_type_from_path(path)?;
    cat.prog_type(&name)?;
    let s = BpfProgState::read_state(path)?;
    log::debug!(
        "restore prog {} pt {} calls {} maps {}",
        path.display(),
        name,
        s.calls.len(),
        s.maps.len()
    );
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prog_type_from_path() {
        let p = Path::new("/mnt/bpf_prog/prog_17ab32cd9_socket_filter.json");
        assert_eq!(prog_type_from_path(p).unwrap(), "socket_filter");
        // Program type names may themselves contain underscores.
        let p = Path::new("prog_dead_beef.json");
        assert_eq!(prog_type_from_path(p).unwrap(), "beef");
        assert!(prog_type_from_path(Path::new("notaprog.json")).is_err());
    }

    #[test]
    fn test_seed_base_path_shape() {
        let base = seed_base_path(Path::new("/tmp"), "xdp");
        let name = prog_type_from_path(&base).unwrap();
        assert_eq!(name, "xdp");
    }
}
