//! Host key persistence: the SSH transport's server identity, trimmed to a
//! single Ed25519 key. SuperChat's config names exactly one file
//! (`Config::ssh_host_key_path`), so one modern key is enough — no need for
//! a whole directory of algorithms to interoperate with clients'
//! `known_hosts` across years of deprecations.

use std::path::Path;

use anyhow::{Context, Result};
use russh::keys::ssh_key::rand_core::OsRng;
use russh::keys::{Algorithm, PrivateKey};
use superchat_common::helpers::fs::secure_file;
use tracing::info;

pub fn load_or_generate_host_key(path: &Path) -> Result<PrivateKey> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("creating SSH host key directory")?;
        }
    }

    if path.exists() {
        return PrivateKey::read_openssh_file(path)
            .with_context(|| format!("reading SSH host key at {}", path.display()));
    }

    info!(path = %path.display(), "generating SSH host key");
    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).context("generating host key")?;
    key.write_openssh_file(path, russh::keys::ssh_key::LineEnding::LF)
        .with_context(|| format!("writing SSH host key to {}", path.display()))?;
    secure_file(path).context("securing SSH host key permissions")?;
    Ok(key)
}
