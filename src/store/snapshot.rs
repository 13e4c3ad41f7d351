//! Single-file snapshot of a state forest
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("FABSTATE")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - tenant_count: 8 bytes (u64 LE)
//!   - body_len: 8 bytes (u64 LE)
//!   - forest digest: 32 bytes
//!
//! [BODY: body_len bytes]
//!   - zstd-compressed bincode of every tenant's real nodes
//! ```
//!
//! Trees are rebuilt from their entries on load, and the recomputed forest
//! digest must match the header.

use crate::model::{Attributes, Hash, PathKey, TenantId};
use crate::tree::{StateForest, StructuredStateTree};
use crate::{Error, Result, MAGIC, VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const HEADER_SIZE: usize = 64;
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: PathKey,
    /// Attributes as JSON text; bincode cannot carry self-describing values
    attributes: String,
}

#[derive(Serialize, Deserialize)]
struct TenantSnapshot {
    tenant: TenantId,
    entries: Vec<SnapshotEntry>,
}

/// Digest over every tenant's id and root hash
pub fn forest_digest(forest: &StateForest) -> Hash {
    let roots: Vec<(&TenantId, Hash)> = forest
        .iter()
        .map(|(tenant, tree)| (tenant, tree.root_hash()))
        .collect();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(roots.len() * 2);
    for (tenant, root) in &roots {
        parts.push(tenant.as_str().as_bytes());
        parts.push(root.as_bytes());
    }
    Hash::digest_many(&parts)
}

/// A forest snapshot stored at a fixed path
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SnapshotFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the forest, replacing any previous snapshot atomically.
    /// Returns the forest digest recorded in the header.
    pub fn save(&self, forest: &StateForest) -> Result<Hash> {
        let tenants = forest
            .iter()
            .map(|(tenant, tree)| {
                let entries = tree
                    .entries()
                    .into_iter()
                    .map(|(key, attributes)| {
                        Ok(SnapshotEntry {
                            key,
                            attributes: serde_json::to_string(&attributes)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TenantSnapshot {
                    tenant: tenant.clone(),
                    entries,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let body = zstd::encode_all(bincode::serialize(&tenants)?.as_slice(), COMPRESSION_LEVEL)?;
        let digest = forest_digest(forest);

        let mut data = Vec::with_capacity(HEADER_SIZE + body.len());
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&VERSION.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(tenants.len() as u64).to_le_bytes());
        data.extend_from_slice(&(body.len() as u64).to_le_bytes());
        data.extend_from_slice(digest.as_bytes());
        data.extend_from_slice(&body);

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(digest)
    }

    /// Read and verify the snapshot
    pub fn load(&self) -> Result<StateForest> {
        let data = fs::read(&self.path)?;
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidFile(format!(
                "{} is shorter than its header",
                self.path.display()
            )));
        }
        let (header, rest) = data.split_at(HEADER_SIZE);

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }
        let version = u32::from_le_bytes(le_bytes(&header[8..12]));
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }
        let tenant_count = u64::from_le_bytes(le_bytes(&header[16..24]));
        let body_len = u64::from_le_bytes(le_bytes(&header[24..32]));
        let stored_digest = Hash::from_bytes(le_bytes(&header[32..64]));

        if rest.len() as u64 != body_len {
            return Err(Error::Corruption(format!(
                "body is {} bytes, header says {}",
                rest.len(),
                body_len
            )));
        }

        let tenants: Vec<TenantSnapshot> = bincode::deserialize(&zstd::decode_all(rest)?)?;
        if tenants.len() as u64 != tenant_count {
            return Err(Error::Corruption(format!(
                "found {} tenants, header says {}",
                tenants.len(),
                tenant_count
            )));
        }

        let mut forest = StateForest::new();
        for snapshot in tenants {
            let entries = snapshot
                .entries
                .into_iter()
                .map(|e| Ok((e.key, serde_json::from_str::<Attributes>(&e.attributes)?)))
                .collect::<Result<Vec<_>>>()?;
            forest.insert(snapshot.tenant, StructuredStateTree::from_entries(entries)?);
        }

        let digest = forest_digest(&forest);
        if digest != stored_digest {
            return Err(Error::Corruption(format!(
                "forest digest {} does not match header {}",
                digest.short(),
                stored_digest.short()
            )));
        }
        Ok(forest)
    }

    /// Load the snapshot, or an empty forest if the file does not exist yet
    pub fn load_or_empty(&self) -> Result<StateForest> {
        if self.exists() {
            self.load()
        } else {
            Ok(StateForest::new())
        }
    }
}

/// Copy a header field into a fixed-size array
fn le_bytes<const N: usize>(field: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(field);
    out
}
