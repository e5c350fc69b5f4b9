use sha3::{Digest, Keccak256};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex keccak256 over `from` and `amount`, used as the signature hash of a transfer.
pub fn signature_hash(from: &str, amount: &str) -> String {
    let mut data = Vec::with_capacity(from.len() + amount.len() + 1);
    data.extend_from_slice(from.as_bytes());
    data.push(b'|');
    data.extend_from_slice(amount.as_bytes());
    format!("0x{}", hex::encode(keccak256(&data)))
}

/// Replaces `path` with `contents` so that readers see either the old or the new file.
///
/// Writes a sibling `.tmp` file, fsyncs it, renames it over `path` and fsyncs the directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = dir.join(tmp_name);

    fs::write(&tmp_path, contents)?;
    OpenOptions::new().write(true).open(&tmp_path)?.sync_all()?;
    fs::rename(&tmp_path, path)?;

    #[cfg(unix)]
    fs::File::open(dir)?.sync_all()?;

    Ok(())
}

/// [`write_atomic`] on the blocking pool, so the fsyncs do not stall a runtime worker.
pub async fn write_atomic_blocking(path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Hex keccak256 of a private key. Lets the sandbox record which key administers a
/// topic without keeping the key itself.
pub fn key_fingerprint(private_key: &str) -> String {
    format!("0x{}", hex::encode(keccak256(private_key.trim().as_bytes())))
}
