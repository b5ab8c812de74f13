//! Versioned binary artifacts for persisted model and scaler state
//!
//! Every artifact is a bincode [`Envelope`]: a format tag, a format version,
//! a Blake3 checksum of the payload and the bincode payload itself. Readers
//! reject tag, version or checksum mismatches with [`YieldError::ModelLoad`]
//! instead of decoding foreign bytes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{Result, YieldError};

/// Current artifact format version
pub const ARTIFACT_VERSION: u32 = 1;

/// Kinds of persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Scaler,
}

impl ArtifactKind {
    /// Format tag written into the envelope
    pub fn tag(self) -> &'static str {
        match self {
            ArtifactKind::Model => "agri-yield/model",
            ArtifactKind::Scaler => "agri-yield/scaler",
        }
    }
}

/// On-disk wrapper around a serialized payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub format: String,
    pub version: u32,
    pub checksum: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wrap a value, computing its checksum
    pub fn seal<T: Serialize>(kind: ArtifactKind, value: &T) -> Result<Self> {
        let payload = bincode::serialize(value)
            .map_err(|e| YieldError::InvalidInput(format!("failed to encode artifact: {e}")))?;
        Ok(Self {
            format: kind.tag().to_string(),
            version: ARTIFACT_VERSION,
            checksum: checksum_hex(&payload),
            payload,
        })
    }

    /// Verify tag, version and checksum, then decode the payload
    pub fn open<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T> {
        if self.format != kind.tag() {
            return Err(YieldError::ModelLoad(format!(
                "expected format '{}', found '{}'",
                kind.tag(),
                self.format
            )));
        }
        if self.version != ARTIFACT_VERSION {
            return Err(YieldError::ModelLoad(format!(
                "unsupported {} version {} (expected {})",
                self.format, self.version, ARTIFACT_VERSION
            )));
        }
        let actual = checksum_hex(&self.payload);
        if actual != self.checksum {
            return Err(YieldError::ModelLoad(format!(
                "checksum mismatch: expected {}, computed {}",
                self.checksum, actual
            )));
        }
        bincode::deserialize(&self.payload)
            .map_err(|e| YieldError::ModelLoad(format!("failed to decode payload: {e}")))
    }
}

/// Blake3 checksum of bytes as lowercase hex
pub fn checksum_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Seal `value` and write it to `path`; returns the payload checksum
pub fn write<T: Serialize, P: AsRef<Path>>(path: P, kind: ArtifactKind, value: &T) -> Result<String> {
    let path = path.as_ref();
    let envelope = Envelope::seal(kind, value)?;
    let bytes = bincode::serialize(&envelope)
        .map_err(|e| YieldError::InvalidInput(format!("failed to encode envelope: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| YieldError::DataAccess(format!("{}: {e}", parent.display())))?;
    }
    fs::write(path, bytes).map_err(|e| YieldError::DataAccess(format!("{}: {e}", path.display())))?;

    Ok(envelope.checksum)
}

/// Read and open an artifact of the given kind
pub fn read<T: DeserializeOwned, P: AsRef<Path>>(path: P, kind: ArtifactKind) -> Result<T> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| YieldError::ModelLoad(format!("{}: {e}", path.display())))?;
    let envelope: Envelope = bincode::deserialize(&bytes)
        .map_err(|e| YieldError::ModelLoad(format!("{}: not an artifact envelope: {e}", path.display())))?;
    envelope.open(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        values: Vec<f64>,
        label: String,
    }

    fn payload() -> Payload {
        Payload {
            values: vec![0.1, 2.5, -3.75],
            label: "state".into(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.bin");

        let checksum = write(&path, ArtifactKind::Model, &payload()).unwrap();
        assert_eq!(checksum.len(), 64);

        let restored: Payload = read(&path, ArtifactKind::Model).unwrap();
        assert_eq!(restored, payload());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write(&path, ArtifactKind::Scaler, &payload()).unwrap();

        let err = read::<Payload, _>(&path, ArtifactKind::Model).unwrap_err();
        assert!(matches!(err, YieldError::ModelLoad(msg) if msg.contains("agri-yield/model")));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = Envelope::seal(ArtifactKind::Model, &payload()).unwrap();
        envelope.version = ARTIFACT_VERSION + 1;
        assert!(matches!(
            envelope.open::<Payload>(ArtifactKind::Model),
            Err(YieldError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let mut envelope = Envelope::seal(ArtifactKind::Model, &payload()).unwrap();
        let last = envelope.payload.len() - 1;
        envelope.payload[last] ^= 0xff;
        let err = envelope.open::<Payload>(ArtifactKind::Model).unwrap_err();
        assert!(matches!(err, YieldError::ModelLoad(msg) if msg.contains("checksum")));
    }

    #[test]
    fn test_garbage_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        fs::write(&path, b"definitely not bincode").unwrap();
        assert!(matches!(
            read::<Payload, _>(&path, ArtifactKind::Model),
            Err(YieldError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(matches!(
            read::<Payload, _>("/no/such/artifact.bin", ArtifactKind::Model),
            Err(YieldError::ModelLoad(_))
        ));
    }
}
