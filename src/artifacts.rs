//! Model artifact decoding.
//!
//! The network weights and both scaler parameter sets ship in one container
//! format: a `LDCAST01` magic header, a tensor count, then each tensor as a
//! length-prefixed name, a rank, little-endian `u32` dimensions and packed
//! little-endian `f32` data. Every blob is fingerprinted with SHA-256 on
//! decode so the exact artifacts serving traffic can be traced from logs
//! and metrics.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::forecast::{AttentionLstm, SequenceScaler};
use crate::models::NUM_FEATURES;

/// Magic bytes identifying a tensor archive.
pub const ARCHIVE_MAGIC: &[u8; 8] = b"LDCAST01";

/// Upper bound on tensors in one archive.
const MAX_TENSORS: usize = 256;

/// Upper bound on elements in one tensor (64 MiB of f32 data).
const MAX_TENSOR_ELEMENTS: usize = 1 << 24;

const MAX_TENSOR_RANK: usize = 4;

/// Columns of the target scaler blob, in order: count, lag_24, lag_168.
const TARGET_SCALER_COLUMNS: usize = 3;

/// Columns of the time scaler blob, in order: hour, dayofweek.
const TIME_SCALER_COLUMNS: usize = 2;

#[derive(Debug)]
struct RawTensor {
    dims: Vec<usize>,
    data: Vec<f32>,
}

/// A decoded tensor archive. Tensors are taken out by name as the model
/// is assembled; whatever remains afterwards is treated as a sign of a
/// mismatched or corrupt artifact.
#[derive(Debug)]
pub struct TensorArchive {
    tensors: HashMap<String, RawTensor>,
    fingerprint: String,
}

impl TensorArchive {
    /// Decode an archive from raw bytes, verifying the header and that the
    /// payload is fully consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fingerprint = hex::encode(Sha256::digest(bytes));
        let mut reader = Reader::new(bytes);

        let magic = reader.take(ARCHIVE_MAGIC.len()).context("Missing header")?;
        if magic != ARCHIVE_MAGIC {
            bail!("Bad magic bytes, not a tensor archive");
        }

        let count = reader.u32().context("Missing tensor count")? as usize;
        if count > MAX_TENSORS {
            bail!("Archive claims {} tensors, limit is {}", count, MAX_TENSORS);
        }

        let mut tensors = HashMap::with_capacity(count);
        for index in 0..count {
            let (name, tensor) = reader
                .tensor()
                .with_context(|| format!("Failed to decode tensor {} of {}", index, count))?;
            if tensors.insert(name.clone(), tensor).is_some() {
                bail!("Duplicate tensor '{}'", name);
            }
        }

        if !reader.is_empty() {
            bail!("{} trailing bytes after last tensor", reader.remaining());
        }

        Ok(Self {
            tensors,
            fingerprint,
        })
    }

    /// SHA-256 of the encoded archive, lowercase hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Remove a rank-1 tensor by name.
    pub fn take_vector(&mut self, name: &str) -> Result<Array1<f32>> {
        let tensor = self.remove(name)?;
        if tensor.dims.len() != 1 {
            bail!(
                "Tensor '{}' has rank {}, expected a vector",
                name,
                tensor.dims.len()
            );
        }
        Ok(Array1::from_vec(tensor.data))
    }

    /// Remove a rank-2 tensor by name.
    pub fn take_matrix(&mut self, name: &str) -> Result<Array2<f32>> {
        let tensor = self.remove(name)?;
        if tensor.dims.len() != 2 {
            bail!(
                "Tensor '{}' has rank {}, expected a matrix",
                name,
                tensor.dims.len()
            );
        }
        Array2::from_shape_vec((tensor.dims[0], tensor.dims[1]), tensor.data)
            .with_context(|| format!("Tensor '{}' shape mismatch", name))
    }

    /// Fail if any tensors were never consumed.
    pub fn expect_drained(&self) -> Result<()> {
        if !self.tensors.is_empty() {
            let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
            names.sort_unstable();
            bail!("Unexpected tensors in archive: {}", names.join(", "));
        }
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<RawTensor> {
        self.tensors
            .remove(name)
            .with_context(|| format!("Tensor '{}' not found in archive", name))
    }
}

/// Encode named tensors into the archive format. Dimension products must
/// match the data lengths; used by artifact tooling and tests.
pub fn encode_archive(tensors: &[(&str, &[usize], &[f32])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(ARCHIVE_MAGIC);
    out.extend_from_slice(&(tensors.len() as u32).to_le_bytes());
    for (name, dims, data) in tensors {
        let elements: usize = dims.iter().product();
        assert_eq!(
            elements,
            data.len(),
            "tensor '{}' dims do not match data length",
            name
        );
        assert!(name.len() <= u16::MAX as usize, "tensor name too long");
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(dims.len() as u8);
        for dim in *dims {
            out.extend_from_slice(&(*dim as u32).to_le_bytes());
        }
        for value in *data {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).context("Length overflow")?;
        let slice = self
            .buf
            .get(self.pos..end)
            .with_context(|| format!("Truncated archive at byte {}", self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn tensor(&mut self) -> Result<(String, RawTensor)> {
        let name_len = self.u16()? as usize;
        let name = std::str::from_utf8(self.take(name_len)?)
            .context("Tensor name is not UTF-8")?
            .to_string();

        let rank = self.u8()? as usize;
        if rank == 0 || rank > MAX_TENSOR_RANK {
            bail!("Tensor '{}' has unsupported rank {}", name, rank);
        }

        let mut dims = Vec::with_capacity(rank);
        let mut elements = 1usize;
        for _ in 0..rank {
            let dim = self.u32()? as usize;
            elements = elements
                .checked_mul(dim)
                .with_context(|| format!("Tensor '{}' dimension overflow", name))?;
            dims.push(dim);
        }
        if elements > MAX_TENSOR_ELEMENTS {
            bail!(
                "Tensor '{}' has {} elements, limit is {}",
                name,
                elements,
                MAX_TENSOR_ELEMENTS
            );
        }

        let raw = self.take(elements * 4)?;
        let data = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok((name, RawTensor { dims, data }))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// SHA-256 fingerprints of the three startup artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactFingerprints {
    pub network: String,
    pub target_scaler: String,
    pub time_scaler: String,
}

/// Fully decoded model artifacts, ready to serve forecasts.
pub struct ModelArtifacts {
    pub network: AttentionLstm,
    pub scaler: SequenceScaler,
    pub fingerprints: ArtifactFingerprints,
}

impl ModelArtifacts {
    /// Decode the network archive and both scaler archives and assemble
    /// them into a servable model.
    pub fn load(
        network_blob: &[u8],
        target_scaler_blob: &[u8],
        time_scaler_blob: &[u8],
    ) -> Result<Self> {
        let mut archive =
            TensorArchive::decode(network_blob).context("Failed to decode network artifact")?;
        let network =
            AttentionLstm::from_archive(&mut archive).context("Failed to assemble network")?;
        archive
            .expect_drained()
            .context("Network artifact has extra tensors")?;

        let (target_scale, target_offset, target_fp) =
            decode_scaler(target_scaler_blob, TARGET_SCALER_COLUMNS)
                .context("Failed to decode target scaler artifact")?;
        let (time_scale, time_offset, time_fp) =
            decode_scaler(time_scaler_blob, TIME_SCALER_COLUMNS)
                .context("Failed to decode time scaler artifact")?;

        // Feature order: count, lag_24, lag_168 from the target scaler,
        // then hour, dayofweek from the time scaler. The scalar target
        // shares the count column.
        let feature_scale: [f64; NUM_FEATURES] = [
            target_scale[0],
            target_scale[1],
            target_scale[2],
            time_scale[0],
            time_scale[1],
        ];
        let feature_offset: [f64; NUM_FEATURES] = [
            target_offset[0],
            target_offset[1],
            target_offset[2],
            time_offset[0],
            time_offset[1],
        ];
        let scaler = SequenceScaler::new(
            feature_scale,
            feature_offset,
            target_scale[0],
            target_offset[0],
        )
        .context("Failed to assemble scaler")?;

        let fingerprints = ArtifactFingerprints {
            network: archive.fingerprint().to_string(),
            target_scaler: target_fp,
            time_scaler: time_fp,
        };

        info!(
            network = %fingerprints.network,
            target_scaler = %fingerprints.target_scaler,
            time_scaler = %fingerprints.time_scaler,
            hidden_size = network.hidden_size(),
            "Model artifacts loaded"
        );

        Ok(Self {
            network,
            scaler,
            fingerprints,
        })
    }
}

/// Decode a scaler archive: two rank-1 tensors named `scale` and `offset`
/// with one entry per column.
fn decode_scaler(blob: &[u8], columns: usize) -> Result<(Vec<f64>, Vec<f64>, String)> {
    let mut archive = TensorArchive::decode(blob)?;
    let scale = archive.take_vector("scale")?;
    let offset = archive.take_vector("offset")?;
    archive.expect_drained()?;

    if scale.len() != columns || offset.len() != columns {
        bail!(
            "Scaler has {} scale and {} offset columns, expected {}",
            scale.len(),
            offset.len(),
            columns
        );
    }

    let fingerprint = archive.fingerprint().to_string();
    Ok((
        scale.iter().map(|&v| v as f64).collect(),
        offset.iter().map(|&v| v as f64).collect(),
        fingerprint,
    ))
}
