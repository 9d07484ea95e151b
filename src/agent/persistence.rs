/*!
`agent.bin`: the binary property map of header `b"WAGT"` + a `u32` little-endian format version,
then a sequence of named tensors: `(name_len u16, name_utf8, ndims u8, dim[] u32, data_f32_LE[])`.
Every trainable layer's weights round-trip through [`crate::network::Network`]'s
`export_params`/`import_params`; the scalar `"avgReward"` rides alongside them in the same record
stream so the file is self-describing.
*/

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::tensor::Tensor2;

const MAGIC: &[u8; 4] = b"WAGT";
const FORMAT_VERSION: u32 = 1;

fn corrupt(what: impl Into<String>) -> WheellyError {
    WheellyError::new(WheellyErrorKind::ModelLoadCorrupt, what)
}

fn write_tensor(out: &mut Vec<u8>, name: &str, tensor: &Tensor2) {
    let name_bytes = name.as_bytes();
    out.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(name_bytes);
    out.push(2); // ndims: every stored value here is rank-2, even the avgReward scalar (1x1).
    out.extend_from_slice(&(tensor.rows() as u32).to_le_bytes());
    out.extend_from_slice(&(tensor.cols() as u32).to_le_bytes());
    for v in tensor.as_slice() {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Serialize the trained layer parameters plus `avg_reward` into the `agent.bin` byte layout.
pub fn encode(params: &[(String, Tensor2)], avg_reward: f32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    write_tensor(&mut out, "avgReward", &Tensor2::row_vector(&[avg_reward]));
    for (name, tensor) in params {
        write_tensor(&mut out, name, tensor);
    }
    out
}

/// Parse `agent.bin` bytes into a name→tensor map. `"avgReward"` is present like any other
/// record; callers pull it out by name.
pub fn decode(bytes: &[u8]) -> WheellyResult<HashMap<String, Tensor2>> {
    if bytes.len() < 8 || &bytes[0..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported agent.bin version {version}")));
    }

    let mut cursor = 8usize;
    let mut out = HashMap::new();
    while cursor < bytes.len() {
        let name_len = read_u16(bytes, &mut cursor)?;
        let name = read_str(bytes, &mut cursor, name_len as usize)?;
        let ndims = read_u8(bytes, &mut cursor)?;
        if ndims != 2 {
            return Err(corrupt(format!("record '{name}' has unsupported ndims {ndims}")));
        }
        let rows = read_u32(bytes, &mut cursor)? as usize;
        let cols = read_u32(bytes, &mut cursor)? as usize;
        let count = rows.checked_mul(cols).ok_or_else(|| corrupt(format!("record '{name}' has an overflowing shape")))?;
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            data.push(read_f32(bytes, &mut cursor)?);
        }
        out.insert(name, Tensor2::from_rows(data.chunks(cols.max(1)).map(|c| c.to_vec()).collect())?);
    }
    Ok(out)
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> WheellyResult<u8> {
    let v = *bytes.get(*cursor).ok_or_else(|| corrupt("truncated record"))?;
    *cursor += 1;
    Ok(v)
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> WheellyResult<u16> {
    let slice = bytes.get(*cursor..*cursor + 2).ok_or_else(|| corrupt("truncated record"))?;
    *cursor += 2;
    Ok(u16::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> WheellyResult<u32> {
    let slice = bytes.get(*cursor..*cursor + 4).ok_or_else(|| corrupt("truncated record"))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_f32(bytes: &[u8], cursor: &mut usize) -> WheellyResult<f32> {
    let slice = bytes.get(*cursor..*cursor + 4).ok_or_else(|| corrupt("truncated record"))?;
    *cursor += 4;
    Ok(f32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_str(bytes: &[u8], cursor: &mut usize, len: usize) -> WheellyResult<String> {
    let slice = bytes.get(*cursor..*cursor + len).ok_or_else(|| corrupt("truncated record"))?;
    *cursor += len;
    String::from_utf8(slice.to_vec()).map_err(|_| corrupt("name is not valid utf-8"))
}

/// The `modelPath/agent.bin` file plus the once-per-run backup policy.
pub struct ModelStore {
    bin_path: PathBuf,
    backed_up_this_run: bool,
}

impl ModelStore {
    pub fn new(model_path: &Path) -> Self {
        Self { bin_path: model_path.join("agent.bin"), backed_up_this_run: false }
    }

    pub fn load(&self) -> WheellyResult<Option<HashMap<String, Tensor2>>> {
        if !self.bin_path.exists() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        fs::File::open(&self.bin_path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("reading {}: {e}", self.bin_path.display())))?;
        Ok(Some(decode(&bytes)?))
    }

    /// Back up the existing `agent.bin` once per run, then overwrite it with the freshly encoded
    /// parameters.
    pub fn save(&mut self, params: &[(String, Tensor2)], avg_reward: f32, timestamp: &str) -> WheellyResult<()> {
        if !self.backed_up_this_run && self.bin_path.exists() {
            let backup = self.bin_path.with_file_name(format!("agent-{timestamp}.bin"));
            fs::copy(&self.bin_path, &backup)
                .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("backing up to {}: {e}", backup.display())))?;
            self.backed_up_this_run = true;
        }
        let bytes = encode(params, avg_reward);
        let mut file = fs::File::create(&self.bin_path)
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("writing {}: {e}", self.bin_path.display())))?;
        file.write_all(&bytes)
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("writing {}: {e}", self.bin_path.display())))
    }
}

/// `agent-YYYYMMDD-HHMMSS` backup suffix for the current wall-clock moment.
pub fn backup_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_named_tensors_bitwise() {
        let params = vec![
            ("hidden.W".to_string(), Tensor2::from_rows(vec![vec![1., 2.], vec![3., 4.]]).unwrap()),
            ("hidden.b".to_string(), Tensor2::row_vector(&[0.5, -0.5])),
        ];
        let bytes = encode(&params, 0.271);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded["hidden.W"], params[0].1);
        assert_eq!(decoded["hidden.b"], params[1].1);
        assert_eq!(decoded["avgReward"].as_slice()[0], 0.271);
    }

    #[test]
    fn bad_magic_is_model_load_corrupt() {
        let err = decode(&[0, 0, 0, 0, 1, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ModelLoadCorrupt);
    }

    #[test]
    fn truncated_record_is_model_load_corrupt() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes()); // claims a 3-byte name, then EOF.
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ModelLoadCorrupt);
    }

    #[test]
    fn backup_is_created_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ModelStore::new(dir.path());
        let params = vec![("out.W".to_string(), Tensor2::row_vector(&[1.]))];
        store.save(&params, 0., "20260101-000000").unwrap();
        store.save(&params, 0.1, "20260101-000000").unwrap();
        store.save(&params, 0.2, "20260101-000001").unwrap();
        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("agent-"))
            .collect();
        assert_eq!(backups.len(), 1, "expected exactly one backup across three saves in the same run");
    }
}
