/*!
A compact binary KPI container: a single append-only file per run, one record per `write` call.
Reuses the `agent.bin` record shape — `(label_len u16, label_utf8, step u64, count u32,
values_f32_LE[])` — rather than inventing a second framing.
*/

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::kpi::{KpiRecord, KpiSink};

pub struct BinarySink {
    file: fs::File,
}

impl BinarySink {
    pub fn new(path: impl Into<PathBuf>) -> WheellyResult<Self> {
        let path = path.into();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("opening {}: {e}", path.display())))?;
        Ok(Self { file })
    }
}

impl KpiSink for BinarySink {
    fn write(&mut self, record: &KpiRecord) -> WheellyResult<()> {
        let mut buf = Vec::new();
        let label_bytes = record.label.as_bytes();
        buf.extend_from_slice(&(label_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(label_bytes);
        buf.extend_from_slice(&record.step.to_le_bytes());
        buf.extend_from_slice(&(record.values.len() as u32).to_le_bytes());
        for v in &record.values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        self.file
            .write_all(&buf)
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("writing kpi binary record: {e}")))
    }

    fn flush(&mut self) -> WheellyResult<()> {
        self.file
            .flush()
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("flushing kpi binary sink: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_records_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpi.bin");
        {
            let mut sink = BinarySink::new(&path).unwrap();
            sink.write(&KpiRecord { label: "delta".into(), step: 0, values: vec![0.1] }).unwrap();
        }
        {
            let mut sink = BinarySink::new(&path).unwrap();
            sink.write(&KpiRecord { label: "delta".into(), step: 1, values: vec![0.2] }).unwrap();
        }
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.len() > 0);
    }
}
