/*!
One CSV file per label, each row one step.
*/

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::kpi::{KpiRecord, KpiSink};

pub struct CsvSink {
    dir: PathBuf,
    writers: HashMap<String, csv::Writer<std::fs::File>>,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), writers: HashMap::new() }
    }

    fn writer_for(&mut self, label: &str) -> WheellyResult<&mut csv::Writer<std::fs::File>> {
        if !self.writers.contains_key(label) {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("creating {}: {e}", self.dir.display()))
            })?;
            let path = self.dir.join(format!("{label}.csv"));
            let writer = csv::Writer::from_path(&path).map_err(|e| {
                WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("opening {}: {e}", path.display()))
            })?;
            self.writers.insert(label.to_string(), writer);
        }
        Ok(self.writers.get_mut(label).unwrap())
    }
}

impl KpiSink for CsvSink {
    fn write(&mut self, record: &KpiRecord) -> WheellyResult<()> {
        let label = record.label.clone();
        let mut row: Vec<String> = vec![record.step.to_string()];
        row.extend(record.values.iter().map(|v| v.to_string()));
        self.writer_for(&label)?
            .write_record(&row)
            .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("writing kpi '{label}': {e}")))
    }

    fn flush(&mut self) -> WheellyResult<()> {
        for writer in self.writers.values_mut() {
            writer
                .flush()
                .map_err(|e| WheellyError::new(WheellyErrorKind::AgentSaveFailure, format!("flushing kpi csv: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_file_per_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path());
        sink.write(&KpiRecord { label: "delta".into(), step: 0, values: vec![0.1] }).unwrap();
        sink.write(&KpiRecord { label: "delta".into(), step: 1, values: vec![0.2] }).unwrap();
        sink.flush().unwrap();
        let contents = std::fs::read_to_string(dir.path().join("delta.csv")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
