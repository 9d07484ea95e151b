/*!
KPI sinks: a stream of named arrays emitted once per training step — `delta`, `avgReward`, layer
inputs/outputs, action masks, gradients, step counters. Sinks are pluggable; [`Router`] applies
the `-l` label filter once and fans each record out to every configured sink.
*/

pub mod binary_sink;
pub mod csv_sink;

use regex::Regex;

use crate::errors::WheellyResult;

/// One KPI record: a label (e.g. `"hidden.W"`, `"delta"`) and its flattened values for this step.
#[derive(Debug, Clone)]
pub struct KpiRecord {
    pub label: String,
    pub step: u64,
    pub values: Vec<f32>,
}

pub trait KpiSink {
    fn write(&mut self, record: &KpiRecord) -> WheellyResult<()>;
    fn flush(&mut self) -> WheellyResult<()>;
}

/// Parsed form of the CLI `-l` flag: `all`, or a comma-separated list of labels/regexes.
pub enum LabelFilter {
    All,
    Patterns(Vec<Regex>),
}

impl LabelFilter {
    pub fn parse(spec: &str) -> WheellyResult<Self> {
        if spec.trim() == "all" {
            return Ok(Self::All);
        }
        let mut patterns = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let anchored = format!("^{part}$");
            patterns.push(Regex::new(&anchored).map_err(|e| {
                crate::errors::WheellyError::new(
                    crate::errors::WheellyErrorKind::ConfigInvalid,
                    format!("bad -l label pattern '{part}': {e}"),
                )
            })?);
        }
        Ok(Self::Patterns(patterns))
    }

    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::All => true,
            Self::Patterns(patterns) => patterns.iter().any(|p| p.is_match(label)),
        }
    }
}

/// Fans a KPI record out to every configured sink, after the label filter drops it entirely.
pub struct Router {
    filter: LabelFilter,
    sinks: Vec<Box<dyn KpiSink>>,
}

impl Router {
    pub fn new(filter: LabelFilter, sinks: Vec<Box<dyn KpiSink>>) -> Self {
        Self { filter, sinks }
    }

    pub fn emit(&mut self, record: &KpiRecord) -> WheellyResult<()> {
        if !self.filter.matches(&record.label) {
            return Ok(());
        }
        for sink in &mut self.sinks {
            sink.write(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> WheellyResult<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_every_label() {
        let filter = LabelFilter::parse("all").unwrap();
        assert!(filter.matches("hidden.W"));
        assert!(filter.matches("delta"));
    }

    #[test]
    fn comma_list_restricts_to_named_labels() {
        let filter = LabelFilter::parse("delta,avgReward").unwrap();
        assert!(filter.matches("delta"));
        assert!(!filter.matches("hidden.W"));
    }

    #[test]
    fn pattern_is_anchored_to_the_whole_label() {
        let filter = LabelFilter::parse("hidden.*").unwrap();
        assert!(filter.matches("hidden.W"));
        assert!(!filter.matches("not_hidden.W"));
    }
}
