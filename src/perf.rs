use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Opt-in JSONL timing log. One line per span or count record; a summary of
/// the slowest spans is written next to the log when the last handle drops.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
}

impl PerfLogger {
    pub(crate) fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
            })),
        })
    }

    pub(crate) fn log_span_ms(&self, name: &str, invoice: &str, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "invoice": invoice,
            "unit": "ms",
            "ms": round_ms(ms),
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub(crate) fn log_counts(&self, name: &str, invoice: &str, counts: &[(&str, u64)]) {
        let counts: Map<String, Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(*value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "invoice": invoice,
            "counts": counts,
        });
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub(crate) fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);
        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| {
            b.1.partial_cmp(a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        for (rank, (name, ms)) in spans.into_iter().enumerate() {
            let count = self.span_counts.get(name).copied().unwrap_or(1).max(1);
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "ms": round_ms(*ms),
                "count": count,
                "avg_ms": round_ms(ms / count as f64),
            });
            let _ = writeln!(writer, "{line}");
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|name| name.to_str())
        .unwrap_or("ledgerpress_perf");
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledgerpress_{}_{}.log", name, std::process::id()))
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let path = temp_log("perf_lines");
        {
            let perf = PerfLogger::new(&path).expect("create");
            perf.log_span_ms("page.invoice", "INV-1", 1.23456);
            perf.log_counts("page.invoice", "INV-1", &[("commands", 42), ("images", 0)]);
            perf.flush();
        }
        let raw = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "perf.span");
        assert_eq!(lines[0]["ms"], 1.235);
        assert_eq!(lines[1]["counts"]["commands"], 42);

        let hot = std::fs::read_to_string(hot_path_for(&path)).expect("hot log");
        assert!(hot.contains("\"perf.hot.span\""));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(hot_path_for(&path));
    }

    #[test]
    fn hot_log_sits_next_to_the_main_log() {
        let path = Path::new("/tmp/run/perf.jsonl");
        assert_eq!(hot_path_for(path), PathBuf::from("/tmp/run/perf_hot.log"));
    }
}
