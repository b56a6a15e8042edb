use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    span_totals: BTreeMap<String, f64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                span_totals: BTreeMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_counts(&self, name: &str, counts: &[(&str, u64)]) {
        let counts: BTreeMap<&str, u64> = counts.iter().copied().collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "counts": counts,
        });
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let total: f64 = state.span_totals.values().sum();
            let line = json!({
                "type": "perf.total",
                "unit": "ms",
                "ms": (total * 1000.0).round() / 1000.0,
            });
            let _ = writeln!(state.writer, "{line}");
            state.span_totals.clear();
            let _ = state.writer.flush();
        }
    }
}

/// Runs `f` and records its wall time under `name` when a logger is present.
pub(crate) fn timed<T>(perf: Option<&PerfLogger>, name: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    if let Some(perf) = perf {
        perf.log_span_ms(name, start.elapsed().as_secs_f64() * 1000.0);
    }
    out
}
