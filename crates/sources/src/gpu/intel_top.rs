//! Intel GPU usage from a long-running `intel_gpu_top -J` child
//!
//! The tool streams one JSON object per sampling period. A reader thread
//! keeps the mean engine busy percentage of the latest object.

use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

/// Sampling period passed to `intel_gpu_top -s` (milliseconds)
const SAMPLE_PERIOD_MS: &str = "1000";

/// Running `intel_gpu_top` process and its latest reading
pub struct IntelGpuTop {
    child: Child,
    busy: Arc<Mutex<Option<f64>>>,
}

impl IntelGpuTop {
    /// Start `program -J -s 1000`; `None` when it cannot be run
    pub fn spawn(program: &str) -> Option<Self> {
        Self::spawn_with(program, &["-J", "-s", SAMPLE_PERIOD_MS])
    }

    fn spawn_with(program: &str, args: &[&str]) -> Option<Self> {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::info!("Intel GPU usage unavailable ({}: {})", program, e);
                return None;
            }
        };

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        };

        let busy = Arc::new(Mutex::new(None));
        let latest = Arc::clone(&busy);
        let reader = std::thread::Builder::new()
            .name("intel_gpu_top".to_string())
            .spawn(move || {
                let mut splitter = JsonObjectSplitter::default();
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    for object in splitter.push(&line) {
                        match serde_json::from_str::<Value>(&object) {
                            Ok(value) => {
                                *latest.lock().unwrap_or_else(|p| p.into_inner()) =
                                    engine_busy(&value);
                            }
                            Err(e) => log::debug!("Ignoring intel_gpu_top output: {}", e),
                        }
                    }
                }
                *latest.lock().unwrap_or_else(|p| p.into_inner()) = None;
                log::debug!("intel_gpu_top exited");
            });

        if let Err(e) = reader {
            log::warn!("Failed to start intel_gpu_top reader: {}", e);
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }

        log::info!("Reading Intel GPU usage from {}", program);
        Some(Self { child, busy })
    }

    /// Mean engine busy percentage of the latest sample
    pub fn busy(&self) -> Option<f64> {
        *self.busy.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for IntelGpuTop {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Mean of `engines.*.busy` in one `intel_gpu_top` sample
pub fn engine_busy(sample: &Value) -> Option<f64> {
    let engines = sample.get("engines")?.as_object()?;
    let busy: Vec<f64> = engines
        .values()
        .filter_map(|engine| engine.get("busy")?.as_f64())
        .collect();
    if busy.is_empty() {
        return None;
    }
    Some(busy.iter().sum::<f64>() / busy.len() as f64)
}

/// Cuts a stream of concatenated or array-wrapped JSON objects into the
/// text of each top-level object
#[derive(Debug, Default)]
struct JsonObjectSplitter {
    current: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonObjectSplitter {
    fn push(&mut self, text: &str) -> Vec<String> {
        let mut complete = Vec::new();
        for c in text.chars() {
            if self.depth == 0 {
                // Array brackets and separators between objects
                if c == '{' {
                    self.depth = 1;
                    self.current.push(c);
                }
                continue;
            }

            self.current.push(c);
            if self.in_string {
                match (self.escaped, c) {
                    (true, _) => self.escaped = false,
                    (false, '\\') => self.escaped = true,
                    (false, '"') => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        complete.push(std::mem::take(&mut self.current));
                    }
                }
                _ => {}
            }
        }
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const SAMPLE: &str = r#"{
        "period": {"duration": 1000.2, "unit": "ms"},
        "frequency": {"requested": 350.0, "actual": 300.0, "unit": "MHz"},
        "engines": {
            "Render/3D": {"busy": 30.0, "sema": 0.0, "wait": 0.0, "unit": "%"},
            "Blitter": {"busy": 0.0, "sema": 0.0, "wait": 0.0, "unit": "%"},
            "Video": {"busy": 10.0, "sema": 0.0, "wait": 0.0, "unit": "%"},
            "VideoEnhance": {"busy": 0.0, "sema": 0.0, "wait": 0.0, "unit": "%"}
        }
    }"#;

    #[test]
    fn test_engine_busy_is_mean_over_engines() {
        let sample: Value = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(engine_busy(&sample), Some(10.0));

        let no_engines: Value = serde_json::from_str(r#"{"engines": {}}"#).unwrap();
        assert_eq!(engine_busy(&no_engines), None);
        assert_eq!(engine_busy(&Value::Null), None);
    }

    #[test]
    fn test_splitter_handles_streamed_array() {
        let mut splitter = JsonObjectSplitter::default();
        let mut objects = Vec::new();
        for line in ["[", "{", "  \"name\": \"brace } in \\\"string\\\"\",", "  \"engines\": {\"a\": {\"busy\": 4}}", "},", "{\"engines\": {}}"] {
            objects.extend(splitter.push(line));
        }
        assert_eq!(objects.len(), 2);

        let first: Value = serde_json::from_str(&objects[0]).unwrap();
        assert_eq!(first["name"], "brace } in \"string\"");
        assert_eq!(engine_busy(&first), Some(4.0));
        assert!(serde_json::from_str::<Value>(&objects[1]).is_ok());
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        assert!(IntelGpuTop::spawn("/nonexistent/lcd-sens/intel_gpu_top").is_none());
    }

    #[test]
    fn test_reads_samples_from_child() {
        let script = r#"printf '[\n{"engines": {"Render/3D": {"busy": 40.0}, "Video": {"busy": 20.0}}},\n'; sleep 5"#;
        let top = IntelGpuTop::spawn_with("sh", &["-c", script]).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while top.busy().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(top.busy(), Some(30.0));
    }
}
