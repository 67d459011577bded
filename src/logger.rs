use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

pub enum MessageLogMode {
    Full,
    /// First response per path in full, then only changed JSON paths.
    Diffed,
}

/// Append-only NDJSON log of every exchange with the thermostat.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, form: Option<&[(&'static str, String)]>) {
        let form = form.map(|fields| {
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), Value::from(v.as_str())))
                .collect::<Map<String, Value>>()
        });
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "form": form,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        let mut entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "path": path,
            "status": status,
        });

        match self.mode {
            MessageLogMode::Full => {
                entry["body"] = body.clone();
            }
            MessageLogMode::Diffed => match self.previous.get(path) {
                None => {
                    entry["full"] = Value::Bool(true);
                    entry["body"] = body.clone();
                }
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, body, "", &mut changes);
                    entry["changes"] = changes
                        .into_iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();
                }
            },
        }
        self.previous.insert(path.to_string(), body.clone());
        self.write_line(&entry);
    }

    /// Error statuses and bodies that are not JSON. Written as raw text in
    /// either mode and never used as a diff baseline.
    pub fn log_unparsed(&mut self, path: &str, status: u16, raw: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "path": path,
            "status": status,
            "raw": raw,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Collect `(path, old, new)` for every leaf that differs. Removed keys are
/// not reported; the thermostat always sends complete objects.
fn diff_json(previous: &Value, current: &Value, prefix: &str, changes: &mut Vec<(String, Value, Value)>) {
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            for (key, curr_val) in curr {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                let prev_val = prev.get(key).unwrap_or(&Value::Null);
                diff_json(prev_val, curr_val, &path, changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}
