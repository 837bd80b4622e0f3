//! Output handling for the CLI.
//!
//! `OutputHandler` prints results to stdout, as plain text or as JSON
//! depending on `--json-output`. Diagnostics go through `log` to stderr.

use chrono::{DateTime, Local};
use serde_json::json;
use sidecar_core::{PurgeReport, SidecarCandidate, SidecarConfig, Value};
use std::io;

/// CLI output handler: text or JSON results on stdout.
#[derive(Default)]
pub struct OutputHandler {
    json: bool,
}

impl OutputHandler {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn emit_result(&self, content: &str) {
        println!("{}", content);
    }

    fn emit_json(&self, value: &serde_json::Value) -> io::Result<()> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| io::Error::other(format!("JSON serialize error: {}", e)))?;
        self.emit_result(&text);
        Ok(())
    }

    /// A whole settings table. Text mode prints the on-disk form.
    pub fn emit_settings(&self, data: &sidecar_core::SettingsBlob) -> io::Result<()> {
        if self.json {
            return self.emit_json(&serde_json::Value::from(data));
        }
        print!("{}", sidecar_core::payload::encode(data));
        Ok(())
    }

    /// A single setting. Strings print bare in text mode.
    pub fn emit_value(&self, value: &Value) -> io::Result<()> {
        match value {
            Value::String(s) if !self.json => {
                self.emit_result(s);
                Ok(())
            }
            other => self.emit_json(&serde_json::Value::from(other)),
        }
    }

    pub fn emit_candidates(&self, candidates: &[SidecarCandidate]) -> io::Result<()> {
        if self.json {
            let list: Vec<serde_json::Value> = candidates
                .iter()
                .map(|c| {
                    json!({
                        "path": c.path,
                        "location": c.location.as_ref(),
                        "backup": c.backup,
                        "priority": c.priority,
                        "mtime": format_mtime(c),
                    })
                })
                .collect();
            return self.emit_json(&serde_json::Value::Array(list));
        }
        if candidates.is_empty() {
            self.emit_result("(no sidecar files)");
        }
        for c in candidates {
            self.emit_result(&format!(
                "{:<20} {}  {}",
                c.label(),
                format_mtime(c),
                c.path.display()
            ));
        }
        Ok(())
    }

    pub fn emit_purge(&self, report: &PurgeReport) -> io::Result<()> {
        if self.json {
            return self.emit_json(&json!({
                "removed_files": report.removed_files,
                "removed_dirs": report.removed_dirs,
            }));
        }
        for path in report.removed_files.iter().chain(&report.removed_dirs) {
            self.emit_result(&format!("removed {}", path.display()));
        }
        if report.is_empty() {
            self.emit_result("nothing to purge");
        }
        Ok(())
    }

    pub fn emit_flag(&self, name: &str, value: bool) -> io::Result<()> {
        if self.json {
            return self.emit_json(&single_field(name, value.into()));
        }
        self.emit_result(if value { "yes" } else { "no" });
        Ok(())
    }

    pub fn emit_text(&self, name: &str, value: &str) -> io::Result<()> {
        if self.json {
            return self.emit_json(&single_field(name, value.into()));
        }
        self.emit_result(value);
        Ok(())
    }

    pub fn emit_config(&self, config: &SidecarConfig) -> io::Result<()> {
        if self.json {
            let value = serde_json::to_value(config)
                .map_err(|e| io::Error::other(format!("JSON serialize error: {}", e)))?;
            return self.emit_json(&value);
        }
        let text = toml::to_string(config)
            .map_err(|e| io::Error::other(format!("TOML serialize error: {}", e)))?;
        print!("{}", text);
        Ok(())
    }
}

fn single_field(name: &str, value: serde_json::Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(name.to_string(), value);
    serde_json::Value::Object(map)
}

fn format_mtime(candidate: &SidecarCandidate) -> String {
    let local: DateTime<Local> = candidate.mtime.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}
