//! Small helpers for reading Linux sysfs attribute files

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Read an integer value from a sysfs file
pub fn read_int_file(path: &Path) -> Result<i64> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Failed to parse integer from {}", path.display()))
}

/// Read a hexadecimal value (`0x1002`) from a sysfs file
pub fn read_hex_file(path: &Path) -> Result<u32> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let trimmed = content.trim().trim_start_matches("0x");
    u32::from_str_radix(trimmed, 16)
        .with_context(|| format!("Failed to parse hex value from {}", path.display()))
}

/// Read a trimmed, lower-cased text attribute
pub fn read_text_file(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_lowercase())
}

/// Read a `temp*_input` file (millidegrees) as degrees Celsius
pub fn read_millidegrees(path: &Path) -> Option<f32> {
    read_int_file(path).ok().map(|v| v as f32 / 1000.0)
}

/// Entries of `dir` whose file name starts with `prefix`, sorted by name
pub fn list_prefixed(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

/// hwmon temperature channels: index -> lower-cased `temp{N}_label` (empty when unlabelled)
pub fn hwmon_temp_channels(root: &Path) -> BTreeMap<u32, String> {
    let mut channels = BTreeMap::new();
    for path in list_prefixed(root, "temp") {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(index) = name
            .strip_prefix("temp")
            .and_then(|rest| rest.strip_suffix("_input"))
            .and_then(|idx| idx.parse::<u32>().ok())
        else {
            continue;
        };
        let label = read_text_file(&root.join(format!("temp{}_label", index))).unwrap_or_default();
        channels.insert(index, label);
    }
    channels
}

/// hwmon directories under `class_root` whose `name` matches one of `drivers`
pub fn hwmon_roots_for(class_root: &Path, drivers: &[&str]) -> Vec<PathBuf> {
    list_prefixed(class_root, "hwmon")
        .into_iter()
        .filter(|root| {
            read_text_file(&root.join("name"))
                .is_some_and(|name| drivers.iter().any(|d| name.contains(d)))
        })
        .collect()
}
