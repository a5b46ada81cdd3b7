// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use glob::glob;
use std::path::PathBuf;

/// True when `source` contains glob metacharacters.
pub fn is_glob_pattern(source: &str) -> bool {
    source.contains('*') || source.contains('?') || source.contains('[')
}

/// Expand a glob pattern into the regular files it matches, in glob order.
///
/// Directories are skipped: uploads are per file and never recursive.
pub fn resolve_source_files(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let mut files = Vec::new();
    for entry in glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
        }
    }
    Ok(files)
}

/// Format a byte count in human-readable form.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
