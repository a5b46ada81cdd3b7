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

//! Target resolution: host specification -> ordered, deduplicated hosts
//!
//! # Syntax
//!
//! A host specification is a comma-separated list of entries:
//! - `host` or `host:port` (a bare host gets the default port)
//! - `[v6addr]` or `[v6addr]:port`
//! - numeric ranges: `web[1-3]`, `node[01-10]:2222`, `10.0.0.[1,5-7]`
//! - `^/path/to/file`: one entry per line, `#` comments and blank lines ignored
//!
//! Resolution is pure: no DNS lookups happen here, the transport resolves
//! names lazily when it dials.
//!
//! ```rust
//! use mooon::target::resolve;
//!
//! let targets = resolve("10.0.0.1,10.0.0.2:2222,10.0.0.1:22", 22).unwrap();
//! assert_eq!(targets.len(), 2);
//! assert_eq!(targets[1].to_string(), "10.0.0.2:2222");
//! ```

mod error;
pub mod range;

pub use error::ResolveError;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// One remote host to operate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a single `host[:port]` entry (no range expansion).
    pub fn parse(entry: &str, default_port: u16) -> Result<Self, ResolveError> {
        let entry = entry.trim();
        let malformed = |reason: &str| ResolveError::MalformedEntry {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        if entry.is_empty() {
            return Err(malformed("empty host"));
        }

        // [v6addr] or [v6addr]:port
        if let Some(rest) = entry.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| malformed("unclosed '[' in address"))?;
            if host.is_empty() {
                return Err(malformed("empty host"));
            }
            validate_ipv6_host(entry, host)?;
            let port = match after {
                "" => default_port,
                _ => {
                    let port_str = after
                        .strip_prefix(':')
                        .ok_or_else(|| malformed("unexpected text after ']'"))?;
                    parse_port(entry, port_str)?
                }
            };
            return Ok(Self::new(host, port));
        }

        // A bare IPv6 literal has several colons and no port
        if entry.matches(':').count() > 1 {
            validate_ipv6_host(entry, entry)?;
            return Ok(Self::new(entry, default_port));
        }

        match entry.split_once(':') {
            Some((host, port_str)) => {
                if host.is_empty() {
                    return Err(malformed("empty host"));
                }
                validate_hostname(entry, host)?;
                Ok(Self::new(host, parse_port(entry, port_str)?))
            }
            None => {
                validate_hostname(entry, entry)?;
                Ok(Self::new(entry, default_port))
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Longest host name allowed by RFC 1123
pub const MAX_HOSTNAME_LENGTH: usize = 253;

fn invalid_host(entry: &str, host: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidHost {
        entry: entry.to_string(),
        host: host.to_string(),
        reason: reason.to_string(),
    }
}

/// Names and IPv4 literals: RFC 1123 labels separated by dots.
///
/// `--` inside a label is allowed so punycode names (`xn--...`) resolve.
fn validate_hostname(entry: &str, host: &str) -> Result<(), ResolveError> {
    if host.len() > MAX_HOSTNAME_LENGTH {
        return Err(invalid_host(
            entry,
            host,
            &format!("longer than {MAX_HOSTNAME_LENGTH} characters"),
        ));
    }
    if let Some(c) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(invalid_host(entry, host, &format!("invalid character {c:?}")));
    }
    // A single trailing dot marks a fully qualified name
    let name = host.strip_suffix('.').unwrap_or(host);
    for label in name.split('.') {
        if label.is_empty() {
            return Err(invalid_host(entry, host, "empty label"));
        }
        if label.len() > 63 {
            return Err(invalid_host(entry, host, "label longer than 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid_host(entry, host, "label starts or ends with '-'"));
        }
    }
    Ok(())
}

/// IPv6 literals, optionally with a `%zone` suffix.
fn validate_ipv6_host(entry: &str, host: &str) -> Result<(), ResolveError> {
    let (address, zone) = match host.split_once('%') {
        Some((address, zone)) => (address, Some(zone)),
        None => (host, None),
    };
    if address.parse::<std::net::Ipv6Addr>().is_err() {
        return Err(invalid_host(entry, host, "not a valid IPv6 address"));
    }
    if let Some(zone) = zone {
        if zone.is_empty()
            || !zone
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err(invalid_host(entry, host, "invalid IPv6 zone"));
        }
    }
    Ok(())
}

fn parse_port(entry: &str, port_str: &str) -> Result<u16, ResolveError> {
    let invalid = || ResolveError::InvalidPort {
        entry: entry.to_string(),
        port: port_str.to_string(),
    };
    if port_str.is_empty() || !port_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match port_str.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(port) => Ok(port),
    }
}

/// Resolve a host specification into an ordered set of targets.
///
/// Duplicate `(host, port)` pairs are dropped; the first appearance decides
/// the position of a target in the result and therefore in the final report.
pub fn resolve(spec: &str, default_port: u16) -> Result<Vec<Target>, ResolveError> {
    if spec.trim().is_empty() {
        return Err(ResolveError::EmptySpec);
    }

    let mut targets = Vec::new();
    for entry in range::split_entries(spec)? {
        if let Some(path) = entry.strip_prefix('^') {
            for line in read_host_file(Path::new(path.trim()))? {
                for entry in range::split_entries(&line)? {
                    resolve_entry(&entry, default_port, &mut targets)?;
                }
            }
        } else {
            resolve_entry(&entry, default_port, &mut targets)?;
        }
    }

    Ok(deduplicate(targets))
}

fn resolve_entry(
    entry: &str,
    default_port: u16,
    targets: &mut Vec<Target>,
) -> Result<(), ResolveError> {
    for expanded in range::expand_entry(entry)? {
        targets.push(Target::parse(&expanded, default_port)?);
    }
    Ok(())
}

fn read_host_file(path: &Path) -> Result<Vec<String>, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|e| ResolveError::HostFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn deduplicate(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_host_only() {
        let target = Target::parse("example.com", 22).unwrap();
        assert_eq!(target, Target::new("example.com", 22));
    }

    #[test]
    fn test_parse_host_with_port() {
        let target = Target::parse("example.com:2222", 22).unwrap();
        assert_eq!(target.port, 2222);
    }

    #[test]
    fn test_parse_ipv6() {
        assert_eq!(
            Target::parse("[fe80::1]:2200", 22).unwrap(),
            Target::new("fe80::1", 2200)
        );
        assert_eq!(
            Target::parse("fe80::1", 22).unwrap(),
            Target::new("fe80::1", 22)
        );
        assert_eq!(Target::new("fe80::1", 22).to_string(), "[fe80::1]:22");
    }

    #[test]
    fn test_parse_invalid_port() {
        for entry in ["host:", "host:abc", "host:0", "host:70000"] {
            assert!(
                matches!(
                    Target::parse(entry, 22),
                    Err(ResolveError::InvalidPort { .. })
                ),
                "{entry} should be rejected"
            );
        }
        assert!(matches!(
            Target::parse(":22", 22),
            Err(ResolveError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_hosts() {
        let long_name = format!("{}.example.com", "a".repeat(250));
        for entry in [
            "10.0.0.1 10.0.0.2",
            "host;rm -rf /",
            "web1/22",
            "web1/22:22",
            "db..internal",
            "-web1",
            "web1-.lan",
            "user@web1",
            long_name.as_str(),
            "[fe80::zz]:22",
            "fe80::1::2",
        ] {
            assert!(
                matches!(
                    Target::parse(entry, 22),
                    Err(ResolveError::InvalidHost { .. })
                ),
                "{entry} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_accepts_valid_hosts() {
        for entry in [
            "web-01.prod.example.com",
            "xn--bcher-kva.example",
            "web1.example.com.",
            "192.168.1.10:2222",
            "[::1]",
            "fe80::1%eth0",
        ] {
            assert!(Target::parse(entry, 22).is_ok(), "{entry} should be accepted");
        }
    }

    #[test]
    fn test_resolve_rejects_space_separated_hosts() {
        assert!(matches!(
            resolve("10.0.0.1 10.0.0.2", 22),
            Err(ResolveError::InvalidHost { .. })
        ));
        assert!(matches!(
            resolve("web[1-2],bad host", 22),
            Err(ResolveError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_resolve_default_port_and_order() {
        let targets = resolve("b.example.com,a.example.com:2022", 22).unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("b.example.com", 22),
                Target::new("a.example.com", 2022)
            ]
        );
    }

    #[test]
    fn test_resolve_deduplicates_host_port_pairs() {
        let targets = resolve("10.0.0.1,10.0.0.2,10.0.0.1:22,10.0.0.1:2222", 22).unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("10.0.0.1", 22),
                Target::new("10.0.0.2", 22),
                Target::new("10.0.0.1", 2222),
            ]
        );
    }

    #[test]
    fn test_resolve_empty_spec() {
        assert_eq!(resolve("", 22), Err(ResolveError::EmptySpec));
        assert_eq!(resolve("   ", 22), Err(ResolveError::EmptySpec));
    }

    #[test]
    fn test_resolve_rejects_trailing_comma() {
        assert!(matches!(
            resolve("10.0.0.1,", 22),
            Err(ResolveError::EmptyEntry { .. })
        ));
    }

    #[test]
    fn test_resolve_ranges() {
        let targets = resolve("web[1-3]:2222,web2:2222", 22).unwrap();
        let rendered: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["web1:2222", "web2:2222", "web3:2222"]
        );
    }

    #[test]
    fn test_resolve_host_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# production").unwrap();
        writeln!(file, "10.0.0.1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.0.[2-3]:2200").unwrap();
        file.flush().unwrap();

        let spec = format!("10.0.0.9,^{}", file.path().display());
        let rendered: Vec<String> = resolve(&spec, 22)
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            rendered,
            vec!["10.0.0.9:22", "10.0.0.1:22", "10.0.0.2:2200", "10.0.0.3:2200"]
        );
    }

    #[test]
    fn test_resolve_missing_host_file() {
        assert!(matches!(
            resolve("^/nonexistent/mooon/hosts", 22),
            Err(ResolveError::HostFile { .. })
        ));
    }
}
