// src/probe/dhcp.rs
//! Active DHCP lease count from an ISC dhcpd lease database.
//!
//! The database is a sequence of blocks:
//!
//! ```text
//! lease 10.0.0.12 {
//!   starts 3 2016/08/31 10:00:00;
//!   ends 3 2016/08/31 22:00:00;
//!   binding state active;
//!   next binding state free;
//!   hardware ethernet a0:f3:c1:00:00:01;
//! }
//! ```
//!
//! dhcpd appends a new block on every renewal, so clients are counted by
//! distinct MAC rather than by block.

use chrono::{NaiveDateTime, Utc};
use serde_json::json;
use std::collections::HashSet;

use super::{ProbeContext, ProbeError, ProbeFuture, parse_mac, read_file};

const LEASE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Number of distinct clients holding an active, unexpired ethernet lease.
pub fn active_leases(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.paths.dhcp_leases).await?;
        count_active_leases(&text, Utc::now().naive_utc()).map(|n| json!(n))
    })
}

/// Statements of a single lease block that matter for counting.
#[derive(Debug, Default, PartialEq)]
struct Lease {
    binding: Option<String>,
    ends: Option<LeaseEnd>,
    hardware: Option<(String, String)>,
}

#[derive(Debug, PartialEq)]
enum LeaseEnd {
    Never,
    At(NaiveDateTime),
}

impl Lease {
    fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.binding.as_deref() == Some("active")
            && matches!(self.ends, Some(LeaseEnd::At(ends)) if ends > now)
    }

    fn ethernet_mac(&self) -> Option<&str> {
        match &self.hardware {
            Some((kind, mac)) if kind == "ethernet" => Some(mac.as_str()),
            _ => None,
        }
    }
}

/// Count distinct MACs with a lease that is active and ends after `now` (UTC).
///
/// Leases ending `never` are not counted.
pub fn count_active_leases(text: &str, now: NaiveDateTime) -> Result<usize, ProbeError> {
    let macs: HashSet<String> = parse_leases(text)?
        .into_iter()
        .filter(|lease| lease.is_active_at(now))
        .filter_map(|lease| lease.ethernet_mac().map(str::to_string))
        .collect();
    Ok(macs.len())
}

fn parse_leases(text: &str) -> Result<Vec<Lease>, ProbeError> {
    let mut leases = Vec::new();
    let mut current: Option<Lease> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("lease ") && line.ends_with('{') {
            current = Some(Lease::default());
            continue;
        }
        if line == "}" {
            leases.extend(current.take());
            continue;
        }
        // Statements outside of lease blocks (server-duid, authoring-byte-order, ...)
        let Some(lease) = current.as_mut() else {
            continue;
        };
        let Some(statement) = line.strip_suffix(';') else {
            continue;
        };
        let fields: Vec<&str> = statement.split_whitespace().collect();
        match fields.as_slice() {
            ["binding", "state", state] => lease.binding = Some(state.to_string()),
            ["ends", "never"] => lease.ends = Some(LeaseEnd::Never),
            ["ends", _weekday, date, time] => {
                let at = NaiveDateTime::parse_from_str(&format!("{date} {time}"), LEASE_TIME_FORMAT)
                    .map_err(|e| ProbeError::parse(format!("lease end '{statement}': {e}")))?;
                lease.ends = Some(LeaseEnd::At(at));
            }
            ["ends", ..] => {
                return Err(ProbeError::parse(format!("lease end '{statement}'")));
            }
            ["hardware", "ethernet", mac] => {
                lease.hardware = Some(("ethernet".to_string(), parse_mac(mac)?));
            }
            ["hardware", kind, address] => {
                lease.hardware = Some((kind.to_string(), address.to_string()));
            }
            ["hardware", ..] => {
                return Err(ProbeError::parse(format!("lease hardware '{statement}'")));
            }
            _ => {}
        }
    }

    Ok(leases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use chrono::NaiveDate;

    const LEASES: &str = r#"
# The format of this file is documented in the dhcpd.leases(5) manual page.
authoring-byte-order little-endian;

lease 10.137.0.10 {
  starts 3 2016/08/31 10:00:00;
  ends 3 2016/08/31 22:00:00;
  cltt 3 2016/08/31 10:00:00;
  binding state active;
  next binding state free;
  rewind binding state free;
  hardware ethernet a0:f3:c1:00:00:01;
  client-hostname "laptop";
}
lease 10.137.0.10 {
  starts 3 2016/08/31 11:00:00;
  ends 3 2016/08/31 23:00:00;
  binding state active;
  next binding state free;
  hardware ethernet A0:F3:C1:00:00:01;
}
lease 10.137.0.11 {
  starts 3 2016/08/31 08:00:00;
  ends 3 2016/08/31 09:00:00;
  binding state active;
  hardware ethernet a0:f3:c1:00:00:02;
}
lease 10.137.0.12 {
  starts 3 2016/08/31 10:00:00;
  ends 3 2016/08/31 22:00:00;
  binding state free;
  hardware ethernet a0:f3:c1:00:00:03;
}
lease 10.137.0.13 {
  starts 3 2016/08/31 10:00:00;
  ends never;
  binding state active;
  hardware ethernet a0:f3:c1:00:00:04;
}
lease 10.137.0.14 {
  starts 3 2016/08/31 10:00:00;
  ends 3 2016/08/31 22:00:00;
  binding state active;
  hardware ethernet a0:f3:c1:00:00:05;
}
"#;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 8, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_counts_distinct_active_macs() {
        // .10 renewed twice (one client), .11 expired, .12 free, .13 never ends.
        assert_eq!(count_active_leases(LEASES, noon()).unwrap(), 2);
    }

    #[test]
    fn test_everything_expired_later() {
        let late = NaiveDate::from_ymd_opt(2016, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(count_active_leases(LEASES, late).unwrap(), 0);
    }

    #[test]
    fn test_empty_database() {
        assert_eq!(count_active_leases("", noon()).unwrap(), 0);
    }

    #[test]
    fn test_truncated_mac_is_a_parse_error() {
        let text = "lease 10.0.0.1 {\n  binding state active;\n  hardware ethernet a0:f3:c1;\n}\n";
        assert!(matches!(
            count_active_leases(text, noon()),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn test_non_ethernet_hardware_is_ignored() {
        let text = "\
lease 10.0.0.1 {
  ends 3 2016/08/31 22:00:00;
  binding state active;
  hardware ethernet a0:f3:c1:00:00:01;
}
lease 10.0.0.2 {
  ends 3 2016/08/31 22:00:00;
  binding state active;
  hardware infiniband 00:01:02:03:04:05:06:07:08:09;
}
lease 10.0.0.3 {
  ends 3 2016/08/31 22:00:00;
  binding state active;
  hardware token-ring 00:01:02:03:04:06;
}
";
        assert_eq!(count_active_leases(text, noon()).unwrap(), 1);
    }

    #[test]
    fn test_unknown_end_format_is_a_parse_error() {
        let text = "lease 10.0.0.1 {\n  ends 3 2016-08-31 12:00:00;\n}\n";
        assert!(matches!(
            count_active_leases(text, noon()),
            Err(ProbeError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_reads_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dhcpd.leases");
        std::fs::write(&path, "").unwrap();

        let mut config = AgentConfig::default();
        config.paths.dhcp_leases = path;
        let ctx = ProbeContext::from_config(&config);

        assert_eq!(active_leases(&ctx).await.unwrap(), json!(0));
    }
}
