use std::net::IpAddr;

use serde::Serialize;
use wirelink_transport::{is_port_available, local_address, AddressFamily};

use crate::cmd::ProbeArgs;
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Debug, Serialize)]
struct ProbeReport {
    ipv4: Option<IpAddr>,
    ipv6: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<PortReport>,
}

#[derive(Debug, Serialize)]
struct PortReport {
    port: u16,
    available: bool,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let report = ProbeReport {
        ipv4: local_address(AddressFamily::V4),
        ipv6: local_address(AddressFamily::V6),
        port: args.port.map(|port| PortReport {
            port,
            available: is_port_available(port),
        }),
    };

    print_report(&report, format);

    // A taken port is a probe result the caller will want to branch on.
    match &report.port {
        Some(port) if !port.available => Ok(FAILURE),
        _ => Ok(SUCCESS),
    }
}

fn print_report(report: &ProbeReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => print_table(&["CHECK", "RESULT"], rows(report)),
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in rows(report) {
                println!("{}: {}", row[0], row[1]);
            }
        }
    }
}

fn rows(report: &ProbeReport) -> Vec<Vec<String>> {
    let show = |ip: Option<IpAddr>| ip.map_or_else(|| "none".to_string(), |ip| ip.to_string());
    let mut rows = vec![
        vec!["ipv4".to_string(), show(report.ipv4)],
        vec!["ipv6".to_string(), show(report.ipv6)],
    ];
    if let Some(port) = &report.port {
        let state = if port.available { "available" } else { "in use" };
        rows.push(vec![format!("port {}", port.port), state.to_string()]);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_include_port_only_when_requested() {
        let mut report = ProbeReport {
            ipv4: Some(IpAddr::from([10, 0, 0, 2])),
            ipv6: None,
            port: None,
        };
        let plain = rows(&report);
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0][1], "10.0.0.2");
        assert_eq!(plain[1][1], "none");

        report.port = Some(PortReport {
            port: 8080,
            available: false,
        });
        let with_port = rows(&report);
        assert_eq!(with_port[2], vec!["port 8080".to_string(), "in use".to_string()]);
    }

    #[test]
    fn json_omits_unrequested_port() {
        let report = ProbeReport {
            ipv4: None,
            ipv6: None,
            port: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("port").is_none());
        assert!(value["ipv4"].is_null());
    }
}
