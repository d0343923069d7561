//! Containers via the `docker` CLI.
//!
//! `docker ps` is the primary listing; `docker stats` only enriches running
//! containers and its failure leaves the usage fields at zero.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::collector::error::CollectError;
use crate::collector::traits::{Collector, CommandRunner};
use crate::fmt::{format_memory_display, parse_human_size, parse_percent};
use crate::hub::{Payload, topics};
use crate::models::{ContainerInfo, PortMapping};

const DOCKER: &str = "docker";
const JSON_FORMAT: &str = "{{json .}}";

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PsEntry {
    #[serde(rename = "ID")]
    pub id: String,
    pub names: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub networks: String,
    pub ports: String,
}

/// One line of `docker stats --format '{{json .}}'`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc")]
    pub cpu_perc: String,
    #[serde(rename = "MemUsage")]
    pub mem_usage: String,
    #[serde(rename = "NetIO")]
    pub net_io: String,
}

/// Parses one JSON object per line, skipping lines that do not parse.
pub fn parse_json_lines<T: DeserializeOwned>(output: &str) -> Vec<T> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(collector = "docker", error = %e, "skipping malformed line");
                None
            }
        })
        .collect()
}

/// Splits `"a / b"` into two byte counts.
fn parse_pair(s: &str) -> (u64, u64) {
    match s.split_once('/') {
        Some((a, b)) => (
            parse_human_size(a).unwrap_or(0),
            parse_human_size(b).unwrap_or(0),
        ),
        None => (0, 0),
    }
}

/// Tag of an image reference, `latest` when absent.
pub fn image_version(image: &str) -> String {
    let name = image.split('@').next().unwrap_or(image);
    let last_segment = name.rsplit('/').next().unwrap_or(name);
    match last_segment.rsplit_once(':') {
        Some((_, tag)) if !tag.is_empty() => tag.to_string(),
        _ => "latest".to_string(),
    }
}

/// Running time from a status like `Up 3 hours (healthy)`.
pub fn uptime_from_status(status: &str) -> String {
    status
        .strip_prefix("Up ")
        .map(|rest| rest.split(" (").next().unwrap_or(rest).trim().to_string())
        .unwrap_or_default()
}

/// Parses the `Ports` column: `0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp`.
///
/// IPv4 and IPv6 bindings of the same mapping are reported once.
pub fn parse_ports(ports: &str) -> Vec<PortMapping> {
    let mut out: Vec<PortMapping> = Vec::new();

    for entry in ports.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (public, private) = match entry.split_once("->") {
            Some((host, container)) => (host.rsplit(':').next().unwrap_or(host), container),
            None => ("", entry),
        };
        let (private_port, protocol) = private.split_once('/').unwrap_or((private, "tcp"));
        // ranges like 8000-8010 keep their first port
        let first = |s: &str| s.split('-').next().and_then(|p| p.parse::<u16>().ok());

        let Some(private_port) = first(private_port) else {
            continue;
        };
        let mapping = PortMapping {
            private_port,
            public_port: first(public).unwrap_or(0),
            protocol: protocol.to_string(),
        };
        if !out.contains(&mapping) {
            out.push(mapping);
        }
    }

    out
}

fn container_from_ps(entry: PsEntry, now: DateTime<Utc>) -> ContainerInfo {
    let running = entry.state == "running";
    ContainerInfo {
        version: image_version(&entry.image),
        uptime: if running {
            uptime_from_status(&entry.status)
        } else {
            String::new()
        },
        ports: parse_ports(&entry.ports),
        port_mappings: entry
            .ports
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        id: entry.id,
        name: entry.names,
        image: entry.image,
        state: entry.state,
        status: entry.status,
        network_mode: entry.networks,
        memory_display: format_memory_display(0, 0),
        timestamp: now,
        ..Default::default()
    }
}

fn apply_stats(container: &mut ContainerInfo, stats: &StatsEntry) {
    container.cpu_percent = parse_percent(&stats.cpu_perc).unwrap_or(0.0);
    let (used, limit) = parse_pair(&stats.mem_usage);
    container.memory_usage_bytes = used;
    container.memory_limit_bytes = limit;
    container.memory_display = format_memory_display(used, limit);
    let (rx, tx) = parse_pair(&stats.net_io);
    container.network_rx_bytes = rx;
    container.network_tx_bytes = tx;
}

pub struct DockerCollector {
    runner: Arc<dyn CommandRunner>,
}

impl DockerCollector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn stats(&self) -> HashMap<String, StatsEntry> {
        let out = match self.runner.output(
            DOCKER,
            &["stats", "--no-stream", "--no-trunc", "--format", JSON_FORMAT],
        ) {
            Ok(out) => out,
            Err(e) => {
                warn!(collector = "docker", error = %e, "docker stats failed");
                return HashMap::new();
            }
        };

        let mut by_key = HashMap::new();
        for entry in parse_json_lines::<StatsEntry>(&out) {
            if !entry.name.is_empty() {
                by_key.insert(entry.name.clone(), entry.clone());
            }
            by_key.insert(entry.id.clone(), entry);
        }
        by_key
    }

    pub fn collect_containers(&self, now: DateTime<Utc>) -> Result<Vec<ContainerInfo>, CollectError> {
        let out = self.runner.output(
            DOCKER,
            &["ps", "-a", "--no-trunc", "--format", JSON_FORMAT],
        )?;
        let mut containers: Vec<ContainerInfo> = parse_json_lines::<PsEntry>(&out)
            .into_iter()
            .map(|entry| container_from_ps(entry, now))
            .collect();

        if containers.iter().any(|c| c.state == "running") {
            let stats = self.stats();
            for c in containers.iter_mut().filter(|c| c.state == "running") {
                if let Some(s) = stats.get(&c.id).or_else(|| stats.get(&c.name)) {
                    apply_stats(c, s);
                }
            }
        }

        Ok(containers)
    }
}

impl Collector for DockerCollector {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn topic(&self) -> &'static str {
        topics::CONTAINER_LIST
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        if !self.runner.exists(DOCKER) {
            return Err(CollectError::MissingPrerequisite(DOCKER));
        }
        let containers = self.collect_containers(Utc::now())?;
        debug!(collector = "docker", count = containers.len(), "collected containers");
        Ok(Payload::new(containers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;

    #[test]
    fn test_image_version() {
        assert_eq!(image_version("linuxserver/plex:1.40.0"), "1.40.0");
        assert_eq!(image_version("linuxserver/plex"), "latest");
        assert_eq!(image_version("registry:5000/app"), "latest");
        assert_eq!(image_version("registry:5000/app:v2"), "v2");
    }

    #[test]
    fn test_uptime_from_status() {
        assert_eq!(uptime_from_status("Up 3 hours (healthy)"), "3 hours");
        assert_eq!(uptime_from_status("Up 2 days"), "2 days");
        assert_eq!(uptime_from_status("Exited (0) 5 minutes ago"), "");
    }

    #[test]
    fn test_parse_ports() {
        let ports = parse_ports("0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp, 0.0.0.0:5000-5001->5000-5001/udp");
        assert_eq!(
            ports,
            vec![
                PortMapping { private_port: 80, public_port: 8080, protocol: "tcp".into() },
                PortMapping { private_port: 443, public_port: 0, protocol: "tcp".into() },
                PortMapping { private_port: 5000, public_port: 5000, protocol: "udp".into() },
            ]
        );
        assert!(parse_ports("").is_empty());
    }

    #[test]
    fn test_parse_json_lines_skips_garbage() {
        let out = "{\"ID\":\"a\",\"Names\":\"x\"}\nnot json\n\n{\"ID\":\"b\"}\n";
        let entries: Vec<PsEntry> = parse_json_lines(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].names, "x");
        assert_eq!(entries[1].id, "b");
    }

    #[test]
    fn test_collect_containers() {
        let runner = Arc::new(MockRunner::storage_server());
        let c = DockerCollector::new(runner);
        let containers = c.collect_containers(Utc::now()).unwrap();

        assert_eq!(containers.len(), 2);
        let plex = &containers[0];
        assert_eq!(plex.name, "plex");
        assert_eq!(plex.version, "latest");
        assert_eq!(plex.network_mode, "host");
        assert!((plex.cpu_percent - 1.5).abs() < 1e-9);
        assert_eq!(plex.memory_usage_bytes, 512 * 1024 * 1024);
        assert_eq!(plex.memory_limit_bytes, 16 * 1024 * 1024 * 1024);
        assert_eq!(plex.network_rx_bytes, 1_200_000);
        assert_eq!(plex.network_tx_bytes, 3_400_000);
        assert_eq!(plex.uptime, "3 days");

        let db = &containers[1];
        assert_eq!(db.state, "exited");
        assert_eq!(db.version, "16");
        assert_eq!(db.cpu_percent, 0.0);
        assert_eq!(db.memory_display, "0 / 0");
        assert_eq!(db.ports[0].private_port, 5432);
    }

    #[test]
    fn test_stats_failure_leaves_zeros() {
        let runner = Arc::new(MockRunner::storage_server());
        runner.set_failure("docker stats --no-stream --no-trunc --format {{json .}}", 1, "daemon busy");
        let containers = DockerCollector::new(runner).collect_containers(Utc::now()).unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].cpu_percent, 0.0);
    }

    #[test]
    fn test_missing_docker_is_prerequisite() {
        let mut c = DockerCollector::new(Arc::new(MockRunner::new()));
        assert!(c.sample().unwrap_err().is_prerequisite());
    }
}
