//! Temperature and fan readings.
//!
//! `sensors -u` is preferred. When it is not installed, fails, or yields no
//! readings of a kind, `/sys/class/hwmon` is scanned instead.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::traits::{CommandRunner, FileSystem};
use crate::models::{FanInfo, TemperatureInfo};

/// Readings from one collection pass, each list sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReadings {
    pub temperatures: Vec<TemperatureInfo>,
    pub fans: Vec<FanInfo>,
}

impl SensorReadings {
    fn sort(&mut self) {
        self.temperatures.sort_by(|a, b| a.name.cmp(&b.name));
        self.fans.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

fn sensor_name(chip: &str, feature: &str) -> String {
    format!("{chip}_{feature}").replace(' ', "_")
}

/// Parses `sensors -u` output.
///
/// Layout: an unindented chip line, an `Adapter:` line, then per feature an
/// unindented `Feature name:` line followed by indented `tempN_input: 42.000`
/// or `fanN_input: 1200.000` lines. Temperatures are already in °C.
pub fn parse_sensors_output(output: &str) -> SensorReadings {
    let mut readings = SensorReadings::default();
    let mut chip = String::new();
    let mut feature = String::new();

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            chip.clear();
            feature.clear();
            continue;
        }
        let indented = raw.starts_with(' ') || raw.starts_with('\t');

        if !indented {
            if !line.contains(':') {
                chip = line.to_string();
                feature.clear();
            } else if let Some(name) = line.strip_suffix(':') {
                feature = name.trim().to_string();
            }
            continue;
        }

        if chip.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !key.ends_with("_input") {
            continue;
        }
        let Ok(value) = value.trim().parse::<f64>() else {
            continue;
        };
        let label = if feature.is_empty() { key } else { feature.as_str() };
        let name = sensor_name(&chip, label);

        if key.starts_with("temp") {
            readings.temperatures.push(TemperatureInfo {
                name,
                celsius: value,
            });
        } else if key.starts_with("fan") {
            readings.fans.push(FanInfo {
                name,
                rpm: value.max(0.0).round() as u32,
            });
        }
    }

    readings.sort();
    readings
}

/// Splits `temp3_input` into `("temp", 3)`.
fn hwmon_input(file_name: &str) -> Option<(&str, u32)> {
    let stem = file_name.strip_suffix("_input")?;
    let (kind, index) = if let Some(i) = stem.strip_prefix("temp") {
        ("temp", i)
    } else if let Some(i) = stem.strip_prefix("fan") {
        ("fan", i)
    } else {
        return None;
    };
    Some((kind, index.parse().ok()?))
}

fn read_trimmed(fs: &dyn FileSystem, path: &Path) -> Option<String> {
    fs.read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scans `<sys_root>/class/hwmon/hwmon*/{temp,fan}*_input`.
///
/// Temperatures are millidegrees. Labels come from the matching `_label`
/// file, else `hwmon<N>_temp<M>` / `hwmon<N>_fan<M>`.
pub fn read_hwmon(fs: &dyn FileSystem, sys_root: &Path) -> SensorReadings {
    let mut readings = SensorReadings::default();
    let base = sys_root.join("class/hwmon");

    let mut chips: Vec<PathBuf> = match fs.read_dir(&base) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %base.display(), error = %e, "hwmon not available");
            return readings;
        }
    };
    chips.sort();

    for chip in chips {
        let Some(chip_name) = chip.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !chip_name.starts_with("hwmon") {
            continue;
        }
        let Ok(files) = fs.read_dir(&chip) else {
            continue;
        };

        for file in files {
            let Some((kind, index)) = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(hwmon_input)
            else {
                continue;
            };
            let Some(raw) = read_trimmed(fs, &file) else {
                continue;
            };
            let label = read_trimmed(fs, &chip.join(format!("{kind}{index}_label")))
                .unwrap_or_else(|| format!("{chip_name}_{kind}{index}"));

            match kind {
                "temp" => {
                    if let Ok(milli) = raw.parse::<f64>() {
                        readings.temperatures.push(TemperatureInfo {
                            name: label,
                            celsius: milli / 1000.0,
                        });
                    }
                }
                _ => {
                    if let Ok(rpm) = raw.parse::<u32>() {
                        readings.fans.push(FanInfo { name: label, rpm });
                    }
                }
            }
        }
    }

    readings.sort();
    readings
}

/// Reads temperatures and fans, falling back to hwmon per kind.
pub fn read_sensors(
    fs: &dyn FileSystem,
    runner: &dyn CommandRunner,
    sys_root: &Path,
) -> SensorReadings {
    let mut readings = if runner.exists("sensors") {
        match runner.output("sensors", &["-u"]) {
            Ok(out) => parse_sensors_output(&out),
            Err(e) => {
                debug!(error = %e, "sensors failed, using hwmon");
                SensorReadings::default()
            }
        }
    } else {
        SensorReadings::default()
    };

    if readings.temperatures.is_empty() || readings.fans.is_empty() {
        let hwmon = read_hwmon(fs, sys_root);
        if readings.temperatures.is_empty() {
            readings.temperatures = hwmon.temperatures;
        }
        if readings.fans.is_empty() {
            readings.fans = hwmon.fans;
        }
    }

    readings
}

fn name_matches(name: &str, needles: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

fn is_cpu_sensor(name: &str) -> bool {
    name_matches(name, &["cpu", "core", "package"])
}

/// Hottest sensor whose name mentions cpu, core or package. 0 when none.
pub fn cpu_temperature(temps: &[TemperatureInfo]) -> f64 {
    temps
        .iter()
        .filter(|t| is_cpu_sensor(&t.name))
        .map(|t| t.celsius)
        .fold(0.0, f64::max)
}

/// Hottest non-CPU sensor whose name mentions motherboard or mb. 0 when none.
pub fn motherboard_temperature(temps: &[TemperatureInfo]) -> f64 {
    temps
        .iter()
        .filter(|t| !is_cpu_sensor(&t.name) && name_matches(&t.name, &["motherboard", "mb"]))
        .map(|t| t.celsius)
        .fold(0.0, f64::max)
}
