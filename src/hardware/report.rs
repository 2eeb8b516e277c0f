// file: src/hardware/report.rs
// description: one-shot OS, CPU, RAM, storage and GPU report
// reference: https://docs.rs/sysinfo

use super::format::format_bytes;
use super::gpu::{self, GpuInfo};
use crate::error::{Result, WorkbenchError};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};

const MAX_PARTITIONS: usize = 3;
const RULE: &str = "==============================================";

#[derive(Debug, Clone, Serialize)]
pub struct SoftwareInfo {
    pub toolkit_version: String,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub host_name: Option<String>,
    pub architecture: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub brand: String,
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub current_mhz: u64,
    /// Unavailable on platforms without cpufreq
    pub min_mhz: Option<u64>,
    pub max_mhz: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub partitions: Vec<String>,
    pub working_dir: PathBuf,
    pub working_dir_mount: PathBuf,
    pub working_dir_total: u64,
    pub working_dir_free: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HardwareReport {
    pub generated_at: DateTime<Local>,
    pub software: SoftwareInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub storage: StorageInfo,
    /// `None` when GPU enumeration was not requested
    pub gpus: Option<Vec<GpuInfo>>,
}

fn query_error(component: &'static str, message: impl Into<String>) -> WorkbenchError {
    WorkbenchError::HardwareQuery {
        component,
        message: message.into(),
    }
}

/// Collects every section. Any failing query aborts the report.
pub fn collect_report(include_gpu: bool) -> Result<HardwareReport> {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    let software = SoftwareInfo {
        toolkit_version: env!("CARGO_PKG_VERSION").to_string(),
        os_name: System::name(),
        os_version: System::os_version(),
        kernel_version: System::kernel_version(),
        host_name: System::host_name(),
        architecture: std::env::consts::ARCH.to_string(),
    };

    let cpus = sys.cpus();
    let first = cpus
        .first()
        .ok_or_else(|| query_error("cpu", "no CPUs reported"))?;
    let (min_mhz, max_mhz) = cpufreq_limits();
    let cpu = CpuInfo {
        brand: first.brand().trim().to_string(),
        physical_cores: sys.physical_core_count(),
        logical_cores: cpus.len(),
        current_mhz: first.frequency(),
        min_mhz,
        max_mhz,
    };

    let total = sys.total_memory();
    if total == 0 {
        return Err(query_error("memory", "total memory reported as zero"));
    }
    let memory = MemoryInfo {
        total,
        available: sys.available_memory(),
        used: sys.used_memory(),
        percent_used: (sys.used_memory() as f64 / total as f64 * 1000.0).round() / 10.0,
    };

    let storage = storage_info()?;
    let gpus = if include_gpu {
        Some(gpu::enumerate()?)
    } else {
        None
    };

    Ok(HardwareReport {
        generated_at: Local::now(),
        software,
        cpu,
        memory,
        storage,
        gpus,
    })
}

fn storage_info() -> Result<StorageInfo> {
    let working_dir = std::env::current_dir()
        .and_then(|p| p.canonicalize())
        .map_err(|e| query_error("storage", format!("cannot resolve working directory: {}", e)))?;

    let disks = Disks::new_with_refreshed_list();
    let mounts: Vec<&Path> = disks.list().iter().map(|d| d.mount_point()).collect();
    let holder = containing_mount(&working_dir, &mounts)
        .ok_or_else(|| {
            query_error(
                "storage",
                format!("no filesystem found for {}", working_dir.display()),
            )
        })?;
    let disk = &disks.list()[holder];

    Ok(StorageInfo {
        partitions: disks
            .list()
            .iter()
            .take(MAX_PARTITIONS)
            .map(|d| d.name().to_string_lossy().into_owned())
            .collect(),
        working_dir_mount: disk.mount_point().to_path_buf(),
        working_dir_total: disk.total_space(),
        working_dir_free: disk.available_space(),
        working_dir,
    })
}

/// Index of the mount point that is the longest prefix of `path`.
fn containing_mount(path: &Path, mounts: &[&Path]) -> Option<usize> {
    mounts
        .iter()
        .enumerate()
        .filter(|(_, mount)| path.starts_with(mount))
        .max_by_key(|(_, mount)| mount.components().count())
        .map(|(i, _)| i)
}

#[cfg(target_os = "linux")]
fn cpufreq_limits() -> (Option<u64>, Option<u64>) {
    let read_khz = |name: &str| {
        std::fs::read_to_string(format!("/sys/devices/system/cpu/cpu0/cpufreq/{}", name))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|khz| khz / 1000)
    };
    (read_khz("cpuinfo_min_freq"), read_khz("cpuinfo_max_freq"))
}

#[cfg(not(target_os = "linux"))]
fn cpufreq_limits() -> (Option<u64>, Option<u64>) {
    (None, None)
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

fn mhz(value: Option<u64>) -> String {
    value
        .map(|v| format!("{:.2}Mhz", v as f64))
        .unwrap_or_else(|| "unavailable".to_string())
}

impl HardwareReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "|{}| Hardware report:\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );

        let s = &self.software;
        let _ = writeln!(out, "{RULE}\n Software:");
        let _ = writeln!(out, "  Toolkit ver:...........{}", s.toolkit_version);
        let _ = writeln!(out, "  OS name:...............{}", or_unknown(&s.os_name));
        let _ = writeln!(out, "  OS version:............{}", or_unknown(&s.os_version));
        let _ = writeln!(out, "  Kernel:................{}", or_unknown(&s.kernel_version));
        let _ = writeln!(out, "  Host name:.............{}", or_unknown(&s.host_name));
        let _ = writeln!(out, "  Machine architecture...{}\n", s.architecture);

        let c = &self.cpu;
        let _ = writeln!(out, "{RULE}\n CPU:");
        let _ = writeln!(out, "  Brand:.................{}", c.brand);
        let _ = writeln!(
            out,
            "  Physical cores:........{}",
            c.physical_cores
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        let _ = writeln!(out, "  Logical cores:.........{}", c.logical_cores);
        let _ = writeln!(out, "  CPU max frequency:.....{}", mhz(c.max_mhz));
        let _ = writeln!(out, "  CPU min frequency:.....{}", mhz(c.min_mhz));
        let _ = writeln!(out, "  CPU frequency now:.....{}\n", mhz(Some(c.current_mhz)));

        let m = &self.memory;
        let _ = writeln!(out, "{RULE}\n RAM:");
        let _ = writeln!(out, "  Total RAM:.............{}", format_bytes(m.total));
        let _ = writeln!(out, "  RAM available:.........{}", format_bytes(m.available));
        let _ = writeln!(out, "  RAM used:..............{}", format_bytes(m.used));
        let _ = writeln!(out, "  RAM%:..................{}\n", m.percent_used);

        let st = &self.storage;
        let _ = writeln!(out, "{RULE}\n Storage:");
        for (i, device) in st.partitions.iter().enumerate() {
            let _ = writeln!(out, "  Partition {}:............DISK{} - Device: {}", i + 1, i + 1, device);
        }
        let _ = writeln!(out, "  Working dir HDD:.......{}", format_bytes(st.working_dir_total));
        let _ = writeln!(out, "  Working dir free HDD:..{}\n", format_bytes(st.working_dir_free));

        let _ = writeln!(out, "{RULE}\n GPU:");
        match &self.gpus {
            None => {
                let _ = writeln!(out, "  GPU:...................not queried");
            }
            Some(gpus) => {
                for g in gpus {
                    let _ = writeln!(
                        out,
                        "  GPU {}:.................{} (total {}, free {}, used {})",
                        g.index,
                        g.name,
                        format_bytes(g.memory_total),
                        format_bytes(g.memory_free),
                        format_bytes(g.memory_used)
                    );
                }
            }
        }
        let _ = write!(out, "\n{RULE}");
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
