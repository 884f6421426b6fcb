//! Accelerator memory probing
//!
//! Falls back through discrete GPU, vendor tooling and host RAM before
//! settling on a fixed default.

use std::process::{Command, Stdio};

use regex::Regex;

/// Assumed memory when nothing can be detected (MB)
pub const DEFAULT_MEMORY_MB: u64 = 4096;

/// Fraction of ROCm-reported VRAM assumed to be free
const ROCM_AVAILABLE_FRACTION: f64 = 0.8;

/// Integrated graphics is assumed to use 1/8 of host RAM
const HOST_RAM_DIVISOR: u64 = 8;

/// Reports memory available to the local model
pub trait MemoryProbe: Send + Sync {
    /// Available accelerator memory in MB
    fn detect_available_memory_mb(&self) -> u64;
}

/// Probes the host using vendor tools and system RAM
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl MemoryProbe for SystemProbe {
    fn detect_available_memory_mb(&self) -> u64 {
        if let Some(mb) = query_nvidia() {
            tracing::info!(available_mb = mb, "NVIDIA GPU detected");
            return mb;
        }

        if let Some(mb) = query_rocm() {
            tracing::info!(available_mb = mb, "AMD GPU detected");
            return mb;
        }

        if let Some(mb) = host_ram_estimate() {
            tracing::info!(estimated_mb = mb, "no discrete GPU, estimating from system RAM");
            return mb;
        }

        tracing::warn!(default_mb = DEFAULT_MEMORY_MB, "could not detect GPU memory");
        DEFAULT_MEMORY_MB
    }
}

/// Run a tool if it is on `PATH`, returning stdout on success
fn run_tool(binary: &str, args: &[&str]) -> Option<String> {
    let path = which::which(binary).ok()?;

    let output = Command::new(path)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!(binary, status = %output.status, "probe tool failed");
        return None;
    }

    String::from_utf8(output.stdout).ok()
}

fn query_nvidia() -> Option<u64> {
    let stdout = run_tool(
        "nvidia-smi",
        &[
            "--query-gpu=memory.total,memory.used",
            "--format=csv,noheader,nounits",
        ],
    )?;
    parse_nvidia_output(&stdout)
}

fn query_rocm() -> Option<u64> {
    let stdout = run_tool("rocm-smi", &["--showmeminfo", "vram"])?;
    parse_rocm_output(&stdout)
}

fn host_ram_estimate() -> Option<u64> {
    let mut system = sysinfo::System::new();
    system.refresh_memory();

    let total_mb = system.total_memory() / (1024 * 1024);
    (total_mb > 0).then_some(total_mb / HOST_RAM_DIVISOR)
}

/// Parse `total, used` from the first line of `nvidia-smi` CSV output
pub(crate) fn parse_nvidia_output(stdout: &str) -> Option<u64> {
    let line = stdout.lines().next()?.trim();
    let (total, used) = line.split_once(',')?;
    let total: u64 = total.trim().parse().ok()?;
    let used: u64 = used.trim().parse().ok()?;
    Some(total.saturating_sub(used))
}

/// Parse the first `Total ... NNN MB` line of `rocm-smi` output
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn parse_rocm_output(stdout: &str) -> Option<u64> {
    let re = Regex::new(r"(\d+)\s*MB").ok()?;

    stdout
        .lines()
        .filter(|line| line.contains("Total") && line.contains("MB"))
        .find_map(|line| re.captures(line)?.get(1)?.as_str().parse::<u64>().ok())
        .map(|total| (total as f64 * ROCM_AVAILABLE_FRACTION) as u64)
}
