//! Parsers for `/proc` pseudo-files.
//!
//! Covers the host files read by the system collector, `/proc/<pid>/stat`
//! for QEMU processes, and the SPL kstat files exposed by ZFS.

pub mod parser;

pub use parser::{
    CpuTimes, MemInfo, ParseError, parse_cpu_times, parse_kstat, parse_kstat_io, parse_meminfo,
    parse_pid_cpu_ticks, parse_uptime,
};
