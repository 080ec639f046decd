// src/probe/sys.rs
//! System-level items: hostname, hardware, firmware, uptime, load, memory.

use serde_json::{Map, Value, json};
use sysinfo::System;

use super::{ProbeContext, ProbeError, ProbeFuture, first_line, read_file};

/// Hostname of the gateway. Sites usually replace it with a descriptive
/// name through the override document.
pub fn hostname(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async {
        System::host_name()
            .map(Value::String)
            .ok_or_else(|| ProbeError::missing("hostname"))
    })
}

/// CPU model name.
pub fn hardware_model(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async {
        let mut sys = System::new();
        sys.refresh_cpu();
        let brand = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if brand.is_empty() {
            return Err(ProbeError::missing("cpu model name"));
        }
        Ok(Value::String(brand))
    })
}

/// Number of logical CPUs.
pub fn nproc(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async {
        let mut sys = System::new();
        sys.refresh_cpu();
        match sys.cpus().len() {
            0 => Err(ProbeError::missing("cpu count")),
            n => Ok(json!(n)),
        }
    })
}

pub fn firmware_base(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async { first_line("lsb_release", &["-is"]).await.map(Value::String) })
}

pub fn firmware_release(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async { first_line("lsb_release", &["-rs"]).await.map(Value::String) })
}

/// Seconds since boot.
pub fn uptime(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.proc_file("uptime")).await?;
        parse_uptime(&text).map(|(uptime, _)| json!(uptime))
    })
}

/// Accumulated idle seconds of all CPUs since boot.
pub fn idletime(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.proc_file("uptime")).await?;
        parse_uptime(&text).map(|(_, idle)| json!(idle))
    })
}

/// One-minute load average.
pub fn loadavg(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async { Ok(json!(System::load_average().one)) })
}

/// Memory counters in kB.
pub fn memory(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.proc_file("meminfo")).await?;
        parse_meminfo(&text)
    })
}

/// Running and total scheduling entities.
pub fn processes(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.proc_file("loadavg")).await?;
        parse_processes(&text)
    })
}

/// Parse `/proc/uptime` into `(uptime, idle)` seconds.
pub fn parse_uptime(text: &str) -> Result<(f64, f64), ProbeError> {
    let fields: Vec<f64> = text
        .split_whitespace()
        .map(|f| f.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ProbeError::parse(format!("/proc/uptime: {e}")))?;
    match fields.as_slice() {
        [uptime, idle] => Ok((*uptime, *idle)),
        _ => Err(ProbeError::parse("/proc/uptime: expected two fields")),
    }
}

/// Pick total/free/buffers/cached out of `/proc/meminfo`.
pub fn parse_meminfo(text: &str) -> Result<Value, ProbeError> {
    let mut memory = Map::new();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let name = match key.trim() {
            "MemTotal" => "total",
            "MemFree" => "free",
            "Buffers" => "buffers",
            "Cached" => "cached",
            _ => continue,
        };
        let kb = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| ProbeError::parse(format!("/proc/meminfo: bad {key} line")))?;
        memory.insert(name.to_string(), json!(kb));
    }
    if memory.is_empty() {
        return Err(ProbeError::missing("memory counters in /proc/meminfo"));
    }
    Ok(Value::Object(memory))
}

/// Parse the `running/total` field of `/proc/loadavg`.
pub fn parse_processes(text: &str) -> Result<Value, ProbeError> {
    let field = text
        .split_whitespace()
        .nth(3)
        .ok_or_else(|| ProbeError::parse("/proc/loadavg: missing process field"))?;
    let (running, total) = field
        .split_once('/')
        .ok_or_else(|| ProbeError::parse(format!("/proc/loadavg: '{field}'")))?;
    let count = |s: &str| {
        s.parse::<u64>()
            .map_err(|e| ProbeError::parse(format!("/proc/loadavg: {e}")))
    };
    Ok(json!({ "running": count(running)?, "total": count(total)? }))
}
