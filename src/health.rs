use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::path::Path;
#[cfg(target_os = "linux")]
use std::process;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();
    let active_sessions = state.active_sessions();

    let memory_info = get_memory_info();
    let storage_info = get_storage_info(state.sessions.storage_dir());

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "audio-filter-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_sessions": active_sessions
        },
        "audio": operation_counts(&metrics),
        "memory": memory_info,
        "storage": storage_info,
        "sessions": {
            "active": active_sessions,
            "max_idle_secs": state.sessions.max_age().as_secs(),
            "sweep_interval_secs": config.storage.cleanup_interval_secs
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_sessions": state.active_sessions(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "audio": operation_counts(&metrics),
        "endpoints": endpoint_stats,
        "memory": get_memory_info(),
        "storage": get_storage_info(state.sessions.storage_dir())
    }))
}

fn error_rate(metrics: &AppMetrics) -> f64 {
    if metrics.request_count > 0 {
        metrics.error_count as f64 / metrics.request_count as f64
    } else {
        0.0
    }
}

fn operation_counts(metrics: &AppMetrics) -> serde_json::Value {
    json!({
        "downloads": metrics.downloads,
        "filters_applied": metrics.filters_applied,
        "visualizations_rendered": metrics.visualizations_rendered
    })
}

/// File count and total size of the shared artifact directory.
fn get_storage_info(dir: &Path) -> serde_json::Value {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            return json!({
                "directory": dir.display().to_string(),
                "available": false,
                "error": e.to_string()
            });
        }
    };

    let mut file_count = 0u64;
    let mut total_bytes = 0u64;
    for metadata in entries.flatten().filter_map(|entry| entry.metadata().ok()) {
        if metadata.is_file() {
            file_count += 1;
            total_bytes += metadata.len();
        }
    }

    json!({
        "directory": dir.display().to_string(),
        "available": true,
        "file_count": file_count,
        "total_bytes": total_bytes
    })
}

/// Resident and virtual memory of this process, read from `/proc` on Linux.
fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        let pid = process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        vm_rss = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                    }
                } else if line.starts_with("VmSize:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        vm_size = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                    }
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_info_counts_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a_processed.wav"), [0u8; 100]).unwrap();
        std::fs::write(dir.path().join("b_waveform.png"), [0u8; 28]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let info = get_storage_info(dir.path());
        assert_eq!(info["available"], true);
        assert_eq!(info["file_count"], 2);
        assert_eq!(info["total_bytes"], 128);
    }

    #[test]
    fn test_storage_info_missing_directory() {
        let dir = TempDir::new().unwrap();
        let info = get_storage_info(&dir.path().join("gone"));
        assert_eq!(info["available"], false);
    }

    #[test]
    fn test_error_rate() {
        let mut metrics = AppMetrics::default();
        assert_eq!(error_rate(&metrics), 0.0);
        metrics.request_count = 4;
        metrics.error_count = 1;
        assert_eq!(error_rate(&metrics), 0.25);
    }
}
