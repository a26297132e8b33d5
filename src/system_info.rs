use serde::Serialize;
use sysinfo::System;

use crate::config::Config;
use crate::ffmpeg;
use crate::process::SubprocessRunner;

#[derive(Serialize, Debug)]
pub struct SystemInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    pub cpu_model: String,
    pub memory_total_gb: f64,
    pub memory_free_gb: f64,
    pub ffmpeg: String,
}

pub async fn get_system_info(runner: &SubprocessRunner) -> SystemInfo {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let ffmpeg_version = ffmpeg::check_ffmpeg_available(runner)
        .await
        .unwrap_or_else(|_| "not available".to_string());

    let cpu_model = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpus: system.cpus().len(),
        cpu_model,
        memory_total_gb: system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        memory_free_gb: system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        ffmpeg: ffmpeg_version,
    }
}

pub async fn print_startup_info(config: &Config, runner: &SubprocessRunner) {
    let sys_info = get_system_info(runner).await;

    println!("{}", "=".repeat(60));
    println!("🚀 Video Upload Backend v{}", sys_info.version);
    println!("{}", "=".repeat(60));
    println!("📊 System Information:");
    println!("  Platform: {} ({})", sys_info.platform, sys_info.arch);
    println!("  CPUs: {} ({})", sys_info.cpus, sys_info.cpu_model);
    println!(
        "  Memory: {:.2} GB total, {:.2} GB free",
        sys_info.memory_total_gb, sys_info.memory_free_gb
    );
    println!("  Transcoder: {} ({})", runner.program(), sys_info.ffmpeg);
    println!(
        "  Encoding: {} crf {}, timeout: {}",
        config.transcoder.video_codec,
        config.transcoder.crf,
        match config.transcoder.timeout_secs {
            0 => "none".to_string(),
            secs => format!("{}s", secs),
        }
    );
    println!("  Metadata policy: {:?}", config.metadata.failure_policy);
    println!("  Originals Dir: {:?}", config.originals_dir);
    println!("  Compressed Dir: {:?}", config.compressed_dir);
    println!("{}", "=".repeat(60));
}
