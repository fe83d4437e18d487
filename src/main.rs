// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use snaprs::config::settings::Settings;
use snaprs::domain::services::persistence_service::PersistenceGate;
use snaprs::engines::chromium_engine::ChromiumRenderer;
use snaprs::infrastructure::targets::{self, TargetsFile};
use snaprs::infrastructure::xlsx_table::XlsxTableWriter;
use snaprs::utils::errors::RunError;
use snaprs::utils::telemetry;
use snaprs::workers::CaptureManager;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use validator::Validate;

/// 命令行参数，覆盖配置文件中的同名设置
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target list file, one profile URL per line
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Only capture items posted within this many minutes
    #[arg(short, long)]
    minutes: Option<u32>,

    /// Maximum items captured per target
    #[arg(long)]
    max_items: Option<u32>,

    /// Number of parallel browser workers
    #[arg(short, long)]
    workers: Option<u32>,

    /// Show the browser windows
    #[arg(long)]
    headed: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.targets {
            settings.paths.targets_file = path.clone();
        }
        if let Some(minutes) = self.minutes {
            settings.capture.time_window_minutes = minutes;
        }
        if let Some(max_items) = self.max_items {
            settings.capture.max_items_per_target = max_items;
        }
        if let Some(workers) = self.workers {
            settings.capture.worker_count = workers;
        }
        if self.headed {
            settings.capture.headless = false;
        }
    }
}

/// 主函数
///
/// 加载配置和目标列表，启动一次运行，Ctrl-C 请求停止
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting snaprs...");

    // 2. Load configuration
    let mut settings = Settings::new().map_err(RunError::from)?;
    args.apply(&mut settings);
    settings.validate().map_err(RunError::from)?;
    info!("Configuration loaded");

    // 3. Load targets
    let targets = match targets::load_or_bootstrap(&settings.paths.targets_file).await? {
        TargetsFile::Loaded(targets) => targets,
        TargetsFile::TemplateCreated(path) => {
            warn!(
                "Please add profile URLs to {} and run again",
                path.display()
            );
            return Ok(());
        }
    };

    // 4. Wire collaborators
    let renderer = Arc::new(ChromiumRenderer::new(settings.browser.clone()));
    let writer = Arc::new(XlsxTableWriter::new(settings.persistence.max_column_width));
    let gate = Arc::new(PersistenceGate::new(
        writer,
        settings.retry_policy(),
        settings.persistence.sheet_title.clone(),
        settings.display_zone(),
    ));
    let manager = Arc::new(CaptureManager::new(renderer, gate, settings.run_config()));

    // 5. Ctrl-C requests a stop; repeated presses are no-ops
    let signal_manager = manager.clone();
    let signal_task = tokio::spawn(async move {
        loop {
            match signal::ctrl_c().await {
                Ok(()) => signal_manager.stop(),
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                    break;
                }
            }
        }
    });

    // 6. Run
    let result = manager.run(targets).await;
    signal_task.abort();

    let report = result?;
    if let Some(path) = &report.table_path {
        info!("Table written to {}", path.display());
    }
    if let Some(err) = &report.persistence_error {
        warn!("{} item(s) captured but not saved: {}", report.captured, err);
    }
    info!(outcome = %report.outcome, "Run {} finished", report.run_label);

    Ok(())
}
