use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use form_coach::config::Config;
use form_coach::reference::{load_keypoints, ReferenceStore};
use form_coach::{AnalysisReport, Analyzer, Exercise};

const CONFIG_PATH: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "form-coach", version = env!("GIT_VERSION"), about = "Workout form analysis against reference poses")]
struct Args {
    /// 設定ファイル
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// キーポイントを参照フォームと比較する
    Analyze {
        /// 検出器が出力したキーポイントJSON
        #[arg(long, value_name = "PATH")]
        keypoints: PathBuf,

        /// squat / press / deadlift / pushup
        #[arg(long)]
        exercise: Exercise,

        /// レポートをJSONで出力
        #[arg(long)]
        json: bool,
    },
    /// 対応種目と参照データの有無
    Exercises,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    let store = ReferenceStore::new(&config.paths.reference_dir);

    match args.command {
        Command::Analyze { keypoints, exercise, json } => {
            let sequence = load_keypoints(&keypoints)
                .with_context(|| format!("Failed to load keypoints from {}", keypoints.display()))?
                .trim_leading(config.extraction.warmup_trim);

            let analyzer = Analyzer::new(config);
            let report = analyzer.analyze(&sequence, exercise, &store)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Exercises => {
            println!("対応種目 (参照データ: {}):", store.dir().display());
            for (exercise, present) in store.available() {
                let status = if present { "OK" } else { "参照データなし" };
                println!("  {:<10} {}", exercise.title(), status);
            }
        }
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("=== フォーム解析: {} ===", report.exercise.title());
    println!(
        "推定種目: {} (信頼度 {:.2})",
        report.classification.label(),
        report.classification.confidence
    );
    if report.grade().is_passing() {
        println!("評価: {}  良いフォームです", report.grade());
    } else {
        println!("評価: {}", report.grade());
    }
    println!();

    for item in &report.feedback.messages {
        println!("- [{}] {}", item.severity.as_str(), item.message);
    }

    let log = report.deviation_log();
    if !log.is_empty() {
        println!();
        println!("逸脱フレーム (しきい値 {:.2}):", report.threshold);
        for entry in &log {
            println!("  {}", entry);
        }
    }

    println!();
    let last = report.reps.last().copied().unwrap_or_default();
    println!("レップ数: {} (直近: {})", last.count, if last.label().is_empty() { "-" } else { last.label() });
}
