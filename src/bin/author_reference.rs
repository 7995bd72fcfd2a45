use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use form_coach::config::Config;
use form_coach::reference::{load_keypoints, ReferenceStore};
use form_coach::Exercise;

/// 正解フォームのキーポイントから参照データを作る
#[derive(Parser, Debug)]
#[command(name = "author_reference", version = env!("GIT_VERSION"))]
struct Args {
    /// 参照動画から抽出したキーポイントJSON
    #[arg(long, value_name = "PATH")]
    keypoints: PathBuf,

    #[arg(long)]
    exercise: Exercise,

    /// 先頭から捨てるフレーム数（省略時は設定値）
    #[arg(long)]
    warmup_trim: Option<usize>,

    /// 出力先ディレクトリ（省略時は設定値）
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    let warmup_trim = args.warmup_trim.unwrap_or(config.extraction.warmup_trim);

    let keypoints = load_keypoints(&args.keypoints)
        .with_context(|| format!("Failed to load keypoints from {}", args.keypoints.display()))?
        .trim_leading(warmup_trim);
    if keypoints.is_empty() {
        bail!("No keypoints found in {}", args.keypoints.display());
    }

    // 正規化で肩・腰・足首を使うため全ランドマークを残す
    let store = ReferenceStore::new(args.out_dir.unwrap_or(config.paths.reference_dir));
    let frames = keypoints.len();
    let path = store.save(args.exercise, keypoints)?;
    println!("参照データを保存: {} ({} フレーム)", path.display(), frames);

    Ok(())
}
