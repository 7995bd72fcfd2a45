use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::exercise::{Exercise, ExerciseProfile};
use crate::pose::{Landmark, TRACKED_JOINTS};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reps: RepConfig,
    /// 種目ごとの上書き。未指定の種目は既定値
    #[serde(default)]
    pub exercises: BTreeMap<Exercise, ExerciseProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// `<exercise>_correct.json` の置き場所
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,
}

fn default_reference_dir() -> PathBuf { PathBuf::from("reference_data") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reference_dir: default_reference_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// 先頭から捨てるフレーム数（撮影開始時の準備動作）
    #[serde(default = "default_warmup_trim")]
    pub warmup_trim: usize,
}

fn default_warmup_trim() -> usize { 60 }

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            warmup_trim: default_warmup_trim(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    /// 時間方向の探索半径（フレーム）
    #[serde(default = "default_window")]
    pub window: usize,
    /// 逸脱を記録しない先頭フレーム数
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: usize,
    /// これ未満の誤差は完全一致とみなす
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f32,
    /// base_threshold の何倍を超えたら high とするか
    #[serde(default = "default_high_severity_factor")]
    pub high_severity_factor: f32,
    #[serde(default = "default_tracked_joints")]
    pub tracked_joints: Vec<Landmark>,
    /// 逸脱がこの件数以下で…
    #[serde(default = "default_sparse_deviation_limit")]
    pub sparse_deviation_limit: usize,
    /// …分類信頼度がこれを超える場合は逸脱を破棄する
    #[serde(default = "default_sparse_confidence")]
    pub sparse_confidence: f32,
}

fn default_window() -> usize { 4 }
fn default_warmup_frames() -> usize { 50 }
fn default_noise_floor() -> f32 { 0.01 }
fn default_high_severity_factor() -> f32 { 1.5 }
fn default_tracked_joints() -> Vec<Landmark> { TRACKED_JOINTS.to_vec() }
fn default_sparse_deviation_limit() -> usize { 2 }
fn default_sparse_confidence() -> f32 { 0.95 }

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            warmup_frames: default_warmup_frames(),
            noise_floor: default_noise_floor(),
            high_severity_factor: default_high_severity_factor(),
            tracked_joints: default_tracked_joints(),
            sparse_deviation_limit: default_sparse_deviation_limit(),
            sparse_confidence: default_sparse_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// これ未満のフレーム数では判定しない
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,
    /// 選択種目と食い違ったときに不一致とする信頼度
    #[serde(default = "default_mismatch_confidence")]
    pub mismatch_confidence: f32,
}

fn default_min_frames() -> usize { 10 }
fn default_mismatch_confidence() -> f32 { 0.6 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_frames: default_min_frames(),
            mismatch_confidence: default_mismatch_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepConfig {
    /// 移動平均の窓幅
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// 「下」判定のパーセンタイル
    #[serde(default = "default_down_percentile")]
    pub down_percentile: f32,
    /// 「上」判定のパーセンタイル
    #[serde(default = "default_up_percentile")]
    pub up_percentile: f32,
    /// これ未満の可動域は Bad
    #[serde(default = "default_min_range_of_motion")]
    pub min_range_of_motion: f32,
    /// これ未満のフレーム数は Partial
    #[serde(default = "default_min_duration")]
    pub min_duration: usize,
}

fn default_smoothing_window() -> usize { 3 }
fn default_down_percentile() -> f32 { 70.0 }
fn default_up_percentile() -> f32 { 30.0 }
fn default_min_range_of_motion() -> f32 { 0.05 }
fn default_min_duration() -> usize { 8 }

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            smoothing_window: default_smoothing_window(),
            down_percentile: default_down_percentile(),
            up_percentile: default_up_percentile(),
            min_range_of_motion: default_min_range_of_motion(),
            min_duration: default_min_duration(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければ既定値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn profile(&self, exercise: Exercise) -> ExerciseProfile {
        self.exercises
            .get(&exercise)
            .copied()
            .unwrap_or_else(|| ExerciseProfile::default_for(exercise))
    }
}
