use serde::{Serialize, Serializer};
use tracing::debug;

use crate::config::RepConfig;
use crate::pose::{Landmark, PoseSequence};

/// 1レップの出来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepQuality {
    Good,
    Partial,
    Bad,
}

impl RepQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepQuality::Good => "Good",
            RepQuality::Partial => "Partial",
            RepQuality::Bad => "Bad",
        }
    }
}

impl Serialize for RepQuality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// フレームごとのレップ状況
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RepRecord {
    /// このフレームまでの完了レップ数
    pub count: u32,
    /// 直近に完了したレップの出来。最初のレップ完了までは `None`
    pub quality: Option<RepQuality>,
}

impl RepRecord {
    /// "" / "Good" / "Partial" / "Bad"
    pub fn label(&self) -> &'static str {
        self.quality.as_ref().map_or("", RepQuality::as_str)
    }
}

/// レップ検出の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepState {
    /// 最初に「下」へ入るまで
    Undetermined,
    Down,
    Up,
}

/// パーセンタイルしきい値による3状態機械
///
/// 画像Y座標は下向きが正なので、値が大きいほど体が下がっている。
#[derive(Debug, Clone)]
struct RepMachine {
    state: RepState,
    down_threshold: f32,
    up_threshold: f32,
    /// 最初に「下」へ入ったフレーム。以降のレップもここから測る
    rep_start: usize,
    count: u32,
    quality: Option<RepQuality>,
}

impl RepMachine {
    fn new(down_threshold: f32, up_threshold: f32) -> Self {
        Self {
            state: RepState::Undetermined,
            down_threshold,
            up_threshold,
            rep_start: 0,
            count: 0,
            quality: None,
        }
    }

    /// 1フレーム進める。レップが完了したら `true`
    fn step(&mut self, index: usize, value: f32) -> bool {
        match self.state {
            RepState::Undetermined if value > self.down_threshold => {
                self.state = RepState::Down;
                self.rep_start = index;
                false
            }
            RepState::Down if value < self.up_threshold => {
                self.state = RepState::Up;
                false
            }
            RepState::Up if value > self.down_threshold => {
                self.state = RepState::Down;
                true
            }
            _ => false,
        }
    }
}

/// 3点移動平均（両端はゼロ埋め）
pub fn moving_average(values: &[f32], window: usize) -> Vec<f32> {
    if window <= 1 {
        return values.to_vec();
    }
    let before = window / 2;
    let after = (window - 1) / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after).min(values.len() - 1);
            values[start..=end].iter().sum::<f32>() / window as f32
        })
        .collect()
}

/// 線形補間によるパーセンタイル（p は 0〜100）
pub fn percentile(values: &[f32], p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f32))
}

/// 代表関節の上下動からレップを数え、可動域と所要フレームで評価する
#[derive(Debug, Clone)]
pub struct RepSegmenter {
    config: RepConfig,
}

impl RepSegmenter {
    pub fn new() -> Self {
        Self::from_config(&RepConfig::default())
    }

    pub fn from_config(config: &RepConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn grade(&self, range_of_motion: f32, duration: usize) -> RepQuality {
        if range_of_motion < self.config.min_range_of_motion {
            RepQuality::Bad
        } else if duration < self.config.min_duration {
            RepQuality::Partial
        } else {
            RepQuality::Good
        }
    }

    /// 代表関節がなければ全フレーム空レコード
    pub fn count(&self, sequence: &PoseSequence, proxy: Option<Landmark>) -> Vec<RepRecord> {
        match proxy {
            Some(landmark) => self.segment(&sequence.vertical_series(landmark)),
            None => vec![RepRecord::default(); sequence.len()],
        }
    }

    /// 生の代表関節Y系列を処理する
    pub fn segment(&self, signal: &[f32]) -> Vec<RepRecord> {
        let smoothed = moving_average(signal, self.config.smoothing_window);
        let (Some(down), Some(up)) = (
            percentile(&smoothed, self.config.down_percentile),
            percentile(&smoothed, self.config.up_percentile),
        ) else {
            return Vec::new();
        };

        let mut machine = RepMachine::new(down, up);
        let mut records = Vec::with_capacity(smoothed.len());
        for (i, &value) in smoothed.iter().enumerate() {
            if machine.step(i, value) {
                let span = &smoothed[machine.rep_start..=i];
                let max = span.iter().copied().fold(f32::MIN, f32::max);
                let min = span.iter().copied().fold(f32::MAX, f32::min);
                machine.quality = Some(self.grade(max - min, i - machine.rep_start));
                machine.count += 1;
            }
            records.push(RepRecord {
                count: machine.count,
                quality: machine.quality,
            });
        }

        debug!(
            frames = records.len(),
            reps = machine.count,
            down_threshold = down,
            up_threshold = up,
            "reps segmented"
        );
        records
    }
}

impl Default for RepSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
