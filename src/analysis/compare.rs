use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ComparisonConfig;
use crate::pose::{FramePose, Landmark, NormalizedSequence};

/// 逸脱の深刻度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// 基準を超えたフレーム
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deviation {
    pub frame: usize,
    /// 最良オフセットでの平均関節誤差
    pub error: f32,
    pub severity: Severity,
}

/// 比較結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct Comparison {
    /// フレーム順
    pub deviations: Vec<Deviation>,
    /// ユーザーフレームと1対1。要素は追跡関節と同順
    pub joint_errors: Vec<Vec<f32>>,
    pub threshold: f32,
    /// 窓内の全候補とランドマーク数が合わなかったフレーム数
    pub skipped_frames: usize,
}

/// 時間窓つき姿勢比較
///
/// 各ユーザーフレームについて参照側の ±window フレームから
/// 平均関節誤差が最小のものを選ぶ。速度差の小さなずれを吸収するための
/// 局所探索で、計算量は O(frames × window × joints)。
#[derive(Debug, Clone)]
pub struct Comparator {
    tracked_joints: Vec<Landmark>,
    base_threshold: f32,
    window: usize,
    warmup_frames: usize,
    noise_floor: f32,
    high_severity_factor: f32,
}

impl Comparator {
    pub fn new(tracked_joints: Vec<Landmark>, base_threshold: f32) -> Self {
        Self::from_config(&ComparisonConfig::default(), base_threshold).with_joints(tracked_joints)
    }

    pub fn from_config(config: &ComparisonConfig, base_threshold: f32) -> Self {
        Self {
            tracked_joints: config.tracked_joints.clone(),
            base_threshold,
            window: config.window,
            warmup_frames: config.warmup_frames,
            noise_floor: config.noise_floor,
            high_severity_factor: config.high_severity_factor,
        }
    }

    pub fn with_joints(mut self, tracked_joints: Vec<Landmark>) -> Self {
        self.tracked_joints = tracked_joints;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_warmup(mut self, warmup_frames: usize) -> Self {
        self.warmup_frames = warmup_frames;
        self
    }

    pub fn tracked_joints(&self) -> &[Landmark] {
        &self.tracked_joints
    }

    /// 2フレーム間の関節ごとの3次元距離
    ///
    /// ランドマーク数が異なる、または追跡関節が欠けている場合は `None`。
    fn joint_distances(&self, user: &FramePose, reference: &FramePose) -> Option<Vec<f32>> {
        if user.len() != reference.len() {
            return None;
        }
        self.tracked_joints
            .iter()
            .map(|&joint| Some(user.get(joint)?.distance(reference.get(joint)?)))
            .collect()
    }

    /// 窓内で平均誤差が最小の (誤差, 関節距離)。同値なら先に見つかったオフセット
    fn best_alignment(
        &self,
        index: usize,
        user: &FramePose,
        reference: &[FramePose],
    ) -> Option<(f32, Vec<f32>)> {
        let start = index.saturating_sub(self.window);
        let end = (index + self.window).min(reference.len().saturating_sub(1));

        let mut best: Option<(f32, Vec<f32>)> = None;
        for candidate in reference.get(start..=end)? {
            let Some(distances) = self.joint_distances(user, candidate) else {
                continue;
            };
            if distances.is_empty() {
                continue;
            }
            let error = distances.iter().sum::<f32>() / distances.len() as f32;
            if best.as_ref().map_or(true, |(b, _)| error < *b) {
                best = Some((error, distances));
            }
        }
        best
    }

    fn severity(&self, error: f32) -> Severity {
        if error > self.base_threshold * self.high_severity_factor {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    pub fn compare(&self, user: &NormalizedSequence, reference: &NormalizedSequence) -> Comparison {
        let user_frames = user.frames();
        let reference_frames = reference.frames();
        let count = user_frames.len().min(reference_frames.len());

        let mut deviations = Vec::new();
        let mut joint_errors = Vec::with_capacity(count);
        let mut skipped_frames = 0;

        for (i, frame) in user_frames.iter().take(count).enumerate() {
            let Some((error, distances)) = self.best_alignment(i, frame, reference_frames) else {
                debug!(frame = i, "shape mismatch against every candidate, frame skipped");
                joint_errors.push(vec![0.0; self.tracked_joints.len()]);
                skipped_frames += 1;
                continue;
            };
            joint_errors.push(distances);

            if i < self.warmup_frames || error < self.noise_floor {
                continue;
            }
            if error > self.base_threshold {
                deviations.push(Deviation {
                    frame: i,
                    error,
                    severity: self.severity(error),
                });
            }
        }

        if count > 0 && skipped_frames == count {
            warn!(frames = count, "every frame skipped on landmark count mismatch");
        }
        debug!(
            frames = count,
            skipped = skipped_frames,
            deviations = deviations.len(),
            threshold = self.base_threshold,
            "comparison finished"
        );

        Comparison {
            deviations,
            joint_errors,
            threshold: self.base_threshold,
            skipped_frames,
        }
    }
}
