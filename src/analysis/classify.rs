use serde::Serialize;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::exercise::Exercise;
use crate::pose::{Landmark, PoseSequence};

/// 判定不能時の信頼度
const UNKNOWN_CONFIDENCE: f32 = 0.4;

/// 種目推定の結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// `None` は unknown
    pub exercise: Option<Exercise>,
    pub confidence: f32,
}

impl Classification {
    pub fn unknown(confidence: f32) -> Self {
        Self {
            exercise: None,
            confidence,
        }
    }

    pub fn label(&self) -> &'static str {
        self.exercise.map_or("unknown", Exercise::name)
    }
}

/// 選択種目と推定種目の食い違い
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mismatch {
    pub selected: Exercise,
    pub detected: Option<Exercise>,
    pub confidence: f32,
}

/// 部位ごとの上下動の大きさ（フレーム間 |Δy| の平均）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSignals {
    pub shoulder: f32,
    pub hip: f32,
    pub wrist: f32,
}

impl MotionSignals {
    pub fn measure(sequence: &PoseSequence) -> Self {
        Self {
            shoulder: mean_vertical_motion(sequence, &[Landmark::LeftShoulder, Landmark::RightShoulder]),
            hip: mean_vertical_motion(sequence, &[Landmark::LeftHip, Landmark::RightHip]),
            wrist: mean_vertical_motion(sequence, &[Landmark::LeftWrist, Landmark::RightWrist]),
        }
    }
}

/// 隣接フレームの両方に存在するランドマークのみ集計する
fn mean_vertical_motion(sequence: &PoseSequence, landmarks: &[Landmark]) -> f32 {
    let mut total = 0.0;
    let mut samples = 0usize;
    for pair in sequence.frames.windows(2) {
        for &landmark in landmarks {
            if let (Some(prev), Some(next)) = (pair[0].get(landmark), pair[1].get(landmark)) {
                total += (next.y - prev.y).abs();
                samples += 1;
            }
        }
    }
    if samples == 0 {
        0.0
    } else {
        total / samples as f32
    }
}

/// 振幅しきい値による種目推定（学習済み分類器ではない）
#[derive(Debug, Clone)]
pub struct ExerciseClassifier {
    min_frames: usize,
    mismatch_confidence: f32,
}

impl ExerciseClassifier {
    pub fn new() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            min_frames: config.min_frames,
            mismatch_confidence: config.mismatch_confidence,
        }
    }

    /// 上から順に評価する決定リスト
    pub fn decide(signals: &MotionSignals) -> Classification {
        let MotionSignals { shoulder, hip, wrist } = *signals;
        let (exercise, confidence) = if hip > 0.2 {
            (Exercise::Squat, 0.9)
        } else if shoulder > 0.15 && wrist > 0.1 {
            (Exercise::Press, 0.85)
        } else if hip > 0.1 && shoulder > 0.1 {
            (Exercise::Deadlift, 0.8)
        } else if shoulder > 0.15 && wrist < 0.03 {
            (Exercise::Pushup, 0.75)
        } else {
            return Classification::unknown(UNKNOWN_CONFIDENCE);
        };
        Classification {
            exercise: Some(exercise),
            confidence,
        }
    }

    pub fn classify(&self, sequence: &PoseSequence) -> Classification {
        if sequence.len() < self.min_frames {
            return Classification::unknown(0.0);
        }
        let signals = MotionSignals::measure(sequence);
        let classification = Self::decide(&signals);
        debug!(
            shoulder = signals.shoulder,
            hip = signals.hip,
            wrist = signals.wrist,
            detected = classification.label(),
            confidence = classification.confidence,
            "exercise classified"
        );
        classification
    }

    /// 推定が選択と異なり、かつ十分な信頼度があるとき
    pub fn mismatch(&self, selected: Exercise, classification: &Classification) -> Option<Mismatch> {
        if classification.exercise != Some(selected)
            && classification.confidence > self.mismatch_confidence
        {
            Some(Mismatch {
                selected,
                detected: classification.exercise,
                confidence: classification.confidence,
            })
        } else {
            None
        }
    }
}

impl Default for ExerciseClassifier {
    fn default() -> Self {
        Self::new()
    }
}
