use serde::{Serialize, Serializer};
use std::fmt;

use super::classify::Mismatch;
use super::compare::{Deviation, Severity};
use crate::pose::Landmark;

/// フレーム数に対する逸脱率の区切り（未満なら該当グレード）
const GRADE_BREAKPOINTS: [(f32, Grade); 3] = [(0.05, Grade::A), (0.15, Grade::BPlus), (0.25, Grade::C)];

/// 関節ランキングを出すのに必要な最小フレーム数（これを超えること）
const MIN_FRAMES_FOR_RANKING: usize = 5;

const TOP_JOINTS: usize = 3;

/// 総合評価。宣言順に良い
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    A,
    BPlus,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_error_rate(error_rate: f32) -> Self {
        GRADE_BREAKPOINTS
            .iter()
            .find(|(limit, _)| error_rate < *limit)
            .map_or(Grade::D, |&(_, grade)| grade)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, Grade::A | Grade::BPlus)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackMessage {
    pub message: String,
    pub severity: Severity,
    pub error_magnitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReport {
    pub grade: Grade,
    /// 優先度順
    pub messages: Vec<FeedbackMessage>,
}

/// 比較結果からグレードと指摘を作る
#[derive(Debug, Clone, Default)]
pub struct FeedbackGenerator;

impl FeedbackGenerator {
    pub fn new() -> Self {
        Self
    }

    /// `tracked_joints` は `joint_errors` の列と同順
    pub fn generate(
        &self,
        deviations: &[Deviation],
        total_frames: usize,
        joint_errors: &[Vec<f32>],
        tracked_joints: &[Landmark],
        mismatch: Option<&Mismatch>,
    ) -> FeedbackReport {
        if let Some(mismatch) = mismatch {
            return Self::mismatch_report(mismatch);
        }

        let error_rate = deviations.len() as f32 / total_frames.max(1) as f32;
        let mut messages = Vec::new();

        if !deviations.is_empty() && joint_errors.len() > MIN_FRAMES_FOR_RANKING {
            let ranked = rank_joints(joint_errors);
            let top: Vec<(usize, f32)> = ranked.into_iter().take(TOP_JOINTS).collect();
            if !top.is_empty() {
                let names: Vec<String> = top
                    .iter()
                    .map(|&(column, _)| joint_name(tracked_joints, column))
                    .collect();
                let magnitude = top.iter().map(|&(_, mean)| mean).sum::<f32>() / top.len() as f32;
                messages.push(FeedbackMessage {
                    message: format!("Most affected joints: {}", names.join(", ")),
                    severity: Severity::Medium,
                    error_magnitude: magnitude,
                });
            }
        }

        FeedbackReport {
            grade: Grade::from_error_rate(error_rate),
            messages,
        }
    }

    fn mismatch_report(mismatch: &Mismatch) -> FeedbackReport {
        let detected = mismatch.detected.map_or("Unknown", |e| e.title());
        FeedbackReport {
            grade: Grade::F,
            messages: vec![FeedbackMessage {
                message: format!(
                    "This exercise resembles {} more than the selected {}.",
                    detected,
                    mismatch.selected.title()
                ),
                severity: Severity::High,
                error_magnitude: 1.0,
            }],
        }
    }
}

/// 列ごとの平均誤差を降順に並べた (列, 平均)
pub fn rank_joints(joint_errors: &[Vec<f32>]) -> Vec<(usize, f32)> {
    let columns = joint_errors.iter().map(Vec::len).max().unwrap_or(0);
    let mut sums = vec![0.0f32; columns];
    for row in joint_errors {
        for (sum, value) in sums.iter_mut().zip(row) {
            *sum += value;
        }
    }
    let frames = joint_errors.len().max(1) as f32;
    let mut ranked: Vec<(usize, f32)> = sums
        .into_iter()
        .map(|sum| sum / frames)
        .enumerate()
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

pub fn joint_name(tracked_joints: &[Landmark], column: usize) -> String {
    tracked_joints
        .get(column)
        .map_or_else(|| format!("joint {}", column), |j| j.name().to_string())
}
