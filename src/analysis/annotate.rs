use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::compare::Deviation;
use super::feedback::joint_name;
use super::reps::RepRecord;
use crate::pose::Landmark;

/// オーバーレイ描画用の1フレーム分の情報
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnnotation {
    pub frame: usize,
    /// 逸脱フレームなら赤で描く
    pub deviating: bool,
    pub rep_count: u32,
    /// "" / "Good" / "Partial" / "Bad"
    pub quality: &'static str,
}

impl FrameAnnotation {
    /// "Rep 3: Good"
    pub fn rep_label(&self) -> String {
        format!("Rep {}: {}", self.rep_count, self.quality)
    }
}

/// フレーム数ぶんの注釈を作る
///
/// レップ記録が短い場合、足りないフレームは 0 回・空ラベル。
pub fn annotate(frame_count: usize, deviations: &[Deviation], reps: &[RepRecord]) -> Vec<FrameAnnotation> {
    let flagged: HashSet<usize> = deviations.iter().map(|d| d.frame).collect();
    (0..frame_count)
        .map(|frame| {
            let rep = reps.get(frame).copied().unwrap_or_default();
            FrameAnnotation {
                frame,
                deviating: flagged.contains(&frame),
                rep_count: rep.count,
                quality: rep.label(),
            }
        })
        .collect()
}

/// 逸脱フレームで最も誤差の大きい関節
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationLogEntry {
    pub frame: usize,
    pub joint: String,
    pub joint_error: f32,
    pub total_error: f32,
}

impl fmt::Display for DeviationLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {} -- MAX error at {} = {:.2} -- total error = {:.2}",
            self.frame, self.joint, self.joint_error, self.total_error
        )
    }
}

pub fn deviation_log(
    deviations: &[Deviation],
    joint_errors: &[Vec<f32>],
    tracked_joints: &[Landmark],
) -> Vec<DeviationLogEntry> {
    deviations
        .iter()
        .filter_map(|d| {
            let errors = joint_errors.get(d.frame)?;
            let (column, &joint_error) = errors
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))?;
            Some(DeviationLogEntry {
                frame: d.frame,
                joint: joint_name(tracked_joints, column),
                joint_error,
                total_error: d.error,
            })
        })
        .collect()
}
