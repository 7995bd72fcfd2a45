use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;
use crate::pose::Landmark;

/// 対応種目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exercise {
    Squat,
    Press,
    Deadlift,
    Pushup,
}

impl Exercise {
    pub const ALL: [Exercise; 4] = [
        Exercise::Squat,
        Exercise::Press,
        Exercise::Deadlift,
        Exercise::Pushup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Exercise::Squat => "squat",
            Exercise::Press => "press",
            Exercise::Deadlift => "deadlift",
            Exercise::Pushup => "pushup",
        }
    }

    /// 表示用（先頭大文字）
    pub fn title(self) -> &'static str {
        match self {
            Exercise::Squat => "Squat",
            Exercise::Press => "Press",
            Exercise::Deadlift => "Deadlift",
            Exercise::Pushup => "Pushup",
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Exercise {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Exercise::ALL
            .into_iter()
            .find(|e| e.name() == lower)
            .ok_or_else(|| AnalysisError::UnknownExercise(s.to_string()))
    }
}

/// 種目ごとの判定パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    /// 逸脱とみなす平均関節誤差（正規化単位）
    pub base_threshold: f32,
    /// レップ計測に使う代表関節。未設定ならレップは数えない
    #[serde(default)]
    pub proxy_joint: Option<Landmark>,
}

impl ExerciseProfile {
    /// 既定の種目表
    pub fn default_for(exercise: Exercise) -> Self {
        let (base_threshold, proxy_joint) = match exercise {
            Exercise::Squat => (0.15, Landmark::RightHip),
            Exercise::Press => (0.15, Landmark::LeftWrist),
            Exercise::Deadlift => (0.6, Landmark::RightHip),
            Exercise::Pushup => (0.5, Landmark::LeftShoulder),
        };
        Self {
            base_threshold,
            proxy_joint: Some(proxy_joint),
        }
    }
}
