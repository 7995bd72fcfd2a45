use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// MediaPipe Pose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// インデックス順のランドマーク表
const LANDMARKS: [Landmark; Landmark::COUNT] = {
    use Landmark::*;
    [
        Nose, LeftEyeInner, LeftEye, LeftEyeOuter, RightEyeInner, RightEye, RightEyeOuter,
        LeftEar, RightEar, MouthLeft, MouthRight,
        LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist,
        LeftPinky, RightPinky, LeftIndex, RightIndex, LeftThumb, RightThumb,
        LeftHip, RightHip, LeftKnee, RightKnee, LeftAnkle, RightAnkle,
        LeftHeel, RightHeel, LeftFootIndex, RightFootIndex,
    ]
};

/// 比較対象の主要関節（顔・手指・足先を除く）
pub const TRACKED_JOINTS: [Landmark; 12] = [
    Landmark::LeftShoulder,
    Landmark::RightShoulder,
    Landmark::LeftElbow,
    Landmark::RightElbow,
    Landmark::LeftWrist,
    Landmark::RightWrist,
    Landmark::LeftHip,
    Landmark::RightHip,
    Landmark::LeftKnee,
    Landmark::RightKnee,
    Landmark::LeftAnkle,
    Landmark::RightAnkle,
];

impl Landmark {
    pub const COUNT: usize = 33;

    pub fn from_index(index: usize) -> Option<Self> {
        LANDMARKS.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 解剖学的な名称（フィードバック表示用）
    pub fn name(self) -> &'static str {
        use Landmark::*;
        match self {
            Nose => "nose",
            LeftEyeInner => "left eye (inner)",
            LeftEye => "left eye",
            LeftEyeOuter => "left eye (outer)",
            RightEyeInner => "right eye (inner)",
            RightEye => "right eye",
            RightEyeOuter => "right eye (outer)",
            LeftEar => "left ear",
            RightEar => "right ear",
            MouthLeft => "mouth (left)",
            MouthRight => "mouth (right)",
            LeftShoulder => "left shoulder",
            RightShoulder => "right shoulder",
            LeftElbow => "left elbow",
            RightElbow => "right elbow",
            LeftWrist => "left wrist",
            RightWrist => "right wrist",
            LeftPinky => "left pinky",
            RightPinky => "right pinky",
            LeftIndex => "left index finger",
            RightIndex => "right index finger",
            LeftThumb => "left thumb",
            RightThumb => "right thumb",
            LeftHip => "left hip",
            RightHip => "right hip",
            LeftKnee => "left knee",
            RightKnee => "right knee",
            LeftAnkle => "left ankle",
            RightAnkle => "right ankle",
            LeftHeel => "left heel",
            RightHeel => "right heel",
            LeftFootIndex => "left foot index",
            RightFootIndex => "right foot index",
        }
    }
}

/// 単一キーポイント（カメラ正規化座標）
///
/// JSON 上は `[x, y, z]` の3要素配列
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// 奥行き（腰中点基準の相対値）
    pub z: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// 3次元ユークリッド距離
    pub fn distance(&self, other: &Keypoint) -> f32 {
        (self.to_vector() - other.to_vector()).norm()
    }

    /// XY平面上の距離
    pub fn planar_distance(&self, other: &Keypoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl From<[f32; 3]> for Keypoint {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Keypoint> for [f32; 3] {
    fn from(kp: Keypoint) -> Self {
        [kp.x, kp.y, kp.z]
    }
}

/// 1フレーム分の姿勢
///
/// 検出器の出力順に並んだキーポイント列。通常は 33 点だが、
/// 欠けたフレームもそのまま保持し比較時に判定する。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramePose {
    pub keypoints: Vec<Keypoint>,
}

impl FramePose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints.get(landmark.index())
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.keypoints.iter().map(|kp| kp.scaled(factor)).collect())
    }
}

/// フレーム順の姿勢列
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseSequence {
    pub frames: Vec<FramePose>,
}

impl PoseSequence {
    pub fn new(frames: Vec<FramePose>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FramePose> {
        self.frames.iter()
    }

    /// 先頭のセットアップ区間を落とす
    ///
    /// フレーム数が `count` 以下のときは何もしない。
    pub fn trim_leading(mut self, count: usize) -> Self {
        if self.frames.len() > count {
            self.frames.drain(..count);
        }
        self
    }

    /// 指定ランドマークのY座標系列
    ///
    /// 欠けているフレームは直前の値で埋める（先頭なら 0.0）。
    pub fn vertical_series(&self, landmark: Landmark) -> Vec<f32> {
        let mut last = 0.0;
        self.frames
            .iter()
            .map(|frame| {
                if let Some(kp) = frame.get(landmark) {
                    last = kp.y;
                }
                last
            })
            .collect()
    }
}
