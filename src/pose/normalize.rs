use tracing::debug;

use super::keypoint::{FramePose, Landmark, PoseSequence};

/// ゼロ除算防止
const SCALE_EPSILON: f32 = 1e-5;

/// 体格の基準にする4区間（肩幅・腰幅・胴長・脚長）
const BODY_SEGMENTS: [(Landmark, Landmark); 4] = [
    (Landmark::LeftShoulder, Landmark::RightShoulder),
    (Landmark::LeftHip, Landmark::RightHip),
    (Landmark::LeftShoulder, Landmark::LeftHip),
    (Landmark::LeftHip, Landmark::LeftAnkle),
];

/// 体格比正規化済みの姿勢列
///
/// `Normalizer` からのみ生成される。比較器はこの型しか受け取らない。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSequence {
    frames: Vec<FramePose>,
}

impl NormalizedSequence {
    pub fn frames(&self) -> &[FramePose] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// 体格比による姿勢正規化
///
/// カメラ距離や体格の違いを打ち消すため、4区間の平均長で全座標を割る。
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// XY平面上の4区間長の平均
    ///
    /// 欠けているランドマークを含む区間は除外。1区間も取れなければ `None`。
    pub fn body_scale(frame: &FramePose) -> Option<f32> {
        let lengths: Vec<f32> = BODY_SEGMENTS
            .iter()
            .filter_map(|&(a, b)| Some(frame.get(a)?.planar_distance(frame.get(b)?)))
            .collect();
        if lengths.is_empty() {
            return None;
        }
        Some(lengths.iter().sum::<f32>() / lengths.len() as f32)
    }

    /// 1フレームを正規化した新しいフレームを返す
    pub fn normalize_frame(&self, frame: &FramePose) -> FramePose {
        match Self::body_scale(frame) {
            Some(scale) => frame.scaled(1.0 / (scale + SCALE_EPSILON)),
            None => {
                debug!(landmarks = frame.len(), "no body segment available, frame left unscaled");
                frame.clone()
            }
        }
    }

    /// フレームごとに独立して正規化
    pub fn normalize_sequence(&self, sequence: &PoseSequence) -> NormalizedSequence {
        NormalizedSequence {
            frames: sequence.iter().map(|f| self.normalize_frame(f)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;
    use approx::assert_abs_diff_eq;

    /// 肩幅 0.2, 腰幅 0.2, 胴長 0.3, 脚長 0.5 の立位
    fn standing_frame() -> FramePose {
        let mut keypoints = vec![Keypoint::new(0.5, 0.5, 0.0); Landmark::COUNT];
        keypoints[Landmark::LeftShoulder.index()] = Keypoint::new(0.4, 0.2, 0.1);
        keypoints[Landmark::RightShoulder.index()] = Keypoint::new(0.6, 0.2, 0.1);
        keypoints[Landmark::LeftHip.index()] = Keypoint::new(0.4, 0.5, 0.0);
        keypoints[Landmark::RightHip.index()] = Keypoint::new(0.6, 0.5, 0.0);
        keypoints[Landmark::LeftAnkle.index()] = Keypoint::new(0.4, 1.0, -0.2);
        FramePose::new(keypoints)
    }

    #[test]
    fn test_body_scale() {
        let scale = Normalizer::body_scale(&standing_frame()).unwrap();
        assert_abs_diff_eq!(scale, (0.2 + 0.2 + 0.3 + 0.5) / 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_normalize_divides_all_coordinates() {
        let frame = standing_frame();
        let normalized = Normalizer::new().normalize_frame(&frame);
        let divisor = 0.3 + SCALE_EPSILON;
        let ankle = normalized.get(Landmark::LeftAnkle).unwrap();
        assert_abs_diff_eq!(ankle.x, 0.4 / divisor, epsilon = 1e-4);
        assert_abs_diff_eq!(ankle.y, 1.0 / divisor, epsilon = 1e-4);
        assert_abs_diff_eq!(ankle.z, -0.2 / divisor, epsilon = 1e-4);
        // 入力は変更しない
        assert_eq!(frame, standing_frame());
    }

    #[test]
    fn test_scale_invariance() {
        let normalizer = Normalizer::new();
        let frame = standing_frame();
        let base = normalizer.normalize_frame(&frame);
        for k in [0.25_f32, 2.0, 7.5] {
            let scaled = normalizer.normalize_frame(&frame.scaled(k));
            for (a, b) in base.keypoints.iter().zip(scaled.keypoints.iter()) {
                assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-3);
                assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-3);
                assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_partial_frame_uses_available_segments() {
        // 肩だけ残ったフレーム
        let full = standing_frame();
        let frame = FramePose::new(full.keypoints[..13].to_vec());
        let scale = Normalizer::body_scale(&frame).unwrap();
        assert_abs_diff_eq!(scale, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_frame_without_segments_is_unscaled() {
        let frame = FramePose::new(vec![Keypoint::new(0.3, 0.4, 0.5); 5]);
        assert!(Normalizer::body_scale(&frame).is_none());
        assert_eq!(Normalizer::new().normalize_frame(&frame), frame);
    }

    #[test]
    fn test_normalize_sequence_preserves_order() {
        let a = standing_frame();
        let b = a.scaled(3.0);
        let seq = PoseSequence::new(vec![a.clone(), FramePose::default(), b]);
        let normalized = Normalizer::new().normalize_sequence(&seq);
        assert_eq!(normalized.len(), 3);
        assert!(normalized.frames()[1].is_empty());
        assert_eq!(normalized.frames()[0], Normalizer::new().normalize_frame(&a));
    }
}
