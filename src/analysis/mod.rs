pub mod annotate;
pub mod classify;
pub mod compare;
pub mod feedback;
pub mod reps;

pub use annotate::{annotate, deviation_log, DeviationLogEntry, FrameAnnotation};
pub use classify::{Classification, ExerciseClassifier, Mismatch, MotionSignals};
pub use compare::{Comparator, Comparison, Deviation, Severity};
pub use feedback::{FeedbackGenerator, FeedbackMessage, FeedbackReport, Grade};
pub use reps::{RepQuality, RepRecord, RepSegmenter};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResult};
use crate::exercise::Exercise;
use crate::pose::{Landmark, Normalizer, PoseSequence};
use crate::reference::ReferenceStore;

/// 1回の解析結果
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub exercise: Exercise,
    pub frame_count: usize,
    pub classification: Classification,
    pub mismatch: Option<Mismatch>,
    pub feedback: FeedbackReport,
    pub deviations: Vec<Deviation>,
    pub joint_errors: Vec<Vec<f32>>,
    pub threshold: f32,
    /// `joint_errors` の列に対応
    pub tracked_joints: Vec<Landmark>,
    pub reps: Vec<RepRecord>,
}

impl AnalysisReport {
    pub fn grade(&self) -> Grade {
        self.feedback.grade
    }

    pub fn rep_count(&self) -> u32 {
        self.reps.last().map_or(0, |r| r.count)
    }

    pub fn annotations(&self) -> Vec<FrameAnnotation> {
        annotate(self.frame_count, &self.deviations, &self.reps)
    }

    pub fn deviation_log(&self) -> Vec<DeviationLogEntry> {
        deviation_log(&self.deviations, &self.joint_errors, &self.tracked_joints)
    }
}

/// 抽出済みキーポイントから解析レポートを作る
///
/// 1本の動画を同期的に最後まで処理する。実行間で状態は持たない。
pub struct Analyzer {
    config: Config,
    normalizer: Normalizer,
    classifier: ExerciseClassifier,
    segmenter: RepSegmenter,
    feedback: FeedbackGenerator,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self {
            normalizer: Normalizer::new(),
            classifier: ExerciseClassifier::from_config(&config.classifier),
            segmenter: RepSegmenter::from_config(&config.reps),
            feedback: FeedbackGenerator::new(),
            config,
        }
    }

    /// 参照データをストアから読んで解析
    pub fn analyze(
        &self,
        keypoints: &PoseSequence,
        selected: Exercise,
        store: &ReferenceStore,
    ) -> AnalysisResult<AnalysisReport> {
        if keypoints.is_empty() {
            return Err(AnalysisError::NoKeypoints);
        }
        let reference = store.load(selected)?;
        self.analyze_against(keypoints, selected, &reference)
    }

    pub fn analyze_against(
        &self,
        keypoints: &PoseSequence,
        selected: Exercise,
        reference: &PoseSequence,
    ) -> AnalysisResult<AnalysisReport> {
        if keypoints.is_empty() {
            return Err(AnalysisError::NoKeypoints);
        }

        let classification = self.classifier.classify(keypoints);
        let mismatch = self.classifier.mismatch(selected, &classification);

        let profile = self.config.profile(selected);
        let comparator = Comparator::from_config(&self.config.comparison, profile.base_threshold);
        let user = self.normalizer.normalize_sequence(keypoints);
        let reference = self.normalizer.normalize_sequence(reference);
        let mut comparison = comparator.compare(&user, &reference);

        // 高信頼で種目が一致している場合、散発的な逸脱はノイズとみなす
        let sparse = &self.config.comparison;
        if comparison.deviations.len() <= sparse.sparse_deviation_limit
            && classification.confidence > sparse.sparse_confidence
        {
            debug!(dropped = comparison.deviations.len(), "sparse deviations discarded");
            comparison.deviations.clear();
        }

        let feedback = self.feedback.generate(
            &comparison.deviations,
            keypoints.len(),
            &comparison.joint_errors,
            comparator.tracked_joints(),
            mismatch.as_ref(),
        );
        let reps = self.segmenter.count(keypoints, profile.proxy_joint);

        info!(
            exercise = %selected,
            frames = keypoints.len(),
            detected = classification.label(),
            confidence = classification.confidence,
            deviations = comparison.deviations.len(),
            grade = %feedback.grade,
            "analysis finished"
        );

        Ok(AnalysisReport {
            exercise: selected,
            frame_count: keypoints.len(),
            classification,
            mismatch,
            feedback,
            deviations: comparison.deviations,
            joint_errors: comparison.joint_errors,
            threshold: comparison.threshold,
            tracked_joints: comparator.tracked_joints().to_vec(),
            reps,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{FramePose, Keypoint};

    /// 体格スケール約 0.25 の立位。全身を dy だけ上下させる
    fn body_frame(dy: f32) -> FramePose {
        let mut keypoints = vec![Keypoint::new(0.5, 0.4 + dy, 0.0); Landmark::COUNT];
        let mut set = |l: Landmark, x: f32, y: f32| keypoints[l.index()] = Keypoint::new(x, y + dy, 0.0);
        set(Landmark::LeftShoulder, 0.4, 0.3);
        set(Landmark::RightShoulder, 0.6, 0.3);
        set(Landmark::LeftElbow, 0.35, 0.42);
        set(Landmark::RightElbow, 0.65, 0.42);
        set(Landmark::LeftWrist, 0.33, 0.52);
        set(Landmark::RightWrist, 0.67, 0.52);
        set(Landmark::LeftHip, 0.42, 0.55);
        set(Landmark::RightHip, 0.58, 0.55);
        set(Landmark::LeftKnee, 0.42, 0.75);
        set(Landmark::RightKnee, 0.58, 0.75);
        set(Landmark::LeftAnkle, 0.42, 0.95);
        set(Landmark::RightAnkle, 0.58, 0.95);
        FramePose::new(keypoints)
    }

    /// 小さく上下する 120 フレームの列
    fn gentle_sequence(len: usize) -> PoseSequence {
        PoseSequence::new(
            (0..len)
                .map(|t| body_frame(0.02 * (t as f32 * std::f32::consts::TAU / 30.0).sin()))
                .collect(),
        )
    }

    #[test]
    fn test_pushup_wrist_deviation_end_to_end() {
        let reference = gentle_sequence(120);
        let mut user = reference.clone();
        for frame in &mut user.frames[60..=65] {
            frame.keypoints[Landmark::LeftWrist.index()].x += 3.0;
        }

        let report = Analyzer::default()
            .analyze_against(&user, Exercise::Pushup, &reference)
            .unwrap();

        assert!(report.mismatch.is_none());
        let frames: Vec<usize> = report.deviations.iter().map(|d| d.frame).collect();
        assert_eq!(frames, vec![60, 61, 62, 63, 64, 65]);
        assert!(report.deviations.iter().all(|d| d.error > report.threshold));
        assert_eq!(report.joint_errors.len(), 120);

        assert!(matches!(report.grade(), Grade::A | Grade::BPlus));
        assert_eq!(report.feedback.messages.len(), 1);
        let message = &report.feedback.messages[0].message;
        assert!(message.starts_with("Most affected joints: left wrist"), "{}", message);

        let annotations = report.annotations();
        assert_eq!(annotations.len(), 120);
        let flagged: Vec<usize> = annotations.iter().filter(|a| a.deviating).map(|a| a.frame).collect();
        assert_eq!(flagged, frames);

        let log = report.deviation_log();
        assert_eq!(log.len(), 6);
        assert!(log.iter().all(|entry| entry.joint == "left wrist"));
        assert_eq!(report.reps.len(), 120);
    }

    #[test]
    fn test_identical_sequences_grade_a() {
        let seq = gentle_sequence(120);
        let report = Analyzer::default()
            .analyze_against(&seq, Exercise::Squat, &seq)
            .unwrap();
        assert!(report.deviations.is_empty());
        assert_eq!(report.grade(), Grade::A);
        assert!(report.feedback.messages.is_empty());
    }

    #[test]
    fn test_mismatch_returns_f() {
        let user = squat_sequence(40);
        let report = Analyzer::default()
            .analyze_against(&user, Exercise::Press, &user)
            .unwrap();
        assert_eq!(report.classification.exercise, Some(Exercise::Squat));
        assert_eq!(report.grade(), Grade::F);
        assert_eq!(report.feedback.messages.len(), 1);
        assert_eq!(report.feedback.messages[0].severity, Severity::High);
        assert_eq!(report.mismatch.unwrap().selected, Exercise::Press);
    }

    /// 腰が大きく上下する列。squat (0.9) と判定される
    fn squat_sequence(len: usize) -> PoseSequence {
        PoseSequence::new(
            (0..len)
                .map(|t| body_frame(if t % 2 == 0 { 0.0 } else { 0.3 }))
                .collect(),
        )
    }

    fn with_wrist_offsets(reference: &PoseSequence, frames: std::ops::Range<usize>) -> PoseSequence {
        let mut user = reference.clone();
        for frame in &mut user.frames[frames] {
            frame.keypoints[Landmark::LeftWrist.index()].x += 3.0;
        }
        user
    }

    #[test]
    fn test_sparse_deviations_suppressed() {
        let mut config = Config::default();
        config.comparison.sparse_confidence = 0.85;
        let analyzer = Analyzer::new(config);
        let reference = squat_sequence(80);

        let report = analyzer
            .analyze_against(&with_wrist_offsets(&reference, 60..62), Exercise::Squat, &reference)
            .unwrap();
        assert_eq!(report.classification.exercise, Some(Exercise::Squat));
        assert!(report.deviations.is_empty());
        assert_eq!(report.grade(), Grade::A);

        let report = analyzer
            .analyze_against(&with_wrist_offsets(&reference, 60..63), Exercise::Squat, &reference)
            .unwrap();
        let frames: Vec<usize> = report.deviations.iter().map(|d| d.frame).collect();
        assert_eq!(frames, vec![60, 61, 62]);
    }

    #[test]
    fn test_sparse_deviations_kept_at_default_confidence() {
        let reference = squat_sequence(80);
        let report = Analyzer::default()
            .analyze_against(&with_wrist_offsets(&reference, 60..62), Exercise::Squat, &reference)
            .unwrap();
        assert_eq!(report.deviations.len(), 2);
    }

    #[test]
    fn test_reference_layout_mismatch() {
        // 12 点だけの参照。全フレームが比較対象外になる
        let user = gentle_sequence(60);
        let reference = PoseSequence::new(
            user.frames
                .iter()
                .map(|f| FramePose::new(f.keypoints[..12].to_vec()))
                .collect(),
        );
        let report = Analyzer::default()
            .analyze_against(&user, Exercise::Squat, &reference)
            .unwrap();
        assert!(report.deviations.is_empty());
        assert!(report.joint_errors.iter().all(|row| row.iter().all(|e| *e == 0.0)));
        assert_eq!(report.grade(), Grade::A);
    }

    #[test]
    fn test_empty_keypoints() {
        let analyzer = Analyzer::default();
        let reference = gentle_sequence(10);
        assert!(matches!(
            analyzer.analyze_against(&PoseSequence::default(), Exercise::Squat, &reference),
            Err(AnalysisError::NoKeypoints)
        ));
        let store = ReferenceStore::new("no/such/reference_dir");
        assert!(matches!(
            analyzer.analyze(&PoseSequence::default(), Exercise::Squat, &store),
            Err(AnalysisError::NoKeypoints)
        ));
    }

    #[test]
    fn test_missing_reference() {
        let store = ReferenceStore::new("no/such/reference_dir");
        let result = Analyzer::default().analyze(&gentle_sequence(20), Exercise::Deadlift, &store);
        assert!(matches!(result, Err(AnalysisError::MissingReference(Exercise::Deadlift))));
    }

    #[test]
    fn test_empty_reference_is_not_fatal() {
        let report = Analyzer::default()
            .analyze_against(&gentle_sequence(20), Exercise::Squat, &PoseSequence::default())
            .unwrap();
        assert!(report.deviations.is_empty());
        assert!(report.joint_errors.is_empty());
        assert_eq!(report.grade(), Grade::A);
    }

    #[test]
    fn test_exercise_without_proxy_joint() {
        let config: Config = toml::from_str(
            r#"
            [exercises.squat]
            base_threshold = 0.15
            "#,
        )
        .unwrap();
        let seq = gentle_sequence(30);
        let report = Analyzer::new(config)
            .analyze_against(&seq, Exercise::Squat, &seq)
            .unwrap();
        assert_eq!(report.reps, vec![RepRecord::default(); 30]);
        assert_eq!(report.rep_count(), 0);
    }

    #[test]
    fn test_report_serializes() {
        let seq = gentle_sequence(20);
        let report = Analyzer::default()
            .analyze_against(&seq, Exercise::Pushup, &seq)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["exercise"], "pushup");
        assert_eq!(json["feedback"]["grade"], "A");
        assert_eq!(json["tracked_joints"][0], "left_shoulder");
    }
}
