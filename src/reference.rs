use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::exercise::Exercise;
use crate::pose::PoseSequence;

// --- ファイル形式 ---

/// `<exercise>_correct.json` の中身
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub keypoints: PoseSequence,
    pub num_frames: usize,
}

impl ReferenceFile {
    pub fn new(keypoints: PoseSequence) -> Self {
        let num_frames = keypoints.len();
        Self { keypoints, num_frames }
    }
}

// --- Load / Save ---

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> AnalysisResult<T> {
    let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AnalysisError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// 外部検出器が出力したキーポイント列（フレームの配列）を読む
pub fn load_keypoints<P: AsRef<Path>>(path: P) -> AnalysisResult<PoseSequence> {
    read_json(path.as_ref())
}

/// 種目名をキーにした正解フォームの置き場
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    dir: PathBuf,
}

impl ReferenceStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, exercise: Exercise) -> PathBuf {
        self.dir.join(format!("{}_correct.json", exercise.name()))
    }

    pub fn contains(&self, exercise: Exercise) -> bool {
        self.path_for(exercise).is_file()
    }

    /// 各種目の参照データ有無
    pub fn available(&self) -> Vec<(Exercise, bool)> {
        Exercise::ALL.iter().map(|&e| (e, self.contains(e))).collect()
    }

    pub fn load(&self, exercise: Exercise) -> AnalysisResult<PoseSequence> {
        let path = self.path_for(exercise);
        if !path.is_file() {
            return Err(AnalysisError::MissingReference(exercise));
        }
        let file: ReferenceFile = read_json(&path)?;
        if file.num_frames != file.keypoints.len() {
            warn!(
                path = %path.display(),
                declared = file.num_frames,
                actual = file.keypoints.len(),
                "reference frame count mismatch, using actual frames"
            );
        }
        Ok(file.keypoints)
    }

    /// オフラインの参照作成用。既存ファイルは置き換える
    pub fn save(&self, exercise: Exercise, keypoints: PoseSequence) -> AnalysisResult<PathBuf> {
        let path = self.path_for(exercise);
        let io_err = |source: std::io::Error| AnalysisError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = ReferenceFile::new(keypoints);
        let json = serde_json::to_string(&file).map_err(|source| AnalysisError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_err)?;
        info!(path = %path.display(), frames = file.num_frames, "reference saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{FramePose, Keypoint};

    fn temp_store(name: &str) -> ReferenceStore {
        let dir = std::env::temp_dir().join(format!("form_coach_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        ReferenceStore::new(dir)
    }

    fn sample_sequence(len: usize) -> PoseSequence {
        PoseSequence::new(
            (0..len)
                .map(|t| FramePose::new(vec![Keypoint::new(t as f32 * 0.5, 0.25, 0.0); 33]))
                .collect(),
        )
    }

    #[test]
    fn test_path_for() {
        let store = ReferenceStore::new("reference_data");
        assert_eq!(
            store.path_for(Exercise::Squat),
            PathBuf::from("reference_data").join("squat_correct.json")
        );
    }

    #[test]
    fn test_missing_reference() {
        let store = temp_store("missing");
        assert!(matches!(
            store.load(Exercise::Press),
            Err(AnalysisError::MissingReference(Exercise::Press))
        ));
        assert!(store.available().iter().all(|(_, present)| !present));
    }

    #[test]
    fn test_save_and_load() {
        let store = temp_store("save_load");
        let seq = sample_sequence(4);
        let path = store.save(Exercise::Deadlift, seq.clone()).unwrap();
        assert!(path.ends_with("deadlift_correct.json"));
        assert_eq!(store.load(Exercise::Deadlift).unwrap(), seq);
        assert!(store.contains(Exercise::Deadlift));
        assert!(!store.contains(Exercise::Squat));
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_file_format() {
        let file = ReferenceFile::new(PoseSequence::new(vec![FramePose::new(vec![Keypoint::new(
            0.5, 0.25, 0.0,
        )])]));
        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(json, r#"{"keypoints":[[[0.5,0.25,0.0]]],"num_frames":1}"#);
    }

    #[test]
    fn test_frame_count_mismatch_uses_actual() {
        let store = temp_store("count_mismatch");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.path_for(Exercise::Pushup),
            r#"{"keypoints":[[[0.1,0.2,0.3]],[[0.4,0.5,0.6]]],"num_frames":7}"#,
        )
        .unwrap();
        assert_eq!(store.load(Exercise::Pushup).unwrap().len(), 2);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_invalid_json() {
        let store = temp_store("invalid");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for(Exercise::Squat), "not json").unwrap();
        assert!(matches!(store.load(Exercise::Squat), Err(AnalysisError::Json { .. })));
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_load_keypoints_missing_file() {
        assert!(matches!(
            load_keypoints("no/such/dump.json"),
            Err(AnalysisError::Io { .. })
        ));
    }
}
