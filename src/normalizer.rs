//! Keypoint normalization
//!
//! Converts one frame of raw detector keypoints into semantic feature records
//! (pose, gesture, head pose, gaze, hand shape, body movement).
//!
//! - Every output value is saturated into its documented range
//! - A record is absent when the keypoints it needs were not detected
//! - Velocity features (hand movement, body sway) and nod detection need the
//!   previous frame, so the normalizer owns a small amount of rolling state.
//!   Call [`KeypointNormalizer::reset`] at session start.

use std::collections::VecDeque;

use crate::config::NormalizerConfig;
use crate::types::{
    ArmPosition, BodyLean, BodyMovementData, EyeOpenness, FrameFeatures, GazeData, GazeDirection,
    GestureData, HandShape, HandShapeData, HeadPoseData, KeypointFrame, Landmark, PoseData,
};

// Pose landmark indices
const POSE_NOSE: usize = 0;
const POSE_LEFT_SHOULDER: usize = 11;
const POSE_RIGHT_SHOULDER: usize = 12;
const POSE_LEFT_WRIST: usize = 15;
const POSE_RIGHT_WRIST: usize = 16;
const POSE_LEFT_HIP: usize = 23;
const POSE_RIGHT_HIP: usize = 24;

// Face mesh landmark indices
const FACE_NOSE_TIP: usize = 4;
const FACE_FOREHEAD: usize = 10;
const FACE_LEFT_EAR: usize = 234;
const FACE_RIGHT_EAR: usize = 454;
const FACE_LEFT_EYE_INNER: usize = 133;
const FACE_LEFT_EYE_OUTER: usize = 33;
const FACE_LEFT_EYE_TOP: usize = 159;
const FACE_LEFT_EYE_BOTTOM: usize = 145;
const FACE_RIGHT_EYE_INNER: usize = 362;
const FACE_RIGHT_EYE_OUTER: usize = 263;
const FACE_RIGHT_EYE_TOP: usize = 386;
const FACE_RIGHT_EYE_BOTTOM: usize = 374;
const FACE_LEFT_IRIS: usize = 468;
const FACE_RIGHT_IRIS: usize = 473;

// Hand landmark indices
const HAND_WRIST: usize = 0;
const HAND_LANDMARK_COUNT: usize = 21;

/// (tip, middle joint, base joint) per finger: thumb, index, middle, ring, pinky
const FINGERS: [(usize, usize, usize); 5] = [
    (4, 3, 2),
    (8, 6, 5),
    (12, 10, 9),
    (16, 14, 13),
    (20, 18, 17),
];

/// Gaze offsets below this magnitude (on both axes) count as looking at the camera
const GAZE_CENTER_TOLERANCE: f64 = 0.3;

/// Minimum eye openness for a gaze to count as looking at the camera
const MIN_EYE_OPENNESS: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point2 {
    x: f64,
    y: f64,
}

impl Point2 {
    fn of(landmark: &Landmark) -> Self {
        Self {
            x: landmark.x,
            y: landmark.y,
        }
    }

    fn distance(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Stateful per-frame feature extractor
#[derive(Debug, Clone)]
pub struct KeypointNormalizer {
    config: NormalizerConfig,
    last_left_wrist: Option<Point2>,
    last_right_wrist: Option<Point2>,
    last_body_center: Option<Point2>,
    pitch_history: VecDeque<f64>,
}

impl Default for KeypointNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl KeypointNormalizer {
    /// Create a normalizer with default nod detection (10 samples, lag 5, threshold 0.3)
    pub fn new() -> Self {
        Self::with_config(NormalizerConfig::default())
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        let capacity = config.pitch_history;
        Self {
            config,
            last_left_wrist: None,
            last_right_wrist: None,
            last_body_center: None,
            pitch_history: VecDeque::with_capacity(capacity),
        }
    }

    /// Forget all rolling state
    pub fn reset(&mut self) {
        self.last_left_wrist = None;
        self.last_right_wrist = None;
        self.last_body_center = None;
        self.pitch_history.clear();
    }

    /// Number of buffered pitch samples
    pub fn pitch_samples(&self) -> usize {
        self.pitch_history.len()
    }

    /// Extract every feature record from one frame
    pub fn normalize(&mut self, frame: &KeypointFrame) -> FrameFeatures {
        let pose = present(&frame.pose);
        let face = present(&frame.face);
        let left_hand = present(&frame.left_hand);
        let right_hand = present(&frame.right_hand);

        FrameFeatures {
            pose: pose.and_then(extract_pose),
            gesture: self.extract_gesture(left_hand, right_hand),
            head_pose: face.and_then(|f| self.extract_head_pose(f)),
            gaze: face.and_then(extract_gaze),
            hand_shape: extract_hand_shape(left_hand, right_hand),
            body_movement: self.extract_body_movement(pose),
        }
    }

    /// Hand movement between two consecutive detections of the same hand.
    ///
    /// A hand missing from this frame clears its stored wrist position, so the
    /// next detection reports zero movement instead of a jump across the gap.
    pub fn extract_gesture(
        &mut self,
        left_hand: Option<&[Landmark]>,
        right_hand: Option<&[Landmark]>,
    ) -> Option<GestureData> {
        let left_wrist = left_hand.and_then(|h| h.get(HAND_WRIST)).map(Point2::of);
        let right_wrist = right_hand.and_then(|h| h.get(HAND_WRIST)).map(Point2::of);

        let left_hand_movement = wrist_movement(&mut self.last_left_wrist, left_wrist);
        let right_hand_movement = wrist_movement(&mut self.last_right_wrist, right_wrist);

        if left_wrist.is_none() && right_wrist.is_none() {
            return None;
        }

        Some(GestureData {
            left_hand_movement,
            right_hand_movement,
            gesture_frequency: unit((left_hand_movement + right_hand_movement) / 2.0),
        })
    }

    /// Head orientation plus nod detection over the pitch history
    pub fn extract_head_pose(&mut self, face: &[Landmark]) -> Option<HeadPoseData> {
        let nose_tip = face.get(FACE_NOSE_TIP)?;
        let forehead = face.get(FACE_FOREHEAD)?;
        let left_ear = face.get(FACE_LEFT_EAR)?;
        let right_ear = face.get(FACE_RIGHT_EAR)?;

        let pitch = signed((nose_tip.y - forehead.y) * 5.0 - 0.5);
        let ear_center_x = (left_ear.x + right_ear.x) / 2.0;
        let yaw = signed((nose_tip.x - ear_center_x) * 10.0);
        let roll = signed((left_ear.y - right_ear.y) * 5.0);

        self.pitch_history.push_back(pitch);
        while self.pitch_history.len() > self.config.pitch_history {
            self.pitch_history.pop_front();
        }

        Some(HeadPoseData {
            pitch,
            yaw,
            roll,
            is_nodding: self.is_nodding(),
        })
    }

    fn is_nodding(&self) -> bool {
        let len = self.pitch_history.len();
        let lag = self.config.nod_lag;
        if lag == 0 || len < lag {
            return false;
        }
        match (self.pitch_history.back(), self.pitch_history.get(len - lag)) {
            (Some(latest), Some(earlier)) => (latest - earlier).abs() > self.config.nod_threshold,
            _ => false,
        }
    }

    /// Arm raise, body lean, and sway of the shoulder center since the previous pose
    pub fn extract_body_movement(&mut self, pose: Option<&[Landmark]>) -> Option<BodyMovementData> {
        let Some(landmarks) = pose else {
            self.last_body_center = None;
            return None;
        };
        let Some(key) = PoseKeypoints::from_landmarks(landmarks) else {
            self.last_body_center = None;
            return None;
        };

        let left_arm_raised = unit((key.left_shoulder.y - key.left_wrist.y) * 3.0);
        let right_arm_raised = unit((key.right_shoulder.y - key.right_wrist.y) * 3.0);

        let shoulder_center = Point2 {
            x: (key.left_shoulder.x + key.right_shoulder.x) / 2.0,
            y: (key.left_shoulder.y + key.right_shoulder.y) / 2.0,
        };
        let hip_center_x = (key.left_hip.x + key.right_hip.x) / 2.0;
        let hip_center_z = (key.left_hip.z + key.right_hip.z) / 2.0;

        let lateral = signed((shoulder_center.x - hip_center_x) * 10.0);
        let forward = signed((hip_center_z - key.nose.z) * 5.0);

        let body_sway = match self.last_body_center {
            Some(previous) => unit(shoulder_center.distance(&previous) * 20.0),
            None => 0.0,
        };
        self.last_body_center = Some(shoulder_center);

        Some(BodyMovementData {
            arm_position: ArmPosition {
                left_arm_raised,
                right_arm_raised,
            },
            body_lean: BodyLean { lateral, forward },
            body_sway,
        })
    }
}

/// Pose landmarks needed by the posture and body movement features
struct PoseKeypoints {
    nose: Landmark,
    left_shoulder: Landmark,
    right_shoulder: Landmark,
    left_wrist: Landmark,
    right_wrist: Landmark,
    left_hip: Landmark,
    right_hip: Landmark,
}

impl PoseKeypoints {
    fn from_landmarks(landmarks: &[Landmark]) -> Option<Self> {
        Some(Self {
            nose: *landmarks.get(POSE_NOSE)?,
            left_shoulder: *landmarks.get(POSE_LEFT_SHOULDER)?,
            right_shoulder: *landmarks.get(POSE_RIGHT_SHOULDER)?,
            left_wrist: *landmarks.get(POSE_LEFT_WRIST)?,
            right_wrist: *landmarks.get(POSE_RIGHT_WRIST)?,
            left_hip: *landmarks.get(POSE_LEFT_HIP)?,
            right_hip: *landmarks.get(POSE_RIGHT_HIP)?,
        })
    }
}

/// Shoulder openness, forward lean, and shoulder levelness
pub fn extract_pose(pose: &[Landmark]) -> Option<PoseData> {
    let key = PoseKeypoints::from_landmarks(pose)?;

    let shoulder_width = (key.right_shoulder.x - key.left_shoulder.x).abs();
    let shoulder_openness = unit(shoulder_width * 2.0);

    let hip_center_z = (key.left_hip.z + key.right_hip.z) / 2.0;
    let lean_angle = signed((hip_center_z - key.nose.z) * 5.0);

    let shoulder_tilt = (key.left_shoulder.y - key.right_shoulder.y).abs();
    let stability = unit(1.0 - shoulder_tilt * 5.0);

    Some(PoseData {
        shoulder_openness,
        lean_angle,
        stability,
    })
}

/// Gaze direction from iris offset and eye openness from lid distance
pub fn extract_gaze(face: &[Landmark]) -> Option<GazeData> {
    let left_inner = face.get(FACE_LEFT_EYE_INNER)?;
    let left_outer = face.get(FACE_LEFT_EYE_OUTER)?;
    let left_top = face.get(FACE_LEFT_EYE_TOP)?;
    let left_bottom = face.get(FACE_LEFT_EYE_BOTTOM)?;
    let right_inner = face.get(FACE_RIGHT_EYE_INNER)?;
    let right_outer = face.get(FACE_RIGHT_EYE_OUTER)?;
    let right_top = face.get(FACE_RIGHT_EYE_TOP)?;
    let right_bottom = face.get(FACE_RIGHT_EYE_BOTTOM)?;

    let left_openness = unit((left_top.y - left_bottom.y).abs() * 20.0);
    let right_openness = unit((right_top.y - right_bottom.y).abs() * 20.0);

    let left_center = Point2 {
        x: (left_inner.x + left_outer.x) / 2.0,
        y: (left_top.y + left_bottom.y) / 2.0,
    };
    let right_center = Point2 {
        x: (right_inner.x + right_outer.x) / 2.0,
        y: (right_top.y + right_bottom.y) / 2.0,
    };

    // Iris landmarks only exist in the refined face mesh
    let (gaze_x, gaze_y) = match (face.get(FACE_LEFT_IRIS), face.get(FACE_RIGHT_IRIS)) {
        (Some(left_iris), Some(right_iris)) => {
            let left_x = (left_iris.x - left_center.x) * 10.0;
            let left_y = (left_iris.y - left_center.y) * 10.0;
            let right_x = (right_iris.x - right_center.x) * 10.0;
            let right_y = (right_iris.y - right_center.y) * 10.0;
            (signed((left_x + right_x) / 2.0), signed((left_y + right_y) / 2.0))
        }
        _ => (0.0, 0.0),
    };

    let looking_at_camera = gaze_x.abs() < GAZE_CENTER_TOLERANCE
        && gaze_y.abs() < GAZE_CENTER_TOLERANCE
        && left_openness > MIN_EYE_OPENNESS;

    Some(GazeData {
        looking_at_camera,
        gaze_direction: GazeDirection {
            x: gaze_x,
            y: gaze_y,
        },
        eye_openness: EyeOpenness {
            left: left_openness,
            right: right_openness,
        },
    })
}

/// Per-hand shape classification; absent when neither hand is usable
pub fn extract_hand_shape(
    left_hand: Option<&[Landmark]>,
    right_hand: Option<&[Landmark]>,
) -> Option<HandShapeData> {
    let left = left_hand.and_then(classify_hand);
    let right = right_hand.and_then(classify_hand);
    if left.is_none() && right.is_none() {
        return None;
    }
    Some(HandShapeData { left, right })
}

/// Classify a hand from which fingers are extended
pub fn classify_hand(landmarks: &[Landmark]) -> Option<HandShape> {
    if landmarks.len() < HAND_LANDMARK_COUNT {
        return None;
    }

    let [thumb, index, middle, ring, pinky] =
        FINGERS.map(|(tip, pip, mcp)| is_finger_extended(landmarks, tip, pip, mcp));

    let finger_count = [thumb, index, middle, ring, pinky]
        .iter()
        .filter(|extended| **extended)
        .count() as u8;

    Some(HandShape {
        is_open: finger_count >= 4,
        is_fist: finger_count <= 1,
        is_peace: index && middle && !ring && !pinky,
        is_pointing: index && !middle && !ring && !pinky,
        is_thumb_up: thumb && !index && !middle && !ring && !pinky,
        finger_count,
    })
}

/// A finger is extended when its tip is above the middle joint and the middle
/// joint is above the base joint (image y grows downwards).
fn is_finger_extended(landmarks: &[Landmark], tip: usize, pip: usize, mcp: usize) -> bool {
    let tip = landmarks[tip].y;
    let pip = landmarks[pip].y;
    let mcp = landmarks[mcp].y;
    tip < pip && pip < mcp
}

fn wrist_movement(last: &mut Option<Point2>, current: Option<Point2>) -> f64 {
    let movement = match (*last, current) {
        (Some(previous), Some(now)) => unit(now.distance(&previous) * 10.0),
        _ => 0.0,
    };
    *last = current;
    movement
}

fn present(landmarks: &Option<Vec<Landmark>>) -> Option<&[Landmark]> {
    landmarks.as_deref().filter(|l| !l.is_empty())
}

/// Saturate into [0, 1]; NaN maps to 0
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Saturate into [-1, 1]; NaN maps to 0
fn signed(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_pose() -> Vec<Landmark> {
        let mut pose = vec![Landmark::default(); 33];
        pose[POSE_NOSE] = Landmark::new(0.5, 0.2, -0.1);
        pose[POSE_LEFT_SHOULDER] = Landmark::new(0.3, 0.4, 0.0);
        pose[POSE_RIGHT_SHOULDER] = Landmark::new(0.7, 0.4, 0.0);
        pose[POSE_LEFT_WRIST] = Landmark::new(0.25, 0.7, 0.0);
        pose[POSE_RIGHT_WRIST] = Landmark::new(0.75, 0.7, 0.0);
        pose[POSE_LEFT_HIP] = Landmark::new(0.4, 0.8, 0.0);
        pose[POSE_RIGHT_HIP] = Landmark::new(0.6, 0.8, 0.0);
        pose
    }

    fn make_test_face(pitch: f64) -> Vec<Landmark> {
        let mut face = vec![Landmark::default(); 478];
        // pitch = (nose.y - forehead.y) * 5 - 0.5
        face[FACE_FOREHEAD] = Landmark::new(0.5, 0.2, 0.0);
        face[FACE_NOSE_TIP] = Landmark::new(0.5, 0.2 + (pitch + 0.5) / 5.0, 0.0);
        face[FACE_LEFT_EAR] = Landmark::new(0.3, 0.4, 0.0);
        face[FACE_RIGHT_EAR] = Landmark::new(0.7, 0.4, 0.0);

        face[FACE_LEFT_EYE_INNER] = Landmark::new(0.44, 0.35, 0.0);
        face[FACE_LEFT_EYE_OUTER] = Landmark::new(0.36, 0.35, 0.0);
        face[FACE_LEFT_EYE_TOP] = Landmark::new(0.40, 0.33, 0.0);
        face[FACE_LEFT_EYE_BOTTOM] = Landmark::new(0.40, 0.37, 0.0);
        face[FACE_RIGHT_EYE_INNER] = Landmark::new(0.56, 0.35, 0.0);
        face[FACE_RIGHT_EYE_OUTER] = Landmark::new(0.64, 0.35, 0.0);
        face[FACE_RIGHT_EYE_TOP] = Landmark::new(0.60, 0.33, 0.0);
        face[FACE_RIGHT_EYE_BOTTOM] = Landmark::new(0.60, 0.37, 0.0);
        face[FACE_LEFT_IRIS] = Landmark::new(0.40, 0.35, 0.0);
        face[FACE_RIGHT_IRIS] = Landmark::new(0.60, 0.35, 0.0);
        face
    }

    fn make_test_hand(wrist_x: f64, wrist_y: f64, extended: [bool; 5]) -> Vec<Landmark> {
        let mut hand = vec![Landmark::new(wrist_x, wrist_y, 0.0); HAND_LANDMARK_COUNT];
        for (finger, (tip, pip, mcp)) in FINGERS.iter().enumerate() {
            hand[*mcp] = Landmark::new(wrist_x, wrist_y - 0.05, 0.0);
            hand[*pip] = Landmark::new(wrist_x, wrist_y - 0.08, 0.0);
            let tip_y = if extended[finger] {
                wrist_y - 0.12
            } else {
                wrist_y - 0.03
            };
            hand[*tip] = Landmark::new(wrist_x, tip_y, 0.0);
        }
        hand
    }

    fn hand_frame(left: Option<(f64, f64)>) -> KeypointFrame {
        KeypointFrame {
            left_hand: left.map(|(x, y)| make_test_hand(x, y, [true; 5])),
            ..Default::default()
        }
    }

    #[test]
    fn test_pose_extraction() {
        let pose = extract_pose(&make_test_pose()).unwrap();

        // Shoulder width 0.4 doubled
        assert!((pose.shoulder_openness - 0.8).abs() < 1e-9);
        // Level shoulders
        assert!((pose.stability - 1.0).abs() < 1e-9);
        // Nose 0.1 closer than hips
        assert!((pose.lean_angle - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pose_missing_keypoints() {
        let short_pose = vec![Landmark::default(); 12];
        assert!(extract_pose(&short_pose).is_none());

        let mut normalizer = KeypointNormalizer::new();
        let features = normalizer.normalize(&KeypointFrame::default());
        assert_eq!(features, FrameFeatures::default());
    }

    #[test]
    fn test_pose_values_saturate() {
        let mut pose = make_test_pose();
        pose[POSE_LEFT_SHOULDER] = Landmark::new(-2.0, 0.0, 0.0);
        pose[POSE_RIGHT_SHOULDER] = Landmark::new(3.0, 5.0, 0.0);
        pose[POSE_NOSE] = Landmark::new(0.5, 0.2, -10.0);

        let data = extract_pose(&pose).unwrap();
        assert_eq!(data.shoulder_openness, 1.0);
        assert_eq!(data.stability, 0.0);
        assert_eq!(data.lean_angle, 1.0);
    }

    #[test]
    fn test_gesture_between_consecutive_detections() {
        let mut normalizer = KeypointNormalizer::new();

        let first = normalizer.normalize(&hand_frame(Some((0.5, 0.5))));
        assert_eq!(first.gesture.unwrap().left_hand_movement, 0.0);

        let second = normalizer.normalize(&hand_frame(Some((0.53, 0.54))));
        let gesture = second.gesture.unwrap();
        // Distance 0.05 scaled by 10
        assert!((gesture.left_hand_movement - 0.5).abs() < 1e-9);
        assert_eq!(gesture.right_hand_movement, 0.0);
        assert!((gesture.gesture_frequency - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_gesture_detection_gap_is_unknown() {
        let mut normalizer = KeypointNormalizer::new();

        normalizer.normalize(&hand_frame(Some((0.1, 0.1))));
        let gap = normalizer.normalize(&hand_frame(None));
        assert!(gap.gesture.is_none());

        // Large jump across the gap must not register as movement
        let after_gap = normalizer.normalize(&hand_frame(Some((0.9, 0.9))));
        let gesture = after_gap.gesture.unwrap();
        assert_eq!(gesture.left_hand_movement, 0.0);
        assert_eq!(gesture.gesture_frequency, 0.0);
    }

    #[test]
    fn test_nodding_needs_five_samples() {
        let mut normalizer = KeypointNormalizer::new();

        // Large swings, but fewer than five samples buffered
        for pitch in [-0.9, 0.9, -0.9, 0.9] {
            let head = normalizer.extract_head_pose(&make_test_face(pitch)).unwrap();
            assert!(!head.is_nodding);
        }

        // Fifth sample differs from the first by 1.8
        let head = normalizer.extract_head_pose(&make_test_face(0.9)).unwrap();
        assert!(head.is_nodding);
    }

    #[test]
    fn test_steady_head_is_not_nodding() {
        let mut normalizer = KeypointNormalizer::new();
        for _ in 0..12 {
            let head = normalizer.extract_head_pose(&make_test_face(0.1)).unwrap();
            assert!(!head.is_nodding);
        }
        assert_eq!(normalizer.pitch_samples(), 10);
    }

    #[test]
    fn test_head_pose_pitch_mapping() {
        let mut normalizer = KeypointNormalizer::new();
        let head = normalizer.extract_head_pose(&make_test_face(0.2)).unwrap();

        assert!((head.pitch - 0.2).abs() < 1e-9);
        assert!(head.yaw.abs() < 1e-9);
        assert!(head.roll.abs() < 1e-9);
    }

    #[test]
    fn test_gaze_centered_iris_looks_at_camera() {
        let gaze = extract_gaze(&make_test_face(0.0)).unwrap();

        assert!(gaze.looking_at_camera);
        assert!(gaze.gaze_direction.x.abs() < 1e-9);
        assert!((gaze.eye_openness.left - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_gaze_averted_or_closed_eyes() {
        let mut face = make_test_face(0.0);
        face[FACE_LEFT_IRIS] = Landmark::new(0.44, 0.35, 0.0);
        face[FACE_RIGHT_IRIS] = Landmark::new(0.64, 0.35, 0.0);
        let averted = extract_gaze(&face).unwrap();
        assert!(!averted.looking_at_camera);
        assert!((averted.gaze_direction.x - 0.4).abs() < 1e-9);

        let mut closed = make_test_face(0.0);
        closed[FACE_LEFT_EYE_TOP] = Landmark::new(0.40, 0.349, 0.0);
        closed[FACE_LEFT_EYE_BOTTOM] = Landmark::new(0.40, 0.351, 0.0);
        assert!(!extract_gaze(&closed).unwrap().looking_at_camera);
    }

    #[test]
    fn test_gaze_without_iris_defaults_to_center() {
        let face: Vec<Landmark> = make_test_face(0.0).into_iter().take(468).collect();
        let gaze = extract_gaze(&face).unwrap();
        assert_eq!(gaze.gaze_direction, GazeDirection { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_hand_shapes() {
        let open = classify_hand(&make_test_hand(0.5, 0.5, [true; 5])).unwrap();
        assert!(open.is_open);
        assert_eq!(open.finger_count, 5);

        let fist = classify_hand(&make_test_hand(0.5, 0.5, [false; 5])).unwrap();
        assert!(fist.is_fist);
        assert_eq!(fist.finger_count, 0);

        let peace =
            classify_hand(&make_test_hand(0.5, 0.5, [false, true, true, false, false])).unwrap();
        assert!(peace.is_peace);
        assert!(!peace.is_pointing);

        let pointing =
            classify_hand(&make_test_hand(0.5, 0.5, [false, true, false, false, false])).unwrap();
        assert!(pointing.is_pointing);

        let thumb_up =
            classify_hand(&make_test_hand(0.5, 0.5, [true, false, false, false, false])).unwrap();
        assert!(thumb_up.is_thumb_up);
        assert!(thumb_up.is_fist);
    }

    #[test]
    fn test_hand_shape_requires_full_hand() {
        let partial = vec![Landmark::default(); 10];
        assert!(classify_hand(&partial).is_none());
        assert!(extract_hand_shape(Some(partial.as_slice()), None).is_none());

        let right = make_test_hand(0.5, 0.5, [true; 5]);
        let data = extract_hand_shape(None, Some(right.as_slice())).unwrap();
        assert!(data.left.is_none());
        assert!(data.right.is_some());
    }

    #[test]
    fn test_body_sway_and_reset_on_gap() {
        let mut normalizer = KeypointNormalizer::new();
        let pose = make_test_pose();

        let first = normalizer.extract_body_movement(Some(pose.as_slice())).unwrap();
        assert_eq!(first.body_sway, 0.0);

        let mut shifted = pose.clone();
        shifted[POSE_LEFT_SHOULDER].x += 0.02;
        shifted[POSE_RIGHT_SHOULDER].x += 0.02;
        let second = normalizer.extract_body_movement(Some(shifted.as_slice())).unwrap();
        assert!((second.body_sway - 0.4).abs() < 1e-9);

        assert!(normalizer.extract_body_movement(None).is_none());
        let after_gap = normalizer.extract_body_movement(Some(pose.as_slice())).unwrap();
        assert_eq!(after_gap.body_sway, 0.0);
    }

    #[test]
    fn test_arm_raise() {
        let mut pose = make_test_pose();
        pose[POSE_LEFT_WRIST] = Landmark::new(0.25, 0.1, 0.0);
        let mut normalizer = KeypointNormalizer::new();
        let movement = normalizer.extract_body_movement(Some(pose.as_slice())).unwrap();

        assert!((movement.arm_position.left_arm_raised - 0.9).abs() < 1e-9);
        assert_eq!(movement.arm_position.right_arm_raised, 0.0);
    }

    #[test]
    fn test_reset_clears_rolling_state() {
        let mut normalizer = KeypointNormalizer::new();
        normalizer.normalize(&hand_frame(Some((0.1, 0.1))));
        for _ in 0..4 {
            normalizer.extract_head_pose(&make_test_face(0.0));
        }

        normalizer.reset();
        assert_eq!(normalizer.pitch_samples(), 0);

        let features = normalizer.normalize(&hand_frame(Some((0.9, 0.9))));
        assert_eq!(features.gesture.unwrap().left_hand_movement, 0.0);
    }

    #[test]
    fn test_nan_input_saturates_to_zero() {
        let mut pose = make_test_pose();
        pose[POSE_LEFT_SHOULDER].x = f64::NAN;
        let data = extract_pose(&pose).unwrap();
        assert_eq!(data.shoulder_openness, 0.0);
    }
}
