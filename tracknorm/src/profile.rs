//! Device profiles.
//!
//! Each supported recording device maps to a [`Profile`]: a plain
//! configuration record holding its filter parameters, the auxiliary fields
//! that carry its speed, and the ordered list of segment stages to run.
//! Which stages apply to a device is data, not code.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackNormError};

/// Conversion factor from km/h to m/s.
pub const M_S_PER_KMH: f64 = 1.0 / 3.6;

/// Known device signatures, in match priority order.
const DEVICE_SIGNATURES: &[(&str, ProfileId)] = &[
    ("Bad Elf", ProfileId::BadElf),
    ("DriveSmart", ProfileId::Garmin),
    ("myTracks", ProfileId::MyTracks),
];

/// Identifier of a device profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileId {
    #[serde(rename = "bad_elf")]
    BadElf,
    #[serde(rename = "garmin")]
    Garmin,
    #[serde(rename = "mytracks")]
    MyTracks,
    #[serde(rename = "_default")]
    Default,
}

impl ProfileId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileId::BadElf => "bad_elf",
            ProfileId::Garmin => "garmin",
            ProfileId::MyTracks => "mytracks",
            ProfileId::Default => "_default",
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine which profile applies to a file from its creator string.
///
/// Substring match against the known device signatures; the first match
/// wins and anything unrecognized gets [`ProfileId::Default`].
///
/// # Example
/// ```
/// use tracknorm::{resolve_profile, ProfileId};
///
/// assert_eq!(resolve_profile("Bad Elf 2200 GPS Pro+"), ProfileId::BadElf);
/// assert_eq!(resolve_profile("Garmin DriveSmart 65"), ProfileId::Garmin);
/// assert_eq!(resolve_profile("Some Other App"), ProfileId::Default);
/// ```
pub fn resolve_profile(creator: &str) -> ProfileId {
    DEVICE_SIGNATURES
        .iter()
        .find(|(signature, _)| creator.contains(signature))
        .map(|(_, id)| *id)
        .unwrap_or(ProfileId::Default)
}

/// How the rolling median speed is evaluated around each point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingMethod {
    /// One window centered on the point.
    Center,
    /// A backward and a forward window; either one may qualify the point.
    Extended,
}

/// Catalog of vendor extension fields known to carry speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedField {
    /// Garmin TrackPointExtension v2 `speed` (m/s).
    GarminTrackPointV2,
    /// myTracks `speed` (km/h).
    MyTracks,
    /// Bad Elf GpxExtensionsV1 `speed` (m/s).
    BadElfV1,
    /// Older Bad Elf firmware namespace.
    BadElfLegacy,
}

impl SpeedField {
    /// Qualified element name as stored in a point's auxiliary fields.
    pub fn qualified_name(&self) -> &'static str {
        match self {
            SpeedField::GarminTrackPointV2 => {
                "{http://www.garmin.com/xmlschemas/TrackPointExtension/v2}speed"
            }
            SpeedField::MyTracks => "{http://mytracks.stichling.info/myTracksGPX/1/0}speed",
            SpeedField::BadElfV1 => "{http://bad-elf.com/xmlschemas/GpxExtensionsV1}speed",
            SpeedField::BadElfLegacy => "{http://bad-elf.com/xmlschemas}speed",
        }
    }
}

/// A segment-level processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Time travel then teleportation removal.
    RemoveOutliers,
    /// Rolling-median speed filter.
    FilterSpeed,
    /// Trim no-motion runs at the segment edges only.
    Trim,
    /// Split on time gaps at or above `split_gap_threshold_seconds`.
    SplitSegments,
    /// Merge neighbours separated by at most `merge_max_gap_seconds`.
    MergeSegments,
    /// Cut segments to the engine-running intervals of the timelog.
    Timelog,
}

/// Processing parameters for one device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    /// Rolling median speed a point needs to be kept (m/s).
    pub min_speed_m_s: f64,
    /// Number of samples in the rolling median window.
    pub rolling_window: usize,
    pub rolling_method: RollingMethod,
    /// Factor converting the device's speed unit to m/s.
    pub speed_unit_multiplier: f64,
    /// Largest gap (seconds) bridged by the segment merger.
    pub merge_max_gap_seconds: f64,
    /// Smallest gap (seconds) that splits a segment.
    pub split_gap_threshold_seconds: f64,
    /// Angular tolerance of the spherical simplifier (degrees).
    pub simplify_epsilon: f64,
    /// Auxiliary fields searched for speed, in order.
    pub speed_fields: Vec<SpeedField>,
    /// Segment stages, applied in order.
    pub stages: Vec<Stage>,
}

impl Profile {
    /// Built-in profile for a device.
    pub fn builtin(id: ProfileId) -> Self {
        match id {
            ProfileId::BadElf => Self {
                speed_fields: vec![SpeedField::BadElfV1, SpeedField::BadElfLegacy],
                stages: vec![Stage::RemoveOutliers, Stage::FilterSpeed, Stage::SplitSegments],
                ..Self::base(id)
            },
            ProfileId::Garmin => Self {
                speed_fields: vec![SpeedField::GarminTrackPointV2],
                stages: vec![
                    Stage::RemoveOutliers,
                    Stage::MergeSegments,
                    Stage::FilterSpeed,
                    Stage::SplitSegments,
                ],
                ..Self::base(id)
            },
            ProfileId::MyTracks => Self {
                min_speed_m_s: 4.0,
                rolling_method: RollingMethod::Extended,
                speed_unit_multiplier: M_S_PER_KMH,
                speed_fields: vec![SpeedField::MyTracks],
                stages: vec![
                    Stage::RemoveOutliers,
                    Stage::MergeSegments,
                    Stage::FilterSpeed,
                    Stage::SplitSegments,
                ],
                ..Self::base(id)
            },
            ProfileId::Default => Self::base(id),
        }
    }

    fn base(id: ProfileId) -> Self {
        Self {
            id,
            min_speed_m_s: 0.4,
            rolling_window: 5,
            rolling_method: RollingMethod::Center,
            speed_unit_multiplier: 1.0,
            merge_max_gap_seconds: 60.0,
            split_gap_threshold_seconds: 600.0,
            simplify_epsilon: 0.000002,
            speed_fields: Vec::new(),
            stages: vec![Stage::RemoveOutliers, Stage::SplitSegments],
        }
    }

    /// Reject parameter values the stages cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(TrackNormError::Config { message });

        if self.rolling_window == 0 {
            return invalid(format!("profile {}: rolling_window must be at least 1", self.id));
        }
        if !self.speed_unit_multiplier.is_finite() || self.speed_unit_multiplier <= 0.0 {
            return invalid(format!(
                "profile {}: speed_unit_multiplier must be positive",
                self.id
            ));
        }
        for (name, value) in [
            ("min_speed_m_s", self.min_speed_m_s),
            ("merge_max_gap_seconds", self.merge_max_gap_seconds),
            ("split_gap_threshold_seconds", self.split_gap_threshold_seconds),
            ("simplify_epsilon", self.simplify_epsilon),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("profile {}: {} must be non-negative", self.id, name));
            }
        }
        Ok(())
    }
}

/// Partial profile read from configuration; unset fields keep the
/// built-in value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverride {
    pub min_speed_m_s: Option<f64>,
    pub rolling_window: Option<usize>,
    pub rolling_method: Option<RollingMethod>,
    pub speed_unit_multiplier: Option<f64>,
    pub merge_max_gap_seconds: Option<f64>,
    pub split_gap_threshold_seconds: Option<f64>,
    pub simplify_epsilon: Option<f64>,
    pub speed_fields: Option<Vec<SpeedField>>,
    pub stages: Option<Vec<Stage>>,
}

impl ProfileOverride {
    fn apply(&self, mut profile: Profile) -> Profile {
        if let Some(v) = self.min_speed_m_s {
            profile.min_speed_m_s = v;
        }
        if let Some(v) = self.rolling_window {
            profile.rolling_window = v;
        }
        if let Some(v) = self.rolling_method {
            profile.rolling_method = v;
        }
        if let Some(v) = self.speed_unit_multiplier {
            profile.speed_unit_multiplier = v;
        }
        if let Some(v) = self.merge_max_gap_seconds {
            profile.merge_max_gap_seconds = v;
        }
        if let Some(v) = self.split_gap_threshold_seconds {
            profile.split_gap_threshold_seconds = v;
        }
        if let Some(v) = self.simplify_epsilon {
            profile.simplify_epsilon = v;
        }
        if let Some(v) = &self.speed_fields {
            profile.speed_fields = v.clone();
        }
        if let Some(v) = &self.stages {
            profile.stages = v.clone();
        }
        profile
    }
}

/// The fixed profile table: built-in profiles plus configured overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileTable {
    pub bad_elf: ProfileOverride,
    pub garmin: ProfileOverride,
    pub mytracks: ProfileOverride,
    #[serde(rename = "_default")]
    pub default: ProfileOverride,
}

impl ProfileTable {
    /// Effective profile for a device.
    pub fn profile(&self, id: ProfileId) -> Profile {
        let overrides = match id {
            ProfileId::BadElf => &self.bad_elf,
            ProfileId::Garmin => &self.garmin,
            ProfileId::MyTracks => &self.mytracks,
            ProfileId::Default => &self.default,
        };
        overrides.apply(Profile::builtin(id))
    }

    /// Resolve the creator string and return the effective profile.
    pub fn resolve(&self, creator: &str) -> Profile {
        self.profile(resolve_profile(creator))
    }

    /// Validate every effective profile.
    pub fn validate(&self) -> Result<()> {
        [
            ProfileId::BadElf,
            ProfileId::Garmin,
            ProfileId::MyTracks,
            ProfileId::Default,
        ]
        .into_iter()
        .try_for_each(|id| self.profile(id).validate())
    }
}
