//! Speed extraction from device extension fields.

use crate::{Profile, RawPoint};

/// Instantaneous speed of a point in m/s.
///
/// Searches the profile's speed fields in declared order and takes the first
/// one whose text parses as a float, scaled by the profile's unit
/// multiplier. A point without a usable field has no speed; it is never
/// treated as stationary.
pub fn extract_speed(point: &RawPoint, profile: &Profile) -> Option<f64> {
    profile
        .speed_fields
        .iter()
        .filter_map(|field| point.aux.get(field.qualified_name()))
        .find_map(|text| text.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v * profile.speed_unit_multiplier)
}

/// Speed series of a point sequence, one entry per point.
///
/// A speed already set on the point wins over its extension fields.
pub fn speed_series(points: &[RawPoint], profile: &Profile) -> Vec<Option<f64>> {
    points
        .iter()
        .map(|p| p.speed.or_else(|| extract_speed(p, profile)))
        .collect()
}

/// Fill in `RawPoint::speed` from the auxiliary fields.
///
/// Points that already carry a speed keep it.
pub(crate) fn annotate_speeds(points: &mut [RawPoint], profile: &Profile) {
    for point in points.iter_mut() {
        if point.speed.is_none() {
            point.speed = extract_speed(point, profile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::t0;
    use crate::{ProfileId, SpeedField};

    #[test]
    fn test_garmin_speed_in_m_s() {
        let profile = Profile::builtin(ProfileId::Garmin);
        let point = RawPoint::new(t0(), 42.0, -71.0)
            .with_aux(SpeedField::GarminTrackPointV2.qualified_name(), "13.4");
        assert_eq!(extract_speed(&point, &profile), Some(13.4));
    }

    #[test]
    fn test_mytracks_speed_converted_from_kmh() {
        let profile = Profile::builtin(ProfileId::MyTracks);
        let point = RawPoint::new(t0(), 42.0, -71.0)
            .with_aux(SpeedField::MyTracks.qualified_name(), "36");
        let speed = extract_speed(&point, &profile).unwrap();
        assert!((speed - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_elf_falls_back_to_legacy_field() {
        let profile = Profile::builtin(ProfileId::BadElf);
        let legacy = RawPoint::new(t0(), 42.0, -71.0)
            .with_aux(SpeedField::BadElfLegacy.qualified_name(), "2.5");
        assert_eq!(extract_speed(&legacy, &profile), Some(2.5));

        // Unparseable first field: the next declared field is used.
        let both = RawPoint::new(t0(), 42.0, -71.0)
            .with_aux(SpeedField::BadElfV1.qualified_name(), "n/a")
            .with_aux(SpeedField::BadElfLegacy.qualified_name(), "3.0");
        assert_eq!(extract_speed(&both, &profile), Some(3.0));
    }

    #[test]
    fn test_absent_speed_is_none() {
        let garmin = Profile::builtin(ProfileId::Garmin);
        let plain = RawPoint::new(t0(), 42.0, -71.0);
        assert_eq!(extract_speed(&plain, &garmin), None);

        // The default profile declares no speed fields at all.
        let default = Profile::builtin(ProfileId::Default);
        let tagged = RawPoint::new(t0(), 42.0, -71.0)
            .with_aux(SpeedField::GarminTrackPointV2.qualified_name(), "5.0");
        assert_eq!(extract_speed(&tagged, &default), None);
    }

    #[test]
    fn test_annotate_keeps_existing_speed() {
        let profile = Profile::builtin(ProfileId::Garmin);
        let mut points = vec![
            RawPoint::new(t0(), 42.0, -71.0)
                .with_aux(SpeedField::GarminTrackPointV2.qualified_name(), "4.0"),
            RawPoint {
                speed: Some(9.0),
                ..RawPoint::new(t0(), 42.0, -71.0)
            },
        ];
        annotate_speeds(&mut points, &profile);
        assert_eq!(points[0].speed, Some(4.0));
        assert_eq!(points[1].speed, Some(9.0));
        assert_eq!(
            speed_series(&points, &profile),
            vec![Some(4.0), Some(9.0)]
        );
    }
}
