use crate::error::{Field, PipelineError};
use crate::types::{Category, RawExtraction, Sex, ValidatedAttributes};

/// (low, high, decade) age brackets, inclusive on both ends, checked in order.
pub const AGE_BRACKETS: [(u32, u32, &str); 7] = [
    (21, 30, "20"),
    (31, 40, "30"),
    (41, 50, "40"),
    (51, 60, "50"),
    (61, 70, "60"),
    (71, 80, "70"),
    (81, 90, "80"),
];

pub fn categorize(sex: Sex, age: u32) -> Option<Category> {
    AGE_BRACKETS
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&age))
        .map(|(_, _, decade)| Category::new(sex, decade))
}

/// Completeness check followed by categorization.
///
/// A zero age or time is treated the same as an absent one: the extraction
/// payload has no way to say "unset" apart from null, and a zero is never a
/// usable value for either.
pub fn validate(raw: &RawExtraction) -> Result<ValidatedAttributes, PipelineError> {
    let age = raw.age.filter(|a| *a != 0);
    let time = raw.five_km_seconds.filter(|t| *t != 0);

    let mut missing = Vec::new();
    if raw.sex.is_none() {
        missing.push(Field::Sex);
    }
    if age.is_none() {
        missing.push(Field::Age);
    }
    if time.is_none() {
        missing.push(Field::FiveKmTime);
    }

    match (raw.sex, age, time) {
        (Some(sex), Some(age), Some(five_km_seconds)) => {
            let category = categorize(sex, age).ok_or(PipelineError::UnsupportedAge(age))?;
            Ok(ValidatedAttributes {
                sex,
                age,
                five_km_seconds,
                category,
            })
        }
        _ => Err(PipelineError::MissingFields(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sex: Option<Sex>, age: Option<u32>, t: Option<u32>) -> RawExtraction {
        RawExtraction {
            sex,
            age,
            five_km_seconds: t,
        }
    }

    #[test]
    fn every_supported_age_lands_in_its_decade() {
        for sex in [Sex::Male, Sex::Female] {
            for age in 21..=90u32 {
                let decade = ((age - 1) / 10) * 10;
                let cat = categorize(sex, age).expect("age in range");
                assert_eq!(cat.as_str(), format!("{}{}", sex.code(), decade));
            }
        }
    }

    #[test]
    fn bracket_edges() {
        assert_eq!(categorize(Sex::Male, 20), None);
        assert_eq!(categorize(Sex::Male, 91), None);
        assert_eq!(categorize(Sex::Male, 0), None);
        assert_eq!(categorize(Sex::Female, 90).unwrap().as_str(), "F80");
        assert_eq!(categorize(Sex::Male, 21).unwrap().as_str(), "M20");
        assert_eq!(categorize(Sex::Male, 30).unwrap().as_str(), "M20");
        assert_eq!(categorize(Sex::Male, 31).unwrap().as_str(), "M30");
    }

    #[test]
    fn names_only_the_missing_fields() {
        let err = validate(&raw(Some(Sex::Male), None, Some(1400))).unwrap_err();
        match err {
            PipelineError::MissingFields(f) => assert_eq!(f, vec![Field::Age]),
            other => panic!("unexpected {:?}", other),
        }

        let err = validate(&raw(None, Some(32), Some(1400))).unwrap_err();
        match err {
            PipelineError::MissingFields(f) => assert_eq!(f, vec![Field::Sex]),
            other => panic!("unexpected {:?}", other),
        }

        let err = validate(&raw(Some(Sex::Female), Some(32), None)).unwrap_err();
        match err {
            PipelineError::MissingFields(f) => assert_eq!(f, vec![Field::FiveKmTime]),
            other => panic!("unexpected {:?}", other),
        }

        let err = validate(&raw(None, None, None)).unwrap_err();
        match err {
            PipelineError::MissingFields(f) => {
                assert_eq!(f, vec![Field::Sex, Field::Age, Field::FiveKmTime])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_counts_as_missing() {
        let err = validate(&raw(Some(Sex::Female), Some(0), Some(0))).unwrap_err();
        match err {
            PipelineError::MissingFields(f) => assert_eq!(f, vec![Field::Age, Field::FiveKmTime]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn out_of_range_age_is_rejected() {
        let err = validate(&raw(Some(Sex::Male), Some(18), Some(1500))).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedAge(18)));
        let err = validate(&raw(Some(Sex::Male), Some(95), Some(1500))).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedAge(95)));
    }

    #[test]
    fn complete_record_validates() {
        let v = validate(&raw(Some(Sex::Male), Some(32), Some(1455))).unwrap();
        assert_eq!(v.category.as_str(), "M30");
        assert_eq!(v.age, 32);
        assert_eq!(v.five_km_seconds, 1455);
    }
}
