//! crates/pcas_core/src/sections.rs
//!
//! The four application sections, their endpoints, and the policy that turns a set
//! of form values into a completion status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::FormValues;

/// Largest accepted profile photo, in bytes.
pub const PHOTO_MAX_BYTES: u64 = 5 * 1024 * 1024;

//=========================================================================================
// Section
//=========================================================================================

/// One form section of the application, in the order the user fills them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Profile,
    Family,
    Education,
    Extracurricular,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Profile,
        Section::Family,
        Section::Education,
        Section::Extracurricular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Family => "family",
            Self::Education => "education",
            Self::Extracurricular => "extracurricular",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Family => "Family",
            Self::Education => "Education",
            Self::Extracurricular => "Extracurricular",
        }
    }

    /// Key of the record inside the response `data` object, e.g. `data.profile`.
    pub fn data_key(self) -> &'static str {
        self.as_str()
    }

    pub fn fetch_path(self) -> &'static str {
        match self {
            Self::Profile => "/api/application/get-profile",
            Self::Family => "/api/application/get-family",
            Self::Education => "/api/application/get-education",
            Self::Extracurricular => "/api/application/get-extracurricular",
        }
    }

    pub fn save_path(self) -> &'static str {
        match self {
            Self::Profile => "/api/application/create-or-update-profile",
            Self::Family => "/api/application/create-or-update-family",
            Self::Education => "/api/application/create-or-update-education",
            Self::Extracurricular => "/api/application/create-or-update-extracurricular",
        }
    }

    /// The section "save and continue" moves on to. `None` after the last one.
    pub fn next(self) -> Option<Section> {
        match self {
            Self::Profile => Some(Self::Family),
            Self::Family => Some(Self::Education),
            Self::Education => Some(Self::Extracurricular),
            Self::Extracurricular => None,
        }
    }

    /// Fields that must be non-blank for the section to count as complete.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Profile => &[
                "firstName",
                "lastName",
                "address",
                "primaryLang",
                "citizen",
                "cnic",
                "gender",
                "dob",
                "maritalStatus",
                "phone",
                "photoName",
            ],
            Self::Family => &["fatherName", "motherName", "fatherOccupation"],
            Self::Education => &[
                "matricGrades",
                "matricPicName",
                "fscGrades",
                "fscPicName",
                "collegeName",
            ],
            Self::Extracurricular => &["clubs"],
        }
    }

    /// The built-in completeness predicate for this section.
    pub fn is_complete(self, values: &FormValues) -> bool {
        let required = self
            .required_fields()
            .iter()
            .all(|field| is_filled(values, field));
        match self {
            Self::Profile => required && photo_size_ok(values),
            _ => required,
        }
    }

    /// True when at least one required field carries a value.
    pub fn is_started(self, values: &FormValues) -> bool {
        self.required_fields()
            .iter()
            .any(|field| is_filled(values, field))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

fn is_filled(values: &FormValues, field: &str) -> bool {
    values.get(field).is_some_and(|v| !v.trim().is_empty())
}

fn photo_size_ok(values: &FormValues) -> bool {
    values
        .get("photoBytes")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .is_some_and(|bytes| bytes > 0 && bytes <= PHOTO_MAX_BYTES)
}

//=========================================================================================
// Status
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl FormStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which labels a section reports for its three fill levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLabels {
    pub complete: FormStatus,
    pub incomplete: FormStatus,
    pub empty: FormStatus,
}

impl StatusLabels {
    pub const UNIFORM: StatusLabels = StatusLabels {
        complete: FormStatus::Complete,
        incomplete: FormStatus::InProgress,
        empty: FormStatus::NotStarted,
    };

    /// The labels the first release of each form page used.
    pub fn legacy(section: Section) -> Self {
        match section {
            Section::Profile => Self {
                complete: FormStatus::Complete,
                incomplete: FormStatus::InProgress,
                empty: FormStatus::InProgress,
            },
            _ => Self {
                complete: FormStatus::InProgress,
                incomplete: FormStatus::NotStarted,
                empty: FormStatus::NotStarted,
            },
        }
    }
}

/// Selects the label set used for every section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelScheme {
    #[default]
    Uniform,
    Legacy,
}

impl LabelScheme {
    pub fn labels(self, section: Section) -> StatusLabels {
        match self {
            Self::Uniform => StatusLabels::UNIFORM,
            Self::Legacy => StatusLabels::legacy(section),
        }
    }
}

impl FromStr for LabelScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("'{}' is not one of: uniform, legacy", other)),
        }
    }
}

//=========================================================================================
// Section Policy
//=========================================================================================

/// Everything a form controller needs to derive a status from values.
#[derive(Debug, Clone, Copy)]
pub struct SectionPolicy {
    pub section: Section,
    pub predicate: fn(Section, &FormValues) -> bool,
    pub labels: StatusLabels,
    /// Send incomplete submissions to the server too, not only to the cache.
    pub save_incomplete: bool,
}

impl SectionPolicy {
    pub fn new(section: Section, scheme: LabelScheme) -> Self {
        Self {
            section,
            predicate: Section::is_complete,
            labels: scheme.labels(section),
            save_incomplete: false,
        }
    }

    pub fn with_save_incomplete(mut self, save_incomplete: bool) -> Self {
        self.save_incomplete = save_incomplete;
        self
    }

    pub fn is_complete(&self, values: &FormValues) -> bool {
        (self.predicate)(self.section, values)
    }

    pub fn status_for(&self, values: &FormValues) -> FormStatus {
        if self.is_complete(values) {
            self.labels.complete
        } else if self.section.is_started(values) {
            self.labels.incomplete
        } else {
            self.labels.empty
        }
    }

    /// Whether a submission with these values goes to the server.
    pub fn should_save_remotely(&self, values: &FormValues) -> bool {
        self.save_incomplete || self.is_complete(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn values(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_profile() -> FormValues {
        values(&[
            ("firstName", "Ayesha"),
            ("lastName", "Khan"),
            ("address", "House 12, Street 4, Lahore"),
            ("primaryLang", "ur"),
            ("citizen", "PK"),
            ("cnic", "35202-1234567-1"),
            ("gender", "Female"),
            ("dob", "2006-04-01"),
            ("maritalStatus", "Unmarried"),
            ("phone", "03001234567"),
            ("photoName", "me.jpg"),
            ("photoBytes", "20480"),
        ])
    }

    #[test]
    fn complete_profile_satisfies_predicate() {
        assert!(Section::Profile.is_complete(&full_profile()));
    }

    #[rstest]
    #[case::zero_bytes("0")]
    #[case::too_large("5242881")]
    #[case::not_a_number("big")]
    fn profile_photo_size_is_enforced(#[case] bytes: &str) {
        let mut v = full_profile();
        v.insert("photoBytes".to_string(), bytes.to_string());
        assert!(
            !Section::Profile.is_complete(&v),
            "photo size {} should not satisfy the profile",
            bytes
        );
    }

    #[test]
    fn whitespace_only_fields_are_blank() {
        let v = values(&[
            ("fatherName", "   "),
            ("motherName", "Sara"),
            ("fatherOccupation", "govt"),
        ]);
        assert!(!Section::Family.is_complete(&v));
        assert!(Section::Family.is_started(&v));
    }

    #[test]
    fn predicate_is_deterministic() {
        let v = values(&[("clubs", "Debating")]);
        let first = Section::Extracurricular.is_complete(&v);
        let second = Section::Extracurricular.is_complete(&v);
        assert_eq!(first, second);
        assert!(first);
    }

    #[rstest]
    #[case::empty(&[], FormStatus::NotStarted)]
    #[case::partial(&[("fatherName", "Ali")], FormStatus::InProgress)]
    #[case::full(
        &[("fatherName", "Ali"), ("motherName", "Sara"), ("fatherOccupation", "govt")],
        FormStatus::Complete
    )]
    fn uniform_labels_cover_three_levels(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: FormStatus,
    ) {
        let policy = SectionPolicy::new(Section::Family, LabelScheme::Uniform);
        assert_eq!(policy.status_for(&values(pairs)), expected);
    }

    #[test]
    fn legacy_labels_never_reach_complete_outside_profile() {
        let policy = SectionPolicy::new(Section::Extracurricular, LabelScheme::Legacy);
        assert_eq!(
            policy.status_for(&values(&[("clubs", "Chess")])),
            FormStatus::InProgress
        );
        assert_eq!(policy.status_for(&FormValues::new()), FormStatus::NotStarted);
    }

    #[test]
    fn legacy_profile_marks_empty_submission_in_progress() {
        let policy = SectionPolicy::new(Section::Profile, LabelScheme::Legacy);
        assert_eq!(policy.status_for(&FormValues::new()), FormStatus::InProgress);
        assert_eq!(policy.status_for(&full_profile()), FormStatus::Complete);
    }

    #[test]
    fn remote_save_is_gated_unless_configured() {
        let partial = values(&[("clubs", "")]);
        let gated = SectionPolicy::new(Section::Extracurricular, LabelScheme::Uniform);
        assert!(!gated.should_save_remotely(&partial));
        assert!(gated.with_save_incomplete(true).should_save_remotely(&partial));
    }

    #[test]
    fn sections_chain_in_order() {
        assert_eq!(Section::Profile.next(), Some(Section::Family));
        assert_eq!(Section::Extracurricular.next(), None);
        assert_eq!("education".parse::<Section>(), Ok(Section::Education));
    }
}
