//! crates/pcas_core/src/domain.rs
//!
//! Defines the core data structures for the portal: the signed-in user, the four
//! application records as the server returns them, the request payloads the forms
//! produce, and the envelopes used on the wire and in the local cache.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::ports::{PortError, PortResult};
use crate::sections::{FormStatus, Section};

/// Raw form field values keyed by field name, as held by a form page.
pub type FormValues = BTreeMap<String, String>;

//=========================================================================================
// Enumerated field values
//=========================================================================================

/// Declares a closed set of wire strings as an enum with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("'{}' is not a valid {}", other, stringify!($name))),
                }
            }
        }
    };
}

string_enum!(
    /// Which applicant track a user registered for.
    UserRole { Undergraduate => "undergraduate", Graduate => "graduate" }
);
string_enum!(Language { En => "en", Ur => "ur" });
string_enum!(Citizenship { Pk => "PK", NonPk => "Non-PK" });
string_enum!(Gender { Male => "Male", Female => "Female" });
string_enum!(MaritalStatus { Married => "Married", Unmarried => "Unmarried" });
string_enum!(FatherOccupation { Govt => "govt", NonGovt => "non-govt" });

//=========================================================================================
// Users and authentication payloads
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    /// Date of birth as the server sends it (ISO date or date-time).
    pub dob: String,
    pub phone: String,
    pub address: String,
    pub role: UserRole,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub dob: String,
    pub phone: String,
    pub address: String,
    pub role: UserRole,
}

// Passwords never reach the logs.
impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

//=========================================================================================
// Application records
//=========================================================================================

/// A server-persisted form section.
///
/// Ties a record type to its section (and so to its endpoints and completeness
/// predicate), and converts between the record and the flat values a form edits.
pub trait SectionRecord:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Request: Clone + fmt::Debug + Serialize + Send + Sync + 'static;

    const SECTION: Section;

    /// The editable fields of a confirmed record, keyed like the form inputs.
    fn to_values(&self) -> FormValues;

    /// Builds a save request out of form values.
    fn request_from_values(values: &FormValues) -> PortResult<Self::Request>;

    /// Starting values for a form with nothing saved anywhere.
    fn defaults(_user: &User) -> FormValues {
        FormValues::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub address: String,
    pub primary_lang: Language,
    pub citizen: Citizenship,
    pub cnic: String,
    pub gender: Gender,
    /// `YYYY-MM-DD`
    pub dob: String,
    pub marital_status: MaritalStatus,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub address: String,
    pub primary_lang: Language,
    pub citizen: Citizenship,
    pub cnic: String,
    pub gender: Gender,
    pub dob: String,
    pub marital_status: MaritalStatus,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_bytes: Option<u64>,
}

impl SectionRecord for Profile {
    type Request = ProfileRequest;

    const SECTION: Section = Section::Profile;

    fn to_values(&self) -> FormValues {
        let mut values = FormValues::new();
        put(&mut values, "firstName", &self.first_name);
        put(&mut values, "middleName", self.middle_name.as_deref().unwrap_or(""));
        put(&mut values, "lastName", &self.last_name);
        put(&mut values, "address", &self.address);
        put(&mut values, "primaryLang", self.primary_lang.as_str());
        put(&mut values, "citizen", self.citizen.as_str());
        put(&mut values, "cnic", &self.cnic);
        put(&mut values, "gender", self.gender.as_str());
        put(&mut values, "dob", &self.dob);
        put(&mut values, "maritalStatus", self.marital_status.as_str());
        put(&mut values, "phone", &self.phone);
        put(&mut values, "photoName", self.photo_name.as_deref().unwrap_or(""));
        put(
            &mut values,
            "photoBytes",
            &self.photo_bytes.unwrap_or_default().to_string(),
        );
        values
    }

    fn request_from_values(values: &FormValues) -> PortResult<ProfileRequest> {
        let photo_bytes = match optional(values, "photoBytes") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                PortError::InvalidInput(format!("photoBytes: '{}' is not a byte count", raw))
            })?),
            None => None,
        };
        Ok(ProfileRequest {
            first_name: required(values, "firstName")?,
            middle_name: optional(values, "middleName"),
            last_name: required(values, "lastName")?,
            address: required(values, "address")?,
            primary_lang: parse_field(values, "primaryLang")?,
            citizen: parse_field(values, "citizen")?,
            cnic: required(values, "cnic")?,
            gender: parse_field(values, "gender")?,
            dob: required(values, "dob")?,
            marital_status: parse_field(values, "maritalStatus")?,
            phone: required(values, "phone")?,
            photo_name: optional(values, "photoName"),
            photo_bytes: photo_bytes.filter(|bytes| *bytes > 0),
        })
    }

    /// Prefills what the account already knows: name parts, phone, address and dob.
    fn defaults(user: &User) -> FormValues {
        let mut values = FormValues::new();
        let parts: Vec<&str> = user.full_name.split_whitespace().collect();
        if let Some((first, rest)) = parts.split_first() {
            put(&mut values, "firstName", first);
            if let Some((last, middle)) = rest.split_last() {
                put(&mut values, "lastName", last);
                if !middle.is_empty() {
                    put(&mut values, "middleName", &middle.join(" "));
                }
            }
        }
        if !user.phone.trim().is_empty() {
            put(&mut values, "phone", user.phone.trim());
        }
        if !user.address.trim().is_empty() {
            put(&mut values, "address", user.address.trim());
        }
        let dob = user.dob.get(..10).unwrap_or(&user.dob);
        if NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_ok() {
            put(&mut values, "dob", dob);
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub user_id: String,
    pub father_name: String,
    pub mother_name: String,
    pub father_occupation: FatherOccupation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRequest {
    pub father_name: String,
    pub mother_name: String,
    pub father_occupation: FatherOccupation,
}

impl SectionRecord for Family {
    type Request = FamilyRequest;

    const SECTION: Section = Section::Family;

    fn to_values(&self) -> FormValues {
        let mut values = FormValues::new();
        put(&mut values, "fatherName", &self.father_name);
        put(&mut values, "motherName", &self.mother_name);
        put(&mut values, "fatherOccupation", self.father_occupation.as_str());
        values
    }

    fn request_from_values(values: &FormValues) -> PortResult<FamilyRequest> {
        Ok(FamilyRequest {
            father_name: required(values, "fatherName")?,
            mother_name: required(values, "motherName")?,
            father_occupation: parse_field(values, "fatherOccupation")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: String,
    pub user_id: String,
    pub matric_grades: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matric_pic_name: Option<String>,
    pub fsc_grades: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsc_pic_name: Option<String>,
    pub college_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationRequest {
    pub matric_grades: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matric_pic_name: Option<String>,
    pub fsc_grades: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsc_pic_name: Option<String>,
    pub college_name: String,
}

impl SectionRecord for Education {
    type Request = EducationRequest;

    const SECTION: Section = Section::Education;

    fn to_values(&self) -> FormValues {
        let mut values = FormValues::new();
        put(&mut values, "matricGrades", &self.matric_grades);
        put(&mut values, "matricPicName", self.matric_pic_name.as_deref().unwrap_or(""));
        put(&mut values, "fscGrades", &self.fsc_grades);
        put(&mut values, "fscPicName", self.fsc_pic_name.as_deref().unwrap_or(""));
        put(&mut values, "collegeName", &self.college_name);
        values
    }

    fn request_from_values(values: &FormValues) -> PortResult<EducationRequest> {
        Ok(EducationRequest {
            matric_grades: required(values, "matricGrades")?,
            matric_pic_name: optional(values, "matricPicName"),
            fsc_grades: required(values, "fscGrades")?,
            fsc_pic_name: optional(values, "fscPicName"),
            college_name: required(values, "collegeName")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extracurricular {
    pub id: String,
    pub user_id: String,
    pub clubs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_doc_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtracurricularRequest {
    pub clubs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_doc_name: Option<String>,
}

impl SectionRecord for Extracurricular {
    type Request = ExtracurricularRequest;

    const SECTION: Section = Section::Extracurricular;

    fn to_values(&self) -> FormValues {
        let mut values = FormValues::new();
        put(&mut values, "clubs", &self.clubs);
        put(&mut values, "certDocName", self.cert_doc_name.as_deref().unwrap_or(""));
        values
    }

    fn request_from_values(values: &FormValues) -> PortResult<ExtracurricularRequest> {
        Ok(ExtracurricularRequest {
            clubs: required(values, "clubs")?,
            cert_doc_name: optional(values, "certDocName"),
        })
    }
}

/// Every section at once, as returned by `/api/application/all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationData {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub family: Option<Family>,
    #[serde(default)]
    pub education: Option<Education>,
    #[serde(default)]
    pub extracurricular: Option<Extracurricular>,
}

fn put(values: &mut FormValues, key: &str, value: &str) {
    values.insert(key.to_string(), value.to_string());
}

fn optional(values: &FormValues, key: &str) -> Option<String> {
    values
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(values: &FormValues, key: &str) -> PortResult<String> {
    optional(values, key).ok_or_else(|| PortError::InvalidInput(format!("{} is required", key)))
}

fn parse_field<T: FromStr<Err = String>>(values: &FormValues, key: &str) -> PortResult<T> {
    required(values, key)?
        .parse::<T>()
        .map_err(|e| PortError::InvalidInput(format!("{}: {}", key, e)))
}

//=========================================================================================
// Envelopes
//=========================================================================================

/// The `{success, message, data}` wrapper every API response uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ServerEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: String::new(),
            data,
            errors: Vec::new(),
        }
    }

    /// Decodes `data.<key>`; a missing key decodes like `null`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> PortResult<T> {
        let raw = self.data.get(key).cloned().unwrap_or(Value::Null);
        serde_json::from_value(raw).map_err(|e| {
            PortError::Unexpected(format!("malformed '{}' in response: {}", key, e))
        })
    }

    /// Decodes the whole `data` object.
    pub fn data_as<T: DeserializeOwned>(&self) -> PortResult<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| PortError::Unexpected(format!("malformed response data: {}", e)))
    }
}

/// What the local cache keeps per form section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: FormValues,
    #[serde(default = "status_when_missing")]
    pub status: FormStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CacheEnvelope {
    pub fn new(values: FormValues, status: FormStatus, saved_at: DateTime<Utc>) -> Self {
        Self {
            values,
            status,
            saved_at: Some(saved_at),
        }
    }
}

fn status_when_missing() -> FormStatus {
    FormStatus::InProgress
}

/// Older pages stored numbers (e.g. `photoBytes`) directly; accept any scalar.
fn lenient_values<'de, D>(deserializer: D) -> Result<FormValues, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, Value> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key, text))
        })
        .collect())
}

//=========================================================================================
// University selection
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    #[serde(rename = "avgSemesterFeePKR")]
    pub avg_semester_fee_pkr: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct University {
    pub id: String,
    pub name: String,
    pub city: String,
    pub province: String,
    #[serde(default)]
    pub established: Option<u32>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub blurb: Option<String>,
    #[serde(default, rename = "applicationFeePKR")]
    pub application_fee_pkr: Option<u64>,
    #[serde(default, rename = "deadlineISO")]
    pub deadline_iso: Option<String>,
    /// Field of study -> programs offered in it.
    #[serde(default)]
    pub programs_by_field: HashMap<String, Vec<Program>>,
}

/// One chosen university with the user's ranked programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniPick {
    pub uni_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub ranked_program_ids: Vec<String>,
}

impl UniPick {
    pub fn new(uni_id: impl Into<String>) -> Self {
        Self {
            uni_id: uni_id.into(),
            field_of_study: None,
            ranked_program_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub uni_id: String,
    pub program_id: String,
    #[serde(rename = "semFeePKR")]
    pub sem_fee_pkr: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub items: Vec<CheckoutItem>,
    #[serde(rename = "totalPKR")]
    pub total_pkr: u64,
}
