pub mod domain;
pub mod ports;
pub mod sections;

pub use domain::{
    ApplicationData, CacheEnvelope, CheckoutItem, CheckoutSummary, Citizenship, Education,
    EducationRequest, Extracurricular, ExtracurricularRequest, Family, FamilyRequest,
    FatherOccupation, FormValues, Gender, Language, LoginRequest, MaritalStatus, Profile,
    ProfileRequest, Program, RegisterRequest, SectionRecord, ServerEnvelope, UniPick, University,
    User, UserRole,
};
pub use ports::{ApiGateway, HttpMethod, LocalCache, PortError, PortResult};
pub use sections::{FormStatus, LabelScheme, Section, SectionPolicy, StatusLabels, PHOTO_MAX_BYTES};
