//! services/portal/src/validation.rs
//!
//! Local checks on registration and login input, run before anything is sent.

use chrono::NaiveDate;
use pcas_core::domain::{LoginRequest, RegisterRequest};
use pcas_core::ports::PortError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const PASSWORD_MIN_LENGTH: usize = 10;
pub const PASSWORD_MAX_LENGTH: usize = 32;
pub const NAME_MIN_LENGTH: usize = 2;
pub const ADDRESS_MIN_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    InvalidEmail,
    PasswordLength { min: usize, max: usize },
    PasswordMissingUppercase,
    PasswordMissingLowercase,
    PasswordMissingDigit,
    PasswordMissingSpecial,
    PasswordHasWhitespace,
    NameTooShort { min: usize },
    AddressTooShort { min: usize },
    PhoneRequired,
    InvalidDob,
    PasswordRequired,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "Please enter a valid email address"),
            Self::PasswordLength { min, max } => {
                write!(f, "Password must be {min}-{max} characters long")
            }
            Self::PasswordMissingUppercase => {
                write!(f, "Password must contain an uppercase letter")
            }
            Self::PasswordMissingLowercase => {
                write!(f, "Password must contain a lowercase letter")
            }
            Self::PasswordMissingDigit => write!(f, "Password must contain a number"),
            Self::PasswordMissingSpecial => {
                write!(f, "Password must contain a special character")
            }
            Self::PasswordHasWhitespace => write!(f, "Password must not contain spaces"),
            Self::NameTooShort { min } => {
                write!(f, "Full name must be at least {min} characters")
            }
            Self::AddressTooShort { min } => {
                write!(f, "Address must be at least {min} characters")
            }
            Self::PhoneRequired => write!(f, "Phone number is required"),
            Self::InvalidDob => write!(f, "Date of birth must be a valid YYYY-MM-DD date"),
            Self::PasswordRequired => write!(f, "Password is required"),
        }
    }
}

impl std::error::Error for InputError {}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Every problem with a registration payload, in form order.
pub fn check_registration(request: &RegisterRequest) -> Result<(), Vec<InputError>> {
    let mut errors = Vec::new();

    if !email_regex().is_match(request.email.trim()) {
        errors.push(InputError::InvalidEmail);
    }
    errors.extend(password_problems(&request.password));
    if request.full_name.trim().chars().count() < NAME_MIN_LENGTH {
        errors.push(InputError::NameTooShort {
            min: NAME_MIN_LENGTH,
        });
    }
    if NaiveDate::parse_from_str(request.dob.trim(), "%Y-%m-%d").is_err() {
        errors.push(InputError::InvalidDob);
    }
    if request.phone.trim().is_empty() {
        errors.push(InputError::PhoneRequired);
    }
    if request.address.trim().chars().count() < ADDRESS_MIN_LENGTH {
        errors.push(InputError::AddressTooShort {
            min: ADDRESS_MIN_LENGTH,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The login form only asks for something that looks like an email and any password.
pub fn check_login(request: &LoginRequest) -> Result<(), Vec<InputError>> {
    let mut errors = Vec::new();
    if request.email.trim().chars().count() <= 3 {
        errors.push(InputError::InvalidEmail);
    }
    if request.password.is_empty() {
        errors.push(InputError::PasswordRequired);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn password_problems(password: &str) -> Vec<InputError> {
    let mut errors = Vec::new();
    let length = password.chars().count();
    if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&length) {
        errors.push(InputError::PasswordLength {
            min: PASSWORD_MIN_LENGTH,
            max: PASSWORD_MAX_LENGTH,
        });
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(InputError::PasswordMissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(InputError::PasswordMissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(InputError::PasswordMissingDigit);
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push(InputError::PasswordMissingSpecial);
    }
    if password.chars().any(char::is_whitespace) {
        errors.push(InputError::PasswordHasWhitespace);
    }
    errors
}

/// Turns local input errors into the same shape as server-side validation.
pub fn into_port_error(errors: Vec<InputError>) -> PortError {
    PortError::Validation(errors.iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcas_core::domain::UserRole;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registration() -> RegisterRequest {
        RegisterRequest {
            email: "ayesha@example.com".to_string(),
            password: "Str0ng!Passw".to_string(),
            full_name: "Ayesha Khan".to_string(),
            dob: "2006-04-01".to_string(),
            phone: "03001234567".to_string(),
            address: "House 12, Street 4, Lahore".to_string(),
            role: UserRole::Undergraduate,
        }
    }

    #[rstest]
    fn accepts_a_well_formed_registration(registration: RegisterRequest) {
        assert_eq!(check_registration(&registration), Ok(()));
    }

    #[rstest]
    #[case::too_short("Sh0rt!", InputError::PasswordLength { min: 10, max: 32 })]
    #[case::no_upper("lowercase1!x", InputError::PasswordMissingUppercase)]
    #[case::no_digit("NoDigitsHere!", InputError::PasswordMissingDigit)]
    #[case::no_special("NoSpecial123", InputError::PasswordMissingSpecial)]
    #[case::spaces("Has Space12!", InputError::PasswordHasWhitespace)]
    fn reports_password_rules(
        mut registration: RegisterRequest,
        #[case] password: &str,
        #[case] expected: InputError,
    ) {
        registration.password = password.to_string();
        let errors = check_registration(&registration).expect_err("password should fail");
        assert!(
            errors.contains(&expected),
            "expected {:?} in {:?}",
            expected,
            errors
        );
    }

    #[rstest]
    fn collects_every_problem(mut registration: RegisterRequest) {
        registration.email = "not-an-email".to_string();
        registration.dob = "01/04/2006".to_string();
        registration.address = "Lahore".to_string();
        let errors = check_registration(&registration).expect_err("should fail");
        assert_eq!(
            errors,
            vec![
                InputError::InvalidEmail,
                InputError::InvalidDob,
                InputError::AddressTooShort { min: 10 },
            ]
        );
    }

    #[test]
    fn login_needs_email_and_password() {
        let request = LoginRequest {
            email: "a@b".to_string(),
            password: String::new(),
        };
        let error = into_port_error(check_login(&request).expect_err("should fail"));
        assert_eq!(
            error.to_string(),
            "Please enter a valid email address, Password is required"
        );
    }
}
