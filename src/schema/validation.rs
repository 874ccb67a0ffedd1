use std::borrow::Cow;

use url::Url;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

use crate::models::{HashAlgorithm, UserConfig, is_admin_role_type};

/// The only password inline hook type the remote API accepts.
pub const DEFAULT_PASSWORD_HOOK: &str = "default";

const RECOVERY_ANSWER_MIN_CHARS: usize = 4;
const RECOVERY_ANSWER_MAX_CHARS: usize = 1000;
const BCRYPT_WORK_FACTOR: std::ops::RangeInclusive<u8> = 1..=20;

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Check a desired user configuration before any remote call is made.
///
/// Every rule is evaluated; the returned errors are keyed by attribute name.
pub fn validate_user(config: &UserConfig) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let profile = &config.profile;

    for (field, value) in [
        ("login", &profile.login),
        ("email", &profile.email),
        ("first_name", &profile.first_name),
        ("last_name", &profile.last_name),
    ] {
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            errors.add(field, error("required", format!("{field} is required")));
        }
    }

    for (field, value) in [
        ("email", &profile.email),
        ("second_email", &profile.second_email),
    ] {
        if let Some(value) = value.as_deref()
            && !value.trim().is_empty()
            && !value.validate_email()
        {
            errors.add(
                field,
                error("email", format!("{field} '{value}' is not a valid email address")),
            );
        }
    }

    if let Some(raw) = profile.profile_url.as_deref() {
        let valid = Url::parse(raw)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            errors.add(
                "profile_url",
                error("url", format!("profile_url '{raw}' must be an http or https URL")),
            );
        }
    }

    if !config.status.is_configurable() {
        errors.add(
            "status",
            error(
                "status",
                format!(
                    "status must be one of ACTIVE, STAGED, DEPROVISIONED or SUSPENDED, got {}",
                    config.status
                ),
            ),
        );
    }

    if let Some(roles) = &config.admin_roles {
        let unknown: Vec<&str> = roles
            .iter()
            .map(String::as_str)
            .filter(|role| !is_admin_role_type(role))
            .collect();
        if !unknown.is_empty() {
            errors.add(
                "admin_roles",
                error(
                    "admin_role",
                    format!("unknown admin role type(s): {}", unknown.join(", ")),
                ),
            );
        }
    }

    let credential_sources = [
        config.password.is_some(),
        config.password_hash.is_some(),
        config.password_inline_hook.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if credential_sources > 1 {
        errors.add(
            "password",
            error(
                "conflicting_credentials",
                "only one of password, password_hash or password_inline_hook may be set",
            ),
        );
    }

    if let Some(hook) = config.password_inline_hook.as_deref()
        && hook != DEFAULT_PASSWORD_HOOK
    {
        errors.add(
            "password_inline_hook",
            error(
                "password_inline_hook",
                format!("password_inline_hook must be '{DEFAULT_PASSWORD_HOOK}', got '{hook}'"),
            ),
        );
    }

    if let Some(hash) = &config.password_hash {
        if hash.value.is_empty() {
            errors.add("password_hash", error("required", "password_hash.value is required"));
        }
        match (hash.algorithm, hash.work_factor) {
            (HashAlgorithm::Bcrypt, Some(wf)) if !BCRYPT_WORK_FACTOR.contains(&wf) => {
                errors.add(
                    "password_hash",
                    error(
                        "work_factor",
                        format!("password_hash.work_factor must be between 1 and 20, got {wf}"),
                    ),
                );
            }
            (HashAlgorithm::Bcrypt, _) | (_, None) => {}
            (algorithm, Some(_)) => {
                errors.add(
                    "password_hash",
                    error(
                        "work_factor",
                        format!("password_hash.work_factor only applies to BCRYPT, not {algorithm}"),
                    ),
                );
            }
        }
    }

    if let Some(answer) = config.recovery_answer.as_deref() {
        let len = answer.chars().count();
        if !(RECOVERY_ANSWER_MIN_CHARS..=RECOVERY_ANSWER_MAX_CHARS).contains(&len) {
            errors.add(
                "recovery_answer",
                error(
                    "length",
                    format!(
                        "recovery_answer must be between {RECOVERY_ANSWER_MIN_CHARS} and \
                         {RECOVERY_ANSWER_MAX_CHARS} characters"
                    ),
                ),
            );
        }
    }

    if config.expire_password_on_create && config.password.is_none() {
        errors.add(
            "expire_password_on_create",
            error(
                "requires_password",
                "expire_password_on_create requires password to be set",
            ),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
