//! Authenticator (factor) provider keys available on identity-engine orgs.
//!
//! Some of these are only enabled on an org by feature flag.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorKey {
    Duo,
    ExternalIdp,
    GoogleOtp,
    OktaEmail,
    /// Present on every org, but cannot be referenced from sign-on policies.
    OktaPassword,
    OktaVerify,
    OnpremMfa,
    PhoneNumber,
    RsaToken,
    SecurityQuestion,
    Webauthn,
}

impl AuthenticatorKey {
    // yubikey_token is left out until it is exposed by the public API.
    pub const ALL: [AuthenticatorKey; 11] = [
        Self::Duo,
        Self::ExternalIdp,
        Self::GoogleOtp,
        Self::OktaEmail,
        Self::OktaPassword,
        Self::OktaVerify,
        Self::OnpremMfa,
        Self::PhoneNumber,
        Self::RsaToken,
        Self::SecurityQuestion,
        Self::Webauthn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duo => "duo",
            Self::ExternalIdp => "external_idp",
            Self::GoogleOtp => "google_otp",
            Self::OktaEmail => "okta_email",
            Self::OktaPassword => "okta_password",
            Self::OktaVerify => "okta_verify",
            Self::OnpremMfa => "onprem_mfa",
            Self::PhoneNumber => "phone_number",
            Self::RsaToken => "rsa_token",
            Self::SecurityQuestion => "security_question",
            Self::Webauthn => "webauthn",
        }
    }

    /// Whether sign-on policies may enroll or require this authenticator.
    pub fn is_policy_configurable(&self) -> bool {
        *self != Self::OktaPassword
    }

    /// Keys usable in policy rules.
    pub fn policy_configurable() -> impl Iterator<Item = AuthenticatorKey> {
        Self::ALL.into_iter().filter(Self::is_policy_configurable)
    }
}

impl fmt::Display for AuthenticatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authenticator key: {0}")]
pub struct UnknownAuthenticator(pub String);

impl FromStr for AuthenticatorKey {
    type Err = UnknownAuthenticator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownAuthenticator(s.to_string()))
    }
}
