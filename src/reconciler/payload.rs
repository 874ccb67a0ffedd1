//! Request bodies built from a desired configuration.

use serde_json::{Map, Value};

use crate::{
    client::{PasswordCredential, RecoveryQuestionCredential, UserCredentials},
    models::{ProfileAttributes, UserConfig},
};

/// Remote profile: custom attributes first, standard attributes on top.
pub(super) fn profile(
    attributes: &ProfileAttributes,
    custom: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut profile = custom.cloned().unwrap_or_default();
    attributes.write_remote(&mut profile);
    profile
}

/// Password credential from the configured source. An inline hook takes
/// precedence over a hash, which takes precedence over a plaintext value.
pub(super) fn password(config: &UserConfig) -> Option<PasswordCredential> {
    if let Some(hook) = config.password_inline_hook.as_deref().filter(|h| !h.is_empty()) {
        return Some(PasswordCredential::hook(hook));
    }
    if let Some(hash) = &config.password_hash {
        return Some(PasswordCredential::hash(hash));
    }
    config.password.as_deref().map(PasswordCredential::value)
}

pub(super) fn recovery_question(config: &UserConfig) -> Option<RecoveryQuestionCredential> {
    config
        .recovery_question
        .as_ref()
        .map(|question| RecoveryQuestionCredential {
            question: question.clone(),
            answer: config.recovery_answer.clone(),
        })
}

/// Credentials for a new user, or `None` when nothing is configured.
pub(super) fn create_credentials(config: &UserConfig) -> Option<UserCredentials> {
    let credentials = UserCredentials {
        password: password(config),
        recovery_question: recovery_question(config),
    };
    (credentials != UserCredentials::default()).then_some(credentials)
}
