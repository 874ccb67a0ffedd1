//! Standard user profile attributes.
//!
//! Locally every attribute is addressed by its snake_case name (`cost_center`);
//! on the wire the remote API uses camelCase keys (`costCenter`). The
//! `profile_attributes!` table below is the single source of both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! profile_attributes {
    ($( $(#[$meta:meta])* $field:ident => $remote:literal ),+ $(,)?) => {
        /// The standard profile attributes of a user.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
        pub struct ProfileAttributes {
            $(
                $(#[$meta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<String>,
            )+
        }

        impl ProfileAttributes {
            /// `(attribute, remote key)` pairs for every standard attribute.
            pub const KEYS: &'static [(&'static str, &'static str)] =
                &[$((stringify!($field), $remote)),+];

            /// Value of an attribute by its local name.
            pub fn get(&self, name: &str) -> Option<&str> {
                match name {
                    $(stringify!($field) => self.$field.as_deref(),)+
                    _ => None,
                }
            }

            /// Remove the standard keys from a remote profile map, leaving only
            /// custom attributes behind.
            pub fn take_from_remote(map: &mut Map<String, Value>) -> Self {
                Self {
                    $($field: map.remove($remote).and_then(remote_string),)+
                }
            }

            /// Write every set attribute into a remote profile map, overriding
            /// keys already present.
            pub fn write_remote(&self, map: &mut Map<String, Value>) {
                $(
                    if let Some(value) = &self.$field {
                        map.insert($remote.to_string(), Value::String(value.clone()));
                    }
                )+
            }
        }
    };
}

profile_attributes! {
    /// User city
    city => "city",
    /// User cost center
    cost_center => "costCenter",
    /// User country code
    country_code => "countryCode",
    /// User department
    department => "department",
    /// User display name, suitable to show end users
    display_name => "displayName",
    /// User division
    division => "division",
    /// User primary email address (required)
    email => "email",
    /// User employee number
    employee_number => "employeeNumber",
    /// User first name (required)
    first_name => "firstName",
    honorific_prefix => "honorificPrefix",
    honorific_suffix => "honorificSuffix",
    /// User last name (required)
    last_name => "lastName",
    /// User default location
    locale => "locale",
    /// User login (required)
    login => "login",
    manager => "manager",
    manager_id => "managerId",
    middle_name => "middleName",
    mobile_phone => "mobilePhone",
    nick_name => "nickName",
    organization => "organization",
    /// User mailing address
    postal_address => "postalAddress",
    preferred_language => "preferredLanguage",
    primary_phone => "primaryPhone",
    /// User online profile (web page)
    profile_url => "profileUrl",
    /// User secondary email address, used for account recovery
    second_email => "secondEmail",
    /// User state or region
    state => "state",
    street_address => "streetAddress",
    timezone => "timezone",
    title => "title",
    /// User employee type
    user_type => "userType",
    zip_code => "zipCode",
}

/// Profile values are strings; anything else the remote returns for a
/// standard key is kept in its JSON rendering.
fn remote_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
