use crate::models::fingerprint::FingerprintHasher;
use crate::{CoreError, CustomValue, Fingerprint, Result as CoreResult};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

// Field tags for fingerprinting
const TAG_ID: u8 = 1;
const TAG_NAME: u8 = 2;
const TAG_EMAIL: u8 = 3;
const TAG_GENDER: u8 = 4;
const TAG_BIRTHDAY: u8 = 5;
const TAG_LOCATION: u8 = 6;
const TAG_CUSTOM_KEY: u8 = 7;
const TAG_CUSTOM_BOOL: u8 = 8;
const TAG_CUSTOM_INT: u8 = 9;
const TAG_CUSTOM_DOUBLE: u8 = 10;
const TAG_CUSTOM_STRING: u8 = 11;

/// Identity of one end-user as reported by the host application.
///
/// Profiles are immutable: every update builds a new value through
/// [`IdentityProfile::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    birthday: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    custom_data: BTreeMap<String, CustomValue>,
    created_at: DateTime<Utc>,
}

impl IdentityProfile {
    pub fn builder(id: impl Into<String>) -> IdentityProfileBuilder {
        IdentityProfileBuilder {
            id: id.into(),
            name: None,
            email: None,
            gender: None,
            birthday: None,
            location: None,
            custom_data: BTreeMap::new(),
            created_at: None,
        }
    }

    /// Builds a profile from the plain key/value map the React Native and
    /// Flutter bridges marshal (`id`, `name`, `email`, `gender`, `birthday`,
    /// `location`, `customData`).
    pub fn from_bridge_map(map: &Map<String, Value>) -> CoreResult<Self> {
        let id = match map.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(_) => return Err(CoreError::validation("id must be a string", Some("id"))),
            None => return Err(CoreError::validation("id is required", Some("id"))),
        };

        let mut builder = Self::builder(id);

        if let Some(name) = bridge_string(map, "name")? {
            builder = builder.name(name);
        }
        if let Some(email) = bridge_string(map, "email")? {
            builder = builder.email(email);
        }
        if let Some(gender) = bridge_string(map, "gender")? {
            builder = builder.gender(gender);
        }
        if let Some(location) = bridge_string(map, "location")? {
            builder = builder.location(location);
        }
        if let Some(birthday) = bridge_string(map, "birthday")? {
            let date = NaiveDate::parse_from_str(&birthday, BIRTHDAY_FORMAT)
                .map_err(|_| CoreError::invalid_date("birthday", birthday.as_str()))?;
            builder = builder.birthday(date);
        }

        match map.get("customData") {
            None | Some(Value::Null) => {}
            Some(Value::Object(custom)) => {
                for (key, value) in custom {
                    if value.is_null() {
                        continue;
                    }
                    let scalar = CustomValue::from_json(value).ok_or_else(|| {
                        CoreError::validation(
                            format!("customData.{key} must be a string, number or boolean"),
                            Some("customData"),
                        )
                    })?;
                    builder = builder.custom(key.clone(), scalar);
                }
            }
            Some(_) => {
                return Err(CoreError::validation(
                    "customData must be an object",
                    Some("customData"),
                ));
            }
        }

        Ok(builder.build())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn birthday(&self) -> Option<NaiveDate> {
        self.birthday
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn custom_data(&self) -> &BTreeMap<String, CustomValue> {
        &self.custom_data
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the id is empty or whitespace only.
    pub fn has_blank_id(&self) -> bool {
        self.id.trim().is_empty()
    }

    /// Content fingerprint of everything that is sent to the remote service.
    /// `created_at` is local bookkeeping and is left out.
    pub fn fingerprint(&self) -> Fingerprint {
        let birthday = self.birthday.map(|d| d.format(BIRTHDAY_FORMAT).to_string());

        let mut hasher = FingerprintHasher::new();
        hasher
            .field(TAG_ID, self.id.as_bytes())
            .optional(TAG_NAME, self.name.as_deref())
            .optional(TAG_EMAIL, self.email.as_deref())
            .optional(TAG_GENDER, self.gender.as_deref())
            .optional(TAG_BIRTHDAY, birthday.as_deref())
            .optional(TAG_LOCATION, self.location.as_deref());

        for (key, value) in &self.custom_data {
            hasher.field(TAG_CUSTOM_KEY, key.as_bytes());
            match value {
                CustomValue::Bool(b) => hasher.field(TAG_CUSTOM_BOOL, &[u8::from(*b)]),
                CustomValue::Int(i) => hasher.field(TAG_CUSTOM_INT, &i.to_be_bytes()),
                CustomValue::Double(d) => {
                    hasher.field(TAG_CUSTOM_DOUBLE, &d.to_bits().to_be_bytes())
                }
                CustomValue::String(s) => hasher.field(TAG_CUSTOM_STRING, s.as_bytes()),
            };
        }

        hasher.finish()
    }
}

pub struct IdentityProfileBuilder {
    id: String,
    name: Option<String>,
    email: Option<String>,
    gender: Option<String>,
    birthday: Option<NaiveDate>,
    location: Option<String>,
    custom_data: BTreeMap<String, CustomValue>,
    created_at: Option<DateTime<Utc>>,
}

impl IdentityProfileBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn birthday(mut self, birthday: NaiveDate) -> Self {
        self.birthday = Some(birthday);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }

    pub fn custom_data(mut self, data: BTreeMap<String, CustomValue>) -> Self {
        self.custom_data.extend(data);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Finishes the profile. A malformed e-mail is dropped with a warning
    /// rather than failing the whole identify.
    pub fn build(self) -> IdentityProfile {
        let email = match self.email {
            Some(email) if is_valid_email(&email) => Some(email),
            Some(_) => {
                warn!("Dropping invalid e-mail from identity profile {}", self.id);
                None
            }
            None => None,
        };

        IdentityProfile {
            id: self.id,
            name: self.name,
            email,
            gender: self.gender,
            birthday: self.birthday,
            location: self.location,
            custom_data: self.custom_data,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Invalid regex")
});

/// Matches `local@domain.tld` where the tld is at least two ASCII letters.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn bridge_string(map: &Map<String, Value>, field: &str) -> CoreResult<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CoreError::validation(
            format!("{field} must be a string"),
            Some(field),
        )),
    }
}
