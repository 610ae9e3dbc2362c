use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;

use crate::mongo::models::student::{Address, Student};

/// Deep merge of a partial update into an existing value.
///
/// Fields absent from the patch are left untouched, nested patches are merged
/// field by field and scalars overwrite.
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: Self::Patch);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateAddress {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateStudent {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_age")]
    pub age: Option<i64>,
    pub address: Option<UpdateAddress>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AgeValue {
    Number(i64),
    Text(String),
}

// Older clients send the age as a string in updates.
fn deserialize_age<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<AgeValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(AgeValue::Number(age)) => Ok(Some(age)),
        Some(AgeValue::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid age \"{}\"", text))),
    }
}

impl Merge for Address {
    type Patch = UpdateAddress;

    fn merge(&mut self, patch: UpdateAddress) {
        if let Some(city) = patch.city {
            self.city = city;
        }

        if let Some(country) = patch.country {
            self.country = country;
        }
    }
}

impl Merge for Student {
    type Patch = UpdateStudent;

    fn merge(&mut self, patch: UpdateStudent) {
        if let Some(name) = patch.name {
            self.name = name;
        }

        if let Some(age) = patch.age {
            self.age = age;
        }

        if let Some(address) = patch.address {
            self.address.merge(address);
        }
    }
}
