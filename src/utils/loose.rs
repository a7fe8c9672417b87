//! Deserializers that accept either a native value or its string form.
//!
//! Placeholders in the settings file always resolve to strings, so an id or
//! a port written as `"${OWNER_ID}"` arrives as text and is parsed here.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

// Text is tried first so that strings stay text even when `T` is `String`
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Text(String),
    Native(T),
}

impl<T> Loose<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn into_value<E: de::Error>(self) -> Result<T, E> {
        match self {
            Loose::Native(value) => Ok(value),
            Loose::Text(text) => text.trim().parse().map_err(E::custom),
        }
    }
}

/// A single value, native or textual
pub fn value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    Loose::<T>::deserialize(deserializer)?.into_value()
}

/// An optional value; `null` and the empty string both mean absent
pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<Loose<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(loose) => loose.into_value().map(Some),
    }
}

/// A list whose elements may each be native or textual
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    Vec::<Loose<T>>::deserialize(deserializer)?
        .into_iter()
        .map(Loose::into_value)
        .collect()
}
