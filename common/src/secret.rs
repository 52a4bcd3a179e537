//
// Secrets redaction
// It is nice to be able to debug print our configuration on startup as this can save a lot of
// time when investigating an issue. Some of the configuration values are credentials though, so we
// want a way of hiding those values from `Debug` calls without introducing overheads in the
// developer experience.
//

use std::{fmt, marker::PhantomData, ops::Deref};

use serde::{Deserialize, Deserializer};

pub trait RedactionFunction<T> {
    fn redact(s: &T) -> String;
}

const REDACTED_VALUE: &str = "<REDACTED>";

#[derive(Clone)]
pub struct PlainRedactor {}

impl<T> RedactionFunction<T> for PlainRedactor {
    fn redact(_: &T) -> String {
        REDACTED_VALUE.to_string()
    }
}

#[derive(Clone)]
pub struct Secret<T, R = PlainRedactor>
where
    R: RedactionFunction<T>,
{
    value: T,
    redaction_function: PhantomData<R>,
}

impl<T, R> Secret<T, R>
where
    R: RedactionFunction<T>,
{
    pub fn new(value: T) -> Self {
        Self {
            value,
            redaction_function: PhantomData,
        }
    }

    /// Explicitly access the wrapped value, e.g. to pass it on to an external process.
    pub fn expose(&self) -> &T {
        &self.value
    }
}

impl<T, R> Deref for Secret<T, R>
where
    R: RedactionFunction<T>,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T, R> fmt::Debug for Secret<T, R>
where
    R: RedactionFunction<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = R::redact(&self.value);
        f.write_str(&text)
    }
}

impl<'de, T, R> Deserialize<'de> for Secret<T, R>
where
    T: Deserialize<'de>,
    R: RedactionFunction<T>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret::new)
    }
}
