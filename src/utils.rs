use hifitime::prelude::Epoch;

use serde::Serializer;

/// Serializes an optional [Epoch] as its text representation.
pub fn serialize_epoch<S>(epoch: &Option<Epoch>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match epoch {
        Some(epoch) => serializer.collect_str(epoch),
        None => serializer.serialize_none(),
    }
}
