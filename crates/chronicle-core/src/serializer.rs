//! JSON encoding of events, snapshot state and metadata.
//!
//! Polymorphic decoding goes through an [`EventTypeRegistry`] owned by each
//! serializer instance: a map from event type name to a decode function,
//! filled once at startup.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SerializationError;
use crate::event::DomainEvent;

type Decoder<E> = Box<dyn Fn(&str) -> Result<E, serde_json::Error> + Send + Sync>;

/// Maps event type names to decode functions producing `E`.
pub struct EventTypeRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E: 'static> EventTypeRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `T` as the shape stored under `name`. Decoded values are
    /// converted into the aggregate's event enum with `Into`.
    ///
    /// Registering the same name twice replaces the earlier decoder.
    pub fn register<T>(&mut self, name: impl Into<String>)
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        self.register_with(name, |text| serde_json::from_str::<T>(text).map(Into::into));
    }

    /// Registers a custom decode function under `name`.
    pub fn register_with<F>(&mut self, name: impl Into<String>, decoder: F)
    where
        F: Fn(&str) -> Result<E, serde_json::Error> + Send + Sync + 'static,
    {
        self.decoders.insert(name.into(), Box::new(decoder));
    }

    /// Returns `true` if a decoder exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Returns the registered event type names, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn decode(&self, text: &str, name: &str) -> Result<E, SerializationError> {
        let decoder = self
            .decoders
            .get(name)
            .ok_or_else(|| SerializationError::UnknownEventType(name.to_owned()))?;
        decoder(text).map_err(|source| SerializationError::Decode {
            type_name: name.to_owned(),
            source,
        })
    }
}

impl<E: 'static> Default for EventTypeRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventTypeRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

/// Converts events, snapshot state and metadata maps to and from JSON text.
#[derive(Debug)]
pub struct EventSerializer<E> {
    registry: EventTypeRegistry<E>,
}

impl<E: 'static> EventSerializer<E> {
    /// Creates a serializer with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(EventTypeRegistry::new())
    }

    /// Creates a serializer around an already populated registry.
    #[must_use]
    pub fn with_registry(registry: EventTypeRegistry<E>) -> Self {
        Self { registry }
    }

    /// Registers `T` as the shape stored under `name`.
    pub fn register_event_type<T>(&mut self, name: impl Into<String>)
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        self.registry.register::<T>(name);
    }

    /// Returns `true` if `name` can be decoded by this serializer.
    #[must_use]
    pub fn is_event_type_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Returns the registry for further registrations.
    pub fn registry_mut(&mut self) -> &mut EventTypeRegistry<E> {
        &mut self.registry
    }

    /// Decodes `text` using the decoder registered for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::UnknownEventType` if nothing is
    /// registered under `event_type`, or `SerializationError::Decode` if the
    /// payload does not fit the registered shape.
    pub fn deserialize(&self, text: &str, event_type: &str) -> Result<E, SerializationError> {
        self.registry.decode(text, event_type)
    }

    /// Decodes `text` straight into `T`, bypassing the registry.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Decode` if the text does not fit `T`.
    pub fn deserialize_as<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializationError> {
        decode_named(text, std::any::type_name::<T>())
    }

    /// Encodes a snapshot state value.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Encode` if the value cannot be encoded.
    pub fn serialize_state<S: Serialize>(&self, state: &S) -> Result<String, SerializationError> {
        serde_json::to_string(state).map_err(SerializationError::Encode)
    }

    /// Decodes a snapshot state value.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Decode` if the text does not fit `S`.
    pub fn deserialize_state<S: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<S, SerializationError> {
        decode_named(text, std::any::type_name::<S>())
    }

    /// Encodes a metadata map. An absent or empty map encodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Encode` if the map cannot be encoded.
    pub fn serialize_metadata(
        &self,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<Option<String>, SerializationError> {
        match metadata {
            Some(map) if !map.is_empty() => serde_json::to_string(map)
                .map(Some)
                .map_err(SerializationError::Encode),
            _ => Ok(None),
        }
    }

    /// Decodes a metadata map. Absent or blank text decodes to an empty map.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Decode` if the text is not a string map.
    pub fn deserialize_metadata(
        &self,
        text: Option<&str>,
    ) -> Result<HashMap<String, String>, SerializationError> {
        match text {
            Some(text) if !text.trim().is_empty() => decode_named(text, "metadata"),
            _ => Ok(HashMap::new()),
        }
    }
}

impl<E: Serialize + DomainEvent + 'static> EventSerializer<E> {
    /// Encodes an event with all of its fields.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::Encode` if the event cannot be encoded.
    pub fn serialize(&self, event: &E) -> Result<String, SerializationError> {
        serde_json::to_string(event).map_err(SerializationError::Encode)
    }
}

impl<E: 'static> Default for EventSerializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_named<T: DeserializeOwned>(text: &str, type_name: &str) -> Result<T, SerializationError> {
    serde_json::from_str(text).map_err(|source| SerializationError::Decode {
        type_name: type_name.to_owned(),
        source,
    })
}
