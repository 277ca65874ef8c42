//! Type-erased option payloads delivered to states at transition time.

use std::any::{Any, type_name};
use std::fmt;

/// An opaque, type-tagged payload carried by a transition request.
///
/// The machine never looks inside an `Options`; it hands it to the target
/// state's `set_options` hook, which decides whether the payload is the type it
/// expects. Use [`OptionsSlot`] on the state side to do that check.
pub struct Options {
    type_name: &'static str,
    payload: Box<dyn Any + Send>,
}

impl Options {
    /// Wraps `value` as a transition payload.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            payload: Box::new(value),
        }
    }

    /// Returns `true` if the payload is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Name of the wrapped type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrows the payload as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Takes the payload out as a `T`.
    ///
    /// On a type mismatch the options are handed back untouched.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.payload
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|payload| Self { type_name, payload })
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Storage for the options a state accepts.
///
/// Empty until the first transition that carries a `T`. Payloads of any other
/// type are ignored and leave the stored value as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsSlot<T> {
    value: Option<T>,
}

impl<T> Default for OptionsSlot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Any + Send> OptionsSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `options` if it holds a `T`, replacing any previous value.
    ///
    /// Returns whether the payload was accepted.
    pub fn accept(&mut self, options: Options) -> bool {
        match options.downcast::<T>() {
            Ok(value) => {
                self.value = Some(value);
                true
            }
            Err(_) => false,
        }
    }

    /// The last accepted value.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Removes and returns the stored value.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Whether a value has been accepted and not taken.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting {
        text: String,
    }

    #[test]
    fn downcast_returns_payload_of_matching_type() {
        let options = Options::new(Greeting {
            text: "hi".to_string(),
        });
        assert!(options.is::<Greeting>());
        assert!(options.type_name().ends_with("Greeting"));

        let greeting = options.downcast::<Greeting>().unwrap();
        assert_eq!(greeting.text, "hi");
    }

    #[test]
    fn downcast_mismatch_hands_options_back() {
        let options = Options::new(7_u32);
        let options = options.downcast::<String>().unwrap_err();
        assert_eq!(options.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn slot_ignores_mismatched_payload() {
        let mut slot = OptionsSlot::<Greeting>::new();
        assert!(!slot.is_set());

        assert!(slot.accept(Options::new(Greeting {
            text: "first".to_string(),
        })));
        assert!(!slot.accept(Options::new(42_i64)));

        assert_eq!(slot.get().map(|g| g.text.as_str()), Some("first"));
    }

    #[test]
    fn slot_overwrites_on_next_match() {
        let mut slot = OptionsSlot::<u8>::new();
        slot.accept(Options::new(1_u8));
        slot.accept(Options::new(2_u8));
        assert_eq!(slot.take(), Some(2));
        assert!(!slot.is_set());
    }
}
