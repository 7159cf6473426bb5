//! Typed reply messages
//!
//! A reply body is held as an owned tree of [`Field`]s and read through a
//! cursor. Arrays and structs are containers: they have to be entered
//! before their elements can be read and exited afterwards. [`Reply::enter`]
//! returns a [`Container`] guard that performs the exit when it goes out of
//! scope, so every enter is matched on every return path.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

/// One value of a reply body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Str(String),
    U32(u32),
    ObjectPath(String),
    /// Array with the signature of its elements (kept for empty arrays)
    Array { element: String, items: Vec<Field> },
    Struct(Vec<Field>),
    /// Any other value, by signature
    Other(String),
}

impl Field {
    pub fn object_path(path: impl Into<String>) -> Self {
        Field::ObjectPath(path.into())
    }

    pub fn array(element: impl Into<String>, items: Vec<Field>) -> Self {
        Field::Array {
            element: element.into(),
            items,
        }
    }

    /// Type signature of this value, e.g. `a(sus)`
    pub fn signature(&self) -> String {
        match self {
            Field::Str(_) => "s".to_string(),
            Field::U32(_) => "u".to_string(),
            Field::ObjectPath(_) => "o".to_string(),
            Field::Array { element, .. } => format!("a{}", element),
            Field::Struct(fields) => struct_signature(fields),
            Field::Other(sig) => sig.clone(),
        }
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Str(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Str(s)
    }
}

impl From<u32> for Field {
    fn from(n: u32) -> Self {
        Field::U32(n)
    }
}

fn struct_signature(fields: &[Field]) -> String {
    let inner: String = fields.iter().map(Field::signature).collect();
    format!("({})", inner)
}

/// Kind of container to enter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Array,
    Struct,
}

impl ContainerKind {
    fn signature(self, contents: &str) -> String {
        match self {
            ContainerKind::Array => format!("a{}", contents),
            ContainerKind::Struct => format!("({})", contents),
        }
    }
}

/// Read cursor over a reply body
#[derive(Debug, Default)]
pub struct Reply {
    body: VecDeque<Field>,
    open: Vec<VecDeque<Field>>,
}

impl Reply {
    pub fn new(body: Vec<Field>) -> Self {
        Self {
            body: body.into(),
            open: Vec::new(),
        }
    }

    /// Number of containers currently entered
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut VecDeque<Field> {
        match self.open.last_mut() {
            Some(frame) => frame,
            None => &mut self.body,
        }
    }

    /// Enter the next value, which must be a container of `kind`.
    ///
    /// For arrays `contents` is the element signature (`(sus)`), for
    /// structs the field signature without parentheses (`sus`). On
    /// mismatch nothing is consumed.
    pub fn enter_container(
        &mut self,
        kind: ContainerKind,
        contents: &str,
    ) -> Result<(), DecodeError> {
        let frame = self.current();
        let next = frame.pop_front().ok_or(DecodeError::EndOfContainer)?;

        let items = match (kind, next) {
            (ContainerKind::Array, Field::Array { element, items }) if element == contents => items,
            (ContainerKind::Struct, Field::Struct(fields))
                if struct_signature(&fields) == kind.signature(contents) =>
            {
                fields
            }
            (_, other) => {
                let found = other.signature();
                frame.push_front(other);
                return Err(DecodeError::Mismatch {
                    expected: kind.signature(contents),
                    found,
                });
            }
        };

        self.open.push(items.into());
        Ok(())
    }

    /// Leave the innermost container. Unread elements are discarded.
    pub fn exit_container(&mut self) -> Result<(), DecodeError> {
        let frame = self.open.pop().ok_or(DecodeError::NotInContainer)?;
        if !frame.is_empty() {
            log::trace!("leaving container with {} unread values", frame.len());
        }
        Ok(())
    }

    /// Enter a container and get a guard that exits it on drop
    pub fn enter(
        &mut self,
        kind: ContainerKind,
        contents: &str,
    ) -> Result<Container<'_>, DecodeError> {
        self.enter_container(kind, contents)?;
        Ok(Container { reply: self })
    }

    /// Read the next struct of the current container.
    ///
    /// `Ok(None)` at the end of the container; a value of another type is an
    /// error and is left in place.
    pub fn read_struct(&mut self, signature: &str) -> Result<Option<Fields>, DecodeError> {
        let frame = self.current();
        let matches = match frame.front() {
            None => return Ok(None),
            Some(value) => value.signature() == signature,
        };

        if !matches {
            let found = frame.front().map(Field::signature).unwrap_or_default();
            return Err(DecodeError::Mismatch {
                expected: signature.to_string(),
                found,
            });
        }

        match frame.pop_front() {
            Some(Field::Struct(fields)) => Ok(Some(Fields::new(fields))),
            Some(other) => Err(DecodeError::Mismatch {
                expected: signature.to_string(),
                found: other.signature(),
            }),
            None => Ok(None),
        }
    }
}

/// An entered container; exits it when dropped
pub struct Container<'a> {
    reply: &'a mut Reply,
}

impl Deref for Container<'_> {
    type Target = Reply;

    fn deref(&self) -> &Reply {
        &*self.reply
    }
}

impl DerefMut for Container<'_> {
    fn deref_mut(&mut self) -> &mut Reply {
        &mut *self.reply
    }
}

impl Drop for Container<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.reply.exit_container() {
            log::warn!("Failed to exit container: {}", e);
        }
    }
}

/// Fields of one decoded struct, read in order
#[derive(Debug)]
pub struct Fields {
    items: std::vec::IntoIter<Field>,
}

impl Fields {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            items: fields.into_iter(),
        }
    }

    fn next_field(&mut self, expected: &str) -> Result<Field, DecodeError> {
        self.items.next().ok_or_else(|| DecodeError::MissingField {
            expected: expected.to_string(),
        })
    }

    pub fn next_str(&mut self) -> Result<String, DecodeError> {
        match self.next_field("s")? {
            Field::Str(s) => Ok(s),
            other => Err(DecodeError::mismatch("s", &other)),
        }
    }

    pub fn next_u32(&mut self) -> Result<u32, DecodeError> {
        match self.next_field("u")? {
            Field::U32(n) => Ok(n),
            other => Err(DecodeError::mismatch("u", &other)),
        }
    }

    pub fn next_object_path(&mut self) -> Result<String, DecodeError> {
        match self.next_field("o")? {
            Field::ObjectPath(p) => Ok(p),
            other => Err(DecodeError::mismatch("o", &other)),
        }
    }

    /// Check that every field was consumed
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.items.len() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingFields(n)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("Missing field of type {expected}")]
    MissingField { expected: String },

    #[error("{0} unexpected trailing fields")]
    TrailingFields(usize),

    #[error("No container to exit")]
    NotInContainer,

    #[error("End of container")]
    EndOfContainer,
}

impl DecodeError {
    fn mismatch(expected: &str, found: &Field) -> Self {
        DecodeError::Mismatch {
            expected: expected.to_string(),
            found: found.signature(),
        }
    }
}
