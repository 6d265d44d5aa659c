//! Typed input and output sockets.
//!
//! Every component declares its sockets up front. The graph builder compares
//! the declared [`SocketType`]s of both ends of a connection before the
//! pipeline ever runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// Accepts and produces anything.
    Any,
    /// UTF-8 text.
    Str,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean.
    Bool,
    /// File system path.
    Path,
    /// A [`crate::core::Document`].
    Document,
    /// A [`crate::core::ByteStream`].
    ByteStream,
    /// Homogeneous list.
    List(Box<SocketType>),
    /// String-keyed map.
    Map(Box<SocketType>),
    /// A value of the inner type, or nothing.
    Optional(Box<SocketType>),
    /// Any one of the member types.
    Union(Vec<SocketType>),
    /// A domain type identified by name only.
    Named(String),
}

impl SocketType {
    /// `List[inner]`.
    #[must_use]
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    /// `Map[str, inner]`.
    #[must_use]
    pub fn map(inner: Self) -> Self {
        Self::Map(Box::new(inner))
    }

    /// `Optional[inner]`.
    #[must_use]
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// `Union[members...]`.
    #[must_use]
    pub fn union(members: impl IntoIterator<Item = Self>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    /// Returns true if a sender of type `self` may feed a receiver of type `receiver`.
    ///
    /// Compatible when the types are equal, either side is `Any`, the sender
    /// is a member of the receiver's union or optional, every member of a
    /// sender union is accepted, or container element types are compatible.
    #[must_use]
    pub fn is_compatible_with(&self, receiver: &Self) -> bool {
        if self == receiver || matches!(self, Self::Any) || matches!(receiver, Self::Any) {
            return true;
        }

        match (self, receiver) {
            (Self::Optional(sender), Self::Optional(inner)) => sender.is_compatible_with(inner),
            (Self::Union(members), _) => members.iter().all(|m| m.is_compatible_with(receiver)),
            (_, Self::Optional(inner)) => self.is_compatible_with(inner),
            (_, Self::Union(members)) => members.iter().any(|m| self.is_compatible_with(m)),
            (Self::List(sender), Self::List(inner)) | (Self::Map(sender), Self::Map(inner)) => {
                sender.is_compatible_with(inner)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Path => write!(f, "Path"),
            Self::Document => write!(f, "Document"),
            Self::ByteStream => write!(f, "ByteStream"),
            Self::List(inner) => write!(f, "List[{inner}]"),
            Self::Map(inner) => write!(f, "Dict[str, {inner}]"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Union(members) => {
                let names: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "Union[{}]", names.join(", "))
            }
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// How many senders an input socket accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Exactly one sender.
    #[default]
    Single,
    /// Any number of senders; the component waits for all that can still deliver.
    Variadic,
    /// Any number of senders; the component runs as soon as one value arrives.
    GreedyVariadic,
}

/// An input connection point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSocket {
    /// Socket name, unique among the component's inputs.
    pub name: String,
    /// Declared type. For variadic sockets this is the element type.
    pub socket_type: SocketType,
    /// Value used when nothing is delivered. `None` makes the input mandatory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Cardinality.
    #[serde(default)]
    pub kind: InputKind,
}

impl InputSocket {
    /// Creates a mandatory single-sender input.
    #[must_use]
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            socket_type,
            default: None,
            kind: InputKind::Single,
        }
    }

    /// Makes the input optional with the given default.
    #[must_use]
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Accepts any number of senders and collects their values into a list.
    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.kind = InputKind::Variadic;
        self
    }

    /// Like [`InputSocket::variadic`], but does not wait for every sender.
    #[must_use]
    pub fn greedy(mut self) -> Self {
        self.kind = InputKind::GreedyVariadic;
        self
    }

    /// True if a value must be delivered before the component can run.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.default.is_none()
    }

    /// True if the socket accepts several senders.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, InputKind::Variadic | InputKind::GreedyVariadic)
    }

    /// True for greedy variadic sockets.
    #[must_use]
    pub fn is_greedy(&self) -> bool {
        matches!(self.kind, InputKind::GreedyVariadic)
    }
}

/// An output connection point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSocket {
    /// Socket name, unique among the component's outputs.
    pub name: String,
    /// Declared type.
    pub socket_type: SocketType,
}

impl OutputSocket {
    /// Creates an output socket.
    #[must_use]
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            socket_type,
        }
    }
}
