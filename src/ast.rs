use prost_types::source_code_info::Location;

use crate::fully_qualified_name::FullyQualifiedName;
use crate::shape::MethodShape;

/// Comments on a Protobuf item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comments {
    /// Leading comments, one entry per line.
    pub leading: Vec<String>,
}

impl Comments {
    pub(crate) fn from_location(location: &Location) -> Comments {
        let leading = location
            .leading_comments
            .as_deref()
            .map(|comments| comments.trim_end_matches('\n'))
            .filter(|comments| !comments.is_empty())
            .map_or_else(Vec::new, |comments| {
                comments.split('\n').map(str::to_owned).collect()
            });
        Comments { leading }
    }

    pub fn is_empty(&self) -> bool {
        self.leading.is_empty()
    }

    /// The comment as Go `//` lines. Text is kept verbatim, so the usual
    /// leading space of a Protobuf comment ends up after the slashes.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.leading.iter().map(|line| format!("//{}", line))
    }
}

/// A service descriptor.
#[derive(Clone, Debug)]
pub struct Service {
    /// The service name in Go style.
    pub name: String,
    /// The service name as it appears in the .proto file.
    pub proto_name: String,
    /// The package name as it appears in the .proto file.
    pub package: String,
    /// The service comments.
    pub comments: Comments,
    /// The service methods, in declaration order.
    pub methods: Vec<Method>,
    /// Whether the service is marked `deprecated`.
    pub deprecated: bool,
}

impl Service {
    /// The package-qualified service name, e.g. `helloworld.Greeter`.
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.proto_name.clone()
        } else {
            format!("{}.{}", self.package, self.proto_name)
        }
    }
}

/// A service method descriptor.
#[derive(Clone, Debug)]
pub struct Method {
    /// The name of the method in Go style.
    pub name: String,
    /// The name of the method as it appears in the .proto file.
    pub proto_name: String,
    /// The method comments.
    pub comments: Comments,
    /// The input Protobuf type.
    pub input_type: FullyQualifiedName,
    /// The output Protobuf type.
    pub output_type: FullyQualifiedName,
    /// Identifies if client streams multiple client messages.
    pub client_streaming: bool,
    /// Identifies if server streams multiple server messages.
    pub server_streaming: bool,
    /// Whether the method is marked `deprecated`.
    pub deprecated: bool,
}

impl Method {
    pub fn shape(&self) -> MethodShape {
        MethodShape::classify(self.client_streaming, self.server_streaming)
    }
}
