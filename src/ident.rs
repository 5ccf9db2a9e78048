//! Utility functions for working with identifiers.
//!
//! Every generated name for a service is derived here, once, so that the
//! separate emission passes (interfaces, client implementation, server stubs,
//! handlers and the descriptor table) all print byte-identical identifiers.

use std::collections::BTreeSet;
use std::fmt;

/// Converts a Protobuf name to an exported Go identifier.
///
/// An interior underscore followed by a lower case letter is dropped and the
/// letter is upper cased; a leading underscore becomes `X`. Digits and upper
/// case letters are kept as they are, which makes the conversion idempotent on
/// names that are already camel cased. `_my_field_name_2` becomes `XMyFieldName_2`.
pub fn camel_case(s: &str) -> String {
    // protoc does not allow non-ascii identifiers.
    let bytes = s.as_bytes();
    let mut ident = Vec::with_capacity(bytes.len() + 1);

    let mut i = 0;
    if bytes.first() == Some(&b'_') {
        ident.push(b'X');
        i += 1;
    }

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'_' && bytes.get(i + 1).map_or(false, u8::is_ascii_lowercase) {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            ident.push(c);
            i += 1;
            continue;
        }

        // Start of a word: it must be upper case, and swallows the lower case run after it.
        ident.push(c.to_ascii_uppercase());
        i += 1;
        while let Some(&next) = bytes.get(i).filter(|b| b.is_ascii_lowercase()) {
            ident.push(next);
            i += 1;
        }
    }

    String::from_utf8_lossy(&ident).into_owned()
}

/// Lowercases the first character of an identifier, leaving the rest unchanged.
pub fn unexport(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Method names that would collide with members the runtime adds to generated
/// client types. A reserved name gets a trailing underscore.
///
/// The set is empty unless configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservedNames {
    names: BTreeSet<String>,
}

impl ReservedNames {
    pub fn new() -> ReservedNames {
        ReservedNames::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns the name, suffixed with `_` if it is reserved.
    pub fn apply(&self, name: String) -> String {
        if self.is_reserved(&name) {
            name + "_"
        } else {
            name
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ReservedNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ReservedNames {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a generated identifier names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentRole {
    ClientInterface,
    ClientStruct,
    ClientConstructor,
    ServerInterface,
    UnimplementedServer,
    ServerRegistration,
    ServiceDesc,
    Method,
    ClientStreamInterface,
    ClientStreamStruct,
    ServerStreamInterface,
    ServerStreamStruct,
    Handler,
}

/// A generated Go identifier together with what it names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GoIdent {
    pub name: String,
    pub role: IdentRole,
}

impl GoIdent {
    fn new(name: String, role: IdentRole) -> GoIdent {
        GoIdent { name, role }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for GoIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The identifiers derived from a service name.
#[derive(Clone, Debug)]
pub struct ServiceIdents {
    /// The camel cased service name.
    pub go_name: String,
    /// `<Service>Client`
    pub client_interface: GoIdent,
    /// `<service>Client`
    pub client_struct: GoIdent,
    /// `New<Service>Client`
    pub new_client: GoIdent,
    /// `<Service>Server`
    pub server_interface: GoIdent,
    /// `Unimplemented<Service>Server`
    pub unimplemented_server: GoIdent,
    /// `Register<Service>Server`
    pub register_server: GoIdent,
    /// `_<Service>_serviceDesc`
    pub service_desc: GoIdent,
}

impl ServiceIdents {
    /// Derives the identifiers from the camel cased service name.
    pub fn new(go_name: &str) -> ServiceIdents {
        let go_name = go_name.to_owned();
        let unexported = unexport(&go_name);
        ServiceIdents {
            client_interface: GoIdent::new(
                format!("{}Client", go_name),
                IdentRole::ClientInterface,
            ),
            client_struct: GoIdent::new(format!("{}Client", unexported), IdentRole::ClientStruct),
            new_client: GoIdent::new(
                format!("New{}Client", go_name),
                IdentRole::ClientConstructor,
            ),
            server_interface: GoIdent::new(
                format!("{}Server", go_name),
                IdentRole::ServerInterface,
            ),
            unimplemented_server: GoIdent::new(
                format!("Unimplemented{}Server", go_name),
                IdentRole::UnimplementedServer,
            ),
            register_server: GoIdent::new(
                format!("Register{}Server", go_name),
                IdentRole::ServerRegistration,
            ),
            service_desc: GoIdent::new(
                format!("_{}_serviceDesc", go_name),
                IdentRole::ServiceDesc,
            ),
            go_name,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoIdent> {
        [
            &self.client_interface,
            &self.client_struct,
            &self.new_client,
            &self.server_interface,
            &self.unimplemented_server,
            &self.register_server,
            &self.service_desc,
        ]
        .into_iter()
    }
}

/// The identifiers derived from a method of a service.
#[derive(Clone, Debug)]
pub struct MethodIdents {
    /// The canonical Go method name, used for interface members, stubs and
    /// handler dispatch.
    pub method: GoIdent,
    /// `<Service>_<Method>Client`
    pub client_stream_interface: GoIdent,
    /// `<service><Method>Client`
    pub client_stream_struct: GoIdent,
    /// `<Service>_<Method>Server`
    pub server_stream_interface: GoIdent,
    /// `<service><Method>Server`
    pub server_stream_struct: GoIdent,
    /// `_<Service>_<Method>_Handler`
    pub handler: GoIdent,
}

impl MethodIdents {
    pub fn new(
        service: &ServiceIdents,
        proto_name: &str,
        reserved: &ReservedNames,
    ) -> MethodIdents {
        let camel = camel_case(proto_name);
        let service_name = &service.go_name;
        let unexported = unexport(service_name);
        MethodIdents {
            method: GoIdent::new(reserved.apply(camel.clone()), IdentRole::Method),
            client_stream_interface: GoIdent::new(
                format!("{}_{}Client", service_name, camel),
                IdentRole::ClientStreamInterface,
            ),
            client_stream_struct: GoIdent::new(
                format!("{}{}Client", unexported, camel),
                IdentRole::ClientStreamStruct,
            ),
            server_stream_interface: GoIdent::new(
                format!("{}_{}Server", service_name, camel),
                IdentRole::ServerStreamInterface,
            ),
            server_stream_struct: GoIdent::new(
                format!("{}{}Server", unexported, camel),
                IdentRole::ServerStreamStruct,
            ),
            handler: GoIdent::new(
                format!("_{}_{}_Handler", service_name, camel),
                IdentRole::Handler,
            ),
        }
    }

    /// Identifiers which are declared at package scope (the method name is not).
    pub fn declared(&self) -> impl Iterator<Item = &GoIdent> {
        [
            &self.client_stream_interface,
            &self.client_stream_struct,
            &self.server_stream_interface,
            &self.server_stream_struct,
            &self.handler,
        ]
        .into_iter()
    }
}
