//! Method signatures of the generated client and server interfaces.

use itertools::Itertools;

use crate::ast::Method;
use crate::ident::MethodIdents;
use crate::shape::{MethodShape, StreamMember};

/// Aliases under which the runtime packages are imported in the generated file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packages {
    /// The standard library `context` package.
    pub context: String,
    /// The kite RPC runtime package.
    pub kite: String,
}

/// A method with everything the emitters need computed up front: its shape,
/// its identifiers and its printable input and output type names.
#[derive(Clone, Debug)]
pub struct ResolvedMethod<'a> {
    pub method: &'a Method,
    pub shape: MethodShape,
    pub idents: MethodIdents,
    pub input: String,
    pub output: String,
}

struct Param {
    name: &'static str,
    ty: String,
}

impl ResolvedMethod<'_> {
    /// `Name(ctx context.Context[, in *In], opts ...kite.CallOption) (Ret, error)`
    pub fn client_signature(&self, pkgs: &Packages) -> String {
        let req_arg = if self.shape.client_streams() {
            String::new()
        } else {
            format!(", in *{}", self.input)
        };
        let ret = if self.shape.is_streaming() {
            self.idents.client_stream_interface.to_string()
        } else {
            format!("*{}", self.output)
        };
        format!(
            "{}(ctx {}.Context{}, opts ...{}.CallOption) ({}, error)",
            self.idents.method, pkgs.context, req_arg, pkgs.kite, ret
        )
    }

    fn server_params(&self, pkgs: &Packages) -> Vec<Param> {
        let mut params = Vec::with_capacity(2);
        if !self.shape.is_streaming() {
            params.push(Param {
                name: "ctx",
                ty: format!("{}.Context", pkgs.context),
            });
        }
        if !self.shape.client_streams() {
            params.push(Param {
                name: "req",
                ty: format!("*{}", self.input),
            });
        }
        if self.shape.is_streaming() {
            params.push(Param {
                name: "srv",
                ty: self.idents.server_stream_interface.to_string(),
            });
        }
        params
    }

    fn server_return(&self) -> String {
        if self.shape.is_streaming() {
            "error".to_owned()
        } else {
            format!("(*{}, error)", self.output)
        }
    }

    /// The server interface member, with unnamed parameters.
    pub fn server_signature(&self, pkgs: &Packages) -> String {
        format!(
            "{}({}) {}",
            self.idents.method,
            self.server_params(pkgs).into_iter().map(|param| param.ty).join(", "),
            self.server_return()
        )
    }

    /// The server method header with named parameters, as used by the
    /// unimplemented server stubs.
    pub fn server_signature_with_param_names(&self, pkgs: &Packages) -> String {
        format!(
            "{}({}) {}",
            self.idents.method,
            self.server_params(pkgs)
                .into_iter()
                .map(|param| format!("{} {}", param.name, param.ty))
                .join(", "),
            self.server_return()
        )
    }

    fn stream_member(&self, member: StreamMember, sent: &str, received: &str) -> String {
        match member {
            StreamMember::Send | StreamMember::SendAndClose => {
                format!("{}(*{}) error", member.name(), sent)
            }
            StreamMember::Recv | StreamMember::CloseAndRecv => {
                format!("{}() (*{}, error)", member.name(), received)
            }
        }
    }

    /// Members of the client-side stream interface, without the embedded
    /// runtime stream.
    pub fn client_stream_members(&self) -> Vec<String> {
        self.shape
            .client_stream_members()
            .into_iter()
            .map(|member| self.stream_member(member, &self.input, &self.output))
            .collect()
    }

    /// Members of the server-side stream interface, without the embedded
    /// runtime stream.
    pub fn server_stream_members(&self) -> Vec<String> {
        self.shape
            .server_stream_members()
            .into_iter()
            .map(|member| self.stream_member(member, &self.output, &self.input))
            .collect()
    }
}
