//! Classification of RPC methods by streaming mode.

/// The four structurally different kinds of RPC method.
///
/// The shape decides which signatures are built for a method, which stream
/// accessors its generated stream types carry, and which bucket of the service
/// descriptor table it is registered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodShape {
    /// One request, one response.
    Unary,
    /// One request, a sequence of responses.
    ServerStreaming,
    /// A sequence of requests, one response.
    ClientStreaming,
    /// Independent sequences of requests and responses over one stream.
    BidiStreaming,
}

impl MethodShape {
    pub fn classify(client_streaming: bool, server_streaming: bool) -> MethodShape {
        match (client_streaming, server_streaming) {
            (false, false) => MethodShape::Unary,
            (false, true) => MethodShape::ServerStreaming,
            (true, false) => MethodShape::ClientStreaming,
            (true, true) => MethodShape::BidiStreaming,
        }
    }

    pub fn client_streams(self) -> bool {
        matches!(
            self,
            MethodShape::ClientStreaming | MethodShape::BidiStreaming
        )
    }

    pub fn server_streams(self) -> bool {
        matches!(
            self,
            MethodShape::ServerStreaming | MethodShape::BidiStreaming
        )
    }

    /// Whether the method is registered as a stream rather than a unary method.
    pub fn is_streaming(self) -> bool {
        self != MethodShape::Unary
    }

    /// Accessors of the client-side stream type, in emission order.
    ///
    /// Unary methods have no stream type, so the set is empty for them.
    pub fn client_stream_members(self) -> Vec<StreamMember> {
        if !self.is_streaming() {
            return Vec::new();
        }
        let mut members = Vec::with_capacity(2);
        if self.client_streams() {
            members.push(StreamMember::Send);
        }
        if self.server_streams() {
            members.push(StreamMember::Recv);
        } else {
            members.push(StreamMember::CloseAndRecv);
        }
        members
    }

    /// Accessors of the server-side stream type, in emission order.
    ///
    /// Unary methods have no stream type, so the set is empty for them.
    pub fn server_stream_members(self) -> Vec<StreamMember> {
        if !self.is_streaming() {
            return Vec::new();
        }
        let mut members = Vec::with_capacity(2);
        if self.server_streams() {
            members.push(StreamMember::Send);
        } else {
            members.push(StreamMember::SendAndClose);
        }
        if self.client_streams() {
            members.push(StreamMember::Recv);
        }
        members
    }
}

/// An accessor method on a generated stream type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMember {
    Send,
    Recv,
    CloseAndRecv,
    SendAndClose,
}

impl StreamMember {
    pub fn name(self) -> &'static str {
        match self {
            StreamMember::Send => "Send",
            StreamMember::Recv => "Recv",
            StreamMember::CloseAndRecv => "CloseAndRecv",
            StreamMember::SendAndClose => "SendAndClose",
        }
    }
}
