//! Emission of kite client and server bindings for the services of a file.
//!
//! A service is emitted in four phases: the client and server interfaces; the
//! client implementation with its stream types; the unimplemented server and
//! the registration function; the dispatch handlers with their stream types,
//! followed by the service descriptor table. Descriptor table slots are
//! assigned once, up front, so the slot a client method opens its stream with
//! is the slot the table places that method's handler in.

use log::trace;

use crate::ast::Service;
use crate::ident::{GoIdent, MethodIdents, ReservedNames, ServiceIdents};
use crate::printer::{quote, Printer};
use crate::resolver::{ImportRegistry, TypeResolver};
use crate::shape::{MethodShape, StreamMember};
use crate::signature::{Packages, ResolvedMethod};

/// The version of the generated code. Generated files reference the runtime
/// constant `SupportPackageIsVersion<N>`, so a runtime that drops support for
/// this version fails to compile against them.
pub const GENERATED_CODE_VERSION: u32 = 6;

const CONTEXT_PACKAGE: &str = "context";

const DEPRECATION_COMMENT: &str = "Deprecated: Do not use.";

/// A method's entry in the service descriptor table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescSlot {
    /// Position in the `Methods` bucket.
    Method(usize),
    /// Position in the `Streams` bucket.
    Stream(usize),
}

impl DescSlot {
    /// The Go expression addressing the entry, e.g. `&_Chat_serviceDesc.Streams[0]`.
    pub fn expr(self, service_desc: &GoIdent) -> String {
        match self {
            DescSlot::Method(idx) => format!("&{}.Methods[{}]", service_desc, idx),
            DescSlot::Stream(idx) => format!("&{}.Streams[{}]", service_desc, idx),
        }
    }
}

/// The next free position in each bucket of the service descriptor table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescIndex {
    pub methods: usize,
    pub streams: usize,
}

impl DescIndex {
    /// Takes the next slot of the bucket a method of `shape` belongs to.
    pub fn assign(self, shape: MethodShape) -> (DescSlot, DescIndex) {
        if shape.is_streaming() {
            let slot = DescSlot::Stream(self.streams);
            (slot, DescIndex { streams: self.streams + 1, ..self })
        } else {
            let slot = DescSlot::Method(self.methods);
            (slot, DescIndex { methods: self.methods + 1, ..self })
        }
    }
}

/// Assigns descriptor table slots to methods in declaration order.
pub fn assign_slots<I>(shapes: I) -> Vec<DescSlot>
where
    I: IntoIterator<Item = MethodShape>,
{
    shapes
        .into_iter()
        .scan(DescIndex::default(), |index, shape| {
            let (slot, next) = index.assign(shape);
            *index = next;
            Some(slot)
        })
        .collect()
}

/// Method positions (in declaration order) of each descriptor table bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableBuckets {
    pub methods: Vec<usize>,
    pub streams: Vec<usize>,
}

impl TableBuckets {
    pub fn new(slots: &[DescSlot]) -> TableBuckets {
        let mut buckets = TableBuckets::default();
        for (position, slot) in slots.iter().enumerate() {
            match *slot {
                DescSlot::Method(idx) => {
                    debug_assert_eq!(idx, buckets.methods.len());
                    buckets.methods.push(position);
                }
                DescSlot::Stream(idx) => {
                    debug_assert_eq!(idx, buckets.streams.len());
                    buckets.streams.push(position);
                }
            }
        }
        buckets
    }
}

/// Everything derived from one service before any of it is emitted.
struct ServicePlan<'s> {
    service: &'s Service,
    idents: ServiceIdents,
    full_name: String,
    methods: Vec<ResolvedMethod<'s>>,
    slots: Vec<DescSlot>,
}

/// Generates kite bindings for services.
///
/// The generator is handed a host which resolves type references and
/// registers imports; it holds no state of its own across services.
pub struct ServiceGenerator<'a, H> {
    host: &'a mut H,
    runtime_package: &'a str,
    reserved: &'a ReservedNames,
}

impl<'a, H> ServiceGenerator<'a, H>
where
    H: TypeResolver + ImportRegistry,
{
    pub fn new(
        host: &'a mut H,
        runtime_package: &'a str,
        reserved: &'a ReservedNames,
    ) -> ServiceGenerator<'a, H> {
        ServiceGenerator {
            host,
            runtime_package,
            reserved,
        }
    }

    /// Emits the bindings for `services`, declared in the `.proto` file
    /// `file_name`. Nothing is emitted for an empty list of services.
    pub fn generate(&mut self, file_name: &str, services: &[Service], out: &mut Printer<'_>) {
        if services.is_empty() {
            return;
        }

        let pkgs = Packages {
            context: self.host.add_import(CONTEXT_PACKAGE),
            kite: self.host.add_import(self.runtime_package),
        };

        out.comment("Reference imports to suppress errors if they are not otherwise used.");
        out.line(format!("var _ {}.Context", pkgs.context));
        out.line(format!("var _ {}.ClientConnInterface", pkgs.kite));
        out.blank();
        out.comment("This is a compile-time assertion to ensure that this generated file");
        out.comment("is compatible with the kite package it is being compiled against.");
        out.line(format!(
            "const _ = {}.SupportPackageIsVersion{}",
            pkgs.kite, GENERATED_CODE_VERSION
        ));

        for service in services {
            self.push_service(file_name, service, &pkgs, out);
        }
    }

    fn push_service(
        &mut self,
        file_name: &str,
        service: &Service,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let plan = self.plan(service);

        self.push_client_interface(&plan, pkgs, out);
        self.push_server_interface(&plan, pkgs, out);

        self.push_client(&plan, pkgs, out);

        self.push_unimplemented_server(&plan, pkgs, out);
        self.push_server_registration(&plan, pkgs, out);

        let handlers = plan
            .methods
            .iter()
            .map(|method| self.push_handler(&plan, method, pkgs, out))
            .collect::<Vec<_>>();

        self.push_service_desc(file_name, &plan, &handlers, pkgs, out);
    }

    fn plan<'s>(&mut self, service: &'s Service) -> ServicePlan<'s> {
        let idents = ServiceIdents::new(&service.name);

        let mut methods = Vec::with_capacity(service.methods.len());
        for method in &service.methods {
            methods.push(ResolvedMethod {
                method,
                shape: method.shape(),
                idents: MethodIdents::new(&idents, &method.proto_name, self.reserved),
                input: self.host.resolve(&method.input_type),
                output: self.host.resolve(&method.output_type),
            });
        }

        let slots = assign_slots(methods.iter().map(|method| method.shape));
        for (method, slot) in methods.iter().zip(&slots) {
            trace!("  method: {:?}, {:?}, {:?}", method.method.proto_name, method.shape, slot);
        }

        ServicePlan {
            service,
            full_name: service.full_name(),
            idents,
            methods,
            slots,
        }
    }

    /// The service's own comments, appended to a type's doc comment.
    fn push_service_doc(&self, plan: &ServicePlan<'_>, out: &mut Printer<'_>) {
        if !plan.service.comments.is_empty() {
            out.comment("");
            for line in plan.service.comments.lines() {
                out.line(line);
            }
        }
        if plan.service.deprecated {
            out.comment("");
            out.comment(DEPRECATION_COMMENT);
        }
    }

    fn push_member_doc(&self, method: &ResolvedMethod<'_>, out: &mut Printer<'_>) {
        for line in method.method.comments.lines() {
            out.line(line);
        }
        if method.method.deprecated {
            out.comment("");
            out.comment(DEPRECATION_COMMENT);
        }
    }

    fn push_client_interface(
        &self,
        plan: &ServicePlan<'_>,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let idents = &plan.idents;

        out.blank();
        out.comment(format!(
            "{} is the client API for {} service.",
            idents.client_interface, idents.go_name
        ));
        out.comment("");
        out.comment(
            "For semantics around ctx use and closing/ending streaming RPCs, please refer to https://godoc.org/google.golang.org/grpc#ClientConn.NewStream.",
        );
        self.push_service_doc(plan, out);
        out.open(format!("type {} interface {{", idents.client_interface));
        for method in &plan.methods {
            self.push_member_doc(method, out);
            out.line(method.client_signature(pkgs));
        }
        out.close("}");
    }

    fn push_client(&self, plan: &ServicePlan<'_>, pkgs: &Packages, out: &mut Printer<'_>) {
        let idents = &plan.idents;

        out.blank();
        out.open(format!("type {} struct {{", idents.client_struct));
        out.line(format!("cc {}.ClientConnInterface", pkgs.kite));
        out.close("}");

        out.blank();
        if plan.service.deprecated {
            out.comment(DEPRECATION_COMMENT);
        }
        out.open(format!(
            "func {}(cc {}.ClientConnInterface) {} {{",
            idents.new_client, pkgs.kite, idents.client_interface
        ));
        out.line(format!("return &{}{{cc}}", idents.client_struct));
        out.close("}");

        for (method, slot) in plan.methods.iter().zip(&plan.slots) {
            self.push_client_method(plan, method, *slot, pkgs, out);
        }
    }

    fn push_client_method(
        &self,
        plan: &ServicePlan<'_>,
        method: &ResolvedMethod<'_>,
        slot: DescSlot,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let full_method = format!("/{}/{}", plan.full_name, method.method.proto_name);

        out.blank();
        if method.method.deprecated {
            out.comment(DEPRECATION_COMMENT);
        }
        out.open(format!(
            "func (c *{}) {} {{",
            plan.idents.client_struct,
            method.client_signature(pkgs)
        ));

        // Unary calls are addressed by method name alone; their slot only
        // orders the `Methods` bucket of the descriptor table.
        if !method.shape.is_streaming() {
            out.line(format!("out := new({})", method.output));
            out.line(format!(
                "err := c.cc.Invoke(ctx, {}, in, out, opts...)",
                quote(&full_method)
            ));
            out.return_on_err("err != nil", "nil, err");
            out.line("return out, nil");
            out.close("}");
            return;
        }

        out.line(format!(
            "stream, err := c.cc.NewStream(ctx, {}, {}, opts...)",
            slot.expr(&plan.idents.service_desc),
            quote(&full_method)
        ));
        out.return_on_err("err != nil", "nil, err");
        out.line(format!("x := &{}{{stream}}", method.idents.client_stream_struct));
        if !method.shape.client_streams() {
            out.return_on_err("err := x.ClientStream.SendMsg(in); err != nil", "nil, err");
            out.return_on_err("err := x.ClientStream.CloseSend(); err != nil", "nil, err");
        }
        out.line("return x, nil");
        out.close("}");

        out.blank();
        out.open(format!("type {} interface {{", method.idents.client_stream_interface));
        for member in method.client_stream_members() {
            out.line(member);
        }
        out.line(format!("{}.ClientStream", pkgs.kite));
        out.close("}");

        out.blank();
        out.open(format!("type {} struct {{", method.idents.client_stream_struct));
        out.line(format!("{}.ClientStream", pkgs.kite));
        out.close("}");

        for member in method.shape.client_stream_members() {
            push_stream_method(
                &method.idents.client_stream_struct,
                "ClientStream",
                member,
                &method.input,
                &method.output,
                out,
            );
        }
    }

    fn push_server_interface(
        &self,
        plan: &ServicePlan<'_>,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let idents = &plan.idents;

        out.blank();
        out.comment(format!(
            "{} is the server API for {} service.",
            idents.server_interface, idents.go_name
        ));
        self.push_service_doc(plan, out);
        out.open(format!("type {} interface {{", idents.server_interface));
        for method in &plan.methods {
            self.push_member_doc(method, out);
            out.line(method.server_signature(pkgs));
        }
        out.close("}");
    }

    fn push_unimplemented_server(
        &mut self,
        plan: &ServicePlan<'_>,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let unimplemented = &plan.idents.unimplemented_server;

        out.blank();
        if plan.service.deprecated {
            out.comment(DEPRECATION_COMMENT);
        }
        out.comment(format!(
            "{} can be embedded to have forward compatible implementations.",
            unimplemented
        ));
        out.open(format!("type {} struct {{", unimplemented));
        out.close("}");

        if plan.methods.is_empty() {
            return;
        }

        let status = self.host.add_import(&format!("{}/status", self.runtime_package));
        let codes = self.host.add_import(&format!("{}/codes", self.runtime_package));

        for method in &plan.methods {
            let nil_arg = if method.shape.is_streaming() { "" } else { "nil, " };

            out.blank();
            out.open(format!(
                "func (*{}) {} {{",
                unimplemented,
                method.server_signature_with_param_names(pkgs)
            ));
            out.line(format!(
                "return {}{}.Errorf({}.Unimplemented, {})",
                nil_arg,
                status,
                codes,
                quote(&format!("method {} not implemented", method.method.name))
            ));
            out.close("}");
        }
    }

    fn push_server_registration(
        &self,
        plan: &ServicePlan<'_>,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let idents = &plan.idents;

        out.blank();
        if plan.service.deprecated {
            out.comment(DEPRECATION_COMMENT);
        }
        out.open(format!(
            "func {}(s *{}.Server, srv {}) {{",
            idents.register_server, pkgs.kite, idents.server_interface
        ));
        out.line(format!("s.RegisterService(&{}, srv)", idents.service_desc));
        out.close("}");
    }

    /// Emits the dispatch handler of a method, and the server stream type of a
    /// streaming method. Returns the handler's name.
    fn push_handler(
        &self,
        plan: &ServicePlan<'_>,
        method: &ResolvedMethod<'_>,
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) -> String {
        let handler = &method.idents.handler;
        let server = &plan.idents.server_interface;
        let name = &method.idents.method;

        out.blank();
        if !method.shape.is_streaming() {
            out.open(format!(
                "func {}(srv interface{{}}, ctx {}.Context, dec func(interface{{}}) error, interceptor {}.UnaryServerInterceptor) (interface{{}}, error) {{",
                handler, pkgs.context, pkgs.kite
            ));
            out.line(format!("in := new({})", method.input));
            out.return_on_err("err := dec(in); err != nil", "nil, err");
            out.open("if interceptor == nil {");
            out.line(format!("return srv.({}).{}(ctx, in)", server, name));
            out.close("}");
            out.open(format!("info := &{}.UnaryServerInfo{{", pkgs.kite));
            out.fields(&[
                ("Server", "srv".to_owned()),
                (
                    "FullMethod",
                    quote(&format!("/{}/{}", plan.full_name, method.method.name)),
                ),
            ]);
            out.close("}");
            out.open(format!(
                "handler := func(ctx {}.Context, req interface{{}}) (interface{{}}, error) {{",
                pkgs.context
            ));
            out.line(format!(
                "return srv.({}).{}(ctx, req.(*{}))",
                server, name, method.input
            ));
            out.close("}");
            out.line("return interceptor(ctx, in, info, handler)");
            out.close("}");
            return handler.to_string();
        }

        let stream_struct = &method.idents.server_stream_struct;
        out.open(format!(
            "func {}(srv interface{{}}, stream {}.ServerStream) error {{",
            handler, pkgs.kite
        ));
        if method.shape.client_streams() {
            out.line(format!(
                "return srv.({}).{}(&{}{{stream}})",
                server, name, stream_struct
            ));
        } else {
            out.line(format!("m := new({})", method.input));
            out.return_on_err("err := stream.RecvMsg(m); err != nil", "err");
            out.line(format!(
                "return srv.({}).{}(m, &{}{{stream}})",
                server, name, stream_struct
            ));
        }
        out.close("}");

        out.blank();
        out.open(format!("type {} interface {{", method.idents.server_stream_interface));
        for member in method.server_stream_members() {
            out.line(member);
        }
        out.line(format!("{}.ServerStream", pkgs.kite));
        out.close("}");

        out.blank();
        out.open(format!("type {} struct {{", stream_struct));
        out.line(format!("{}.ServerStream", pkgs.kite));
        out.close("}");

        for member in method.shape.server_stream_members() {
            push_stream_method(
                stream_struct,
                "ServerStream",
                member,
                &method.output,
                &method.input,
                out,
            );
        }

        handler.to_string()
    }

    fn push_service_desc(
        &self,
        file_name: &str,
        plan: &ServicePlan<'_>,
        handlers: &[String],
        pkgs: &Packages,
        out: &mut Printer<'_>,
    ) {
        let idents = &plan.idents;
        let buckets = TableBuckets::new(&plan.slots);

        out.blank();
        out.open(format!("var {} = {}.ServiceDesc{{", idents.service_desc, pkgs.kite));

        // Single-line entries are aligned in runs; a multi-line entry ends a run.
        let mut run = vec![
            ("ServiceName", quote(&plan.full_name)),
            ("HandlerType", format!("(*{})(nil)", idents.server_interface)),
        ];

        if buckets.methods.is_empty() {
            run.push(("Methods", format!("[]{}.MethodDesc{{}}", pkgs.kite)));
        } else {
            out.fields(&run);
            run.clear();
            out.open(format!("Methods: []{}.MethodDesc{{", pkgs.kite));
            for &position in &buckets.methods {
                out.open("{");
                out.fields(&[
                    ("MethodName", quote(&plan.methods[position].method.proto_name)),
                    ("Handler", handlers[position].clone()),
                ]);
                out.close("},");
            }
            out.close("},");
        }

        if buckets.streams.is_empty() {
            run.push(("Streams", format!("[]{}.StreamDesc{{}}", pkgs.kite)));
        } else {
            out.fields(&run);
            run.clear();
            out.open(format!("Streams: []{}.StreamDesc{{", pkgs.kite));
            for &position in &buckets.streams {
                let method = &plan.methods[position];
                let mut fields = vec![
                    ("StreamName", quote(&method.method.proto_name)),
                    ("Handler", handlers[position].clone()),
                ];
                if method.shape.server_streams() {
                    fields.push(("ServerStreams", "true".to_owned()));
                }
                if method.shape.client_streams() {
                    fields.push(("ClientStreams", "true".to_owned()));
                }
                out.open("{");
                out.fields(&fields);
                out.close("},");
            }
            out.close("},");
        }

        run.push(("Metadata", quote(file_name)));
        out.fields(&run);
        out.close("}");
    }
}

/// Emits one accessor method of a stream wrapper struct, which embeds the
/// runtime stream as `field`.
fn push_stream_method(
    stream_struct: &GoIdent,
    field: &str,
    member: StreamMember,
    sent: &str,
    received: &str,
    out: &mut Printer<'_>,
) {
    out.blank();
    match member {
        StreamMember::Send | StreamMember::SendAndClose => {
            out.open(format!(
                "func (x *{}) {}(m *{}) error {{",
                stream_struct,
                member.name(),
                sent
            ));
            out.line(format!("return x.{}.SendMsg(m)", field));
        }
        StreamMember::Recv | StreamMember::CloseAndRecv => {
            out.open(format!(
                "func (x *{}) {}() (*{}, error) {{",
                stream_struct,
                member.name(),
                received
            ));
            if member == StreamMember::CloseAndRecv {
                out.return_on_err(
                    format!("err := x.{}.CloseSend(); err != nil", field),
                    "nil, err",
                );
            }
            out.line(format!("m := new({})", received));
            out.return_on_err(
                format!("err := x.{}.RecvMsg(m); err != nil", field),
                "nil, err",
            );
            out.line("return m, nil");
        }
    }
    out.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Comments, Method};
    use crate::fully_qualified_name::FullyQualifiedName;
    use proptest::prelude::*;

    const RUNTIME: &str = "git.dhgames.cn/svr_comm/kiteg";

    /// Prints bare message names and imports packages under their last path element.
    #[derive(Default)]
    struct Host {
        imports: Vec<String>,
    }

    impl TypeResolver for Host {
        fn resolve(&mut self, type_ref: &FullyQualifiedName) -> String {
            type_ref.name().to_owned()
        }
    }

    impl ImportRegistry for Host {
        fn add_import(&mut self, import_path: &str) -> String {
            if !self.imports.iter().any(|path| path == import_path) {
                self.imports.push(import_path.to_owned());
            }
            import_path.rsplit('/').next().unwrap().to_owned()
        }
    }

    fn method(name: &str, client_streaming: bool, server_streaming: bool) -> Method {
        Method {
            name: name.to_owned(),
            proto_name: name.to_owned(),
            comments: Comments::default(),
            input_type: FullyQualifiedName::new(
                "chat",
                &[] as &[&str],
                &format!("{}Request", name),
            ),
            output_type: FullyQualifiedName::new(
                "chat",
                &[] as &[&str],
                &format!("{}Response", name),
            ),
            client_streaming,
            server_streaming,
            deprecated: false,
        }
    }

    fn service(package: &str, name: &str, methods: Vec<Method>) -> Service {
        Service {
            name: name.to_owned(),
            proto_name: name.to_owned(),
            package: package.to_owned(),
            comments: Comments::default(),
            methods,
            deprecated: false,
        }
    }

    fn generate_with(services: &[Service], reserved: &ReservedNames) -> (String, Vec<String>) {
        let mut host = Host::default();
        let mut buf = String::new();
        let mut out = Printer::new(&mut buf);
        ServiceGenerator::new(&mut host, RUNTIME, reserved).generate(
            "chat.proto",
            services,
            &mut out,
        );
        (buf, host.imports)
    }

    fn generate(services: &[Service]) -> String {
        generate_with(services, &ReservedNames::new()).0
    }

    /// The lines of the block opened by `header`, up to its closing brace.
    fn block<'a>(output: &'a str, header: &str) -> Vec<&'a str> {
        let start = output
            .find(header)
            .unwrap_or_else(|| panic!("missing {:?} in:\n{}", header, output));
        output[start..]
            .lines()
            .skip(1)
            .take_while(|line| *line != "}")
            .map(str::trim)
            .collect()
    }

    #[test]
    fn test_no_services() {
        let (output, imports) = generate_with(&[], &ReservedNames::new());
        assert_eq!(output, "");
        assert!(imports.is_empty());
    }

    #[test]
    fn test_unary_service() {
        let output = generate(&[service("ping", "Ping", vec![method("Ping", false, false)])]);

        assert_eq!(
            block(&output, "type PingClient interface {"),
            vec![
                "Ping(ctx context.Context, in *PingRequest, opts ...kiteg.CallOption) (*PingResponse, error)"
            ]
        );
        assert_eq!(
            block(&output, "type PingServer interface {"),
            vec!["Ping(context.Context, *PingRequest) (*PingResponse, error)"]
        );
        assert!(output.contains(
            "func _Ping_Ping_Handler(srv interface{}, ctx context.Context, dec func(interface{}) error, interceptor kiteg.UnaryServerInterceptor) (interface{}, error) {\n"
        ));
        assert!(output.contains(
            "\terr := c.cc.Invoke(ctx, \"/ping.Ping/Ping\", in, out, opts...)\n"
        ));
        assert!(output.contains("\t\tFullMethod: \"/ping.Ping/Ping\",\n"));
        assert!(output.contains(
            "func (*UnimplementedPingServer) Ping(ctx context.Context, req *PingRequest) (*PingResponse, error) {\n\
             \treturn nil, status.Errorf(codes.Unimplemented, \"method Ping not implemented\")\n\
             }\n"
        ));
        assert!(output.ends_with(
            "var _Ping_serviceDesc = kiteg.ServiceDesc{\n\
             \tServiceName: \"ping.Ping\",\n\
             \tHandlerType: (*PingServer)(nil),\n\
             \tMethods: []kiteg.MethodDesc{\n\
             \t\t{\n\
             \t\t\tMethodName: \"Ping\",\n\
             \t\t\tHandler:    _Ping_Ping_Handler,\n\
             \t\t},\n\
             \t},\n\
             \tStreams:  []kiteg.StreamDesc{},\n\
             \tMetadata: \"chat.proto\",\n\
             }\n"
        ));
        assert!(!output.contains("c.cc.NewStream("));
    }

    #[test]
    fn test_service_go_name() {
        let mut guide = service("chat", "RouteGuide", vec![method("Chat", false, false)]);
        guide.proto_name = "route_guide".to_owned();
        let output = generate(&[guide]);

        assert!(output.contains("type RouteGuideClient interface {\n"));
        assert!(output.contains("func RegisterRouteGuideServer("));
        assert!(output.contains(
            "var _RouteGuide_serviceDesc = kiteg.ServiceDesc{\n\
             \tServiceName: \"chat.route_guide\",\n"
        ));
        assert!(output.contains("\"/chat.route_guide/Chat\""));
    }

    #[test]
    fn test_bidi_streaming_service() {
        let output = generate(&[service("chat", "Chat", vec![method("Chat", true, true)])]);

        assert_eq!(
            block(&output, "type Chat_ChatClient interface {"),
            vec![
                "Send(*ChatRequest) error",
                "Recv() (*ChatResponse, error)",
                "kiteg.ClientStream",
            ]
        );
        assert_eq!(
            block(&output, "type Chat_ChatServer interface {"),
            vec![
                "Send(*ChatResponse) error",
                "Recv() (*ChatRequest, error)",
                "kiteg.ServerStream",
            ]
        );
        assert!(!output.contains("CloseAndRecv"));
        assert!(!output.contains("SendAndClose"));

        assert!(output.contains(
            "\tstream, err := c.cc.NewStream(ctx, &_Chat_serviceDesc.Streams[0], \"/chat.Chat/Chat\", opts...)\n"
        ));
        assert_eq!(
            block(&output, "func _Chat_Chat_Handler("),
            vec!["return srv.(ChatServer).Chat(&chatChatServer{stream})"]
        );
        assert!(output.ends_with(
            "var _Chat_serviceDesc = kiteg.ServiceDesc{\n\
             \tServiceName: \"chat.Chat\",\n\
             \tHandlerType: (*ChatServer)(nil),\n\
             \tMethods:     []kiteg.MethodDesc{},\n\
             \tStreams: []kiteg.StreamDesc{\n\
             \t\t{\n\
             \t\t\tStreamName:    \"Chat\",\n\
             \t\t\tHandler:       _Chat_Chat_Handler,\n\
             \t\t\tServerStreams: true,\n\
             \t\t\tClientStreams: true,\n\
             \t\t},\n\
             \t},\n\
             \tMetadata: \"chat.proto\",\n\
             }\n"
        ));
    }

    #[test]
    fn test_server_streaming_method() {
        let output = generate(&[service("chat", "Chat", vec![method("Watch", false, true)])]);

        assert_eq!(
            block(&output, "func (c *chatClient) Watch("),
            vec![
                "stream, err := c.cc.NewStream(ctx, &_Chat_serviceDesc.Streams[0], \"/chat.Chat/Watch\", opts...)",
                "if err != nil {",
                "return nil, err",
                "}",
                "x := &chatWatchClient{stream}",
                "if err := x.ClientStream.SendMsg(in); err != nil {",
                "return nil, err",
                "}",
                "if err := x.ClientStream.CloseSend(); err != nil {",
                "return nil, err",
                "}",
                "return x, nil",
            ]
        );
        assert_eq!(
            block(&output, "func _Chat_Watch_Handler("),
            vec![
                "m := new(WatchRequest)",
                "if err := stream.RecvMsg(m); err != nil {",
                "return err",
                "}",
                "return srv.(ChatServer).Watch(m, &chatWatchServer{stream})",
            ]
        );
        assert_eq!(
            block(&output, "type Chat_WatchClient interface {"),
            vec!["Recv() (*WatchResponse, error)", "kiteg.ClientStream"]
        );
        assert_eq!(
            block(&output, "type Chat_WatchServer interface {"),
            vec!["Send(*WatchResponse) error", "kiteg.ServerStream"]
        );
        assert!(output.contains(
            "func (*UnimplementedChatServer) Watch(req *WatchRequest, srv Chat_WatchServer) error {\n\
             \treturn status.Errorf(codes.Unimplemented, \"method Watch not implemented\")\n\
             }\n"
        ));
    }

    #[test]
    fn test_client_streaming_method() {
        let output = generate(&[service("chat", "Chat", vec![method("Upload", true, false)])]);

        assert_eq!(
            block(&output, "type Chat_UploadClient interface {"),
            vec![
                "Send(*UploadRequest) error",
                "CloseAndRecv() (*UploadResponse, error)",
                "kiteg.ClientStream",
            ]
        );
        assert_eq!(
            block(&output, "type Chat_UploadServer interface {"),
            vec![
                "SendAndClose(*UploadResponse) error",
                "Recv() (*UploadRequest, error)",
                "kiteg.ServerStream",
            ]
        );
        assert_eq!(
            block(&output, "func (x *chatUploadClient) CloseAndRecv() (*UploadResponse, error) {"),
            vec![
                "if err := x.ClientStream.CloseSend(); err != nil {",
                "return nil, err",
                "}",
                "m := new(UploadResponse)",
                "if err := x.ClientStream.RecvMsg(m); err != nil {",
                "return nil, err",
                "}",
                "return m, nil",
            ]
        );
        assert_eq!(
            block(&output, "func (x *chatUploadServer) SendAndClose(m *UploadResponse) error {"),
            vec!["return x.ServerStream.SendMsg(m)"]
        );
        assert!(!output.contains("x.ClientStream.SendMsg(in)"));
        assert!(output.contains("\t\t\tClientStreams: true,\n"));
        assert!(!output.contains("ServerStreams: true"));
    }

    #[test]
    fn test_descriptor_slots_match_table_positions() {
        let methods = vec![
            method("First", false, false),
            method("Watch", false, true),
            method("Second", false, false),
            method("Chat", true, true),
            method("Upload", true, false),
            method("Third", false, false),
        ];
        let output = generate(&[service("mixed", "Mixed", methods.clone())]);

        let table = block(&output, "\tMethods: []kiteg.MethodDesc{");
        let unary = table
            .iter()
            .filter_map(|line| line.strip_prefix("MethodName: "))
            .collect::<Vec<_>>();
        assert_eq!(unary, vec!["\"First\",", "\"Second\",", "\"Third\","]);

        let streams_start = output.find("\tStreams: []kiteg.StreamDesc{").unwrap();
        let streams = output[streams_start..]
            .lines()
            .filter_map(|line| line.trim().strip_prefix("StreamName:"))
            .map(|name| name.trim().trim_end_matches(',').trim_matches('"'))
            .collect::<Vec<_>>();
        assert_eq!(streams, vec!["Watch", "Chat", "Upload"]);

        // Every client stream is opened with the slot its handler occupies in the table.
        for (idx, name) in streams.iter().enumerate() {
            let expected = format!(
                "c.cc.NewStream(ctx, &_Mixed_serviceDesc.Streams[{}], \"/mixed.Mixed/{}\", opts...)",
                idx, name
            );
            assert!(output.contains(&expected), "missing {}", expected);
        }

        let slots = assign_slots(methods.iter().map(Method::shape));
        assert_eq!(
            slots,
            vec![
                DescSlot::Method(0),
                DescSlot::Stream(0),
                DescSlot::Method(1),
                DescSlot::Stream(1),
                DescSlot::Stream(2),
                DescSlot::Method(2),
            ]
        );
        assert_eq!(
            TableBuckets::new(&slots),
            TableBuckets {
                methods: vec![0, 2, 5],
                streams: vec![1, 3, 4],
            }
        );
    }

    #[test]
    fn test_desc_slot_expr() {
        let desc = ServiceIdents::new("Chat").service_desc;
        assert_eq!(DescSlot::Method(2).expr(&desc), "&_Chat_serviceDesc.Methods[2]");
        assert_eq!(DescSlot::Stream(0).expr(&desc), "&_Chat_serviceDesc.Streams[0]");

        let (slot, index) = DescIndex::default().assign(MethodShape::BidiStreaming);
        assert_eq!(slot, DescSlot::Stream(0));
        assert_eq!(index, DescIndex { methods: 0, streams: 1 });
    }

    #[test]
    fn test_counters_reset_per_service() {
        let output = generate(&[
            service("a", "First", vec![method("Watch", false, true)]),
            service("a", "Second", vec![method("Watch", false, true)]),
        ]);
        assert!(output.contains("&_First_serviceDesc.Streams[0]"));
        assert!(output.contains("&_Second_serviceDesc.Streams[0]"));
        assert!(!output.contains("Streams[1]"));
    }

    #[test]
    fn test_deprecated_method() {
        let mut old = method("Old", false, false);
        old.deprecated = true;
        let output = generate(&[service(
            "legacy",
            "Legacy",
            vec![old, method("New", false, false)],
        )]);

        let client = block(&output, "type LegacyClient interface {");
        assert_eq!(client[0], "//");
        assert_eq!(client[1], "// Deprecated: Do not use.");
        assert!(client[2].starts_with("Old("));
        assert!(client[3].starts_with("New("));

        let server = block(&output, "type LegacyServer interface {");
        assert_eq!(
            server,
            vec![
                "//",
                "// Deprecated: Do not use.",
                "Old(context.Context, *OldRequest) (*OldResponse, error)",
                "New(context.Context, *NewRequest) (*NewResponse, error)",
            ]
        );

        assert!(output.contains("// Deprecated: Do not use.\nfunc (c *legacyClient) Old("));
        assert!(!output.contains("// Deprecated: Do not use.\nfunc (c *legacyClient) New("));
        assert_eq!(output.matches("Deprecated: Do not use.").count(), 3);
    }

    #[test]
    fn test_deprecated_service() {
        let mut legacy = service("legacy", "Legacy", vec![method("Old", false, false)]);
        legacy.deprecated = true;
        let output = generate(&[legacy]);

        assert!(output.contains("//\n// Deprecated: Do not use.\ntype LegacyClient interface {\n"));
        assert!(output.contains("//\n// Deprecated: Do not use.\ntype LegacyServer interface {\n"));
        assert!(output.contains("// Deprecated: Do not use.\nfunc NewLegacyClient("));
        assert!(output.contains("// Deprecated: Do not use.\nfunc RegisterLegacyServer("));
        assert!(output.contains(
            "// Deprecated: Do not use.\n// UnimplementedLegacyServer can be embedded"
        ));
    }

    #[test]
    fn test_comments() {
        let mut greet = method("Greet", false, false);
        greet.comments.leading = vec![" Sends a greeting.".to_owned()];
        let mut greeter = service("hello", "Greeter", vec![greet]);
        greeter.comments.leading = vec![" The greeting service.".to_owned()];
        let output = generate(&[greeter]);

        assert!(output.contains(
            "// For semantics around ctx use and closing/ending streaming RPCs, please refer to https://godoc.org/google.golang.org/grpc#ClientConn.NewStream.\n\
             //\n\
             // The greeting service.\n\
             type GreeterClient interface {\n\
             \t// Sends a greeting.\n\
             \tGreet(ctx "
        ));
        assert!(output.contains(
            "// GreeterServer is the server API for Greeter service.\n\
             //\n\
             // The greeting service.\n\
             type GreeterServer interface {\n\
             \t// Sends a greeting.\n\
             \tGreet(context.Context"
        ));
    }

    #[test]
    fn test_reserved_method_name() {
        let reserved: ReservedNames = ["Close"].into_iter().collect();
        let (output, _) = generate_with(
            &[service("conn", "Conn", vec![method("Close", false, false)])],
            &reserved,
        );

        assert!(output.contains("\tClose_(ctx context.Context, in *CloseRequest"));
        assert!(output.contains("\tClose_(context.Context, *CloseRequest)"));
        assert!(output.contains("func (c *connClient) Close_(ctx "));
        assert!(output.contains("func (*UnimplementedConnServer) Close_(ctx "));
        assert!(output.contains("return srv.(ConnServer).Close_(ctx, in)"));
        assert!(output.contains("\t\t\tMethodName: \"Close\",\n"));
        assert!(output.contains("func _Conn_Close_Handler("));
    }

    #[test]
    fn test_imports() {
        let (_, imports) = generate_with(
            &[service("chat", "Chat", vec![method("Say", false, false)])],
            &ReservedNames::new(),
        );
        assert_eq!(
            imports,
            vec![
                "context".to_owned(),
                RUNTIME.to_owned(),
                format!("{}/status", RUNTIME),
                format!("{}/codes", RUNTIME),
            ]
        );

        // Without methods there are no stubs, so no status or codes imports.
        let (output, imports) =
            generate_with(&[service("chat", "Empty", vec![])], &ReservedNames::new());
        assert_eq!(imports, vec!["context".to_owned(), RUNTIME.to_owned()]);
        assert!(output.contains("type EmptyClient interface {\n}\n"));
        assert!(output.contains(
            "\tMethods:     []kiteg.MethodDesc{},\n\
             \tStreams:     []kiteg.StreamDesc{},\n\
             \tMetadata:    \"chat.proto\",\n"
        ));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let services = vec![
            service("mixed", "Mixed", vec![method("A", false, false), method("B", true, true)]),
            service("mixed", "Other", vec![method("C", true, false)]),
        ];
        assert_eq!(generate(&services), generate(&services));
    }

    fn shapes() -> impl Strategy<Value = Vec<MethodShape>> {
        prop::collection::vec(
            (any::<bool>(), any::<bool>())
                .prop_map(|(client, server)| MethodShape::classify(client, server)),
            0..16,
        )
    }

    proptest! {
        #[test]
        fn slots_are_dense_per_bucket(shapes in shapes()) {
            let slots = assign_slots(shapes.iter().copied());
            let buckets = TableBuckets::new(&slots);

            let unary = shapes.iter().filter(|shape| !shape.is_streaming()).count();
            prop_assert_eq!(buckets.methods.len(), unary);
            prop_assert_eq!(buckets.streams.len(), shapes.len() - unary);

            for (idx, &position) in buckets.methods.iter().enumerate() {
                prop_assert_eq!(slots[position], DescSlot::Method(idx));
            }
            for (idx, &position) in buckets.streams.iter().enumerate() {
                prop_assert_eq!(slots[position], DescSlot::Stream(idx));
            }
        }
    }
}
