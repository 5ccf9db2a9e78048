use std::io::{Error, ErrorKind, Result};

use log::debug;
use prost_types::{FileDescriptorProto, ServiceDescriptorProto, SourceCodeInfo};

use crate::ast::{Comments, Method, Service};
use crate::fully_qualified_name::FullyQualifiedName;
use crate::ident::camel_case;
use crate::printer::{quote, Printer};
use crate::resolver::{FileScope, GoPackage, Imports, TypeIndex};
use crate::{Config, GeneratedFile};

mod locations;
use locations::*;

mod messages;
mod services;

pub use services::{assign_slots, DescIndex, DescSlot, ServiceGenerator, TableBuckets};
pub use services::GENERATED_CODE_VERSION;

/// Generates the kite bindings of one `.proto` file.
pub struct CodeGenerator<'a> {
    index: &'a TypeIndex,
    package: String,
    source_info: Option<SourceCodeInfo>,
    path: Vec<i32>,
}

impl<'a> CodeGenerator<'a> {
    fn new(
        index: &'a TypeIndex,
        source_code_info: Option<SourceCodeInfo>,
        package: Option<String>,
    ) -> Self {
        let source_info = source_code_info.map(|mut s| {
            s.location.retain(|loc| {
                let len = loc.path.len();
                len > 0 && len % 2 == 0
            });
            s.location.sort_by(|a, b| a.path.cmp(&b.path));
            s
        });

        Self {
            index,
            package: package.unwrap_or_default(),
            source_info,
            path: Vec::new(),
        }
    }

    /// Generates the Go file for `file`, or `None` if the file declares
    /// nothing to emit.
    pub fn generate(
        config: &Config,
        index: &TypeIndex,
        file: FileDescriptorProto,
    ) -> Result<Option<GeneratedFile>> {
        let file_name = file.name().to_owned();
        let go_package = match index.package_of(&file_name) {
            Some(package) => package.clone(),
            None => GoPackage::for_file(&file, &config.go_import_paths),
        };
        let new_messages = if config.gen_new {
            messages::request_messages(&file.message_type)
        } else {
            Vec::new()
        };

        let mut code_gen = CodeGenerator::new(index, file.source_code_info, file.package);

        debug!(
            "file: {:?}, package: {:?}, go package: {:?}",
            file_name, code_gen.package, go_package.import_path
        );

        let services = code_gen.unpack_services(file.service);
        code_gen.check_type_refs(&file_name, &services)?;

        let mut scope = FileScope::new(index, &go_package);
        let mut body = String::new();
        let mut out = Printer::new(&mut body);
        ServiceGenerator::new(
            &mut scope,
            &config.runtime_package,
            &config.reserved_method_names,
        )
        .generate(&file_name, &services, &mut out);
        messages::push_new_constructors(&new_messages, &mut out);

        if body.is_empty() {
            debug!("file: {:?}, nothing to generate", file_name);
            return Ok(None);
        }

        let imports = scope.into_imports();
        Ok(Some(GeneratedFile {
            name: config.output_file_name(&file_name, &go_package),
            content: compose(&file_name, &go_package, &imports, &body),
        }))
    }

    fn unpack_services(&mut self, services: Vec<ServiceDescriptorProto>) -> Vec<Service> {
        self.path.push(FileDescriptorProtoLocations::SERVICE);
        let services = services
            .into_iter()
            .enumerate()
            .map(|(idx, service)| {
                self.path.push(idx as i32);
                let service = self.unpack_service(service);
                self.path.pop();
                service
            })
            .collect();
        self.path.pop();
        services
    }

    fn unpack_service(&mut self, service: ServiceDescriptorProto) -> Service {
        let name = service.name().to_owned();
        debug!("  service: {:?}", name);

        let comments = self.comments_from_location().unwrap_or_default();
        let deprecated = service
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());

        self.path.push(ServiceDescriptorProtoLocations::METHOD);
        let methods = service
            .method
            .into_iter()
            .enumerate()
            .map(|(idx, method)| {
                debug!("  method: {:?}", method.name());

                self.path.push(idx as i32);
                let comments = self.comments_from_location().unwrap_or_default();
                self.path.pop();

                Method {
                    name: camel_case(method.name()),
                    proto_name: method.name().to_owned(),
                    comments,
                    input_type: FullyQualifiedName::from_type_name(method.input_type()),
                    output_type: FullyQualifiedName::from_type_name(method.output_type()),
                    client_streaming: method.client_streaming(),
                    server_streaming: method.server_streaming(),
                    deprecated: method
                        .options
                        .as_ref()
                        .map_or(false, |options| options.deprecated()),
                }
            })
            .collect();
        self.path.pop();

        Service {
            name: camel_case(&name),
            proto_name: name,
            package: self.package.clone(),
            comments,
            methods,
            deprecated,
        }
    }

    fn comments_from_location(&self) -> Option<Comments> {
        let source_info = self.source_info.as_ref()?;
        let idx = source_info
            .location
            .binary_search_by_key(&&self.path[..], |location| &location.path[..])
            .ok()?;
        Some(Comments::from_location(&source_info.location[idx]))
    }

    /// Every input and output type must be known before anything is emitted.
    fn check_type_refs(&self, file_name: &str, services: &[Service]) -> Result<()> {
        for service in services {
            for method in &service.methods {
                for type_ref in [&method.input_type, &method.output_type] {
                    if !self.index.contains(type_ref) {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            format!(
                                "{}: method {}.{} refers to unknown type {}",
                                file_name,
                                service.full_name(),
                                method.proto_name,
                                type_ref
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Prepends the header, package clause and import block to a generated body.
fn compose(source: &str, package: &GoPackage, imports: &Imports, body: &str) -> String {
    let mut content = String::new();
    let mut out = Printer::new(&mut content);
    out.comment("Code generated by protoc-gen-kite. DO NOT EDIT.");
    out.comment(format!("source: {}", source));
    out.blank();
    out.line(format!("package {}", package.name));
    if !imports.is_empty() {
        out.blank();
        out.open("import (");
        for (alias, path) in imports.iter() {
            out.line(format!("{} {}", alias, quote(path)));
        }
        out.close(")");
    }
    out.blank();

    content.push_str(body.trim_start_matches('\n'));
    content
}
