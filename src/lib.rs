#![doc(html_root_url = "https://docs.rs/kite-build/0.1.0")]

//! `kite-build` generates Go bindings for the kite RPC runtime from Protobuf
//! service definitions.
//!
//! For every service of a `.proto` file the generated Go file contains a client
//! interface with its implementation and constructor, a server interface, an
//! embeddable `Unimplemented<Service>Server`, a `Register<Service>Server`
//! function, one dispatch handler per method and the `_<Service>_serviceDesc`
//! table the runtime registers.
//!
//! # Running as a `protoc` plugin
//!
//! The `protoc-gen-kite` binary implements the `protoc` plugin protocol:
//!
//! ```bash
//! protoc --plugin=protoc-gen-kite --kite_out=paths=source_relative:gen api/ping.proto
//! ```
//!
//! The plugin parameter is a comma separated list of options:
//!
//!   - `paths=import|source_relative`: place output files under their Go import
//!     path (the default) or next to their `.proto` file.
//!   - `M<file>=<import path>`: the Go import path of a `.proto` file,
//!     overriding its `go_package` option.
//!   - `runtime_package=<import path>`: the import path of the kite runtime.
//!   - `gen_new[=true|false]`: emit `New()` constructors for request messages.
//!   - `reserved=<method name>`: a method name that is suffixed with `_` in
//!     generated signatures. May be repeated.
//!
//! # Generating from a build script
//!
//! ```rust,no_run
//! fn main() -> std::io::Result<()> {
//!     kite_build::Config::new()
//!         .paths(kite_build::PathsMode::SourceRelative)
//!         .out_dir("gen")
//!         .compile_protos(&["api/ping.proto"], &["."])
//! }
//! ```
//!
//! # Sourcing `protoc`
//!
//! [`Config::compile_protos`] runs the `protoc` found in the `PROTOC`
//! environment variable, or on the `PATH` if the variable is not set.

use std::collections::HashMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, trace};
use prost::Message as _;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::{FileDescriptorProto, FileDescriptorSet};

mod ast;
mod code_generator;
mod fully_qualified_name;
mod ident;
mod printer;
mod resolver;
mod shape;
mod signature;

pub use crate::ast::{Comments, Method, Service};
pub use crate::code_generator::{
    assign_slots, CodeGenerator, DescIndex, DescSlot, ServiceGenerator, TableBuckets,
    GENERATED_CODE_VERSION,
};
pub use crate::fully_qualified_name::FullyQualifiedName;
pub use crate::ident::{
    camel_case, unexport, GoIdent, IdentRole, MethodIdents, ReservedNames, ServiceIdents,
};
pub use crate::printer::{quote, Printer};
pub use crate::resolver::{
    sanitize_package_name, FileScope, GoPackage, ImportRegistry, Imports, TypeIndex,
    TypeResolver,
};
pub use crate::shape::{MethodShape, StreamMember};
pub use crate::signature::{Packages, ResolvedMethod};

/// The import path of the kite runtime package.
pub const DEFAULT_RUNTIME_PACKAGE: &str = "git.dhgames.cn/svr_comm/kiteg";

const FILE_SUFFIX: &str = "_kite.pb.go";

/// Where generated files are placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathsMode {
    /// Under the Go import path of the `.proto` file.
    #[default]
    Import,
    /// In the same relative directory as the `.proto` file.
    SourceRelative,
}

/// A generated Go file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path, relative to the output directory.
    pub name: String,
    pub content: String,
}

/// Configuration options for Go code generation.
///
/// This configuration builder can be used to set non-default code generation
/// options.
#[derive(Clone, Debug)]
pub struct Config {
    runtime_package: String,
    go_import_paths: HashMap<String, String>,
    paths: PathsMode,
    gen_new: bool,
    reserved_method_names: ReservedNames,
    out_dir: Option<PathBuf>,
    file_descriptor_set_path: Option<PathBuf>,
    skip_protoc_run: bool,
    protoc_args: Vec<OsString>,
}

impl Config {
    /// Creates a new code generator configuration with default options.
    pub fn new() -> Config {
        Config::default()
    }

    /// Creates a configuration from a `protoc` plugin parameter string.
    pub fn from_parameter(parameter: &str) -> std::result::Result<Config, String> {
        let mut config = Config::new();
        for option in parameter.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = match option.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (option, None),
            };
            config.apply_parameter(key, value)?;
        }
        Ok(config)
    }

    fn apply_parameter(
        &mut self,
        key: &str,
        value: Option<&str>,
    ) -> std::result::Result<(), String> {
        match (key, value) {
            ("paths", Some("import")) => {
                self.paths(PathsMode::Import);
            }
            ("paths", Some("source_relative")) => {
                self.paths(PathsMode::SourceRelative);
            }
            ("paths", value) => {
                return Err(format!(
                    "invalid value for paths: {:?}, expected import or source_relative",
                    value.unwrap_or_default()
                ));
            }
            ("runtime_package", Some(path)) if !path.is_empty() => {
                self.runtime_package(path);
            }
            ("gen_new", None) => {
                self.gen_new(true);
            }
            ("gen_new", Some(value)) => {
                let enabled = value
                    .parse::<bool>()
                    .map_err(|_| format!("invalid value for gen_new: {:?}", value))?;
                self.gen_new(enabled);
            }
            ("reserved", Some(name)) if !name.is_empty() => {
                self.reserved_method_name(name);
            }
            (key, Some(path)) if key.len() > 1 && key.starts_with('M') => {
                self.go_import_path(&key[1..], path);
            }
            (key, _) => return Err(format!("unknown parameter: {}", key)),
        }
        Ok(())
    }

    /// Sets the import path of the kite runtime package.
    ///
    /// Defaults to [`DEFAULT_RUNTIME_PACKAGE`]. The `codes` and `status`
    /// packages are expected directly below it.
    pub fn runtime_package<S>(&mut self, import_path: S) -> &mut Self
    where
        S: Into<String>,
    {
        self.runtime_package = import_path.into();
        self
    }

    /// Sets the Go import path of a `.proto` file, overriding its `go_package`
    /// option.
    ///
    /// # Example
    ///
    /// ```rust
    /// # let mut config = kite_build::Config::new();
    /// config.go_import_path("api/ping.proto", "example.com/api/ping");
    /// ```
    pub fn go_import_path<P, S>(&mut self, proto_file: P, import_path: S) -> &mut Self
    where
        P: Into<String>,
        S: Into<String>,
    {
        self.go_import_paths
            .insert(proto_file.into(), import_path.into());
        self
    }

    /// Sets where generated files are placed.
    pub fn paths(&mut self, paths: PathsMode) -> &mut Self {
        self.paths = paths;
        self
    }

    /// Emit a `New()` constructor for every top-level message named `Req<X>`.
    pub fn gen_new(&mut self, enabled: bool) -> &mut Self {
        self.gen_new = enabled;
        self
    }

    /// Reserves a method name. Methods with this name are generated with a
    /// trailing underscore in their signatures.
    pub fn reserved_method_name<S>(&mut self, name: S) -> &mut Self
    where
        S: Into<String>,
    {
        self.reserved_method_names.insert(name);
        self
    }

    /// Configures the output directory where generated Go files will be
    /// written.
    ///
    /// If unset, defaults to the `OUT_DIR` environment variable.
    pub fn out_dir<P>(&mut self, path: P) -> &mut Self
    where
        P: Into<PathBuf>,
    {
        self.out_dir = Some(path.into());
        self
    }

    /// When set, the `FileDescriptorSet` produced by `protoc` is written to
    /// this path instead of a temporary file.
    pub fn file_descriptor_set_path<P>(&mut self, path: P) -> &mut Self
    where
        P: Into<PathBuf>,
    {
        self.file_descriptor_set_path = Some(path.into());
        self
    }

    /// In combination with [`Config::file_descriptor_set_path`], skips running
    /// `protoc` and generates from the existing `FileDescriptorSet`.
    pub fn skip_protoc_run(&mut self) -> &mut Self {
        self.skip_protoc_run = true;
        self
    }

    /// Adds an argument to the `protoc` invocation.
    pub fn protoc_arg<S>(&mut self, arg: S) -> &mut Self
    where
        S: AsRef<OsStr>,
    {
        self.protoc_args.push(arg.as_ref().to_owned());
        self
    }

    /// Compiles `.proto` files into Go files.
    ///
    /// # Arguments
    ///
    /// **`protos`** - Paths to `.proto` files to compile. Any transitively
    /// imported `.proto` files are included in the `FileDescriptorSet`.
    ///
    /// **`includes`** - Paths to directories in which to search for imports.
    /// The `.proto` files passed in **`protos`** must be found in one of the
    /// provided include directories.
    ///
    /// # Errors
    ///
    /// Fails if `protoc` cannot be run or rejects the input, if a method refers
    /// to a message missing from the `FileDescriptorSet`, or if an output file
    /// cannot be written.
    pub fn compile_protos(
        &self,
        protos: &[impl AsRef<Path>],
        includes: &[impl AsRef<Path>],
    ) -> Result<()> {
        let target = match (&self.out_dir, env::var_os("OUT_DIR")) {
            (Some(out_dir), _) => out_dir.clone(),
            (None, Some(out_dir)) => PathBuf::from(out_dir),
            (None, None) => {
                return Err(Error::new(
                    ErrorKind::Other,
                    "OUT_DIR environment variable is not set",
                ))
            }
        };

        let tmp;
        let file_descriptor_set_path = match &self.file_descriptor_set_path {
            Some(path) => path.clone(),
            None if self.skip_protoc_run => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "skip_protoc_run requires file_descriptor_set_path",
                ))
            }
            None => {
                tmp = tempfile::Builder::new().prefix("kite-build").tempdir()?;
                tmp.path().join("kite-descriptor-set")
            }
        };

        if !self.skip_protoc_run {
            let protoc = protoc_from_env();

            let mut cmd = Command::new(&protoc);
            cmd.arg("--include_imports")
                .arg("--include_source_info")
                .arg("-o")
                .arg(&file_descriptor_set_path);

            for include in includes {
                cmd.arg("-I").arg(include.as_ref());
            }
            for arg in &self.protoc_args {
                cmd.arg(arg);
            }
            for proto in protos {
                cmd.arg(proto.as_ref());
            }

            debug!("Running: {:?}", cmd);

            let output = cmd.output().map_err(|error| {
                Error::new(
                    error.kind(),
                    format!("failed to invoke protoc (path: {:?}): {}", protoc, error),
                )
            })?;

            if !output.status.success() {
                return Err(Error::new(
                    ErrorKind::Other,
                    format!("protoc failed: {}", String::from_utf8_lossy(&output.stderr)),
                ));
            }
        }

        let buf = fs::read(&file_descriptor_set_path).map_err(|error| {
            Error::new(
                error.kind(),
                format!(
                    "unable to open file_descriptor_set_path: {:?}, OS: {}",
                    file_descriptor_set_path, error
                ),
            )
        })?;
        let file_descriptor_set = FileDescriptorSet::decode(buf.as_slice()).map_err(|error| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("invalid FileDescriptorSet: {}", error),
            )
        })?;

        let files_to_generate = file_descriptor_set
            .file
            .iter()
            .map(|file| file.name().to_owned())
            .collect::<Vec<_>>();

        for file in self.generate(file_descriptor_set.file, &files_to_generate)? {
            let path = target.join(&file.name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            trace!("writing: {:?}", path);
            fs::write(&path, file.content)?;
        }

        Ok(())
    }

    /// Generates Go files for the `.proto` files named in `files_to_generate`.
    ///
    /// `files` must hold the named files and everything they import, so that
    /// method input and output types can be resolved.
    pub fn generate(
        &self,
        files: Vec<FileDescriptorProto>,
        files_to_generate: &[String],
    ) -> Result<Vec<GeneratedFile>> {
        let index = TypeIndex::new(&files, &self.go_import_paths);

        let mut generated = Vec::new();
        for file in files {
            if !files_to_generate.iter().any(|name| name == file.name()) {
                continue;
            }
            if let Some(file) = CodeGenerator::generate(self, &index, file)? {
                generated.push(file);
            }
        }
        Ok(generated)
    }

    fn output_file_name(&self, file_name: &str, package: &GoPackage) -> String {
        let stem = file_name.strip_suffix(".proto").unwrap_or(file_name);
        let (source_dir, base) = stem.rsplit_once('/').unwrap_or(("", stem));
        let dir = match self.paths {
            PathsMode::Import => package.import_path.as_str(),
            PathsMode::SourceRelative => source_dir,
        };
        if dir.is_empty() {
            format!("{}{}", base, FILE_SUFFIX)
        } else {
            format!("{}/{}{}", dir, base, FILE_SUFFIX)
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            runtime_package: DEFAULT_RUNTIME_PACKAGE.to_owned(),
            go_import_paths: HashMap::new(),
            paths: PathsMode::default(),
            gen_new: false,
            reserved_method_names: ReservedNames::new(),
            out_dir: None,
            file_descriptor_set_path: None,
            skip_protoc_run: false,
            protoc_args: Vec::new(),
        }
    }
}

/// Handles a `protoc` plugin request.
///
/// Failures, including an invalid parameter string, are reported through the
/// response's `error` field as the plugin protocol requires.
pub fn run_plugin(request: CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };

    let config = match Config::from_parameter(request.parameter()) {
        Ok(config) => config,
        Err(error) => {
            response.error = Some(error);
            return response;
        }
    };

    match config.generate(request.proto_file, &request.file_to_generate) {
        Ok(files) => {
            response.file = files
                .into_iter()
                .map(|file| File {
                    name: Some(file.name),
                    content: Some(file.content),
                    ..Default::default()
                })
                .collect();
        }
        Err(error) => response.error = Some(error.to_string()),
    }

    response
}

fn protoc_from_env() -> PathBuf {
    env::var_os("PROTOC")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("protoc"))
}
