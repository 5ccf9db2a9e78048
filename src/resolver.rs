//! Go package assignment, type name resolution and import bookkeeping.
//!
//! The service generator does not know how Protobuf types map onto Go
//! packages. It is handed a host implementing [`TypeResolver`] and
//! [`ImportRegistry`]; [`FileScope`] is the implementation used when
//! generating from a `CodeGeneratorRequest` or a `FileDescriptorSet`.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use once_cell::sync::Lazy;
use prost_types::{DescriptorProto, FileDescriptorProto};
use regex::Regex;

use crate::fully_qualified_name::FullyQualifiedName;
use crate::ident::camel_case;

/// Resolves a Protobuf type reference to the Go type name to print.
pub trait TypeResolver {
    fn resolve(&mut self, type_ref: &FullyQualifiedName) -> String;
}

/// Registers a Go import, returning the identifier used to refer to it.
pub trait ImportRegistry {
    fn add_import(&mut self, import_path: &str) -> String;
}

static GO_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "break",
        "case",
        "chan",
        "const",
        "continue",
        "default",
        "defer",
        "else",
        "fallthrough",
        "for",
        "func",
        "go",
        "goto",
        "if",
        "import",
        "interface",
        "map",
        "package",
        "range",
        "return",
        "select",
        "struct",
        "switch",
        "type",
        "var",
    ]
    .into_iter()
    .collect()
});

static INVALID_IDENT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^A-Za-z0-9_]").expect("invalid identifier regex"));

/// Turns an arbitrary string into a usable Go package name.
pub fn sanitize_package_name(name: &str) -> String {
    let name = INVALID_IDENT_CHARS.replace_all(name, "_");
    let starts_with_digit = name.chars().next().map_or(true, |c| c.is_ascii_digit());
    if starts_with_digit || GO_KEYWORDS.contains(&*name) {
        format!("_{}", name)
    } else {
        name.into_owned()
    }
}

/// The last path element with any extension removed, e.g. `bar` for `foo/bar.proto`.
fn base_name(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

/// The Go package a `.proto` file's definitions live in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoPackage {
    /// The import path, e.g. `github.com/acme/api/ping`.
    pub import_path: String,
    /// The package name used in the `package` clause.
    pub name: String,
}

impl GoPackage {
    /// Determines the Go package of a file.
    ///
    /// `import_paths` maps `.proto` file names to Go import paths and takes
    /// precedence over the file's `go_package` option.
    pub fn for_file(
        file: &FileDescriptorProto,
        import_paths: &HashMap<String, String>,
    ) -> GoPackage {
        let file_name = file.name();

        let (option_path, option_name) = match file
            .options
            .as_ref()
            .map(|options| options.go_package())
            .filter(|go_package| !go_package.is_empty())
        {
            Some(go_package) => match go_package.split_once(';') {
                Some((path, name)) => (Some(path), Some(name)),
                None if go_package.contains('/') => (Some(go_package), None),
                None => (None, Some(go_package)),
            },
            None => (None, None),
        };

        let explicit_path = import_paths
            .get(file_name)
            .map(String::as_str)
            .or(option_path)
            .filter(|path| !path.is_empty());

        let import_path = match explicit_path {
            Some(path) => path.to_owned(),
            None => match file_name.rfind('/') {
                Some(idx) => file_name[..idx].to_owned(),
                None => String::new(),
            },
        };

        let name = match (option_name, explicit_path) {
            (Some(name), _) if !name.is_empty() => sanitize_package_name(name),
            (_, Some(path)) => sanitize_package_name(base_name(path)),
            _ if !file.package().is_empty() => sanitize_package_name(file.package()),
            _ => sanitize_package_name(base_name(file_name)),
        };

        GoPackage { import_path, name }
    }
}

#[derive(Clone, Debug)]
struct GoType {
    import_path: String,
    ident: String,
}

/// Every message type of a request, keyed by fully-qualified Protobuf name.
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: HashMap<FullyQualifiedName, GoType>,
    packages: HashMap<String, GoPackage>,
    package_names: HashMap<String, String>,
}

impl TypeIndex {
    pub fn new(files: &[FileDescriptorProto], import_paths: &HashMap<String, String>) -> TypeIndex {
        let mut index = TypeIndex::default();
        for file in files {
            let package = GoPackage::for_file(file, import_paths);
            index
                .package_names
                .entry(package.import_path.clone())
                .or_insert_with(|| package.name.clone());
            index.insert_messages(&package, file.package(), &mut Vec::new(), &file.message_type);
            index.packages.insert(file.name().to_owned(), package);
        }
        index
    }

    fn insert_messages(
        &mut self,
        package: &GoPackage,
        proto_package: &str,
        type_path: &mut Vec<String>,
        messages: &[DescriptorProto],
    ) {
        for message in messages {
            let fq_name =
                FullyQualifiedName::new(proto_package, type_path.as_slice(), message.name());

            type_path.push(message.name().to_owned());
            let ident = camel_case(&type_path.join("_"));
            self.types.insert(
                fq_name,
                GoType {
                    import_path: package.import_path.clone(),
                    ident,
                },
            );
            self.insert_messages(package, proto_package, type_path, &message.nested_type);
            type_path.pop();
        }
    }

    pub fn contains(&self, type_ref: &FullyQualifiedName) -> bool {
        self.types.contains_key(type_ref)
    }

    /// The Go package assigned to a `.proto` file of the request.
    pub fn package_of(&self, file_name: &str) -> Option<&GoPackage> {
        self.packages.get(file_name)
    }

    /// The package name declared by the files living at an import path.
    pub fn package_name(&self, import_path: &str) -> Option<&str> {
        self.package_names.get(import_path).map(String::as_str)
    }
}

/// The imports of one generated file, keyed and ordered by import path.
#[derive(Debug)]
pub struct Imports {
    aliases: BTreeMap<String, String>,
    used: HashSet<String>,
}

impl Imports {
    /// Creates an empty set of imports for a file in package `local_name`.
    pub fn new(local_name: &str) -> Imports {
        Imports {
            aliases: BTreeMap::new(),
            used: [local_name.to_owned()].into_iter().collect(),
        }
    }

    /// Adds an import, returning its alias. The alias is the package name,
    /// numbered if that name is already taken.
    pub fn add(&mut self, import_path: &str, package_name: &str) -> String {
        if let Some(alias) = self.aliases.get(import_path) {
            return alias.clone();
        }

        let base = sanitize_package_name(package_name);
        let mut alias = base.clone();
        let mut n = 1;
        while self.used.contains(&alias) {
            alias = format!("{}{}", base, n);
            n += 1;
        }

        self.used.insert(alias.clone());
        self.aliases.insert(import_path.to_owned(), alias.clone());
        alias
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// `(alias, import path)` pairs, ordered by import path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(path, alias)| (alias.as_str(), path.as_str()))
    }
}

/// Resolution scope of one generated Go file.
#[derive(Debug)]
pub struct FileScope<'a> {
    index: &'a TypeIndex,
    package: &'a GoPackage,
    imports: Imports,
}

impl<'a> FileScope<'a> {
    pub fn new(index: &'a TypeIndex, package: &'a GoPackage) -> FileScope<'a> {
        FileScope {
            index,
            package,
            imports: Imports::new(&package.name),
        }
    }

    pub fn into_imports(self) -> Imports {
        self.imports
    }
}

impl TypeResolver for FileScope<'_> {
    fn resolve(&mut self, type_ref: &FullyQualifiedName) -> String {
        let index = self.index;
        match index.types.get(type_ref) {
            Some(ty) if ty.import_path == self.package.import_path => ty.ident.clone(),
            Some(ty) => {
                let alias = self.add_import(&ty.import_path);
                format!("{}.{}", alias, ty.ident)
            }
            None => {
                warn!("unresolved type reference: {}", type_ref);
                camel_case(type_ref.name())
            }
        }
    }
}

impl ImportRegistry for FileScope<'_> {
    fn add_import(&mut self, import_path: &str) -> String {
        let name = match self.index.package_name(import_path) {
            Some(name) => name.to_owned(),
            None => base_name(import_path).to_owned(),
        };
        self.imports.add(import_path, &name)
    }
}
