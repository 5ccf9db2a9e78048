//! `New()` constructors for request messages.

use prost_types::DescriptorProto;

use crate::ident::camel_case;
use crate::printer::Printer;

const REQUEST_PREFIX: &str = "Req";

/// Go names of the top-level messages that get a `New()` constructor: those
/// named `Req<Something>`.
pub(super) fn request_messages(messages: &[DescriptorProto]) -> Vec<String> {
    messages
        .iter()
        .map(|message| camel_case(message.name()))
        .filter(|name| name.len() > REQUEST_PREFIX.len() && name.starts_with(REQUEST_PREFIX))
        .collect()
}

pub(super) fn push_new_constructors(names: &[String], out: &mut Printer<'_>) {
    for name in names {
        out.blank();
        out.line(format!("func (m *{0}) New() *{0} {{ return &{0}{{}} }}", name));
    }
}
