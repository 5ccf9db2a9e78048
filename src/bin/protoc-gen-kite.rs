use std::io::{Error, ErrorKind, Read, Result, Write};

use prost::Message;
use prost_types::compiler::CodeGeneratorRequest;

fn main() -> Result<()> {
    env_logger::init();

    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf)?;

    let request = CodeGeneratorRequest::decode(buf.as_slice()).map_err(|error| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("invalid CodeGeneratorRequest: {}", error),
        )
    })?;

    let response = kite_build::run_plugin(request);

    let out = response.encode_to_vec();
    std::io::stdout().write_all(&out)?;

    Ok(())
}
