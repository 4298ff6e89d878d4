//! Build script to compile the protobuf wire contract.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point prost-build at a vendored protoc so the build does not depend
    // on a system-installed compiler.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }
    tonic_build::compile_protos("../../proto/gateway.proto")?;
    Ok(())
}
