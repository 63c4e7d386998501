use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Point prost-build at a protoc binary. Respect an externally provided
    // PROTOC if set; otherwise fall back to the vendored one so the build
    // works without a system-installed protobuf compiler.
    if env::var_os("PROTOC").is_none() {
        if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
            env::set_var("PROTOC", path);
        }
    }

    let out_dir = env::var("OUT_DIR")?;
    let proto_file = "proto/minimr.proto";
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .out_dir(&out_dir)
        .compile(&[proto_file], &["proto"])?;
    Ok(())
}
