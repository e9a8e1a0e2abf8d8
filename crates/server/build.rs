const PROTO: &str = "proto/face_detection.proto";

fn main() {
    println!("cargo:rerun-if-changed={PROTO}");

    // Use the bundled protoc unless the environment already names one.
    if std::env::var_os("PROTOC").is_none() {
        match protoc_bin_vendored::protoc_bin_path() {
            Ok(path) => std::env::set_var("PROTOC", path),
            Err(err) => {
                println!("cargo:warning=No bundled protoc for this platform: {err}");
            }
        }
    }

    if let Err(err) = tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[PROTO], &["proto"])
    {
        println!("cargo:warning=Failed to compile {PROTO}: {err}");
        std::process::exit(1);
    }
}
