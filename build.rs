use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "native-shims")]
    {
        let config = system_deps::Config::new().probe()?;

        println!("cargo:rerun-if-changed=native-shims.c");

        cc::Build::new()
            .file("native-shims.c")
            .includes(config.all_include_paths())
            .warnings(false)
            .compile("screencap_native_shims");
    }

    Ok(())
}
