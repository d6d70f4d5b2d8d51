use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let version_api_path = Path::new(&out_dir).join("version_api.rs");
    
    // Plugin API version lives in Cargo.toml metadata
    let cargo_manifest = env::var("CARGO_MANIFEST_DIR").unwrap();
    let cargo_toml_path = Path::new(&cargo_manifest).join("Cargo.toml");
    let cargo_toml_content = fs::read_to_string(&cargo_toml_path)
        .expect("Failed to read Cargo.toml");
    
    let cargo_toml: toml::Value = cargo_toml_content.parse()
        .expect("Failed to parse Cargo.toml");
    
    let api_version = cargo_toml
        .get("package")
        .and_then(|p| p.get("metadata"))
        .and_then(|m| m.get("gitpress"))
        .and_then(|g| g.get("api_version"))
        .and_then(|v| v.as_integer())
        .expect("Failed to find package.metadata.gitpress.api_version in Cargo.toml");
    
    let version_content = format!(
        "// Auto-generated plugin API version from Cargo.toml metadata\n\
         // Source: package.metadata.gitpress.api_version = {}\n\
         pub const PLUGIN_API_VERSION: i64 = {};\n",
        api_version, api_version
    );
    
    fs::write(&version_api_path, version_content)
        .expect("Failed to write version_api.rs");
    
    println!("cargo:rerun-if-changed=Cargo.toml");
}
