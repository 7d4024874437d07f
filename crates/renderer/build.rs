//! Parses and validates the WGSL sources so a broken shader fails the build
//! instead of the first frame.

use std::fs;
use std::path::Path;

const SHADER_DIR: &str = "src/gpu/shaders";
const COMMON: &str = "common.wgsl";
const STAGES: [&str; 2] = ["motion.wgsl", "particles.wgsl"];

fn main() {
    let dir = Path::new(SHADER_DIR);
    println!("cargo:rerun-if-changed={}", dir.join(COMMON).display());

    let common = read(&dir.join(COMMON));
    for stage in STAGES {
        let path = dir.join(stage);
        println!("cargo:rerun-if-changed={}", path.display());
        let source = format!("{common}{}", read(&path));

        let module = match naga::front::wgsl::parse_str(&source) {
            Ok(module) => module,
            Err(err) => panic!("{}: {}", path.display(), err.emit_to_string(&source)),
        };

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        if let Err(err) = validator.validate(&module) {
            panic!("{} failed validation: {err:?}", path.display());
        }
    }
}

fn read(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => panic!("failed to read {}: {err}", path.display()),
    }
}
