//! Build script for recording build-time information about the program.
fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");
}
