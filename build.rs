fn main() {
    // `trap.S` emits `trap_vector_table` as an array of absolute 64-bit
    // stub addresses. A position-independent executable cannot hold such
    // relocations in a read-only section, so the host unit-test binary
    // must be linked non-PIE. This is scoped to test binaries only, so
    // dependency and proc-macro builds are unaffected.
    println!("cargo:rustc-link-arg=-no-pie");
}
