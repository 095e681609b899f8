use std::path::{Path, PathBuf};

fn main() {
    let grammar_root = PathBuf::from(
        std::env::var("TREE_SITTER_AL_PATH").unwrap_or_else(|_| "../tree-sitter-al".to_string()),
    );
    let src_dir = grammar_root.join("src");

    let mut build = cc::Build::new();
    build
        .include(&src_dir)
        .file(src_dir.join("parser.c"))
        .warnings(false);

    add_external_scanner(&mut build, &src_dir);

    build.compile("tree-sitter-al");

    println!("cargo:rerun-if-changed={}", src_dir.display());
    println!("cargo:rerun-if-env-changed=TREE_SITTER_AL_PATH");
}

/// Grammars may ship a C or a C++ external scanner next to parser.c
fn add_external_scanner(build: &mut cc::Build, src_dir: &Path) {
    let scanner_c = src_dir.join("scanner.c");
    if scanner_c.exists() {
        build.file(scanner_c);
        return;
    }

    let scanner_cc = src_dir.join("scanner.cc");
    if scanner_cc.exists() {
        build.cpp(true).file(scanner_cc);
    }
}
