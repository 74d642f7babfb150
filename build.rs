use std::{
  env,
  path::PathBuf,
};

fn main() {
  println!("cargo:rerun-if-changed=src/ffi.rs");
  println!("cargo:rerun-if-changed=src/pointer.rs");

  if env::var_os("CARGO_FEATURE_FFI").is_none() {
    return;
  }

  let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
  let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

  let generated = cbindgen::Builder::new()
    .with_src(manifest_dir.join("src/pointer.rs"))
    .with_src(manifest_dir.join("src/ffi.rs"))
    .with_language(cbindgen::Language::C)
    .with_include_guard("ARENAKIT_H")
    .with_std_types(true)
    .generate();

  match generated {
    Ok(bindings) => {
      bindings.write_to_file(out_dir.join("arenakit.h"));
    }
    Err(err) => println!("cargo:warning=failed to generate arenakit.h: {err}"),
  }
}
