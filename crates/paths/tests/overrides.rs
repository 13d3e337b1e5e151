//! Directory overrides. Lives in its own test binary so the overrides land
//! before anything else touches the cached directories.

use pretty_assertions::assert_eq;
use ptyprobe_paths::{
    config_dir, config_file, expand_home, home_dir, set_config_dir, set_home_dir,
};

#[test]
fn overrides_apply_before_first_access() {
    let root = tempfile::tempdir().unwrap();
    let home = root.path().join("home");
    let config = root.path().join("config").join("ptyprobe");

    set_home_dir(home.clone());
    set_config_dir(config.clone());

    assert_eq!(*home_dir(), home);
    assert_eq!(*config_dir(), config);
    assert_eq!(config_file(), config.join("config.toml"));
    assert_eq!(expand_home("~/projects"), home.join("projects"));
    assert_eq!(expand_home("~"), home);

    // Later overrides are ignored once the value is cached.
    set_home_dir(root.path().join("elsewhere"));
    assert_eq!(*home_dir(), home);
}
