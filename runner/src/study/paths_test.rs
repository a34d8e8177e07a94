use super::paths::{base_dir, from_portable, resolve, to_portable};
use std::path::{Path, PathBuf};

#[test]
pub fn base_of_bare_file_name() {
    assert_eq!(base_dir(Path::new("study.ps")), PathBuf::from("."));
    assert_eq!(base_dir(Path::new("runs/study.ps")), PathBuf::from("runs"));
}

#[test]
pub fn nested_paths_become_relative() {
    let base = Path::new("/data/studies");

    assert_eq!(
        to_portable(&base.join("out").join("sb_0_1"), base),
        "out/sb_0_1"
    );
    assert_eq!(to_portable(Path::new("/scratch/sb"), base), "/scratch/sb");
}

#[test]
pub fn both_separators_are_accepted() {
    let base = Path::new("/data/studies");
    let expected = base.join("out").join("sb_0_1");

    assert_eq!(from_portable("out/sb_0_1", base), expected);
    assert_eq!(from_portable("out\\sb_0_1", base), expected);
}

#[test]
pub fn absolute_paths_ignore_the_base() {
    let base = Path::new("/data/studies");

    assert_eq!(
        from_portable("/scratch/sb", base),
        Path::new("/").join("scratch").join("sb")
    );
}

#[test]
pub fn portable_paths_survive_a_round_trip() {
    let base = Path::new("/data/studies");

    for path in ["out/a", "out/b/c", "../shared/d"] {
        assert_eq!(to_portable(&from_portable(path, base), base), path);
    }
}

#[test]
pub fn relative_paths_resolve_against_the_study() {
    let base = Path::new("/data/studies");

    assert_eq!(resolve(Path::new("out/sb"), base), base.join("out/sb"));
    assert_eq!(resolve(Path::new("/scratch/sb"), base), PathBuf::from("/scratch/sb"));

    // what is stored for a resolved path loads back unchanged
    let resolved = resolve(Path::new("../shared/sb"), base);
    assert_eq!(from_portable(&to_portable(&resolved, base), base), resolved);
}
