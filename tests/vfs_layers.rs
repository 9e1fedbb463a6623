mod common;

use std::sync::Arc;

use common::TestResult;
use openge::errors::OpenGeError;
use openge::fs::RealFileSystem;
use openge::vfs::{
    FolderVfsLayer, MemoryVfsLayer, SCRATCH_DATABASE_NAME, VfsEntry, VfsEntryExistence, VfsLayer,
    aggregate, aggregate_entries,
};

fn names(entries: &[VfsEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn merge_prefers_local_entries() -> TestResult {
    let upstream = vec![VfsEntry::file("a", 1), VfsEntry::file("b", 1)];
    let local = vec![VfsEntry::file("b", 2), VfsEntry::file("c", 1)];

    let merged = aggregate_entries(Some(upstream.as_slice()), &local, true)?;

    assert_eq!(names(&merged), vec!["a", "b", "c"]);
    assert_eq!(merged[0].size, 1);
    assert_eq!(merged[1].size, 2);
    assert_eq!(merged[2].size, 1);
    Ok(())
}

#[test]
fn lazy_merge_can_be_consumed_partially() {
    let upstream = vec![VfsEntry::file("a", 1), VfsEntry::file("z", 1)];
    let local = vec![VfsEntry::file("m", 1)];
    let first: Vec<_> = aggregate(Some(upstream.clone()), local.clone(), true)
        .take(2)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names(&first), vec!["a", "m"]);
}

#[test]
fn unsorted_local_input_raises_only_when_checked() {
    let local = vec![VfsEntry::file("b", 1), VfsEntry::file("a", 1)];
    assert!(matches!(
        aggregate_entries(None, &local, true),
        Err(OpenGeError::Correctness(_))
    ));
    assert!(aggregate_entries(None, &local, false).is_ok());
}

#[test]
fn folder_layer_hides_scratch_database_and_merges_upstream() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("src"))?;
    std::fs::write(dir.path().join("src").join("main.cpp"), b"int main() {}")?;
    std::fs::write(dir.path().join("src").join(SCRATCH_DATABASE_NAME), b"db")?;

    let upstream = MemoryVfsLayer::new();
    upstream.insert_directory(
        "src",
        vec![VfsEntry::file("main.cpp", 1), VfsEntry::file("util.cpp", 5)],
    );
    upstream.insert_directory("docs", vec![VfsEntry::file("readme.md", 3)]);

    let layer = FolderVfsLayer::new(Arc::new(RealFileSystem), dir.path(), Some(Arc::new(upstream)))
        .with_correctness_checks(true);

    let src = layer.list("src")?.expect("src exists");
    assert_eq!(names(&src), vec!["main.cpp", "util.cpp"]);
    assert_eq!(src[0].size, 13);

    assert_eq!(layer.list("docs")?.map(|d| d.len()), Some(1));
    assert_eq!(layer.exists("src/main.cpp"), VfsEntryExistence::FileExists);
    assert_eq!(layer.exists("docs"), VfsEntryExistence::DirectoryExists);
    assert_eq!(layer.exists("nope"), VfsEntryExistence::DoesNotExist);
    assert_eq!(layer.get_info("src/util.cpp").map(|e| e.size), Some(5));
    Ok(())
}
