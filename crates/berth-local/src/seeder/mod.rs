//! Reconciles a local content tree into a running instance's namespace.
//!
//! Directories map to container nodes, files to table leaves. Sidecar
//! `.meta` documents supply attributes and, for files, the required type
//! and format. Item-local problems skip that item with a warning; the walk
//! itself only aborts on client transport failures.

mod meta;

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::client::ClusterClient;
use crate::lifecycle::LifecycleError;

pub use meta::NodeMeta;
use meta::{MetaIssue, directory_attributes, is_sidecar, load_sidecar, sidecar_path};

pub(crate) const SEEDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::seeder");

/// Supported leaf node type in sidecar documents.
const TABLE_TYPE: &str = "table";

/// Mirrors the content tree at `content_root` into the namespace behind
/// `client`.
///
/// The content tree is read-only input and is never mutated. Root
/// attributes apply to the namespace root itself before descending.
pub fn seed_namespace(
    client: &mut dyn ClusterClient,
    content_root: &Path,
) -> Result<(), LifecycleError> {
    if !content_root.is_dir() {
        return Err(LifecycleError::ContentTreeMissing {
            path: content_root.to_path_buf(),
        });
    }
    for (key, value) in &directory_attributes(content_root) {
        client.set_attribute("/", key, value)?;
    }
    seed_directory(client, content_root, "")?;
    Ok(())
}

fn seed_directory(
    client: &mut dyn ClusterClient,
    dir: &Path,
    rel: &str,
) -> Result<(), LifecycleError> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|source| LifecycleError::ContentRead {
            path: dir.to_path_buf(),
            source,
        })?
        .flatten()
        .collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(
                target: SEEDER_TARGET,
                path = %path.display(),
                "entry name is not valid unicode, skipping"
            );
            continue;
        };
        let dest = if rel.is_empty() {
            format!("//{name}")
        } else {
            format!("//{rel}/{name}")
        };
        if path.is_dir() {
            let attributes = directory_attributes(&path);
            client.create_container(&dest, &attributes)?;
            let child_rel = if rel.is_empty() {
                name
            } else {
                format!("{rel}/{name}")
            };
            seed_directory(client, &path, &child_rel)?;
        } else if !is_sidecar(&path) && path.file_name().is_some_and(|n| n != ".meta") {
            seed_file(client, &path, &dest)?;
        }
    }
    Ok(())
}

/// Seeds one file as a table leaf; item-local problems skip the file with
/// a warning and the walk continues with its siblings.
fn seed_file(
    client: &mut dyn ClusterClient,
    path: &Path,
    dest: &str,
) -> Result<(), LifecycleError> {
    let meta = match load_sidecar(path) {
        Ok(meta) => meta,
        Err(MetaIssue::Missing) => {
            warn!(
                target: SEEDER_TARGET,
                file = %path.display(),
                "found file without meta info, skipping"
            );
            return Ok(());
        }
        Err(MetaIssue::Unreadable(error)) => {
            warn!(
                target: SEEDER_TARGET,
                file = %sidecar_path(path).display(),
                error = %error,
                "failed to read meta file, skipping"
            );
            return Ok(());
        }
        Err(MetaIssue::Unparsable(error)) => {
            warn!(
                target: SEEDER_TARGET,
                file = %sidecar_path(path).display(),
                error = %error,
                "failed to parse meta file, skipping"
            );
            return Ok(());
        }
    };

    if meta.node_type.as_deref() != Some(TABLE_TYPE) {
        warn!(
            target: SEEDER_TARGET,
            file = %path.display(),
            node_type = meta.node_type.as_deref().unwrap_or("<unset>"),
            "found file with currently unsupported type, skipping"
        );
        return Ok(());
    }
    let Some(format) = meta.format.as_deref() else {
        warn!(
            target: SEEDER_TARGET,
            file = %path.display(),
            "found table with unspecified format, skipping"
        );
        return Ok(());
    };

    let content = fs::read(path).map_err(|source| LifecycleError::ContentRead {
        path: path.to_path_buf(),
        source,
    })?;
    client.write_table(dest, &content, format)?;
    // One set call per key: a failure partway through leaves earlier
    // attributes applied.
    for (key, value) in &meta.attributes {
        client.set_attribute(dest, key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AttrValue;
    use crate::testing::{FakeClient, NamespaceOp};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn seed(root: &Path) -> Vec<NamespaceOp> {
        let mut client = FakeClient::default();
        seed_namespace(&mut client, root).expect("seed namespace");
        client.operations()
    }

    #[test]
    fn directory_and_table_are_mirrored_with_attributes() {
        let tree = TempDir::new().expect("temp dir");
        let dir_a = tree.path().join("dirA");
        fs::create_dir(&dir_a).expect("dirA");
        fs::write(dir_a.join(".meta"), "attributes:\n  x: 1\n").expect("dir meta");
        fs::write(dir_a.join("file1"), b"rows").expect("file1");
        fs::write(
            dir_a.join("file1.meta"),
            "type: table\nformat: yson\nattributes:\n  y: 2\n",
        )
        .expect("file1 meta");

        let ops = seed(tree.path());
        assert_eq!(
            ops,
            vec![
                NamespaceOp::Container {
                    path: "//dirA".to_owned(),
                    attributes: BTreeMap::from([("x".to_owned(), AttrValue::from(1))]),
                },
                NamespaceOp::WriteTable {
                    path: "//dirA/file1".to_owned(),
                    content: b"rows".to_vec(),
                    format: "yson".to_owned(),
                },
                NamespaceOp::SetAttribute {
                    path: "//dirA/file1".to_owned(),
                    key: "y".to_owned(),
                    value: AttrValue::from(2),
                },
            ]
        );
    }

    #[test]
    fn root_attributes_apply_to_namespace_root_first() {
        let tree = TempDir::new().expect("temp dir");
        fs::write(tree.path().join(".meta"), "attributes:\n  owner: tests\n").expect("root meta");
        let ops = seed(tree.path());
        assert_eq!(
            ops,
            vec![NamespaceOp::SetAttribute {
                path: "/".to_owned(),
                key: "owner".to_owned(),
                value: AttrValue::from("tests"),
            }]
        );
    }

    #[test]
    fn file_without_sidecar_is_skipped_and_walk_continues() {
        let tree = TempDir::new().expect("temp dir");
        fs::write(tree.path().join("file2"), b"orphan").expect("file2");
        fs::write(tree.path().join("file3"), b"rows").expect("file3");
        fs::write(tree.path().join("file3.meta"), "type: table\nformat: json\n").expect("meta");

        let ops = seed(tree.path());
        assert_eq!(
            ops,
            vec![NamespaceOp::WriteTable {
                path: "//file3".to_owned(),
                content: b"rows".to_vec(),
                format: "json".to_owned(),
            }]
        );
    }

    #[test]
    fn unsupported_type_and_missing_format_are_skipped() {
        let tree = TempDir::new().expect("temp dir");
        fs::write(tree.path().join("doc"), b"text").expect("doc");
        fs::write(tree.path().join("doc.meta"), "type: document\nformat: txt\n").expect("meta");
        fs::write(tree.path().join("tbl"), b"rows").expect("tbl");
        fs::write(tree.path().join("tbl.meta"), "type: table\n").expect("meta");

        assert!(seed(tree.path()).is_empty());
    }

    #[test]
    fn malformed_sidecar_skips_only_that_file() {
        let tree = TempDir::new().expect("temp dir");
        fs::write(tree.path().join("bad"), b"rows").expect("bad");
        fs::write(tree.path().join("bad.meta"), "type: [unclosed").expect("bad meta");
        fs::write(tree.path().join("good"), b"rows").expect("good");
        fs::write(tree.path().join("good.meta"), "type: table\nformat: yson\n").expect("meta");

        let ops = seed(tree.path());
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            ops.first(),
            Some(NamespaceOp::WriteTable { path, .. }) if path == "//good"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_entry_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tree = TempDir::new().expect("temp dir");
        fs::create_dir(tree.path().join(OsStr::from_bytes(b"dir\xff"))).expect("odd dir");
        fs::write(tree.path().join("good"), b"rows").expect("good");
        fs::write(tree.path().join("good.meta"), "type: table\nformat: yson\n").expect("meta");

        let ops = seed(tree.path());
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            ops.first(),
            Some(NamespaceOp::WriteTable { path, .. }) if path == "//good"
        ));
    }

    #[test]
    fn missing_content_tree_is_an_error() {
        let mut client = FakeClient::default();
        let error = seed_namespace(&mut client, Path::new("/nonexistent/tree"))
            .expect_err("missing tree must fail");
        assert!(matches!(error, LifecycleError::ContentTreeMissing { .. }));
    }
}
