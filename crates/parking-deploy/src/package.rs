//! Artifact packaging: dependency install in the build image, then zip
//!
//! Dependencies are installed inside the Lambda Python build image so that
//! compiled wheels match the runtime. The handler source lands at the
//! archive root next to the installed packages.

use crate::command::{CommandConfig, CommandSpec, run_command, run_command_streaming};
use crate::config::ProjectLayout;
use anyhow::{Context, Result, bail};
use parking_deploy_common::defaults::{BUILD_IMAGE, HANDLER_FILE, REQUIREMENTS_FILE, STAGING_DIR};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Mount point of the project directory inside the build container
const CONTAINER_WORKDIR: &str = "/var/task";

fn is_bytecode(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == "__pycache__")
        || path.extension().is_some_and(|ext| ext == "pyc")
}

/// Install dependencies and write the zip artifact, returning its path
pub async fn build_artifact(layout: &ProjectLayout, config: &CommandConfig) -> Result<PathBuf> {
    let handler = layout.handler_path();
    if !handler.is_file() {
        bail!("Handler source {} not found", handler.display());
    }
    let requirements = layout.requirements_path();
    if !requirements.is_file() {
        bail!("Dependency manifest {} not found", requirements.display());
    }

    let project_dir = tokio::fs::canonicalize(&layout.project_dir)
        .await
        .with_context(|| format!("Failed to resolve {}", layout.project_dir.display()))?;

    let staging = layout.staging_dir();
    if staging.exists() {
        tokio::fs::remove_dir_all(&staging)
            .await
            .with_context(|| format!("Failed to clear {}", staging.display()))?;
    }
    tokio::fs::create_dir_all(&staging)
        .await
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    info!(image = %BUILD_IMAGE, "Installing dependencies in build container");
    let spec = CommandSpec::new("docker")
        .args(["run", "--rm", "-v"])
        .arg(format!("{}:{CONTAINER_WORKDIR}", project_dir.display()))
        .args(["-w", CONTAINER_WORKDIR, BUILD_IMAGE])
        .args(["pip", "install", "-r", REQUIREMENTS_FILE, "-t", STAGING_DIR]);
    run_command(&spec, config)
        .await
        .context("Dependency install in build container failed")?;

    let artifact = layout.artifact.clone();
    let entries = {
        let staging = staging.clone();
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || write_archive(&staging, &handler, &artifact))
            .await
            .context("Archive task panicked")??
    };

    info!(artifact = %artifact.display(), entries, "Artifact built");
    Ok(artifact)
}

/// Zip the staged dependencies plus the handler into `out`.
///
/// Bytecode caches are left out. Returns the number of entries written.
pub fn write_archive(staging: &Path, handler: &Path, out: &Path) -> Result<usize> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut entries = 0;
    let mut pending = vec![staging.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut children: Vec<(PathBuf, fs::FileType)> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<io::Result<_>>()
            .with_context(|| format!("Failed to read {}", dir.display()))?;
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in children {
            if is_bytecode(&path) {
                debug!(path = %path.display(), "Skipping bytecode");
                continue;
            }
            // Symlinked files are archived by content, symlinked directories are not followed
            if file_type.is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "Skipping symlinked directory");
                continue;
            }
            let name = archive_name(staging, &path)?;
            if file_type.is_dir() {
                zip.add_directory(name, options)?;
                pending.push(path);
            } else if name != HANDLER_FILE {
                zip.start_file(name, options)?;
                let mut source =
                    File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
                io::copy(&mut source, &mut zip)
                    .with_context(|| format!("Failed to archive {}", path.display()))?;
                entries += 1;
            }
        }
    }

    let source =
        fs::read(handler).with_context(|| format!("Failed to read {}", handler.display()))?;
    zip.start_file(HANDLER_FILE, options)?;
    zip.write_all(&source)
        .with_context(|| format!("Failed to archive {}", handler.display()))?;
    entries += 1;

    zip.finish().context("Failed to finish artifact zip")?;
    Ok(entries)
}

/// Forward-slash path of `path` relative to the staging root
fn archive_name(staging: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(staging)
        .with_context(|| format!("{} is outside {}", path.display(), staging.display()))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Remove the build directory and bytecode caches, returning what was removed
pub fn clean(layout: &ProjectLayout) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let build_dir = layout.build_dir();
    if build_dir.exists() {
        fs::remove_dir_all(&build_dir)
            .with_context(|| format!("Failed to remove {}", build_dir.display()))?;
        removed.push(build_dir);
    }

    let mut pending = vec![layout.project_dir.clone()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let entry = entry?;
            // Symlinks are never followed, so nothing outside the project is touched
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let hidden = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if hidden {
                continue;
            }
            if is_bytecode(&path) {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed.push(path);
            } else {
                pending.push(path);
            }
        }
    }

    info!(removed = removed.len(), "Build outputs cleaned");
    Ok(removed)
}

/// Remove the build image. Failures are logged and ignored.
pub async fn clean_images(config: &CommandConfig) {
    let spec = CommandSpec::new("docker").args(["rmi", "-f", BUILD_IMAGE]);
    match run_command_streaming(&spec, config).await {
        Ok(true) => info!(image = %BUILD_IMAGE, "Build image removed"),
        Ok(false) => warn!(image = %BUILD_IMAGE, "Build image could not be removed"),
        Err(e) => warn!(image = %BUILD_IMAGE, error = %e, "Failed to run docker"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path(), "build/lambda.zip");
        fs::write(layout.handler_path(), "def lambda_handler(event, context):\n    pass\n").unwrap();

        let staging = layout.staging_dir();
        fs::create_dir_all(staging.join("requests/__pycache__")).unwrap();
        fs::write(staging.join("requests/__init__.py"), "").unwrap();
        fs::write(staging.join("requests/__pycache__/api.cpython-312.pyc"), "").unwrap();
        fs::write(staging.join("six.py"), "").unwrap();
        fs::write(staging.join("stale.pyc"), "").unwrap();
        (dir, layout)
    }

    #[test]
    fn test_archive_layout() {
        let (_dir, layout) = project();
        let entries =
            write_archive(&layout.staging_dir(), &layout.handler_path(), &layout.artifact).unwrap();
        assert_eq!(entries, 3);

        let mut archive = zip::ZipArchive::new(File::open(&layout.artifact).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"parking.py".to_string()));
        assert!(names.contains(&"six.py".to_string()));
        assert!(names.contains(&"requests/__init__.py".to_string()));
        assert!(!names.iter().any(|n| n.contains("__pycache__") || n.ends_with(".pyc")));

        let mut handler = String::new();
        archive
            .by_name("parking.py")
            .unwrap()
            .read_to_string(&mut handler)
            .unwrap();
        assert!(handler.contains("lambda_handler"));
    }

    #[test]
    fn test_handler_at_root_wins_over_staged_copy() {
        let (_dir, layout) = project();
        fs::write(layout.staging_dir().join("parking.py"), "stale").unwrap();

        write_archive(&layout.staging_dir(), &layout.handler_path(), &layout.artifact).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&layout.artifact).unwrap()).unwrap();
        let count = archive.file_names().filter(|n| *n == "parking.py").count();
        assert_eq!(count, 1);
        let mut handler = String::new();
        archive
            .by_name("parking.py")
            .unwrap()
            .read_to_string(&mut handler)
            .unwrap();
        assert_ne!(handler, "stale");
    }

    #[test]
    fn test_clean_removes_build_and_caches() {
        let (dir, layout) = project();
        fs::create_dir_all(dir.path().join("__pycache__")).unwrap();
        fs::create_dir_all(dir.path().join("tests/__pycache__")).unwrap();
        fs::create_dir_all(dir.path().join(".venv/lib/__pycache__")).unwrap();

        let removed = clean(&layout).unwrap();

        assert!(!layout.build_dir().exists());
        assert!(!dir.path().join("__pycache__").exists());
        assert!(!dir.path().join("tests/__pycache__").exists());
        assert!(dir.path().join("tests").exists());
        assert!(dir.path().join(".venv/lib/__pycache__").exists());
        assert!(layout.handler_path().exists());
        assert_eq!(removed.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_does_not_follow_symlinked_directories() {
        let (dir, layout) = project();
        let staging = layout.staging_dir();
        std::os::unix::fs::symlink(&staging, staging.join("loop")).unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(&outside, staging.join("linked")).unwrap();
        std::os::unix::fs::symlink(staging.join("six.py"), staging.join("alias.py")).unwrap();

        let entries = write_archive(&staging, &layout.handler_path(), &layout.artifact).unwrap();
        assert_eq!(entries, 4);

        let archive = zip::ZipArchive::new(File::open(&layout.artifact).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"alias.py"));
        assert!(!names.iter().any(|n| n.starts_with("loop") || n.starts_with("linked")));
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_stays_inside_project() {
        let (dir, layout) = project();
        let outside = tempfile::tempdir().unwrap();
        fs::create_dir_all(outside.path().join("lib/__pycache__")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("vendor")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("self")).unwrap();

        clean(&layout).unwrap();

        assert!(outside.path().join("lib/__pycache__").exists());
        assert!(!layout.build_dir().exists());
    }

    #[tokio::test]
    async fn test_build_requires_sources() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path(), "build/lambda.zip");

        let err = build_artifact(&layout, &CommandConfig::for_build())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parking.py"));
    }
}
